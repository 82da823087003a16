//! Proxy objects in the host scene.
//!
//! The sphere proxy is an empty drawn as a sphere that mirrors the
//! [`SphereConfig`]; the camera proxy orbits it. Existence is tracked by the
//! handles held here rather than by name lookups, since the host may rename
//! objects when a name is already taken.

use spherecam_core::{
    sample_pose, CameraConfig, CameraPose, FrameWindow, ObjectHandle, ObjectKind,
    OrientationConstraint, Properties, ProxyKind, RenderSettings, Result, SceneStore,
    SphereCamError, SphereConfig,
};

/// Pose of the camera proxy for the scene's current frame.
///
/// Sequential trajectories spread [`Properties::orbit_frames`] frames from the
/// scene's frame start.
pub fn orbit_pose(props: &Properties, render: &RenderSettings) -> CameraPose {
    let window = FrameWindow {
        frame_index: render.frame_current,
        frame_start: render.frame_start,
        total_frames: props.orbit_frames.max(1),
    };
    sample_pose(window, &props.sphere, &props.trajectory, props.camera.orientation)
}

/// Which proxies disappeared from the store since the last check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProxyLoss {
    pub sphere: bool,
    pub camera: bool,
}

impl ProxyLoss {
    /// Returns true if nothing was lost.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.sphere && !self.camera
    }
}

/// Owns the handles of the sphere and camera proxies.
#[derive(Debug, Default)]
pub struct ProxyManager {
    sphere: Option<ObjectHandle>,
    camera: Option<ObjectHandle>,
}

impl ProxyManager {
    /// Creates a manager with no proxies.
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle of the sphere proxy, if it exists.
    pub fn sphere(&self) -> Option<ObjectHandle> {
        self.sphere
    }

    /// Handle of the camera proxy, if it exists.
    pub fn camera(&self) -> Option<ObjectHandle> {
        self.camera
    }

    /// Returns true if a proxy of the given kind exists.
    pub fn exists(&self, kind: ProxyKind) -> bool {
        match kind {
            ProxyKind::Sphere => self.sphere.is_some(),
            ProxyKind::Camera => self.camera.is_some(),
        }
    }

    /// Creates the sphere proxy unless it already exists.
    ///
    /// The configuration is validated first, so degenerate geometry never
    /// reaches the scene.
    pub fn ensure_sphere_proxy<S>(
        &mut self,
        store: &mut S,
        config: &SphereConfig,
    ) -> Result<ObjectHandle>
    where
        S: SceneStore + ?Sized,
    {
        if let Some(handle) = self.sphere {
            return Ok(handle);
        }
        config.validate()?;

        let handle = store.create_object(ObjectKind::SphereEmpty, ProxyKind::Sphere.object_name());
        // Placement is written explicitly after creation.
        store.set_transform(handle, config.to_transform())?;
        self.sphere = Some(handle);
        log::info!("created sphere proxy {handle}");
        Ok(handle)
    }

    /// Creates the camera proxy unless it already exists.
    ///
    /// The camera is placed at `pose` and constrained to track the sphere
    /// proxy, which must already exist.
    pub fn ensure_camera_proxy<S>(
        &mut self,
        store: &mut S,
        config: &CameraConfig,
        pose: &CameraPose,
    ) -> Result<ObjectHandle>
    where
        S: SceneStore + ?Sized,
    {
        if let Some(handle) = self.camera {
            return Ok(handle);
        }
        let sphere = self.sphere.ok_or(SphereCamError::MissingProxy(ProxyKind::Sphere))?;
        config.validate()?;

        let handle = store.create_object(ObjectKind::Camera, ProxyKind::Camera.object_name());
        self.camera = Some(handle);
        store.set_camera_params(handle, config.to_params())?;
        store.set_orientation_constraint(
            handle,
            OrientationConstraint {
                target: sphere,
                mode: config.orientation,
            },
        )?;
        self.apply_pose(store, pose)?;
        log::info!("created camera proxy {handle} tracking {sphere}");
        Ok(handle)
    }

    /// Removes the camera proxy and releases its camera data.
    ///
    /// Returns whether a proxy was removed.
    pub fn remove_camera_proxy<S>(&mut self, store: &mut S) -> Result<bool>
    where
        S: SceneStore + ?Sized,
    {
        let Some(handle) = self.camera.take() else {
            return Ok(false);
        };
        if store.contains(handle) {
            store.delete_object(handle)?;
        }
        if !store.remove_camera_data(handle) {
            log::debug!("camera proxy {handle} had no camera data to release");
        }
        log::info!("removed camera proxy {handle}");
        Ok(true)
    }

    /// Removes the sphere proxy, and the camera proxy with it.
    ///
    /// Returns whether the sphere proxy was removed.
    pub fn remove_sphere_proxy<S>(&mut self, store: &mut S) -> Result<bool>
    where
        S: SceneStore + ?Sized,
    {
        self.remove_camera_proxy(store)?;
        let Some(handle) = self.sphere.take() else {
            return Ok(false);
        };
        if store.contains(handle) {
            store.delete_object(handle)?;
        }
        log::info!("removed sphere proxy {handle}");
        Ok(true)
    }

    /// Moves the camera proxy to a sampled pose.
    pub fn apply_pose<S>(&self, store: &mut S, pose: &CameraPose) -> Result<()>
    where
        S: SceneStore + ?Sized,
    {
        let handle = self.camera.ok_or(SphereCamError::MissingProxy(ProxyKind::Camera))?;
        let mut transform = store
            .transform(handle)
            .ok_or(SphereCamError::ObjectNotFound(handle))?;
        transform.location = pose.position;
        transform.set_rotation_quat(pose.rotation());
        store.set_transform(handle, transform)
    }

    /// Reads the sphere configuration back from the sphere proxy.
    pub fn read_sphere_transform<S>(&self, store: &S) -> Option<SphereConfig>
    where
        S: SceneStore + ?Sized,
    {
        let transform = store.transform(self.sphere?)?;
        Some(SphereConfig::from_transform(&transform))
    }

    /// Reads the camera configuration back from the camera proxy.
    pub fn read_camera_settings<S>(&self, store: &S) -> Option<CameraConfig>
    where
        S: SceneStore + ?Sized,
    {
        let handle = self.camera?;
        let params = store.camera_params(handle)?;
        let constraint = store.orientation_constraint(handle)?;
        Some(CameraConfig {
            focal_length: params.focal_length,
            orientation: constraint.mode,
        })
    }

    /// Writes a sphere configuration into the sphere proxy.
    pub fn write_sphere<S>(&self, store: &mut S, config: &SphereConfig) -> Result<()>
    where
        S: SceneStore + ?Sized,
    {
        let handle = self.sphere.ok_or(SphereCamError::MissingProxy(ProxyKind::Sphere))?;
        store.set_transform(handle, config.to_transform())
    }

    /// Writes a camera configuration into the camera proxy.
    pub fn write_camera<S>(&self, store: &mut S, config: &CameraConfig) -> Result<()>
    where
        S: SceneStore + ?Sized,
    {
        let handle = self.camera.ok_or(SphereCamError::MissingProxy(ProxyKind::Camera))?;
        let target = self.sphere.ok_or(SphereCamError::MissingProxy(ProxyKind::Sphere))?;
        store.set_camera_params(handle, config.to_params())?;
        store.set_orientation_constraint(
            handle,
            OrientationConstraint {
                target,
                mode: config.orientation,
            },
        )
    }

    /// Forgets proxies that were deleted from the store by someone else.
    ///
    /// A camera whose sphere vanished is removed as well.
    pub fn reconcile<S>(&mut self, store: &mut S) -> Result<ProxyLoss>
    where
        S: SceneStore + ?Sized,
    {
        let mut loss = ProxyLoss::default();

        if let Some(handle) = self.sphere {
            if !store.contains(handle) {
                log::warn!("sphere proxy {handle} was deleted outside the controller");
                self.sphere = None;
                loss.sphere = true;
                loss.camera = self.remove_camera_proxy(store)?;
            }
        }

        if let Some(handle) = self.camera {
            if !store.contains(handle) {
                log::warn!("camera proxy {handle} was deleted outside the controller");
                self.remove_camera_proxy(store)?;
                loss.camera = true;
            }
        }

        Ok(loss)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spherecam_core::{CameraParams, DVec3, MemoryScene, OrientationMode};

    fn pose() -> CameraPose {
        CameraPose {
            position: DVec3::new(4.0, 0.0, 0.0),
            forward: -DVec3::X,
        }
    }

    #[test]
    fn test_ensure_sphere_is_idempotent() {
        let mut scene = MemoryScene::new();
        let mut proxies = ProxyManager::new();
        let a = proxies
            .ensure_sphere_proxy(&mut scene, &SphereConfig::default())
            .unwrap();
        let b = proxies
            .ensure_sphere_proxy(&mut scene, &SphereConfig::default())
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(scene.len(), 1);
    }

    #[test]
    fn test_degenerate_sphere_creates_nothing() {
        let mut scene = MemoryScene::new();
        let mut proxies = ProxyManager::new();
        let config = SphereConfig {
            radius: -1.0,
            ..Default::default()
        };
        assert!(matches!(
            proxies.ensure_sphere_proxy(&mut scene, &config),
            Err(SphereCamError::DegenerateGeometry(_))
        ));
        assert!(scene.is_empty());
        assert!(!proxies.exists(ProxyKind::Sphere));
    }

    #[test]
    fn test_camera_requires_sphere() {
        let mut scene = MemoryScene::new();
        let mut proxies = ProxyManager::new();
        let err = proxies.ensure_camera_proxy(&mut scene, &CameraConfig::default(), &pose());
        assert!(matches!(err, Err(SphereCamError::MissingProxy(ProxyKind::Sphere))));
        assert!(scene.is_empty());
    }

    #[test]
    fn test_camera_tracks_sphere() {
        let mut scene = MemoryScene::new();
        let mut proxies = ProxyManager::new();
        let sphere = proxies
            .ensure_sphere_proxy(&mut scene, &SphereConfig::default())
            .unwrap();
        let config = CameraConfig {
            focal_length: 35.0,
            orientation: OrientationMode::Outward,
        };
        let camera = proxies
            .ensure_camera_proxy(&mut scene, &config, &pose())
            .unwrap();

        let constraint = scene.orientation_constraint(camera).unwrap();
        assert_eq!(constraint.target, sphere);
        assert_eq!(constraint.mode, OrientationMode::Outward);
        assert_eq!(proxies.read_camera_settings(&scene), Some(config));
        assert_eq!(scene.transform(camera).unwrap().location, pose().position);
    }

    #[test]
    fn test_removing_sphere_removes_camera_and_data() {
        let mut scene = MemoryScene::new();
        let mut proxies = ProxyManager::new();
        proxies
            .ensure_sphere_proxy(&mut scene, &SphereConfig::default())
            .unwrap();
        proxies
            .ensure_camera_proxy(&mut scene, &CameraConfig::default(), &pose())
            .unwrap();
        assert_eq!(scene.camera_data_len(), 1);

        assert!(proxies.remove_sphere_proxy(&mut scene).unwrap());
        assert!(scene.is_empty());
        assert_eq!(scene.camera_data_len(), 0);
        assert!(!proxies.exists(ProxyKind::Camera));
        assert!(!proxies.remove_sphere_proxy(&mut scene).unwrap());
    }

    #[test]
    fn test_removing_camera_keeps_other_camera_data() {
        let mut scene = MemoryScene::new();
        let mut proxies = ProxyManager::new();
        let closeup = scene.create_object(ObjectKind::Camera, "SphereCam Camera Closeup");
        scene
            .set_camera_params(closeup, CameraParams { focal_length: 85.0 })
            .unwrap();
        proxies
            .ensure_sphere_proxy(&mut scene, &SphereConfig::default())
            .unwrap();
        proxies
            .ensure_camera_proxy(&mut scene, &CameraConfig::default(), &pose())
            .unwrap();

        assert!(proxies.remove_camera_proxy(&mut scene).unwrap());
        assert_eq!(
            scene.camera_params(closeup),
            Some(CameraParams { focal_length: 85.0 })
        );
        assert_eq!(scene.camera_data_len(), 1);
    }

    #[test]
    fn test_reconcile_after_sphere_deleted() {
        let mut scene = MemoryScene::new();
        let mut proxies = ProxyManager::new();
        let sphere = proxies
            .ensure_sphere_proxy(&mut scene, &SphereConfig::default())
            .unwrap();
        proxies
            .ensure_camera_proxy(&mut scene, &CameraConfig::default(), &pose())
            .unwrap();

        scene.delete_object(sphere).unwrap();
        let loss = proxies.reconcile(&mut scene).unwrap();
        assert_eq!(
            loss,
            ProxyLoss {
                sphere: true,
                camera: true
            }
        );
        assert!(scene.is_empty());
        assert_eq!(scene.camera_data_len(), 0);
        assert!(proxies.reconcile(&mut scene).unwrap().is_empty());
    }

    #[test]
    fn test_apply_pose_without_camera() {
        let mut scene = MemoryScene::new();
        let proxies = ProxyManager::new();
        assert!(matches!(
            proxies.apply_pose(&mut scene, &pose()),
            Err(SphereCamError::MissingProxy(ProxyKind::Camera))
        ));
    }
}
