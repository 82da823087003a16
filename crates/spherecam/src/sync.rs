//! Two-way binding between panel properties and proxy objects.
//!
//! Writing a proxy makes the host recompute the scene, and writing a panel
//! property fires a property-changed notification. Left alone, each
//! direction would keep re-triggering the other. Before writing, a pass
//! suppresses the direction its writes would trigger; notifications for a
//! suppressed direction are dropped instead of queued.

use std::cell::Cell;
use std::path::PathBuf;
use std::rc::Rc;

use spherecam_core::{
    CaptureSettings, DVec3, OrientationMode, Properties, ProxyKind, Result, SceneStore, Trajectory,
};

use crate::events::{EventQueue, HostEvent, Property};
use crate::proxy::{orbit_pose, ProxyLoss, ProxyManager};

/// Direction of a synchronization pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncDirection {
    /// Panel edits flow into the proxies.
    UiToProxy,
    /// Proxy edits flow back into the panel.
    ProxyToUi,
}

/// Enable flags for both sync directions.
///
/// Flags start enabled. They are only turned off through [`SyncGuard::suppress`],
/// whose returned [`Suppression`] restores the previous value when dropped.
#[derive(Debug)]
pub struct SyncGuard {
    ui_to_proxy: Cell<bool>,
    proxy_to_ui: Cell<bool>,
}

impl Default for SyncGuard {
    fn default() -> Self {
        Self {
            ui_to_proxy: Cell::new(true),
            proxy_to_ui: Cell::new(true),
        }
    }
}

impl SyncGuard {
    /// Creates a guard with both directions enabled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn flag(&self, direction: SyncDirection) -> &Cell<bool> {
        match direction {
            SyncDirection::UiToProxy => &self.ui_to_proxy,
            SyncDirection::ProxyToUi => &self.proxy_to_ui,
        }
    }

    /// Returns whether a direction currently propagates.
    #[must_use]
    pub fn is_enabled(&self, direction: SyncDirection) -> bool {
        self.flag(direction).get()
    }

    /// Disables a direction until the returned value is dropped.
    #[must_use = "the direction is re-enabled as soon as the suppression is dropped"]
    pub fn suppress(&self, direction: SyncDirection) -> Suppression<'_> {
        let previous = self.flag(direction).replace(false);
        Suppression {
            guard: self,
            direction,
            previous,
        }
    }

    /// Runs `f` with a direction disabled.
    ///
    /// The flag is restored when `f` returns, early-returns an error, or
    /// panics. Nested calls restore the value they found, so an inner scope
    /// never re-enables a direction an outer scope turned off.
    pub fn with_suppressed<R>(&self, direction: SyncDirection, f: impl FnOnce() -> R) -> R {
        let _suppression = self.suppress(direction);
        f()
    }
}

/// Scoped suppression of one sync direction.
#[derive(Debug)]
pub struct Suppression<'a> {
    guard: &'a SyncGuard,
    direction: SyncDirection,
    previous: bool,
}

impl Drop for Suppression<'_> {
    fn drop(&mut self) {
        self.guard.flag(self.direction).set(self.previous);
    }
}

/// Counters describing sync activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Panel-to-proxy passes that ran.
    pub ui_to_proxy_passes: usize,
    /// Proxy-to-panel passes that ran.
    pub proxy_to_ui_passes: usize,
    /// Passes skipped because their direction was suppressed.
    pub skipped_passes: usize,
    /// Panel values overwritten from proxies.
    pub ui_updates: usize,
}

/// A single edit of a panel property.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyChange {
    SphereCenter(DVec3),
    SphereRotation(DVec3),
    SphereScale(DVec3),
    SphereRadius(f64),
    FocalLength(f64),
    Orientation(OrientationMode),
    ShowSphere(bool),
    ShowCamera(bool),
    Trajectory(Trajectory),
    UpperHemisphereOnly(bool),
    Seed(u64),
    OrbitFrames(u32),
    SavePath(PathBuf),
    Capture(CaptureSettings),
}

impl PropertyChange {
    /// The property this edit targets.
    #[must_use]
    pub fn property(&self) -> Property {
        match self {
            PropertyChange::SphereCenter(_) => Property::SphereCenter,
            PropertyChange::SphereRotation(_) => Property::SphereRotation,
            PropertyChange::SphereScale(_) => Property::SphereScale,
            PropertyChange::SphereRadius(_) => Property::SphereRadius,
            PropertyChange::FocalLength(_) => Property::FocalLength,
            PropertyChange::Orientation(_) => Property::Orientation,
            PropertyChange::ShowSphere(_) => Property::ShowSphere,
            PropertyChange::ShowCamera(_) => Property::ShowCamera,
            PropertyChange::Trajectory(_)
            | PropertyChange::UpperHemisphereOnly(_)
            | PropertyChange::Seed(_) => Property::Trajectory,
            PropertyChange::OrbitFrames(_) => Property::OrbitFrames,
            PropertyChange::SavePath(_) | PropertyChange::Capture(_) => Property::Capture,
        }
    }

    /// Applies the edit, rejecting values that fail validation.
    ///
    /// Nothing is changed when an error is returned.
    pub fn apply(self, props: &mut Properties) -> Result<()> {
        let mut next = props.clone();
        match self {
            PropertyChange::SphereCenter(v) => next.sphere.center = v,
            PropertyChange::SphereRotation(v) => next.sphere.rotation = v,
            PropertyChange::SphereScale(v) => next.sphere.scale = v,
            PropertyChange::SphereRadius(v) => next.sphere.radius = v,
            PropertyChange::FocalLength(v) => next.camera.focal_length = v,
            PropertyChange::Orientation(v) => next.camera.orientation = v,
            PropertyChange::ShowSphere(v) => next.show_sphere = v,
            PropertyChange::ShowCamera(v) => next.show_camera = v,
            PropertyChange::Trajectory(v) => next.trajectory.trajectory = v,
            PropertyChange::UpperHemisphereOnly(v) => next.trajectory.upper_hemisphere_only = v,
            PropertyChange::Seed(v) => next.trajectory.seed = v,
            PropertyChange::OrbitFrames(v) => next.orbit_frames = v,
            PropertyChange::SavePath(v) => next.capture.save_path = v,
            PropertyChange::Capture(v) => next.capture = v,
        }
        next.validate()?;
        *props = next;
        Ok(())
    }
}

/// Keeps [`Properties`] and the proxy objects consistent.
#[derive(Debug, Default)]
pub struct SyncController {
    guard: Rc<SyncGuard>,
    stats: SyncStats,
}

impl SyncController {
    /// Creates a controller with both directions enabled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The enable flags shared with scoped suppressions.
    #[must_use]
    pub fn guard(&self) -> &Rc<SyncGuard> {
        &self.guard
    }

    #[must_use]
    pub fn stats(&self) -> SyncStats {
        self.stats
    }

    /// Runs `f` with a direction disabled. See [`SyncGuard::with_suppressed`].
    pub fn with_suppressed<R>(&self, direction: SyncDirection, f: impl FnOnce() -> R) -> R {
        self.guard.with_suppressed(direction, f)
    }

    /// Writes panel values into the proxies that exist.
    ///
    /// Recompute notifications caused by the writes are suppressed. The
    /// camera is re-placed for the current frame so it follows sphere edits.
    pub fn push_ui_to_proxy<S>(
        &mut self,
        props: &Properties,
        proxies: &ProxyManager,
        store: &mut S,
        queue: &mut EventQueue,
    ) -> Result<()>
    where
        S: SceneStore + ?Sized,
    {
        if !self.guard.is_enabled(SyncDirection::UiToProxy) {
            self.stats.skipped_passes += 1;
            return Ok(());
        }
        self.stats.ui_to_proxy_passes += 1;

        let guard = Rc::clone(&self.guard);
        guard.with_suppressed(SyncDirection::ProxyToUi, || -> Result<()> {
            if proxies.exists(ProxyKind::Sphere) {
                proxies.write_sphere(store, &props.sphere)?;
                queue.post(HostEvent::SceneRecomputed, &guard);
            }
            if proxies.exists(ProxyKind::Camera) {
                proxies.write_camera(store, &props.camera)?;
                let pose = orbit_pose(props, store.render_settings());
                proxies.apply_pose(store, &pose)?;
                queue.post(HostEvent::SceneRecomputed, &guard);
            }
            Ok(())
        })
    }

    /// Pulls proxy values back into the panel.
    ///
    /// Proxies deleted outside the controller are forgotten and their
    /// visibility toggles reset. Panel fields are only written when the proxy
    /// value differs, and property-changed notifications caused by those
    /// writes are suppressed.
    pub fn pull_proxy_to_ui<S>(
        &mut self,
        props: &mut Properties,
        proxies: &mut ProxyManager,
        store: &mut S,
        queue: &mut EventQueue,
    ) -> Result<ProxyLoss>
    where
        S: SceneStore + ?Sized,
    {
        if !self.guard.is_enabled(SyncDirection::ProxyToUi) {
            self.stats.skipped_passes += 1;
            return Ok(ProxyLoss::default());
        }
        self.stats.proxy_to_ui_passes += 1;

        let loss = proxies.reconcile(store)?;
        let guard = Rc::clone(&self.guard);
        let stats = &mut self.stats;

        guard.with_suppressed(SyncDirection::UiToProxy, || {
            if loss.sphere && props.show_sphere {
                props.show_sphere = false;
                queue.post(HostEvent::PropertyChanged(Property::ShowSphere), &guard);
            }
            if loss.camera && props.show_camera {
                props.show_camera = false;
                queue.post(HostEvent::PropertyChanged(Property::ShowCamera), &guard);
            }

            if props.show_sphere {
                if let Some(sphere) = proxies.read_sphere_transform(&*store) {
                    if sphere != props.sphere {
                        match sphere.validate() {
                            Ok(()) => {
                                props.sphere = sphere;
                                stats.ui_updates += 1;
                                let event = HostEvent::PropertyChanged(Property::SphereCenter);
                                queue.post(event, &guard);
                            }
                            Err(err) => log::warn!("ignoring sphere proxy edit: {err}"),
                        }
                    }
                }
            }

            if props.show_camera {
                if let Some(camera) = proxies.read_camera_settings(&*store) {
                    if camera != props.camera {
                        match camera.validate() {
                            Ok(()) => {
                                props.camera = camera;
                                stats.ui_updates += 1;
                                let event = HostEvent::PropertyChanged(Property::FocalLength);
                                queue.post(event, &guard);
                            }
                            Err(err) => log::warn!("ignoring camera proxy edit: {err}"),
                        }
                    }
                }
            }
        });

        if proxies.exists(ProxyKind::Camera) {
            guard.with_suppressed(SyncDirection::ProxyToUi, || -> Result<()> {
                let pose = orbit_pose(props, store.render_settings());
                proxies.apply_pose(store, &pose)?;
                queue.post(HostEvent::SceneRecomputed, &guard);
                Ok(())
            })?;
        }

        Ok(loss)
    }

    /// Creates or removes proxies after a visibility toggle.
    ///
    /// Showing the camera shows the sphere first. Removing the sphere takes
    /// the camera with it, and the camera toggle is cleared to match.
    pub fn apply_visibility<S>(
        &mut self,
        property: Property,
        props: &mut Properties,
        proxies: &mut ProxyManager,
        store: &mut S,
        queue: &mut EventQueue,
    ) -> Result<()>
    where
        S: SceneStore + ?Sized,
    {
        let guard = Rc::clone(&self.guard);
        let changed = guard.with_suppressed(SyncDirection::UiToProxy, || -> Result<bool> {
            match property {
                Property::ShowSphere if props.show_sphere => {
                    let existed = proxies.exists(ProxyKind::Sphere);
                    proxies.ensure_sphere_proxy(store, &props.sphere)?;
                    Ok(!existed)
                }
                Property::ShowSphere => {
                    let had_camera = proxies.exists(ProxyKind::Camera);
                    let removed = proxies.remove_sphere_proxy(store)?;
                    if had_camera && props.show_camera {
                        props.show_camera = false;
                        queue.post(HostEvent::PropertyChanged(Property::ShowCamera), &guard);
                    }
                    Ok(removed)
                }
                Property::ShowCamera if props.show_camera => {
                    if proxies.exists(ProxyKind::Camera) {
                        return Ok(false);
                    }
                    if !proxies.exists(ProxyKind::Sphere) {
                        props.show_sphere = true;
                        queue.post(HostEvent::PropertyChanged(Property::ShowSphere), &guard);
                        proxies.ensure_sphere_proxy(store, &props.sphere)?;
                    }
                    let pose = orbit_pose(props, store.render_settings());
                    proxies.ensure_camera_proxy(store, &props.camera, &pose)?;
                    Ok(true)
                }
                Property::ShowCamera => proxies.remove_camera_proxy(store),
                _ => Ok(false),
            }
        });

        match changed {
            Ok(true) => {
                queue.post(HostEvent::SceneRecomputed, &guard);
                Ok(())
            }
            Ok(false) => Ok(()),
            Err(err) => {
                // Keep the toggles truthful when creation was refused.
                props.show_sphere = proxies.exists(ProxyKind::Sphere);
                props.show_camera = proxies.exists(ProxyKind::Camera);
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spherecam_core::{MemoryScene, SphereConfig};

    #[test]
    fn test_suppression_restores_on_drop() {
        let guard = SyncGuard::new();
        {
            let _s = guard.suppress(SyncDirection::UiToProxy);
            assert!(!guard.is_enabled(SyncDirection::UiToProxy));
            assert!(guard.is_enabled(SyncDirection::ProxyToUi));
        }
        assert!(guard.is_enabled(SyncDirection::UiToProxy));
    }

    #[test]
    fn test_nested_suppression_keeps_outer_scope() {
        let guard = SyncGuard::new();
        guard.with_suppressed(SyncDirection::ProxyToUi, || {
            guard.with_suppressed(SyncDirection::ProxyToUi, || {
                assert!(!guard.is_enabled(SyncDirection::ProxyToUi));
            });
            // The inner scope must not re-enable the flag.
            assert!(!guard.is_enabled(SyncDirection::ProxyToUi));
        });
        assert!(guard.is_enabled(SyncDirection::ProxyToUi));
    }

    #[test]
    fn test_suppression_restored_after_error_and_panic() {
        let guard = SyncGuard::new();
        let result: Result<()> = guard.with_suppressed(SyncDirection::UiToProxy, || {
            Err(spherecam_core::SphereCamError::MissingProxy(ProxyKind::Sphere))
        });
        assert!(result.is_err());
        assert!(guard.is_enabled(SyncDirection::UiToProxy));

        let panicked = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            guard.with_suppressed(SyncDirection::UiToProxy, || panic!("boom"));
        }));
        assert!(panicked.is_err());
        assert!(guard.is_enabled(SyncDirection::UiToProxy));
    }

    #[test]
    fn test_property_change_rejects_degenerate_radius() {
        let mut props = Properties::default();
        let err = PropertyChange::SphereRadius(0.0).apply(&mut props);
        assert!(matches!(
            err,
            Err(spherecam_core::SphereCamError::DegenerateGeometry(_))
        ));
        assert_eq!(props.sphere, SphereConfig::default());
    }

    #[test]
    fn test_push_writes_sphere_without_notifying_pull() {
        let mut scene = MemoryScene::new();
        let mut proxies = ProxyManager::new();
        let mut props = Properties::default();
        let mut queue = EventQueue::new();
        let mut sync = SyncController::new();
        proxies.ensure_sphere_proxy(&mut scene, &props.sphere).unwrap();

        props.sphere.radius = 7.0;
        sync.push_ui_to_proxy(&props, &proxies, &mut scene, &mut queue)
            .unwrap();

        assert_eq!(proxies.read_sphere_transform(&scene).unwrap().radius, 7.0);
        assert!(queue.is_empty());
        assert_eq!(queue.suppressed(), 1);
        assert_eq!(sync.stats().ui_to_proxy_passes, 1);
    }

    #[test]
    fn test_pull_reads_diverged_proxy() {
        let mut scene = MemoryScene::new();
        let mut proxies = ProxyManager::new();
        let mut props = Properties {
            show_sphere: true,
            ..Default::default()
        };
        let mut queue = EventQueue::new();
        let mut sync = SyncController::new();
        let sphere = proxies.ensure_sphere_proxy(&mut scene, &props.sphere).unwrap();

        let mut moved = scene.transform(sphere).unwrap();
        moved.location = DVec3::new(1.0, 1.0, 0.0);
        scene.set_transform(sphere, moved).unwrap();

        sync.pull_proxy_to_ui(&mut props, &mut proxies, &mut scene, &mut queue)
            .unwrap();
        assert_eq!(props.sphere.center, DVec3::new(1.0, 1.0, 0.0));
        assert_eq!(sync.stats().ui_updates, 1);
        // The panel write does not bounce back to the proxy.
        assert!(queue.is_empty());

        // A second pass finds nothing to copy.
        sync.pull_proxy_to_ui(&mut props, &mut proxies, &mut scene, &mut queue)
            .unwrap();
        assert_eq!(sync.stats().ui_updates, 1);
    }

    #[test]
    fn test_pull_ignores_degenerate_proxy_edit() {
        let mut scene = MemoryScene::new();
        let mut proxies = ProxyManager::new();
        let mut props = Properties {
            show_sphere: true,
            ..Default::default()
        };
        let mut queue = EventQueue::new();
        let mut sync = SyncController::new();
        let sphere = proxies.ensure_sphere_proxy(&mut scene, &props.sphere).unwrap();

        let mut flat = scene.transform(sphere).unwrap();
        flat.display_size = 0.0;
        scene.set_transform(sphere, flat).unwrap();

        sync.pull_proxy_to_ui(&mut props, &mut proxies, &mut scene, &mut queue)
            .unwrap();
        assert_eq!(props.sphere, SphereConfig::default());
    }

    #[test]
    fn test_skipped_when_direction_suppressed() {
        let mut scene = MemoryScene::new();
        let proxies = ProxyManager::new();
        let props = Properties::default();
        let mut queue = EventQueue::new();
        let mut sync = SyncController::new();

        let guard = Rc::clone(sync.guard());
        guard.with_suppressed(SyncDirection::UiToProxy, || {
            sync.push_ui_to_proxy(&props, &proxies, &mut scene, &mut queue)
                .unwrap();
        });
        assert_eq!(sync.stats().ui_to_proxy_passes, 0);
        assert_eq!(sync.stats().skipped_passes, 1);
    }
}
