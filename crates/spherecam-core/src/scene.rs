//! Host scene store abstraction.
//!
//! The controller never owns scene objects. It talks to the host editor
//! through [`SceneStore`], which behaves like an opaque mutable store of
//! named objects plus the render settings of the open scene.

use std::fmt;
use std::path::{Path, PathBuf};

use glam::{DMat3, DQuat, DVec3};
use serde::{Deserialize, Serialize};

use crate::config::OrientationMode;
use crate::error::Result;

/// Opaque identity of an object living in a [`SceneStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectHandle(u64);

impl ObjectHandle {
    /// Wraps a raw store identifier.
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw store identifier.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Kind of object the store can create.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    /// An empty drawn as a sphere; carries no render data.
    SphereEmpty,
    /// A camera object backed by a camera data block of the same name.
    Camera,
}

/// The two proxies the controller manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProxyKind {
    /// The bounding-sphere proxy.
    Sphere,
    /// The orbiting camera proxy.
    Camera,
}

impl ProxyKind {
    /// Name given to the proxy object inside the host scene.
    #[must_use]
    pub fn object_name(self) -> &'static str {
        match self {
            ProxyKind::Sphere => "SphereCam Sphere",
            ProxyKind::Camera => "SphereCam Camera",
        }
    }
}

impl fmt::Display for ProxyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProxyKind::Sphere => f.write_str("sphere"),
            ProxyKind::Camera => f.write_str("camera"),
        }
    }
}

/// Placement of a scene object, split into editable components.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObjectTransform {
    /// World-space location.
    pub location: DVec3,
    /// XYZ Euler rotation in radians.
    pub rotation: DVec3,
    /// Per-axis scale.
    pub scale: DVec3,
    /// Display size of an empty. Cameras ignore it.
    pub display_size: f64,
}

impl Default for ObjectTransform {
    fn default() -> Self {
        Self {
            location: DVec3::ZERO,
            rotation: DVec3::ZERO,
            scale: DVec3::ONE,
            display_size: 1.0,
        }
    }
}

impl ObjectTransform {
    /// Sets the rotation from a quaternion.
    pub fn set_rotation_quat(&mut self, rotation: DQuat) {
        // Z * Y * X composition is glam's intrinsic ZYX order.
        let (z, y, x) = rotation.to_euler(glam::EulerRot::ZYX);
        self.rotation = DVec3::new(x, y, z);
    }
}

/// Builds the rotation matrix for XYZ Euler angles, applying X, then Y, then Z.
#[must_use]
pub fn euler_xyz_to_matrix(angles: DVec3) -> DMat3 {
    DMat3::from_rotation_z(angles.z)
        * DMat3::from_rotation_y(angles.y)
        * DMat3::from_rotation_x(angles.x)
}

/// Parameters stored in a camera data block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraParams {
    /// Focal length in millimetres.
    pub focal_length: f64,
}

impl Default for CameraParams {
    fn default() -> Self {
        Self { focal_length: 50.0 }
    }
}

/// A "track to" constraint aiming an object relative to a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrientationConstraint {
    /// The object being tracked.
    pub target: ObjectHandle,
    /// Whether the camera faces the target or away from it.
    pub mode: OrientationMode,
}

/// Frame range, output path and active camera of the open scene.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderSettings {
    pub frame_start: i64,
    pub frame_current: i64,
    pub frame_end: i64,
    pub frame_step: i64,
    /// The camera used for rendering, if any.
    pub active_camera: Option<ObjectHandle>,
    /// Where rendered frames are written.
    pub output_path: PathBuf,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            frame_start: 1,
            frame_current: 1,
            frame_end: 250,
            frame_step: 1,
            active_camera: None,
            output_path: PathBuf::from("/tmp/"),
        }
    }
}

/// The host scene as seen by the controller.
///
/// Operations on existing objects report [`SphereCamError::ObjectNotFound`]
/// when the handle no longer resolves, which happens when the user deletes an
/// object behind the controller's back.
///
/// [`SphereCamError::ObjectNotFound`]: crate::error::SphereCamError::ObjectNotFound
pub trait SceneStore {
    /// Creates a new object. Cameras get a camera data block with the same name.
    fn create_object(&mut self, kind: ObjectKind, name: &str) -> ObjectHandle;

    /// Removes an object. Camera data blocks are left behind.
    fn delete_object(&mut self, handle: ObjectHandle) -> Result<()>;

    /// Returns whether the handle still resolves to an object.
    fn contains(&self, handle: ObjectHandle) -> bool;

    /// Looks up an object by name.
    fn find(&self, name: &str) -> Option<ObjectHandle>;

    /// Returns the placement of an object.
    fn transform(&self, handle: ObjectHandle) -> Option<ObjectTransform>;

    /// Replaces the placement of an object.
    fn set_transform(&mut self, handle: ObjectHandle, transform: ObjectTransform) -> Result<()>;

    /// Returns the camera data of a camera object.
    fn camera_params(&self, handle: ObjectHandle) -> Option<CameraParams>;

    /// Replaces the camera data of a camera object.
    fn set_camera_params(&mut self, handle: ObjectHandle, params: CameraParams) -> Result<()>;

    /// Adds or replaces the orientation constraint of an object.
    fn set_orientation_constraint(
        &mut self,
        handle: ObjectHandle,
        constraint: OrientationConstraint,
    ) -> Result<()>;

    /// Returns the orientation constraint of an object.
    fn orientation_constraint(&self, handle: ObjectHandle) -> Option<OrientationConstraint>;

    /// Releases the camera data block owned by `handle`.
    ///
    /// Works after the object itself was deleted. Returns whether a block
    /// was released.
    fn remove_camera_data(&mut self, handle: ObjectHandle) -> bool;

    /// Render settings of the open scene.
    fn render_settings(&self) -> &RenderSettings;

    /// Mutable render settings of the open scene.
    fn render_settings_mut(&mut self) -> &mut RenderSettings;

    /// Path of the saved scene file, if the scene has been saved.
    fn scene_file(&self) -> Option<&Path>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_euler_matches_axis_rotations() {
        let m = euler_xyz_to_matrix(DVec3::new(0.0, 0.0, std::f64::consts::FRAC_PI_2));
        let v = m * DVec3::X;
        assert!((v - DVec3::Y).length() < 1e-12);

        // X is applied before Z.
        let m = euler_xyz_to_matrix(DVec3::new(
            std::f64::consts::FRAC_PI_2,
            0.0,
            std::f64::consts::FRAC_PI_2,
        ));
        let v = m * DVec3::Y;
        // Y -> Z under X, Z stays under Z.
        assert!((v - DVec3::Z).length() < 1e-12);
    }

    #[test]
    fn test_quat_roundtrip_through_euler() {
        let mut t = ObjectTransform::default();
        let angles = DVec3::new(0.3, -0.2, 1.1);
        let q = DQuat::from_mat3(&euler_xyz_to_matrix(angles));
        t.set_rotation_quat(q);
        assert!((t.rotation - angles).length() < 1e-9);
    }
}
