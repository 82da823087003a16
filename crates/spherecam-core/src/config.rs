//! UI-facing configuration.
//!
//! [`Properties`] is the numeric surface the host panel exposes. It is the
//! "UI side" of the two-way binding with the proxy objects and it is what
//! capture sessions read their dataset names and frame counts from.

use std::fmt;
use std::path::{Path, PathBuf};

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SphereCamError};
use crate::scene::{CameraParams, ObjectTransform};

/// Direction the orbiting camera faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrientationMode {
    /// Looks at the sphere center.
    #[default]
    Inward,
    /// Looks away from the sphere center.
    Outward,
}

/// Bounding sphere (or ellipsoid) the camera is placed on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SphereConfig {
    /// Sphere center in world space.
    pub center: DVec3,
    /// XYZ Euler rotation in radians.
    pub rotation: DVec3,
    /// Per-axis scale; unequal values give an ellipsoid.
    pub scale: DVec3,
    /// Radius before scaling.
    pub radius: f64,
}

impl Default for SphereConfig {
    fn default() -> Self {
        Self {
            center: DVec3::ZERO,
            rotation: DVec3::ZERO,
            scale: DVec3::ONE,
            radius: 4.0,
        }
    }
}

impl SphereConfig {
    /// Checks that sampled points cannot all collapse onto the center.
    pub fn validate(&self) -> Result<()> {
        if !self.radius.is_finite() || self.radius <= 0.0 {
            return Err(SphereCamError::DegenerateGeometry(format!(
                "radius must be positive, got {}",
                self.radius
            )));
        }
        if !self.scale.is_finite() || self.scale.cmpeq(DVec3::ZERO).any() {
            return Err(SphereCamError::DegenerateGeometry(format!(
                "scale axes must be non-zero, got {}",
                self.scale
            )));
        }
        if !self.center.is_finite() || !self.rotation.is_finite() {
            return Err(SphereCamError::InvalidConfig(
                "sphere center and rotation must be finite".to_string(),
            ));
        }
        Ok(())
    }

    /// Placement of the sphere proxy for this configuration.
    #[must_use]
    pub fn to_transform(&self) -> ObjectTransform {
        ObjectTransform {
            location: self.center,
            rotation: self.rotation,
            scale: self.scale,
            display_size: self.radius,
        }
    }

    /// Reads the configuration back from a sphere proxy placement.
    #[must_use]
    pub fn from_transform(transform: &ObjectTransform) -> Self {
        Self {
            center: transform.location,
            rotation: transform.rotation,
            scale: transform.scale,
            radius: transform.display_size,
        }
    }
}

/// Settings of the orbiting camera.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Focal length in millimetres.
    pub focal_length: f64,
    pub orientation: OrientationMode,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            focal_length: 50.0,
            orientation: OrientationMode::Inward,
        }
    }
}

impl CameraConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.focal_length.is_finite() || self.focal_length <= 0.0 {
            return Err(SphereCamError::InvalidConfig(format!(
                "focal length must be positive, got {}",
                self.focal_length
            )));
        }
        Ok(())
    }

    /// Camera data block contents for this configuration.
    #[must_use]
    pub fn to_params(&self) -> CameraParams {
        CameraParams {
            focal_length: self.focal_length,
        }
    }
}

/// Algorithm used to place the camera at each frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Trajectory {
    /// Independent uniform sample on the sphere for every frame.
    #[default]
    RandomPerFrame,
    /// Deterministic 1.5-turn spiral sweep across the session.
    SequentialSpiral,
}

/// Trajectory selection plus its sampling options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TrajectoryMode {
    pub trajectory: Trajectory,
    /// Keep every sample on the upper half of the sphere.
    pub upper_hemisphere_only: bool,
    /// Seed for [`Trajectory::RandomPerFrame`].
    pub seed: u64,
}

/// The capture methods a session can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CaptureKind {
    /// Renders a subset of frames by widening the frame step.
    StillFrames,
    /// Renders a cropped range of frames by moving the frame end.
    TimeCrop,
    /// Renders from a camera re-placed on the sphere every frame.
    CameraOnSphere,
}

impl CaptureKind {
    /// All capture kinds.
    pub const ALL: [CaptureKind; 3] = [
        CaptureKind::StillFrames,
        CaptureKind::TimeCrop,
        CaptureKind::CameraOnSphere,
    ];

    /// Whether sessions of this kind move the camera between frames.
    #[must_use]
    pub fn moves_camera(self) -> bool {
        matches!(self, CaptureKind::CameraOnSphere)
    }
}

impl fmt::Display for CaptureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureKind::StillFrames => f.write_str("still-frames"),
            CaptureKind::TimeCrop => f.write_str("time-crop"),
            CaptureKind::CameraOnSphere => f.write_str("camera-on-sphere"),
        }
    }
}

/// Settings of a [`CaptureKind::StillFrames`] session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StillFramesSettings {
    pub dataset_name: String,
    /// Frame step used while capturing.
    pub frame_step: i64,
}

impl Default for StillFramesSettings {
    fn default() -> Self {
        Self {
            dataset_name: "dataset".to_string(),
            frame_step: 3,
        }
    }
}

/// Settings of a [`CaptureKind::TimeCrop`] session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeCropSettings {
    pub dataset_name: String,
    /// Number of frames captured from the frame start.
    pub frame_count: u32,
}

impl Default for TimeCropSettings {
    fn default() -> Self {
        Self {
            dataset_name: "dataset".to_string(),
            frame_count: 100,
        }
    }
}

/// Settings of a [`CaptureKind::CameraOnSphere`] session.
///
/// The number of frames is [`Properties::orbit_frames`], which the sequential
/// trajectory also uses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraOnSphereSettings {
    pub dataset_name: String,
}

impl Default for CameraOnSphereSettings {
    fn default() -> Self {
        Self {
            dataset_name: "dataset".to_string(),
        }
    }
}

/// Where capture output goes and how each capture kind is configured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CaptureSettings {
    /// Directory that receives the dataset archives.
    pub save_path: PathBuf,
    pub still_frames: StillFramesSettings,
    pub time_crop: TimeCropSettings,
    pub camera_on_sphere: CameraOnSphereSettings,
}

impl CaptureSettings {
    /// Dataset name configured for a capture kind.
    #[must_use]
    pub fn dataset_name(&self, kind: CaptureKind) -> &str {
        match kind {
            CaptureKind::StillFrames => &self.still_frames.dataset_name,
            CaptureKind::TimeCrop => &self.time_crop.dataset_name,
            CaptureKind::CameraOnSphere => &self.camera_on_sphere.dataset_name,
        }
    }
}

/// Every value the host panel exposes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Properties {
    pub sphere: SphereConfig,
    pub camera: CameraConfig,
    pub trajectory: TrajectoryMode,
    /// Frames in a camera-on-sphere capture.
    pub orbit_frames: u32,
    /// Whether the sphere proxy should be shown.
    pub show_sphere: bool,
    /// Whether the camera proxy should be shown.
    pub show_camera: bool,
    pub capture: CaptureSettings,
}

impl Default for Properties {
    fn default() -> Self {
        Self {
            sphere: SphereConfig::default(),
            camera: CameraConfig::default(),
            trajectory: TrajectoryMode::default(),
            orbit_frames: 100,
            show_sphere: false,
            show_camera: false,
            capture: CaptureSettings::default(),
        }
    }
}

impl Properties {
    /// Checks every constraint of the configuration surface.
    pub fn validate(&self) -> Result<()> {
        self.sphere.validate()?;
        self.camera.validate()?;
        if self.orbit_frames == 0 {
            return Err(SphereCamError::InvalidConfig(
                "orbit frame count must be at least 1".to_string(),
            ));
        }
        if self.capture.still_frames.frame_step < 1 {
            return Err(SphereCamError::InvalidConfig(format!(
                "still-frames step must be at least 1, got {}",
                self.capture.still_frames.frame_step
            )));
        }
        if self.capture.time_crop.frame_count == 0 {
            return Err(SphereCamError::InvalidConfig(
                "time-crop frame count must be at least 1".to_string(),
            ));
        }
        for kind in CaptureKind::ALL {
            if self.capture.dataset_name(kind).trim().is_empty() {
                return Err(SphereCamError::InvalidConfig(format!(
                    "{kind} dataset name is empty"
                )));
            }
        }
        Ok(())
    }

    /// Parses and validates properties from JSON.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let props: Self = serde_json::from_str(json)?;
        props.validate()?;
        Ok(props)
    }

    /// Loads properties from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let props = Self::from_json_str(&text)?;
        log::debug!("loaded properties from {}", path.as_ref().display());
        Ok(props)
    }

    /// Writes properties to a JSON file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), text)?;
        Ok(())
    }
}
