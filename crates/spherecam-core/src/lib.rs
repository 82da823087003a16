//! Core abstractions for spherecam.
//!
//! This crate provides the pieces of spherecam that do not depend on the
//! controller's lifecycle:
//! - [`Properties`] and the sphere / camera / trajectory configuration
//! - the [`SceneStore`] trait the host editor implements, and an in-memory
//!   [`MemoryScene`]
//! - [`sample_pose`], mapping a frame index to a camera pose on the sphere

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
// Builder patterns return Self which doesn't need must_use
#![allow(clippy::must_use_candidate)]
// Property structs legitimately have many boolean flags
#![allow(clippy::struct_excessive_bools)]

pub mod config;
pub mod error;
pub mod registry;
pub mod sampling;
pub mod scene;

pub use config::{
    CameraConfig, CameraOnSphereSettings, CaptureKind, CaptureSettings, OrientationMode,
    Properties, SphereConfig, StillFramesSettings, TimeCropSettings, Trajectory, TrajectoryMode,
};
pub use error::{Result, SphereCamError};
pub use registry::{MemoryScene, SceneObject};
pub use sampling::{sample_pose, CameraPose, FrameWindow};
pub use scene::{
    CameraParams, ObjectHandle, ObjectKind, ObjectTransform, OrientationConstraint, ProxyKind,
    RenderSettings, SceneStore,
};

// Re-export glam types for convenience
pub use glam::{DQuat, DVec3};
