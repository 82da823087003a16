//! spherecam: camera placement on a sphere and dataset capture sessions for
//! 3D scene editors.
//!
//! A [`Controller`] sits between an editor panel and the editor's scene. It
//! keeps two proxy objects in the scene, a sphere and a camera orbiting it,
//! consistent with the panel in both directions, moves the camera for every
//! rendered frame, and runs capture sessions that temporarily change the
//! render settings and package the output afterwards.
//!
//! # Quick Start
//!
//! ```no_run
//! use spherecam::*;
//!
//! fn main() -> Result<()> {
//!     let mut props = Properties::default();
//!     props.capture.save_path = "/tmp/captures".into();
//!     let mut controller = Controller::new(MemoryScene::new(), props)?;
//!
//!     let output = controller.begin_capture(CaptureKind::CameraOnSphere)?;
//!     for frame in 1..=100 {
//!         controller.frame_changed(frame)?;
//!         // render the frame into `output`
//!     }
//!     let archive = controller.capture_completed()?;
//!     println!("{output:?} -> {archive:?}");
//!     Ok(())
//! }
//! ```
//!
//! # Host integration
//!
//! The host implements [`SceneStore`] and forwards its callbacks to the
//! controller. Callbacks never recurse: anything a callback triggers is
//! queued and handled after it returns, and the [`SyncGuard`] drops
//! notifications a sync pass caused itself.

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]

pub mod archive;
pub mod controller;
pub mod events;
pub mod proxy;
pub mod session;
pub mod sync;

pub use archive::{clean_name, package_and_remove, Archiver, ZipArchiver};
pub use controller::Controller;
pub use events::{
    CallbackRegistry, EventQueue, Handler, HostEvent, LifecycleEvent, Property,
    MAX_REENTRANCY_DEPTH,
};
pub use proxy::{orbit_pose, ProxyLoss, ProxyManager};
pub use session::{CaptureSession, SceneSnapshot, SessionMachine, SessionPhase, SessionState};
pub use sync::{PropertyChange, Suppression, SyncController, SyncDirection, SyncGuard, SyncStats};

// Re-export core types
pub use spherecam_core::{
    config::{
        CameraConfig, CameraOnSphereSettings, CaptureKind, CaptureSettings, OrientationMode,
        Properties, SphereConfig, StillFramesSettings, TimeCropSettings, Trajectory,
        TrajectoryMode,
    },
    error::{Result, SphereCamError},
    registry::MemoryScene,
    sampling::{sample_pose, CameraPose, FrameWindow},
    scene::{
        CameraParams, ObjectHandle, ObjectKind, ObjectTransform, OrientationConstraint, ProxyKind,
        RenderSettings, SceneStore,
    },
    DQuat, DVec3,
};
