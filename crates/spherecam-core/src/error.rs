//! Error types for spherecam.

use std::path::PathBuf;

use thiserror::Error;

use crate::config::CaptureKind;
use crate::scene::{ObjectHandle, ProxyKind};

/// The main error type for spherecam operations.
#[derive(Error, Debug)]
pub enum SphereCamError {
    /// A capture session was started while another one is still active.
    #[error("a {0} capture session is already active")]
    SessionAlreadyActive(CaptureKind),

    /// A proxy object that an operation depends on is not present.
    #[error("{0} proxy does not exist")]
    MissingProxy(ProxyKind),

    /// A scene object referenced by handle is gone from the store.
    #[error("scene object {0} not found")]
    ObjectNotFound(ObjectHandle),

    /// Sphere geometry that would collapse every sampled point.
    #[error("degenerate sphere geometry: {0}")]
    DegenerateGeometry(String),

    /// A configuration value outside its allowed range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Packaging a capture output directory failed. The directory is kept.
    #[error("failed to archive '{}': {reason}", dir.display())]
    ArchiveFailed { dir: PathBuf, reason: String },

    /// A chain of reentrant notifications grew past the allowed depth.
    #[error("event chain exceeded maximum reentrancy depth {depth}")]
    ReentrancyLimit { depth: usize },

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// A specialized Result type for spherecam operations.
pub type Result<T> = std::result::Result<T, SphereCamError>;
