//! Camera pose sampling on a bounding sphere.
//!
//! [`sample_pose`] maps a frame index to a camera position on the (possibly
//! scaled and rotated) sphere and a forward direction relative to its center.
//! Random sampling is seeded per frame so re-rendering a frame reproduces its
//! pose regardless of any other random state.

use std::f64::consts::{FRAC_PI_2, FRAC_PI_6, PI, TAU};

use glam::{DMat3, DQuat, DVec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::{OrientationMode, SphereConfig, Trajectory, TrajectoryMode};
use crate::scene::euler_xyz_to_matrix;

/// Multiplier applied to the user seed.
pub const SEED_MULTIPLIER: u64 = 2_654_435_761;
/// Multiplier applied to the frame index.
pub const FRAME_MULTIPLIER: u64 = 805_459_861;

/// Full turns the sequential spiral makes across a session.
const SPIRAL_TURNS: f64 = 1.5;
/// Peak polar deviation from the horizon on the full-sphere spiral.
const SPIRAL_POLAR_AMPLITUDE: f64 = PI * 0.3 * 0.5;

/// Frame information a pose is sampled for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameWindow {
    /// The frame being rendered.
    pub frame_index: i64,
    /// First frame of the capture.
    pub frame_start: i64,
    /// Number of frames in the capture, at least 1.
    pub total_frames: u32,
}

/// A sampled camera placement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraPose {
    /// World-space camera position.
    pub position: DVec3,
    /// Unit direction the camera looks along.
    pub forward: DVec3,
}

impl CameraPose {
    /// Rotation aiming the camera's local -Z axis along `forward`, with local +Y
    /// kept as close to world up (+Z) as possible.
    #[must_use]
    pub fn rotation(&self) -> DQuat {
        let Some(forward) = self.forward.try_normalize() else {
            return DQuat::IDENTITY;
        };
        let mut right = forward.cross(DVec3::Z);
        if right.length_squared() < 1e-12 {
            // Looking straight up or down.
            right = DVec3::X;
        }
        let right = right.normalize();
        let up = right.cross(forward).normalize();
        DQuat::from_mat3(&DMat3::from_cols(right, up, -forward))
    }
}

/// Derives the per-frame seed from the user seed and the frame index.
#[must_use]
pub fn frame_seed(seed: u64, frame_index: i64) -> u64 {
    #[allow(clippy::cast_sign_loss)]
    let frame = frame_index.wrapping_add(1) as u64;
    SEED_MULTIPLIER.wrapping_mul(seed.wrapping_add(1)) ^ FRAME_MULTIPLIER.wrapping_mul(frame)
}

/// Spherical angles `(theta, phi)` for a frame.
///
/// `theta` is the azimuth, `phi` the polar angle measured from +Z.
#[must_use]
pub fn sample_angles(window: FrameWindow, trajectory: &TrajectoryMode) -> (f64, f64) {
    match trajectory.trajectory {
        Trajectory::RandomPerFrame => {
            let mut rng = StdRng::seed_from_u64(frame_seed(trajectory.seed, window.frame_index));
            let u: f64 = rng.gen();
            let v: f64 = rng.gen();
            // arccos keeps the density uniform over the surface area
            (TAU * u, (1.0 - 2.0 * v).acos())
        }
        Trajectory::SequentialSpiral => {
            let progress = spiral_progress(window);
            let theta = progress * TAU * SPIRAL_TURNS;
            let phi = if trajectory.upper_hemisphere_only {
                FRAC_PI_2 - progress * (FRAC_PI_2 - FRAC_PI_6)
            } else {
                FRAC_PI_2 + (progress * TAU).sin() * SPIRAL_POLAR_AMPLITUDE
            };
            (theta, phi)
        }
    }
}

/// Position of a frame within the capture, in `[0, 1]`.
fn spiral_progress(window: FrameWindow) -> f64 {
    let last = i64::from(window.total_frames.max(1)) - 1;
    let index = (window.frame_index - window.frame_start).clamp(0, last);
    #[allow(clippy::cast_precision_loss)]
    let progress = index as f64 / last.max(1) as f64;
    progress
}

/// Unit vector for spherical angles, folded onto the upper half if requested.
#[must_use]
pub fn unit_direction(theta: f64, phi: f64, upper_hemisphere_only: bool) -> DVec3 {
    let (sin_theta, cos_theta) = theta.sin_cos();
    let (sin_phi, cos_phi) = phi.sin_cos();
    let z = if upper_hemisphere_only {
        cos_phi.abs()
    } else {
        cos_phi
    };
    DVec3::new(cos_theta * sin_phi, sin_theta * sin_phi, z)
}

/// Maps a unit-sphere direction onto the configured ellipsoid in world space.
#[must_use]
pub fn place_on_sphere(unit: DVec3, sphere: &SphereConfig) -> DVec3 {
    let local = sphere.radius * sphere.scale * unit;
    sphere.center + euler_xyz_to_matrix(sphere.rotation) * local
}

/// Direction a camera at `position` looks for the given orientation mode.
#[must_use]
pub fn forward_direction(position: DVec3, center: DVec3, mode: OrientationMode) -> DVec3 {
    let inward = (center - position).normalize_or_zero();
    match mode {
        OrientationMode::Inward => inward,
        OrientationMode::Outward => -inward,
    }
}

/// Samples the camera pose for a frame.
#[must_use]
pub fn sample_pose(
    window: FrameWindow,
    sphere: &SphereConfig,
    trajectory: &TrajectoryMode,
    orientation: OrientationMode,
) -> CameraPose {
    let (theta, phi) = sample_angles(window, trajectory);
    let unit = unit_direction(theta, phi, trajectory.upper_hemisphere_only);
    let position = place_on_sphere(unit, sphere);
    CameraPose {
        position,
        forward: forward_direction(position, sphere.center, orientation),
    }
}
