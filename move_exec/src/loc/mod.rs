//! # Localisation module
//!
//! This module provides the pose of the robot to the rest of the software. Poses are produced by
//! an external localisation or odometry source and published into a [`PoseSlot`], which only ever
//! holds the latest sample. Consumers sample the slot through the [`PoseSource`] trait, which
//! blocks until a pose newer than the last one they consumed is available, or until the caller's
//! timeout elapses.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod slot;
pub use slot::*;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::time::Duration;

use nalgebra::{UnitQuaternion, Vector2};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The current pose (planar position and yaw) of the robot.
///
/// Position and yaw are expressed in the same fixed planar frame as the targets given to the
/// robot.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Pose {

    /// The position in the planar frame
    pub position_m: Vector2<f64>,

    /// The yaw (angle to the positive X axis, counter-clockwise positive) in radians
    pub yaw_rad: f64
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors which can occur while sampling the pose.
#[derive(Debug, thiserror::Error)]
pub enum LocError {
    #[error("No new pose was received within {0:?}")]
    Timeout(Duration),

    #[error("The pose source has been closed")]
    SourceClosed,

    #[error("The pose slot lock was poisoned")]
    Poisoned
}

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// A source of robot poses.
pub trait PoseSource {
    /// Block until a new pose is available and return the freshest one.
    ///
    /// If no new pose arrives within `timeout` a [`LocError::Timeout`] is returned.
    fn sample(&mut self, timeout: Duration) -> Result<Pose, LocError>;
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Pose {
    /// Create a new pose from its components.
    pub fn new(x_m: f64, y_m: f64, yaw_rad: f64) -> Self {
        Self {
            position_m: Vector2::new(x_m, y_m),
            yaw_rad
        }
    }

    /// Create a planar pose from a position and a full 3D attitude, as given by odometry sources.
    ///
    /// Only the yaw (rotation about Z) of the attitude is kept, roll and pitch are dropped.
    pub fn from_quaternion(x_m: f64, y_m: f64, attitude: &UnitQuaternion<f64>) -> Self {
        let (_, _, yaw_rad) = attitude.euler_angles();
        Self::new(x_m, y_m, yaw_rad)
    }

    /// True if every component of the pose is finite.
    pub fn is_finite(&self) -> bool {
        self.position_m.iter().all(|v| v.is_finite()) && self.yaw_rad.is_finite()
    }
}

impl std::fmt::Display for Pose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "(x: {:.3} m, y: {:.3} m, yaw: {:.3} rad)",
            self.position_m[0], self.position_m[1], self.yaw_rad
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_pose_finite() {
        assert!(Pose::new(1.0, 2.0, 0.5).is_finite());
        assert!(!Pose::new(f64::NAN, 2.0, 0.5).is_finite());
        assert!(!Pose::new(1.0, 2.0, f64::INFINITY).is_finite());
    }

    #[test]
    fn test_from_quaternion() {
        let p = Pose::from_quaternion(1.0, 2.0, &UnitQuaternion::from_euler_angles(0.0, 0.0, 0.7));
        assert_eq!(p.position_m, Vector2::new(1.0, 2.0));
        assert_abs_diff_eq!(p.yaw_rad, 0.7, epsilon = 1e-12);

        // Roll and pitch do not leak into the yaw
        let p = Pose::from_quaternion(0.0, 0.0, &UnitQuaternion::from_euler_angles(0.3, -0.2, -2.5));
        assert_abs_diff_eq!(p.yaw_rad, -2.5, epsilon = 1e-12);

        let p = Pose::from_quaternion(0.0, 0.0, &UnitQuaternion::identity());
        assert_abs_diff_eq!(p.yaw_rad, 0.0);

        let p = Pose::from_quaternion(
            0.0, 0.0, &UnitQuaternion::from_axis_angle(&nalgebra::Vector3::z_axis(), FRAC_PI_2)
        );
        assert_abs_diff_eq!(p.yaw_rad, FRAC_PI_2, epsilon = 1e-12);
    }

    #[test]
    fn test_display() {
        assert_eq!(
            format!("{}", Pose::new(1.0, -2.5, 0.25)),
            "(x: 1.000 m, y: -2.500 m, yaw: 0.250 rad)"
        );
    }
}
