//! # Heading solver
//!
//! Computes the bearing (absolute angle in the planar frame, counter-clockwise from the positive X
//! axis) from the robot's current position to a target position.
//!
//! Two policies are provided:
//!
//! - [`BearingPolicy::Exact`] uses the four-quadrant arctangent and returns a bearing in
//!   `[-pi, pi]`. This is the policy used for driving.
//! - [`BearingPolicy::Legacy`] reproduces the slope-based arctangent with a half-turn quadrant
//!   correction used by older move servers, including their `3.14` approximation of pi. It exists
//!   so logs from those servers can be compared against this one.
//!
//! Both policies classify a target coincident with the current position as degenerate, and both
//! special-case a target directly along the Y axis (`dx == 0`) to `+/- pi/2` rather than dividing
//! by zero.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::f64::consts::FRAC_PI_2;

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Half-turn constant used by the legacy policy.
pub const LEGACY_HALF_TURN_RAD: f64 = 3.14;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// The method used to compute the bearing.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BearingPolicy {
    /// Four-quadrant arctangent, result in `[-pi, pi]`.
    Exact,

    /// Slope arctangent with half-turn quadrant and range correction, result in `(-3.14, 3.14]`.
    Legacy
}

/// Inputs for which no bearing can be computed.
#[derive(Debug, Copy, Clone, PartialEq, thiserror::Error)]
pub enum HeadingError {
    #[error("The target coincides with the current position, the bearing is undefined")]
    Coincident,

    #[error("Non-finite position component (dx = {dx}, dy = {dy})")]
    NonFinite {
        dx: f64,
        dy: f64
    }
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for BearingPolicy {
    fn default() -> Self {
        BearingPolicy::Exact
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Compute the bearing from `current` to `target` using the given policy.
pub fn bearing_to(
    current: &Vector2<f64>,
    target: &Vector2<f64>,
    policy: BearingPolicy
) -> Result<f64, HeadingError> {
    let dx = target[0] - current[0];
    let dy = target[1] - current[1];

    if !dx.is_finite() || !dy.is_finite() {
        return Err(HeadingError::NonFinite { dx, dy })
    }

    // Degenerate and vertical cases are shared by both policies
    if dx == 0.0 {
        return if dy > 0.0 {
            Ok(FRAC_PI_2)
        }
        else if dy < 0.0 {
            Ok(-FRAC_PI_2)
        }
        else {
            Err(HeadingError::Coincident)
        }
    }

    Ok(match policy {
        BearingPolicy::Exact => dy.atan2(dx),
        BearingPolicy::Legacy => legacy_bearing(dx, dy)
    })
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Slope-based bearing. `dx` must be non-zero.
fn legacy_bearing(dx: f64, dy: f64) -> f64 {
    let mut bearing_rad = (dy / dx).atan();

    // The one-argument arctangent only covers half a turn, shift targets behind the robot into
    // the other half.
    if dx <= 0.0 {
        if dy >= 0.0 {
            bearing_rad += LEGACY_HALF_TURN_RAD;
        }
        else {
            bearing_rad -= LEGACY_HALF_TURN_RAD;
        }
    }

    // Range correction by a half turn, not a full one
    if bearing_rad > LEGACY_HALF_TURN_RAD {
        bearing_rad -= LEGACY_HALF_TURN_RAD;
    }
    else if bearing_rad < -LEGACY_HALF_TURN_RAD {
        bearing_rad += LEGACY_HALF_TURN_RAD;
    }

    bearing_rad
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::PI;

    fn exact(x: f64, y: f64) -> Result<f64, HeadingError> {
        bearing_to(&Vector2::zeros(), &Vector2::new(x, y), BearingPolicy::Exact)
    }

    fn legacy(x: f64, y: f64) -> Result<f64, HeadingError> {
        bearing_to(&Vector2::zeros(), &Vector2::new(x, y), BearingPolicy::Legacy)
    }

    #[test]
    fn test_straight_ahead() {
        assert_abs_diff_eq!(exact(10.0, 0.0).unwrap(), 0.0);
        assert_abs_diff_eq!(legacy(10.0, 0.0).unwrap(), 0.0);
    }

    #[test]
    fn test_vertical_approach() {
        assert_abs_diff_eq!(exact(0.0, 10.0).unwrap(), FRAC_PI_2);
        assert_abs_diff_eq!(exact(0.0, -10.0).unwrap(), -FRAC_PI_2);
        assert_abs_diff_eq!(legacy(0.0, 10.0).unwrap(), FRAC_PI_2);
        assert_abs_diff_eq!(legacy(0.0, -10.0).unwrap(), -FRAC_PI_2);
    }

    #[test]
    fn test_directly_behind() {
        // The exact policy gives pi, the legacy policy its 3.14 approximation, which is how the
        // two are told apart.
        assert_abs_diff_eq!(exact(-10.0, 0.0).unwrap(), PI);
        assert_abs_diff_eq!(legacy(-10.0, 0.0).unwrap(), LEGACY_HALF_TURN_RAD);
        assert!((exact(-10.0, 0.0).unwrap() - legacy(-10.0, 0.0).unwrap()).abs() > 1e-3);
    }

    #[test]
    fn test_rear_quadrants() {
        assert_abs_diff_eq!(exact(-1.0, 1.0).unwrap(), 3.0 * PI / 4.0, epsilon = 1e-12);
        assert_abs_diff_eq!(exact(-1.0, -1.0).unwrap(), -3.0 * PI / 4.0, epsilon = 1e-12);

        assert_abs_diff_eq!(
            legacy(-1.0, 1.0).unwrap(),
            LEGACY_HALF_TURN_RAD - PI / 4.0,
            epsilon = 1e-12
        );
        assert_abs_diff_eq!(
            legacy(-1.0, -1.0).unwrap(),
            PI / 4.0 - LEGACY_HALF_TURN_RAD,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_front_quadrants_agree() {
        for &(x, y) in &[(1.0, 1.0), (1.0, -1.0), (3.0, 0.5), (0.2, -4.0)] {
            assert_abs_diff_eq!(exact(x, y).unwrap(), legacy(x, y).unwrap(), epsilon = 1e-12);
        }
    }

    #[test]
    fn test_exact_range() {
        let n = 24;
        for i in 0..n {
            let a = (i as f64) * 2.0 * PI / (n as f64);
            let (x, y) = (5.0 * a.cos(), 5.0 * a.sin());
            let b = exact(x, y).unwrap();
            assert!(b >= -PI && b <= PI, "bearing {} out of range", b);
        }
    }

    #[test]
    fn test_legacy_range() {
        let n = 24;
        let around = (0..n).map(|i| {
            let a = (i as f64) * 2.0 * PI / (n as f64);
            (5.0 * a.cos(), 5.0 * a.sin())
        });
        let edges = vec![(0.0, 5.0), (0.0, -5.0), (-5.0, 0.0), (-5.0, 1e-9), (-5.0, -1e-9)];

        for (x, y) in around.chain(edges) {
            let b = legacy(x, y).unwrap();
            assert!(
                b > -LEGACY_HALF_TURN_RAD && b <= LEGACY_HALF_TURN_RAD,
                "bearing {} to ({}, {}) out of range", b, x, y
            );
        }
    }

    #[test]
    fn test_offset_current_position() {
        let b = bearing_to(
            &Vector2::new(1.0, 1.0),
            &Vector2::new(2.0, 2.0),
            BearingPolicy::Exact
        ).unwrap();
        assert_abs_diff_eq!(b, PI / 4.0, epsilon = 1e-12);
    }

    #[test]
    fn test_degenerate() {
        assert_eq!(exact(0.0, 0.0), Err(HeadingError::Coincident));
        assert_eq!(legacy(0.0, 0.0), Err(HeadingError::Coincident));

        let p = Vector2::new(2.5, -1.0);
        assert_eq!(
            bearing_to(&p, &p, BearingPolicy::Exact),
            Err(HeadingError::Coincident)
        );

        assert!(matches!(exact(f64::NAN, 1.0), Err(HeadingError::NonFinite { .. })));
    }
}
