//! Motion control parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};

// Internal
use crate::heading::BearingPolicy;
use super::MoveCtrlError;
use util::time::seconds_to_std;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for motion control
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Params {

    /// Heading controller proportional gain
    pub k_p: f64,

    /// Forward speed held while approaching the target
    pub base_linear_speed_ms: f64,

    /// Distance from the target within which the goal is converged
    pub distance_tolerance_m: f64,

    /// Minimum period of a control cycle. A cycle which completes early sleeps off the
    /// remainder, 0 disables pacing so the rate is set by the pose source alone.
    pub cycle_period_s: f64,

    /// Maximum time to wait for a new pose before the goal fails.
    pub pose_timeout_s: f64,

    /// Method used to compute the bearing to the target
    #[serde(default)]
    pub bearing_policy: BearingPolicy,

    /// If true the heading error is wrapped into [-pi, pi) before the gain is applied, so the
    /// robot always turns the short way round. Off by default, the heading error is then the
    /// plain difference between bearing and yaw.
    #[serde(default)]
    pub wrap_head_error: bool,

    /// Symmetric limit on the angular rate demand. Infinite if not given.
    #[serde(default = "default_max_ang_rate_rads")]
    pub max_ang_rate_rads: f64
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Params {
    /// Check that the parameters describe a controller which can converge.
    pub fn validate(&self) -> Result<(), MoveCtrlError> {
        if !self.k_p.is_finite() {
            return Err(MoveCtrlError::InvalidParams(
                format!("k_p must be finite, found {}", self.k_p)
            ))
        }
        if !(self.base_linear_speed_ms.is_finite() && self.base_linear_speed_ms >= 0.0) {
            return Err(MoveCtrlError::InvalidParams(format!(
                "base_linear_speed_ms must be finite and non-negative, found {}",
                self.base_linear_speed_ms
            )))
        }
        if !(self.distance_tolerance_m.is_finite() && self.distance_tolerance_m > 0.0) {
            return Err(MoveCtrlError::InvalidParams(format!(
                "distance_tolerance_m must be finite and positive, found {}",
                self.distance_tolerance_m
            )))
        }
        if seconds_to_std(self.cycle_period_s).is_none() {
            return Err(MoveCtrlError::InvalidParams(format!(
                "cycle_period_s must be a finite, non-negative duration, found {}",
                self.cycle_period_s
            )))
        }
        if seconds_to_std(self.pose_timeout_s).is_none() || self.pose_timeout_s <= 0.0 {
            return Err(MoveCtrlError::InvalidParams(format!(
                "pose_timeout_s must be a finite, positive duration, found {}",
                self.pose_timeout_s
            )))
        }
        if self.max_ang_rate_rads.is_nan() || self.max_ang_rate_rads <= 0.0 {
            return Err(MoveCtrlError::InvalidParams(format!(
                "max_ang_rate_rads must be positive, found {}",
                self.max_ang_rate_rads
            )))
        }

        Ok(())
    }
}

impl Default for Params {
    fn default() -> Self {
        Self {
            k_p: 0.5,
            base_linear_speed_ms: 0.15,
            distance_tolerance_m: 0.1,
            cycle_period_s: 0.15,
            pose_timeout_s: 1.0,
            bearing_policy: BearingPolicy::Exact,
            wrap_head_error: false,
            max_ang_rate_rads: default_max_ang_rate_rads()
        }
    }
}

fn default_max_ang_rate_rads() -> f64 {
    f64::INFINITY
}
