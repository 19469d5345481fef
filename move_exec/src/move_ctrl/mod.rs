//! # Motion control module
//!
//! Motion control drives the robot in a straight line to a single target and stops it there.
//! Each control cycle takes a freshly sampled pose and:
//!
//! 1. Computes the distance remaining to the target. If it is within the distance tolerance the
//!    goal has converged and a stop command is issued instead of a motion command.
//! 2. Computes the bearing to the target with the heading solver, and the heading error between
//!    that bearing and the robot's yaw.
//! 3. Multiplies the heading error by the proportional gain to get the angular rate demand, while
//!    the linear speed demand is held at a fixed base speed.
//!
//! The module is a small state machine, see [`MoveCtrlMode`]. [`MoveCtrl::proc`] runs a single
//! cycle on a pose given by the caller, while [`MoveCtrl::run_goal`] runs a whole goal against a
//! [`PoseSource`](crate::loc::PoseSource) and a [`CommandSink`].

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod cmd;
mod episode;
mod params;
mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
pub use cmd::*;
pub use params::Params;
pub use state::*;

use crate::{heading::HeadingError, loc::LocError};

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors that can occur during MoveCtrl operation.
#[derive(Debug, thiserror::Error)]
pub enum MoveCtrlError {
    #[error("Could not load parameters: {0}")]
    ParamLoadError(util::params::LoadError),

    #[error("Invalid parameter: {0}")]
    InvalidParams(String),

    /// A goal is already being executed. It must finish or be aborted before a new one is begun.
    #[error("Attempted to begin a goal while one is already active")]
    GoalAlreadyActive,

    /// The target contains a non-finite coordinate.
    #[error("Invalid target ({0}, {1})")]
    InvalidTarget(f64, f64),

    /// The module is approaching but no target has been set.
    #[error("No target has been set")]
    NoTarget,

    /// Attempted to control motion when the pose is not known.
    #[error("No pose has been set")]
    NoPose,

    #[error("Received a non-finite pose")]
    InvalidPose,

    #[error("Degenerate geometry, cannot compute bearing to target: {0}")]
    DegenerateGeometry(HeadingError),

    #[error("Pose sampling failed: {0}")]
    PoseUnavailable(LocError)
}

impl From<LocError> for MoveCtrlError {
    fn from(e: LocError) -> Self {
        MoveCtrlError::PoseUnavailable(e)
    }
}

impl MoveCtrlError {
    /// True if the error is a pose timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, MoveCtrlError::PoseUnavailable(LocError::Timeout(_)))
    }
}
