//! # Goal module
//!
//! Types describing a move goal (a target position in the planar frame) and its outcome, along
//! with the [`GoalServer`] which executes goals on a worker thread.
//!
//! A goal runs until one of:
//!
//! - the robot converges on the target, giving [`GoalOutcome::Succeeded`],
//! - the goal is cancelled or preempted by a newer one, giving [`GoalOutcome::Preempted`],
//! - an error occurs, for example the pose source times out.
//!
//! In every case the last command sent for the goal is the full stop.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod server;
pub use server::*;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc
};

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

use crate::loc::Pose;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A target position in the planar frame.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub x_m: f64,
    pub y_m: f64
}

/// Flag used to request that a running goal is stopped.
///
/// Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

/// Progress of a goal, produced once per control cycle.
#[derive(Debug, Copy, Clone, Serialize)]
pub struct Feedback {
    /// Index of the cycle, starting at 1
    pub cycle: u64,

    /// Distance remaining to the target
    pub distance_m: f64,

    /// Heading error of the cycle, 0 on the converging cycle
    pub head_error_rad: f64,

    /// The pose the cycle was computed on
    pub pose: Pose
}

/// The result of a goal which did not fail.
#[derive(Debug, Copy, Clone, Serialize)]
pub struct GoalResult {
    pub outcome: GoalOutcome,

    /// Number of control cycles executed
    pub num_cycles: u64,

    /// Distance to the target on the last pose received, if any pose was received
    pub final_distance_m: Option<f64>,

    /// Last pose received
    pub final_pose: Option<Pose>
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// How a goal ended.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum GoalOutcome {
    /// The robot converged on the target and was stopped
    Succeeded,

    /// The goal was cancelled before convergence and the robot was stopped
    Preempted
}

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// Receiver of per-cycle goal feedback.
pub trait FeedbackSink {
    fn feedback(&mut self, feedback: Feedback);
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Target {
    pub fn new(x_m: f64, y_m: f64) -> Self {
        Self { x_m, y_m }
    }

    /// The target as a position vector.
    pub fn position_m(&self) -> Vector2<f64> {
        Vector2::new(self.x_m, self.y_m)
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.3} m, {:.3} m)", self.x_m, self.y_m)
    }
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

impl<F> FeedbackSink for F
where
    F: FnMut(Feedback)
{
    fn feedback(&mut self, feedback: Feedback) {
        self(feedback)
    }
}
