//! Execution of a whole goal against a pose source and command sink

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::time::{Duration, Instant};

use log::{info, warn};

use super::*;
use crate::{
    goal::{CancelToken, Feedback, FeedbackSink, GoalOutcome, GoalResult, Target},
    loc::{Pose, PoseSource}
};
use util::{module::State, time::seconds_to_std};

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl MoveCtrl {

    /// Drive the robot to `target`, blocking until the goal ends.
    ///
    /// Every cycle a fresh pose is sampled from `source` (waiting at most `pose_timeout_s`), the
    /// cycle is processed and any command produced is sent to `sink`. Cycles are paced to last at
    /// least `cycle_period_s`.
    ///
    /// The goal ends when the robot converges (`Succeeded`), when `cancel` is set (`Preempted`), or
    /// on error. However it ends the full stop is the last command sent to `sink`.
    pub fn run_goal<S, K, F>(
        &mut self,
        target: Target,
        source: &mut S,
        sink: &mut K,
        cancel: &CancelToken,
        feedback: &mut F
    ) -> Result<GoalResult, MoveCtrlError>
    where
        S: PoseSource,
        K: CommandSink,
        F: FeedbackSink
    {
        let pose_timeout = seconds_to_std(self.params().pose_timeout_s)
            .ok_or_else(|| MoveCtrlError::InvalidParams("pose_timeout_s".into()))?;
        let cycle_period = seconds_to_std(self.params().cycle_period_s)
            .ok_or_else(|| MoveCtrlError::InvalidParams("cycle_period_s".into()))?;

        self.begin_goal(target)?;
        info!("Starting goal to {}", target);

        let mut final_pose: Option<Pose> = None;
        let mut final_distance_m: Option<f64> = None;

        loop {
            let cycle_start = Instant::now();

            if cancel.is_cancelled() {
                return Ok(self.preempt(sink, final_pose, final_distance_m))
            }

            // ---- POSE SAMPLING ----

            let pose = match source.sample(pose_timeout) {
                Ok(p) => p,
                Err(e) => {
                    self.fail(sink);
                    return Err(e.into())
                }
            };

            // The sample may have blocked for a while, so don't act on a cancelled goal
            if cancel.is_cancelled() {
                return Ok(self.preempt(sink, final_pose, final_distance_m))
            }

            // ---- CONTROL ----

            let (cmd, report) = match self.proc(&pose) {
                Ok(o) => o,
                Err(e) => {
                    self.fail(sink);
                    return Err(e)
                }
            };

            if let Some(cmd) = cmd {
                sink.send(cmd);
            }

            final_pose = Some(pose);
            final_distance_m = Some(report.distance_m);

            feedback.feedback(Feedback {
                cycle: self.num_goal_cycles(),
                distance_m: report.distance_m,
                head_error_rad: report.head_error_rad,
                pose
            });

            if report.stopped {
                return Ok(GoalResult {
                    outcome: GoalOutcome::Succeeded,
                    num_cycles: self.num_goal_cycles(),
                    final_distance_m,
                    final_pose
                })
            }

            // ---- PACING ----

            if let Some(remaining) = cycle_period.checked_sub(cycle_start.elapsed()) {
                if remaining > Duration::from_millis(0) {
                    std::thread::sleep(remaining);
                }
            }
        }
    }

    /// Abort the goal as preempted, sending the stop.
    fn preempt<K: CommandSink>(
        &mut self,
        sink: &mut K,
        final_pose: Option<Pose>,
        final_distance_m: Option<f64>
    ) -> GoalResult {
        info!("Goal preempted");

        if let Some(stop) = self.abort_goal() {
            sink.send(stop);
        }

        GoalResult {
            outcome: GoalOutcome::Preempted,
            num_cycles: self.num_goal_cycles(),
            final_distance_m,
            final_pose
        }
    }

    /// Abort the goal after an error, sending the stop.
    fn fail<K: CommandSink>(&mut self, sink: &mut K) {
        warn!("Goal failed, stopping the robot");

        if let Some(stop) = self.abort_goal() {
            sink.send(stop);
        }
    }
}
