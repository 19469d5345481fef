//! Goal server, executes move goals on a worker thread.
//!
//! The worker owns the [`MoveCtrl`], the pose source and the command sink. Goals are handed to it
//! over a channel and run one at a time. Sending a new goal while one is running cancels the
//! running one first, so it ends as preempted (with the robot stopped) before the new goal
//! begins.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use std::{
    sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender},
    thread::{self, JoinHandle},
    time::{Duration, Instant}
};

use log::{debug, info, warn};

use super::{CancelToken, Feedback, GoalResult, Target};
use crate::{
    loc::PoseSource,
    move_ctrl::{CommandSink, MoveCtrl, MoveCtrlError}
};

// -----------------------------------------------------------------------------------------------
// STRUCTS
// -----------------------------------------------------------------------------------------------

/// Identifier of a goal sent to the server, unique for the lifetime of the server.
pub type GoalId = u64;

/// Handle to the goal worker thread.
pub struct GoalServer {
    worker_jh: Option<JoinHandle<MoveCtrl>>,

    worker_sender: Sender<WorkerSignal>,
    worker_reciever: Receiver<GoalEvent>,

    /// The most recently sent goal and its cancellation token
    current: Option<(GoalId, CancelToken)>,

    next_id: GoalId
}

// -----------------------------------------------------------------------------------------------
// ENUMS
// -----------------------------------------------------------------------------------------------

/// Signals from the server to the worker.
#[derive(Debug)]
enum WorkerSignal {
    /// Run a goal
    Goal {
        id: GoalId,
        target: Target,
        cancel: CancelToken
    },

    /// The worker should stop once the current goal has ended
    Stop
}

/// Events from the worker to the server.
#[derive(Debug)]
pub enum GoalEvent {
    /// Per-cycle progress of a goal
    Feedback {
        goal_id: GoalId,
        feedback: Feedback
    },

    /// A goal has ended
    Result {
        goal_id: GoalId,
        result: Result<GoalResult, MoveCtrlError>
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GoalError {
    #[error("Could not start the goal worker thread: {0}")]
    SpawnError(std::io::Error),

    #[error("The goal worker is not running")]
    WorkerNotRunning,

    #[error("The goal worker panicked")]
    WorkerPanicked,

    #[error("No result for goal {0} within {1:?}")]
    Timeout(GoalId, Duration)
}

// -----------------------------------------------------------------------------------------------
// IMPLS
// -----------------------------------------------------------------------------------------------

impl GoalServer {
    /// Start the server. The worker takes ownership of the controller, source and sink.
    pub fn start<S, K>(ctrl: MoveCtrl, source: S, sink: K) -> Result<Self, GoalError>
    where
        S: PoseSource + Send + 'static,
        K: CommandSink + Send + 'static
    {
        let (worker_sender, rx) = channel();
        let (tx, worker_reciever) = channel();

        let worker_jh = thread::Builder::new()
            .name("goal_server::worker".into())
            .spawn(move || worker_thread(ctrl, source, sink, tx, rx))
            .map_err(GoalError::SpawnError)?;

        Ok(Self {
            worker_jh: Some(worker_jh),
            worker_sender,
            worker_reciever,
            current: None,
            next_id: 1
        })
    }

    /// Send a new goal, preempting the current one if it is still running.
    pub fn send_goal(&mut self, target: Target) -> Result<GoalId, GoalError> {
        self.cancel();

        let id = self.next_id;
        self.next_id += 1;

        let cancel = CancelToken::new();
        self.worker_sender
            .send(WorkerSignal::Goal {
                id,
                target,
                cancel: cancel.clone()
            })
            .map_err(|_| GoalError::WorkerNotRunning)?;

        debug!("Goal {} to {} sent", id, target);
        self.current = Some((id, cancel));

        Ok(id)
    }

    /// Cancel the most recent goal. Returns the goal's id, or `None` if no goal was sent.
    ///
    /// Cancelling a goal which has already ended has no effect.
    pub fn cancel(&mut self) -> Option<GoalId> {
        self.current.take().map(|(id, cancel)| {
            cancel.cancel();
            id
        })
    }

    /// Receive the next event, waiting at most `timeout`.
    pub fn recv_event(&self, timeout: Duration) -> Result<Option<GoalEvent>, GoalError> {
        match self.worker_reciever.recv_timeout(timeout) {
            Ok(e) => Ok(Some(e)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(GoalError::WorkerNotRunning)
        }
    }

    /// Wait for the result of the given goal.
    ///
    /// Feedback for the goal is given to `on_feedback`, events for other goals are discarded.
    pub fn wait_for_result<F>(
        &self,
        goal_id: GoalId,
        timeout: Duration,
        mut on_feedback: F
    ) -> Result<Result<GoalResult, MoveCtrlError>, GoalError>
    where
        F: FnMut(&Feedback)
    {
        let start = Instant::now();

        loop {
            let remaining = timeout
                .checked_sub(start.elapsed())
                .ok_or(GoalError::Timeout(goal_id, timeout))?;

            match self.recv_event(remaining)? {
                Some(GoalEvent::Feedback { goal_id: id, feedback }) if id == goal_id => {
                    on_feedback(&feedback)
                },
                Some(GoalEvent::Result { goal_id: id, result }) if id == goal_id => {
                    return Ok(result)
                },
                Some(_) => (),
                None => return Err(GoalError::Timeout(goal_id, timeout))
            }
        }
    }

    /// Cancel any running goal, stop the worker and get the controller back.
    pub fn shutdown(mut self) -> Result<MoveCtrl, GoalError> {
        self.stop_worker()
    }

    fn stop_worker(&mut self) -> Result<MoveCtrl, GoalError> {
        self.cancel();
        self.worker_sender.send(WorkerSignal::Stop).ok();

        match self.worker_jh.take() {
            Some(jh) => jh.join().map_err(|_| GoalError::WorkerPanicked),
            None => Err(GoalError::WorkerNotRunning)
        }
    }
}

impl Drop for GoalServer {
    fn drop(&mut self) {
        if self.worker_jh.is_some() {
            if let Err(e) = self.stop_worker() {
                warn!("Goal worker did not stop cleanly: {}", e);
            }
        }
    }
}

// -----------------------------------------------------------------------------------------------
// FUNCTIONS
// -----------------------------------------------------------------------------------------------

fn worker_thread<S, K>(
    mut ctrl: MoveCtrl,
    mut source: S,
    mut sink: K,
    main_sender: Sender<GoalEvent>,
    main_reciever: Receiver<WorkerSignal>
) -> MoveCtrl
where
    S: PoseSource,
    K: CommandSink
{
    while let Ok(signal) = main_reciever.recv() {
        match signal {
            WorkerSignal::Stop => break,
            WorkerSignal::Goal { id, target, cancel } => {
                info!("Executing goal {}", id);

                let result = ctrl.run_goal(
                    target,
                    &mut source,
                    &mut sink,
                    &cancel,
                    &mut |feedback: Feedback| {
                        main_sender
                            .send(GoalEvent::Feedback { goal_id: id, feedback })
                            .ok();
                    }
                );

                match result {
                    Ok(ref r) => info!("Goal {} ended: {:?} after {} cycles", id, r.outcome, r.num_cycles),
                    Err(ref e) => warn!("Goal {} failed: {}", id, e)
                }

                if main_sender.send(GoalEvent::Result { goal_id: id, result }).is_err() {
                    debug!("Goal server dropped, result of goal {} discarded", id);
                }
            }
        }
    }

    ctrl
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        goal::GoalOutcome,
        loc::PoseSlot,
        move_ctrl::{Params, VelocityCommand},
        sim::{SimParams, SimRobot}
    };

    fn fast_ctrl() -> MoveCtrl {
        let mut params = Params::default();
        params.cycle_period_s = 0.0;
        params.pose_timeout_s = 0.5;
        MoveCtrl::new(params).unwrap()
    }

    fn fast_sim() -> (SimRobot, PoseSlot) {
        let slot = PoseSlot::new();
        let sim = SimRobot::start(
            SimParams {
                step_period_s: 0.002,
                time_scale: 25.0,
                ..Default::default()
            },
            slot.clone()
        ).unwrap();
        (sim, slot)
    }

    #[test]
    fn test_goal_succeeds() {
        let (sim, slot) = fast_sim();
        let mut server = GoalServer::start(fast_ctrl(), slot.subscribe(), sim.cmd_sink()).unwrap();

        let id = server.send_goal(Target::new(0.5, 0.5)).unwrap();
        let mut num_feedback = 0;
        let result = server
            .wait_for_result(id, Duration::from_secs(20), |_| num_feedback += 1)
            .unwrap()
            .unwrap();

        assert_eq!(result.outcome, GoalOutcome::Succeeded);
        assert!(result.final_distance_m.unwrap() <= 0.1);
        assert_eq!(num_feedback, result.num_cycles);

        server.shutdown().unwrap();
        let summary = sim.stop().unwrap();
        assert_eq!(summary.last_cmd, Some(VelocityCommand::stop()));
    }

    #[test]
    fn test_new_goal_preempts() {
        let (sim, slot) = fast_sim();
        let mut server = GoalServer::start(fast_ctrl(), slot.subscribe(), sim.cmd_sink()).unwrap();

        let first = server.send_goal(Target::new(100.0, 0.0)).unwrap();

        // Let the first goal get going
        loop {
            match server.recv_event(Duration::from_secs(5)).unwrap() {
                Some(GoalEvent::Feedback { feedback, .. }) if feedback.cycle >= 3 => break,
                Some(_) => (),
                None => panic!("no feedback from the first goal")
            }
        }

        let second = server.send_goal(Target::new(0.3, 0.3)).unwrap();
        assert_ne!(first, second);

        let first_result = server
            .wait_for_result(first, Duration::from_secs(5), |_| ())
            .unwrap()
            .unwrap();
        assert_eq!(first_result.outcome, GoalOutcome::Preempted);

        let second_result = server
            .wait_for_result(second, Duration::from_secs(20), |_| ())
            .unwrap()
            .unwrap();
        assert_eq!(second_result.outcome, GoalOutcome::Succeeded);
    }

    #[test]
    fn test_cancel() {
        let (sim, slot) = fast_sim();
        let mut server = GoalServer::start(fast_ctrl(), slot.subscribe(), sim.cmd_sink()).unwrap();

        assert_eq!(server.cancel(), None);

        let id = server.send_goal(Target::new(-100.0, 0.0)).unwrap();
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(server.cancel(), Some(id));

        let result = server
            .wait_for_result(id, Duration::from_secs(5), |_| ())
            .unwrap()
            .unwrap();
        assert_eq!(result.outcome, GoalOutcome::Preempted);

        drop(server);
        let summary = sim.stop().unwrap();
        assert_eq!(summary.last_cmd, Some(VelocityCommand::stop()));
    }

    #[test]
    fn test_pose_timeout_reported() {
        // Nothing is ever published to this slot
        let slot = PoseSlot::new();
        let (tx, rx) = channel::<VelocityCommand>();
        let mut server = GoalServer::start(fast_ctrl(), slot.subscribe(), tx).unwrap();

        let id = server.send_goal(Target::new(1.0, 0.0)).unwrap();
        let result = server
            .wait_for_result(id, Duration::from_secs(5), |_| ())
            .unwrap();

        match result {
            Err(e) => assert!(e.is_timeout()),
            Ok(r) => panic!("goal should have failed, got {:?}", r)
        }

        // The stop is still sent
        assert_eq!(rx.try_recv().ok(), Some(VelocityCommand::stop()));

        let ctrl = server.shutdown().unwrap();
        assert!(!ctrl.is_goal_active());
    }
}
