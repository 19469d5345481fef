//! # Simulated robot
//!
//! A kinematic unicycle which stands in for the real robot when no hardware is attached. The
//! simulation runs on a background thread: every step it applies the latest velocity command it
//! has received and publishes the resulting pose into a [`PoseSlot`].
//!
//! Commands are given to the simulation through the `Sender` returned by [`SimRobot::cmd_sink`],
//! which implements [`CommandSink`](crate::move_ctrl::CommandSink).

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{channel, Receiver, Sender, TryRecvError},
        Arc
    },
    thread::{self, JoinHandle},
    time::Instant
};

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::{
    loc::{LocError, Pose, PoseSlot},
    move_ctrl::VelocityCommand
};
use util::{maths::wrap_pi, time::seconds_to_std};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Parameters of the simulated robot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimParams {
    /// Initial position and yaw of the robot
    pub start_x_m: f64,
    pub start_y_m: f64,
    pub start_yaw_rad: f64,

    /// Wall-clock period between simulation steps
    pub step_period_s: f64,

    /// Simulated seconds per wall-clock second
    #[serde(default = "default_time_scale")]
    pub time_scale: f64
}

/// Handle to a running simulation.
pub struct SimRobot {
    bg_jh: Option<JoinHandle<SimSummary>>,
    bg_run: Arc<AtomicBool>,
    cmd_sender: Sender<VelocityCommand>,
    slot: PoseSlot
}

/// State of the simulation when it was stopped.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SimSummary {
    pub final_pose: Pose,

    /// Last command the robot received, if any
    pub last_cmd: Option<VelocityCommand>,

    pub num_cmds: u64,
    pub num_steps: u64
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error("Invalid simulation parameters: {0}")]
    InvalidParams(String),

    #[error("Could not start the simulation thread: {0}")]
    SpawnError(std::io::Error),

    #[error("The simulation thread panicked")]
    ThreadPanicked,

    #[error("Could not publish the pose: {0}")]
    PublishError(LocError)
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SimParams {
    pub fn validate(&self) -> Result<(), SimError> {
        let start_ok = self.start_x_m.is_finite()
            && self.start_y_m.is_finite()
            && self.start_yaw_rad.is_finite();
        if !start_ok {
            return Err(SimError::InvalidParams("start pose must be finite".into()))
        }
        if seconds_to_std(self.step_period_s).is_none() || self.step_period_s <= 0.0 {
            return Err(SimError::InvalidParams(format!(
                "step_period_s must be positive, found {}", self.step_period_s
            )))
        }
        if !(self.time_scale.is_finite() && self.time_scale > 0.0) {
            return Err(SimError::InvalidParams(format!(
                "time_scale must be positive, found {}", self.time_scale
            )))
        }

        Ok(())
    }

    /// The start pose of the robot.
    pub fn start_pose(&self) -> Pose {
        Pose::new(self.start_x_m, self.start_y_m, self.start_yaw_rad)
    }
}

impl Default for SimParams {
    fn default() -> Self {
        Self {
            start_x_m: 0.0,
            start_y_m: 0.0,
            start_yaw_rad: 0.0,
            step_period_s: 0.05,
            time_scale: default_time_scale()
        }
    }
}

impl SimRobot {
    /// Start the simulation, publishing poses into `slot`.
    ///
    /// The start pose is published before this function returns.
    pub fn start(params: SimParams, slot: PoseSlot) -> Result<Self, SimError> {
        params.validate()?;

        let start = params.start_pose();
        slot.publish(start).map_err(SimError::PublishError)?;

        let (cmd_sender, cmd_reciever) = channel();
        let bg_run = Arc::new(AtomicBool::new(true));

        let bg_run_clone = bg_run.clone();
        let slot_clone = slot.clone();

        let bg_jh = thread::Builder::new()
            .name("sim".into())
            .spawn(move || bg_thread(params, start, slot_clone, cmd_reciever, bg_run_clone))
            .map_err(SimError::SpawnError)?;

        info!("Simulated robot started at {}", start);

        Ok(Self {
            bg_jh: Some(bg_jh),
            bg_run,
            cmd_sender,
            slot
        })
    }

    /// Get a sink which sends commands to the simulated robot.
    pub fn cmd_sink(&self) -> Sender<VelocityCommand> {
        self.cmd_sender.clone()
    }

    /// Get the latest simulated pose.
    pub fn pose(&self) -> Option<Pose> {
        self.slot.latest()
    }

    /// Stop the simulation and close the pose slot.
    pub fn stop(mut self) -> Result<SimSummary, SimError> {
        self.join()
    }

    fn join(&mut self) -> Result<SimSummary, SimError> {
        self.bg_run.store(false, Ordering::Relaxed);

        let summary = match self.bg_jh.take() {
            Some(jh) => jh.join().map_err(|_| SimError::ThreadPanicked),
            None => Err(SimError::ThreadPanicked)
        };

        self.slot.close();
        summary
    }
}

impl Drop for SimRobot {
    fn drop(&mut self) {
        if self.bg_jh.is_some() {
            self.join().ok();
        }
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Integrate a unicycle over `dt_s` seconds, driving at the commanded speeds.
pub fn step(pose: &Pose, cmd: &VelocityCommand, dt_s: f64) -> Pose {
    let dx = cmd.linear_ms * pose.yaw_rad.cos() * dt_s;
    let dy = cmd.linear_ms * pose.yaw_rad.sin() * dt_s;
    let dyaw = cmd.angular_rads * dt_s;

    Pose::new(
        pose.position_m[0] + dx,
        pose.position_m[1] + dy,
        wrap_pi(pose.yaw_rad + dyaw)
    )
}

fn default_time_scale() -> f64 {
    1.0
}

/// Background thread, steps the simulation until told to stop.
fn bg_thread(
    params: SimParams,
    start: Pose,
    slot: PoseSlot,
    cmd_reciever: Receiver<VelocityCommand>,
    run: Arc<AtomicBool>
) -> SimSummary {
    // Parameters have been validated by start
    let step_period = seconds_to_std(params.step_period_s).unwrap_or_default();
    let dt_s = params.step_period_s * params.time_scale;

    let mut summary = SimSummary {
        final_pose: start,
        last_cmd: None,
        num_cmds: 0,
        num_steps: 0
    };

    while run.load(Ordering::Relaxed) {
        let step_start = Instant::now();

        // Keep only the latest command
        loop {
            match cmd_reciever.try_recv() {
                Ok(cmd) => {
                    summary.last_cmd = Some(cmd);
                    summary.num_cmds += 1;
                },
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break
            }
        }

        let cmd = summary.last_cmd.unwrap_or_default();
        summary.final_pose = step(&summary.final_pose, &cmd, dt_s);
        summary.num_steps += 1;

        if let Err(e) = slot.publish(summary.final_pose) {
            debug!("Sim could not publish pose: {}", e);
        }

        if let Some(remaining) = step_period.checked_sub(step_start.elapsed()) {
            thread::sleep(remaining);
        }
    }

    // Pick up anything sent between the last step and the stop
    while let Ok(cmd) = cmd_reciever.try_recv() {
        summary.last_cmd = Some(cmd);
        summary.num_cmds += 1;
    }

    summary
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{loc::PoseSource, move_ctrl::CommandSink};
    use approx::assert_abs_diff_eq;
    use std::{f64::consts::FRAC_PI_2, time::Duration};

    #[test]
    fn test_step_straight() {
        let p = step(&Pose::new(1.0, 1.0, 0.0), &VelocityCommand::new(0.5, 0.0), 2.0);
        assert_abs_diff_eq!(p.position_m[0], 2.0);
        assert_abs_diff_eq!(p.position_m[1], 1.0);
        assert_abs_diff_eq!(p.yaw_rad, 0.0);

        let p = step(&Pose::new(0.0, 0.0, FRAC_PI_2), &VelocityCommand::new(1.0, 0.0), 1.0);
        assert_abs_diff_eq!(p.position_m[0], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(p.position_m[1], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_step_turn_wraps() {
        let p = step(
            &Pose::new(0.0, 0.0, 3.0),
            &VelocityCommand::new(0.0, 1.0),
            1.0
        );
        assert_abs_diff_eq!(p.yaw_rad, 4.0 - 2.0 * std::f64::consts::PI, epsilon = 1e-12);
        assert_abs_diff_eq!(p.position_m.norm(), 0.0);
    }

    #[test]
    fn test_step_stop_holds_pose() {
        let start = Pose::new(-2.0, 3.0, 1.0);
        let p = step(&start, &VelocityCommand::stop(), 10.0);
        assert_eq!(p.position_m, start.position_m);
        assert_abs_diff_eq!(p.yaw_rad, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_invalid_params() {
        let mut p = SimParams::default();
        p.step_period_s = 0.0;
        assert!(p.validate().is_err());

        let mut p = SimParams::default();
        p.step_period_s = 1e20;
        assert!(p.validate().is_err());

        let mut p = SimParams::default();
        p.start_yaw_rad = f64::NAN;
        assert!(matches!(SimRobot::start(p, PoseSlot::new()), Err(SimError::InvalidParams(_))));
    }

    #[test]
    fn test_sim_drives() {
        let params = SimParams {
            start_x_m: 1.0,
            step_period_s: 0.005,
            time_scale: 10.0,
            ..Default::default()
        };
        let slot = PoseSlot::new();
        let mut sub = slot.subscribe();

        let sim = SimRobot::start(params, slot.clone()).unwrap();
        assert_eq!(sub.sample(Duration::from_millis(100)).unwrap().position_m[0], 1.0);

        let mut sink = sim.cmd_sink();
        CommandSink::send(&mut sink, VelocityCommand::new(1.0, 0.0));
        thread::sleep(Duration::from_millis(50));
        CommandSink::send(&mut sink, VelocityCommand::stop());
        thread::sleep(Duration::from_millis(20));

        let summary = sim.stop().unwrap();
        assert_eq!(summary.last_cmd, Some(VelocityCommand::stop()));
        assert_eq!(summary.num_cmds, 2);
        assert!(summary.final_pose.position_m[0] > 1.0);
        assert_abs_diff_eq!(summary.final_pose.position_m[1], 0.0);

        // Consumers see the slot close once the last pose is taken
        let _ = sub.sample(Duration::from_millis(10));
        assert!(matches!(
            sub.sample(Duration::from_millis(10)),
            Err(LocError::SourceClosed)
        ));
    }
}
