//! Motion control module state

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, info, warn};
use serde::Serialize;

// Internal
use super::*;
use crate::{
    goal::Target,
    heading::bearing_to,
    loc::Pose
};
use util::{
    archive::{Archived, ArchiveError, Archiver},
    maths::{clamp_sym, wrap_pi},
    module::State,
    session::{self, Session}
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

pub struct MoveCtrl {
    params: Params,

    /// Executing mode
    mode: MoveCtrlMode,

    /// The target of the current goal
    target: Option<Target>,

    input_pose: Option<Pose>,
    output_cmd: Option<VelocityCommand>,
    report: StatusReport,

    /// Number of cycles processed for the current goal
    num_goal_cycles: u64,

    arch: Archiver
}

/// The status report containing the monitoring quantities of one cycle.
#[derive(Debug, Default, Copy, Clone, Serialize)]
pub struct StatusReport {
    /// Distance remaining to the target
    pub distance_m: f64,

    /// Bearing from the robot to the target
    pub bearing_rad: f64,

    /// Difference between the bearing and the robot's yaw
    pub head_error_rad: f64,

    /// Angular rate demand produced from the heading error
    pub ang_effort_rads: f64,

    /// If true the goal converged during this cycle
    pub converged: bool,

    /// If true the robot has been commanded to stop and the goal is over
    pub stopped: bool
}

/// One row of the MoveCtrl archive
#[derive(Serialize)]
struct ArchRecord {
    time_s: f64,
    mode: String,
    cycle: u64,
    pose_x_m: Option<f64>,
    pose_y_m: Option<f64>,
    pose_yaw_rad: Option<f64>,
    cmd_linear_ms: Option<f64>,
    cmd_angular_rads: Option<f64>,
    distance_m: f64,
    head_error_rad: f64,
    ang_effort_rads: f64
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// The possible modes of execution of MoveCtrl. Each mode is handled by a `mode_xyz` function.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum MoveCtrlMode {
    /// No goal has been given.
    Off,

    /// Driving towards the target.
    Approaching,

    /// Within tolerance of the target, the stop command is issued on entry.
    Converged,

    /// The robot has been commanded to stop, terminal for the goal.
    Stopped
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl State for MoveCtrl {
    type InitData = Params;
    type InitError = MoveCtrlError;

    type InputData = Pose;
    type OutputData = Option<VelocityCommand>;
    type StatusReport = StatusReport;
    type ProcError = MoveCtrlError;

    /// Initialise the MoveCtrl module.
    ///
    /// If a session is given the cycle data is archived into `move_ctrl.csv`.
    fn init(
        params: Self::InitData,
        session: Option<&Session>
    ) -> Result<Self, Self::InitError> {
        params.validate()?;

        let arch = match session {
            Some(s) => Archiver::from_path(s, "move_ctrl.csv").unwrap_or_else(|e| {
                warn!("Could not open the MoveCtrl archive, cycle data will not be saved: {}", e);
                Archiver::default()
            }),
            None => Archiver::default()
        };

        Ok(Self {
            params,
            mode: MoveCtrlMode::Off,
            target: None,
            input_pose: None,
            output_cmd: None,
            report: StatusReport::default(),
            num_goal_cycles: 0,
            arch
        })
    }

    /// Process one control cycle on a freshly sampled pose.
    ///
    /// The returned command, if any, must be sent to the robot before the next cycle.
    fn proc(
        &mut self,
        pose: &Self::InputData
    ) -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError> {

        // Setup cycle data
        self.input_pose = Some(*pose);
        self.output_cmd = None;
        self.report = StatusReport::default();

        let goal_active = self.is_goal_active();

        // Mode execution
        match self.mode {
            MoveCtrlMode::Off => self.mode_off(),
            MoveCtrlMode::Approaching => self.mode_approaching(),
            MoveCtrlMode::Converged => self.mode_converged(),
            MoveCtrlMode::Stopped => self.mode_stopped()
        }?;

        if goal_active {
            self.num_goal_cycles += 1;
        }

        if let Err(e) = self.write() {
            warn!("Could not write MoveCtrl archive: {}", e);
        }

        Ok((self.output_cmd, self.report))
    }
}

impl MoveCtrl {

    /// Create a MoveCtrl without a session, nothing is archived.
    pub fn new(params: Params) -> Result<Self, MoveCtrlError> {
        <Self as State>::init(params, None)
    }

    /// Load the parameters from the given file (relative to the params directory) and initialise
    /// the module.
    pub fn from_param_file(
        params_path: &str,
        session: Option<&Session>
    ) -> Result<Self, MoveCtrlError> {
        let params: Params = util::params::load(params_path)
            .map_err(MoveCtrlError::ParamLoadError)?;

        <Self as State>::init(params, session)
    }

    /// Begin executing a goal.
    ///
    /// Execution begins on the next call to `proc`, in `Approaching` mode. Beginning a new goal
    /// while another is active is an error, use `abort_goal` first.
    pub fn begin_goal(&mut self, target: Target) -> Result<(), MoveCtrlError> {
        match self.mode {
            MoveCtrlMode::Approaching | MoveCtrlMode::Converged => {
                return Err(MoveCtrlError::GoalAlreadyActive)
            },
            _ => ()
        }

        if !(target.x_m.is_finite() && target.y_m.is_finite()) {
            return Err(MoveCtrlError::InvalidTarget(target.x_m, target.y_m))
        }

        self.target = Some(target);
        self.num_goal_cycles = 0;
        self.mode = MoveCtrlMode::Approaching;

        Ok(())
    }

    /// Abort the current goal.
    ///
    /// If a goal was active the module moves to `Stopped` and the stop command is returned, which
    /// the caller must send immediately. Otherwise nothing is returned.
    pub fn abort_goal(&mut self) -> Option<VelocityCommand> {
        match self.mode {
            MoveCtrlMode::Approaching | MoveCtrlMode::Converged => {
                info!("Goal aborted after {} cycles", self.num_goal_cycles);
                self.target = None;
                self.mode = MoveCtrlMode::Stopped;
                Some(VelocityCommand::stop())
            },
            _ => None
        }
    }

    /// Get the current mode.
    pub fn mode(&self) -> MoveCtrlMode {
        self.mode
    }

    /// Get the parameters.
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Get the target of the active goal, if any.
    pub fn target(&self) -> Option<Target> {
        self.target
    }

    /// True if a goal is being executed.
    pub fn is_goal_active(&self) -> bool {
        matches!(self.mode, MoveCtrlMode::Approaching | MoveCtrlMode::Converged)
    }

    /// Number of cycles processed in the current (or last) goal.
    pub fn num_goal_cycles(&self) -> u64 {
        self.num_goal_cycles
    }

    /// Mode not executing.
    ///
    /// No actions are taken in this mode. To move into Approaching call `begin_goal`.
    fn mode_off(&mut self) -> Result<(), MoveCtrlError> {
        Ok(())
    }

    /// Mode approaching the target.
    fn mode_approaching(&mut self) -> Result<(), MoveCtrlError> {

        let target = self.target.ok_or(MoveCtrlError::NoTarget)?;
        let pose = self.input_pose.ok_or(MoveCtrlError::NoPose)?;

        if !pose.is_finite() {
            return Err(MoveCtrlError::InvalidPose)
        }

        // ---- CONVERGENCE ----

        let distance_m = (target.position_m() - pose.position_m).norm();
        self.report.distance_m = distance_m;

        // The motion command of a converging cycle is replaced by the stop. This also means a
        // bearing is never requested with the robot sat on the target.
        if distance_m <= self.params.distance_tolerance_m {
            info!(
                "Target {} reached, {:.3} m remaining after {} cycles",
                target, distance_m, self.num_goal_cycles + 1
            );
            self.report.converged = true;
            self.mode = MoveCtrlMode::Converged;
            return self.mode_converged()
        }

        // ---- COMMAND GENERATION ----

        let bearing_rad = bearing_to(
            &pose.position_m,
            &target.position_m(),
            self.params.bearing_policy
        ).map_err(MoveCtrlError::DegenerateGeometry)?;

        let mut head_error_rad = bearing_rad - pose.yaw_rad;
        if self.params.wrap_head_error {
            head_error_rad = wrap_pi(head_error_rad);
        }

        let ang_effort_rads = clamp_sym(
            head_error_rad * self.params.k_p,
            self.params.max_ang_rate_rads
        );

        self.report.bearing_rad = bearing_rad;
        self.report.head_error_rad = head_error_rad;
        self.report.ang_effort_rads = ang_effort_rads;

        debug!(
            "Distance to target: {:.3} m, heading error: {:.3} rad, effort: {:.3} rad/s",
            distance_m, head_error_rad, ang_effort_rads
        );

        self.output_cmd = Some(VelocityCommand::new(
            self.params.base_linear_speed_ms,
            ang_effort_rads
        ));

        Ok(())
    }

    /// Mode converged.
    ///
    /// Issues the stop command, clears the target and moves into Stopped.
    fn mode_converged(&mut self) -> Result<(), MoveCtrlError> {
        self.output_cmd = Some(VelocityCommand::stop());
        self.report.stopped = true;

        self.target = None;
        self.mode = MoveCtrlMode::Stopped;

        Ok(())
    }

    /// Mode stopped.
    ///
    /// The stop has already been issued, nothing more is commanded until a new goal begins.
    fn mode_stopped(&mut self) -> Result<(), MoveCtrlError> {
        self.report.stopped = true;
        Ok(())
    }
}

impl Archived for MoveCtrl {
    fn write(&mut self) -> Result<(), ArchiveError> {
        if !self.arch.is_active() {
            return Ok(())
        }

        let record = ArchRecord {
            time_s: session::get_elapsed_seconds(),
            mode: format!("{:?}", self.mode),
            cycle: self.num_goal_cycles,
            pose_x_m: self.input_pose.map(|p| p.position_m[0]),
            pose_y_m: self.input_pose.map(|p| p.position_m[1]),
            pose_yaw_rad: self.input_pose.map(|p| p.yaw_rad),
            cmd_linear_ms: self.output_cmd.map(|c| c.linear_ms),
            cmd_angular_rads: self.output_cmd.map(|c| c.angular_rads),
            distance_m: self.report.distance_m,
            head_error_rad: self.report.head_error_rad,
            ang_effort_rads: self.report.ang_effort_rads
        };

        self.arch.serialise(record)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::{FRAC_PI_2, PI};

    use crate::heading::{BearingPolicy, LEGACY_HALF_TURN_RAD};

    fn ctrl() -> MoveCtrl {
        MoveCtrl::new(Params::default()).unwrap()
    }

    #[test]
    fn test_off_produces_nothing() {
        let mut c = ctrl();
        let (cmd, rpt) = c.proc(&Pose::new(0.0, 0.0, 0.0)).unwrap();
        assert!(cmd.is_none());
        assert!(!rpt.stopped);
        assert_eq!(c.mode(), MoveCtrlMode::Off);
    }

    #[test]
    fn test_straight_ahead() {
        let mut c = ctrl();
        c.begin_goal(Target::new(10.0, 0.0)).unwrap();

        let (cmd, rpt) = c.proc(&Pose::new(0.0, 0.0, 0.0)).unwrap();
        let cmd = cmd.unwrap();

        assert_abs_diff_eq!(rpt.bearing_rad, 0.0);
        assert_abs_diff_eq!(rpt.head_error_rad, 0.0);
        assert_abs_diff_eq!(cmd.angular_rads, 0.0);
        assert_abs_diff_eq!(cmd.linear_ms, 0.15);
        assert_abs_diff_eq!(rpt.distance_m, 10.0);
        assert_eq!(c.mode(), MoveCtrlMode::Approaching);
    }

    #[test]
    fn test_vertical_target() {
        let mut c = ctrl();
        c.begin_goal(Target::new(0.0, 10.0)).unwrap();

        let (cmd, rpt) = c.proc(&Pose::new(0.0, 0.0, 0.0)).unwrap();

        assert_abs_diff_eq!(rpt.bearing_rad, FRAC_PI_2);
        assert_abs_diff_eq!(cmd.unwrap().angular_rads, FRAC_PI_2 * 0.5);
    }

    #[test]
    fn test_target_behind() {
        let mut c = ctrl();
        c.begin_goal(Target::new(-10.0, 0.0)).unwrap();

        let (cmd, rpt) = c.proc(&Pose::new(0.0, 0.0, 0.0)).unwrap();

        // Unwrapped, the heading error is the bearing itself and the turn is counter-clockwise
        assert_abs_diff_eq!(rpt.bearing_rad, PI);
        assert_abs_diff_eq!(rpt.head_error_rad, PI);
        assert_abs_diff_eq!(cmd.unwrap().angular_rads, FRAC_PI_2);
    }

    #[test]
    fn test_target_behind_wrapped() {
        let mut params = Params::default();
        params.wrap_head_error = true;
        let mut c = MoveCtrl::new(params).unwrap();
        c.begin_goal(Target::new(-10.0, 0.0)).unwrap();

        let (cmd, rpt) = c.proc(&Pose::new(0.0, 0.0, 0.0)).unwrap();

        // pi wraps onto the lower bound of [-pi, pi)
        assert_abs_diff_eq!(rpt.head_error_rad, -PI, epsilon = 1e-12);
        assert_abs_diff_eq!(cmd.unwrap().angular_rads, -FRAC_PI_2, epsilon = 1e-12);
    }

    #[test]
    fn test_legacy_policy() {
        let mut params = Params::default();
        params.bearing_policy = BearingPolicy::Legacy;
        let mut c = MoveCtrl::new(params).unwrap();
        c.begin_goal(Target::new(-10.0, 0.0)).unwrap();

        let (cmd, rpt) = c.proc(&Pose::new(0.0, 0.0, 0.0)).unwrap();

        assert_abs_diff_eq!(rpt.bearing_rad, LEGACY_HALF_TURN_RAD);
        assert_abs_diff_eq!(cmd.unwrap().angular_rads, LEGACY_HALF_TURN_RAD * 0.5);
    }

    #[test]
    fn test_wrap_turns_short_way() {
        // Facing almost -pi, target at bearing almost +pi: the plain difference is nearly a full
        // turn, the wrapped error is the short way round.
        let mut c = ctrl();
        c.begin_goal(Target::new(-10.0, 0.1)).unwrap();
        let (_, rpt) = c.proc(&Pose::new(0.0, 0.0, -PI + 0.01)).unwrap();
        assert!(rpt.head_error_rad > 6.0);

        let mut params = Params::default();
        params.wrap_head_error = true;
        let mut c = MoveCtrl::new(params).unwrap();
        c.begin_goal(Target::new(-10.0, 0.1)).unwrap();
        let (cmd, rpt) = c.proc(&Pose::new(0.0, 0.0, -PI + 0.01)).unwrap();
        assert!(rpt.head_error_rad.abs() < 0.1);
        assert!(cmd.unwrap().angular_rads.abs() < 0.05);
    }

    #[test]
    fn test_saturation() {
        let mut params = Params::default();
        params.k_p = 10.0;
        params.max_ang_rate_rads = 1.0;
        let mut c = MoveCtrl::new(params).unwrap();
        c.begin_goal(Target::new(0.0, -5.0)).unwrap();

        let (cmd, rpt) = c.proc(&Pose::new(0.0, 0.0, 0.0)).unwrap();
        assert_abs_diff_eq!(rpt.head_error_rad, -FRAC_PI_2);
        assert_abs_diff_eq!(cmd.unwrap().angular_rads, -1.0);
    }

    #[test]
    fn test_convergence_and_idempotent_stop() {
        let mut c = ctrl();
        c.begin_goal(Target::new(1.0, 0.0)).unwrap();

        let (cmd, rpt) = c.proc(&Pose::new(0.95, 0.0, 0.0)).unwrap();
        assert_eq!(cmd, Some(VelocityCommand::stop()));
        assert!(rpt.converged);
        assert!(rpt.stopped);
        assert_eq!(c.mode(), MoveCtrlMode::Stopped);
        assert!(c.target().is_none());

        // Once stopped nothing more is commanded, whatever the pose
        for x in &[0.0, -3.0, 12.0] {
            let (cmd, rpt) = c.proc(&Pose::new(*x, 1.0, 0.0)).unwrap();
            assert!(cmd.is_none());
            assert!(rpt.stopped);
        }
    }

    #[test]
    fn test_robot_on_target() {
        let mut c = ctrl();
        c.begin_goal(Target::new(2.0, 3.0)).unwrap();

        let (cmd, _) = c.proc(&Pose::new(2.0, 3.0, 1.0)).unwrap();
        assert_eq!(cmd, Some(VelocityCommand::stop()));
    }

    #[test]
    fn test_goal_already_active() {
        let mut c = ctrl();
        c.begin_goal(Target::new(1.0, 0.0)).unwrap();
        assert!(matches!(
            c.begin_goal(Target::new(2.0, 0.0)),
            Err(MoveCtrlError::GoalAlreadyActive)
        ));

        // After an abort a new goal is accepted
        assert_eq!(c.abort_goal(), Some(VelocityCommand::stop()));
        assert_eq!(c.abort_goal(), None);
        assert!(c.begin_goal(Target::new(2.0, 0.0)).is_ok());
    }

    #[test]
    fn test_invalid_inputs() {
        let mut c = ctrl();
        assert!(matches!(
            c.begin_goal(Target::new(f64::NAN, 0.0)),
            Err(MoveCtrlError::InvalidTarget(_, _))
        ));

        c.begin_goal(Target::new(1.0, 1.0)).unwrap();
        assert!(matches!(
            c.proc(&Pose::new(f64::NAN, 0.0, 0.0)),
            Err(MoveCtrlError::InvalidPose)
        ));
    }

    #[test]
    fn test_invalid_params_rejected() {
        let mut params = Params::default();
        params.distance_tolerance_m = -1.0;
        assert!(MoveCtrl::new(params).is_err());
    }
}
