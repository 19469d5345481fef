//! Main move executable entry point.
//!
//! # Architecture
//!
//! The executable drives a simulated robot to a single target given on the command line:
//!
//!     - Initialise the session, logging and parameters
//!     - Start the simulated robot, which publishes its pose into a pose slot and accepts
//!       velocity commands over a channel
//!     - Start the goal server, giving it motion control, a subscriber to the pose slot and the
//!       simulation's command sink
//!     - Send the goal and log its feedback until it ends
//!     - Save the result into the session and shut everything down

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{eyre::WrapErr, Report};
use log::{info, warn};
use serde::Serialize;
use structopt::StructOpt;

// Internal
use move_lib::{
    goal::{GoalOutcome, GoalResult, GoalServer, Target},
    loc::{Pose, PoseSlot},
    move_ctrl::MoveCtrl,
    params::MoveExecParams,
    sim::{SimRobot, SimSummary}
};
use util::{
    host,
    logger::{logger_init, LevelFilter},
    session::Session
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Drive the simulated robot to a target position.
#[derive(Debug, StructOpt)]
#[structopt(name = "move_exec")]
struct Args {
    /// X coordinate of the target in meters
    #[structopt(allow_hyphen_values = true)]
    x_m: f64,

    /// Y coordinate of the target in meters
    #[structopt(allow_hyphen_values = true)]
    y_m: f64,

    /// Override the robot's start X coordinate
    #[structopt(long = "start-x", allow_hyphen_values = true)]
    start_x_m: Option<f64>,

    /// Override the robot's start Y coordinate
    #[structopt(long = "start-y", allow_hyphen_values = true)]
    start_y_m: Option<f64>,

    /// Override the robot's start yaw in radians
    #[structopt(long = "start-yaw", allow_hyphen_values = true)]
    start_yaw_rad: Option<f64>,

    /// Log debug messages, including every control cycle
    #[structopt(short, long)]
    verbose: bool
}

/// Saved into the session when the goal ends.
#[derive(Serialize)]
struct ExecReport {
    timestamp: String,
    target: Target,
    start_pose: Pose,
    result: Option<GoalResult>,
    error: Option<String>,
    sim: Option<SimSummary>
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    color_eyre::install()?;

    let args = Args::from_args();

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new(
        "move_exec",
        "sessions"
    ).wrap_err("Failed to create the session")?;

    // Initialise logger
    let level = if args.verbose { LevelFilter::Debug } else { LevelFilter::Info };
    logger_init(level, &session)
        .wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Move Executable\n");
    info!("Running on: {}", host::get_platform());
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let mut exec_params: MoveExecParams = util::params::load(
        "move_exec.toml"
    ).wrap_err("Could not load exec params")?;

    if let Some(x) = args.start_x_m {
        exec_params.sim.start_x_m = x;
    }
    if let Some(y) = args.start_y_m {
        exec_params.sim.start_y_m = y;
    }
    if let Some(yaw) = args.start_yaw_rad {
        exec_params.sim.start_yaw_rad = yaw;
    }

    let goal_timeout = exec_params.goal_timeout()
        .ok_or_else(|| color_eyre::eyre::eyre!(
            "goal_timeout_s must be a finite, non-negative duration, found {}",
            exec_params.goal_timeout_s
        ))?;

    info!("Exec parameters loaded");

    // ---- INITIALISE MODULES ----

    let move_ctrl = MoveCtrl::from_param_file("move_ctrl.toml", Some(&session))
        .wrap_err("Failed to initialise MoveCtrl")?;

    info!("MoveCtrl init complete");

    let slot = PoseSlot::new();
    let start_pose = exec_params.sim.start_pose();
    let sim = SimRobot::start(exec_params.sim.clone(), slot.clone())
        .wrap_err("Failed to start the simulated robot")?;

    let mut server = GoalServer::start(move_ctrl, slot.subscribe(), sim.cmd_sink())
        .wrap_err("Failed to start the goal server")?;

    info!("Module initialisation complete\n");

    // ---- GOAL EXECUTION ----

    let target = Target::new(args.x_m, args.y_m);
    info!("Moving from {} to {}", start_pose, target);

    let goal_id = server.send_goal(target)
        .wrap_err("Failed to send the goal")?;

    let wait_result = server.wait_for_result(goal_id, goal_timeout, |fb| {
        info!(
            "Cycle {:4}: pose {}, {:.3} m to go, heading error {:.3} rad",
            fb.cycle, fb.pose, fb.distance_m, fb.head_error_rad
        );
    });

    // ---- SHUTDOWN ----

    // Shutting down the server preempts the goal if it timed out, which stops the robot before
    // the simulation is stopped.
    if let Err(e) = server.shutdown() {
        warn!("Goal server did not shut down cleanly: {}", e);
    }

    let sim_summary = match sim.stop() {
        Ok(s) => Some(s),
        Err(e) => {
            warn!("Simulation did not stop cleanly: {}", e);
            None
        }
    };

    let goal_result = wait_result.wrap_err("Failed to get the goal result")?;

    let report = ExecReport {
        timestamp: chrono::Utc::now().to_rfc3339(),
        target,
        start_pose,
        result: goal_result.as_ref().ok().copied(),
        error: goal_result.as_ref().err().map(|e| e.to_string()),
        sim: sim_summary
    };
    session.save("result.json", report);

    let exit = match goal_result {
        Ok(r) => {
            match r.outcome {
                GoalOutcome::Succeeded => info!(
                    "Target reached in {} cycles, final pose {}",
                    r.num_cycles,
                    r.final_pose.unwrap_or(start_pose)
                ),
                GoalOutcome::Preempted => warn!("Goal was preempted after {} cycles", r.num_cycles)
            }
            Ok(())
        },
        Err(e) => Err::<(), _>(e).wrap_err("Goal failed")
    };

    info!("End of execution");
    session.exit();

    exit
}
