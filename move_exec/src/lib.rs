//! # Move library.
//!
//! This library provides the point-to-point motion control of the robot, along with the
//! interfaces it needs to the outside world (pose source, command sink and goal dispatch).

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Goal dispatch - accepts targets, preempts running goals and reports results
pub mod goal;

/// Heading solver - computes the bearing from the robot to a target
pub mod heading;

/// Localisation module - provides the robot with the latest estimate of its pose
pub mod loc;

/// Motion control module - drives the robot to a target and stops it there
pub mod move_ctrl;

/// Executable parameters
pub mod params;

/// Simulated robot - integrates velocity commands into poses
pub mod sim;
