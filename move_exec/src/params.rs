//! # Move Executable Parameters
//!
//! This module provides parameters for the move executable.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::time::Duration;

use serde::{Serialize, Deserialize};

use crate::sim::SimParams;
use util::time::seconds_to_std;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveExecParams {

    /// The simulated robot driven by the executable
    pub sim: SimParams,

    /// Maximum time to wait for a goal to end before giving up on it
    pub goal_timeout_s: f64
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl MoveExecParams {
    /// The goal timeout, or `None` if `goal_timeout_s` is not a representable duration.
    pub fn goal_timeout(&self) -> Option<Duration> {
        seconds_to_std(self.goal_timeout_s)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_deserialise() {
        let p: MoveExecParams = util::params::from_str(
            "goal_timeout_s = 120.0\n\
             \n\
             [sim]\n\
             start_x_m = 0.0\n\
             start_y_m = 1.0\n\
             start_yaw_rad = 0.0\n\
             step_period_s = 0.05\n"
        ).unwrap();

        assert_eq!(p.goal_timeout_s, 120.0);
        assert_eq!(p.sim.start_y_m, 1.0);
        assert_eq!(p.sim.time_scale, 1.0);
        assert_eq!(p.goal_timeout(), Some(Duration::from_secs(120)));
    }

    #[test]
    fn test_goal_timeout_out_of_range() {
        let mut p = MoveExecParams {
            sim: SimParams::default(),
            goal_timeout_s: 1e20
        };
        assert_eq!(p.goal_timeout(), None);

        p.goal_timeout_s = -1.0;
        assert_eq!(p.goal_timeout(), None);
    }
}
