//! Commands produced by MoveCtrl

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::sync::mpsc::Sender;

use log::warn;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A velocity demand for the robot body.
///
/// A command is only valid for the cycle it was computed in, a new one is built every cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct VelocityCommand {

    /// Forward speed of the robot body.
    ///
    /// Units: meters/second, never negative
    pub linear_ms: f64,

    /// Turn rate of the robot body about the vertical axis, positive counter-clockwise.
    ///
    /// Units: radians/second
    pub angular_rads: f64
}

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// Something which accepts velocity commands, for example the actuation layer of the robot.
///
/// Sending is fire-and-forget, no acknowledgement is expected.
pub trait CommandSink {
    /// Send a command.
    fn send(&mut self, cmd: VelocityCommand);
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl VelocityCommand {
    /// Create a new command.
    pub fn new(linear_ms: f64, angular_rads: f64) -> Self {
        Self {
            linear_ms,
            angular_rads
        }
    }

    /// The full stop command.
    pub fn stop() -> Self {
        Self::new(0.0, 0.0)
    }

    /// Determine if this is a full stop command.
    pub fn is_stop(&self) -> bool {
        self.linear_ms == 0.0 && self.angular_rads == 0.0
    }
}

impl std::fmt::Display for VelocityCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "(v: {:.3} m/s, w: {:.3} rad/s)", self.linear_ms, self.angular_rads)
    }
}

/// Records every command, mostly useful for tests and replays.
impl CommandSink for Vec<VelocityCommand> {
    fn send(&mut self, cmd: VelocityCommand) {
        self.push(cmd);
    }
}

impl CommandSink for Sender<VelocityCommand> {
    fn send(&mut self, cmd: VelocityCommand) {
        if let Err(e) = Sender::send(self, cmd) {
            warn!("Could not send velocity command {}: receiver dropped", e.0);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_stop() {
        assert!(VelocityCommand::stop().is_stop());
        assert!(VelocityCommand::default().is_stop());
        assert!(!VelocityCommand::new(0.15, 0.0).is_stop());
        assert!(!VelocityCommand::new(0.0, -0.1).is_stop());
    }

    #[test]
    fn test_channel_sink() {
        let (tx, rx) = std::sync::mpsc::channel();
        let mut sink = tx;
        CommandSink::send(&mut sink, VelocityCommand::new(0.1, 0.2));
        assert_eq!(rx.recv().unwrap(), VelocityCommand::new(0.1, 0.2));

        // A dropped receiver is only warned about
        drop(rx);
        CommandSink::send(&mut sink, VelocityCommand::stop());
    }
}
