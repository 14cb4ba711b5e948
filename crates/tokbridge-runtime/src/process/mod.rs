//! Tokenizer server process supervision.
//!
//! - `supervisor`: [`CmdTokenizerServer`], lifecycle of one child process
//! - `shutdown`: SIGTERM → SIGKILL escalation used by forced stops

mod shutdown;
mod supervisor;

use std::fmt;

pub use shutdown::shutdown_child;
pub use supervisor::CmdTokenizerServer;

/// Lifecycle phase of a supervised tokenizer server.
///
/// Phases only move forward: `NotStarted → Starting → Ready → Stopped`, with
/// `Starting → Stopped` when the process dies before it becomes healthy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ServerPhase {
    NotStarted,
    Starting,
    Ready,
    Stopped,
}

impl ServerPhase {
    /// True while a child process exists and has not been observed to exit.
    pub const fn is_running(self) -> bool {
        matches!(self, Self::Starting | Self::Ready)
    }
}

impl fmt::Display for ServerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::NotStarted => "not started",
            Self::Starting => "starting",
            Self::Ready => "ready",
            Self::Stopped => "stopped",
        };
        f.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_live_phases_are_running() {
        assert!(!ServerPhase::NotStarted.is_running());
        assert!(ServerPhase::Starting.is_running());
        assert!(ServerPhase::Ready.is_running());
        assert!(!ServerPhase::Stopped.is_running());
    }

    #[test]
    fn phases_are_ordered() {
        assert!(ServerPhase::NotStarted < ServerPhase::Starting);
        assert!(ServerPhase::Ready < ServerPhase::Stopped);
    }
}
