//! Service runner states.

use std::fmt;

/// Lifecycle state of the service runner.
///
/// ```text
/// Idle → Starting → Serving → ShuttingDown → Stopped
///   └────────┴─────────┴───────────┴──────→ Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    Idle,
    Starting,
    Serving,
    ShuttingDown,
    Stopped,
    Failed,
}

impl RunnerState {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunnerState::Stopped | RunnerState::Failed)
    }

    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(self, next: RunnerState) -> bool {
        use RunnerState::*;
        match (self, next) {
            (Idle, Starting)
            | (Starting, Serving)
            | (Serving, ShuttingDown)
            | (ShuttingDown, Stopped) => true,
            (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for RunnerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunnerState::Idle => "idle",
            RunnerState::Starting => "starting",
            RunnerState::Serving => "serving",
            RunnerState::ShuttingDown => "shutting_down",
            RunnerState::Stopped => "stopped",
            RunnerState::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::RunnerState::*;

    #[test]
    fn test_transitions() {
        assert!(Idle.can_transition_to(Starting));
        assert!(Starting.can_transition_to(Serving));
        assert!(Serving.can_transition_to(ShuttingDown));
        assert!(ShuttingDown.can_transition_to(Stopped));
        assert!(Serving.can_transition_to(Failed));

        assert!(!Idle.can_transition_to(Serving));
        assert!(!Stopped.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Starting));
        assert!(!ShuttingDown.can_transition_to(Serving));
    }

    #[test]
    fn test_display() {
        assert_eq!(ShuttingDown.to_string(), "shutting_down");
        assert!(Stopped.is_terminal());
        assert!(!Serving.is_terminal());
    }
}
