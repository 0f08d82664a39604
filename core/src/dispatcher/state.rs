//! Dispatcher lifecycle states

use serde::{Deserialize, Serialize};

/// Lifecycle of a dispatch run
///
/// ```text
/// Init -> Running -> Draining -> Done
///            \          \
///             +----------+--> Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchState {
    /// Built, not started
    Init,
    /// Submitting requests
    Running,
    /// No more submissions; waiting for in-flight requests
    Draining,
    /// Every submitted request produced an outcome
    Done,
    /// A cancellation signal cut the run short: some requests were never
    /// submitted or were abandoned in flight
    Cancelled,
}

impl DispatchState {
    /// Whether `next` is a legal successor of `self`
    pub fn can_transition_to(self, next: DispatchState) -> bool {
        use DispatchState::*;
        matches!(
            (self, next),
            (Init, Running)
                | (Running, Draining)
                | (Running, Cancelled)
                | (Draining, Done)
                | (Draining, Cancelled)
        )
    }

    /// Whether no further transitions are possible
    pub fn is_terminal(self) -> bool {
        matches!(self, DispatchState::Done | DispatchState::Cancelled)
    }
}

impl std::fmt::Display for DispatchState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DispatchState::Init => "init",
            DispatchState::Running => "running",
            DispatchState::Draining => "draining",
            DispatchState::Done => "done",
            DispatchState::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_transitions() {
        assert!(DispatchState::Init.can_transition_to(DispatchState::Running));
        assert!(DispatchState::Running.can_transition_to(DispatchState::Draining));
        assert!(DispatchState::Draining.can_transition_to(DispatchState::Done));
    }

    #[test]
    fn test_cancel_transitions() {
        assert!(DispatchState::Running.can_transition_to(DispatchState::Cancelled));
        assert!(DispatchState::Draining.can_transition_to(DispatchState::Cancelled));
        assert!(!DispatchState::Init.can_transition_to(DispatchState::Cancelled));
    }

    #[test]
    fn test_illegal_transitions() {
        assert!(!DispatchState::Init.can_transition_to(DispatchState::Done));
        assert!(!DispatchState::Done.can_transition_to(DispatchState::Running));
        assert!(!DispatchState::Cancelled.can_transition_to(DispatchState::Draining));
        assert!(!DispatchState::Running.can_transition_to(DispatchState::Running));
    }

    #[test]
    fn test_terminal_states() {
        assert!(DispatchState::Done.is_terminal());
        assert!(DispatchState::Cancelled.is_terminal());
        assert!(!DispatchState::Draining.is_terminal());
        assert_eq!(DispatchState::Cancelled.to_string(), "cancelled");
    }
}
