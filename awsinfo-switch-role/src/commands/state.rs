//! Lifecycle of one resolution request

use log::debug;

/// `Start -> FetchingGroups -> FetchingPolicies -> ExtractingRoles -> Done`,
/// with `Failed` reachable from every non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionState {
    Start,
    FetchingGroups,
    FetchingPolicies,
    ExtractingRoles,
    Done,
    Failed,
}

impl ResolutionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    pub fn can_transition_to(self, next: Self) -> bool {
        match next {
            Self::Failed => !self.is_terminal(),
            _ => matches!(
                (self, next),
                (Self::Start, Self::FetchingGroups)
                    | (Self::FetchingGroups, Self::FetchingPolicies)
                    | (Self::FetchingPolicies, Self::ExtractingRoles)
                    | (Self::ExtractingRoles, Self::Done)
            ),
        }
    }
}

/// Tracks and logs the state of a single `resolve` call.
#[derive(Debug)]
pub(crate) struct StateMachine {
    user_name: String,
    state: ResolutionState,
}

impl StateMachine {
    pub(crate) fn new(user_name: &str) -> Self {
        Self {
            user_name: user_name.to_string(),
            state: ResolutionState::Start,
        }
    }

    pub(crate) fn state(&self) -> ResolutionState {
        self.state
    }

    pub(crate) fn advance(&mut self, next: ResolutionState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid transition {:?} -> {:?}",
            self.state,
            next
        );
        debug!("[{}] {:?} -> {:?}", self.user_name, self.state, next);
        self.state = next;
    }

    pub(crate) fn fail(&mut self, reason: &dyn std::fmt::Display) {
        if self.state.is_terminal() {
            return;
        }
        debug!(
            "[{}] {:?} -> Failed: {reason}",
            self.user_name, self.state
        );
        self.state = ResolutionState::Failed;
    }
}
