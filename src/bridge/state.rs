//! Lifecycle of a single protected call

use std::fmt;

use tracing::trace;

use super::token::TokenId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    Entered,
    RunningUserCode,
    CompletedOk,
    UnwindSignaled,
    NativeFault,
    Reissued,
    ReportedToHost,
}

impl CallState {
    pub fn can_transition_to(self, next: CallState) -> bool {
        use CallState::*;
        matches!(
            (self, next),
            (Entered, RunningUserCode)
                | (Entered, NativeFault)
                | (RunningUserCode, CompletedOk)
                | (RunningUserCode, UnwindSignaled)
                | (RunningUserCode, NativeFault)
                | (UnwindSignaled, Reissued)
                | (NativeFault, ReportedToHost)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            CallState::CompletedOk | CallState::Reissued | CallState::ReportedToHost
        )
    }
}

impl fmt::Display for CallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CallState::Entered => "entered",
            CallState::RunningUserCode => "running_user_code",
            CallState::CompletedOk => "completed_ok",
            CallState::UnwindSignaled => "unwind_signaled",
            CallState::NativeFault => "native_fault",
            CallState::Reissued => "reissued",
            CallState::ReportedToHost => "reported_to_host",
        };
        f.write_str(name)
    }
}

/// State tracker for one coordinator invocation.
#[derive(Debug)]
pub struct ProtectedCall {
    token: TokenId,
    state: CallState,
}

impl ProtectedCall {
    pub fn new(token: TokenId) -> Self {
        trace!(token = %token, state = %CallState::Entered, "protected call entered");
        Self {
            token,
            state: CallState::Entered,
        }
    }

    #[inline]
    pub fn state(&self) -> CallState {
        self.state
    }

    pub fn advance(&mut self, next: CallState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid protected call transition {} -> {}",
            self.state,
            next
        );
        trace!(token = %self.token, from = %self.state, to = %next, "protected call transition");
        self.state = next;
    }
}
