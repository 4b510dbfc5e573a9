use crate::errors::InterceptError;

/// Lifecycle of one intercepted call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InvocationState {
    Created,
    Initialized,
    PreProceeding,
    Invoking,
    Succeeded,
    PostProceeding,
    Completed,
    Faulted,
    ExceptionHandling,
    Suppressed,
    Rethrown,
}

impl InvocationState {
    pub fn can_transition_to(self, next: InvocationState) -> bool {
        use InvocationState::*;
        matches!(
            (self, next),
            (Created, Initialized)
                | (Initialized, PreProceeding)
                | (PreProceeding, Invoking)
                | (PreProceeding, Faulted)
                | (Invoking, Succeeded)
                | (Invoking, Faulted)
                | (Succeeded, PostProceeding)
                | (PostProceeding, Completed)
                | (PostProceeding, Faulted)
                | (Faulted, ExceptionHandling)
                | (ExceptionHandling, Suppressed)
                | (ExceptionHandling, Rethrown)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            InvocationState::Completed | InvocationState::Suppressed | InvocationState::Rethrown
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            InvocationState::Created => "created",
            InvocationState::Initialized => "initialized",
            InvocationState::PreProceeding => "pre_proceeding",
            InvocationState::Invoking => "invoking",
            InvocationState::Succeeded => "succeeded",
            InvocationState::PostProceeding => "post_proceeding",
            InvocationState::Completed => "completed",
            InvocationState::Faulted => "faulted",
            InvocationState::ExceptionHandling => "exception_handling",
            InvocationState::Suppressed => "suppressed",
            InvocationState::Rethrown => "rethrown",
        }
    }

    pub(crate) fn advance(&mut self, next: InvocationState) -> Result<(), InterceptError> {
        if !self.can_transition_to(next) {
            return Err(InterceptError::internal(&format!(
                "illegal invocation transition {} -> {}",
                self.as_str(),
                next.as_str()
            )));
        }
        *self = next;
        Ok(())
    }
}
