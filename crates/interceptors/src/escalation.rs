use async_trait::async_trait;
use serde_json::Value;
use tracing::error;

use domainhost_errors::prelude::labels;

use crate::context::{Invocation, InvocationContext};
use crate::errors::InterceptError;

/// Handed along the escalation chain when a call fails.
#[derive(Debug)]
pub struct ExceptionContext<'a> {
    context: &'a InvocationContext,
    error: InterceptError,
    handled: bool,
    proceed: bool,
    return_value: Value,
}

impl<'a> ExceptionContext<'a> {
    pub(crate) fn new(context: &'a InvocationContext, error: InterceptError) -> Self {
        Self {
            context,
            error,
            handled: false,
            proceed: false,
            return_value: Value::Null,
        }
    }

    pub fn context(&self) -> &InvocationContext {
        self.context
    }

    pub fn invocation(&self) -> &Invocation {
        self.context.invocation()
    }

    pub fn error(&self) -> &InterceptError {
        &self.error
    }

    pub fn user_name(&self) -> &str {
        self.context.caller_name()
    }

    pub fn is_handled(&self) -> bool {
        self.handled
    }

    pub fn mark_handled(&mut self) {
        self.handled = true;
    }

    pub fn should_continue(&self) -> bool {
        self.proceed
    }

    /// Handles the error and lets the call succeed with `value`.
    pub fn continue_with(&mut self, value: Value) {
        self.handled = true;
        self.proceed = true;
        self.return_value = value;
    }

    pub(crate) fn into_parts(self) -> (InterceptError, bool, bool, Value) {
        (self.error, self.handled, self.proceed, self.return_value)
    }
}

/// Terminal link of the escalation chain.
#[async_trait]
pub trait ExceptionHandler: Send + Sync {
    async fn handle(&self, ex: &mut ExceptionContext<'_>) -> Result<(), InterceptError>;
}

/// Logs the failure once and marks it handled. The error is still returned
/// to the caller because `continue` stays false. Install it as the pipeline's
/// terminal handler so it runs regardless of what the chain decided.
#[derive(Clone, Copy, Debug, Default)]
pub struct LoggingExceptionHandler;

#[async_trait]
impl ExceptionHandler for LoggingExceptionHandler {
    async fn handle(&self, ex: &mut ExceptionContext<'_>) -> Result<(), InterceptError> {
        let obj = ex.error().obj();
        let labels = labels(obj);
        let audit = serde_json::to_string(&obj.to_audit()).unwrap_or_default();
        error!(
            target_type = %ex.invocation().target_type(),
            method = %ex.invocation().method(),
            caller = %ex.user_name(),
            code = %obj.code,
            kind = labels.get("kind").map(String::as_str).unwrap_or_default(),
            handled = ex.is_handled(),
            audit = %audit,
            "invocation failed"
        );
        ex.mark_handled();
        Ok(())
    }
}
