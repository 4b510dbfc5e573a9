use async_trait::async_trait;
use tracing::debug;

use crate::context::{InvocationContext, Scope};
use crate::errors::InterceptError;
use crate::filter::{Filter, FilterKind};

/// Traces the start and end of every call not marked `SkipLogging`.
#[derive(Clone, Copy, Debug, Default)]
pub struct LoggingFilter;

#[async_trait]
impl Filter for LoggingFilter {
    fn kind(&self) -> FilterKind {
        FilterKind::Logging
    }

    fn can_run(&self, _scope: Scope, cx: &InvocationContext) -> bool {
        !(cx.method_flags().skips_logging() || cx.controller_flags().skips_logging())
    }

    async fn pre_call(&self, _scope: Scope, cx: &mut InvocationContext) -> Result<(), InterceptError> {
        debug!(
            target_type = %cx.target_type(),
            method = %cx.method(),
            caller = %cx.caller_name(),
            args = cx.invocation().arguments().len(),
            "invocation started"
        );
        Ok(())
    }

    async fn post_call(&self, _scope: Scope, cx: &mut InvocationContext) -> Result<(), InterceptError> {
        debug!(
            target_type = %cx.target_type(),
            method = %cx.method(),
            caller = %cx.caller_name(),
            elapsed_ms = cx.elapsed().as_millis() as u64,
            "invocation completed"
        );
        Ok(())
    }
}
