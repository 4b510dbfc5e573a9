use async_trait::async_trait;

use crate::context::{InvocationContext, Scope};
use crate::errors::InterceptError;
use crate::escalation::ExceptionContext;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FilterKind {
    Authorization,
    Logging,
    CachingHint,
    Custom,
}

/// A unit of cross-cutting behaviour wrapped around a call.
///
/// Hooks run only when `can_run` returns true for the scope the filter was
/// declared at. Two filters with the same `id` are the same filter for
/// de-duplication purposes.
#[async_trait]
pub trait Filter: Send + Sync {
    fn id(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    fn kind(&self) -> FilterKind {
        FilterKind::Custom
    }

    fn can_run(&self, _scope: Scope, _cx: &InvocationContext) -> bool {
        true
    }

    async fn pre_call(&self, _scope: Scope, _cx: &mut InvocationContext) -> Result<(), InterceptError> {
        Ok(())
    }

    async fn post_call(&self, _scope: Scope, _cx: &mut InvocationContext) -> Result<(), InterceptError> {
        Ok(())
    }

    /// Takes part in escalation; mark the context handled to stop it.
    async fn on_exception(
        &self,
        _scope: Scope,
        _ex: &mut ExceptionContext<'_>,
    ) -> Result<(), InterceptError> {
        Ok(())
    }
}
