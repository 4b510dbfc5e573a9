use async_trait::async_trait;

use domainhost_core_types::Principal;

use crate::context::{CacheHint, InvocationContext, Scope};
use crate::errors::InterceptError;
use crate::filter::{Filter, FilterKind};

/// Turns a method's `CacheHint` flag into a hint on the outcome.
#[derive(Clone, Copy, Debug, Default)]
pub struct CachingHintFilter;

#[async_trait]
impl Filter for CachingHintFilter {
    fn kind(&self) -> FilterKind {
        FilterKind::CachingHint
    }

    fn can_run(&self, _scope: Scope, cx: &InvocationContext) -> bool {
        cx.method_flags().cache_hint().is_some()
    }

    async fn post_call(&self, _scope: Scope, cx: &mut InvocationContext) -> Result<(), InterceptError> {
        let Some((ttl, per_caller)) = cx.method_flags().cache_hint() else {
            return Ok(());
        };
        let vary_by = if per_caller {
            Some(cx.caller().name().unwrap_or("anonymous").to_string())
        } else {
            None
        };
        cx.set_cache_hint(CacheHint { ttl, vary_by });
        Ok(())
    }
}
