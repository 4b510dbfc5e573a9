pub use crate::catalog::{
    CatalogContextFactory, ContextFactory, MethodDescriptor, ResolvedMethod, ServiceCatalog,
    ServiceDescriptor,
};
pub use crate::context::{CacheHint, Invocation, InvocationContext, InvocationOutcome, Scope};
pub use crate::errors::InterceptError;
pub use crate::escalation::{ExceptionContext, ExceptionHandler, LoggingExceptionHandler};
pub use crate::filter::{Filter, FilterKind};
pub use crate::filters::{AuthorizationFilter, CachingHintFilter, LoggingFilter};
pub use crate::flags::{Flag, FlagSet, RoleLogic, RoleRequirement};
pub use crate::interceptor::{CallFuture, Interceptor, Pipeline, PipelineBuilder};
pub use crate::lifetime::{LifetimeScope, ScopeFactory, TracingScopeFactory};
pub use crate::proxy::ServiceProxy;
pub use crate::state::InvocationState;
