use tracing::trace;
use uuid::Uuid;

/// A resource held for as long as one interceptor lives.
pub trait LifetimeScope: Send + Sync {
    fn id(&self) -> &str;

    /// Consumes the scope, so it can only ever be released once.
    fn release(self: Box<Self>);
}

pub trait ScopeFactory: Send + Sync {
    fn open(&self) -> Box<dyn LifetimeScope>;
}

/// Scope that only traces its own open/release.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingScopeFactory;

impl ScopeFactory for TracingScopeFactory {
    fn open(&self) -> Box<dyn LifetimeScope> {
        let id = Uuid::new_v4().to_string();
        trace!(scope = %id, "lifetime scope opened");
        Box::new(TracingScope { id })
    }
}

struct TracingScope {
    id: String,
}

impl LifetimeScope for TracingScope {
    fn id(&self) -> &str {
        &self.id
    }

    fn release(self: Box<Self>) {
        trace!(scope = %self.id, "lifetime scope released");
    }
}
