//! Capability table describing which filters and flags apply to each call.
//!
//! Declarations are resolved once at registration so the per-call path only
//! clones an `Arc`.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use domainhost_core_types::Identity;
use domainhost_core_types::SessionKey;

use crate::context::{Invocation, InvocationContext};
use crate::errors::InterceptError;
use crate::filter::Filter;
use crate::flags::{Flag, FlagSet};

/// Declarations on one method.
#[derive(Clone, Default)]
pub struct MethodDescriptor {
    name: String,
    filters: Vec<Arc<dyn Filter>>,
    flags: Vec<Flag>,
}

impl MethodDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn filter(mut self, filter: Arc<dyn Filter>) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn flag(mut self, flag: Flag) -> Self {
        self.flags.push(flag);
        self
    }
}

/// Declarations on a service (the controller scope) and its methods.
#[derive(Clone, Default)]
pub struct ServiceDescriptor {
    name: String,
    filters: Vec<Arc<dyn Filter>>,
    flags: Vec<Flag>,
    methods: Vec<MethodDescriptor>,
}

impl ServiceDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn filter(mut self, filter: Arc<dyn Filter>) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn flag(mut self, flag: Flag) -> Self {
        self.flags.push(flag);
        self
    }

    pub fn method(mut self, method: MethodDescriptor) -> Self {
        self.methods.push(method);
        self
    }
}

/// Filter lists and flags for one (service, method) pair.
pub struct ResolvedMethod {
    pub method_filters: Vec<Arc<dyn Filter>>,
    pub controller_filters: Vec<Arc<dyn Filter>>,
    pub method_flags: FlagSet,
    pub controller_flags: FlagSet,
}

impl fmt::Debug for ResolvedMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids = |filters: &[Arc<dyn Filter>]| filters.iter().map(|x| x.id()).collect::<Vec<_>>();
        f.debug_struct("ResolvedMethod")
            .field("method_filters", &ids(&self.method_filters))
            .field("controller_filters", &ids(&self.controller_filters))
            .field("method_flags", &self.method_flags)
            .field("controller_flags", &self.controller_flags)
            .finish()
    }
}

fn dedup(filters: &[Arc<dyn Filter>], exclude: &HashSet<&'static str>) -> Vec<Arc<dyn Filter>> {
    let mut seen = HashSet::new();
    filters
        .iter()
        .filter(|filter| !exclude.contains(filter.id()) && seen.insert(filter.id()))
        .cloned()
        .collect()
}

struct ResolvedService {
    methods: HashMap<String, Arc<ResolvedMethod>>,
    /// Used for methods the service never declared.
    fallback: Arc<ResolvedMethod>,
}

impl ResolvedService {
    fn resolve(descriptor: ServiceDescriptor) -> Self {
        let controller_flags = FlagSet::new(descriptor.flags);
        let fallback = Arc::new(ResolvedMethod {
            method_filters: Vec::new(),
            controller_filters: dedup(&descriptor.filters, &HashSet::new()),
            method_flags: FlagSet::default(),
            controller_flags: controller_flags.clone(),
        });

        let methods = descriptor
            .methods
            .into_iter()
            .map(|method| {
                let method_filters = dedup(&method.filters, &HashSet::new());
                let at_method: HashSet<&'static str> =
                    method_filters.iter().map(|filter| filter.id()).collect();
                let resolved = ResolvedMethod {
                    controller_filters: dedup(&descriptor.filters, &at_method),
                    method_filters,
                    method_flags: FlagSet::new(method.flags),
                    controller_flags: controller_flags.clone(),
                };
                (method.name, Arc::new(resolved))
            })
            .collect();

        Self { methods, fallback }
    }
}

#[derive(Default)]
pub struct ServiceCatalog {
    services: HashMap<String, ResolvedService>,
}

impl ServiceCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) a service.
    pub fn register(&mut self, descriptor: ServiceDescriptor) -> &mut Self {
        let name = descriptor.name.clone();
        let methods = descriptor.methods.len();
        if self
            .services
            .insert(name.clone(), ResolvedService::resolve(descriptor))
            .is_some()
        {
            warn!(service = %name, "service re-registered; previous declarations replaced");
        } else {
            debug!(service = %name, methods, "service registered");
        }
        self
    }

    pub fn with(mut self, descriptor: ServiceDescriptor) -> Self {
        self.register(descriptor);
        self
    }

    pub fn contains(&self, service: &str) -> bool {
        self.services.contains_key(service)
    }

    pub fn services(&self) -> impl Iterator<Item = &str> {
        self.services.keys().map(String::as_str)
    }

    pub fn lookup(&self, service: &str, method: &str) -> Option<Arc<ResolvedMethod>> {
        let resolved = self.services.get(service)?;
        let method = resolved.methods.get(method).unwrap_or(&resolved.fallback);
        Some(Arc::clone(method))
    }
}

/// Builds the per-call context from a raw call and the bound caller.
pub trait ContextFactory: Send + Sync {
    fn build(
        &self,
        invocation: Invocation,
        caller: Option<&Identity>,
        session: Option<&SessionKey>,
    ) -> Result<InvocationContext, InterceptError>;
}

pub struct CatalogContextFactory {
    catalog: Arc<ServiceCatalog>,
}

impl CatalogContextFactory {
    pub fn new(catalog: Arc<ServiceCatalog>) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &Arc<ServiceCatalog> {
        &self.catalog
    }
}

impl ContextFactory for CatalogContextFactory {
    fn build(
        &self,
        invocation: Invocation,
        caller: Option<&Identity>,
        session: Option<&SessionKey>,
    ) -> Result<InvocationContext, InterceptError> {
        let caller = caller.ok_or_else(|| {
            InterceptError::context_unresolved(format!(
                "no caller bound for {}.{}",
                invocation.target_type(),
                invocation.method()
            ))
        })?;
        let resolved = self
            .catalog
            .lookup(invocation.target_type(), invocation.method())
            .ok_or_else(|| {
                InterceptError::context_unresolved(format!(
                    "service '{}' is not registered",
                    invocation.target_type()
                ))
            })?;
        Ok(InvocationContext::new(caller.clone(), invocation, resolved).with_session(session.cloned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::{AuthorizationFilter, LoggingFilter};

    struct Audit;

    #[async_trait::async_trait]
    impl Filter for Audit {}

    fn ids(filters: &[Arc<dyn Filter>]) -> Vec<&'static str> {
        filters.iter().map(|filter| filter.id()).collect()
    }

    #[test]
    fn method_scope_wins_over_controller_scope() {
        let catalog = ServiceCatalog::new().with(
            ServiceDescriptor::new("accounts")
                .filter(Arc::new(LoggingFilter))
                .filter(Arc::new(Audit))
                .filter(Arc::new(Audit))
                .method(
                    MethodDescriptor::new("close")
                        .filter(Arc::new(Audit))
                        .filter(Arc::new(AuthorizationFilter))
                        .filter(Arc::new(AuthorizationFilter)),
                ),
        );

        let close = catalog.lookup("accounts", "close").unwrap();
        assert_eq!(
            ids(&close.method_filters),
            vec![Audit.id(), AuthorizationFilter.id()]
        );
        assert_eq!(ids(&close.controller_filters), vec![LoggingFilter.id()]);

        let other = catalog.lookup("accounts", "balance").unwrap();
        assert!(other.method_filters.is_empty());
        assert_eq!(
            ids(&other.controller_filters),
            vec![LoggingFilter.id(), Audit.id()]
        );
    }

    #[test]
    fn factory_rejects_unknown_service_and_missing_caller() {
        let catalog = Arc::new(ServiceCatalog::new().with(ServiceDescriptor::new("accounts")));
        let factory = CatalogContextFactory::new(catalog);
        let caller = Identity::user("amy", ["ops"]);

        let err = factory
            .build(Invocation::new("ledger", "post"), Some(&caller), None)
            .unwrap_err();
        assert!(err.is(domainhost_errors::prelude::codes::INVOCATION_CONTEXT_UNRESOLVED));

        let err = factory
            .build(Invocation::new("accounts", "open"), None, None)
            .unwrap_err();
        assert!(err.is(domainhost_errors::prelude::codes::INVOCATION_CONTEXT_UNRESOLVED));

        let cx = factory
            .build(Invocation::new("accounts", "open"), Some(&caller), None)
            .unwrap();
        assert_eq!(cx.caller_name(), "amy");
    }
}
