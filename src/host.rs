use std::sync::Arc;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::info;

use domainhost_core_types::{Identity, SessionKey};
use domainhost_interceptors::prelude::*;
use domainhost_session::{
    KeyObfuscator, MemorySessionStore, SessionError, SessionEvent, SessionRecord, SessionStore,
};

use crate::config::{ConfigError, HostConfig};

/// Owns the session store and the interception pipeline for one application.
pub struct DomainHost {
    config: HostConfig,
    sessions: Arc<MemorySessionStore>,
    catalog: Arc<ServiceCatalog>,
    pipeline: Arc<Pipeline>,
    cancel: CancellationToken,
}

pub struct DomainHostBuilder {
    config: HostConfig,
    catalog: ServiceCatalog,
    filters: Vec<Arc<dyn Filter>>,
    handlers: Vec<Arc<dyn ExceptionHandler>>,
    scopes: Option<Arc<dyn ScopeFactory>>,
    keys: Option<Arc<dyn KeyObfuscator>>,
}

impl DomainHostBuilder {
    pub fn service(mut self, descriptor: ServiceDescriptor) -> Self {
        self.catalog.register(descriptor);
        self
    }

    /// Runs after the built-in global filters.
    pub fn global_filter(mut self, filter: Arc<dyn Filter>) -> Self {
        self.filters.push(filter);
        self
    }

    /// Joins the escalation chain. The failure is logged afterwards either
    /// way, unless a handler lets the call continue.
    pub fn exception_handler(mut self, handler: Arc<dyn ExceptionHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    pub fn scope_factory(mut self, scopes: Arc<dyn ScopeFactory>) -> Self {
        self.scopes = Some(scopes);
        self
    }

    pub fn key_obfuscator(mut self, keys: Arc<dyn KeyObfuscator>) -> Self {
        self.keys = Some(keys);
        self
    }

    pub fn build(self) -> Result<DomainHost, ConfigError> {
        self.config.validate()?;
        let sessions = match self.keys {
            Some(keys) => MemorySessionStore::with_obfuscator(self.config.session.clone(), keys)?,
            None => MemorySessionStore::new(self.config.session.clone())?,
        };

        let catalog = Arc::new(self.catalog);
        let cancel = CancellationToken::new();
        let interception = &self.config.interception;
        let mut builder = Pipeline::builder(Arc::new(CatalogContextFactory::new(Arc::clone(&catalog))))
            .cancellation(cancel.clone());
        if interception.global_authorization {
            builder = builder.global_filter(Arc::new(AuthorizationFilter));
        }
        if interception.logging_filter {
            builder = builder.global_filter(Arc::new(LoggingFilter));
        }
        if interception.caching_hints {
            builder = builder.global_filter(Arc::new(CachingHintFilter));
        }
        for filter in self.filters {
            builder = builder.global_filter(filter);
        }
        for handler in self.handlers {
            builder = builder.handler(handler);
        }
        if interception.log_exceptions {
            builder = builder.terminal_handler(Arc::new(LoggingExceptionHandler));
        }
        if let Some(scopes) = self.scopes {
            builder = builder.scope_factory(scopes);
        }

        Ok(DomainHost {
            config: self.config,
            sessions: Arc::new(sessions),
            catalog,
            pipeline: builder.build(),
            cancel,
        })
    }
}

impl DomainHost {
    pub fn builder(config: HostConfig) -> DomainHostBuilder {
        DomainHostBuilder {
            config,
            catalog: ServiceCatalog::new(),
            filters: Vec::new(),
            handlers: Vec::new(),
            scopes: None,
            keys: None,
        }
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    pub fn sessions(&self) -> &Arc<MemorySessionStore> {
        &self.sessions
    }

    pub fn catalog(&self) -> &Arc<ServiceCatalog> {
        &self.catalog
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent<Identity>> {
        self.sessions.subscribe()
    }

    /// Starts the background session sweeper.
    pub fn start(&self) {
        self.sessions.start_sweeper();
        info!(
            services = self.catalog.services().count(),
            ttl = ?self.config.session.ttl,
            "domain host started"
        );
    }

    /// Opens a session for `identity` under a generated key.
    pub async fn sign_in(&self, identity: Identity) -> Result<Arc<SessionRecord>, SessionError> {
        self.sessions.create_session(identity, None).await
    }

    pub async fn sign_out(&self, key: &SessionKey) -> Result<Arc<SessionRecord>, SessionError> {
        self.sessions.abandon_session(key).await
    }

    /// Activates the session and binds a proxy to its identity.
    pub async fn proxy(&self, key: &SessionKey) -> Result<ServiceProxy, InterceptError> {
        let record = self.sessions.get_and_active_session(key).await?;
        let interceptor = Interceptor::new(
            Arc::clone(&self.pipeline),
            Some(record.value()),
            Some(key.clone()),
        );
        Ok(ServiceProxy::new(interceptor))
    }

    /// A proxy for callers without a session.
    pub fn anonymous_proxy(&self) -> ServiceProxy {
        ServiceProxy::new(Interceptor::new(
            Arc::clone(&self.pipeline),
            Some(Identity::anonymous()),
            None,
        ))
    }

    /// Cancels in-flight calls and stops the sweeper.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        self.sessions.shutdown().await;
        info!(remaining_sessions = self.sessions.len(), "domain host stopped");
    }
}
