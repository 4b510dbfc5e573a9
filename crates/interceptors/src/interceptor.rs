use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info_span, Instrument};

use domainhost_core_types::{Identity, SessionKey};
use domainhost_errors::prelude::CallSite;

use crate::catalog::{ContextFactory, ResolvedMethod};
use crate::context::{Invocation, InvocationContext, InvocationOutcome, Scope};
use crate::errors::InterceptError;
use crate::escalation::{ExceptionContext, ExceptionHandler};
use crate::filter::Filter;
use crate::lifetime::{LifetimeScope, ScopeFactory, TracingScopeFactory};
use crate::state::InvocationState;

/// The real call. It may rewrite arguments before reading them.
pub type CallFuture<'a> = BoxFuture<'a, Result<Value, InterceptError>>;

/// Everything shared by the interceptors of one host.
pub struct Pipeline {
    factory: Arc<dyn ContextFactory>,
    global_filters: Vec<Arc<dyn Filter>>,
    handlers: Vec<Arc<dyn ExceptionHandler>>,
    terminal: Option<Arc<dyn ExceptionHandler>>,
    scopes: Arc<dyn ScopeFactory>,
    cancel: CancellationToken,
}

pub struct PipelineBuilder {
    factory: Arc<dyn ContextFactory>,
    global_filters: Vec<Arc<dyn Filter>>,
    handlers: Vec<Arc<dyn ExceptionHandler>>,
    terminal: Option<Arc<dyn ExceptionHandler>>,
    scopes: Option<Arc<dyn ScopeFactory>>,
    cancel: Option<CancellationToken>,
}

impl PipelineBuilder {
    pub fn global_filter(mut self, filter: Arc<dyn Filter>) -> Self {
        self.global_filters.push(filter);
        self
    }

    pub fn handler(mut self, handler: Arc<dyn ExceptionHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    /// Runs once for every escalated failure after the handler chain,
    /// whether or not a link marked it handled. Skipped only when the chain
    /// let the call continue.
    pub fn terminal_handler(mut self, handler: Arc<dyn ExceptionHandler>) -> Self {
        self.terminal = Some(handler);
        self
    }

    pub fn scope_factory(mut self, scopes: Arc<dyn ScopeFactory>) -> Self {
        self.scopes = Some(scopes);
        self
    }

    /// Parent token; cancelling it cancels every in-flight call.
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn build(self) -> Arc<Pipeline> {
        Arc::new(Pipeline {
            factory: self.factory,
            global_filters: self.global_filters,
            handlers: self.handlers,
            terminal: self.terminal,
            scopes: self.scopes.unwrap_or_else(|| Arc::new(TracingScopeFactory)),
            cancel: self.cancel.unwrap_or_default(),
        })
    }
}

impl Pipeline {
    pub fn builder(factory: Arc<dyn ContextFactory>) -> PipelineBuilder {
        PipelineBuilder {
            factory,
            global_filters: Vec::new(),
            handlers: Vec::new(),
            terminal: None,
            scopes: None,
            cancel: None,
        }
    }

    pub fn global_filters(&self) -> &[Arc<dyn Filter>] {
        &self.global_filters
    }

    pub fn cancel_all(&self) {
        self.cancel.cancel();
    }
}

/// Wraps calls made on behalf of one caller. Owns a lifetime scope that is
/// released when the interceptor is disposed or dropped, whichever is first.
pub struct Interceptor {
    pipeline: Arc<Pipeline>,
    caller: Option<Identity>,
    session: Option<SessionKey>,
    cancel: CancellationToken,
    scope: Option<Box<dyn LifetimeScope>>,
}

impl Interceptor {
    pub fn new(pipeline: Arc<Pipeline>, caller: Option<Identity>, session: Option<SessionKey>) -> Self {
        let scope = pipeline.scopes.open();
        let cancel = pipeline.cancel.child_token();
        Self {
            pipeline,
            caller,
            session,
            cancel,
            scope: Some(scope),
        }
    }

    pub fn caller(&self) -> Option<&Identity> {
        self.caller.as_ref()
    }

    pub fn session(&self) -> Option<&SessionKey> {
        self.session.as_ref()
    }

    pub fn scope_id(&self) -> Option<&str> {
        self.scope.as_ref().map(|scope| scope.id())
    }

    /// Cancels calls made through this interceptor only.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn dispose(mut self) {
        self.release_scope();
    }

    fn release_scope(&mut self) {
        if let Some(scope) = self.scope.take() {
            scope.release();
        }
    }

    pub async fn intercept<F>(
        &self,
        invocation: Invocation,
        call: F,
    ) -> Result<InvocationOutcome, InterceptError>
    where
        F: for<'a> FnOnce(&'a mut Invocation) -> CallFuture<'a> + Send,
    {
        let span = info_span!(
            "invoke",
            target_type = %invocation.target_type(),
            method = %invocation.method(),
        );
        self.run(invocation, call).instrument(span).await
    }

    async fn run<F>(&self, invocation: Invocation, call: F) -> Result<InvocationOutcome, InterceptError>
    where
        F: for<'a> FnOnce(&'a mut Invocation) -> CallFuture<'a> + Send,
    {
        let mut cx =
            self.pipeline
                .factory
                .build(invocation, self.caller.as_ref(), self.session.as_ref())?;
        cx.advance(InvocationState::Initialized)?;

        match self.proceed(&mut cx, call).await {
            Ok(()) => Ok(cx.into_outcome(None)),
            Err(err) => {
                cx.advance(InvocationState::Faulted)?;
                self.escalate(cx, err).await
            }
        }
    }

    async fn proceed<F>(&self, cx: &mut InvocationContext, call: F) -> Result<(), InterceptError>
    where
        F: for<'a> FnOnce(&'a mut Invocation) -> CallFuture<'a> + Send,
    {
        let resolved = cx.resolved();
        let layers = [
            (Scope::Global, self.pipeline.global_filters.as_slice()),
            (Scope::Controller, resolved.controller_filters.as_slice()),
            (Scope::Method, resolved.method_filters.as_slice()),
        ];

        cx.advance(InvocationState::PreProceeding)?;
        for (scope, filters) in layers {
            for filter in filters {
                if filter.can_run(scope, cx) {
                    filter.pre_call(scope, cx).await?;
                }
            }
        }

        cx.advance(InvocationState::Invoking)?;
        let service = cx.target_type().to_string();
        let method = cx.method().to_string();
        let value = {
            let real = call(cx.invocation_mut());
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => Err(InterceptError::cancelled(&service, &method)),
                result = real => result,
            }
        }?;
        cx.invocation_mut().set_return_value(value);
        cx.advance(InvocationState::Succeeded)?;

        cx.advance(InvocationState::PostProceeding)?;
        for (scope, filters) in layers.into_iter().rev() {
            for filter in filters.iter().rev() {
                if filter.can_run(scope, cx) {
                    filter.post_call(scope, cx).await?;
                }
            }
        }
        cx.advance(InvocationState::Completed)
    }

    async fn escalate(
        &self,
        mut cx: InvocationContext,
        error: InterceptError,
    ) -> Result<InvocationOutcome, InterceptError> {
        cx.advance(InvocationState::ExceptionHandling)?;
        let resolved = cx.resolved();
        let error = error.locate(
            CallSite::new(cx.target_type(), cx.method()).with_caller(cx.caller_name()),
        );
        let (fault, (error, handled, proceed, value)) = {
            let mut ex = ExceptionContext::new(&cx, error);
            let mut fault = self.run_escalation(&resolved, &mut ex).await.err();
            if fault.is_some() || !ex.should_continue() {
                if let Some(terminal) = &self.pipeline.terminal {
                    if let Err(err) = terminal.handle(&mut ex).await {
                        fault.get_or_insert(err);
                    }
                }
            }
            (fault, ex.into_parts())
        };

        if let Some(fault) = fault {
            cx.advance(InvocationState::Rethrown)?;
            return Err(InterceptError::handler_fault(fault, error));
        }
        if handled && proceed {
            cx.advance(InvocationState::Suppressed)?;
            debug!(code = %error.code(), "failure suppressed, call continues");
            return Ok(cx.into_outcome(Some(value)));
        }
        cx.advance(InvocationState::Rethrown)?;
        Err(error)
    }

    /// Filters first (method, controller, global), then the handlers. Stops at
    /// the first link that marks the failure handled.
    async fn run_escalation(
        &self,
        resolved: &ResolvedMethod,
        ex: &mut ExceptionContext<'_>,
    ) -> Result<(), InterceptError> {
        let layers = [
            (Scope::Method, resolved.method_filters.as_slice()),
            (Scope::Controller, resolved.controller_filters.as_slice()),
            (Scope::Global, self.pipeline.global_filters.as_slice()),
        ];
        for (scope, filters) in layers {
            for filter in filters {
                if filter.can_run(scope, ex.context()) {
                    filter.on_exception(scope, ex).await?;
                    if ex.is_handled() {
                        return Ok(());
                    }
                }
            }
        }
        for handler in &self.pipeline.handlers {
            handler.handle(ex).await?;
            if ex.is_handled() {
                return Ok(());
            }
        }
        Ok(())
    }
}

impl Drop for Interceptor {
    fn drop(&mut self) {
        self.release_scope();
    }
}
