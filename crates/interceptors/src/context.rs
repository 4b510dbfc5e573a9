use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::time::Instant;

use domainhost_core_types::{Identity, Principal, SessionKey};

use crate::catalog::ResolvedMethod;
use crate::errors::InterceptError;
use crate::filter::Filter;
use crate::flags::FlagSet;
use crate::state::InvocationState;

/// Where a filter was declared.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Scope {
    Global,
    Controller,
    Method,
}

impl Scope {
    pub const fn as_str(self) -> &'static str {
        match self {
            Scope::Global => "global",
            Scope::Controller => "controller",
            Scope::Method => "method",
        }
    }
}

/// The raw call: target, method, arguments and the return slot.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Invocation {
    target_type: String,
    method: String,
    #[serde(default)]
    arguments: Vec<Value>,
    #[serde(default)]
    generic_arguments: Vec<String>,
    #[serde(default)]
    return_value: Value,
}

impl Invocation {
    pub fn new(target_type: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            target_type: target_type.into(),
            method: method.into(),
            ..Self::default()
        }
    }

    pub fn with_arguments(mut self, arguments: Vec<Value>) -> Self {
        self.arguments = arguments;
        self
    }

    pub fn with_argument(mut self, argument: Value) -> Self {
        self.arguments.push(argument);
        self
    }

    pub fn with_generic_argument(mut self, type_name: impl Into<String>) -> Self {
        self.generic_arguments.push(type_name.into());
        self
    }

    pub fn target_type(&self) -> &str {
        &self.target_type
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn arguments(&self) -> &[Value] {
        &self.arguments
    }

    pub fn argument(&self, index: usize) -> Option<&Value> {
        self.arguments.get(index)
    }

    pub fn set_argument(&mut self, index: usize, value: Value) -> Result<(), InterceptError> {
        let slot = self.arguments.get_mut(index).ok_or_else(|| {
            InterceptError::internal(&format!(
                "{}.{} has no argument {index}",
                self.target_type, self.method
            ))
        })?;
        *slot = value;
        Ok(())
    }

    pub fn generic_arguments(&self) -> &[String] {
        &self.generic_arguments
    }

    pub fn return_value(&self) -> &Value {
        &self.return_value
    }

    pub fn set_return_value(&mut self, value: Value) {
        self.return_value = value;
    }

    pub(crate) fn take_return_value(&mut self) -> Value {
        std::mem::take(&mut self.return_value)
    }
}

/// Response caching advice produced by a successful call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheHint {
    pub ttl: Duration,
    /// Set when the cached value must be keyed by caller.
    pub vary_by: Option<String>,
}

/// Per-call state handed to every filter. Built once, never shared.
#[derive(Debug)]
pub struct InvocationContext {
    caller: Identity,
    session: Option<SessionKey>,
    invocation: Invocation,
    resolved: Arc<ResolvedMethod>,
    state: InvocationState,
    started: Instant,
    cache_hint: Option<CacheHint>,
    items: Map<String, Value>,
}

impl InvocationContext {
    pub fn new(caller: Identity, invocation: Invocation, resolved: Arc<ResolvedMethod>) -> Self {
        Self {
            caller,
            session: None,
            invocation,
            resolved,
            state: InvocationState::Created,
            started: Instant::now(),
            cache_hint: None,
            items: Map::new(),
        }
    }

    pub fn with_session(mut self, session: Option<SessionKey>) -> Self {
        self.session = session;
        self
    }

    pub fn caller(&self) -> &Identity {
        &self.caller
    }

    /// Caller name for logs; anonymous callers render as "anonymous".
    pub fn caller_name(&self) -> &str {
        self.caller.name().unwrap_or("anonymous")
    }

    pub fn session(&self) -> Option<&SessionKey> {
        self.session.as_ref()
    }

    pub fn invocation(&self) -> &Invocation {
        &self.invocation
    }

    pub fn invocation_mut(&mut self) -> &mut Invocation {
        &mut self.invocation
    }

    pub fn target_type(&self) -> &str {
        self.invocation.target_type()
    }

    pub fn method(&self) -> &str {
        self.invocation.method()
    }

    pub fn method_filters(&self) -> &[Arc<dyn Filter>] {
        &self.resolved.method_filters
    }

    pub fn controller_filters(&self) -> &[Arc<dyn Filter>] {
        &self.resolved.controller_filters
    }

    pub fn method_flags(&self) -> &FlagSet {
        &self.resolved.method_flags
    }

    pub fn controller_flags(&self) -> &FlagSet {
        &self.resolved.controller_flags
    }

    pub(crate) fn resolved(&self) -> Arc<ResolvedMethod> {
        Arc::clone(&self.resolved)
    }

    pub fn state(&self) -> InvocationState {
        self.state
    }

    pub(crate) fn advance(&mut self, next: InvocationState) -> Result<(), InterceptError> {
        self.state.advance(next)
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn cache_hint(&self) -> Option<&CacheHint> {
        self.cache_hint.as_ref()
    }

    pub fn set_cache_hint(&mut self, hint: CacheHint) {
        self.cache_hint = Some(hint);
    }

    /// Scratch space for custom filters to pass data between hooks.
    pub fn items(&self) -> &Map<String, Value> {
        &self.items
    }

    pub fn items_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.items
    }

    pub(crate) fn into_outcome(mut self, value: Option<Value>) -> InvocationOutcome {
        let value = value.unwrap_or_else(|| self.invocation.take_return_value());
        InvocationOutcome {
            value,
            state: self.state,
            cache_hint: self.cache_hint,
            elapsed: self.started.elapsed(),
        }
    }
}

/// What a successful (or suppressed) call hands back to the caller.
#[derive(Clone, Debug, PartialEq)]
pub struct InvocationOutcome {
    pub value: Value,
    pub state: InvocationState,
    pub cache_hint: Option<CacheHint>,
    pub elapsed: Duration,
}

impl InvocationOutcome {
    pub fn was_suppressed(&self) -> bool {
        self.state == InvocationState::Suppressed
    }

    /// Decodes the return value into a concrete type.
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> Result<T, InterceptError> {
        serde_json::from_value(self.value.clone()).map_err(|err| {
            InterceptError::internal(&format!("return value does not decode: {err}"))
        })
    }
}
