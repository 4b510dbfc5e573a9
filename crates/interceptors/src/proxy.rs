use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use domainhost_core_types::{Identity, SessionKey};

use crate::context::{Invocation, InvocationOutcome};
use crate::errors::InterceptError;
use crate::interceptor::{CallFuture, Interceptor};

/// Session-bound entry point for calling services through the pipeline.
///
/// Typed service decorators hold one of these and forward each method as a
/// `call` with a closure doing the real work. Clones share one interceptor.
#[derive(Clone)]
pub struct ServiceProxy {
    interceptor: Arc<Interceptor>,
}

impl ServiceProxy {
    pub fn new(interceptor: Interceptor) -> Self {
        Self {
            interceptor: Arc::new(interceptor),
        }
    }

    pub fn caller(&self) -> Option<&Identity> {
        self.interceptor.caller()
    }

    pub fn session(&self) -> Option<&SessionKey> {
        self.interceptor.session()
    }

    pub fn interceptor(&self) -> &Interceptor {
        &self.interceptor
    }

    pub async fn call<F>(
        &self,
        service: &str,
        method: &str,
        args: Vec<Value>,
        call: F,
    ) -> Result<InvocationOutcome, InterceptError>
    where
        F: for<'a> FnOnce(&'a mut Invocation) -> CallFuture<'a> + Send,
    {
        let invocation = Invocation::new(service, method).with_arguments(args);
        self.interceptor.intercept(invocation, call).await
    }

    /// `call`, then decode the return value.
    pub async fn call_as<T, F>(
        &self,
        service: &str,
        method: &str,
        args: Vec<Value>,
        call: F,
    ) -> Result<T, InterceptError>
    where
        T: DeserializeOwned,
        F: for<'a> FnOnce(&'a mut Invocation) -> CallFuture<'a> + Send,
    {
        self.call(service, method, args, call).await?.decode()
    }
}
