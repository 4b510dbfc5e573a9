use domainhost_errors::prelude::*;
use domainhost_session::SessionError;
use serde_json::json;
use thiserror::Error;

use crate::flags::RoleRequirement;

/// Failure travelling through the pipeline. `source` keeps the error that was
/// being escalated when a handler itself failed.
#[derive(Debug, Error)]
#[error("{obj}")]
pub struct InterceptError {
    obj: ErrorObj,
    #[source]
    source: Option<Box<InterceptError>>,
}

impl InterceptError {
    pub fn from_error(obj: ErrorObj) -> Self {
        Self { obj, source: None }
    }

    pub fn from_public(code: ErrorCode, msg: &str) -> Self {
        Self::from_error(ErrorBuilder::new(code).user_msg(msg).build())
    }

    pub fn internal(msg: &str) -> Self {
        Self::from_error(
            ErrorBuilder::new(codes::UNKNOWN_INTERNAL)
                .user_msg("Internal error. Please retry later.")
                .dev_msg(msg)
                .build(),
        )
    }

    pub fn authentication_required(service: &str, method: &str) -> Self {
        Self::from_error(
            ErrorBuilder::new(codes::AUTH_UNAUTHENTICATED)
                .dev_msg(format!("{service}.{method} requires an authenticated caller"))
                .site(service, method)
                .build(),
        )
    }

    pub fn authorization_denied(caller: &str, requirement: &RoleRequirement) -> Self {
        let roles: Vec<&str> = requirement.roles().iter().map(String::as_str).collect();
        Self::from_error(
            ErrorBuilder::new(codes::AUTH_FORBIDDEN)
                .dev_msg(format!(
                    "caller '{caller}' lacks {} of the roles [{}]",
                    requirement.logic().as_str(),
                    roles.join(", ")
                ))
                .caller(caller)
                .detail("roles", json!(roles))
                .detail("logic", json!(requirement.logic().as_str()))
                .build(),
        )
    }

    pub fn context_unresolved(msg: impl Into<String>) -> Self {
        Self::from_error(
            ErrorBuilder::new(codes::INVOCATION_CONTEXT_UNRESOLVED)
                .dev_msg(msg)
                .build(),
        )
    }

    pub fn cancelled(service: &str, method: &str) -> Self {
        Self::from_error(
            ErrorBuilder::new(codes::INVOCATION_CANCELLED)
                .dev_msg(format!("{service}.{method} was cancelled before completion"))
                .site(service, method)
                .build(),
        )
    }

    /// A handler failed while escalating `original`. Both stay reachable:
    /// the fault as the first cause entry, the original as `source`.
    pub fn handler_fault(fault: InterceptError, original: InterceptError) -> Self {
        let obj = ErrorBuilder::new(codes::INVOCATION_HANDLER_FAULT)
            .dev_msg(format!(
                "exception handler failed ({}) while handling {}",
                fault.code(),
                original.code()
            ))
            .cause(&fault.obj)
            .cause(&original.obj)
            .build();
        Self {
            obj,
            source: Some(Box::new(original)),
        }
    }

    /// Records where the failure surfaced, keeping anything already known.
    pub fn locate(mut self, site: CallSite) -> Self {
        self.obj.locate(site);
        self
    }

    pub fn code(&self) -> ErrorCode {
        self.obj.code
    }

    pub fn is(&self, code: ErrorCode) -> bool {
        self.obj.is(code)
    }

    pub fn obj(&self) -> &ErrorObj {
        &self.obj
    }

    pub fn into_inner(self) -> ErrorObj {
        self.obj
    }

    /// The error a failing handler was escalating, if any.
    pub fn original(&self) -> Option<&InterceptError> {
        self.source.as_deref()
    }

    pub fn to_public(&self) -> PublicErrorView {
        self.obj.to_public()
    }

    pub fn to_http_response(&self) -> (u16, serde_json::Value) {
        self.obj.to_http_response()
    }
}

impl From<ErrorObj> for InterceptError {
    fn from(value: ErrorObj) -> Self {
        Self::from_error(value)
    }
}

impl From<SessionError> for InterceptError {
    fn from(value: SessionError) -> Self {
        Self::from_error(value.into_error_obj())
    }
}
