use crate::model::{CallSite, Cause, ErrorObj};
use serde::Serialize;
use serde_json::{Map, Value};

/// What a remote caller may see.
#[derive(Debug, Serialize)]
pub struct PublicErrorView {
    pub code: &'static str,
    pub message: String,
    pub recovery: &'static str,
}

/// The record the exception log keeps for a failed call.
#[derive(Debug, Serialize)]
pub struct AuditErrorView<'a> {
    pub code: &'static str,
    pub kind: &'static str,
    pub http_status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_dev: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site: Option<&'a CallSite>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<&'a str>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub details: &'a Map<String, Value>,
    #[serde(skip_serializing_if = "<[Cause]>::is_empty")]
    pub causes: &'a [Cause],
}

impl ErrorObj {
    pub fn to_public(&self) -> PublicErrorView {
        PublicErrorView {
            code: self.code.0,
            message: self.message_user.clone(),
            recovery: self.recovery.as_str(),
        }
    }

    pub fn to_audit(&self) -> AuditErrorView<'_> {
        AuditErrorView {
            code: self.code.0,
            kind: self.kind.as_str(),
            http_status: self.http_status,
            message_dev: self.message_dev.as_deref(),
            site: self.site.as_ref(),
            session: self.session.as_deref(),
            details: &self.details,
            causes: &self.causes,
        }
    }

    /// Status hint plus the public JSON body, for host layers that speak HTTP.
    pub fn to_http_response(&self) -> (u16, Value) {
        let body = serde_json::to_value(self.to_public()).unwrap_or(Value::Null);
        (self.http_status, body)
    }
}
