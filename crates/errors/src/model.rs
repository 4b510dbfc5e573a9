use crate::{
    code::{spec_of, ErrorCode},
    kind::{ErrorKind, Recovery},
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// The service call a failure surfaced in.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallSite {
    pub service: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caller: Option<String>,
}

impl CallSite {
    pub fn new(service: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            method: method.into(),
            caller: None,
        }
    }

    pub fn with_caller(mut self, caller: impl Into<String>) -> Self {
        self.caller = Some(caller.into());
        self
    }
}

/// A failure that led to this one, flattened to what the audit log needs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Cause {
    pub code: String,
    pub summary: String,
}

impl From<&ErrorObj> for Cause {
    fn from(err: &ErrorObj) -> Self {
        Self {
            code: err.code.0.to_string(),
            summary: err.message_dev.clone().unwrap_or_else(|| err.message_user.clone()),
        }
    }
}

#[derive(Clone, Debug, Error, Serialize, Deserialize)]
#[error("{code}: {message_user}")]
pub struct ErrorObj {
    pub code: ErrorCode,
    pub kind: ErrorKind,
    pub http_status: u16,
    pub recovery: Recovery,
    pub message_user: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_dev: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site: Option<CallSite>,
    /// Redacted session key, never the full key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub details: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub causes: Vec<Cause>,
}

impl ErrorObj {
    pub fn is(&self, code: ErrorCode) -> bool {
        self.code == code
    }

    pub fn detail_str(&self, key: &str) -> Option<&str> {
        self.details.get(key).and_then(Value::as_str)
    }

    /// Fills in whatever part of the call site the raiser did not know.
    pub fn locate(&mut self, site: CallSite) {
        match &mut self.site {
            None => self.site = Some(site),
            Some(known) => {
                if known.service.is_empty() {
                    known.service = site.service;
                    known.method = site.method;
                }
                if known.caller.is_none() {
                    known.caller = site.caller;
                }
            }
        }
    }
}

pub struct ErrorBuilder {
    code: ErrorCode,
    message_user: Option<String>,
    message_dev: Option<String>,
    site: Option<CallSite>,
    session: Option<String>,
    details: Map<String, Value>,
    causes: Vec<Cause>,
}

impl ErrorBuilder {
    pub fn new(code: ErrorCode) -> Self {
        Self {
            code,
            message_user: None,
            message_dev: None,
            site: None,
            session: None,
            details: Map::new(),
            causes: Vec::new(),
        }
    }

    pub fn user_msg(mut self, message: impl Into<String>) -> Self {
        self.message_user = Some(message.into());
        self
    }

    pub fn dev_msg(mut self, message: impl Into<String>) -> Self {
        self.message_dev = Some(message.into());
        self
    }

    pub fn site(mut self, service: &str, method: &str) -> Self {
        let caller = self.site.take().and_then(|site| site.caller);
        self.site = Some(CallSite {
            caller,
            ..CallSite::new(service, method)
        });
        self
    }

    pub fn caller(mut self, caller: impl Into<String>) -> Self {
        self.site.get_or_insert_with(CallSite::default).caller = Some(caller.into());
        self
    }

    pub fn session(mut self, redacted_key: impl Into<String>) -> Self {
        self.session = Some(redacted_key.into());
        self
    }

    pub fn detail(mut self, key: impl Into<String>, value: Value) -> Self {
        self.details.insert(key.into(), value);
        self
    }

    pub fn cause(mut self, cause: &ErrorObj) -> Self {
        self.causes.push(Cause::from(cause));
        self
    }

    pub fn build(self) -> ErrorObj {
        let spec = spec_of(self.code);
        ErrorObj {
            code: self.code,
            kind: spec.kind,
            http_status: spec.http_status,
            recovery: spec.recovery,
            message_user: self
                .message_user
                .unwrap_or_else(|| spec.default_user_msg.to_string()),
            message_dev: self.message_dev,
            site: self.site,
            session: self.session,
            details: self.details,
            causes: self.causes,
        }
    }
}
