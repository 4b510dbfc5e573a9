use crate::kind::{ErrorKind, Recovery};
use once_cell::sync::Lazy;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ErrorCode(pub &'static str);

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

impl Serialize for ErrorCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.0)
    }
}

impl<'de> Deserialize<'de> for ErrorCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        // Known codes resolve to their static string; unknown ones fall back to internal.
        Ok(REGISTRY
            .get_key_value(s.as_str())
            .map(|(key, _)| ErrorCode(*key))
            .unwrap_or(codes::UNKNOWN_INTERNAL))
    }
}

#[derive(Clone, Debug)]
pub struct CodeSpec {
    pub code: ErrorCode,
    pub kind: ErrorKind,
    pub http_status: u16,
    pub recovery: Recovery,
    pub default_user_msg: &'static str,
}

pub mod codes {
    use super::ErrorCode;

    pub const SESSION_NOT_FOUND: ErrorCode = ErrorCode("SESSION.NOT_FOUND");
    pub const SESSION_DUPLICATED_KEY: ErrorCode = ErrorCode("SESSION.DUPLICATED_KEY");
    pub const SESSION_INVALID_KEY: ErrorCode = ErrorCode("SESSION.INVALID_KEY");
    pub const SESSION_INVALID_VALUE: ErrorCode = ErrorCode("SESSION.INVALID_VALUE");
    pub const SESSION_UPDATE_FAILED: ErrorCode = ErrorCode("SESSION.UPDATE_FAILED");
    pub const AUTH_UNAUTHENTICATED: ErrorCode = ErrorCode("AUTH.UNAUTHENTICATED");
    pub const AUTH_FORBIDDEN: ErrorCode = ErrorCode("AUTH.FORBIDDEN");
    pub const SCHEMA_VALIDATION: ErrorCode = ErrorCode("SCHEMA.VALIDATION_FAILED");
    pub const INVOCATION_CONTEXT_UNRESOLVED: ErrorCode =
        ErrorCode("INVOCATION.CONTEXT_UNRESOLVED");
    pub const INVOCATION_CANCELLED: ErrorCode = ErrorCode("INVOCATION.CANCELLED");
    pub const INVOCATION_HANDLER_FAULT: ErrorCode = ErrorCode("INVOCATION.HANDLER_FAULT");
    pub const UNKNOWN_INTERNAL: ErrorCode = ErrorCode("UNKNOWN.INTERNAL");
}

pub static REGISTRY: Lazy<HashMap<&'static str, CodeSpec>> = Lazy::new(|| {
    use codes::*;

    let mut map = HashMap::new();
    let mut add = |spec: CodeSpec| {
        let key = spec.code.0;
        if map.insert(key, spec).is_some() {
            panic!("duplicate error code: {}", key);
        }
    };

    add(CodeSpec {
        code: SESSION_NOT_FOUND,
        kind: ErrorKind::NotFound,
        http_status: 404,
        recovery: Recovery::SignIn,
        default_user_msg: "Session not found or expired.",
    });

    add(CodeSpec {
        code: SESSION_DUPLICATED_KEY,
        kind: ErrorKind::Conflict,
        http_status: 409,
        recovery: Recovery::FixRequest,
        default_user_msg: "A session with this key already exists.",
    });

    add(CodeSpec {
        code: SESSION_INVALID_KEY,
        kind: ErrorKind::Schema,
        http_status: 400,
        recovery: Recovery::FixRequest,
        default_user_msg: "Session key is missing or malformed.",
    });

    add(CodeSpec {
        code: SESSION_INVALID_VALUE,
        kind: ErrorKind::Schema,
        http_status: 422,
        recovery: Recovery::FixRequest,
        default_user_msg: "Session value is invalid.",
    });

    add(CodeSpec {
        code: SESSION_UPDATE_FAILED,
        kind: ErrorKind::Conflict,
        http_status: 409,
        recovery: Recovery::Retry,
        default_user_msg: "The session changed while it was being updated. Please retry.",
    });

    add(CodeSpec {
        code: AUTH_UNAUTHENTICATED,
        kind: ErrorKind::Auth,
        http_status: 401,
        recovery: Recovery::SignIn,
        default_user_msg: "Please sign in.",
    });

    add(CodeSpec {
        code: AUTH_FORBIDDEN,
        kind: ErrorKind::Auth,
        http_status: 403,
        recovery: Recovery::GiveUp,
        default_user_msg: "You don't have permission to perform this action.",
    });

    add(CodeSpec {
        code: SCHEMA_VALIDATION,
        kind: ErrorKind::Schema,
        http_status: 422,
        recovery: Recovery::FixRequest,
        default_user_msg: "Your request is invalid. Please check inputs.",
    });

    add(CodeSpec {
        code: INVOCATION_CONTEXT_UNRESOLVED,
        kind: ErrorKind::Precondition,
        http_status: 500,
        recovery: Recovery::GiveUp,
        default_user_msg: "The requested operation is not available.",
    });

    add(CodeSpec {
        code: INVOCATION_CANCELLED,
        kind: ErrorKind::Cancelled,
        http_status: 499,
        recovery: Recovery::Retry,
        default_user_msg: "The operation was cancelled.",
    });

    add(CodeSpec {
        code: INVOCATION_HANDLER_FAULT,
        kind: ErrorKind::Internal,
        http_status: 500,
        recovery: Recovery::GiveUp,
        default_user_msg: "Internal error. Please retry later.",
    });

    add(CodeSpec {
        code: UNKNOWN_INTERNAL,
        kind: ErrorKind::Internal,
        http_status: 500,
        recovery: Recovery::Retry,
        default_user_msg: "Internal error. Please retry later.",
    });

    map
});

static FALLBACK: CodeSpec = CodeSpec {
    code: codes::UNKNOWN_INTERNAL,
    kind: ErrorKind::Internal,
    http_status: 500,
    recovery: Recovery::Retry,
    default_user_msg: "Internal error. Please retry later.",
};

/// Looks up the registered spec, falling back to the internal-error spec for
/// codes that were never registered.
pub fn spec_of(code: ErrorCode) -> &'static CodeSpec {
    REGISTRY
        .get(code.0)
        .or_else(|| REGISTRY.get(codes::UNKNOWN_INTERNAL.0))
        .unwrap_or(&FALLBACK)
}
