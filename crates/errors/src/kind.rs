use serde::{Deserialize, Serialize};

/// Failure category. Together with the code it tells the host how to answer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Auth,
    Schema,
    NotFound,
    Conflict,
    Precondition,
    Cancelled,
    Internal,
}

impl ErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Auth => "auth",
            ErrorKind::Schema => "schema",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Precondition => "precondition",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Internal => "internal",
        }
    }

    /// The caller can fix these by changing the request or signing in.
    pub const fn is_caller_fault(self) -> bool {
        matches!(
            self,
            ErrorKind::Auth | ErrorKind::Schema | ErrorKind::NotFound | ErrorKind::Conflict
        )
    }
}

/// What the caller should do after seeing the error.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recovery {
    /// Open a (new) session first.
    SignIn,
    /// Change the arguments or the session key.
    FixRequest,
    /// The same call may succeed later.
    Retry,
    /// Nothing the caller can do.
    GiveUp,
}

impl Recovery {
    pub const fn as_str(self) -> &'static str {
        match self {
            Recovery::SignIn => "sign_in",
            Recovery::FixRequest => "fix_request",
            Recovery::Retry => "retry",
            Recovery::GiveUp => "give_up",
        }
    }
}
