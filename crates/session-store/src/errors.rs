use domainhost_errors::prelude::*;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("session '{0}' not found")]
    NotFound(String),
    #[error("session key '{0}' already exists")]
    DuplicatedKey(String),
    #[error("session key is empty or whitespace")]
    InvalidKey,
    #[error("invalid session value: {0}")]
    InvalidValue(String),
    #[error("session '{0}' was removed or replaced during the update")]
    UpdateFailed(String),
    #[error("invalid session configuration: {0}")]
    InvalidConfig(String),
}

impl SessionError {
    pub fn code(&self) -> ErrorCode {
        match self {
            SessionError::NotFound(_) => codes::SESSION_NOT_FOUND,
            SessionError::DuplicatedKey(_) => codes::SESSION_DUPLICATED_KEY,
            SessionError::InvalidKey => codes::SESSION_INVALID_KEY,
            SessionError::InvalidValue(_) => codes::SESSION_INVALID_VALUE,
            SessionError::UpdateFailed(_) => codes::SESSION_UPDATE_FAILED,
            SessionError::InvalidConfig(_) => codes::SCHEMA_VALIDATION,
        }
    }

    /// The redacted key the error is about, when there is one.
    pub fn session(&self) -> Option<&str> {
        match self {
            SessionError::NotFound(key)
            | SessionError::DuplicatedKey(key)
            | SessionError::UpdateFailed(key) => Some(key),
            _ => None,
        }
    }

    pub fn into_error_obj(self) -> ErrorObj {
        let mut builder = ErrorBuilder::new(self.code()).dev_msg(self.to_string());
        if let Some(key) = self.session() {
            builder = builder.session(key);
        }
        builder.build()
    }
}

impl From<SessionError> for ErrorObj {
    fn from(value: SessionError) -> Self {
        value.into_error_obj()
    }
}
