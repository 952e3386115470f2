//! Unified error model for the user session widget and its collaborators.
//! Every variant carries a stable machine code and a human message, so the
//! same value can be logged, shown in a failure prompt, or serialized.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, thiserror::Error)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthError {
    /// Gateway answered, but not with an acceptable user record.
    #[error("{code}: {message}")]
    Malformed { code: String, message: String },
    /// Gateway could not be reached or answered with an error status.
    #[error("{code}: {message}")]
    Gateway { code: String, message: String },
    #[error("{code}: {message}")]
    Store { code: String, message: String },
    #[error("{code}: {message}")]
    NotLoggedIn { code: String, message: String },
    #[error("{code}: {message}")]
    InvalidInput { code: String, message: String },
    #[error("{code}: {message}")]
    Config { code: String, message: String },
    #[error("{code}: {message}")]
    Internal { code: String, message: String },
}

impl AuthError {
    pub fn code_str(&self) -> &str {
        match self {
            AuthError::Malformed { code, .. }
            | AuthError::Gateway { code, .. }
            | AuthError::Store { code, .. }
            | AuthError::NotLoggedIn { code, .. }
            | AuthError::InvalidInput { code, .. }
            | AuthError::Config { code, .. }
            | AuthError::Internal { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AuthError::Malformed { message, .. }
            | AuthError::Gateway { message, .. }
            | AuthError::Store { message, .. }
            | AuthError::NotLoggedIn { message, .. }
            | AuthError::InvalidInput { message, .. }
            | AuthError::Config { message, .. }
            | AuthError::Internal { message, .. } => message.as_str(),
        }
    }

    pub fn malformed(code: impl Into<String>, msg: impl Into<String>) -> Self { AuthError::Malformed { code: code.into(), message: msg.into() } }
    pub fn gateway(code: impl Into<String>, msg: impl Into<String>) -> Self { AuthError::Gateway { code: code.into(), message: msg.into() } }
    pub fn store(code: impl Into<String>, msg: impl Into<String>) -> Self { AuthError::Store { code: code.into(), message: msg.into() } }
    pub fn not_logged_in(code: impl Into<String>, msg: impl Into<String>) -> Self { AuthError::NotLoggedIn { code: code.into(), message: msg.into() } }
    pub fn invalid_input(code: impl Into<String>, msg: impl Into<String>) -> Self { AuthError::InvalidInput { code: code.into(), message: msg.into() } }
    pub fn config(code: impl Into<String>, msg: impl Into<String>) -> Self { AuthError::Config { code: code.into(), message: msg.into() } }
    pub fn internal(code: impl Into<String>, msg: impl Into<String>) -> Self { AuthError::Internal { code: code.into(), message: msg.into() } }

    /// Whether a login attempt that failed with this error is retried after
    /// the user acknowledged the failure.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AuthError::Malformed { .. } | AuthError::Gateway { .. })
    }
}

pub type AuthResult<T> = Result<T, AuthError>;

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        AuthError::Internal { code: "internal_error".into(), message: err.to_string() }
    }
}
