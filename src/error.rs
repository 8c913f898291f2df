use std::collections::BTreeMap;

use crate::persist::StoreError;

/// Field name → messages, as returned by the backend for a 400.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Every way a client operation can be rejected. Each variant carries the
/// backend's message when it sent one, otherwise the operation's fallback.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ClientError {
    /// Bad credentials on login/signup.
    #[error("{0}")]
    Authentication(String),
    /// Missing or expired token. The session should be cleared upstream.
    #[error("{0}")]
    Unauthorized(String),
    #[error("{message}")]
    Validation { message: String, fields: FieldErrors },
    #[error("{0}")]
    NotFound(String),
    /// Transport failure; safe to retry.
    #[error("network failure: {0}")]
    Network(String),
    #[error("{message}")]
    Unknown { status: Option<u16>, message: String },
    #[error("credential store: {0}")]
    Storage(#[from] StoreError),
}

impl ClientError {
    pub(crate) fn not_logged_in() -> Self {
        ClientError::Unauthorized("Not logged in".to_string())
    }

    /// The text a presentation layer would put in a notification.
    pub fn message(&self) -> String {
        self.to_string()
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ClientError::Unauthorized(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::NotFound(_))
    }

    /// Transport failures and server-side 5xx may succeed on a second try.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Network(_) => true,
            ClientError::Unknown { status: Some(code), .. } => *code >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ClientError::Unknown {
                status: e.status().map(|s| s.as_u16()),
                message: format!("unexpected response body: {e}"),
            }
        } else {
            ClientError::Network(e.to_string())
        }
    }
}
