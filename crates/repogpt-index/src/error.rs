//! Error types for repogpt-index.

use std::time::Duration;

use repogpt_llm::LlmError;

/// Coarse classification used by entry points to pick a response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Authentication,
    ExternalService,
    Storage,
    Configuration,
    Timeout,
}

/// Errors that can occur while ingesting, retrieving, or answering.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// Caller input is missing or malformed.
    #[error("invalid input: {0}")]
    Validation(String),

    /// Caller has no usable source-host credential.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Upstream responded non-2xx or with an unusable envelope.
    #[error("{service} request failed: {message}")]
    ExternalService {
        service: &'static str,
        status: Option<u16>,
        message: String,
    },

    /// Postgres error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Transaction or schema failure outside the database driver.
    #[error("storage error: {0}")]
    Storage(String),

    /// Required setting or credential is absent.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The request did not finish before its deadline.
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

impl IndexError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Authentication(_) => ErrorKind::Authentication,
            Self::ExternalService { .. } => ErrorKind::ExternalService,
            Self::Database(_) | Self::Storage(_) => ErrorKind::Storage,
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::Timeout(_) => ErrorKind::Timeout,
        }
    }

    /// Upstream status for external-service failures.
    #[must_use]
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            Self::ExternalService { status, .. } => *status,
            _ => None,
        }
    }

    pub(crate) fn source_host(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::ExternalService {
            service: "source host",
            status,
            message: message.into(),
        }
    }
}

impl From<LlmError> for IndexError {
    fn from(e: LlmError) -> Self {
        match e {
            LlmError::MissingCredential { .. } => Self::Configuration(e.to_string()),
            LlmError::Timeout(limit) => Self::Timeout(limit),
            other => Self::ExternalService {
                service: "model",
                status: other.status(),
                message: other.to_string(),
            },
        }
    }
}

impl From<reqwest::Error> for IndexError {
    fn from(e: reqwest::Error) -> Self {
        Self::source_host(e.status().map(|s| s.as_u16()), e.to_string())
    }
}

/// Result type alias using `IndexError`.
pub type Result<T> = std::result::Result<T, IndexError>;
