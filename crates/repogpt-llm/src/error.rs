#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{provider} API request failed (status {status})")]
    Api { provider: &'static str, status: u16 },

    #[error("missing credential for {provider}: {what}")]
    MissingCredential {
        provider: &'static str,
        what: &'static str,
    },

    #[error("empty response from {provider}")]
    EmptyResponse { provider: &'static str },

    #[error("stream read failed: {0}")]
    StreamRead(String),

    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("chat not supported by {provider}")]
    ChatUnsupported { provider: &'static str },

    #[error("embedding not supported by {provider}")]
    EmbedUnsupported { provider: &'static str },

    #[error("{0}")]
    Other(String),
}

impl LlmError {
    /// Upstream HTTP status, when the failure came from a non-2xx response.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, LlmError>;
