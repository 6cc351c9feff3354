//! Shared HTTP client construction for consistent timeout and TLS configuration.

use std::time::Duration;

/// Create a shared HTTP client with standard RepoGPT configuration.
///
/// Config: 30s connect timeout, 120s request timeout, rustls TLS,
/// `repogpt/{version}` user-agent, redirect limit 10. Streamed answers
/// carry their own, shorter deadline.
#[must_use]
pub fn default_client() -> reqwest::Client {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(30))
        .timeout(Duration::from_secs(120))
        .user_agent(concat!("repogpt/", env!("CARGO_PKG_VERSION")))
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!("falling back to default HTTP client: {e}");
            reqwest::Client::new()
        })
}
