use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use repogpt_index::assistant::RepoAssistant;
use repogpt_llm::any::AnyProvider;
use tokio::sync::watch;

use crate::error::GatewayError;
use crate::router::build_router;

/// The assistant type served by the gateway.
pub type Assistant = RepoAssistant<AnyProvider>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub assistant: Arc<Assistant>,
    /// Used when a request carries no `x-source-token` header.
    pub source_token: Option<Arc<str>>,
    pub started_at: Instant,
}

/// Guards and defaults applied to the `/api` routes.
#[derive(Debug, Clone)]
pub struct GatewayOptions {
    /// Bearer token required on `/api` routes; `None` disables auth.
    pub auth_token: Option<String>,
    /// Source host token for requests without an `x-source-token` header.
    pub source_token: Option<String>,
    /// Requests per client per minute; 0 disables the limit.
    pub rate_limit: u32,
    pub max_body_size: usize,
}

impl Default for GatewayOptions {
    fn default() -> Self {
        Self {
            auth_token: None,
            source_token: None,
            rate_limit: 60,
            max_body_size: 65_536,
        }
    }
}

pub struct GatewayServer {
    addr: SocketAddr,
    options: GatewayOptions,
    assistant: Arc<Assistant>,
    shutdown_rx: watch::Receiver<bool>,
}

impl GatewayServer {
    /// An unparsable `bind` falls back to loopback on the same port.
    #[must_use]
    pub fn new(
        bind: &str,
        port: u16,
        assistant: Arc<Assistant>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        let addr = match format!("{bind}:{port}").parse::<SocketAddr>() {
            Ok(addr) => addr,
            Err(e) => {
                tracing::warn!(%bind, "invalid gateway bind address ({e}), using 127.0.0.1");
                SocketAddr::from(([127, 0, 0, 1], port))
            }
        };
        if addr.ip().is_unspecified() {
            tracing::warn!(%addr, "gateway exposed on every interface");
        }

        Self {
            addr,
            options: GatewayOptions::default(),
            assistant,
            shutdown_rx,
        }
    }

    #[must_use]
    pub fn with_auth(mut self, token: Option<String>) -> Self {
        self.options.auth_token = token;
        self
    }

    #[must_use]
    pub fn with_source_token(mut self, token: Option<String>) -> Self {
        self.options.source_token = token.filter(|t| !t.trim().is_empty());
        self
    }

    #[must_use]
    pub fn with_rate_limit(mut self, limit: u32) -> Self {
        self.options.rate_limit = limit;
        self
    }

    #[must_use]
    pub fn with_max_body_size(mut self, size: usize) -> Self {
        self.options.max_body_size = size;
        self
    }

    /// Bind and serve until the shutdown channel flips to `true`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Bind`] if the address is taken, or
    /// [`GatewayError::Server`] on a fatal I/O error while serving.
    pub async fn serve(self) -> Result<(), GatewayError> {
        let Self {
            addr,
            options,
            assistant,
            mut shutdown_rx,
        } = self;

        let state = AppState {
            assistant,
            source_token: options.source_token.as_deref().map(Arc::from),
            started_at: Instant::now(),
        };
        let app = build_router(state, &options)
            .into_make_service_with_connect_info::<SocketAddr>();

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| GatewayError::Bind(addr.to_string(), e))?;
        tracing::info!(%addr, auth = options.auth_token.is_some(), "gateway listening");

        let shutdown = async move {
            // sender dropped: serve until the process exits
            if shutdown_rx.wait_for(|stop| *stop).await.is_err() {
                std::future::pending::<()>().await;
            }
            tracing::info!("gateway draining connections");
        };

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| GatewayError::Server(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::assistant;

    #[test]
    fn server_builder_chain() {
        let (_stx, srx) = watch::channel(false);
        let server = GatewayServer::new("127.0.0.1", 8090, assistant(), srx)
            .with_auth(Some("token".into()))
            .with_source_token(Some("gh".into()))
            .with_rate_limit(30)
            .with_max_body_size(512);

        assert_eq!(server.options.rate_limit, 30);
        assert_eq!(server.options.max_body_size, 512);
        assert!(server.options.auth_token.is_some());
        assert_eq!(server.options.source_token.as_deref(), Some("gh"));
    }

    #[test]
    fn blank_source_token_is_ignored() {
        let (_stx, srx) = watch::channel(false);
        let server =
            GatewayServer::new("127.0.0.1", 8090, assistant(), srx).with_source_token(Some(" ".into()));
        assert!(server.options.source_token.is_none());
    }

    #[test]
    fn server_invalid_bind_fallback() {
        let (_stx, srx) = watch::channel(false);
        let server = GatewayServer::new("not_an_ip", 9999, assistant(), srx);
        assert_eq!(server.addr.port(), 9999);
        assert!(server.addr.ip().is_loopback());
    }

    #[test]
    fn default_options() {
        let options = GatewayOptions::default();
        assert_eq!(options.rate_limit, 60);
        assert_eq!(options.max_body_size, 65_536);
        assert!(options.auth_token.is_none());
    }
}
