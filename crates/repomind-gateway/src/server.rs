use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Instant;

use repomind_core::RepoService;
use repomind_llm::AnyProvider;
use tokio::sync::watch;

use crate::error::GatewayError;
use crate::router::build_router;

const DEFAULT_MAX_BODY_SIZE: usize = 1_048_576;

#[derive(Clone)]
pub(crate) struct AppState {
    pub service: Arc<RepoService<AnyProvider>>,
    pub started_at: Instant,
}

/// HTTP front for a [`RepoService`].
pub struct GatewayServer {
    bind: String,
    port: u16,
    auth_token: Option<String>,
    max_body_size: usize,
    service: Arc<RepoService<AnyProvider>>,
    shutdown_rx: watch::Receiver<bool>,
}

impl GatewayServer {
    #[must_use]
    pub fn new(
        bind: &str,
        port: u16,
        service: Arc<RepoService<AnyProvider>>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            bind: bind.trim().to_owned(),
            port,
            auth_token: None,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            service,
            shutdown_rx,
        }
    }

    #[must_use]
    pub fn with_auth(mut self, token: Option<String>) -> Self {
        self.auth_token = token.filter(|t| !t.is_empty());
        self
    }

    #[must_use]
    pub fn with_max_body_size(mut self, size: usize) -> Self {
        self.max_body_size = size;
        self
    }

    fn socket_addr(&self) -> Result<SocketAddr, GatewayError> {
        let ip: IpAddr = self
            .bind
            .parse()
            .map_err(|_| GatewayError::InvalidAddress(format!("{}:{}", self.bind, self.port)))?;
        Ok(SocketAddr::new(ip, self.port))
    }

    /// Serve until the shutdown channel flips to `true` or its sender goes away.
    ///
    /// # Errors
    ///
    /// Fails on an unparsable bind address, a bind failure, or a fatal I/O error.
    pub async fn serve(self) -> Result<(), GatewayError> {
        let addr = self.socket_addr()?;
        if addr.ip().is_unspecified() {
            tracing::warn!(%addr, "gateway reachable on every interface");
        }
        if self.auth_token.is_none() {
            tracing::warn!("no gateway auth token configured; /repo endpoints are open");
        }

        let state = AppState {
            service: self.service,
            started_at: Instant::now(),
        };
        let router = build_router(state, self.auth_token, self.max_body_size);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| GatewayError::Bind(addr.to_string(), e))?;
        tracing::info!(%addr, max_body_size = self.max_body_size, "gateway listening");

        axum::serve(listener, router)
            .with_graceful_shutdown(wait_for_shutdown(self.shutdown_rx))
            .await
            .map_err(|e| GatewayError::Server(e.to_string()))
    }
}

async fn wait_for_shutdown(mut rx: watch::Receiver<bool>) {
    // A dropped sender means the signal can never come; keep serving.
    if rx.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
    tracing::info!("gateway shutting down");
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use repomind_llm::mock::MockProvider;

    use super::*;
    use crate::test_support::service_with;

    fn server(bind: &str, port: u16) -> (GatewayServer, watch::Sender<bool>, tempfile::TempDir) {
        let (service, work) = service_with(MockProvider::default());
        let (stx, srx) = watch::channel(false);
        (GatewayServer::new(bind, port, service, srx), stx, work)
    }

    #[test]
    fn builder_sets_auth_and_body_limit() {
        let (server, _stx, _work) = server("127.0.0.1", 8000);
        let server = server.with_auth(Some("token".into())).with_max_body_size(512);
        assert_eq!(server.max_body_size, 512);
        assert_eq!(server.auth_token.as_deref(), Some("token"));
    }

    #[test]
    fn empty_auth_token_means_no_auth() {
        let (server, _stx, _work) = server("127.0.0.1", 8000);
        assert!(server.with_auth(Some(String::new())).auth_token.is_none());
    }

    #[test]
    fn socket_addr_accepts_v4_and_v6() {
        let (v4, _s1, _w1) = server("0.0.0.0", 8000);
        assert_eq!(v4.socket_addr().unwrap().to_string(), "0.0.0.0:8000");
        let (v6, _s2, _w2) = server("::1", 9000);
        assert_eq!(v6.socket_addr().unwrap().port(), 9000);
    }

    #[tokio::test]
    async fn invalid_bind_is_an_error() {
        let (server, _stx, _work) = server("not_an_ip", 9999);
        let err = server.serve().await.unwrap_err();
        assert!(matches!(err, GatewayError::InvalidAddress(ref a) if a == "not_an_ip:9999"));
    }

    #[tokio::test]
    async fn serve_stops_on_shutdown_signal() {
        let (server, stx, _work) = server("127.0.0.1", 0);
        let handle = tokio::spawn(server.serve());
        stx.send(true).unwrap();
        let result = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }
}
