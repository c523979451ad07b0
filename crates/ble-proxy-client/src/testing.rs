//! Test utilities for ble-proxy-client
//!
//! Runs a router on an ephemeral port for integration tests.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpListener;

use crate::{ProxyClient, Result};

/// A test server that automatically shuts down when dropped
pub struct TestServer {
    pub addr: SocketAddr,
    pub client: ProxyClient,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl TestServer {
    /// Create a new test server from an axum Router
    ///
    /// # Example
    ///
    /// ```ignore
    /// use ble_proxy_client::testing::TestServer;
    /// use ble_proxy_api::{create_router, AppState};
    ///
    /// let router = create_router(AppState::new(vehicle.transport()));
    /// let server = TestServer::start(router).await?;
    ///
    /// server.client.unlock().await?;
    /// ```
    pub async fn start(router: axum::Router) -> Result<Self> {
        Self::start_with_timeout(router, Duration::from_secs(60), Duration::from_secs(2)).await
    }

    /// Create a new test server with custom client timeouts
    pub async fn start_with_timeout(
        router: axum::Router,
        timeout: Duration,
        connect_timeout: Duration,
    ) -> Result<Self> {
        // Bind to any available port
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

        let handle = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .ok();
        });

        let base_url = format!("http://{}", addr);
        let client = ProxyClient::with_config(&base_url, timeout, connect_timeout)?;

        Ok(Self {
            addr,
            client,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    /// Get the base URL of the test server
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Shutdown the server gracefully
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
