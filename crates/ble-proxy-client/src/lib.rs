//! BLE Proxy Client Library
//!
//! Typed HTTP client for the BLE vehicle proxy.
//!
//! # Example
//!
//! ```rust,no_run
//! use ble_proxy_client::ProxyClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ProxyClient::new("http://localhost:80")?;
//!
//!     client
//!         .set_credentials_from_file("vehicle-private-key.pem", "5YJ3E1EA7KF000000")
//!         .await?;
//!     client.unlock().await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Testing
//!
//! The `testing` module runs a router on an ephemeral port:
//!
//! ```rust,ignore
//! use ble_proxy_client::testing::TestServer;
//!
//! let server = TestServer::start(create_router(state)).await?;
//! server.client.health().await?;
//! ```

pub mod client;
pub mod error;
pub mod testing;
pub mod types;

pub use client::ProxyClient;
pub use error::{ProxyClientError, Result};
pub use types::{ProxyResponse, ResponseCode};
