//! Proxy HTTP client implementation

use std::path::Path;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use tracing::{debug, instrument};
use url::Url;

use crate::error::{ProxyClientError, Result};
use crate::types::*;

/// Default request timeout, a little above the proxy's own command timeout
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(40);
/// Default connection timeout
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// BLE proxy REST API client
#[derive(Debug, Clone)]
pub struct ProxyClient {
    client: Client,
    base_url: Url,
}

impl ProxyClient {
    /// Create a new proxy client
    ///
    /// # Arguments
    /// * `base_url` - Base URL of the proxy (e.g., "http://localhost:80")
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_config(base_url, DEFAULT_TIMEOUT, DEFAULT_CONNECT_TIMEOUT)
    }

    /// Create a new proxy client with custom timeouts
    pub fn with_config(
        base_url: &str,
        timeout: Duration,
        connect_timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .build()?;

        let base_url = Url::parse(base_url)?;

        Ok(Self { client, base_url })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Check server health
    #[instrument(skip(self))]
    pub async fn health(&self) -> Result<String> {
        let url = self.base_url.join("/health")?;
        let response = self.client.get(url).send().await?;

        if response.status().is_success() {
            Ok(response.text().await?)
        } else {
            Err(self.extract_error(response).await)
        }
    }

    // =========================================================================
    // Credentials
    // =========================================================================

    /// Install the vehicle key (PEM bytes) and VIN on the proxy
    #[instrument(skip(self, pem))]
    pub async fn set_credentials(&self, pem: &[u8], vin: &str) -> Result<()> {
        let body = CarCredentials {
            private_key: STANDARD.encode(pem),
            vin,
        };
        self.post_json("/car-credentials", &body).await
    }

    /// Read a PEM key file and install it together with `vin`
    pub async fn set_credentials_from_file(&self, path: impl AsRef<Path>, vin: &str) -> Result<()> {
        let pem = tokio::fs::read(path.as_ref()).await?;
        self.set_credentials(&pem, vin).await
    }

    // =========================================================================
    // Vehicle Actions
    // =========================================================================

    #[instrument(skip(self))]
    pub async fn wakeup(&self) -> Result<()> {
        self.post_empty("/wakeup").await
    }

    #[instrument(skip(self))]
    pub async fn lock(&self) -> Result<()> {
        self.post_empty("/lock").await
    }

    #[instrument(skip(self))]
    pub async fn unlock(&self) -> Result<()> {
        self.post_empty("/unlock").await
    }

    #[instrument(skip(self))]
    pub async fn charge_start(&self) -> Result<()> {
        self.post_empty("/charge-start").await
    }

    #[instrument(skip(self))]
    pub async fn charge_stop(&self) -> Result<()> {
        self.post_empty("/charge-stop").await
    }

    /// Set the charging current in amps
    #[instrument(skip(self))]
    pub async fn set_charging_amps(&self, amps: i32) -> Result<()> {
        self.post_json("/set-charging-amps", &SetChargingAmps { amps })
            .await
    }

    /// Set the charge limit in percent
    #[instrument(skip(self))]
    pub async fn change_charge_limit(&self, percent: i32) -> Result<()> {
        self.post_json(
            "/change-charge-limit",
            &ChangeChargeLimit {
                charge_limit_percent: percent,
            },
        )
        .await
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn post_empty(&self, path: &str) -> Result<()> {
        let url = self.base_url.join(path)?;
        debug!("POST {}", url);

        let response = self.client.post(url).send().await?;
        self.expect_success(response).await
    }

    async fn post_json<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<()> {
        let url = self.base_url.join(path)?;
        debug!("POST {}", url);

        let response = self.client.post(url).json(body).send().await?;
        self.expect_success(response).await
    }

    async fn expect_success(&self, response: reqwest::Response) -> Result<()> {
        if response.status().is_success() {
            Ok(())
        } else {
            Err(self.extract_error(response).await)
        }
    }

    /// Extract error from failed response
    async fn extract_error(&self, response: reqwest::Response) -> ProxyClientError {
        let status = response.status();

        let body = match response.json::<ProxyResponse>().await {
            Ok(body) => Some(body),
            Err(_) => None,
        };

        match (status, body) {
            (_, Some(body)) if body.code == ResponseCode::CredentialsNeeded => {
                ProxyClientError::CredentialsNeeded(body.message)
            }
            (StatusCode::UNAUTHORIZED, None) => {
                ProxyClientError::CredentialsNeeded(format!("HTTP {}", status))
            }
            (_, Some(body)) => ProxyClientError::server_error(status.as_u16(), body.message),
            (_, None) => ProxyClientError::server_error(status.as_u16(), format!("HTTP {}", status)),
        }
    }
}
