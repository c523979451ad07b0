//! Request and response bodies of the proxy API

use serde::{Deserialize, Serialize};

/// Result code reported by the proxy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResponseCode {
    Error,
    CredentialsNeeded,
}

/// Error body returned by the proxy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyResponse {
    pub code: ResponseCode,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CarCredentials<'a> {
    /// Standard base64 of the PEM file
    pub private_key: String,
    pub vin: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct SetChargingAmps {
    pub amps: i32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ChangeChargeLimit {
    pub charge_limit_percent: i32,
}
