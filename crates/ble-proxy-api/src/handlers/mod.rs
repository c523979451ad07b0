//! HTTP request handlers for the proxy API

pub mod actions;
pub mod credentials;

use bytes::Bytes;
use serde::de::DeserializeOwned;

use crate::error::ApiError;

/// Decode a JSON body regardless of the request's Content-Type
pub(crate) fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    Ok(serde_json::from_slice(body)?)
}
