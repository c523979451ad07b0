//! API error types and conversions

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use ble_proxy_core::{CommandError, KeyError};
use serde::{Deserialize, Serialize};

/// Message returned while no vehicle credentials are installed
pub const CREDENTIALS_NEEDED_MESSAGE: &str =
    "You need to provide car credentials by calling /car-credentials API";

/// Result code carried in every error body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResponseCode {
    Error,
    CredentialsNeeded,
}

/// Error body: `{"code": ..., "message": ...}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: ResponseCode,
    pub message: String,
}

/// API error type that converts to HTTP responses
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// 401 Unauthorized: no active vehicle session
    #[error("{msg}", msg = CREDENTIALS_NEEDED_MESSAGE)]
    CredentialsNeeded,
    /// 500 Internal Server Error: anything else
    #[error("{0}")]
    Error(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::CredentialsNeeded => {
                (StatusCode::UNAUTHORIZED, ResponseCode::CredentialsNeeded)
            }
            ApiError::Error(_) => (StatusCode::INTERNAL_SERVER_ERROR, ResponseCode::Error),
        };
        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!(%message, "API error");
        } else {
            tracing::debug!(%message, "API client error");
        }

        (status, Json(ErrorResponse { code, message })).into_response()
    }
}

impl From<KeyError> for ApiError {
    fn from(err: KeyError) -> Self {
        ApiError::Error(err.to_string())
    }
}

impl From<CommandError> for ApiError {
    fn from(err: CommandError) -> Self {
        ApiError::Error(err.to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Error(format!("invalid request body: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_codes_serialize_kebab_case() {
        let body = ErrorResponse {
            code: ResponseCode::CredentialsNeeded,
            message: "x".to_string(),
        };
        assert_eq!(
            serde_json::to_string(&body).unwrap(),
            r#"{"code":"credentials-needed","message":"x"}"#
        );
    }

    #[test]
    fn test_credentials_needed_is_unauthorized() {
        let response = ApiError::CredentialsNeeded.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_command_error_keeps_message() {
        let err: ApiError = CommandError::ConnectionFailed("vehicle not in range".to_string()).into();
        assert_eq!(err.to_string(), "Connection failed: vehicle not in range");
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
