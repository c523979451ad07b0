//! ble-proxy-api - HTTP surface of the BLE vehicle proxy
//!
//! Exposes one POST route per vehicle action plus `/car-credentials`, which
//! installs the key and VIN every later command runs with.
//!
//! # Usage
//!
//! ```ignore
//! use ble_proxy_api::{create_router, AppState};
//! use ble_proxy_core::SimulatedVehicle;
//!
//! let state = AppState::new(SimulatedVehicle::new().transport());
//! let router = create_router(state);
//! ```

pub mod error;
pub mod handlers;
pub mod state;

pub use error::{ApiError, ErrorResponse, ResponseCode};
pub use handlers::actions::{ChangeChargeLimitRequest, SetChargingAmpsRequest};
pub use handlers::credentials::CarCredentialsRequest;
pub use state::AppState;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the proxy router with the given application state
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route(
            "/car-credentials",
            post(handlers::credentials::set_credentials),
        )
        .route("/wakeup", post(handlers::actions::wakeup))
        .route("/lock", post(handlers::actions::lock))
        .route("/unlock", post(handlers::actions::unlock))
        .route("/charge-start", post(handlers::actions::charge_start))
        .route("/charge-stop", post(handlers::actions::charge_stop))
        .route(
            "/set-charging-amps",
            post(handlers::actions::set_charging_amps),
        )
        .route(
            "/change-charge-limit",
            post(handlers::actions::change_charge_limit),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use ble_proxy_core::SimulatedVehicle;
    use tower::ServiceExt;

    fn router() -> Router {
        create_router(AppState::new(SimulatedVehicle::new().transport()))
    }

    async fn post(path: &str, body: &'static str) -> (StatusCode, Vec<u8>) {
        let response = router()
            .oneshot(
                Request::post(path)
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, bytes.to_vec())
    }

    #[tokio::test]
    async fn test_health() {
        let response = router()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_session_check_precedes_body_parsing() {
        let (status, body) = post("/set-charging-amps", "{ not json").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let parsed: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed.code, ResponseCode::CredentialsNeeded);
    }

    #[tokio::test]
    async fn test_malformed_credentials_body() {
        let (status, body) = post("/car-credentials", r#"{"vin": "5YJ3E1EA7KF000000"}"#).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

        let parsed: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed.code, ResponseCode::Error);
        assert!(parsed.message.contains("privateKey"));
    }
}
