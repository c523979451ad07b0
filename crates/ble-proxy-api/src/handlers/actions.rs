//! Vehicle action handlers
//!
//! Every handler checks for an active session before looking at the body,
//! then runs the command on its own task. A client that hangs up mid-command
//! therefore cannot cut the vehicle link teardown short.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use ble_proxy_core::{CommandSession, VehicleAction};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::parse_body;
use crate::error::ApiError;
use crate::state::AppState;

/// Body of POST /set-charging-amps
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetChargingAmpsRequest {
    pub amps: i32,
}

/// Body of POST /change-charge-limit
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeChargeLimitRequest {
    pub charge_limit_percent: i32,
}

async fn dispatch(
    session: Arc<CommandSession>,
    action: VehicleAction,
) -> Result<StatusCode, ApiError> {
    tokio::spawn(async move { session.run_command(action).await })
        .await
        .map_err(|e| ApiError::Error(format!("command task failed: {}", e)))??;
    Ok(StatusCode::OK)
}

/// POST /wakeup
pub async fn wakeup(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    dispatch(state.current()?, VehicleAction::Wakeup).await
}

/// POST /lock
pub async fn lock(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    dispatch(state.current()?, VehicleAction::Lock).await
}

/// POST /unlock
pub async fn unlock(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    dispatch(state.current()?, VehicleAction::Unlock).await
}

/// POST /charge-start
pub async fn charge_start(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    dispatch(state.current()?, VehicleAction::ChargeStart).await
}

/// POST /charge-stop
pub async fn charge_stop(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    dispatch(state.current()?, VehicleAction::ChargeStop).await
}

/// POST /set-charging-amps
pub async fn set_charging_amps(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let session = state.current()?;
    let request: SetChargingAmpsRequest = parse_body(&body)?;
    dispatch(session, VehicleAction::SetChargingAmps { amps: request.amps }).await
}

/// POST /change-charge-limit
/// The percentage is forwarded as-is; the vehicle enforces its own range
pub async fn change_charge_limit(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let session = state.current()?;
    let request: ChangeChargeLimitRequest = parse_body(&body)?;
    dispatch(
        session,
        VehicleAction::ChangeChargeLimit {
            percent: request.charge_limit_percent,
        },
    )
    .await
}
