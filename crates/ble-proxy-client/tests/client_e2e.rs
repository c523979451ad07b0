//! Client tests against a live proxy router

use std::io::Write;

use ble_proxy_api::{create_router, AppState};
use ble_proxy_client::testing::TestServer;
use ble_proxy_client::ProxyClientError;
use ble_proxy_core::simulator::LinkEvent;
use ble_proxy_core::SimulatedVehicle;
use p256::pkcs8::{EncodePrivateKey, LineEnding};
use p256::SecretKey;

const VIN: &str = "5YJ3E1EA7KF000000";

async fn start(vehicle: &SimulatedVehicle) -> TestServer {
    TestServer::start(create_router(AppState::new(vehicle.transport())))
        .await
        .expect("Failed to start test server")
}

fn key_file() -> tempfile::NamedTempFile {
    let secret = SecretKey::from_slice(&[0x21; 32]).unwrap();
    let pem = secret.to_pkcs8_pem(LineEnding::LF).unwrap();

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(pem.as_bytes()).unwrap();
    file
}

#[tokio::test]
async fn test_credentials_from_file_then_lock() {
    let vehicle = SimulatedVehicle::with_vin(VIN);
    let server = start(&vehicle).await;
    let file = key_file();

    server
        .client
        .set_credentials_from_file(file.path(), VIN)
        .await
        .unwrap();
    server.client.unlock().await.unwrap();
    server.client.lock().await.unwrap();

    assert!(vehicle.state().locked);
    assert_eq!(
        vehicle
            .events()
            .iter()
            .filter(|e| matches!(e, LinkEvent::Open(_)))
            .count(),
        2
    );
}

#[tokio::test]
async fn test_missing_key_file_is_io_error() {
    let vehicle = SimulatedVehicle::new();
    let server = start(&vehicle).await;

    let err = server
        .client
        .set_credentials_from_file("/nonexistent/vehicle-private-key.pem", VIN)
        .await
        .unwrap_err();
    assert!(matches!(err, ProxyClientError::IoError(_)));
}

#[tokio::test]
async fn test_unreachable_server_is_http_error() {
    let server = start(&SimulatedVehicle::new()).await;
    let base_url = server.base_url();
    server.shutdown().await;

    let client = ble_proxy_client::ProxyClient::new(&base_url).unwrap();
    let err = client.health().await.unwrap_err();
    assert!(matches!(err, ProxyClientError::HttpError(_)));
}
