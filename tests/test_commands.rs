//! Device commands through the client facade
//!
//! The command surface is played by a wiremock server; none of these tests
//! open the telemetry stream.

use navistick::testing::MockStreamTransport;
use navistick::{ClientConfig, CommandErrorKind, ConnectionStatus, DeviceClient};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> DeviceClient {
    let address = server.address();
    let mut config = ClientConfig::default();
    config.device.host = address.ip().to_string();
    config.device.command_port = address.port();
    config.commands.timeout_ms = 500;
    DeviceClient::with_transport(&config, Arc::new(MockStreamTransport::new())).unwrap()
}

#[tokio::test]
async fn test_activate_vibration_posts_pattern_and_intensity() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/vibrate"))
        .and(body_json(json!({"pattern": "obstacle", "intensity": 75})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let response = client.activate_vibration("obstacle", 75).await.unwrap();

    assert_eq!(response, json!({"status": "ok"}));
    // Commands do not need the stream
    assert_eq!(
        client.connection_status().status,
        ConnectionStatus::Disconnected
    );
}

#[tokio::test]
async fn test_vibration_intensity_is_clamped() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/vibrate"))
        .and(body_json(json!({"pattern": "alert", "intensity": 100})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/vibrate"))
        .and(body_json(json!({"pattern": "alert", "intensity": 0})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    assert_eq!(
        client.activate_vibration("alert", 250).await.unwrap(),
        serde_json::Value::Null
    );
    client.activate_vibration("alert", -5).await.unwrap();
}

#[tokio::test]
async fn test_pattern_and_calibrate_bodies() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/vibrator/pattern"))
        .and(body_json(json!({"pattern": "heartbeat"})))
        .respond_with(ResponseTemplate::new(200).set_body_string("OK"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/calibrate"))
        .and(body_json(json!({})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"calibrated": true})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    assert_eq!(
        client.set_vibrator_pattern("heartbeat").await.unwrap(),
        json!("OK")
    );
    assert_eq!(
        client.calibrate_sensors().await.unwrap(),
        json!({"calibrated": true})
    );
}

#[tokio::test]
async fn test_system_status_and_probe() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "running",
            "ip": "192.168.1.100",
            "battery": 14.0,
            "temperature": 38.5,
            "uptime": 120,
            "sensors": ["ultrasonic", "tof"]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>NaviStick</html>"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    client.probe().await.unwrap();

    let status = client.get_system_status().await.unwrap();
    assert_eq!(status.status, "running");
    assert_eq!(status.uptime, 120);
    assert!(status.is_low_battery(20.0));
    assert_eq!(status.extra["sensors"], json!(["ultrasonic", "tof"]));
}

#[tokio::test]
async fn test_http_error_is_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/calibrate"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let error = client.calibrate_sensors().await.unwrap_err();

    assert_eq!(error.kind(), CommandErrorKind::HttpStatus);
    assert_eq!(error.path(), "/calibrate");

    let metrics = client.metrics();
    assert_eq!(metrics.commands.commands_sent, 1);
    assert_eq!(metrics.commands.command_failures, 1);
}

#[tokio::test]
async fn test_refused_endpoint_is_network_error() {
    // Bind then release a port so nothing is listening on it
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let mut config = ClientConfig::default();
    config.device.host = "127.0.0.1".to_string();
    config.device.command_port = port;
    let client =
        DeviceClient::with_transport(&config, Arc::new(MockStreamTransport::new())).unwrap();

    let error = client
        .send_command("/vibrate", json!({"pattern": "pulse", "intensity": 10}))
        .await
        .unwrap_err();

    assert_eq!(error.kind(), CommandErrorKind::Network);
}

#[tokio::test]
async fn test_endpoint_change_redirects_commands() {
    let old = MockServer::start().await;
    let new = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/calibrate"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&old)
        .await;
    Mock::given(method("POST"))
        .and(path("/calibrate"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&new)
        .await;

    let client = client_for(&old);
    let mut endpoint = client.endpoint();
    endpoint.command_port = new.address().port();
    client.set_endpoint_full(endpoint).unwrap();

    client.calibrate_sensors().await.unwrap();
}
