//! Integration tests for the HTTP surface: ingress validation, health, and
//! room introspection.

#![allow(clippy::panic, missing_docs)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::net::TcpListener;
use tokio_tungstenite::connect_async;

use consult_relay::app_state::AppState;
use consult_relay::build_app;
use consult_relay::domain::{ConnectionRegistry, RoomKey, RoomPolicy};
use consult_relay::service::RelayService;
use consult_relay::ws::connection::SessionSettings;

async fn start_server() -> (SocketAddr, Arc<ConnectionRegistry>) {
    let registry = Arc::new(ConnectionRegistry::new(RoomPolicy::two_party()));
    let relay = RelayService::new(Arc::clone(&registry));
    let app = build_app(AppState::new(relay, SessionSettings::default()));

    let Ok(listener) = TcpListener::bind("127.0.0.1:0").await else {
        panic!("bind test listener");
    };
    let Ok(addr) = listener.local_addr() else {
        panic!("listener address");
    };
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (addr, registry)
}

async fn get_json(url: String) -> (u16, Value) {
    let Ok(response) = reqwest::get(url).await else {
        panic!("request failed");
    };
    let status = response.status().as_u16();
    let Ok(body) = response.json::<Value>().await else {
        panic!("response is not JSON");
    };
    (status, body)
}

#[tokio::test]
async fn missing_participant_is_a_client_error() {
    let (addr, registry) = start_server().await;
    let (status, body) = get_json(format!("http://{addr}/ws?session_id=7")).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], 1001);
    assert!(registry.is_empty().await);
}

#[tokio::test]
async fn missing_room_is_a_client_error() {
    let (addr, _registry) = start_server().await;
    let (status, _) = get_json(format!("http://{addr}/ws?participant_id=u1")).await;
    assert_eq!(status, 400);

    let (status, _) = get_json(format!(
        "http://{addr}/ws/consultation/abc?participant_id=u1"
    ))
    .await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn plain_http_request_requires_upgrade() {
    let (addr, registry) = start_server().await;
    let (status, body) = get_json(format!(
        "http://{addr}/ws?participant_id=u1&session_id=7"
    ))
    .await;
    assert_eq!(status, 426);
    assert_eq!(body["error"]["code"], 1002);
    assert!(registry.is_empty().await);
}

#[tokio::test]
async fn health_reports_live_counts() {
    let (addr, registry) = start_server().await;
    let (status, body) = get_json(format!("http://{addr}/health")).await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["rooms"], 0);

    let Ok((_client, _)) = connect_async(format!(
        "ws://{addr}/ws/session/abc?participant_id=u1&name=Ana"
    ))
    .await
    else {
        panic!("websocket handshake");
    };
    let room = RoomKey::session("abc");
    for _ in 0..100 {
        if registry.contains(&room).await {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let (_, body) = get_json(format!("http://{addr}/health")).await;
    assert_eq!(body["rooms"], 1);
    assert_eq!(body["connections"], 1);
    assert_eq!(body["sessions"], 1);

    let (status, body) = get_json(format!("http://{addr}/api/v1/rooms/session/abc")).await;
    assert_eq!(status, 200);
    assert_eq!(body["state"], "forming");
    assert_eq!(body["capacity"], 2);
    assert_eq!(body["participants"][0]["participant_id"], "u1");
    assert_eq!(body["participants"][0]["display_name"], "Ana");

    let (status, body) = get_json(format!("http://{addr}/api/v1/rooms")).await;
    assert_eq!(status, 200);
    assert_eq!(body["pagination"]["total"], 1);
    assert_eq!(body["data"][0]["key"]["kind"], "session");
    assert_eq!(body["data"][0]["participant_count"], 1);
}

#[tokio::test]
async fn unknown_room_is_not_found() {
    let (addr, _registry) = start_server().await;
    let (status, body) = get_json(format!("http://{addr}/api/v1/rooms/consultation/99")).await;
    assert_eq!(status, 404);
    assert_eq!(body["error"]["code"], 2001);
}

#[tokio::test]
async fn relay_settings_expose_policy() {
    let (addr, _registry) = start_server().await;
    let (status, body) = get_json(format!("http://{addr}/config/relay")).await;
    assert_eq!(status, 200);
    assert_eq!(body["room_capacity"], 2);
    assert_eq!(body["ping_interval_secs"], 30);
    assert_eq!(body["read_deadline_secs"], 60);
}
