#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::header::CONTENT_TYPE;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use shelfroom_api::config::ServerConfig;
use shelfroom_api::router::build_app_router;
use shelfroom_api::state::AppState;
use shelfroom_db::{MemoryDocumentStore, MemoryPresenceStore};

/// Build a test `ServerConfig` with safe defaults.
///
/// Uses `http://localhost:5173` as CORS origin (matching the dev default)
/// and a 30-second request timeout.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        ..ServerConfig::default()
    }
}

/// Application state over fresh in-memory stores.
pub fn test_state() -> AppState {
    AppState::new(
        test_config(),
        Arc::new(MemoryDocumentStore::new()),
        Arc::new(MemoryPresenceStore::new()),
    )
}

/// Build the full application router with all middleware layers, the same
/// stack `main.rs` serves.
pub fn build_test_app(state: AppState) -> Router {
    build_app_router(state, &test_config())
}

/// Identity headers for one caller.
#[derive(Debug, Clone, Copy)]
pub struct Caller<'a> {
    pub user_id: &'a str,
    pub display_name: &'a str,
    pub connection_id: Option<&'a str>,
}

pub const ALICE: Caller<'static> = Caller {
    user_id: "alice",
    display_name: "Alice",
    connection_id: None,
};

pub const BOB: Caller<'static> = Caller {
    user_id: "bob",
    display_name: "Bob",
    connection_id: None,
};

impl<'a> Caller<'a> {
    pub fn on(self, connection_id: &'a str) -> Self {
        Self {
            connection_id: Some(connection_id),
            ..self
        }
    }
}

/// Send one request through the app.
pub async fn send(
    app: Router,
    method: Method,
    uri: &str,
    caller: Option<Caller<'_>>,
    body: Option<Value>,
) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(caller) = caller {
        builder = builder
            .header("x-user-id", caller.user_id)
            .header("x-display-name", caller.display_name);
        if let Some(conn) = caller.connection_id {
            builder = builder.header("x-connection-id", conn);
        }
    }
    let request = match body {
        Some(json) => builder
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.oneshot(request).await.unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri, None, None).await
}

pub async fn get_as(app: Router, uri: &str, caller: Caller<'_>) -> Response<Body> {
    send(app, Method::GET, uri, Some(caller), None).await
}

pub async fn post_json(app: Router, uri: &str, caller: Caller<'_>, body: Value) -> Response<Body> {
    send(app, Method::POST, uri, Some(caller), Some(body)).await
}

pub async fn patch_json(app: Router, uri: &str, caller: Caller<'_>, body: Value) -> Response<Body> {
    send(app, Method::PATCH, uri, Some(caller), Some(body)).await
}

pub async fn post_as(app: Router, uri: &str, caller: Caller<'_>) -> Response<Body> {
    send(app, Method::POST, uri, Some(caller), None).await
}

pub async fn delete_as(app: Router, uri: &str, caller: Caller<'_>) -> Response<Body> {
    send(app, Method::DELETE, uri, Some(caller), None).await
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Create room `room_id` as alice, add bob, and create one shelf.
/// Returns the shelf id.
pub async fn seed_room(app: &Router, room_id: &str) -> String {
    let response = post_json(
        app.clone(),
        "/api/v1/rooms",
        ALICE,
        serde_json::json!({ "id": room_id, "name": "The Den" }),
    )
    .await;
    assert_eq!(response.status(), 201);

    let response = post_json(
        app.clone(),
        &format!("/api/v1/rooms/{room_id}/members"),
        BOB,
        serde_json::json!({ "display_name": "Bob" }),
    )
    .await;
    assert_eq!(response.status(), 200);

    let response = post_json(
        app.clone(),
        &format!("/api/v1/rooms/{room_id}/shelves"),
        ALICE,
        serde_json::json!({ "name": "Top" }),
    )
    .await;
    assert_eq!(response.status(), 201);
    body_json(response).await["data"]["id"]
        .as_str()
        .unwrap()
        .to_string()
}

/// Place an item of `item_type_id` at `position` as alice. Returns its id.
pub async fn place(app: &Router, room_id: &str, shelf_id: &str, position: u8, item_type_id: &str) -> String {
    let response = post_json(
        app.clone(),
        &format!("/api/v1/rooms/{room_id}/shelves/{shelf_id}/spots/{position}"),
        ALICE,
        serde_json::json!({ "item_type_id": item_type_id }),
    )
    .await;
    assert_eq!(response.status(), 201);
    body_json(response).await["data"]["id"]
        .as_str()
        .unwrap()
        .to_string()
}
