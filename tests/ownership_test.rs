//! Ownership rules over HTTP: foreign devices are 403, absent ones 404,
//! and admins may list everything but change nothing they do not own.

use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use warp::http::StatusCode;

use ecoshare::auth::HashingCost;
use ecoshare::config::{AdminBootstrap, ServerConfig};
use ecoshare::handlers::{routes, AppState};
use ecoshare::storage::MemoryStorage;

const SECRET: &str = "Wn4rT8yK2mQ6vB9xL1dF5hJ3gP7sC0zE";

struct Harness {
    state: AppState,
}

impl Harness {
    async fn new() -> Self {
        let config = ServerConfig::new(SECRET)
            .unwrap()
            .with_hashing_cost(HashingCost::minimal())
            .with_auth_min_duration(Duration::ZERO);
        let state = AppState::new(&config, Arc::new(MemoryStorage::new())).unwrap();
        state
            .authenticator
            .ensure_admin(&AdminBootstrap {
                username: "root".to_string(),
                password: "adm1n-password".to_string(),
                email: "root@example.com".to_string(),
            })
            .await
            .unwrap();
        Self { state }
    }

    async fn send(&self, method: &str, path: &str, token: &str, payload: Option<Value>) -> (StatusCode, Value) {
        let api = routes(self.state.clone());
        let mut request = warp::test::request()
            .method(method)
            .path(path)
            .header("authorization", format!("Bearer {}", token));
        if let Some(payload) = payload {
            request = request.json(&payload);
        }
        let response = request.reply(&api).await;
        let body = if response.body().is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(response.body()).unwrap()
        };
        (response.status(), body)
    }

    async fn token_for(&self, username: &str, password: &str) -> String {
        let authenticator = &self.state.authenticator;
        if username != "root" {
            authenticator
                .register(ecoshare::auth::RegisterRequest {
                    username: username.to_string(),
                    password: password.to_string(),
                    email: format!("{}@example.com", username),
                    phone: None,
                })
                .await
                .unwrap();
        }
        authenticator.login(username, password).await.unwrap().token
    }
}

#[tokio::test]
async fn test_owner_succeeds_where_others_are_forbidden() {
    let harness = Harness::new().await;
    let alice = harness.token_for("alice", "alice-pw1").await;
    let bob = harness.token_for("bob", "bob-pw12").await;

    let (status, device) = harness
        .send(
            "POST",
            "/api/v1/devices",
            &alice,
            Some(json!({ "name": "Heater", "device_type": "heater", "device_id": "SN-100" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let path = format!("/api/v1/devices/{}", device["id"]);

    let rename = json!({ "name": "Bob's heater" });
    let (status, _) = harness.send("PUT", &path, &bob, Some(rename.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = harness.send("DELETE", &path, &bob, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = harness.send("GET", &path, &bob, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = harness
        .send("PUT", &format!("{}/status", path), &bob, Some(json!({ "status": "online" })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = harness
        .send(
            "POST",
            &format!("{}/usage", path),
            &bob,
            Some(json!({ "usage": 1.0, "cost": 1.0, "timestamp": "2024-01-01T00:00:00Z" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, updated) = harness.send("PUT", &path, &alice, Some(rename)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["name"], "Bob's heater");

    let (status, _) = harness.send("DELETE", &path, &alice, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = harness.send("GET", &path, &alice, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_listing_only() {
    let harness = Harness::new().await;
    let alice = harness.token_for("alice", "alice-pw1").await;
    let root = harness.token_for("root", "adm1n-password").await;

    let (_, device) = harness
        .send(
            "POST",
            "/api/v1/devices",
            &alice,
            Some(json!({ "name": "Heater", "device_type": "heater" })),
        )
        .await;
    let path = format!("/api/v1/devices/{}", device["id"]);

    let (status, listing) = harness.send("GET", "/api/v1/admin/devices", &root, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listing["total"], 1);

    let (status, users) = harness
        .send("GET", "/api/v1/users?page=1&page_size=1", &root, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(users["total"], 2);
    assert_eq!(users["items"].as_array().unwrap().len(), 1);

    let (status, _) = harness.send("DELETE", &path, &root, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = harness.send("GET", "/api/v1/admin/devices", &alice, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = harness.send("GET", "/api/v1/users", &alice, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_location_tree_ownership_and_moves() {
    let harness = Harness::new().await;
    let alice = harness.token_for("alice", "alice-pw1").await;
    let bob = harness.token_for("bob", "bob-pw12").await;

    let (status, house) = harness
        .send(
            "POST",
            "/api/v1/locations",
            &alice,
            Some(json!({ "name": "House", "type": "building" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, room) = harness
        .send(
            "POST",
            "/api/v1/locations",
            &alice,
            Some(json!({ "name": "Kitchen", "type": "room", "parent_id": house["id"] })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let house_path = format!("/api/v1/locations/{}", house["id"]);
    let room_path = format!("/api/v1/locations/{}", room["id"]);

    let (status, children) = harness
        .send("GET", &format!("{}/children", house_path), &alice, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(children.as_array().unwrap().len(), 1);

    let (status, _) = harness
        .send("PATCH", &format!("{}/move", house_path), &alice, Some(json!({ "parent_id": room["id"] })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = harness.send("GET", &room_path, &bob, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = harness
        .send("PUT", &room_path, &bob, Some(json!({ "name": "Mine" })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = harness
        .send(
            "POST",
            "/api/v1/locations",
            &bob,
            Some(json!({ "name": "Shed", "type": "area", "parent_id": house["id"] })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, listing) = harness.send("GET", "/api/v1/locations", &bob, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listing["total"], 0);

    let (status, _) = harness.send("DELETE", &house_path, &alice, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, moved) = harness
        .send("PATCH", &format!("{}/move", room_path), &alice, Some(json!({ "parent_id": null })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(moved["parent_id"].is_null());
    let (status, _) = harness.send("DELETE", &house_path, &alice, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}
