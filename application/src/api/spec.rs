use axum::{body::Body, Router};
use http_body_util::BodyExt as _;
use serde_json::{json, Value};
use service::infra::{kv, Memory};
use tower::ServiceExt as _;

use crate::Service;

fn app() -> Router {
    app_with(Memory::new(), kv::Backend::Memory(kv::memory::Memory::new()))
}

fn app_with(db: Memory, token_store: kv::Backend) -> Router {
    super::router(Service::new(
        service::Config::with_secret(b"test-secret"),
        db,
        token_store,
        kv::Backend::Memory(kv::memory::Memory::new()),
    ))
}

async fn send(
    app: &Router,
    method: http::Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (http::StatusCode, Value) {
    let mut req = http::Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        req = req.header(http::header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let req = match body {
        Some(body) => req
            .header(http::header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => req.body(Body::empty()),
    }
    .unwrap();

    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn log_in(app: &Router, username: &str) -> (String, String) {
    let (status, _) = send(
        app,
        http::Method::POST,
        "/api/auth/signup",
        None,
        Some(json!({"username": username, "password": "s3cret"})),
    )
    .await;
    assert_eq!(status, http::StatusCode::CREATED);

    let (status, body) = send(
        app,
        http::Method::POST,
        "/api/auth/login",
        None,
        Some(json!({"username": username, "password": "s3cret"})),
    )
    .await;
    assert_eq!(status, http::StatusCode::OK);
    (
        body["access"].as_str().unwrap().to_owned(),
        body["refresh"].as_str().unwrap().to_owned(),
    )
}

#[tokio::test]
async fn manages_notes_end_to_end() {
    let app = app();
    let (access, _) = log_in(&app, "alice").await;
    let token = Some(access.as_str());

    let (status, created) = send(
        &app,
        http::Method::POST,
        "/api/notes",
        token,
        Some(json!({"title": "Groceries", "content": "milk"})),
    )
    .await;
    assert_eq!(status, http::StatusCode::CREATED);
    assert_eq!(created["title"], "Groceries");
    assert_eq!(created["content"], "milk");
    let uri = format!("/api/notes/{}", created["id"].as_str().unwrap());

    let (status, list) =
        send(&app, http::Method::GET, "/api/notes", token, None).await;
    assert_eq!(status, http::StatusCode::OK);
    assert_eq!(list, json!([created]));

    let (status, updated) = send(
        &app,
        http::Method::PATCH,
        &uri,
        token,
        Some(json!({"content": "milk, eggs"})),
    )
    .await;
    assert_eq!(status, http::StatusCode::OK);
    assert_eq!(updated["title"], "Groceries");
    assert_eq!(updated["content"], "milk, eggs");

    let (_, list) =
        send(&app, http::Method::GET, "/api/notes", token, None).await;
    assert_eq!(list, json!([updated]));

    let (status, _) =
        send(&app, http::Method::DELETE, &uri, token, None).await;
    assert_eq!(status, http::StatusCode::NO_CONTENT);

    let (status, body) = send(&app, http::Method::GET, &uri, token, None).await;
    assert_eq!(status, http::StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOTE_NOT_EXISTS");

    let (_, list) =
        send(&app, http::Method::GET, "/api/notes", token, None).await;
    assert_eq!(list, json!([]));
}

#[tokio::test]
async fn requires_authorization() {
    let app = app();

    let (status, body) =
        send(&app, http::Method::GET, "/api/notes", None, None).await;
    assert_eq!(status, http::StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "AUTHORIZATION_REQUIRED");

    let (status, body) =
        send(&app, http::Method::GET, "/api/notes", Some("garbage"), None)
            .await;
    assert_eq!(status, http::StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "TOKEN_INVALID");

    for header in ["Basic YWxpY2U6czNjcmV0", "Bearer", "garbage"] {
        let req = http::Request::builder()
            .uri("/api/notes")
            .header(http::header::AUTHORIZATION, header)
            .body(Body::empty())
            .unwrap();
        let resp = app.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), http::StatusCode::UNAUTHORIZED, "{header}");
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["code"], "TOKEN_INVALID", "{header}");
    }
}

#[tokio::test]
async fn fails_closed_when_token_store_is_unreachable() {
    let db = Memory::new();
    let app = app_with(
        db.clone(),
        kv::Backend::Memory(kv::memory::Memory::new()),
    );
    let (access, _) = log_in(&app, "alice").await;

    let down = kv::Redis::new(&kv::redis::Config::from_url(
        "redis://127.0.0.1:1",
    ))
    .unwrap();
    let app = app_with(db, kv::Backend::Redis(down));

    let (status, body) =
        send(&app, http::Method::GET, "/api/notes", Some(&access), None).await;
    assert_eq!(status, http::StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "TOKEN_UNVERIFIABLE");
}

#[tokio::test]
async fn revokes_token_on_logout() {
    let app = app();
    let (access, _) = log_in(&app, "alice").await;

    let (status, _) = send(
        &app,
        http::Method::POST,
        "/api/auth/logout",
        Some(&access),
        None,
    )
    .await;
    assert_eq!(status, http::StatusCode::OK);

    let (status, body) =
        send(&app, http::Method::GET, "/api/notes", Some(&access), None).await;
    assert_eq!(status, http::StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "TOKEN_REVOKED");
}

#[tokio::test]
async fn forbids_foreign_notes() {
    let app = app();
    let (alice, _) = log_in(&app, "alice").await;
    let (bob, _) = log_in(&app, "bob").await;

    let (_, note) = send(
        &app,
        http::Method::POST,
        "/api/notes",
        Some(&alice),
        Some(json!({"title": "Diary"})),
    )
    .await;
    let uri = format!("/api/notes/{}", note["id"].as_str().unwrap());

    for method in [http::Method::GET, http::Method::DELETE] {
        let (status, body) = send(&app, method, &uri, Some(&bob), None).await;
        assert_eq!(status, http::StatusCode::FORBIDDEN);
        assert_eq!(body["code"], "NOT_NOTE_OWNER");
    }
    for patch in [json!({"title": "Mine"}), json!({"title": ""})] {
        let (status, body) =
            send(&app, http::Method::PATCH, &uri, Some(&bob), Some(patch))
                .await;
        assert_eq!(status, http::StatusCode::FORBIDDEN);
        assert_eq!(body["code"], "NOT_NOTE_OWNER");
    }

    let (_, list) =
        send(&app, http::Method::GET, "/api/notes", Some(&bob), None).await;
    assert_eq!(list, json!([]));
    let (status, kept) =
        send(&app, http::Method::GET, &uri, Some(&alice), None).await;
    assert_eq!(status, http::StatusCode::OK);
    assert_eq!(kept["title"], "Diary");
}

#[tokio::test]
async fn refreshes_access_token() {
    let app = app();
    let (access, refresh) = log_in(&app, "alice").await;

    let (status, body) = send(
        &app,
        http::Method::POST,
        "/api/auth/refresh",
        None,
        Some(json!({"refresh": refresh})),
    )
    .await;
    assert_eq!(status, http::StatusCode::OK);
    let renewed = body["access"].as_str().unwrap();

    let (status, _) =
        send(&app, http::Method::GET, "/api/notes", Some(renewed), None).await;
    assert_eq!(status, http::StatusCode::OK);

    // Access token is not a refresh token.
    let (status, body) = send(
        &app,
        http::Method::POST,
        "/api/auth/refresh",
        None,
        Some(json!({"refresh": access})),
    )
    .await;
    assert_eq!(status, http::StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "TOKEN_INVALID");
}

#[tokio::test]
async fn rejects_malformed_requests() {
    let app = app();
    let (access, _) = log_in(&app, "alice").await;

    let (status, body) = send(
        &app,
        http::Method::POST,
        "/api/notes",
        Some(&access),
        Some(json!({"content": "no title"})),
    )
    .await;
    assert_eq!(status, http::StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_REQUEST");

    let (status, body) = send(
        &app,
        http::Method::POST,
        "/api/notes",
        Some(&access),
        Some(json!({"title": "   "})),
    )
    .await;
    assert_eq!(status, http::StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_TITLE");

    let (status, body) = send(
        &app,
        http::Method::PATCH,
        "/api/notes/00000000-0000-0000-0000-000000000000",
        Some(&access),
        Some(json!({"title": ""})),
    )
    .await;
    assert_eq!(status, http::StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOTE_NOT_EXISTS");

    let (_, note) = send(
        &app,
        http::Method::POST,
        "/api/notes",
        Some(&access),
        Some(json!({"title": "Groceries"})),
    )
    .await;
    let (status, body) = send(
        &app,
        http::Method::PATCH,
        &format!("/api/notes/{}", note["id"].as_str().unwrap()),
        Some(&access),
        Some(json!({"title": ""})),
    )
    .await;
    assert_eq!(status, http::StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_TITLE");

    let (status, _) = send(
        &app,
        http::Method::GET,
        "/api/notes/not-a-uuid",
        Some(&access),
        None,
    )
    .await;
    assert_eq!(status, http::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn rejects_wrong_credentials_and_occupied_username() {
    let app = app();
    _ = log_in(&app, "alice").await;

    let (status, body) = send(
        &app,
        http::Method::POST,
        "/api/auth/login",
        None,
        Some(json!({"username": "alice", "password": "wrong"})),
    )
    .await;
    assert_eq!(status, http::StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "WRONG_CREDENTIALS");

    let (status, body) = send(
        &app,
        http::Method::POST,
        "/api/auth/signup",
        None,
        Some(json!({"username": "alice", "password": "other"})),
    )
    .await;
    assert_eq!(status, http::StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "USERNAME_OCCUPIED");
}
