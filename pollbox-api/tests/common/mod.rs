//! Shared helpers for API tests
//!
//! Every context gets its own in-memory store, so tests never share state
//! and need no external services.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use pollbox_api::{
    app::{build_router, AppState},
    config::Config,
};
use pollbox_shared::{
    auth::jwt::issue_session,
    models::user::CreateUser,
    store::{MemoryStore, PollStore},
};
use serde_json::Value;
use std::{collections::HashMap, sync::Arc};
use tower::ServiceExt;

pub const TEST_SECRET: &str = "integration-test-secret-at-least-32-bytes";

/// A user created directly in the store, with a valid access token
#[derive(Debug, Clone)]
pub struct TestUser {
    pub id: i64,
    pub username: String,
    pub token: String,
}

/// Test context containing the router and its store
pub struct TestContext {
    pub app: Router,
    pub store: MemoryStore,
    pub config: Config,
}

impl TestContext {
    pub fn new() -> Self {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("STORAGE_BACKEND", "memory"),
            ("JWT_SECRET", TEST_SECRET),
            ("CORS_ORIGINS", "http://localhost:5173"),
        ]);
        let config = Config::from_vars(|key| vars.get(key).map(|v| v.to_string()))
            .expect("test config should load");

        let store = MemoryStore::new();
        let state = AppState::new(Arc::new(store.clone()), config.clone());

        Self {
            app: build_router(state),
            store,
            config,
        }
    }

    /// Sends a request and returns the status and JSON body (`Null` if empty)
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }

        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();

        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };

        (status, json)
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, token, Some(body)).await
    }

    /// Creates a user without going through password hashing
    pub async fn user(&self, username: &str) -> TestUser {
        let user = self
            .store
            .create_user(CreateUser {
                username: username.to_string(),
                email: format!("{}@example.com", username),
                password_hash: "$argon2id$unused".to_string(),
            })
            .await
            .unwrap();

        let session = issue_session(user.id, TEST_SECRET).unwrap();

        TestUser {
            id: user.id,
            username: user.username,
            token: session.access_token,
        }
    }

    /// Creates a poll through the API and returns its JSON
    pub async fn create_poll(&self, owner: &TestUser, title: &str, options: &[&str]) -> Value {
        let (status, body) = self
            .post(
                "/api/polls",
                Some(&owner.token),
                serde_json::json!({ "title": title, "options": options }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create poll failed: {}", body);
        body
    }
}

/// Option id at `index` in a poll JSON body
pub fn option_id(poll: &Value, index: usize) -> i64 {
    poll["options"][index]["id"].as_i64().unwrap()
}

pub fn poll_id(poll: &Value) -> i64 {
    poll["id"].as_i64().unwrap()
}
