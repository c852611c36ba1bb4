//! Router-level tests
//!
//! Build the full router over an in-memory database, a temp instances folder
//! and a mocked process layer, then drive it with `oneshot`.


use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use base64::Engine;
use http_body_util::BodyExt;
use serde_json::Value;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

use crate::bootstrap::{server::app_state, services};
use crate::config::Config;
use crate::db::Database;
use crate::log_buffer::LogBuffer;
use crate::ports::MockProcessControl;

use super::{create_router, AppState};

pub(crate) const TOKEN: &str = "test-token";
pub(crate) const USER: &str = "admin";
pub(crate) const PASS: &str = "secret";

pub(crate) struct TestApp {
    pub _dir: TempDir,
    pub state: AppState,
    pub router: Router,
}

/// Terminals that start and stay alive
fn live_process() -> MockProcessControl {
    let mut mock = MockProcessControl::new();
    mock.expect_spawn().returning(|_| Ok(4242));
    mock.expect_is_alive().returning(|_| true);
    mock.expect_terminate().returning(|_, _| Ok(()));
    mock
}

pub(crate) fn test_config(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.webhook.token = TOKEN.to_string();
    config.auth.basic_user = USER.to_string();
    config.auth.basic_pass = PASS.to_string();
    config.mt5.instances_dir = dir.path().join("instances").to_string_lossy().into_owned();
    config.mt5.stop_grace_secs = 0;
    config.mt5.restart_delay_secs = 0;
    config.cors.disable = true;
    config
}

pub(crate) async fn test_app_with(configure: impl FnOnce(&mut Config)) -> TestApp {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&dir);
    configure(&mut config);

    let db = Arc::new(Database::new("sqlite::memory:").await.unwrap());
    let registry = services::build(&config, db, Arc::new(live_process()), LogBuffer::default())
        .await
        .unwrap();
    let state = app_state(Arc::new(config), registry);
    let router = create_router(state.clone());

    TestApp {
        _dir: dir,
        state,
        router,
    }
}

pub(crate) async fn test_app() -> TestApp {
    test_app_with(|_| {}).await
}

pub(crate) fn basic_auth(user: &str, pass: &str) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(format!("{}:{}", user, pass));
    format!("Basic {}", encoded)
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    /// Authenticated request; `body` is sent as JSON when given
    pub async fn call(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, basic_auth(USER, PASS));
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(request).await
    }

    pub async fn post_public(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }
}
