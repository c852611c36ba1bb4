// bridge-server/tests/common/mod.rs
//
// Shared harness for the integration tests: the full router over an
// in-memory database, a temp instances folder and a fake process layer.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use base64::Engine;
use http_body_util::BodyExt;
use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

use mt5_bridge_server::api::{create_router, AppState};
use mt5_bridge_server::bootstrap::{server::app_state, services};
use mt5_bridge_server::config::Config;
use mt5_bridge_server::db::Database;
use mt5_bridge_server::log_buffer::LogBuffer;
use mt5_bridge_server::ports::{LaunchSpec, ProcessControl};

pub const TOKEN: &str = "e2e-token";
pub const USER: &str = "admin";
pub const PASS: &str = "e2e-pass";

/// Hands out increasing PIDs; a PID stays alive until terminated or killed
#[derive(Default)]
pub struct FakeProcess {
    next_pid: AtomicU32,
    alive: Mutex<HashSet<u32>>,
    pub launches: Mutex<Vec<LaunchSpec>>,
}

impl FakeProcess {
    /// Simulate a terminal that exited on its own
    pub fn kill(&self, pid: u32) {
        self.alive.lock().unwrap().remove(&pid);
    }
}

#[async_trait]
impl ProcessControl for FakeProcess {
    async fn spawn(&self, spec: &LaunchSpec) -> anyhow::Result<u32> {
        let pid = 1000 + self.next_pid.fetch_add(1, Ordering::SeqCst);
        self.alive.lock().unwrap().insert(pid);
        self.launches.lock().unwrap().push(spec.clone());
        Ok(pid)
    }

    async fn is_alive(&self, pid: u32) -> bool {
        self.alive.lock().unwrap().contains(&pid)
    }

    async fn terminate(&self, pid: u32, _grace: Duration) -> anyhow::Result<()> {
        self.alive.lock().unwrap().remove(&pid);
        Ok(())
    }
}

pub struct TestServer {
    pub dir: TempDir,
    pub state: AppState,
    pub router: Router,
    pub process: Arc<FakeProcess>,
}

impl TestServer {
    pub async fn start() -> Self {
        Self::start_with(|_| {}).await
    }

    pub async fn start_with(configure: impl FnOnce(&mut Config)) -> Self {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.webhook.token = TOKEN.to_string();
        config.auth.basic_user = USER.to_string();
        config.auth.basic_pass = PASS.to_string();
        config.mt5.instances_dir = dir.path().join("instances").to_string_lossy().into_owned();
        config.mt5.stop_grace_secs = 0;
        config.mt5.restart_delay_secs = 0;
        config.cors.disable = true;
        config.rate_limit.api_per_hour = 10_000;
        configure(&mut config);

        let db = Arc::new(Database::new("sqlite::memory:").await.unwrap());
        let process = Arc::new(FakeProcess::default());
        let registry = services::build(&config, db, process.clone(), LogBuffer::default())
            .await
            .unwrap();
        let state = app_state(Arc::new(config), registry);
        let router = create_router(state.clone());

        Self {
            dir,
            state,
            router,
            process,
        }
    }

    pub fn instance_dir(&self, account: &str) -> PathBuf {
        self.dir.path().join("instances").join(account)
    }

    pub fn drop_folder(&self, account: &str) -> PathBuf {
        self.instance_dir(account).join("MQL5").join("Files")
    }

    /// Command files currently waiting in `account`'s drop folder
    pub fn command_files(&self, account: &str, prefix: &str) -> Vec<Value> {
        read_commands(&self.drop_folder(account), prefix)
    }

    /// Write the Market Watch file the symbol source scans
    pub fn write_market_watch(&self, account: &str, symbols: &[&str]) {
        let config = self.instance_dir(account).join("config");
        std::fs::create_dir_all(&config).unwrap();
        let mut raw = vec![0u8, 1, 2];
        for symbol in symbols {
            raw.extend_from_slice(symbol.as_bytes());
            raw.extend_from_slice(&[0, 0, 7, 0]);
        }
        std::fs::write(config.join("symbols.sel"), raw).unwrap();
    }

    pub fn write_balance(&self, account: &str, balance: f64) {
        let folder = self.drop_folder(account);
        std::fs::create_dir_all(&folder).unwrap();
        std::fs::write(
            folder.join("account_info.json"),
            serde_json::json!({ "balance": balance }).to_string(),
        )
        .unwrap();
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    /// Authenticated request
    pub async fn call(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, basic_auth());
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(request).await
    }

    /// Unauthenticated JSON POST, as sent by TradingView or a master EA
    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    pub async fn add_account(&self, account: &str) -> Value {
        let (status, body) = self
            .call(
                "POST",
                "/accounts",
                Some(serde_json::json!({ "account": account, "nickname": format!("acc-{}", account) })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "add {}: {}", account, body);
        body
    }
}

pub fn basic_auth() -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(format!("{}:{}", USER, PASS));
    format!("Basic {}", encoded)
}

fn read_commands(folder: &Path, prefix: &str) -> Vec<Value> {
    let Ok(entries) = std::fs::read_dir(folder) else {
        return Vec::new();
    };
    let mut names: Vec<PathBuf> = entries
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(prefix) && n.ends_with(".json"))
        })
        .collect();
    names.sort();
    names
        .iter()
        .map(|p| serde_json::from_slice(&std::fs::read(p).unwrap()).unwrap())
        .collect()
}
