//! Common test utilities and helpers for integration tests

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use youdo_api::auth::{
    AdmissionController, AuthService, CredentialHasher, RateLimitConfig, TokenService,
};
use youdo_api::config::{CorsConfig, ServerConfig};
use youdo_api::database::SqliteDatabase;
use youdo_api::server::{AppState, Server};
use youdo_api::tasks::TaskService;

pub const TEST_SECRET: &str = "integration-test-secret";
pub const TEST_PASSWORD: &str = "password123";

/// Create an in-memory database for testing
pub async fn create_test_database() -> Arc<SqliteDatabase> {
    Arc::new(
        SqliteDatabase::in_memory()
            .await
            .expect("Failed to create test database"),
    )
}

/// Argon2 parameters small enough to keep the suite fast
pub fn cheap_hasher() -> CredentialHasher {
    CredentialHasher::new(8, 1, 1).expect("Invalid test hash parameters")
}

/// Create a test application state with the given admission limits
pub async fn create_test_state_with_limits(limits: RateLimitConfig) -> AppState<SqliteDatabase> {
    let database = create_test_database().await;

    AppState {
        auth_service: Arc::new(AuthService::new(
            Arc::clone(&database),
            cheap_hasher(),
            TokenService::new(TEST_SECRET, Duration::from_secs(3600)),
        )),
        task_service: Arc::new(TaskService::new(database)),
        admission: Arc::new(AdmissionController::new(limits)),
        trust_forwarded_for: false,
        cors: CorsConfig::default(),
    }
}

/// Create a test application state with generous limits
pub async fn create_test_state() -> AppState<SqliteDatabase> {
    create_test_state_with_limits(RateLimitConfig {
        requests: 10_000,
        ..RateLimitConfig::default()
    })
    .await
}

/// Run a test server in the background and return the address
/// The server will be shut down when the returned shutdown sender is dropped or sent
pub async fn run_test_server(
    state: AppState<SqliteDatabase>,
) -> (SocketAddr, tokio::sync::oneshot::Sender<()>) {
    use tokio::net::TcpListener;

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test server");
    let addr = listener.local_addr().expect("Failed to get local address");

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

    let config = ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        ..Default::default()
    };
    let server = Server::new(config, state);

    tokio::spawn(async move {
        server
            .serve(listener, async move {
                let _ = shutdown_rx.await;
            })
            .await
            .expect("Server error");
    });

    (addr, shutdown_tx)
}

/// Register a user and return the session token
pub async fn register_user(client: &reqwest::Client, addr: SocketAddr, email: &str) -> String {
    let response = client
        .post(format!("http://{}/api/auth/register", addr))
        .json(&json!({
            "name": "Test User",
            "email": email,
            "password": TEST_PASSWORD,
        }))
        .send()
        .await
        .expect("Register request failed");

    assert_eq!(response.status(), 201, "registration of {} failed", email);
    let body: Value = response.json().await.expect("Invalid register body");
    body["data"]["token"]
        .as_str()
        .expect("Missing token")
        .to_string()
}

/// Create a task and return its id
pub async fn create_task(
    client: &reqwest::Client,
    addr: SocketAddr,
    token: &str,
    body: Value,
) -> i64 {
    let response = client
        .post(format!("http://{}/api/tasks", addr))
        .bearer_auth(token)
        .json(&body)
        .send()
        .await
        .expect("Create task request failed");

    assert_eq!(response.status(), 201);
    let body: Value = response.json().await.expect("Invalid task body");
    body["data"]["id"].as_i64().expect("Missing task id")
}
