//! HTTP router for youdo-api
//!
//! This module defines the axum router that handles all HTTP requests.
//! It provides routes for:
//! - Health checks
//! - Registration and login
//! - Task CRUD for the authenticated user

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::{header, HeaderName, HeaderValue, Method, StatusCode},
    middleware,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Extension, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};

use crate::auth::{AdmissionController, AuthService, AuthenticatedUser};
use crate::config::CorsConfig;
use crate::database::Database;
use crate::models::{CreateTaskRequest, LoginRequest, RegisterRequest, UpdateTaskRequest};
use crate::tasks::TaskService;

use super::middleware::{auth_middleware, logging_middleware, rate_limit_middleware, AdmissionState};
use super::response::{respond, ApiError, ApiResponse};

/// Static headers added to every response
pub const SECURITY_HEADERS: &[(&str, &str)] = &[
    ("x-frame-options", "DENY"),
    ("x-content-type-options", "nosniff"),
    ("x-xss-protection", "1; mode=block"),
    ("content-security-policy", "default-src 'self'"),
    ("referrer-policy", "strict-origin-when-cross-origin"),
    ("permissions-policy", "geolocation=(), microphone=(), camera=()"),
];

/// Shared application state
pub struct AppState<D: Database> {
    /// Registration, login and token verification
    pub auth_service: Arc<AuthService<D>>,

    /// Task operations
    pub task_service: Arc<TaskService<D>>,

    /// Per-client admission controller
    pub admission: Arc<AdmissionController>,

    /// Use X-Forwarded-For for client identification
    pub trust_forwarded_for: bool,

    /// CORS settings
    pub cors: CorsConfig,
}

impl<D: Database> Clone for AppState<D> {
    fn clone(&self) -> Self {
        Self {
            auth_service: Arc::clone(&self.auth_service),
            task_service: Arc::clone(&self.task_service),
            admission: Arc::clone(&self.admission),
            trust_forwarded_for: self.trust_forwarded_for,
            cors: self.cors.clone(),
        }
    }
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

/// Build the main application router
///
/// Layers, outermost first: tracing, request logging, CORS, security
/// headers, admission. Protected routes additionally run the auth gate.
pub fn build_router<D: Database + 'static>(state: AppState<D>) -> Router {
    let admission = AdmissionState {
        controller: Arc::clone(&state.admission),
        trust_forwarded_for: state.trust_forwarded_for,
    };
    let cors = cors_layer(&state.cors);

    let protected = Router::new()
        .route("/api/auth/me", get(me_handler::<D>))
        .route(
            "/api/tasks",
            get(list_tasks_handler::<D>).post(create_task_handler::<D>),
        )
        .route(
            "/api/tasks/:id",
            get(get_task_handler::<D>)
                .put(update_task_handler::<D>)
                .delete(delete_task_handler::<D>),
        )
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state.auth_service),
            auth_middleware::<D>,
        ));

    let mut router = Router::new()
        .route("/health", get(health_handler))
        .route("/api/auth/register", post(register_handler::<D>))
        .route("/api/auth/login", post(login_handler::<D>))
        .merge(protected)
        .with_state(state)
        .layer(middleware::from_fn_with_state(
            admission,
            rate_limit_middleware,
        ));

    for &(name, value) in SECURITY_HEADERS {
        router = router.layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        ));
    }

    router
        .layer(cors)
        .layer(middleware::from_fn(logging_middleware))
        .layer(TraceLayer::new_for_http())
}

/// CORS policy for the configured origins
///
/// A `*` entry allows any origin.
pub fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    if config.allowed_origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    layer
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
}

// =============================================================================
// Health Handler
// =============================================================================

/// Health check endpoint handler
async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "YouDo API".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// =============================================================================
// Auth Handlers
// =============================================================================

fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    body.map(|Json(v)| v).map_err(|e| {
        tracing::debug!(error = %e, "Rejected request body");
        ApiError::bad_request("Invalid request body")
    })
}

fn task_id(id: Result<Path<i64>, PathRejection>) -> Result<i64, ApiError> {
    id.map(|Path(id)| id)
        .map_err(|_| ApiError::bad_request("Invalid task ID"))
}

async fn register_handler<D: Database + 'static>(
    State(state): State<AppState<D>>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let req = json_body(body)?;
    let auth = state.auth_service.register(req).await?;

    Ok(respond(
        StatusCode::CREATED,
        ApiResponse::ok("User registered successfully", auth),
    ))
}

async fn login_handler<D: Database + 'static>(
    State(state): State<AppState<D>>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let req = json_body(body)?;
    let auth = state.auth_service.login(req).await?;

    Ok(respond(StatusCode::OK, ApiResponse::ok("Login successful", auth)))
}

async fn me_handler<D: Database + 'static>(
    State(state): State<AppState<D>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Response, ApiError> {
    let me = state.auth_service.current_user(user.user_id).await?;
    Ok(respond(
        StatusCode::OK,
        ApiResponse::ok("User retrieved successfully", me),
    ))
}

// =============================================================================
// Task Handlers
// =============================================================================

async fn create_task_handler<D: Database + 'static>(
    State(state): State<AppState<D>>,
    Extension(user): Extension<AuthenticatedUser>,
    body: Result<Json<CreateTaskRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let req = json_body(body)?;
    let task = state.task_service.create_task(user.user_id, req).await?;

    Ok(respond(
        StatusCode::CREATED,
        ApiResponse::ok("Task created successfully", task),
    ))
}

async fn list_tasks_handler<D: Database + 'static>(
    State(state): State<AppState<D>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Response, ApiError> {
    let tasks = state.task_service.list_tasks(user.user_id).await?;
    Ok(respond(
        StatusCode::OK,
        ApiResponse::ok("Tasks retrieved successfully", tasks),
    ))
}

async fn get_task_handler<D: Database + 'static>(
    State(state): State<AppState<D>>,
    Extension(user): Extension<AuthenticatedUser>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Response, ApiError> {
    let id = task_id(id)?;
    let task = state.task_service.get_task(user.user_id, id).await?;

    Ok(respond(
        StatusCode::OK,
        ApiResponse::ok("Task retrieved successfully", task),
    ))
}

async fn update_task_handler<D: Database + 'static>(
    State(state): State<AppState<D>>,
    Extension(user): Extension<AuthenticatedUser>,
    id: Result<Path<i64>, PathRejection>,
    body: Result<Json<UpdateTaskRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let id = task_id(id)?;
    let req = json_body(body)?;
    let task = state.task_service.update_task(user.user_id, id, req).await?;

    Ok(respond(
        StatusCode::OK,
        ApiResponse::ok("Task updated successfully", task),
    ))
}

async fn delete_task_handler<D: Database + 'static>(
    State(state): State<AppState<D>>,
    Extension(user): Extension<AuthenticatedUser>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Response, ApiError> {
    let id = task_id(id)?;
    state.task_service.delete_task(user.user_id, id).await?;

    Ok(respond(
        StatusCode::OK,
        ApiResponse::<()>::message("Task deleted successfully"),
    ))
}
