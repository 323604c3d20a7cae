//! HTTP middleware for youdo-api
//!
//! This module provides middleware for:
//! - Per-client request admission (rate limiting)
//! - Bearer token authentication
//! - Request/response logging

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use crate::auth::{AdmissionController, AuthService};
use crate::database::Database;
use crate::error::AuthError;

use super::response::ApiError;

/// Client identifier used when the peer address is unavailable
const UNKNOWN_CLIENT: &str = "unknown";

/// State for the admission middleware
#[derive(Clone)]
pub struct AdmissionState {
    pub controller: Arc<AdmissionController>,

    /// Take the client identifier from `X-Forwarded-For` when present
    pub trust_forwarded_for: bool,
}

/// Derive the rate limiting key for a request
///
/// The peer IP, or the first `X-Forwarded-For` entry when the server sits
/// behind a trusted proxy.
pub fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>, trust_forwarded_for: bool) -> String {
    if trust_forwarded_for {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());

        if let Some(ip) = forwarded {
            return ip.to_string();
        }
    }

    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

fn peer_addr(request: &Request) -> Option<SocketAddr> {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr)
}

/// Admission middleware function
///
/// Consumes one token from the client's bucket; an empty bucket ends the
/// request with 429 before any handler runs.
pub async fn rate_limit_middleware(
    State(state): State<AdmissionState>,
    request: Request,
    next: Next,
) -> Response {
    let client = client_key(
        request.headers(),
        peer_addr(&request),
        state.trust_forwarded_for,
    );

    if !state.controller.admit(&client) {
        tracing::debug!(
            client = %client,
            path = %request.uri().path(),
            "Request rejected by rate limiter"
        );
        return ApiError::rate_limited().into_response();
    }

    next.run(request).await
}

/// Extract the token from an `Authorization: Bearer <token>` header
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingAuth)?
        .to_str()
        .map_err(|_| AuthError::UnsupportedScheme)?;

    let (scheme, token) = value
        .split_once(' ')
        .ok_or(AuthError::UnsupportedScheme)?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::UnsupportedScheme);
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::MissingAuth);
    }
    Ok(token)
}

/// Authentication middleware function
///
/// This middleware:
/// 1. Extracts the bearer token from the Authorization header
/// 2. Verifies it
/// 3. Adds the authenticated user to the request extensions
pub async fn auth_middleware<D: Database + 'static>(
    State(auth_service): State<Arc<AuthService<D>>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user = {
        let token = bearer_token(request.headers()).map_err(|e| {
            tracing::debug!(error = %e, "Missing or unusable authorization header");
            ApiError::from(e)
        })?;
        auth_service.authenticate(token)?
    };

    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

/// Logging middleware function
///
/// Logs request and response details including:
/// - Method and path
/// - Client address
/// - Status code
/// - Response time
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let uri = request.uri().clone();
    let client = peer_addr(&request)
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string());

    let response = next.run(request).await;

    let elapsed = start.elapsed();
    let status = response.status();

    tracing::info!(
        method = %method,
        path = %uri.path(),
        client = %client,
        status = %status.as_u16(),
        duration_ms = %elapsed.as_millis(),
        "Request completed"
    );

    response
}
