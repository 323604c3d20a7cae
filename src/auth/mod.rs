//! Request admission and identity for youdo-api
//!
//! This module provides:
//! - Per-client token-bucket rate limiting with background eviction
//! - Session token (JWT) issuing and verification
//! - Password hashing
//! - Registration, login and bearer token authentication

pub mod password;
pub mod ratelimit;
pub mod service;
pub mod token;

pub use password::CredentialHasher;
pub use ratelimit::{spawn_sweeper, AdmissionController, RateLimitConfig, SweeperHandle};
pub use service::{AuthService, AuthenticatedUser};
pub use token::{issue_token, verify_token, Claims, TokenService, TOKEN_ALGORITHM};
