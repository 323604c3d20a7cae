//! Application error types for youdo-api
//!
//! This module defines common error types used throughout the application.
//! All error types use `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Session token verification and issuing errors
///
/// The three verification kinds stay distinct internally even though every
/// one of them surfaces to the client as a plain "unauthorized".
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TokenError {
    /// Token could not be parsed (bad segments, bad base64, bad claims JSON)
    #[error("Malformed token")]
    Malformed,

    /// Signature does not match the one recomputed with the server secret
    #[error("Invalid token signature")]
    SignatureInvalid,

    /// Token is correctly signed but past its expiry
    #[error("Token expired")]
    Expired,

    /// Token could not be signed
    #[error("Failed to sign token: {0}")]
    Signing(String),
}

impl TokenError {
    /// Short label used as a structured log field
    pub fn kind(&self) -> &'static str {
        match self {
            TokenError::Malformed => "malformed",
            TokenError::SignatureInvalid => "signature_invalid",
            TokenError::Expired => "expired",
            TokenError::Signing(_) => "signing",
        }
    }
}

/// Password hashing errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum HashError {
    /// Hashing failed (entropy or resource failure)
    #[error("Hash failed: {0}")]
    HashFailed(String),

    /// Stored digest is not a well-formed PHC string
    #[error("Malformed password hash: {0}")]
    MalformedDigest(String),

    /// Hasher parameters are out of range
    #[error("Invalid hasher parameters: {0}")]
    InvalidParams(String),
}

/// Authentication-related errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AuthError {
    /// Missing authorization header
    #[error("Missing authorization header")]
    MissingAuth,

    /// Authorization header present but not a bearer token
    #[error("Unsupported authentication scheme")]
    UnsupportedScheme,

    /// Bearer token failed verification
    #[error("Invalid token: {0}")]
    Token(#[from] TokenError),

    /// Unknown email or wrong password
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// Registration with an email that already has an account
    #[error("Email already registered")]
    EmailTaken,

    /// Token is valid but its user no longer exists
    #[error("User not found")]
    UnknownUser,
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DbError {
    /// SQLite error
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Record not found
    #[error("Record not found")]
    NotFound,

    /// Constraint violation
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),
}

/// Request field validation errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    /// Email does not look like an address
    #[error("invalid email format")]
    InvalidEmail,

    /// Password does not meet the length/character policy
    #[error("password must be at least 8 characters and contain letters and numbers")]
    WeakPassword,

    /// Field is missing, empty or out of bounds
    #[error("{field}: {reason}")]
    InvalidField {
        field: &'static str,
        reason: String,
    },

    /// Priority outside of low/medium/high
    #[error("priority must be one of: low, medium, high")]
    InvalidPriority,

    /// Due date is not RFC 3339
    #[error("invalid due_date format, use ISO 8601 (e.g., 2024-12-31T23:59:59Z)")]
    InvalidDueDate,
}

impl ValidationError {
    pub fn field(field: &'static str, reason: impl Into<String>) -> Self {
        ValidationError::InvalidField {
            field,
            reason: reason.into(),
        }
    }
}

/// Task-related errors
#[derive(Debug, Error)]
pub enum TaskError {
    /// Task does not exist or belongs to another user
    #[error("Task not found")]
    NotFound,

    /// Invalid request data
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Storage failure
    #[error("Database error: {0}")]
    Database(DbError),
}

impl From<DbError> for TaskError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound => TaskError::NotFound,
            other => TaskError::Database(other),
        }
    }
}

/// Application-level error type
///
/// This is the main error type used throughout the application.
/// It aggregates all domain-specific error types.
#[derive(Debug, Error)]
pub enum AppError {
    /// Authentication error
    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),

    /// Password hashing error
    #[error("Hashing error: {0}")]
    Hash(#[from] HashError),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Task error
    #[error("Task error: {0}")]
    Task(#[from] TaskError),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Signing(msg) => AppError::Internal(msg),
            other => AppError::Auth(AuthError::Token(other)),
        }
    }
}
