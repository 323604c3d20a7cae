//! User account models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Registered user as stored in the database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Unique user ID
    pub id: i64,

    /// Login email, unique across users
    pub email: String,

    /// Argon2 PHC digest of the password
    #[serde(skip_serializing, default)]
    pub password_hash: String,

    /// Display name
    pub name: String,

    /// When the account was created
    pub created_at: DateTime<Utc>,

    /// When the account was last modified
    pub updated_at: DateTime<Utc>,
}

/// User data for insertion; the database assigns id and timestamps
#[derive(Clone, PartialEq, Eq)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub name: String,
}

impl NewUser {
    pub fn new(
        email: impl Into<String>,
        password_hash: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            email: email.into(),
            password_hash: password_hash.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Debug for NewUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewUser")
            .field("email", &self.email)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
