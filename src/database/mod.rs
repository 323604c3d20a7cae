//! Database layer for youdo-api
//!
//! This module defines the database trait and SQLite implementation.

pub mod migrations;
pub mod sqlite;

pub use sqlite::SqliteDatabase;

use async_trait::async_trait;

use crate::error::DbError;
use crate::models::{NewTask, NewUser, Task, User};

/// Database trait for data persistence
///
/// This trait defines all database operations needed by the application.
/// It uses `async_trait` for async methods and `mockall::automock` for testing.
/// Every task operation is scoped by owner: a task belonging to another user
/// behaves exactly like a missing one.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Database: Send + Sync {
    // =========================================================================
    // User operations
    // =========================================================================

    /// Insert a user and return the stored record
    ///
    /// Fails with [`DbError::ConstraintViolation`] if the email is taken.
    async fn create_user(&self, user: &NewUser) -> Result<User, DbError>;

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, DbError>;

    async fn get_user_by_id(&self, id: i64) -> Result<Option<User>, DbError>;

    async fn email_exists(&self, email: &str) -> Result<bool, DbError>;

    // =========================================================================
    // Task operations
    // =========================================================================

    /// Insert a task and return the stored record
    async fn create_task(&self, task: &NewTask) -> Result<Task, DbError>;

    /// Get a task by id if it belongs to `user_id`
    async fn get_task(&self, id: i64, user_id: i64) -> Result<Option<Task>, DbError>;

    /// List a user's tasks, newest first
    async fn list_tasks(&self, user_id: i64) -> Result<Vec<Task>, DbError>;

    /// Persist all mutable fields of `task` and bump `updated_at`
    ///
    /// Returns [`DbError::NotFound`] if no task with that id belongs to `task.user_id`.
    async fn update_task(&self, task: &Task) -> Result<Task, DbError>;

    /// Delete a task owned by `user_id`
    async fn delete_task(&self, id: i64, user_id: i64) -> Result<(), DbError>;

    /// Number of completed tasks for a user
    async fn completed_task_count(&self, user_id: i64) -> Result<u64, DbError>;
}
