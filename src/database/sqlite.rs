//! SQLite implementation of the Database trait
//!
//! This module provides a SQLite-based implementation of the Database trait
//! using rusqlite and tokio-rusqlite for async operations.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::{OptionalExtension, Row};
use tokio_rusqlite::Connection;

use super::migrations::CREATE_SCHEMA;
use super::Database;
use crate::error::DbError;
use crate::models::{NewTask, NewUser, Task, User};

const USER_COLUMNS: &str = "id, email, password_hash, name, created_at, updated_at";

const TASK_COLUMNS: &str =
    "id, user_id, title, description, is_completed, priority, due_date, created_at, updated_at";

/// SQLite database implementation
pub struct SqliteDatabase {
    conn: Connection,
}

impl SqliteDatabase {
    /// Create a new SQLite database connection
    ///
    /// Use `:memory:` for in-memory database or a file path for persistent storage.
    pub async fn new(path: &str) -> Result<Self, DbError> {
        let conn = Connection::open(path).await?;

        // Run migrations
        conn.call(|conn| {
            conn.execute_batch(CREATE_SCHEMA)?;
            Ok::<_, rusqlite::Error>(())
        })
        .await?;

        Ok(Self { conn })
    }

    /// Create a new in-memory database (useful for testing)
    pub async fn in_memory() -> Result<Self, DbError> {
        Self::new(":memory:").await
    }
}

#[async_trait]
impl Database for SqliteDatabase {
    // =========================================================================
    // User operations
    // =========================================================================

    async fn create_user(&self, user: &NewUser) -> Result<User, DbError> {
        let email = user.email.clone();
        let password_hash = user.password_hash.clone();
        let name = user.name.clone();
        let now = now_micros();
        let now_str = format_datetime(&now);

        let id = self
            .conn
            .call(move |conn| {
                conn.execute(
                    r#"
                    INSERT INTO users (email, password_hash, name, created_at, updated_at)
                    VALUES (?1, ?2, ?3, ?4, ?4)
                    "#,
                    rusqlite::params![email, password_hash, name, now_str],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await
            .map_err(map_constraint)?;

        Ok(User {
            id,
            email: user.email.clone(),
            password_hash: user.password_hash.clone(),
            name: user.name.clone(),
            created_at: now,
            updated_at: now,
        })
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, DbError> {
        let email = email.to_string();

        self.conn
            .call(move |conn| {
                let sql = format!("SELECT {} FROM users WHERE email = ?1", USER_COLUMNS);
                let user = conn.query_row(&sql, [&email], user_from_row).optional()?;
                Ok::<_, rusqlite::Error>(user)
            })
            .await
            .map_err(Into::into)
    }

    async fn get_user_by_id(&self, id: i64) -> Result<Option<User>, DbError> {
        self.conn
            .call(move |conn| {
                let sql = format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS);
                let user = conn.query_row(&sql, [id], user_from_row).optional()?;
                Ok::<_, rusqlite::Error>(user)
            })
            .await
            .map_err(Into::into)
    }

    async fn email_exists(&self, email: &str) -> Result<bool, DbError> {
        let email = email.to_string();

        self.conn
            .call(move |conn| {
                let exists: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM users WHERE email = ?1)",
                    [&email],
                    |row| row.get(0),
                )?;
                Ok::<_, rusqlite::Error>(exists)
            })
            .await
            .map_err(Into::into)
    }

    // =========================================================================
    // Task operations
    // =========================================================================

    async fn create_task(&self, task: &NewTask) -> Result<Task, DbError> {
        let user_id = task.user_id;
        let title = task.title.clone();
        let description = task.description.clone();
        let priority = task.priority.as_str();
        let due_date = task.due_date.as_ref().map(format_datetime);
        let now = now_micros();
        let now_str = format_datetime(&now);

        let id = self
            .conn
            .call(move |conn| {
                conn.execute(
                    r#"
                    INSERT INTO tasks
                    (user_id, title, description, is_completed, priority, due_date, created_at, updated_at)
                    VALUES (?1, ?2, ?3, 0, ?4, ?5, ?6, ?6)
                    "#,
                    rusqlite::params![user_id, title, description, priority, due_date, now_str],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await
            .map_err(map_constraint)?;

        Ok(Task {
            id,
            user_id: task.user_id,
            title: task.title.clone(),
            description: task.description.clone(),
            is_completed: false,
            priority: task.priority,
            due_date: task.due_date,
            created_at: now,
            updated_at: now,
        })
    }

    async fn get_task(&self, id: i64, user_id: i64) -> Result<Option<Task>, DbError> {
        self.conn
            .call(move |conn| {
                let sql = format!(
                    "SELECT {} FROM tasks WHERE id = ?1 AND user_id = ?2",
                    TASK_COLUMNS
                );
                let task = conn
                    .query_row(&sql, rusqlite::params![id, user_id], task_from_row)
                    .optional()?;
                Ok::<_, rusqlite::Error>(task)
            })
            .await
            .map_err(Into::into)
    }

    async fn list_tasks(&self, user_id: i64) -> Result<Vec<Task>, DbError> {
        self.conn
            .call(move |conn| {
                let sql = format!(
                    "SELECT {} FROM tasks WHERE user_id = ?1 ORDER BY created_at DESC, id DESC",
                    TASK_COLUMNS
                );
                let mut stmt = conn.prepare(&sql)?;

                let tasks = stmt
                    .query_map([user_id], task_from_row)?
                    .collect::<Result<Vec<_>, _>>()?;

                Ok::<_, rusqlite::Error>(tasks)
            })
            .await
            .map_err(Into::into)
    }

    async fn update_task(&self, task: &Task) -> Result<Task, DbError> {
        let id = task.id;
        let user_id = task.user_id;
        let title = task.title.clone();
        let description = task.description.clone();
        let is_completed = task.is_completed;
        let priority = task.priority.as_str();
        let due_date = task.due_date.as_ref().map(format_datetime);
        let now = now_micros();
        let now_str = format_datetime(&now);

        let rows_affected = self
            .conn
            .call(move |conn| {
                let count = conn.execute(
                    r#"
                    UPDATE tasks
                    SET title = ?1, description = ?2, is_completed = ?3, priority = ?4,
                        due_date = ?5, updated_at = ?6
                    WHERE id = ?7 AND user_id = ?8
                    "#,
                    rusqlite::params![
                        title,
                        description,
                        is_completed,
                        priority,
                        due_date,
                        now_str,
                        id,
                        user_id
                    ],
                )?;
                Ok(count)
            })
            .await
            .map_err(map_constraint)?;

        if rows_affected == 0 {
            return Err(DbError::NotFound);
        }

        let mut updated = task.clone();
        updated.updated_at = now;
        Ok(updated)
    }

    async fn delete_task(&self, id: i64, user_id: i64) -> Result<(), DbError> {
        let rows_affected = self
            .conn
            .call(move |conn| {
                let count = conn.execute(
                    "DELETE FROM tasks WHERE id = ?1 AND user_id = ?2",
                    rusqlite::params![id, user_id],
                )?;
                Ok::<_, rusqlite::Error>(count)
            })
            .await?;

        if rows_affected == 0 {
            return Err(DbError::NotFound);
        }

        Ok(())
    }

    async fn completed_task_count(&self, user_id: i64) -> Result<u64, DbError> {
        self.conn
            .call(move |conn| {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM tasks WHERE user_id = ?1 AND is_completed = 1",
                    [user_id],
                    |row| row.get(0),
                )?;
                Ok::<_, rusqlite::Error>(count as u64)
            })
            .await
            .map_err(Into::into)
    }
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        password_hash: row.get(2)?,
        name: row.get(3)?,
        created_at: parse_datetime(row.get(4)?).unwrap_or_else(Utc::now),
        updated_at: parse_datetime(row.get(5)?).unwrap_or_else(Utc::now),
    })
}

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<Task> {
    Ok(Task {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        is_completed: row.get::<_, i64>(4)? != 0,
        priority: row
            .get::<_, String>(5)?
            .parse()
            .unwrap_or_default(),
        due_date: parse_datetime(row.get(6)?),
        created_at: parse_datetime(row.get(7)?).unwrap_or_else(Utc::now),
        updated_at: parse_datetime(row.get(8)?).unwrap_or_else(Utc::now),
    })
}

/// Map unique/check constraint failures to [`DbError::ConstraintViolation`]
fn map_constraint(err: rusqlite::Error) -> DbError {
    match err {
        rusqlite::Error::SqliteFailure(e, msg)
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            DbError::ConstraintViolation(msg.unwrap_or_else(|| e.to_string()))
        }
        other => DbError::Sqlite(other),
    }
}

/// Current time at the precision stored in the database
fn now_micros() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Fixed-width RFC 3339 so that text ordering matches time ordering
fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a datetime string to DateTime<Utc>
fn parse_datetime(s: Option<String>) -> Option<DateTime<Utc>> {
    s.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
            .or_else(|| {
                // Try parsing SQLite's datetime format
                chrono::NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M:%S")
                    .ok()
                    .map(|dt| dt.and_utc())
            })
    })
}
