//! Database migrations for youdo-api
//!
//! This module contains SQL migrations for the SQLite database schema.

/// SQL statement to create the initial database schema
pub const CREATE_SCHEMA: &str = r#"
PRAGMA foreign_keys = ON;

-- Users table
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    email TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    name TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Tasks table
CREATE TABLE IF NOT EXISTS tasks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    title TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    is_completed INTEGER NOT NULL DEFAULT 0,
    priority TEXT NOT NULL DEFAULT 'medium' CHECK (priority IN ('low', 'medium', 'high')),
    due_date TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_tasks_user_id ON tasks(user_id);
CREATE INDEX IF NOT EXISTS idx_tasks_user_created ON tasks(user_id, created_at DESC);
"#;

/// Get the migration version
pub fn migration_version() -> i32 {
    1
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(CREATE_SCHEMA).unwrap();
        conn
    }

    fn insert_user(conn: &Connection, email: &str) -> rusqlite::Result<usize> {
        conn.execute(
            "INSERT INTO users (email, password_hash, name, created_at, updated_at) VALUES (?1, 'h', 'n', 't', 't')",
            [email],
        )
    }

    #[test]
    fn test_create_schema_valid_sql() {
        let conn = setup();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(Result::ok)
            .collect();

        assert!(tables.contains(&"users".to_string()));
        assert!(tables.contains(&"tasks".to_string()));
    }

    #[test]
    fn test_schema_is_idempotent() {
        let conn = setup();
        conn.execute_batch(CREATE_SCHEMA).unwrap();
    }

    #[test]
    fn test_users_email_unique() {
        let conn = setup();

        insert_user(&conn, "dup@example.com").unwrap();
        assert!(insert_user(&conn, "dup@example.com").is_err());
    }

    #[test]
    fn test_tasks_cascade_on_user_delete() {
        let conn = setup();
        insert_user(&conn, "owner@example.com").unwrap();
        let user_id = conn.last_insert_rowid();

        conn.execute(
            "INSERT INTO tasks (user_id, title, created_at, updated_at) VALUES (?1, 'a', 't', 't')",
            [user_id],
        )
        .unwrap();

        conn.execute("DELETE FROM users WHERE id = ?1", [user_id])
            .unwrap();

        let remaining: i64 = conn
            .query_row("SELECT COUNT(*) FROM tasks", [], |row| row.get(0))
            .unwrap();
        assert_eq!(remaining, 0);
    }

    #[test]
    fn test_tasks_priority_check() {
        let conn = setup();
        insert_user(&conn, "owner@example.com").unwrap();
        let user_id = conn.last_insert_rowid();

        let result = conn.execute(
            "INSERT INTO tasks (user_id, title, priority, created_at, updated_at) VALUES (?1, 'a', 'urgent', 't', 't')",
            [user_id],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_migration_version() {
        assert_eq!(migration_version(), 1);
    }
}
