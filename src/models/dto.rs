//! Request and response bodies for the HTTP API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::task::{Priority, Task};
use super::user::User;

/// POST /api/auth/register body
#[derive(Clone, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// POST /api/auth/login body
#[derive(Clone, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

// Request bodies carry plaintext passwords; keep them out of debug output
impl std::fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("name", &self.name)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

/// Public view of a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: i64,
    pub email: String,
    pub name: String,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
        }
    }
}

/// Token plus user, returned by register and login
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserResponse,
}

/// POST /api/tasks body
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateTaskRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    /// RFC 3339 timestamp; empty means no deadline
    #[serde(default)]
    pub due_date: Option<String>,
}

/// PUT /api/tasks/:id body
///
/// Absent fields are left unchanged. `due_date: ""` clears the deadline.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateTaskRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_completed: Option<bool>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub due_date: Option<String>,
}

/// Public view of a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskResponse {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub description: String,
    pub is_completed: bool,
    pub priority: Priority,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub due_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Task> for TaskResponse {
    fn from(task: Task) -> Self {
        Self {
            id: task.id,
            user_id: task.user_id,
            title: task.title,
            description: task.description,
            is_completed: task.is_completed,
            priority: task.priority,
            due_date: task.due_date,
            created_at: task.created_at,
            updated_at: task.updated_at,
        }
    }
}

/// GET /api/tasks payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskListResponse {
    pub tasks: Vec<TaskResponse>,
    pub total: usize,

    /// Completed tasks owned by the user
    pub completed: u64,
}

impl TaskListResponse {
    pub fn new(tasks: Vec<Task>, completed: u64) -> Self {
        let tasks: Vec<TaskResponse> = tasks.into_iter().map(TaskResponse::from).collect();
        Self {
            total: tasks.len(),
            tasks,
            completed,
        }
    }
}
