//! Domain models for youdo-api
//!
//! This module contains the core domain models and API bodies used throughout the application.

pub mod dto;
pub mod task;
pub mod user;

// Re-export commonly used types
pub use dto::{
    AuthResponse, CreateTaskRequest, LoginRequest, RegisterRequest, TaskListResponse,
    TaskResponse, UpdateTaskRequest, UserResponse,
};
pub use task::{NewTask, Priority, Task};
pub use user::{NewUser, User};
