//! Task management for authenticated users
//!
//! Every operation takes the caller's user id and only ever touches that
//! user's tasks.

use std::sync::Arc;

use tracing::info;

use crate::database::Database;
use crate::error::TaskError;
use crate::models::{
    CreateTaskRequest, NewTask, TaskListResponse, TaskResponse, UpdateTaskRequest,
};
use crate::validation;

/// Task service
pub struct TaskService<D: Database> {
    db: Arc<D>,
}

impl<D: Database> TaskService<D> {
    pub fn new(db: Arc<D>) -> Self {
        Self { db }
    }

    pub async fn create_task(
        &self,
        user_id: i64,
        req: CreateTaskRequest,
    ) -> Result<TaskResponse, TaskError> {
        let title = validation::sanitize(&req.title);
        validation::validate_title(&title)?;
        let priority = validation::parse_priority(req.priority.as_deref())?;
        let due_date = validation::parse_due_date(req.due_date.as_deref())?;

        let mut new_task = NewTask::new(user_id, title)
            .with_description(validation::sanitize(req.description.as_deref().unwrap_or("")))
            .with_priority(priority);
        if let Some(due) = due_date {
            new_task = new_task.with_due_date(due);
        }

        let task = self.db.create_task(&new_task).await?;
        info!(user_id, task_id = task.id, "Task created");
        Ok(task.into())
    }

    pub async fn get_task(&self, user_id: i64, task_id: i64) -> Result<TaskResponse, TaskError> {
        self.db
            .get_task(task_id, user_id)
            .await?
            .map(TaskResponse::from)
            .ok_or(TaskError::NotFound)
    }

    /// All of a user's tasks, newest first
    pub async fn list_tasks(&self, user_id: i64) -> Result<TaskListResponse, TaskError> {
        let tasks = self.db.list_tasks(user_id).await?;
        let completed = self.db.completed_task_count(user_id).await?;
        Ok(TaskListResponse::new(tasks, completed))
    }

    /// Apply a partial update
    ///
    /// Fields absent from `req` keep their current value; an empty `due_date`
    /// clears the deadline.
    pub async fn update_task(
        &self,
        user_id: i64,
        task_id: i64,
        req: UpdateTaskRequest,
    ) -> Result<TaskResponse, TaskError> {
        let mut task = self
            .db
            .get_task(task_id, user_id)
            .await?
            .ok_or(TaskError::NotFound)?;

        if let Some(title) = req.title.as_deref() {
            let title = validation::sanitize(title);
            validation::validate_title(&title)?;
            task.title = title;
        }
        if let Some(description) = req.description.as_deref() {
            task.description = validation::sanitize(description);
        }
        if let Some(done) = req.is_completed {
            task.is_completed = done;
        }
        if let Some(priority) = req.priority.as_deref() {
            task.priority = priority.trim().parse()?;
        }
        if let Some(due_date) = req.due_date.as_deref() {
            task.due_date = validation::parse_due_date(Some(due_date))?;
        }

        let updated = self.db.update_task(&task).await?;
        info!(user_id, task_id, "Task updated");
        Ok(updated.into())
    }

    pub async fn delete_task(&self, user_id: i64, task_id: i64) -> Result<(), TaskError> {
        self.db.delete_task(task_id, user_id).await?;
        info!(user_id, task_id, "Task deleted");
        Ok(())
    }
}
