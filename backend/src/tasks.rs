//! Ownership-scoped task operations.
//!
//! Single-task operations look the row up by id first and only then compare
//! the owner, so an unknown id is `NotFound` for everyone while a foreign id is
//! `Forbidden`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use shared::{
    CreateTaskRequest, StatusFilter, TaskCompleteResponse, UpdateTaskRequest, ValidationErrors,
};
use thiserror::Error;

use crate::store::{NewTask, TaskRecord, TaskStore};

#[derive(Debug, Error)]
pub enum TaskError {
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
    #[error("Task #{0} not found")]
    NotFound(i64),
    #[error("Not authorized to access this task")]
    Forbidden(i64),
    #[error("task store error: {0}")]
    Store(#[from] sqlx::Error),
}

pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Clone)]
pub struct TaskService {
    store: TaskStore,
    clock: Clock,
}

impl TaskService {
    pub fn new(store: TaskStore) -> Self {
        Self::with_clock(store, Arc::new(Utc::now))
    }

    pub fn with_clock(store: TaskStore, clock: Clock) -> Self {
        Self { store, clock }
    }

    pub async fn create(
        &self,
        user_id: &str,
        request: CreateTaskRequest,
    ) -> Result<TaskRecord, TaskError> {
        request.validate()?;

        let record = self
            .store
            .insert(NewTask {
                user_id: user_id.to_string(),
                title: request.title,
                description: request.description,
                due_date: request.due_date,
                priority: request.priority,
                categories: request.categories,
                created_at: (self.clock)(),
            })
            .await?;

        tracing::info!(user_id, task_id = record.id, "task created");
        Ok(record)
    }

    pub async fn list(
        &self,
        user_id: &str,
        filter: StatusFilter,
    ) -> Result<Vec<TaskRecord>, TaskError> {
        let tasks = self.store.list_for_user(user_id, filter).await?;
        tracing::debug!(user_id, ?filter, count = tasks.len(), "tasks listed");
        Ok(tasks)
    }

    pub async fn get(&self, user_id: &str, task_id: i64) -> Result<TaskRecord, TaskError> {
        let task = self
            .store
            .find_by_id(task_id)
            .await?
            .ok_or(TaskError::NotFound(task_id))?;

        if task.user_id != user_id {
            tracing::warn!(user_id, task_id, "access to another user's task refused");
            return Err(TaskError::Forbidden(task_id));
        }
        Ok(task)
    }

    /// Applies only the supplied fields; `updated_at` moves forward even when
    /// nothing else changes.
    pub async fn update(
        &self,
        user_id: &str,
        task_id: i64,
        request: UpdateTaskRequest,
    ) -> Result<TaskRecord, TaskError> {
        request.validate()?;
        let mut task = self.get(user_id, task_id).await?;

        if let Some(title) = request.title {
            task.title = title;
        }
        if let Some(description) = request.description {
            task.description = Some(description);
        }
        if let Some(due_date) = request.due_date {
            task.due_date = Some(due_date);
        }
        if let Some(priority) = request.priority {
            task.set_priority(priority);
        }
        if let Some(categories) = request.categories {
            task.set_categories(categories);
        }
        task.updated_at = (self.clock)();

        self.store.save(&task).await?;
        tracing::info!(user_id, task_id, "task updated");
        Ok(task)
    }

    pub async fn delete(&self, user_id: &str, task_id: i64) -> Result<(), TaskError> {
        self.get(user_id, task_id).await?;
        if !self.store.delete(task_id).await? {
            return Err(TaskError::NotFound(task_id));
        }
        tracing::info!(user_id, task_id, "task deleted");
        Ok(())
    }

    pub async fn toggle_complete(
        &self,
        user_id: &str,
        task_id: i64,
    ) -> Result<TaskCompleteResponse, TaskError> {
        let mut task = self.get(user_id, task_id).await?;
        task.completed = !task.completed;
        task.updated_at = (self.clock)();
        self.store.save(&task).await?;

        tracing::info!(user_id, task_id, completed = task.completed, "task completion toggled");
        Ok(TaskCompleteResponse {
            id: task.id,
            completed: task.completed,
        })
    }
}
