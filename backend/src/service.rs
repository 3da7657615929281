//! Task business rules on top of a [`TaskStore`].

use std::sync::Arc;

use chrono::Utc;
use task_shared::{InvalidStatus, Pagination, Task, TaskStatus, TaskUpdate};

use crate::random::{RandomTaskError, RandomTaskSource};
use crate::store::{StoreError, TaskStore};

pub const DEFAULT_PAGE_SIZE: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaskError {
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    InvalidStatus(#[from] InvalidStatus),

    #[error("task not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Upstream(String),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for TaskError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound(id) => TaskError::NotFound(id),
            other => TaskError::Store(other),
        }
    }
}

impl From<RandomTaskError> for TaskError {
    fn from(error: RandomTaskError) -> Self {
        TaskError::Upstream(error.to_string())
    }
}

/// One page of a listing together with the paging that produced it.
#[derive(Debug, Clone)]
pub struct TaskPage {
    pub tasks: Vec<Task>,
    pub pagination: Pagination,
}

/// Resolves raw paging input. Zero means "unset": page falls back to 1 and
/// page size to [`DEFAULT_PAGE_SIZE`].
pub fn resolve_pagination(page: u32, page_size: u32) -> Pagination {
    Pagination {
        page: page.max(1),
        page_size: if page_size == 0 {
            DEFAULT_PAGE_SIZE
        } else {
            page_size
        },
    }
}

pub struct TaskService {
    store: Arc<dyn TaskStore>,
}

impl TaskService {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self { store }
    }

    pub async fn create_task(&self, title: String, description: String) -> Result<Task, TaskError> {
        if title.trim().is_empty() {
            return Err(TaskError::Validation("title must not be empty".to_string()));
        }

        let task = Task::new(title, description, Utc::now());
        self.store.create(&task).await?;
        tracing::info!(task_id = %task.id, "created task");
        Ok(task)
    }

    /// Creates a task whose title and description come from the random
    /// todo feed.
    pub async fn create_random_task(&self, source: &RandomTaskSource) -> Result<Task, TaskError> {
        let todo = source.fetch_todo().await?;
        self.create_task(todo.clone(), todo).await
    }

    /// Lists tasks newest first. An empty or absent `status` lists every
    /// status; anything else must name a valid status.
    pub async fn list_tasks(
        &self,
        status: Option<&str>,
        page: u32,
        page_size: u32,
    ) -> Result<TaskPage, TaskError> {
        let status = match status {
            Some(raw) if !raw.is_empty() => Some(raw.parse::<TaskStatus>()?),
            _ => None,
        };
        let pagination = resolve_pagination(page, page_size);

        let tasks = self
            .store
            .list(status, pagination.page, pagination.page_size)
            .await?;
        Ok(TaskPage { tasks, pagination })
    }

    pub async fn get_task_by_id(&self, id: &str) -> Result<Task, TaskError> {
        Ok(self.store.get_by_id(id).await?)
    }

    /// Applies `update` and returns the record as read back afterwards.
    ///
    /// The update and the read are separate store calls; a concurrent delete
    /// in between surfaces as `NotFound`.
    pub async fn update_task(&self, id: &str, update: TaskUpdate) -> Result<Task, TaskError> {
        self.store.update(id, &update).await?;
        tracing::info!(task_id = %id, "updated task");
        self.get_task_by_id(id).await
    }

    pub async fn delete_task(&self, id: &str) -> Result<(), TaskError> {
        self.store.delete(id).await?;
        tracing::info!(task_id = %id, "deleted task");
        Ok(())
    }

    /// Moves a task to `new_status`. The value is validated before the store
    /// is touched; any status may follow any other.
    pub async fn update_task_status(&self, id: &str, new_status: &str) -> Result<(), TaskError> {
        let status: TaskStatus = new_status.parse()?;
        self.store.update(id, &TaskUpdate::status(status)).await?;
        tracing::info!(task_id = %id, %status, "changed task status");
        Ok(())
    }
}
