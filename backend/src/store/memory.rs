//! In-memory task store.
//!
//! Holds every task in a single map behind a [`RwLock`]: listing and lookups
//! share the lock, mutations take it exclusively.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use task_shared::{Task, TaskStatus, TaskUpdate};
use tokio::sync::RwLock;

use super::{window, StoreError, TaskStore};

#[derive(Debug, Default)]
pub struct InMemoryTaskStore {
    tasks: RwLock<HashMap<String, Task>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.tasks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tasks.read().await.is_empty()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn create(&self, task: &Task) -> Result<String, StoreError> {
        let mut tasks = self.tasks.write().await;
        if tasks.contains_key(&task.id) {
            return Err(StoreError::Conflict(task.id.clone()));
        }
        tasks.insert(task.id.clone(), task.clone());
        Ok(task.id.clone())
    }

    async fn list(
        &self,
        status: Option<TaskStatus>,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<Task>, StoreError> {
        let (skip, limit) = window(page, page_size);
        let skip = usize::try_from(skip).unwrap_or(usize::MAX);
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);

        let tasks = self.tasks.read().await;
        let mut matching: Vec<&Task> = tasks
            .values()
            .filter(|task| status.map_or(true, |status| task.status == status))
            .collect();
        // Ties on created_at fall back to id so paging stays stable.
        matching.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });

        Ok(matching
            .into_iter()
            .skip(skip)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn get_by_id(&self, id: &str) -> Result<Task, StoreError> {
        self.tasks
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn update(&self, id: &str, update: &TaskUpdate) -> Result<(), StoreError> {
        let mut tasks = self.tasks.write().await;
        let task = tasks
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        task.apply(update, Utc::now());
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.tasks
            .write()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{DateTime, Duration};

    use super::*;

    fn task_at(title: &str, created_at: DateTime<Utc>) -> Task {
        Task::new(title.to_string(), String::new(), created_at)
    }

    /// Five tasks created one second apart; "t4" is the newest.
    async fn seeded() -> InMemoryTaskStore {
        let store = InMemoryTaskStore::new();
        let base = Utc::now();
        for i in 0..5 {
            let task = task_at(&format!("t{i}"), base + Duration::seconds(i));
            store.create(&task).await.unwrap();
        }
        store
    }

    fn titles(tasks: &[Task]) -> Vec<&str> {
        tasks.iter().map(|task| task.title.as_str()).collect()
    }

    #[tokio::test]
    async fn create_then_get_round_trip() {
        let store = InMemoryTaskStore::new();
        let task = task_at("write docs", Utc::now());

        let id = store.create(&task).await.unwrap();
        assert_eq!(id, task.id);
        assert_eq!(store.get_by_id(&id).await.unwrap(), task);
    }

    #[tokio::test]
    async fn create_rejects_duplicate_id() {
        let store = InMemoryTaskStore::new();
        let task = task_at("once", Utc::now());
        store.create(&task).await.unwrap();

        let err = store.create(&task).await.unwrap_err();
        assert_eq!(err, StoreError::Conflict(task.id.clone()));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn get_unknown_id_is_not_found() {
        let store = InMemoryTaskStore::new();
        let err = store.get_by_id("missing").await.unwrap_err();
        assert_eq!(err, StoreError::NotFound("missing".into()));
    }

    #[tokio::test]
    async fn list_is_newest_first_and_paged() {
        let store = seeded().await;

        let first = store.list(None, 1, 2).await.unwrap();
        assert_eq!(titles(&first), ["t4", "t3"]);

        let second = store.list(None, 2, 2).await.unwrap();
        assert_eq!(titles(&second), ["t2", "t1"]);

        let last = store.list(None, 3, 2).await.unwrap();
        assert_eq!(titles(&last), ["t0"]);
    }

    #[tokio::test]
    async fn list_past_the_end_is_empty() {
        let store = seeded().await;
        assert!(store.list(None, 10, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_filters_by_status() {
        let store = seeded().await;
        let all = store.list(None, 1, 10).await.unwrap();
        store
            .update(&all[1].id, &TaskUpdate::status(TaskStatus::Completed))
            .await
            .unwrap();

        let completed = store.list(Some(TaskStatus::Completed), 1, 10).await.unwrap();
        assert_eq!(titles(&completed), ["t3"]);

        let pending = store.list(Some(TaskStatus::Pending), 1, 10).await.unwrap();
        assert_eq!(titles(&pending), ["t4", "t2", "t1", "t0"]);

        let in_progress = store.list(Some(TaskStatus::InProgress), 1, 10).await.unwrap();
        assert!(in_progress.is_empty());
    }

    #[tokio::test]
    async fn update_changes_only_present_fields() {
        let store = InMemoryTaskStore::new();
        let task = Task::new("old".into(), "keep me".into(), Utc::now() - Duration::seconds(1));
        store.create(&task).await.unwrap();

        let update = TaskUpdate {
            title: Some("X".into()),
            ..TaskUpdate::default()
        };
        store.update(&task.id, &update).await.unwrap();

        let stored = store.get_by_id(&task.id).await.unwrap();
        assert_eq!(stored.title, "X");
        assert_eq!(stored.description, "keep me");
        assert_eq!(stored.status, TaskStatus::Pending);
        assert_eq!(stored.created_at, task.created_at);
        assert!(stored.updated_at > task.updated_at);
    }

    #[tokio::test]
    async fn update_unknown_id_is_not_found() {
        let store = InMemoryTaskStore::new();
        let err = store
            .update("missing", &TaskUpdate::status(TaskStatus::Completed))
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::NotFound("missing".into()));
    }

    #[tokio::test]
    async fn delete_is_permanent_and_not_idempotent() {
        let store = InMemoryTaskStore::new();
        let task = task_at("gone", Utc::now());
        store.create(&task).await.unwrap();

        store.delete(&task.id).await.unwrap();
        assert!(store.is_empty().await);
        assert_eq!(
            store.get_by_id(&task.id).await.unwrap_err(),
            StoreError::NotFound(task.id.clone())
        );
        assert_eq!(
            store.delete(&task.id).await.unwrap_err(),
            StoreError::NotFound(task.id.clone())
        );
    }

    #[tokio::test]
    async fn concurrent_creates_all_land() {
        let store = Arc::new(InMemoryTaskStore::new());
        let handles: Vec<_> = (0..32)
            .map(|i| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    let task = task_at(&format!("t{i}"), Utc::now());
                    store.create(&task).await
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(store.len().await, 32);
    }
}
