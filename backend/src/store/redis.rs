//! Redis-backed task store.
//!
//! Each task is a JSON document. Two kinds of sorted set index the
//! documents by creation time so listing can page newest-first:
//!
//! - `{ns}:task:{id}` -> JSON serialized [`Task`]
//! - `{ns}:index` -> ZSET of every id, scored by `created_at` in microseconds
//! - `{ns}:status:{status}` -> ZSET of the ids currently in that status
//!
//! Mutations run as Lua scripts so a document and its index entries never
//! disagree. Listing is a range over an index followed by `MGET`, which is
//! not atomic: an id deleted in between is skipped.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client, RedisError, Script};
use task_shared::{Task, TaskStatus, TaskUpdate};

use super::{window, StoreError, TaskStore};

/// Bound on the initial connection. Individual commands are not timed out.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

const CREATE_SCRIPT: &str = r"
if not redis.call('SET', KEYS[1], ARGV[1], 'NX') then
    return 0
end
redis.call('ZADD', KEYS[2], ARGV[3], ARGV[2])
redis.call('ZADD', KEYS[3], ARGV[3], ARGV[2])
return 1
";

// Update and delete receive the three status indexes as KEYS[3..5], in
// `TaskStatus::ALL` order, and pick one by the status stored in the document.
const UPDATE_SCRIPT: &str = r"
local status_keys = { pending = KEYS[3], in_progress = KEYS[4], completed = KEYS[5] }
local raw = redis.call('GET', KEYS[1])
if not raw then
    return 0
end
local task = cjson.decode(raw)
local previous = task.status
for field, value in pairs(cjson.decode(ARGV[1])) do
    task[field] = value
end
task.updated_at = ARGV[2]
redis.call('SET', KEYS[1], cjson.encode(task))
if task.status ~= previous then
    local score = redis.call('ZSCORE', KEYS[2], ARGV[3]) or 0
    if status_keys[previous] then
        redis.call('ZREM', status_keys[previous], ARGV[3])
    end
    redis.call('ZADD', status_keys[task.status], score, ARGV[3])
end
return 1
";

const DELETE_SCRIPT: &str = r"
local status_keys = { pending = KEYS[3], in_progress = KEYS[4], completed = KEYS[5] }
local raw = redis.call('GET', KEYS[1])
if not raw then
    return 0
end
local task = cjson.decode(raw)
redis.call('DEL', KEYS[1])
redis.call('ZREM', KEYS[2], ARGV[1])
if status_keys[task.status] then
    redis.call('ZREM', status_keys[task.status], ARGV[1])
end
return 1
";

impl From<RedisError> for StoreError {
    fn from(error: RedisError) -> Self {
        StoreError::Storage(error.to_string())
    }
}

#[derive(Clone)]
pub struct RedisTaskStore {
    connection: MultiplexedConnection,
    namespace: String,
    create_script: Script,
    update_script: Script,
    delete_script: Script,
}

impl RedisTaskStore {
    /// Connects to Redis, failing if the server is unreachable within ten
    /// seconds.
    pub async fn connect(url: &str, namespace: impl Into<String>) -> Result<Self, StoreError> {
        let client = Client::open(url)?;
        let connection =
            tokio::time::timeout(CONNECT_TIMEOUT, client.get_multiplexed_tokio_connection())
                .await
                .map_err(|_| {
                    StoreError::Storage(format!(
                        "timed out after {}s connecting to redis",
                        CONNECT_TIMEOUT.as_secs()
                    ))
                })??;

        let namespace = namespace.into();
        tracing::debug!(namespace = %namespace, "connected to redis");

        Ok(Self {
            connection,
            namespace,
            create_script: Script::new(CREATE_SCRIPT),
            update_script: Script::new(UPDATE_SCRIPT),
            delete_script: Script::new(DELETE_SCRIPT),
        })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn task_key(&self, id: &str) -> String {
        format!("{}:task:{id}", self.namespace)
    }

    fn index_key(&self) -> String {
        format!("{}:index", self.namespace)
    }

    fn status_key(&self, status: TaskStatus) -> String {
        format!("{}:status:{status}", self.namespace)
    }

    /// Every status index, in `TaskStatus::ALL` order.
    fn status_keys(&self) -> Vec<String> {
        TaskStatus::ALL
            .iter()
            .map(|status| self.status_key(*status))
            .collect()
    }
}

/// Formats a timestamp the way `Task` serializes it, keeping nanoseconds.
fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Sorted-set score for a creation time. Microseconds since the epoch stay
/// well inside the exact integer range of an `f64`.
#[allow(clippy::cast_precision_loss)]
fn score(task: &Task) -> f64 {
    task.created_at.timestamp_micros() as f64
}

fn clamp_index(value: u64) -> isize {
    isize::try_from(value).unwrap_or(isize::MAX)
}

#[async_trait]
impl TaskStore for RedisTaskStore {
    async fn create(&self, task: &Task) -> Result<String, StoreError> {
        let document = serde_json::to_string(task)?;
        let mut connection = self.connection.clone();

        let created: i64 = self
            .create_script
            .key(self.task_key(&task.id))
            .key(self.index_key())
            .key(self.status_key(task.status))
            .arg(document)
            .arg(&task.id)
            .arg(score(task))
            .invoke_async(&mut connection)
            .await?;

        if created == 0 {
            return Err(StoreError::Conflict(task.id.clone()));
        }
        Ok(task.id.clone())
    }

    async fn list(
        &self,
        status: Option<TaskStatus>,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<Task>, StoreError> {
        let (skip, limit) = window(page, page_size);
        if limit == 0 {
            return Ok(Vec::new());
        }

        let index = status.map_or_else(|| self.index_key(), |status| self.status_key(status));
        let start = clamp_index(skip);
        let stop = clamp_index(skip.saturating_add(limit - 1));

        let mut connection = self.connection.clone();
        let ids: Vec<String> = connection.zrevrange(&index, start, stop).await?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let keys: Vec<String> = ids.iter().map(|id| self.task_key(id)).collect();
        let documents: Vec<Option<String>> = redis::cmd("MGET")
            .arg(&keys)
            .query_async(&mut connection)
            .await?;

        let mut tasks = Vec::with_capacity(documents.len());
        for (id, document) in ids.iter().zip(documents) {
            let Some(document) = document else {
                tracing::debug!(task_id = %id, "indexed task vanished before read");
                continue;
            };
            match serde_json::from_str::<Task>(&document) {
                Ok(task) => tasks.push(task),
                Err(error) => {
                    tracing::warn!(task_id = %id, %error, "skipping undecodable task document");
                }
            }
        }
        Ok(tasks)
    }

    async fn get_by_id(&self, id: &str) -> Result<Task, StoreError> {
        let mut connection = self.connection.clone();
        let document: Option<String> = connection.get(self.task_key(id)).await?;
        let document = document.ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        Ok(serde_json::from_str(&document)?)
    }

    async fn update(&self, id: &str, update: &TaskUpdate) -> Result<(), StoreError> {
        let patch = serde_json::to_string(update)?;
        let updated_at = format_timestamp(Utc::now());
        let mut connection = self.connection.clone();

        let matched: i64 = self
            .update_script
            .key(self.task_key(id))
            .key(self.index_key())
            .key(self.status_keys())
            .arg(patch)
            .arg(updated_at)
            .arg(id)
            .invoke_async(&mut connection)
            .await?;

        if matched == 0 {
            tracing::debug!(task_id = %id, "no task matched update");
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let mut connection = self.connection.clone();

        let deleted: i64 = self
            .delete_script
            .key(self.task_key(id))
            .key(self.index_key())
            .key(self.status_keys())
            .arg(id)
            .invoke_async(&mut connection)
            .await?;

        if deleted == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn scripts_map_status_keys_in_declaration_order() {
        for script in [UPDATE_SCRIPT, DELETE_SCRIPT] {
            for (offset, status) in TaskStatus::ALL.iter().enumerate() {
                let entry = format!("{status} = KEYS[{}]", offset + 3);
                assert!(script.contains(&entry), "missing `{entry}`");
            }
        }
    }

    #[test]
    fn scripts_only_touch_declared_keys() {
        for script in [CREATE_SCRIPT, UPDATE_SCRIPT, DELETE_SCRIPT] {
            assert!(!script.contains("ARGV[1] .."));
            assert!(!script.contains("ARGV[3] .."));
        }
    }

    #[test]
    fn update_timestamp_keeps_nanoseconds() {
        let at = Utc
            .with_ymd_and_hms(2026, 10, 14, 12, 0, 0)
            .unwrap()
            + chrono::Duration::nanoseconds(123_456_789);

        let parsed = DateTime::parse_from_rfc3339(&format_timestamp(at)).unwrap();
        assert_eq!(parsed.with_timezone(&Utc), at);
    }
}
