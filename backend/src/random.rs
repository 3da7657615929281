//! Client for the upstream random-todo feed used by `POST /random-tasks`.

use std::time::Duration;

use serde::Deserialize;

pub const DEFAULT_RANDOM_TASK_URL: &str = "https://dummyjson.com/todos/random";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum RandomTaskError {
    #[error("request to random task source failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("random task source returned an empty todo")]
    EmptyTodo,
}

#[derive(Debug, Deserialize)]
struct RandomTodo {
    todo: String,
}

#[derive(Debug, Clone)]
pub struct RandomTaskSource {
    client: reqwest::Client,
    url: String,
}

impl RandomTaskSource {
    pub fn new(url: impl Into<String>) -> Result<Self, RandomTaskError> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fetches one todo and returns its text.
    pub async fn fetch_todo(&self) -> Result<String, RandomTaskError> {
        let todo: RandomTodo = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if todo.todo.trim().is_empty() {
            return Err(RandomTaskError::EmptyTodo);
        }
        Ok(todo.todo)
    }
}
