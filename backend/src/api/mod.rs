//! HTTP surface: routes, extractors and response shapes.

pub mod error;

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use task_shared::{
    CreateTaskRequest, Task, TaskCreatedResponse, TaskListResponse, TaskUpdate,
    UpdateStatusRequest,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::random::RandomTaskSource;
use crate::service::TaskService;
use crate::store::TaskStore;

pub use self::error::ApiError;

pub const CREATED_MESSAGE: &str = "Record Successfully Created";

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<TaskService>,
    pub random: Arc<RandomTaskSource>,
}

impl AppState {
    pub fn new(store: Arc<dyn TaskStore>, random: RandomTaskSource) -> Self {
        Self {
            service: Arc::new(TaskService::new(store)),
            random: Arc::new(random),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/tasks", get(list_tasks).post(create_task))
        .route("/random-tasks", post(create_random_task))
        .route(
            "/tasks/:id",
            get(get_task)
                .put(update_task)
                .delete(delete_task)
                .patch(update_task_status),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Raw listing query. Paging values are kept as strings so that junk
/// input falls back to the defaults instead of rejecting the request.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ListTasksQuery {
    pub status: Option<String>,
    pub page: Option<String>,
    pub page_size: Option<String>,
}

impl ListTasksQuery {
    /// Builds the query from decoded pairs. A repeated key keeps its first
    /// value; unknown keys are ignored.
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let mut query = Self::default();
        for (key, value) in pairs {
            let slot = match key.as_str() {
                "status" => &mut query.status,
                "page" => &mut query.page,
                "pageSize" => &mut query.page_size,
                _ => continue,
            };
            slot.get_or_insert(value);
        }
        query
    }
}

/// Parses a positive paging value; anything else counts as unset (0).
fn paging_value(raw: Option<&str>) -> u32 {
    raw.and_then(|value| value.trim().parse::<u32>().ok())
        .unwrap_or(0)
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn create_task(
    State(state): State<AppState>,
    payload: Result<Json<CreateTaskRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<TaskCreatedResponse>), ApiError> {
    let Json(payload) = payload?;
    let task = state
        .service
        .create_task(payload.title, payload.description)
        .await?;
    Ok(created(task))
}

async fn create_random_task(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<TaskCreatedResponse>), ApiError> {
    let task = state.service.create_random_task(&state.random).await?;
    Ok(created(task))
}

fn created(task: Task) -> (StatusCode, Json<TaskCreatedResponse>) {
    (
        StatusCode::CREATED,
        Json(TaskCreatedResponse {
            message: CREATED_MESSAGE.to_string(),
            task,
        }),
    )
}

async fn list_tasks(
    State(state): State<AppState>,
    query: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> Result<Json<TaskListResponse>, ApiError> {
    let Query(pairs) = query?;
    let query = ListTasksQuery::from_pairs(pairs);
    let page = state
        .service
        .list_tasks(
            query.status.as_deref(),
            paging_value(query.page.as_deref()),
            paging_value(query.page_size.as_deref()),
        )
        .await?;

    Ok(Json(TaskListResponse {
        data: page.tasks,
        pagination: page.pagination,
    }))
}

async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Task>, ApiError> {
    Ok(Json(state.service.get_task_by_id(&id).await?))
}

async fn update_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<TaskUpdate>, JsonRejection>,
) -> Result<Json<Task>, ApiError> {
    let Json(update) = payload?;
    Ok(Json(state.service.update_task(&id, update).await?))
}

async fn delete_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.service.delete_task(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn update_task_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(request) = payload?;
    state
        .service
        .update_task_status(&id, &request.status)
        .await?;
    Ok(StatusCode::OK)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(None, 0)]
    #[case(Some("3"), 3)]
    #[case(Some(" 7 "), 7)]
    #[case(Some("0"), 0)]
    #[case(Some("-2"), 0)]
    #[case(Some("ten"), 0)]
    #[case(Some(""), 0)]
    fn paging_value_parses_leniently(#[case] raw: Option<&str>, #[case] expected: u32) {
        assert_eq!(paging_value(raw), expected);
    }

    fn pairs(raw: &[(&str, &str)]) -> Vec<(String, String)> {
        raw.iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }

    #[test]
    fn repeated_keys_keep_first_value() {
        let query = ListTasksQuery::from_pairs(pairs(&[
            ("status", "completed"),
            ("pageSize", "5"),
            ("status", "pending"),
            ("pageSize", "50"),
        ]));
        assert_eq!(query.status.as_deref(), Some("completed"));
        assert_eq!(query.page_size.as_deref(), Some("5"));
        assert_eq!(query.page, None);
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let query = ListTasksQuery::from_pairs(pairs(&[("sort", "asc"), ("page", "2")]));
        assert_eq!(
            query,
            ListTasksQuery {
                page: Some("2".into()),
                ..ListTasksQuery::default()
            }
        );
    }
}
