use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::routing::{get, put};
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::model::{CleaningTask, TaskId, UpcomingCleaning};

use super::{ApiResult, AppState, today};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/cleaning-schedule", get(list))
        .route("/api/cleaning-schedule/upcoming", get(upcoming))
        .route("/api/cleaning-schedule/task/{task_id}", put(set_completion))
}

#[derive(Debug, Deserialize)]
pub struct CompletionBody {
    pub completed: bool,
}

#[derive(Debug, Serialize)]
pub struct TaskResponse {
    pub message: &'static str,
    pub task: CleaningTask,
}

#[derive(Debug, Deserialize)]
pub struct UpcomingQuery {
    pub today: Option<NaiveDate>,
}

/// GET /api/cleaning-schedule
async fn list(State(state): State<AppState>) -> Json<Vec<CleaningTask>> {
    Json(state.engine.list_tasks().await)
}

/// PUT /api/cleaning-schedule/task/{task_id}
async fn set_completion(
    State(state): State<AppState>,
    task_id: Result<Path<TaskId>, PathRejection>,
    payload: Result<Json<CompletionBody>, JsonRejection>,
) -> ApiResult<Json<TaskResponse>> {
    let Path(task_id) = task_id?;
    let Json(body) = payload?;
    let task = state.engine.set_task_completion(task_id, body.completed).await?;
    Ok(Json(TaskResponse {
        message: "Task updated successfully!",
        task,
    }))
}

/// GET /api/cleaning-schedule/upcoming
async fn upcoming(
    State(state): State<AppState>,
    query: Result<Query<UpcomingQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<UpcomingCleaning>>> {
    let Query(query) = query?;
    let today = query.today.unwrap_or_else(today);
    Ok(Json(state.engine.upcoming_cleanings(today).await))
}
