use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{Days, NaiveDate};
use serde::Deserialize;

use crate::export;
use crate::model::{AvailabilityGrid, CleaningLoad, OccupancySummary, PeriodType};

use super::{ApiError, ApiResult, AppState, today};

/// Days shown by the availability view when no end date is given.
const DEFAULT_AVAILABILITY_DAYS: u64 = 7;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/availability", get(availability))
        .route("/api/summary", get(summary))
        .route("/api/housekeeping-chart", get(housekeeping_chart))
        .route("/api/export/reservations.csv", get(export_reservations))
        .route("/api/export/cleaning-schedule.csv", get(export_cleaning_schedule))
}

#[derive(Debug, Default, Deserialize)]
pub struct RangeQuery {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SummaryQuery {
    pub period: Option<String>,
    pub start: Option<NaiveDate>,
}

/// GET /api/availability?start=&end=
async fn availability(
    State(state): State<AppState>,
    query: Result<Query<RangeQuery>, QueryRejection>,
) -> ApiResult<Json<AvailabilityGrid>> {
    let Query(range) = query?;
    let start = range.start.unwrap_or_else(today);
    let end = match range.end {
        Some(end) => end,
        None => start
            .checked_add_days(Days::new(DEFAULT_AVAILABILITY_DAYS - 1))
            .ok_or_else(|| ApiError::bad_request("start date out of range"))?,
    };
    let grid = state.engine.room_availability(&state.rooms, start, end).await?;
    Ok(Json(grid))
}

/// GET /api/summary?period=&start=
async fn summary(
    State(state): State<AppState>,
    query: Result<Query<SummaryQuery>, QueryRejection>,
) -> ApiResult<Json<OccupancySummary>> {
    let Query(query) = query?;
    let period = match query.period.as_deref() {
        None | Some("") => PeriodType::Week,
        Some(raw) => raw
            .parse()
            .map_err(|_| ApiError::bad_request(format!("unknown period: {raw}")))?,
    };
    let start = query.start.unwrap_or_else(today);
    let summary = state
        .engine
        .occupancy_summary(state.rooms.len(), period, start)
        .await?;
    Ok(Json(summary))
}

/// GET /api/housekeeping-chart?start=&end=
async fn housekeeping_chart(
    State(state): State<AppState>,
    query: Result<Query<RangeQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<CleaningLoad>>> {
    let Query(range) = query?;
    let range = match (range.start, range.end) {
        (Some(start), Some(end)) => Some((start, end)),
        (None, None) => None,
        _ => return Err(ApiError::bad_request("start and end must be given together")),
    };
    Ok(Json(state.engine.cleaning_load(range).await?))
}

fn csv_download(filename: &'static str, body: String) -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        body,
    )
}

/// GET /api/export/reservations.csv
async fn export_reservations(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let reservations = state.engine.list_reservations().await;
    let body = export::reservations_csv(&reservations)?;
    Ok(csv_download("reservations.csv", body))
}

/// GET /api/export/cleaning-schedule.csv
async fn export_cleaning_schedule(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let tasks = state.engine.list_tasks().await;
    let body = export::cleaning_schedule_csv(&tasks)?;
    Ok(csv_download("cleaning_schedule.csv", body))
}
