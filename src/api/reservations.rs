use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::routing::{get, put};
use axum::{Json, Router};
use serde::Serialize;

use crate::model::{Reservation, ReservationDraft, ReservationId};

use super::{ApiResult, AppState, Message};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/reservations", get(list).post(create))
        .route("/api/reservations/{id}", put(update).delete(delete))
}

#[derive(Debug, Serialize)]
pub struct ReservationResponse {
    pub message: &'static str,
    pub reservation: Reservation,
}

/// GET /api/reservations
async fn list(State(state): State<AppState>) -> Json<Vec<Reservation>> {
    Json(state.engine.list_reservations().await)
}

/// POST /api/reservations
async fn create(
    State(state): State<AppState>,
    payload: Result<Json<ReservationDraft>, JsonRejection>,
) -> ApiResult<Json<ReservationResponse>> {
    let Json(draft) = payload?;
    let (reservation, _) = state.engine.create_reservation(draft).await?;
    Ok(Json(ReservationResponse {
        message: "Reservation added successfully!",
        reservation,
    }))
}

/// PUT /api/reservations/{id}
async fn update(
    State(state): State<AppState>,
    id: Result<Path<ReservationId>, PathRejection>,
    payload: Result<Json<ReservationDraft>, JsonRejection>,
) -> ApiResult<Json<ReservationResponse>> {
    let Path(id) = id?;
    let Json(draft) = payload?;
    let (reservation, _) = state.engine.update_reservation(id, draft).await?;
    Ok(Json(ReservationResponse {
        message: "Reservation updated successfully!",
        reservation,
    }))
}

/// DELETE /api/reservations/{id}
async fn delete(
    State(state): State<AppState>,
    id: Result<Path<ReservationId>, PathRejection>,
) -> ApiResult<Json<Message>> {
    let Path(id) = id?;
    state.engine.delete_reservation(id).await?;
    Ok(Json(Message::new("Reservation deleted successfully!")))
}
