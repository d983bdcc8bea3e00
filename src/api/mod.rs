//! REST surface over the engine.

mod cleaning;
mod error;
mod reports;
mod reservations;

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{MatchedPath, Request, State};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use chrono::NaiveDate;
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::engine::Engine;
use crate::observability::{HTTP_REQUEST_DURATION_SECONDS, HTTP_REQUESTS_TOTAL, status_label};

pub use error::{ApiError, ApiResult};

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    /// Room catalogue used by availability and occupancy.
    pub rooms: Arc<Vec<String>>,
    pub port: u16,
}

impl AppState {
    pub fn new(engine: Arc<Engine>, rooms: Vec<String>, port: u16) -> Self {
        Self {
            engine,
            rooms: Arc::new(rooms),
            port,
        }
    }
}

/// Body of responses that carry only a message.
#[derive(Debug, Serialize)]
pub struct Message {
    pub message: &'static str,
}

impl Message {
    pub fn new(message: &'static str) -> Self {
        Self { message }
    }
}

pub(crate) fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .merge(reservations::router())
        .merge(cleaning::router())
        .merge(reports::router())
        .layer(middleware::from_fn(track_metrics))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// GET /
async fn root(State(state): State<AppState>) -> String {
    format!("Backend server is running on port {}", state.port)
}

async fn track_metrics(req: Request, next: Next) -> Response {
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| "unmatched".to_owned());
    let method = req.method().to_string();
    let start = Instant::now();

    let response = next.run(req).await;

    let status = status_label(response.status().as_u16());
    metrics::counter!(HTTP_REQUESTS_TOTAL, "method" => method.clone(), "route" => route.clone(), "status" => status)
        .increment(1);
    metrics::histogram!(HTTP_REQUEST_DURATION_SECONDS, "method" => method, "route" => route)
        .record(start.elapsed().as_secs_f64());
    response
}
