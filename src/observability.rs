use std::net::SocketAddr;

use metrics_exporter_prometheus::BuildError;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total HTTP requests served. Labels: method, route, status.
pub const HTTP_REQUESTS_TOTAL: &str = "innkeep_http_requests_total";

/// Histogram: HTTP request latency in seconds. Labels: method, route.
pub const HTTP_REQUEST_DURATION_SECONDS: &str = "innkeep_http_request_duration_seconds";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: reservations currently stored.
pub const RESERVATIONS_ACTIVE: &str = "innkeep_reservations_active";

/// Counter: cleaning tasks marked completed.
pub const TASKS_COMPLETED_TOTAL: &str = "innkeep_tasks_completed_total";

/// Counter: WAL compactions performed.
pub const WAL_COMPACTIONS_TOTAL: &str = "innkeep_wal_compactions_total";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "innkeep_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "innkeep_wal_flush_batch_size";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Collapse a status code into the label used on request metrics.
pub fn status_label(status: u16) -> &'static str {
    match status {
        200..=299 => "ok",
        400 => "bad_request",
        404 => "not_found",
        400..=499 => "client_error",
        _ => "server_error",
    }
}
