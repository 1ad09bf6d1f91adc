use std::net::SocketAddr;

use crate::coordinator::{BookingError, ErrorKind};

// ── Booking outcomes ────────────────────────────────────────────

/// Counter: booking attempts by final outcome. Labels: outcome.
pub const BOOKINGS_TOTAL: &str = "stayline_bookings_total";

/// Counter: conditional inserts lost to a concurrent writer. Labels: property.
pub const BOOKING_CONFLICTS_TOTAL: &str = "stayline_booking_conflicts_total";

/// Counter: retried attempts. Labels: operation, reason.
pub const RETRIES_TOTAL: &str = "stayline_retries_total";

/// Counter: cancellations by outcome. Labels: outcome.
pub const CANCELLATIONS_TOTAL: &str = "stayline_cancellations_total";

/// Histogram: coordinator operation latency in seconds. Labels: operation.
pub const OPERATION_DURATION_SECONDS: &str = "stayline_operation_duration_seconds";

// ── Storage ─────────────────────────────────────────────────────

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "stayline_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "stayline_wal_flush_batch_size";

/// Counter: WAL commits that failed. Labels: recovery (rolled_back, poisoned).
pub const WAL_COMMIT_FAILURES_TOTAL: &str = "stayline_wal_commit_failures_total";

/// Counter: logged bookings dropped at startup because they overlap an earlier one.
pub const REPLAY_CONFLICTS_TOTAL: &str = "stayline_replay_conflicts_total";

/// Counter: WAL compactions performed.
pub const WAL_COMPACTIONS_TOTAL: &str = "stayline_wal_compactions_total";

/// Install the Prometheus exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), metrics_exporter_prometheus::BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Short label for the `outcome` metric dimension.
pub fn outcome_label<T>(result: &Result<T, BookingError>) -> &'static str {
    match result {
        Ok(_) => "ok",
        Err(e) => match e.kind() {
            ErrorKind::Validation => "invalid",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "not_available",
            ErrorKind::TransientStorage => "transient",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Fatal => "error",
        },
    }
}
