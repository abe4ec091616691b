use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

// ── Booking outcomes ────────────────────────────────────────────

/// Counter: bookings written. Labels: kind.
pub const BOOKINGS_CREATED_TOTAL: &str = "condobook_bookings_created_total";

/// Counter: creations rejected because the day was taken. Labels: kind.
pub const BOOKING_CONFLICTS_TOTAL: &str = "condobook_booking_conflicts_total";

/// Counter: requests rejected for blank or oversized input. Labels: field.
pub const VALIDATION_FAILURES_TOTAL: &str = "condobook_validation_failures_total";

// ── Store ───────────────────────────────────────────────────────

/// Counter: failed store calls seen by the booking manager. Labels: operation.
pub const STORE_ERRORS_TOTAL: &str = "condobook_store_errors_total";

/// Histogram: store mutation latency in seconds, WAL fsync included. Labels: operation.
pub const STORE_OP_DURATION_SECONDS: &str = "condobook_store_op_duration_seconds";

/// Install the Prometheus exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}
