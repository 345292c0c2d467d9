//! Metrics instrumentation
//!
//! Thin wrappers over the `metrics` facade so call sites stay one-liners.
//! Consumers install whatever recorder they use; without one these are
//! no-ops.

/// Shared label values
pub mod labels {
    pub const MECHANISM_SCRAM: &str = "scram-sha-256";
    pub const MECHANISM_CLEARTEXT: &str = "cleartext";
}

/// Counter helpers
pub mod counters {
    pub fn auth_attempted(mechanism: &'static str) {
        metrics::counter!("pgcord_auth_attempts_total", "mechanism" => mechanism).increment(1);
    }

    pub fn auth_successful(mechanism: &'static str) {
        metrics::counter!("pgcord_auth_success_total", "mechanism" => mechanism).increment(1);
    }

    pub fn auth_failed(mechanism: &'static str, reason: &'static str) {
        metrics::counter!(
            "pgcord_auth_failures_total",
            "mechanism" => mechanism,
            "reason" => reason
        )
        .increment(1);
    }

    pub fn pool_acquired() {
        metrics::counter!("pgcord_pool_acquisitions_total").increment(1);
    }

    pub fn pool_acquire_timeout() {
        metrics::counter!("pgcord_pool_acquire_timeouts_total").increment(1);
    }

    pub fn pool_released() {
        metrics::counter!("pgcord_pool_releases_total").increment(1);
    }

    pub fn pool_reconnected() {
        metrics::counter!("pgcord_pool_reconnects_total").increment(1);
    }

    pub fn queries_executed(mode: &'static str) {
        metrics::counter!("pgcord_queries_total", "mode" => mode).increment(1);
    }
}

/// Histogram helpers
pub mod histograms {
    pub fn auth_duration(mechanism: &'static str, millis: u64) {
        metrics::histogram!("pgcord_auth_duration_ms", "mechanism" => mechanism)
            .record(millis as f64);
    }

    pub fn pool_acquire_wait(millis: u64) {
        metrics::histogram!("pgcord_pool_acquire_wait_ms").record(millis as f64);
    }

    pub fn query_duration(mode: &'static str, millis: u64) {
        metrics::histogram!("pgcord_query_duration_ms", "mode" => mode).record(millis as f64);
    }
}
