//! Prometheus metrics for engine runs
//!
//! Metrics are registered lazily on first access using once_cell::Lazy.

use once_cell::sync::Lazy;
use prometheus::{register_histogram_vec, register_int_counter_vec, register_int_gauge, Encoder, HistogramVec, IntCounterVec, IntGauge, TextEncoder};

/// Emitted events by group and result (`success` / `failure`)
pub static SAMPLES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "perfplan_samples_total",
        "Total number of emitted outcome events",
        &["group", "result"]
    )
    .expect("Failed to register samples counter")
});

/// Sample duration histogram
pub static SAMPLE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "perfplan_sample_duration_seconds",
        "Elapsed time of emitted outcome events in seconds",
        &["group"],
        // Buckets: 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 2.5s, 5s, 10s, 30s
        vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    )
    .expect("Failed to register sample duration histogram")
});

/// Virtual users currently walking their group
pub static ACTIVE_VIRTUAL_USERS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("perfplan_active_virtual_users", "Number of running virtual users")
        .expect("Failed to register active virtual users gauge")
});

/// Records one emitted event.
pub fn observe_sample(group: &str, success: bool, elapsed_ms: u64) {
    let result = if success { "success" } else { "failure" };
    SAMPLES_TOTAL.with_label_values(&[group, result]).inc();
    SAMPLE_DURATION
        .with_label_values(&[group])
        .observe(elapsed_ms as f64 / 1000.0);
}

/// Guard counting a running virtual user.
pub struct ActiveUserGuard(());

impl ActiveUserGuard {
    pub fn enter() -> Self {
        ACTIVE_VIRTUAL_USERS.inc();
        Self(())
    }
}

impl Drop for ActiveUserGuard {
    fn drop(&mut self) {
        ACTIVE_VIRTUAL_USERS.dec();
    }
}

/// Renders the default registry in the Prometheus text format.
pub fn render() -> String {
    let mut buffer = Vec::new();
    if let Err(err) = TextEncoder::new().encode(&prometheus::gather(), &mut buffer) {
        tracing::warn!(error = %err, "failed to encode metrics");
        return String::new();
    }
    String::from_utf8_lossy(&buffer).into_owned()
}
