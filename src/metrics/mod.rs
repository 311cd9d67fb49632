//! Prometheus metrics for the monitor
//!
//! This module provides metrics tracking for:
//! - Probing: outcomes per probe, completed rounds, epochs per partition mode
//! - Claiming: found identifiers, dispatch results, per-worker attempts, claim latency
//!
//! # Usage
//!
//! Call `init_metrics()` at application startup to register all metrics.
//! If initialization fails, metrics operations become no-ops.

use prometheus::{
    register_counter, register_counter_vec, register_gauge, register_histogram, Counter,
    CounterVec, Encoder, Gauge, Histogram, TextEncoder,
};
use std::sync::OnceLock;

// ============================================================================
// Metrics Storage
// ============================================================================

/// Container for probing metrics
struct ProbeMetrics {
    probes: CounterVec,
    rounds: Counter,
    epochs: CounterVec,
    running: Gauge,
}

/// Container for claiming metrics
struct ClaimMetrics {
    found: Counter,
    claims: CounterVec,
    attempts: CounterVec,
    duration: Histogram,
}

/// Global storage for probing metrics
static PROBE_METRICS: OnceLock<ProbeMetrics> = OnceLock::new();

/// Global storage for claiming metrics
static CLAIM_METRICS: OnceLock<ClaimMetrics> = OnceLock::new();

/// Flag to track if initialization was attempted
static METRICS_INIT_ATTEMPTED: OnceLock<bool> = OnceLock::new();

// ============================================================================
// Initialization
// ============================================================================

/// Initialize all Prometheus metrics
///
/// This function should be called once at application startup.
/// If metric registration fails, subsequent metric operations become
/// no-ops.
///
/// # Example
///
/// ```ignore
/// if let Err(e) = sniper::metrics::init_metrics() {
///     eprintln!("Warning: Metrics initialization failed: {}", e);
/// }
/// ```
pub fn init_metrics() -> Result<(), Box<dyn std::error::Error>> {
    // Prevent double initialization
    if METRICS_INIT_ATTEMPTED.get().is_some() {
        return Ok(());
    }
    METRICS_INIT_ATTEMPTED.set(true).ok();

    let probe = ProbeMetrics {
        probes: register_counter_vec!(
            "sniper_probes_total",
            "Total availability probes by outcome",
            &["outcome"]
        )?,
        rounds: register_counter!(
            "sniper_rounds_total",
            "Total completed monitoring rounds"
        )?,
        epochs: register_counter_vec!(
            "sniper_epochs_total",
            "Total partitioning epochs by mode",
            &["mode"]
        )?,
        running: register_gauge!(
            "sniper_monitor_running",
            "Whether the monitoring loop is running (1 = yes, 0 = no)"
        )?,
    };

    let claim = ClaimMetrics {
        found: register_counter!(
            "sniper_found_total",
            "Total identifiers found available"
        )?,
        claims: register_counter_vec!(
            "sniper_claims_total",
            "Total claim dispatches by result",
            &["result"]
        )?,
        attempts: register_counter_vec!(
            "sniper_claim_attempts_total",
            "Total per-worker claim attempts by result",
            &["result"]
        )?,
        duration: register_histogram!(
            "sniper_claim_duration_seconds",
            "Time spent dispatching one claim in seconds",
            vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
        )?,
    };

    PROBE_METRICS.set(probe).map_err(|_| "Probe metrics already initialized")?;
    CLAIM_METRICS.set(claim).map_err(|_| "Claim metrics already initialized")?;

    tracing::info!("Prometheus metrics initialized successfully");
    Ok(())
}

/// Check if metrics have been initialized
pub fn metrics_initialized() -> bool {
    PROBE_METRICS.get().is_some() && CLAIM_METRICS.get().is_some()
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

/// Record one probe outcome
pub fn record_probe(outcome: &str) {
    if let Some(m) = PROBE_METRICS.get() {
        m.probes.with_label_values(&[outcome]).inc();
    }
}

/// Record a completed round
pub fn record_round() {
    if let Some(m) = PROBE_METRICS.get() {
        m.rounds.inc();
    }
}

/// Record the start of an epoch
pub fn record_epoch(mode: &str) {
    if let Some(m) = PROBE_METRICS.get() {
        m.epochs.with_label_values(&[mode]).inc();
    }
}

/// Update the running gauge
pub fn set_monitor_running(running: bool) {
    if let Some(m) = PROBE_METRICS.get() {
        m.running.set(if running { 1.0 } else { 0.0 });
    }
}

/// Record an identifier found available
pub fn record_found() {
    if let Some(m) = CLAIM_METRICS.get() {
        m.found.inc();
    }
}

/// Record the result of a whole dispatch
pub fn record_claim(success: bool) {
    if let Some(m) = CLAIM_METRICS.get() {
        let result = if success { "success" } else { "failure" };
        m.claims.with_label_values(&[result]).inc();
    }
}

/// Record one worker's claim attempt
pub fn record_claim_attempt(result: &str) {
    if let Some(m) = CLAIM_METRICS.get() {
        m.attempts.with_label_values(&[result]).inc();
    }
}

/// Histogram timer guard that records duration on drop
pub struct MetricsTimer {
    timer: Option<prometheus::HistogramTimer>,
}

impl MetricsTimer {
    fn new(timer: prometheus::HistogramTimer) -> Self {
        Self { timer: Some(timer) }
    }

    /// Create a no-op timer when metrics are not initialized
    fn noop() -> Self {
        Self { timer: None }
    }
}

impl Drop for MetricsTimer {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.stop_and_record();
        }
    }
}

/// Start a claim dispatch timer
pub fn start_claim_timer() -> MetricsTimer {
    match CLAIM_METRICS.get() {
        Some(m) => MetricsTimer::new(m.duration.start_timer()),
        None => MetricsTimer::noop(),
    }
}

// ============================================================================
// Tests
// ============================================================================
