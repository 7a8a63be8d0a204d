//! Process-wide counters for the modem engine.
//! Cheap relaxed atomics; read with [`snapshot`] (the `probe` command prints one).
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

static COMMANDS_SENT: AtomicU64 = AtomicU64::new(0);
static COMMAND_RETRIES: AtomicU64 = AtomicU64::new(0);
static COMMAND_TIMEOUTS: AtomicU64 = AtomicU64::new(0);
static COMMAND_FAILURES: AtomicU64 = AtomicU64::new(0);
static BEARER_BRINGUPS: AtomicU64 = AtomicU64::new(0);
static BEARER_FAILURES: AtomicU64 = AtomicU64::new(0);
static BEARER_REBUILDS: AtomicU64 = AtomicU64::new(0);
static DELIVERIES_OK: AtomicU64 = AtomicU64::new(0);
static DELIVERIES_FAILED: AtomicU64 = AtomicU64::new(0);
static DELIVERY_LATENCY_SUM_MS: AtomicU64 = AtomicU64::new(0);
static DELIVERY_LATENCY_COUNT: AtomicU64 = AtomicU64::new(0);

pub fn inc_commands_sent() {
    COMMANDS_SENT.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_command_retries() {
    COMMAND_RETRIES.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_command_timeouts() {
    COMMAND_TIMEOUTS.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_command_failures() {
    COMMAND_FAILURES.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_bearer_bringups() {
    BEARER_BRINGUPS.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_bearer_failures() {
    BEARER_FAILURES.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_bearer_rebuilds() {
    BEARER_REBUILDS.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_deliveries_failed() {
    DELIVERIES_FAILED.fetch_add(1, Ordering::Relaxed);
}

/// Count a successful delivery and its end-to-end time.
pub fn observe_delivery(elapsed: Duration) {
    let ms = elapsed.as_millis() as u64;
    DELIVERIES_OK.fetch_add(1, Ordering::Relaxed);
    DELIVERY_LATENCY_SUM_MS.fetch_add(ms, Ordering::Relaxed);
    DELIVERY_LATENCY_COUNT.fetch_add(1, Ordering::Relaxed);
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct Snapshot {
    pub commands_sent: u64,
    pub command_retries: u64,
    pub command_timeouts: u64,
    pub command_failures: u64,
    pub bearer_bringups: u64,
    pub bearer_failures: u64,
    pub bearer_rebuilds: u64,
    pub deliveries_ok: u64,
    pub deliveries_failed: u64,
    pub delivery_latency_avg_ms: Option<u64>,
}

pub fn snapshot() -> Snapshot {
    let sum = DELIVERY_LATENCY_SUM_MS.load(Ordering::Relaxed);
    let count = DELIVERY_LATENCY_COUNT.load(Ordering::Relaxed);
    Snapshot {
        commands_sent: COMMANDS_SENT.load(Ordering::Relaxed),
        command_retries: COMMAND_RETRIES.load(Ordering::Relaxed),
        command_timeouts: COMMAND_TIMEOUTS.load(Ordering::Relaxed),
        command_failures: COMMAND_FAILURES.load(Ordering::Relaxed),
        bearer_bringups: BEARER_BRINGUPS.load(Ordering::Relaxed),
        bearer_failures: BEARER_FAILURES.load(Ordering::Relaxed),
        bearer_rebuilds: BEARER_REBUILDS.load(Ordering::Relaxed),
        deliveries_ok: DELIVERIES_OK.load(Ordering::Relaxed),
        deliveries_failed: DELIVERIES_FAILED.load(Ordering::Relaxed),
        delivery_latency_avg_ms: if count > 0 { Some(sum / count) } else { None },
    }
}
