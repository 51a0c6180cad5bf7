//! Prometheus metrics for the host.

use once_cell::sync::{Lazy, OnceCell};
use prometheus::{Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use tracing::error;

static GLOBAL_REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);
static REGISTER_ONCE: OnceCell<()> = OnceCell::new();
static ACTIONS_TOTAL: OnceCell<IntCounterVec> = OnceCell::new();
static SNAPSHOTS_TOTAL: OnceCell<IntCounterVec> = OnceCell::new();
static SESSIONS_ACTIVE: OnceCell<IntGauge> = OnceCell::new();
static SCREENCAST_FRAMES_TOTAL: OnceCell<IntCounterVec> = OnceCell::new();

pub fn global_registry() -> &'static Registry {
    &GLOBAL_REGISTRY
}

pub fn register_metrics() {
    REGISTER_ONCE.get_or_init(|| {
        let registry = global_registry();

        let actions = IntCounterVec::new(
            Opts::new(
                "gaia_actions_total",
                "Executed actions by kind and reason code",
            ),
            &["kind", "reason_code"],
        )
        .expect("create actions counter");
        if let Err(err) = registry.register(Box::new(actions.clone())) {
            error!(?err, "failed to register actions counter");
        }
        let _ = ACTIONS_TOTAL.set(actions);

        let snapshots = IntCounterVec::new(
            Opts::new("gaia_snapshots_total", "Captured snapshots by outcome"),
            &["outcome"],
        )
        .expect("create snapshots counter");
        if let Err(err) = registry.register(Box::new(snapshots.clone())) {
            error!(?err, "failed to register snapshots counter");
        }
        let _ = SNAPSHOTS_TOTAL.set(snapshots);

        let sessions = IntGauge::new("gaia_sessions_active", "Live browser sessions")
            .expect("create sessions gauge");
        if let Err(err) = registry.register(Box::new(sessions.clone())) {
            error!(?err, "failed to register sessions gauge");
        }
        let _ = SESSIONS_ACTIVE.set(sessions);

        let frames = IntCounterVec::new(
            Opts::new("gaia_screencast_frames_total", "Broadcast screencast frames"),
            &["session"],
        )
        .expect("create frames counter");
        if let Err(err) = registry.register(Box::new(frames.clone())) {
            error!(?err, "failed to register frames counter");
        }
        let _ = SCREENCAST_FRAMES_TOTAL.set(frames);
    });
}

pub fn record_action(kind: &str, reason_code: &str) {
    if let Some(counter) = ACTIONS_TOTAL.get() {
        counter.with_label_values(&[kind, reason_code]).inc();
    }
}

pub fn record_snapshot(outcome: &str) {
    if let Some(counter) = SNAPSHOTS_TOTAL.get() {
        counter.with_label_values(&[outcome]).inc();
    }
}

pub fn set_sessions_active(count: i64) {
    if let Some(gauge) = SESSIONS_ACTIVE.get() {
        gauge.set(count);
    }
}

pub fn record_screencast_frame(session: &str) {
    if let Some(counter) = SCREENCAST_FRAMES_TOTAL.get() {
        counter.with_label_values(&[session]).inc();
    }
}

/// Encode the registry for the `/metrics` endpoint.
pub fn encode() -> Result<String, String> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&global_registry().gather(), &mut buffer)
        .map_err(|err| err.to_string())?;
    String::from_utf8(buffer).map_err(|err| err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_register_once_and_encode() {
        register_metrics();
        register_metrics();
        record_action("click", "ok");
        record_snapshot("ok");
        set_sessions_active(2);
        let body = encode().unwrap();
        assert!(body.contains("gaia_actions_total"));
        assert!(body.contains("gaia_sessions_active"));
    }
}
