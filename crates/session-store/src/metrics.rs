use lazy_static::lazy_static;
use prometheus::{core::Collector, opts, IntCounter, IntCounterVec, IntGauge, Registry};
use tracing::error;

lazy_static! {
    static ref SESSIONS_ACTIVE: IntGauge =
        IntGauge::new("domainhost_sessions_active", "Sessions currently in the store").unwrap();
    static ref SESSIONS_CREATED: IntCounter = IntCounter::new(
        "domainhost_sessions_created_total",
        "Sessions created since start",
    )
    .unwrap();
    static ref SESSIONS_REMOVED: IntCounterVec = IntCounterVec::new(
        opts!(
            "domainhost_sessions_removed_total",
            "Sessions removed grouped by reason"
        ),
        &["reason"]
    )
    .unwrap();
}

fn register<C>(registry: &Registry, collector: C)
where
    C: Collector + Clone + Send + Sync + 'static,
{
    if let Err(err) = registry.register(Box::new(collector.clone())) {
        if !matches!(err, prometheus::Error::AlreadyReg) {
            error!(?err, "failed to register session metric");
        }
    }
}

pub fn register_metrics(registry: &Registry) {
    register(registry, SESSIONS_ACTIVE.clone());
    register(registry, SESSIONS_CREATED.clone());
    register(registry, SESSIONS_REMOVED.clone());
}

/// The active gauge is shared by every store in the process. Each store adds
/// the change in its own size, so the gauge reads the sum across stores.
pub fn adjust_active(delta: i64) {
    if delta != 0 {
        SESSIONS_ACTIVE.add(delta);
    }
}

pub fn active_sessions() -> i64 {
    SESSIONS_ACTIVE.get()
}

pub fn record_created() {
    SESSIONS_CREATED.inc();
}

pub fn record_removed(reason: &str) {
    SESSIONS_REMOVED.with_label_values(&[reason]).inc();
}
