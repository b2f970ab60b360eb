use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::trace;

// Counters are emitted as trace events; the Prometheus recorder only backs `/metrics`.

pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// A recorder that is not installed globally, for routers built in tests.
pub fn detached_handle() -> PrometheusHandle {
    PrometheusBuilder::new().build_recorder().handle()
}

pub fn inc_requests(route: &'static str) {
    trace!(
        target = "labelsort.metrics",
        route = route,
        "requests_total_inc"
    );
}

pub fn stage_elapsed(stage: &'static str, elapsed_ms: u128) {
    trace!(
        target = "labelsort.metrics",
        stage = stage,
        elapsed_ms = elapsed_ms as u64,
        "stage_elapsed"
    );
}

pub fn batch_completed(orders: usize, outputs: usize) {
    trace!(
        target = "labelsort.metrics",
        orders = orders as u64,
        outputs = outputs as u64,
        "batch_completed"
    );
}
