use std::sync::OnceLock;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::core::config::Settings;

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub(crate) fn init(settings: &Settings) -> anyhow::Result<()> {
    if !settings.telemetry().prometheus_enabled || PROM_HANDLE.get().is_some() {
        return Ok(());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    let _ = PROM_HANDLE.set(handle);
    Ok(())
}

pub(crate) fn render() -> Option<String> {
    PROM_HANDLE.get().map(|handle| handle.render())
}

pub(crate) fn attempt_created() {
    ::metrics::counter!("exam_attempts_created_total").increment(1);
}

pub(crate) fn attempt_finalized() {
    ::metrics::counter!("exam_attempts_finalized_total").increment(1);
}

pub(crate) fn answers_saved(count: u64) {
    if count > 0 {
        ::metrics::counter!("exam_answers_saved_total").increment(count);
    }
}
