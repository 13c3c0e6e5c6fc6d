use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::models::SourceCode;

pub const FETCH_TOTAL: &str = "boorumesh_fetch_total";
pub const RECORDS_SKIPPED_TOTAL: &str = "boorumesh_records_skipped_total";

/// Label used for fetches whose code did not resolve to a registered source.
pub const UNKNOWN_SOURCE: &str = "unknown";

/// `code` is `None` unless the source was loaded from the repository.
pub fn record_fetch(code: Option<&SourceCode>, outcome: &'static str) {
    let source = code.map_or_else(|| UNKNOWN_SOURCE.to_string(), |c| c.to_string());
    metrics::counter!(FETCH_TOTAL, "source" => source, "outcome" => outcome).increment(1);
}

pub fn record_skipped(code: &SourceCode, skipped: usize) {
    if skipped > 0 {
        metrics::counter!(RECORDS_SKIPPED_TOTAL, "source" => code.to_string()).increment(skipped as u64);
    }
}

/// Install the global Prometheus recorder. Only one recorder may exist per process.
pub fn install_prometheus() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    metrics::describe_counter!(FETCH_TOTAL, "Fetch calls per source and outcome");
    metrics::describe_counter!(RECORDS_SKIPPED_TOTAL, "Upstream records dropped by the mapper");
    Ok(handle)
}
