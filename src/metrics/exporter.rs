use crate::metrics::snapshot::CacheStatReport;
use crate::metrics::traits::StatsSink;

/// Writes every report as one INFO event on the `expirykit::stat` target.
///
/// The message reads `cache(<name>) - qpm: N, hit_ratio: P%, elements: E,
/// hit: H, miss: M`; the numbers are also attached as structured fields.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingStatsSink;

impl StatsSink for TracingStatsSink {
    fn stat(&self, name: &str, report: &CacheStatReport) {
        tracing::info!(
            target: "expirykit::stat",
            cache = name,
            qpm = report.total(),
            hit = report.hit,
            miss = report.miss,
            elements = report.elements,
            "cache({}) - {}",
            name,
            report
        );
    }
}
