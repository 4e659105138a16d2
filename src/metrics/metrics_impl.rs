use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::metrics::snapshot::CacheStatReport;
use crate::metrics::traits::StatsSink;

/// Default period between two stat reports.
pub const STAT_INTERVAL: Duration = Duration::from_secs(60);

/// Lock-free hit/miss counters of one cache.
#[derive(Debug, Default)]
pub struct CacheStat {
    hit: AtomicU64,
    miss: AtomicU64,
}

impl CacheStat {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn increment_hit(&self) {
        self.hit.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn increment_miss(&self) {
        self.miss.fetch_add(1, Ordering::Relaxed);
    }

    /// Hits counted since the last [`take_report`](Self::take_report).
    pub fn hits(&self) -> u64 {
        self.hit.load(Ordering::Relaxed)
    }

    /// Misses counted since the last [`take_report`](Self::take_report).
    pub fn misses(&self) -> u64 {
        self.miss.load(Ordering::Relaxed)
    }

    /// Reads the counters without resetting them.
    pub fn snapshot(&self, elements: usize) -> CacheStatReport {
        CacheStatReport::new(self.hits(), self.misses(), elements)
    }

    /// Swaps both counters to zero and returns what they held, or `None`
    /// if nothing was counted.
    pub fn take_report(&self, elements: usize) -> Option<CacheStatReport> {
        let hit = self.hit.swap(0, Ordering::Relaxed);
        let miss = self.miss.swap(0, Ordering::Relaxed);
        let report = CacheStatReport::new(hit, miss, elements);
        (!report.is_idle()).then_some(report)
    }
}

/// Background thread publishing a [`CacheStat`] every interval.
///
/// Dropping the reporter ends the thread at its next wakeup, which happens
/// immediately since the stop channel disconnects.
#[derive(Debug)]
pub struct StatReporter {
    stop: Option<Sender<()>>,
}

impl StatReporter {
    /// Starts reporting `stat` under `name`.
    ///
    /// `elements` returns the current cache size, or `None` once the cache is
    /// gone, which ends the reporter.
    pub fn spawn<E, S>(
        name: String,
        stat: Arc<CacheStat>,
        interval: Duration,
        elements: E,
        sink: S,
    ) -> Self
    where
        E: Fn() -> Option<usize> + Send + 'static,
        S: StatsSink + 'static,
    {
        let (stop, stopped) = mpsc::channel::<()>();
        thread::spawn(move || loop {
            match stopped.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => {},
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
            let Some(elements) = elements() else {
                break;
            };
            if let Some(report) = stat.take_report(elements) {
                sink.stat(&name, &report);
            }
        });
        Self { stop: Some(stop) }
    }

    /// Ends the reporter thread; idempotent.
    pub fn stop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }
}

impl Drop for StatReporter {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recording(Mutex<Vec<(String, CacheStatReport)>>);

    impl StatsSink for Recording {
        fn stat(&self, name: &str, report: &CacheStatReport) {
            self.0.lock().push((name.to_string(), *report));
        }
    }

    #[test]
    fn take_report_resets_counters() {
        let stat = CacheStat::new();
        stat.increment_hit();
        stat.increment_hit();
        stat.increment_miss();
        assert_eq!(stat.snapshot(4), CacheStatReport::new(2, 1, 4));

        assert_eq!(stat.take_report(4), Some(CacheStatReport::new(2, 1, 4)));
        assert_eq!(stat.hits(), 0);
        assert_eq!(stat.misses(), 0);
        assert_eq!(stat.take_report(4), None);
    }

    #[test]
    fn reporter_publishes_and_skips_idle_intervals() {
        let stat = Arc::new(CacheStat::new());
        let sink = Arc::new(Recording::default());
        stat.increment_hit();
        stat.increment_miss();

        let mut reporter = StatReporter::spawn(
            "users".to_string(),
            Arc::clone(&stat),
            Duration::from_millis(20),
            || Some(7),
            Arc::clone(&sink),
        );
        thread::sleep(Duration::from_millis(200));
        reporter.stop();

        let reports = sink.0.lock();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].0, "users");
        assert_eq!(reports[0].1, CacheStatReport::new(1, 1, 7));
    }

    #[test]
    fn reporter_ends_when_cache_is_gone() {
        let stat = Arc::new(CacheStat::new());
        let sink = Arc::new(Recording::default());
        stat.increment_hit();
        let _reporter = StatReporter::spawn(
            "gone".to_string(),
            Arc::clone(&stat),
            Duration::from_millis(10),
            || None,
            Arc::clone(&sink),
        );
        thread::sleep(Duration::from_millis(100));
        assert!(sink.0.lock().is_empty());
        assert_eq!(stat.hits(), 1);
    }
}
