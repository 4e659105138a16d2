use std::fmt;

/// Hit/miss counters for one reporting interval plus the element count at
/// the time the report was taken.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct CacheStatReport {
    pub hit: u64,
    pub miss: u64,
    pub elements: usize,
}

impl CacheStatReport {
    pub fn new(hit: u64, miss: u64, elements: usize) -> Self {
        Self {
            hit,
            miss,
            elements,
        }
    }

    /// Requests served during the interval.
    pub fn total(&self) -> u64 {
        self.hit.saturating_add(self.miss)
    }

    /// Hit ratio in percent, `0.0` for an idle interval.
    pub fn hit_ratio(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            0.0
        } else {
            100.0 * self.hit as f64 / total as f64
        }
    }

    pub fn is_idle(&self) -> bool {
        self.total() == 0
    }
}

impl fmt::Display for CacheStatReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "qpm: {}, hit_ratio: {:.1}%, elements: {}, hit: {}, miss: {}",
            self.total(),
            self.hit_ratio(),
            self.elements,
            self.hit,
            self.miss
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratio_and_total() {
        let report = CacheStatReport::new(3, 1, 10);
        assert_eq!(report.total(), 4);
        assert!((report.hit_ratio() - 75.0).abs() < f64::EPSILON);
        assert!(!report.is_idle());
    }

    #[test]
    fn idle_report_has_zero_ratio() {
        let report = CacheStatReport::default();
        assert!(report.is_idle());
        assert_eq!(report.hit_ratio(), 0.0);
    }

    #[test]
    fn display_format() {
        let report = CacheStatReport::new(2, 1, 5);
        assert_eq!(
            report.to_string(),
            "qpm: 3, hit_ratio: 66.7%, elements: 5, hit: 2, miss: 1"
        );
    }
}
