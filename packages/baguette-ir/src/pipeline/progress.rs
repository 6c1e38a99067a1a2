use std::sync::atomic::{AtomicU64, Ordering};

/// Build progress, readable from other threads while a build runs
///
/// The total is the raw call count plus twice the flattened call count: each
/// call is counted once when created, once when ordered and once when
/// integrated.
#[derive(Debug, Default)]
pub struct Progress {
    done: AtomicU64,
    total: AtomicU64,
}

impl Progress {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn reset(&self, total: u64) {
        self.done.store(0, Ordering::Relaxed);
        self.total.store(total, Ordering::Relaxed);
    }

    pub(crate) fn set_total(&self, total: u64) {
        self.total.store(total, Ordering::Relaxed);
    }

    pub(crate) fn advance(&self, n: u64) {
        self.done.fetch_add(n, Ordering::Relaxed);
    }

    pub fn done(&self) -> u64 {
        self.done.load(Ordering::Relaxed)
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    /// 0.0 ..= 1.0
    pub fn ratio(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        (self.done() as f64 / total as f64).min(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ratio() {
        let progress = Progress::new();
        assert_eq!(progress.ratio(), 0.0);
        progress.reset(12);
        progress.advance(3);
        assert!((progress.ratio() - 0.25).abs() < f64::EPSILON);
        progress.advance(20);
        assert_eq!(progress.ratio(), 1.0);
    }
}
