use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

/// Aggregate statistics reported with every `SearchComplete`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchStats {
    pub files_walked: usize,
    pub dirs_walked: usize,
    pub files_matched: usize,
    pub files_skipped: usize,
    pub elapsed: Duration,
    pub from_cache: bool,
}

/// Counters shared by every worker of one run.
///
/// The match counter together with `limit_hit` is the only state workers
/// mutate in common; reservations go through compare-and-swap so the count
/// never exceeds the limit.
#[derive(Debug, Default)]
pub struct SearchCounters {
    files_walked: AtomicUsize,
    dirs_walked: AtomicUsize,
    files_matched: AtomicUsize,
    files_skipped: AtomicUsize,
    limit_hit: AtomicBool,
}

impl SearchCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file_walked(&self) -> usize {
        self.files_walked.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn dir_walked(&self) {
        self.dirs_walked.fetch_add(1, Ordering::Relaxed);
    }

    pub fn skipped(&self) {
        self.files_skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Claims one result slot. Returns `false` and records the limit once
    /// `max` results have already been claimed.
    pub fn try_reserve_match(&self, max: Option<usize>) -> bool {
        let reserved = self
            .files_matched
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| match max {
                Some(max) if n >= max => None,
                _ => Some(n + 1),
            })
            .is_ok();
        if !reserved {
            self.limit_hit.store(true, Ordering::Release);
        }
        reserved
    }

    pub fn limit_hit(&self) -> bool {
        self.limit_hit.load(Ordering::Acquire)
    }

    pub fn files_walked(&self) -> usize {
        self.files_walked.load(Ordering::Relaxed)
    }

    pub fn files_matched(&self) -> usize {
        self.files_matched.load(Ordering::Acquire)
    }

    pub fn snapshot(&self, elapsed: Duration) -> SearchStats {
        SearchStats {
            files_walked: self.files_walked.load(Ordering::Relaxed),
            dirs_walked: self.dirs_walked.load(Ordering::Relaxed),
            files_matched: self.files_matched.load(Ordering::Acquire),
            files_skipped: self.files_skipped.load(Ordering::Relaxed),
            elapsed,
            from_cache: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn reservations_never_overshoot_under_contention() {
        let counters = Arc::new(SearchCounters::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let counters = counters.clone();
                thread::spawn(move || (0..100).filter(|_| counters.try_reserve_match(Some(50))).count())
            })
            .collect();
        let granted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(granted, 50);
        assert_eq!(counters.files_matched(), 50);
        assert!(counters.limit_hit());
    }

    #[test]
    fn exact_limit_does_not_flag() {
        let counters = SearchCounters::new();
        assert!(counters.try_reserve_match(Some(2)));
        assert!(counters.try_reserve_match(Some(2)));
        assert!(!counters.limit_hit());
    }
}
