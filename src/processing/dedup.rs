//! Cross-source identifier tracking for one run.

use std::collections::HashSet;
use std::sync::Mutex;

/// Run-scoped set of record identifiers already consumed.
///
/// Shared by every source of a run. Access goes through a mutex so that parallel sources
/// observe a single first occurrence per identifier.
#[derive(Debug, Default)]
pub struct DedupTracker {
    seen: Mutex<HashSet<String>>,
}

impl DedupTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `id` was already marked in this run.
    pub fn seen(&self, id: &str) -> bool {
        self.lock().contains(id)
    }

    /// Mark `id` as seen.
    pub fn mark_seen(&self, id: &str) {
        self.lock().insert(id.to_string());
    }

    /// Mark `id` and report whether this call was its first occurrence.
    ///
    /// Check and mark happen under one lock acquisition.
    pub fn check_and_mark(&self, id: &str) -> bool {
        let mut seen = self.lock();
        if seen.contains(id) {
            return false;
        }
        seen.insert(id.to_string())
    }

    /// Number of distinct identifiers seen.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether nothing has been seen yet.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        // The set holds plain strings; a panic elsewhere cannot leave it half-updated.
        self.seen
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn first_occurrence_wins() {
        let tracker = DedupTracker::new();
        assert!(!tracker.seen("1"));
        assert!(tracker.check_and_mark("1"));
        assert!(tracker.seen("1"));
        assert!(!tracker.check_and_mark("1"));
        tracker.mark_seen("2");
        assert!(!tracker.check_and_mark("2"));
        assert_eq!(tracker.len(), 2);
    }

    #[test]
    fn concurrent_marks_admit_exactly_one() {
        let tracker = Arc::new(DedupTracker::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let tracker = Arc::clone(&tracker);
                std::thread::spawn(move || tracker.check_and_mark("38000001"))
            })
            .collect();
        let admitted = handles
            .into_iter()
            .map(|handle| handle.join().expect("thread"))
            .filter(|first| *first)
            .count();
        assert_eq!(admitted, 1);
    }
}
