//! Concurrent append-only list.

use parking_lot::RwLock;

/// A linearizable append-only sequence.
///
/// Appends from any number of threads are serialized by a write lock;
/// readers take a snapshot under a read lock, so every read observes the
/// log as of a single instant, in insertion order.
#[derive(Debug)]
pub struct AppendLog<T> {
    items: RwLock<Vec<T>>,
}

impl<T: Clone> AppendLog<T> {
    /// Create an empty log.
    pub fn new() -> Self {
        Self {
            items: RwLock::new(Vec::new()),
        }
    }

    /// Append an item at the end of the log.
    pub fn append(&self, item: T) {
        self.items.write().push(item);
    }

    /// Copy of the whole log in insertion order.
    pub fn snapshot(&self) -> Vec<T> {
        self.items.read().clone()
    }

    /// Items matching `predicate`, in insertion order.
    pub fn find(&self, predicate: impl Fn(&T) -> bool) -> Vec<T> {
        self.items
            .read()
            .iter()
            .filter(|item| predicate(item))
            .cloned()
            .collect()
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    /// True when nothing has been appended since the last clear.
    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    /// Remove every item, returning how many were dropped.
    pub fn clear(&self) -> usize {
        let mut items = self.items.write();
        let removed = items.len();
        items.clear();
        removed
    }
}

impl<T: Clone> Default for AppendLog<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_append_preserves_order() {
        let log = AppendLog::new();
        log.append("a");
        log.append("b");
        log.append("c");

        assert_eq!(log.snapshot(), vec!["a", "b", "c"]);
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn test_snapshot_is_detached() {
        let log = AppendLog::new();
        log.append(1);
        let snapshot = log.snapshot();

        log.append(2);

        assert_eq!(snapshot, vec![1]);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_find() {
        let log = AppendLog::new();
        for n in 0..10 {
            log.append(n);
        }

        assert_eq!(log.find(|n| n % 3 == 0), vec![0, 3, 6, 9]);
        assert!(log.find(|n| *n > 100).is_empty());
    }

    #[test]
    fn test_clear() {
        let log = AppendLog::new();
        log.append(1);
        log.append(2);

        assert_eq!(log.clear(), 2);
        assert!(log.is_empty());
        assert_eq!(log.clear(), 0);
    }

    #[test]
    fn test_concurrent_appends_keep_per_writer_order() {
        let log = Arc::new(AppendLog::new());

        let handles: Vec<_> = (0..8)
            .map(|writer| {
                let log = Arc::clone(&log);
                std::thread::spawn(move || {
                    for seq in 0..200 {
                        log.append((writer, seq));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let items = log.snapshot();
        assert_eq!(items.len(), 1_600);
        for writer in 0..8 {
            let seqs: Vec<_> = items
                .iter()
                .filter(|(w, _)| *w == writer)
                .map(|(_, seq)| *seq)
                .collect();
            assert_eq!(seqs, (0..200).collect::<Vec<_>>());
        }
    }
}
