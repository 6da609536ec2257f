//! Deterministic sequential identifiers.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::constants::ID_WIDTH_DIGITS;

/// Generates "000001", "000002", ... from a shared atomic counter.
///
/// Ids are zero padded to six digits and grow past that width instead of
/// wrapping or truncating.
#[derive(Debug, Default)]
pub struct DeterministicIdGenerator {
    counter: AtomicU64,
}

impl DeterministicIdGenerator {
    /// Create a generator whose first id is "000001".
    #[must_use]
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    /// Create a generator whose counter starts at `value`; the first id is
    /// `value + 1`.
    #[must_use]
    pub fn starting_at(value: u64) -> Self {
        Self {
            counter: AtomicU64::new(value),
        }
    }

    /// Increment the counter and render the new value.
    pub fn generate_id(&self) -> String {
        let value = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{value:0width$}", width = ID_WIDTH_DIGITS)
    }

    /// Return the counter to zero.
    pub fn reset(&self) {
        self.counter.store(0, Ordering::SeqCst);
    }

    /// Last value handed out (0 before the first id).
    pub fn current_value(&self) -> u64 {
        self.counter.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_sequence_from_zero() {
        let ids = DeterministicIdGenerator::new();
        assert_eq!(ids.generate_id(), "000001");
        assert_eq!(ids.generate_id(), "000002");
        assert_eq!(ids.current_value(), 2);
    }

    #[test]
    fn test_grows_past_width() {
        let ids = DeterministicIdGenerator::starting_at(999_998);
        assert_eq!(ids.generate_id(), "999999");
        assert_eq!(ids.generate_id(), "1000000");
        assert_eq!(ids.generate_id(), "1000001");
    }

    #[test]
    fn test_reset() {
        let ids = DeterministicIdGenerator::starting_at(41);
        ids.generate_id();
        ids.reset();
        assert_eq!(ids.current_value(), 0);
        assert_eq!(ids.generate_id(), "000001");
    }

    #[test]
    fn test_concurrent_ids_are_unique() {
        let ids = Arc::new(DeterministicIdGenerator::new());

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let ids = Arc::clone(&ids);
                std::thread::spawn(move || (0..250).map(|_| ids.generate_id()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "duplicate id");
            }
        }
        assert_eq!(seen.len(), 1000);
        assert_eq!(ids.current_value(), 1000);
    }
}
