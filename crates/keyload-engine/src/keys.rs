//! Clustering key generation.
//!
//! Keys are `thread_id * 1_000_000 + sequence`, so every worker owns a
//! disjoint range as long as its sequence stays below [`KEY_SPACE_PER_THREAD`].

use keyload_core::RampUpMode;

/// Number of clustering keys reserved for each worker.
pub const KEY_SPACE_PER_THREAD: u64 = 1_000_000;

/// Offset applied per thread id to the first sequence of staggered workers.
const STAGGERED_SEQUENCE_OFFSET: u64 = 1_000;

/// Staggered offsets wrap below this bound, leaving every worker at least
/// 90% of its key range.
const MAX_STAGGERED_OFFSET: u64 = KEY_SPACE_PER_THREAD / 10;

/// Derives the clustering key for a worker's `sequence`-th iteration.
#[must_use]
pub fn clustering_key(thread_id: u32, sequence: u64) -> i64 {
    i64::from(thread_id) * KEY_SPACE_PER_THREAD as i64 + sequence as i64
}

/// Worker-local, strictly increasing sequence of clustering keys.
#[derive(Debug, Clone)]
pub struct KeySequence {
    thread_id: u32,
    next: u64,
}

impl KeySequence {
    /// Staggered workers start at `thread_id * 1000` (wrapped below
    /// `MAX_STAGGERED_OFFSET`) to stay clear of keys left behind by earlier
    /// runs with small thread ids.
    pub fn new(thread_id: u32, mode: RampUpMode) -> Self {
        let next = match mode {
            RampUpMode::Immediate => 0,
            RampUpMode::Staggered => {
                (u64::from(thread_id) * STAGGERED_SEQUENCE_OFFSET) % MAX_STAGGERED_OFFSET
            }
        };
        Self { thread_id, next }
    }

    /// Returns `(sequence, clustering_key)` and advances, or `None` once the
    /// worker's key range is exhausted.
    pub fn next_key(&mut self) -> Option<(u64, i64)> {
        if self.next >= KEY_SPACE_PER_THREAD {
            return None;
        }
        let sequence = self.next;
        self.next += 1;
        Some((sequence, clustering_key(self.thread_id, sequence)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_key_formula() {
        assert_eq!(clustering_key(1, 0), 1_000_000);
        assert_eq!(clustering_key(3, 42), 3_000_042);
    }

    #[test]
    fn test_immediate_sequence_starts_at_zero() {
        let mut keys = KeySequence::new(2, RampUpMode::Immediate);
        assert_eq!(keys.next_key(), Some((0, 2_000_000)));
        assert_eq!(keys.next_key(), Some((1, 2_000_001)));
    }

    #[test]
    fn test_staggered_sequence_offset() {
        let mut keys = KeySequence::new(2, RampUpMode::Staggered);
        assert_eq!(keys.next_key(), Some((2_000, 2_002_000)));
    }

    #[test]
    fn test_staggered_offset_stays_in_range() {
        let mut keys = KeySequence::new(1_550, RampUpMode::Staggered);
        let (sequence, key) = keys.next_key().unwrap();
        assert_eq!(sequence, 50_000);
        assert_eq!(key, clustering_key(1_550, sequence));
    }

    #[test]
    fn test_high_thread_ids_keep_most_of_their_range() {
        for thread_id in [99, 100, 999, 1_550, 65_535] {
            let mut keys = KeySequence::new(thread_id, RampUpMode::Staggered);
            let (sequence, _) = keys.next_key().unwrap();
            assert!(
                KEY_SPACE_PER_THREAD - sequence >= 900_000,
                "thread {thread_id} starts at {sequence}"
            );
        }
        let mut keys = KeySequence::new(99, RampUpMode::Staggered);
        assert_eq!(keys.next_key().map(|(s, _)| s), Some(99_000));
    }

    #[test]
    fn test_sequence_exhaustion() {
        let mut keys = KeySequence {
            thread_id: 1,
            next: KEY_SPACE_PER_THREAD - 1,
        };
        assert_eq!(keys.next_key(), Some((999_999, 1_999_999)));
        assert_eq!(keys.next_key(), None);
    }

    proptest! {
        #[test]
        fn prop_keys_are_unique(
            t1 in 1u32..100_000,
            t2 in 1u32..100_000,
            s1 in 0u64..KEY_SPACE_PER_THREAD,
            s2 in 0u64..KEY_SPACE_PER_THREAD,
        ) {
            if clustering_key(t1, s1) == clustering_key(t2, s2) {
                prop_assert_eq!(t1, t2);
                prop_assert_eq!(s1, s2);
            }
        }

        #[test]
        fn prop_ranges_are_disjoint(t1 in 1u32..100_000, t2 in 1u32..100_000) {
            prop_assume!(t1 != t2);
            let (lo1, hi1) = (clustering_key(t1, 0), clustering_key(t1, KEY_SPACE_PER_THREAD - 1));
            let (lo2, hi2) = (clustering_key(t2, 0), clustering_key(t2, KEY_SPACE_PER_THREAD - 1));
            prop_assert!(hi1 < lo2 || hi2 < lo1);
        }
    }
}
