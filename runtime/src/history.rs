//! Bounded record of committed states.
//!
//! Every committed dispatch leaves a [`Snapshot`] behind. Snapshots are owned
//! clones of the state at that point, so later dispatches never change them.
//! The history is read-only: it exists for inspection and debugging, not for
//! rewinding the store.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;

/// A committed state and the action that produced it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot<S> {
    /// Position in the commit order, starting at 1
    pub sequence: u64,
    /// Canonical name of the action that was committed
    pub action: &'static str,
    /// When the commit happened, according to the store's clock
    pub recorded_at: DateTime<Utc>,
    /// State right after the commit
    pub state: S,
}

/// Ring buffer of the most recent snapshots
#[derive(Debug, Clone)]
pub struct History<S> {
    capacity: usize,
    entries: VecDeque<Snapshot<S>>,
    last_sequence: u64,
}

impl<S: Clone> History<S> {
    /// Create an empty history holding at most `capacity` snapshots
    ///
    /// A capacity of zero disables recording; sequence numbers still advance.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity.min(1024)),
            last_sequence: 0,
        }
    }

    /// Record a commit, evicting the oldest snapshot when full
    ///
    /// Returns the sequence number assigned to the commit.
    pub fn record(&mut self, action: &'static str, recorded_at: DateTime<Utc>, state: &S) -> u64 {
        self.last_sequence += 1;

        if self.capacity > 0 {
            if self.entries.len() == self.capacity {
                self.entries.pop_front();
            }
            self.entries.push_back(Snapshot {
                sequence: self.last_sequence,
                action,
                recorded_at,
                state: state.clone(),
            });
        }

        self.last_sequence
    }

    /// Snapshots, oldest first
    #[must_use]
    pub fn snapshots(&self) -> Vec<Snapshot<S>> {
        self.entries.iter().cloned().collect()
    }

    /// Number of commits recorded so far, including evicted ones
    #[must_use]
    pub const fn commits(&self) -> u64 {
        self.last_sequence
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(second: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, second).unwrap()
    }

    #[test]
    fn test_record_assigns_sequence() {
        let mut history = History::new(4);

        assert_eq!(history.record("increment", at(0), &1_i64), 1);
        assert_eq!(history.record("increment", at(1), &2_i64), 2);

        let snapshots = history.snapshots();
        assert_eq!(snapshots.len(), 2);
        assert_eq!(snapshots[0].sequence, 1);
        assert_eq!(snapshots[0].state, 1);
        assert_eq!(snapshots[1].recorded_at, at(1));
    }

    #[test]
    fn test_evicts_oldest_when_full() {
        let mut history = History::new(2);

        for (i, value) in [10_i64, 20, 30].iter().enumerate() {
            history.record("increment", at(u32::try_from(i).unwrap()), value);
        }

        let states: Vec<i64> = history.snapshots().into_iter().map(|s| s.state).collect();
        assert_eq!(states, vec![20, 30]);
        assert_eq!(history.commits(), 3);
    }

    #[test]
    fn test_zero_capacity_keeps_nothing() {
        let mut history = History::new(0);

        assert_eq!(history.record("decrement", at(0), &-1_i64), 1);
        assert_eq!(history.record("decrement", at(1), &-2_i64), 2);

        assert!(history.snapshots().is_empty());
        assert_eq!(history.commits(), 2);
    }

    #[test]
    fn test_snapshots_are_independent_copies() {
        let mut history = History::new(4);
        let mut state = vec![1, 2];

        history.record("push", at(0), &state);
        state.push(3);

        assert_eq!(history.snapshots()[0].state, vec![1, 2]);
    }
}
