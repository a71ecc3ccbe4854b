//! Priority queue for timed schedules
//!
//! Min-ordered by (theoretical time, sequence number): two entries
//! scheduled for the same instant are delivered in submission order.
//!
//! # Complexity
//!
//! - Insert: O(log n)
//! - Pop ready / peek deadline: O(log n) / O(1)
//! - Drain: O(n log n), in priority order

use std::collections::BinaryHeap;

use crate::entry::SchedEntry;

/// Initial backing capacity for unbounded queues
const DEFAULT_BACKING: usize = 64;

/// Wrapper for heap ordering (min-heap by (theoretical time, seq))
struct HeapSlot(SchedEntry);

impl HeapSlot {
    #[inline]
    fn key(&self) -> (i64, u64) {
        (self.0.theoretical_time_ns(), self.0.seq())
    }
}

impl PartialEq for HeapSlot {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for HeapSlot {}

impl PartialOrd for HeapSlot {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapSlot {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Reverse ordering for min-heap (earliest time first,
        // lowest sequence number on ties)
        other.key().cmp(&self.key())
    }
}

/// Outcome of asking the timed queue for work at a given instant
pub enum TimedPop {
    /// The earliest entry is due; ownership transfers to the caller
    Ready(SchedEntry),

    /// Nothing scheduled
    Empty,

    /// The earliest entry is in the future; sleep toward this deadline
    NotDue {
        /// Theoretical time of the earliest entry, in nanoseconds
        deadline_ns: i64,
    },
}

/// Priority collection of timed schedules.
pub struct TimedQueue {
    heap: BinaryHeap<HeapSlot>,
    /// None = unbounded
    capacity: Option<usize>,
}

impl TimedQueue {
    pub fn new(capacity: Option<usize>) -> Self {
        let backing = capacity.unwrap_or(DEFAULT_BACKING).min(1024);
        Self {
            heap: BinaryHeap::with_capacity(backing),
            capacity,
        }
    }

    /// Insert an entry. The entry is handed back if the queue is full.
    pub fn try_push(&mut self, entry: SchedEntry) -> Result<(), SchedEntry> {
        if let Some(cap) = self.capacity {
            if self.heap.len() >= cap {
                return Err(entry);
            }
        }
        self.heap.push(HeapSlot(entry));
        Ok(())
    }

    /// Pop the earliest entry iff its theoretical time is <= `now_ns`;
    /// otherwise report the deadline the caller should sleep toward.
    pub fn pop_next_ready(&mut self, now_ns: i64) -> TimedPop {
        match self.heap.peek() {
            None => TimedPop::Empty,
            Some(slot) => {
                let deadline_ns = slot.0.theoretical_time_ns();
                if deadline_ns <= now_ns {
                    let slot = self.heap.pop().expect("peeked entry vanished");
                    TimedPop::Ready(slot.0)
                } else {
                    TimedPop::NotDue { deadline_ns }
                }
            }
        }
    }

    /// Pop the earliest entry regardless of the current time.
    ///
    /// Used when dueness no longer matters: bulk cancellation and
    /// shutdown of entries that will never run.
    pub fn pop_min(&mut self) -> Option<SchedEntry> {
        self.heap.pop().map(|slot| slot.0)
    }

    /// Theoretical time of the earliest entry, if any
    #[inline]
    pub fn peek_deadline_ns(&self) -> Option<i64> {
        self.heap.peek().map(|slot| slot.0.theoretical_time_ns())
    }

    /// Move every entry into `out`, in priority order
    pub fn drain_into(&mut self, out: &mut Vec<SchedEntry>) {
        out.reserve(self.heap.len());
        while let Some(slot) = self.heap.pop() {
            out.push(slot.0);
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(theoretical_ns: i64, seq: u64) -> SchedEntry {
        SchedEntry::timed(Box::new(|| {}), theoretical_ns, seq)
    }

    #[test]
    fn test_pop_in_time_order() {
        let mut q = TimedQueue::new(None);
        q.try_push(entry(30, 0)).unwrap();
        q.try_push(entry(10, 1)).unwrap();
        q.try_push(entry(20, 2)).unwrap();

        match q.pop_next_ready(100) {
            TimedPop::Ready(e) => assert_eq!(e.theoretical_time_ns(), 10),
            _ => panic!("expected ready entry"),
        }
        match q.pop_next_ready(100) {
            TimedPop::Ready(e) => assert_eq!(e.theoretical_time_ns(), 20),
            _ => panic!("expected ready entry"),
        }
        match q.pop_next_ready(100) {
            TimedPop::Ready(e) => assert_eq!(e.theoretical_time_ns(), 30),
            _ => panic!("expected ready entry"),
        }
        assert!(matches!(q.pop_next_ready(100), TimedPop::Empty));
    }

    #[test]
    fn test_tie_broken_by_sequence() {
        let mut q = TimedQueue::new(None);
        q.try_push(entry(50, 4)).unwrap();
        q.try_push(entry(50, 2)).unwrap();
        q.try_push(entry(50, 3)).unwrap();

        let mut seqs = Vec::new();
        while let TimedPop::Ready(e) = q.pop_next_ready(50) {
            seqs.push(e.seq());
        }
        assert_eq!(seqs, vec![2, 3, 4]);
    }

    #[test]
    fn test_not_due_reports_deadline() {
        let mut q = TimedQueue::new(None);
        q.try_push(entry(1_000, 0)).unwrap();

        match q.pop_next_ready(999) {
            TimedPop::NotDue { deadline_ns } => assert_eq!(deadline_ns, 1_000),
            _ => panic!("expected not-due"),
        }
        assert_eq!(q.len(), 1);

        // Due exactly at the deadline
        assert!(matches!(q.pop_next_ready(1_000), TimedPop::Ready(_)));
    }

    #[test]
    fn test_capacity_rejection() {
        let mut q = TimedQueue::new(Some(1));
        assert!(q.try_push(entry(10, 0)).is_ok());
        let rejected = q.try_push(entry(5, 1)).unwrap_err();
        assert_eq!(rejected.seq(), 1);
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn test_drain_in_priority_order() {
        let mut q = TimedQueue::new(None);
        q.try_push(entry(300, 0)).unwrap();
        q.try_push(entry(100, 1)).unwrap();
        q.try_push(entry(200, 2)).unwrap();

        let mut out = Vec::new();
        q.drain_into(&mut out);
        assert!(q.is_empty());
        let times: Vec<_> = out.iter().map(|e| e.theoretical_time_ns()).collect();
        assert_eq!(times, vec![100, 200, 300]);
    }

    #[test]
    fn test_negative_times_order_before_zero() {
        let mut q = TimedQueue::new(None);
        q.try_push(entry(0, 0)).unwrap();
        q.try_push(entry(-100, 1)).unwrap();

        match q.pop_next_ready(0) {
            TimedPop::Ready(e) => assert_eq!(e.theoretical_time_ns(), -100),
            _ => panic!("expected ready entry"),
        }
    }

    #[test]
    fn test_pop_min_ignores_dueness() {
        let mut q = TimedQueue::new(None);
        q.try_push(entry(i64::MAX, 0)).unwrap();
        q.try_push(entry(500, 1)).unwrap();

        assert_eq!(q.pop_min().unwrap().theoretical_time_ns(), 500);
        assert_eq!(q.pop_min().unwrap().theoretical_time_ns(), i64::MAX);
        assert!(q.pop_min().is_none());
    }

    #[test]
    fn test_peek_deadline() {
        let mut q = TimedQueue::new(None);
        assert_eq!(q.peek_deadline_ns(), None);
        q.try_push(entry(77, 0)).unwrap();
        assert_eq!(q.peek_deadline_ns(), Some(77));
    }
}
