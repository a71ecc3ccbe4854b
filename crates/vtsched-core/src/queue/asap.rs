//! FIFO queue for ASAP schedules

use std::collections::VecDeque;

use crate::entry::SchedEntry;

/// Initial backing capacity for unbounded queues
const DEFAULT_BACKING: usize = 64;

/// FIFO of schedules to run as soon as a worker is free.
///
/// Under single-threaded acceptance, pop order equals push order.
pub struct AsapQueue {
    entries: VecDeque<SchedEntry>,
    /// None = unbounded
    capacity: Option<usize>,
}

impl AsapQueue {
    pub fn new(capacity: Option<usize>) -> Self {
        let backing = capacity.unwrap_or(DEFAULT_BACKING).min(1024);
        Self {
            entries: VecDeque::with_capacity(backing),
            capacity,
        }
    }

    /// Push to the back. The entry is handed back if the queue is full.
    pub fn try_push(&mut self, entry: SchedEntry) -> Result<(), SchedEntry> {
        if let Some(cap) = self.capacity {
            if self.entries.len() >= cap {
                return Err(entry);
            }
        }
        self.entries.push_back(entry);
        Ok(())
    }

    /// Pop the oldest entry
    pub fn pop_front(&mut self) -> Option<SchedEntry> {
        self.entries.pop_front()
    }

    /// Move every entry into `out`, preserving FIFO order
    pub fn drain_into(&mut self, out: &mut Vec<SchedEntry>) {
        out.reserve(self.entries.len());
        out.extend(self.entries.drain(..));
    }

    /// Remove and return the oldest entry matching the predicate
    pub fn remove_first_matching<P>(&mut self, pred: P) -> Option<SchedEntry>
    where
        P: Fn(&SchedEntry) -> bool,
    {
        let idx = self.entries.iter().position(pred)?;
        self.entries.remove(idx)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(seq: u64) -> SchedEntry {
        SchedEntry::asap(Box::new(|| {}), seq)
    }

    #[test]
    fn test_fifo_order() {
        let mut q = AsapQueue::new(None);
        q.try_push(entry(1)).unwrap();
        q.try_push(entry(2)).unwrap();
        q.try_push(entry(3)).unwrap();

        assert_eq!(q.pop_front().unwrap().seq(), 1);
        assert_eq!(q.pop_front().unwrap().seq(), 2);
        assert_eq!(q.pop_front().unwrap().seq(), 3);
        assert!(q.pop_front().is_none());
    }

    #[test]
    fn test_capacity_rejection() {
        let mut q = AsapQueue::new(Some(2));
        assert!(q.try_push(entry(1)).is_ok());
        assert!(q.try_push(entry(2)).is_ok());

        let rejected = q.try_push(entry(3)).unwrap_err();
        assert_eq!(rejected.seq(), 3);
        assert_eq!(q.len(), 2);

        // Popping frees a slot
        q.pop_front();
        assert!(q.try_push(entry(4)).is_ok());
    }

    #[test]
    fn test_zero_capacity_rejects_everything() {
        let mut q = AsapQueue::new(Some(0));
        assert!(q.try_push(entry(1)).is_err());
        assert!(q.is_empty());
    }

    #[test]
    fn test_drain_preserves_order() {
        let mut q = AsapQueue::new(None);
        for seq in 0..5 {
            q.try_push(entry(seq)).unwrap();
        }
        let mut out = Vec::new();
        q.drain_into(&mut out);
        assert!(q.is_empty());
        let seqs: Vec<_> = out.iter().map(|e| e.seq()).collect();
        assert_eq!(seqs, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_remove_first_matching() {
        let mut q = AsapQueue::new(None);
        for seq in 0..4 {
            q.try_push(entry(seq)).unwrap();
        }

        let removed = q.remove_first_matching(|e| e.seq() % 2 == 1).unwrap();
        assert_eq!(removed.seq(), 1);
        assert_eq!(q.len(), 3);

        assert!(q.remove_first_matching(|e| e.seq() == 99).is_none());

        // Remaining order is intact
        let seqs: Vec<_> = std::iter::from_fn(|| q.pop_front().map(|e| e.seq())).collect();
        assert_eq!(seqs, vec![0, 2, 3]);
    }
}
