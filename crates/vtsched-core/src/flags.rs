//! Scheduler acceptance/processing/shutdown flags
//!
//! `accepting` and `processing` are independent; all four combinations
//! are valid. `shutdown` is one-way: once set it stays set and overrides
//! acceptance.

use std::sync::atomic::{AtomicBool, Ordering};

/// The scheduler's three control flags.
///
/// A new scheduler starts accepting and processing, so submissions work
/// without an explicit `start`.
pub struct SchedFlags {
    accepting: AtomicBool,
    processing: AtomicBool,
    shutdown: AtomicBool,
}

impl SchedFlags {
    pub fn new() -> Self {
        Self {
            accepting: AtomicBool::new(true),
            processing: AtomicBool::new(true),
            shutdown: AtomicBool::new(false),
        }
    }

    #[inline]
    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::Acquire)
    }

    #[inline]
    pub fn set_accepting(&self, accepting: bool) {
        self.accepting.store(accepting, Ordering::Release);
    }

    #[inline]
    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::Acquire)
    }

    #[inline]
    pub fn set_processing(&self, processing: bool) {
        self.processing.store(processing, Ordering::Release);
    }

    #[inline]
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// One-way shutdown. Returns `true` the first time only.
    #[inline]
    pub fn set_shutdown(&self) -> bool {
        !self.shutdown.swap(true, Ordering::AcqRel)
    }

    /// Whether a submission arriving now must be accepted
    #[inline]
    pub fn must_accept(&self) -> bool {
        self.is_accepting() && !self.is_shutdown()
    }
}

impl Default for SchedFlags {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let flags = SchedFlags::new();
        assert!(flags.is_accepting());
        assert!(flags.is_processing());
        assert!(!flags.is_shutdown());
        assert!(flags.must_accept());
    }

    #[test]
    fn test_flags_are_independent() {
        let flags = SchedFlags::new();

        flags.set_accepting(false);
        assert!(!flags.is_accepting());
        assert!(flags.is_processing());

        flags.set_processing(false);
        flags.set_accepting(true);
        assert!(flags.is_accepting());
        assert!(!flags.is_processing());
        assert!(flags.must_accept());
    }

    #[test]
    fn test_shutdown_is_one_way() {
        let flags = SchedFlags::new();
        assert!(flags.set_shutdown());
        assert!(!flags.set_shutdown());
        assert!(flags.is_shutdown());

        // Shutdown overrides acceptance but leaves the flag untouched
        assert!(flags.is_accepting());
        assert!(!flags.must_accept());
    }
}
