//! Schedule envelope and its kind/state enums

use core::fmt;

use crate::cancellable::Cancellable;

/// Which queue a schedule belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ScheduleKind {
    /// Run as soon as a worker is free, independent of the clock
    Asap = 0,

    /// Run no earlier than a theoretical time on the scheduler's clock
    Timed = 1,
}

/// Lifecycle state of a schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ScheduleState {
    /// Accepted, sitting in a queue
    Pending = 0,

    /// Popped by a worker, run action in progress
    Running = 1,

    /// Run action completed
    Done = 2,

    /// On-cancel action invoked instead of run
    Cancelled = 3,
}

impl ScheduleState {
    /// Check whether no further transition is possible
    #[inline]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, ScheduleState::Done | ScheduleState::Cancelled)
    }
}

impl fmt::Display for ScheduleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduleState::Pending => write!(f, "PENDING"),
            ScheduleState::Running => write!(f, "RUNNING"),
            ScheduleState::Done => write!(f, "DONE"),
            ScheduleState::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// Envelope around one accepted task.
///
/// Owns the task exclusively: whichever queue holds the entry owns it,
/// popping transfers it to the consuming worker, and `run`/`cancel`/
/// `take_task` consume it. The sequence number is assigned at acceptance,
/// monotonically over both queues, and breaks ties between timed entries
/// sharing a theoretical time.
pub struct SchedEntry {
    task: Box<dyn Cancellable>,
    kind: ScheduleKind,
    /// Meaningful only for `Timed` entries
    theoretical_ns: i64,
    seq: u64,
    state: ScheduleState,
}

impl SchedEntry {
    /// Wrap a task for the ASAP queue
    pub fn asap(task: Box<dyn Cancellable>, seq: u64) -> Self {
        Self {
            task,
            kind: ScheduleKind::Asap,
            theoretical_ns: 0,
            seq,
            state: ScheduleState::Pending,
        }
    }

    /// Wrap a task for the timed queue at the given theoretical time
    pub fn timed(task: Box<dyn Cancellable>, theoretical_ns: i64, seq: u64) -> Self {
        Self {
            task,
            kind: ScheduleKind::Timed,
            theoretical_ns,
            seq,
            state: ScheduleState::Pending,
        }
    }

    #[inline]
    pub fn kind(&self) -> ScheduleKind {
        self.kind
    }

    #[inline]
    pub fn theoretical_time_ns(&self) -> i64 {
        self.theoretical_ns
    }

    #[inline]
    pub fn seq(&self) -> u64 {
        self.seq
    }

    #[inline]
    pub fn state(&self) -> ScheduleState {
        self.state
    }

    /// Transition to RUNNING; called by the popping worker before the
    /// queue lock is released
    pub fn mark_running(&mut self) {
        debug_assert_eq!(self.state, ScheduleState::Pending);
        self.state = ScheduleState::Running;
    }

    /// Execute the run action (terminal)
    pub fn run(mut self) {
        debug_assert_eq!(self.state, ScheduleState::Running);
        self.state = ScheduleState::Done;
        self.task.run();
    }

    /// Execute the on-cancel action (terminal)
    pub fn cancel(mut self) {
        debug_assert!(!self.state.is_terminal());
        self.state = ScheduleState::Cancelled;
        self.task.on_cancel();
    }

    /// Surrender the task without invoking either hook (drain)
    pub fn take_task(self) -> Box<dyn Cancellable> {
        self.task
    }
}

impl fmt::Debug for SchedEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchedEntry")
            .field("kind", &self.kind)
            .field("theoretical_ns", &self.theoretical_ns)
            .field("seq", &self.seq)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_state_terminality() {
        assert!(!ScheduleState::Pending.is_terminal());
        assert!(!ScheduleState::Running.is_terminal());
        assert!(ScheduleState::Done.is_terminal());
        assert!(ScheduleState::Cancelled.is_terminal());
    }

    #[test]
    fn test_run_consumes() {
        let ran = Arc::new(AtomicUsize::new(0));
        let r = ran.clone();
        let mut entry = SchedEntry::asap(
            Box::new(move || {
                r.fetch_add(1, Ordering::SeqCst);
            }),
            7,
        );
        assert_eq!(entry.kind(), ScheduleKind::Asap);
        assert_eq!(entry.seq(), 7);
        assert_eq!(entry.state(), ScheduleState::Pending);

        entry.mark_running();
        entry.run();
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_cancel_from_pending() {
        let cancelled = Arc::new(AtomicUsize::new(0));
        let c = cancelled.clone();
        let entry = SchedEntry::timed(
            Box::new(crate::cancellable::FnTask::new(
                || {},
                move || {
                    c.fetch_add(1, Ordering::SeqCst);
                },
            )),
            1_000,
            1,
        );
        assert_eq!(entry.theoretical_time_ns(), 1_000);
        entry.cancel();
        assert_eq!(cancelled.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_take_task_skips_hooks() {
        let touched = Arc::new(AtomicUsize::new(0));
        let (t1, t2) = (touched.clone(), touched.clone());
        let entry = SchedEntry::asap(
            Box::new(crate::cancellable::FnTask::new(
                move || {
                    t1.fetch_add(1, Ordering::SeqCst);
                },
                move || {
                    t2.fetch_add(1, Ordering::SeqCst);
                },
            )),
            0,
        );
        let task = entry.take_task();
        assert_eq!(touched.load(Ordering::SeqCst), 0);

        // The drained task is still runnable by its new owner
        task.run();
        assert_eq!(touched.load(Ordering::SeqCst), 1);
    }
}
