//! Per-thread interruption
//!
//! Workers and other registered threads carry a shared interrupt flag.
//! Raising it wakes the target: on unix a `SIGURG` is also delivered to
//! the thread so blocking syscalls observe `EINTR`; elsewhere only the
//! flag (plus whatever condvar the raiser notifies) does the waking.
//!
//! The scheduler absorbs interrupts around its own condition waits and
//! retries; user tasks observe them through
//! [`current_thread_interrupted`] / [`take_current_interrupt`].
//! A thread never dies from interruption alone.

use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

// Platform-specific signal delivery
cfg_if::cfg_if! {
    if #[cfg(unix)] {
        mod unix;
        use unix as platform;
    } else {
        mod fallback;
        use fallback as platform;
    }
}

thread_local! {
    static CURRENT_FLAG: RefCell<Option<Arc<AtomicBool>>> = const { RefCell::new(None) };
}

/// Handle to interrupt one registered thread.
///
/// Cloning shares the underlying flag.
#[derive(Clone)]
pub struct InterruptHandle {
    flag: Arc<AtomicBool>,
    thread: platform::ThreadId,
}

// Safety: the thread id is an opaque identifier; moving or sharing it
// does not touch the thread it names
unsafe impl Send for InterruptHandle {}
unsafe impl Sync for InterruptHandle {}

impl InterruptHandle {
    /// Raise the target's interrupt flag and poke it awake
    pub fn interrupt(&self) {
        self.flag.store(true, Ordering::Release);
        platform::signal_thread(&self.thread);
    }

    /// Check the flag without clearing it
    pub fn is_interrupted(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    pub(crate) fn flag_arc(&self) -> Arc<AtomicBool> {
        self.flag.clone()
    }

    pub(crate) fn shares_flag(&self, flag: &Arc<AtomicBool>) -> bool {
        Arc::ptr_eq(&self.flag, flag)
    }
}

/// Register the calling thread for interruption and return its handle.
///
/// Replaces any previous registration of this thread.
pub fn register_current_thread() -> InterruptHandle {
    platform::install_handler_once();
    let flag = Arc::new(AtomicBool::new(false));
    CURRENT_FLAG.with(|cell| *cell.borrow_mut() = Some(flag.clone()));
    InterruptHandle {
        flag,
        thread: platform::current_thread_id(),
    }
}

/// Drop the calling thread's registration
pub fn unregister_current_thread() {
    CURRENT_FLAG.with(|cell| *cell.borrow_mut() = None);
}

/// Check the calling thread's interrupt flag without clearing it.
///
/// Always `false` on unregistered threads.
pub fn current_thread_interrupted() -> bool {
    CURRENT_FLAG.with(|cell| {
        cell.borrow()
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Acquire))
    })
}

/// Clear the calling thread's interrupt flag, returning whether it was set
pub fn take_current_interrupt() -> bool {
    CURRENT_FLAG.with(|cell| {
        cell.borrow()
            .as_ref()
            .is_some_and(|flag| flag.swap(false, Ordering::AcqRel))
    })
}
