//! Flag-only interruption backend for non-unix platforms
//!
//! No thread-directed signal exists here; the raiser's condvar
//! notification is the only wake-up, which covers the scheduler's own
//! waits (the only waits it controls).

#[derive(Debug, Clone, Copy)]
pub struct ThreadId;

pub fn install_handler_once() {}

pub fn current_thread_id() -> ThreadId {
    ThreadId
}

pub fn signal_thread(_thread: &ThreadId) {}
