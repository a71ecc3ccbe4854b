//! Unix interruption backend: SIGURG via pthread_kill
//!
//! A process-wide no-op SIGURG handler is installed once, without
//! SA_RESTART, so a signalled thread returns from blocking syscalls
//! with EINTR instead of being killed.

use std::sync::atomic::{AtomicBool, Ordering};

use nix::sys::pthread::{pthread_kill, pthread_self, Pthread};
use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};

pub type ThreadId = Pthread;

static HANDLER_INSTALLED: AtomicBool = AtomicBool::new(false);

extern "C" fn wake_handler(_sig: libc::c_int) {
    // Delivery itself is the point; the interrupt flag carries the state
}

pub fn install_handler_once() {
    if HANDLER_INSTALLED.swap(true, Ordering::SeqCst) {
        return;
    }
    let action = SigAction::new(
        SigHandler::Handler(wake_handler),
        SaFlags::empty(),
        SigSet::empty(),
    );
    if let Err(err) = unsafe { sigaction(Signal::SIGURG, &action) } {
        log::warn!("failed to install SIGURG handler: {}", err);
    }
}

pub fn current_thread_id() -> ThreadId {
    pthread_self()
}

pub fn signal_thread(thread: &ThreadId) {
    // Best-effort: the thread may already have exited
    let _ = pthread_kill(*thread, Signal::SIGURG);
}
