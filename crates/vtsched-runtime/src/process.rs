//! Repeating-process helper
//!
//! Turns a repetitive state machine into a sequence of timed
//! submissions: `on_begin` once per cycle, then `process` at each tick
//! (which names the next tick's theoretical time), then `on_end` when
//! the cycle terminates - by the hooks returning [`ProcessNext::Stop`],
//! by [`Process::stop`], or by the scheduler cancelling the pending
//! tick.
//!
//! Hook rules enforced here:
//! - hooks of one process instance never run concurrently;
//! - a panicking `on_begin` aborts the cycle before `process`; a later
//!   `start` begins a fresh cycle;
//! - after a panicking `process`, `on_end` still runs, and the first
//!   panic reaches the uncaught handler before any panic from `on_end`;
//! - after `on_end`, the next hook is `on_begin`.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, Weak};

use vtsched_core::cancellable::Cancellable;
use vtsched_core::time::saturating_add_ns;

use crate::scheduler::Scheduler;

/// What `process` wants next
pub enum ProcessNext {
    /// Tick again at this theoretical time
    AtNs(i64),

    /// Tick again this many nanoseconds of clock time from now
    AfterNs(i64),

    /// Terminate the cycle; `on_end` follows
    Stop,
}

/// Control state of a process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Stopped,
    Started,
    /// Termination requested; `on_end` runs at the next tick
    PendingStop,
}

/// User hooks driven by the process
pub trait ProcessHooks: Send + 'static {
    /// Start of a cycle, before the first `process` call
    fn on_begin(&mut self) {}

    /// One tick. `theoretical_ns` is the time this tick was scheduled
    /// for, `actual_ns` the clock time when it actually started.
    fn process(&mut self, theoretical_ns: i64, actual_ns: i64) -> ProcessNext;

    /// End of a cycle
    fn on_end(&mut self) {}
}

struct ProcState {
    state: ProcessState,
    /// `on_begin` has completed for the current cycle
    begun: bool,
    /// A tick is queued or executing
    tick_pending: bool,
}

struct ProcInner<H> {
    scheduler: Arc<Scheduler>,
    /// Held across every hook invocation; serializes them per instance
    hooks: Mutex<H>,
    state: Mutex<ProcState>,
}

/// Handle to a repeating process on a scheduler.
///
/// Dropping the handle abandons the cycle: a still-queued tick does
/// nothing when it fires, and `on_end` is not called.
pub struct Process<H: ProcessHooks> {
    inner: Arc<ProcInner<H>>,
}

impl<H: ProcessHooks> Process<H> {
    pub fn new(scheduler: Arc<Scheduler>, hooks: H) -> Self {
        Self {
            inner: Arc::new(ProcInner {
                scheduler,
                hooks: Mutex::new(hooks),
                state: Mutex::new(ProcState {
                    state: ProcessState::Stopped,
                    begun: false,
                    tick_pending: false,
                }),
            }),
        }
    }

    pub fn state(&self) -> ProcessState {
        self.inner.state.lock().unwrap().state
    }

    /// Begin a cycle with the first tick at the current clock time.
    ///
    /// Idempotent from `Started`; from `PendingStop` the stop request is
    /// withdrawn and the cycle continues.
    pub fn start(&self) {
        self.start_common(0);
    }

    /// As [`start`](Self::start), with the first tick `delay_ns` of
    /// clock time from now
    pub fn start_after_ns(&self, delay_ns: i64) {
        self.start_common(delay_ns);
    }

    fn start_common(&self, delay_ns: i64) {
        {
            let mut st = self.inner.state.lock().unwrap();
            match st.state {
                ProcessState::Started => return,
                ProcessState::PendingStop => {
                    st.state = ProcessState::Started;
                    return;
                }
                ProcessState::Stopped => {
                    st.state = ProcessState::Started;
                    st.begun = false;
                    st.tick_pending = true;
                }
            }
        }
        let first_ns = saturating_add_ns(self.inner.scheduler.clock().time_ns(), delay_ns);
        submit_tick(&self.inner, first_ns);
    }

    /// Request termination. `on_end` runs when the next scheduled tick
    /// is reached, or immediately if no tick is in flight. Idempotent
    /// from `Stopped` and `PendingStop`.
    pub fn stop(&self) {
        let end_now = {
            let mut st = self.inner.state.lock().unwrap();
            match st.state {
                ProcessState::Stopped | ProcessState::PendingStop => return,
                ProcessState::Started => {
                    if st.tick_pending {
                        st.state = ProcessState::PendingStop;
                        false
                    } else {
                        let begun = st.begun;
                        st.begun = false;
                        st.state = ProcessState::Stopped;
                        begun
                    }
                }
            }
        };
        if end_now {
            self.inner.hooks.lock().unwrap().on_end();
        }
    }
}

fn submit_tick<H: ProcessHooks>(inner: &Arc<ProcInner<H>>, theoretical_ns: i64) {
    let tick = Tick {
        inner: Arc::downgrade(inner),
        theoretical_ns,
    };
    // Rejection invokes the tick's on-cancel synchronously, which ends
    // the cycle; nothing more to do here
    let _ = inner.scheduler.execute_at_ns(tick, theoretical_ns);
}

/// One scheduled tick of a process
struct Tick<H> {
    inner: Weak<ProcInner<H>>,
    theoretical_ns: i64,
}

impl<H: ProcessHooks> Cancellable for Tick<H> {
    fn run(self: Box<Self>) {
        let Some(inner) = self.inner.upgrade() else {
            return;
        };
        let mut hooks = inner.hooks.lock().unwrap();

        // Gate on the control state
        let first = {
            let mut st = inner.state.lock().unwrap();
            match st.state {
                ProcessState::Stopped => {
                    st.tick_pending = false;
                    return;
                }
                ProcessState::PendingStop => {
                    let begun = st.begun;
                    st.begun = false;
                    st.tick_pending = false;
                    st.state = ProcessState::Stopped;
                    drop(st);
                    if begun {
                        hooks.on_end();
                    }
                    return;
                }
                ProcessState::Started => !st.begun,
            }
        };

        if first {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| hooks.on_begin())) {
                // Cycle aborted before its first process call; a later
                // start may call on_begin again
                let mut st = inner.state.lock().unwrap();
                st.begun = false;
                st.tick_pending = false;
                st.state = ProcessState::Stopped;
                drop(st);
                drop(hooks);
                panic::resume_unwind(payload);
            }
            inner.state.lock().unwrap().begun = true;
        }

        let actual_ns = inner.scheduler.clock().time_ns();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            hooks.process(self.theoretical_ns, actual_ns)
        }));

        match outcome {
            Ok(ProcessNext::Stop) => {
                end_cycle(&inner, &mut hooks);
            }
            Ok(next) => {
                let next_ns = match next {
                    ProcessNext::AtNs(t) => t,
                    ProcessNext::AfterNs(d) => {
                        saturating_add_ns(inner.scheduler.clock().time_ns(), d)
                    }
                    ProcessNext::Stop => unreachable!(),
                };
                // A stop may have arrived while process ran
                let reschedule = {
                    let mut st = inner.state.lock().unwrap();
                    match st.state {
                        ProcessState::Started => true,
                        _ => {
                            st.begun = false;
                            st.tick_pending = false;
                            st.state = ProcessState::Stopped;
                            false
                        }
                    }
                };
                if reschedule {
                    drop(hooks);
                    submit_tick(&inner, next_ns);
                } else {
                    hooks.on_end();
                }
            }
            Err(payload) => {
                // The process failure reaches the handler first, so a
                // failing on_end cannot shadow it
                (inner.scheduler.uncaught_handler())(payload);
                end_cycle(&inner, &mut hooks);
            }
        }
    }

    fn on_cancel(self: Box<Self>) {
        let Some(inner) = self.inner.upgrade() else {
            return;
        };
        let mut hooks = inner.hooks.lock().unwrap();
        let begun = {
            let mut st = inner.state.lock().unwrap();
            let begun = st.begun;
            st.begun = false;
            st.tick_pending = false;
            st.state = ProcessState::Stopped;
            begun
        };
        if begun {
            hooks.on_end();
        }
    }
}

/// Reset to Stopped and run `on_end` (the cycle had begun if a tick ran)
fn end_cycle<H: ProcessHooks>(inner: &Arc<ProcInner<H>>, hooks: &mut H) {
    {
        let mut st = inner.state.lock().unwrap();
        st.begun = false;
        st.tick_pending = false;
        st.state = ProcessState::Stopped;
    }
    hooks.on_end();
}
