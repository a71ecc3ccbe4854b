//! Worker loop and thread-local worker identity
//!
//! Each worker cooperates on the two queues under the scheduler's lock:
//!
//! 1. If shutdown and both queues are empty, exit.
//! 2. Prefer the timed queue iff its earliest entry is due at the
//!    clock's current time; otherwise take from ASAP.
//! 3. With only a future deadline ahead, sleep for
//!    `(deadline - now) / time_speed`, clamped to `max_system_wait`,
//!    woken by submissions, control changes, clock notifications,
//!    shutdown, or interruption.
//! 4. Run actions execute outside the lock; panics go to the
//!    uncaught-exception handler and the worker lives on.
//!
//! After shutdown, workers keep draining runnable entries while
//! `processing` holds, and cancel entries that can no longer run
//! (future-dated timed entries once nothing else remains, or everything
//! once `processing` is off).

use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, MutexGuard};
use std::time::Duration;

use vtsched_core::clock::ClockSnapshot;
use vtsched_core::entry::SchedEntry;
use vtsched_core::queue::TimedPop;

use crate::interrupt;
use crate::scheduler::{Core, Shared};

/// Positive floor applied to the time speed when converting a virtual
/// wait into a wall wait, so a near-zero speed cannot divide to infinity
const MIN_FORWARD_SPEED: f64 = 1e-9;

pub(crate) const NOT_A_WORKER: usize = 0;

thread_local! {
    static WORKER_OF: Cell<usize> = const { Cell::new(NOT_A_WORKER) };
}

/// Identity tag of a scheduler, for worker-thread checks
#[inline]
pub(crate) fn scheduler_tag(shared: &Arc<Shared>) -> usize {
    Arc::as_ptr(shared) as usize
}

/// Tag of the scheduler this thread is a worker of, or `NOT_A_WORKER`
#[inline]
pub(crate) fn current_worker_tag() -> usize {
    WORKER_OF.with(|cell| cell.get())
}

/// Scoped worker registration: thread-local mark, interrupt handle in the
/// scheduler's table, and running-count decrement on exit (normal or
/// unwinding).
pub(crate) struct WorkerIdentity {
    shared: Arc<Shared>,
    flag: Arc<AtomicBool>,
}

impl WorkerIdentity {
    pub(crate) fn enter(shared: &Arc<Shared>) -> Self {
        WORKER_OF.with(|cell| cell.set(scheduler_tag(shared)));
        let handle = interrupt::register_current_thread();
        let flag = handle.flag_arc();
        shared.interrupts.lock().unwrap().push(handle);
        Self {
            shared: shared.clone(),
            flag,
        }
    }
}

impl Drop for WorkerIdentity {
    fn drop(&mut self) {
        {
            let mut handles = self.shared.interrupts.lock().unwrap();
            if let Some(idx) = handles.iter().position(|h| h.shares_flag(&self.flag)) {
                handles.remove(idx);
            }
        }
        interrupt::unregister_current_thread();
        WORKER_OF.with(|cell| cell.set(NOT_A_WORKER));

        let mut core = self.shared.core.lock().unwrap();
        core.running_workers -= 1;
        drop(core);
        self.shared.condvar.notify_all();
    }
}

/// Main worker loop.
///
/// With `catch_panics`, failures in run/on-cancel actions are delivered
/// to the uncaught-exception handler and the loop continues; without it
/// (thread-less mode) they propagate to the caller.
pub(crate) fn worker_loop(shared: &Arc<Shared>, catch_panics: bool) {
    log::debug!("worker started");
    let mut core = shared.core.lock().unwrap();

    loop {
        let shutdown = shared.flags.is_shutdown();

        if shutdown && core.asap.is_empty() && core.timed.is_empty() {
            break;
        }

        if shutdown && !shared.flags.is_processing() {
            // Nothing will ever run these; cancel in queue order
            let entry = core.asap.pop_front().or_else(|| core.timed.pop_min());
            if let Some(entry) = entry {
                core = cancel_entry(shared, core, entry, catch_panics);
            }
            continue;
        }

        if !shared.flags.is_processing() {
            core = wait_on(shared, core, shared.max_system_wait);
            continue;
        }

        let snap = shared.clock.snapshot();
        let now_ns = if snap.is_instantaneous() {
            // Every deadline counts as elapsed
            i64::MAX
        } else {
            snap.time_ns
        };

        match core.timed.pop_next_ready(now_ns) {
            TimedPop::Ready(entry) => {
                core = run_entry(shared, core, entry, catch_panics);
            }
            timed_miss => {
                if let Some(entry) = core.asap.pop_front() {
                    core = run_entry(shared, core, entry, catch_panics);
                } else {
                    match timed_miss {
                        TimedPop::NotDue { deadline_ns } => {
                            if shutdown {
                                // Shutting down with only future-dated work
                                // left: it will not be waited for
                                if let Some(entry) = core.timed.pop_min() {
                                    core = cancel_entry(shared, core, entry, catch_panics);
                                }
                            } else {
                                let wait =
                                    compute_wait(&snap, deadline_ns, shared.max_system_wait);
                                core = wait_on(shared, core, wait);
                            }
                        }
                        _ => {
                            core = wait_on(shared, core, shared.max_system_wait);
                        }
                    }
                }
            }
        }
    }

    drop(core);
    log::debug!("worker exiting");
}

/// Wall-clock sleep toward a virtual deadline, clamped to `max_wait`
fn compute_wait(snap: &ClockSnapshot, deadline_ns: i64, max_wait: Duration) -> Duration {
    let ahead_ns = deadline_ns.saturating_sub(snap.time_ns);
    if ahead_ns <= 0 {
        return Duration::ZERO;
    }
    let speed = snap.time_speed.max(MIN_FORWARD_SPEED);
    let wall_ns = ahead_ns as f64 / speed;
    let max_ns = max_wait.as_nanos() as f64;
    if wall_ns >= max_ns {
        max_wait
    } else {
        Duration::from_nanos(wall_ns as u64)
    }
}

/// Sleep on the scheduler's condition, absorbing any interrupt aimed at
/// this worker's own wait
fn wait_on<'a>(
    shared: &'a Shared,
    core: MutexGuard<'a, Core>,
    wait: Duration,
) -> MutexGuard<'a, Core> {
    interrupt::take_current_interrupt();
    let (core, _timeout) = shared.condvar.wait_timeout(core, wait).unwrap();
    core
}

/// Restores the working-worker count however the run ends
struct WorkingGuard<'a> {
    shared: &'a Shared,
}

impl Drop for WorkingGuard<'_> {
    fn drop(&mut self) {
        let mut core = self.shared.core.lock().unwrap();
        core.working_workers -= 1;
        drop(core);
        self.shared.condvar.notify_all();
    }
}

/// Execute an entry's run action outside the lock
fn run_entry<'a>(
    shared: &'a Shared,
    mut core: MutexGuard<'a, Core>,
    mut entry: SchedEntry,
    catch_panics: bool,
) -> MutexGuard<'a, Core> {
    entry.mark_running();
    core.working_workers += 1;
    drop(core);

    {
        let _working = WorkingGuard { shared };
        if catch_panics {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| entry.run())) {
                log::warn!("task run panicked; delivering to uncaught handler");
                (shared.uncaught)(payload);
            }
        } else {
            entry.run();
        }
    }

    shared.core.lock().unwrap()
}

/// Invoke an entry's on-cancel action outside the lock
fn cancel_entry<'a>(
    shared: &'a Shared,
    core: MutexGuard<'a, Core>,
    entry: SchedEntry,
    catch_panics: bool,
) -> MutexGuard<'a, Core> {
    drop(core);

    if catch_panics {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| entry.cancel())) {
            log::warn!("on-cancel panicked; delivering to uncaught handler");
            (shared.uncaught)(payload);
        }
    } else {
        entry.cancel();
    }

    shared.core.lock().unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(time_ns: i64, speed: f64) -> ClockSnapshot {
        ClockSnapshot {
            time_ns,
            time_speed: speed,
        }
    }

    #[test]
    fn test_compute_wait_wall_pace() {
        let wait = compute_wait(&snap(0, 1.0), 1_000_000, Duration::from_secs(1));
        assert_eq!(wait, Duration::from_millis(1));
    }

    #[test]
    fn test_compute_wait_scaled_by_speed() {
        // 2x speed halves the wall wait
        let wait = compute_wait(&snap(0, 2.0), 1_000_000, Duration::from_secs(1));
        assert_eq!(wait, Duration::from_nanos(500_000));

        // Slow clock stretches it, clamped by the max
        let wait = compute_wait(&snap(0, 0.5), 1_000_000, Duration::from_secs(1));
        assert_eq!(wait, Duration::from_millis(2));
    }

    #[test]
    fn test_compute_wait_clamped_to_max() {
        let max = Duration::from_millis(50);
        let wait = compute_wait(&snap(0, 1.0), i64::MAX, max);
        assert_eq!(wait, max);
    }

    #[test]
    fn test_compute_wait_frozen_clock_uses_max() {
        let max = Duration::from_millis(10);
        let wait = compute_wait(&snap(0, 0.0), 1_000, max);
        assert_eq!(wait, max);
    }

    #[test]
    fn test_compute_wait_past_deadline_is_zero() {
        let wait = compute_wait(&snap(500, 1.0), 400, Duration::from_secs(1));
        assert_eq!(wait, Duration::ZERO);
    }
}
