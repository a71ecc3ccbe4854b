//! Scheduler facade and shared state
//!
//! One `Scheduler` value owns both queues, the control flags, and the
//! worker pool. Workers hold a reference-counted handle to the same
//! interior; that handle is the only cycle participant, so dropping the
//! facade (plus shutdown) tears everything down.
//!
//! Submissions, controls, getters, and bulk operations all act on a
//! single mutex-protected core, with one condvar carrying every wake
//! source: submissions, control changes, clock notifications, shutdown,
//! and interruption.

use std::any::Any;
use std::sync::{Arc, Condvar, Mutex, Weak};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use vtsched_core::cancellable::Cancellable;
use vtsched_core::clock::{Clock, ClockListener};
use vtsched_core::entry::SchedEntry;
use vtsched_core::error::{SchedError, SchedResult};
use vtsched_core::flags::SchedFlags;
use vtsched_core::queue::{AsapQueue, TimedQueue};
use vtsched_core::time::{ns_to_duration, s_to_ns_saturating, saturating_add_ns};

use crate::config::SchedulerConfig;
use crate::interrupt::{self, InterruptHandle};
use crate::thread_factory::{StdThreadFactory, ThreadFactory};
use crate::worker;

// ============================================================================
// Submission outcome
// ============================================================================

/// Why a submission was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The scheduler has been shut down
    Shutdown,

    /// Acceptance is currently off
    NotAccepting,

    /// The target queue is at capacity
    QueueFull,
}

/// Result of a submission entry point.
///
/// On `Rejected` the task's on-cancel hook has already run, synchronously
/// on the submitting thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "a rejected submission means the task was cancelled"]
pub enum SubmitOutcome {
    Accepted,
    Rejected(RejectReason),
}

impl SubmitOutcome {
    #[inline]
    pub fn is_accepted(&self) -> bool {
        matches!(self, SubmitOutcome::Accepted)
    }
}

// ============================================================================
// Uncaught-exception handler
// ============================================================================

/// Payload of a panic that escaped a user task or hook
pub type PanicPayload = Box<dyn Any + Send + 'static>;

/// Callback receiving panics that escape user run/on-cancel actions and
/// process hooks. The worker that caught the panic stays alive.
pub type UncaughtHandler = Arc<dyn Fn(PanicPayload) + Send + Sync>;

/// Best-effort text of a panic payload, for logging
pub fn panic_message(payload: &PanicPayload) -> &str {
    payload
        .downcast_ref::<&'static str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

fn default_uncaught_handler() -> UncaughtHandler {
    Arc::new(|payload: PanicPayload| {
        log::error!("uncaught task failure: {}", panic_message(&payload));
    })
}

// ============================================================================
// Shared state
// ============================================================================

/// Queue and worker-count state, all under the scheduler's one lock
pub(crate) struct Core {
    pub(crate) asap: AsapQueue,
    pub(crate) timed: TimedQueue,
    /// Worker threads alive (includes the caller in thread-less mode
    /// while it is working)
    pub(crate) running_workers: usize,
    /// Workers currently executing a run action
    pub(crate) working_workers: usize,
    /// Next sequence number; assigned only on acceptance so the sequence
    /// stays dense
    pub(crate) next_seq: u64,
}

/// Interior shared between the facade and its workers
pub(crate) struct Shared {
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) flags: SchedFlags,
    pub(crate) core: Mutex<Core>,
    pub(crate) condvar: Condvar,
    pub(crate) max_system_wait: Duration,
    pub(crate) uncaught: UncaughtHandler,
    pub(crate) interrupts: Mutex<Vec<InterruptHandle>>,
}

/// Clock listener that only pokes the scheduler's condvar.
///
/// Holds a weak reference so a registered listener cannot keep a dropped
/// scheduler alive through its clock.
struct SchedulerWaker {
    shared: Weak<Shared>,
}

impl ClockListener for SchedulerWaker {
    fn on_clock_modified(&self) {
        if let Some(shared) = self.shared.upgrade() {
            // Taking the lock orders this wake after any worker that is
            // deciding to sleep, so the notification cannot be lost
            drop(shared.core.lock().unwrap());
            shared.condvar.notify_all();
        }
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`Scheduler`], for the parts that are not plain config
/// data: the thread factory and the uncaught-exception handler.
pub struct SchedulerBuilder {
    clock: Arc<dyn Clock>,
    config: SchedulerConfig,
    thread_factory: Arc<dyn ThreadFactory>,
    uncaught: UncaughtHandler,
}

impl SchedulerBuilder {
    fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            config: SchedulerConfig::new(),
            thread_factory: Arc::new(StdThreadFactory),
            uncaught: default_uncaught_handler(),
        }
    }

    pub fn config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn thread_factory(mut self, factory: Arc<dyn ThreadFactory>) -> Self {
        self.thread_factory = factory;
        self
    }

    pub fn uncaught_exception_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(PanicPayload) + Send + Sync + 'static,
    {
        self.uncaught = Arc::new(handler);
        self
    }

    pub fn build(self) -> SchedResult<Scheduler> {
        self.config.validate()?;
        let config = self.config;

        let shared = Arc::new(Shared {
            clock: self.clock.clone(),
            flags: SchedFlags::new(),
            core: Mutex::new(Core {
                asap: AsapQueue::new(config.asap_queue_capacity),
                timed: TimedQueue::new(config.timed_queue_capacity),
                running_workers: config.nbr_of_threads,
                working_workers: 0,
                next_seq: 0,
            }),
            condvar: Condvar::new(),
            max_system_wait: config.max_system_wait,
            uncaught: self.uncaught,
            interrupts: Mutex::new(Vec::new()),
        });

        // Listenable clocks wake sleeping workers on every mutation;
        // otherwise workers re-evaluate at max_system_wait intervals
        let waker: Arc<dyn ClockListener> = Arc::new(SchedulerWaker {
            shared: Arc::downgrade(&shared),
        });
        let clock_listener = if self.clock.add_listener(waker.clone()) {
            Some(waker)
        } else {
            None
        };

        let mut handles = Vec::with_capacity(config.nbr_of_threads);
        for i in 0..config.nbr_of_threads {
            let name = format!("{}-{}", config.thread_name_prefix, i);
            let worker_shared = shared.clone();
            let spawned = self.thread_factory.spawn(
                name,
                config.stack_size,
                Box::new(move || {
                    let _identity = worker::WorkerIdentity::enter(&worker_shared);
                    worker::worker_loop(&worker_shared, true);
                }),
            );
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(err) => {
                    // Account for every thread that will never start, then
                    // shut the already-started ones down
                    {
                        let mut core = shared.core.lock().unwrap();
                        core.running_workers -= config.nbr_of_threads - i;
                    }
                    shared.flags.set_shutdown();
                    drop(shared.core.lock().unwrap());
                    shared.condvar.notify_all();
                    if let Some(listener) = &clock_listener {
                        self.clock.remove_listener(listener);
                    }
                    return Err(SchedError::SpawnFailed(err.to_string()));
                }
            }
        }

        Ok(Scheduler {
            shared,
            handles: Mutex::new(handles),
            clock_listener,
            nbr_of_threads: config.nbr_of_threads,
            daemon: config.daemon,
        })
    }
}

// ============================================================================
// Scheduler
// ============================================================================

/// Virtual-clock-aware task scheduler.
///
/// Maintains an ASAP queue and a time-ordered queue shared by a fixed
/// pool of worker threads (`nbr_of_threads == 0` selects thread-less
/// mode, where the caller works via
/// [`start_and_work_in_current_thread`](Self::start_and_work_in_current_thread)).
/// Scheduled times are interpreted through the clock supplied at
/// construction.
///
/// Due timed schedules outrank ASAP schedules, which outrank timed
/// schedules whose deadline is still ahead. A sustained stream of due
/// timed work can therefore starve ASAP work; there is no fairness bound
/// between the two queues.
///
/// A new scheduler is accepting and processing. All controls are
/// idempotent, and `shutdown` is one-way.
pub struct Scheduler {
    shared: Arc<Shared>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    clock_listener: Option<Arc<dyn ClockListener>>,
    nbr_of_threads: usize,
    daemon: bool,
}

impl Scheduler {
    /// Builder with custom thread factory or uncaught-exception handler
    pub fn builder(clock: Arc<dyn Clock>) -> SchedulerBuilder {
        SchedulerBuilder::new(clock)
    }

    /// Scheduler with the default factory and uncaught handler
    pub fn new(clock: Arc<dyn Clock>, config: SchedulerConfig) -> SchedResult<Self> {
        Self::builder(clock).config(config).build()
    }

    /// The clock supplied at construction
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.shared.clock
    }

    pub(crate) fn uncaught_handler(&self) -> &UncaughtHandler {
        &self.shared.uncaught
    }

    // ------------------------------------------------------------------
    // Submission
    // ------------------------------------------------------------------

    /// Submit a task to run as soon as a worker is free.
    ///
    /// On rejection (shutdown, not accepting, queue full) the task's
    /// on-cancel hook runs synchronously before this returns.
    pub fn execute<T>(&self, task: T) -> SubmitOutcome
    where
        T: Cancellable + 'static,
    {
        self.submit_asap(Box::new(task))
    }

    /// Submit a task to run no earlier than `theoretical_ns` on the
    /// scheduler's clock
    pub fn execute_at_ns<T>(&self, task: T, theoretical_ns: i64) -> SubmitOutcome
    where
        T: Cancellable + 'static,
    {
        self.submit_timed(Box::new(task), theoretical_ns)
    }

    /// Submit a task to run after `delay_ns` of clock time from now.
    ///
    /// The deadline saturates near the `i64` extremes instead of
    /// wrapping; negative delays count as due immediately.
    pub fn execute_after_ns<T>(&self, task: T, delay_ns: i64) -> SubmitOutcome
    where
        T: Cancellable + 'static,
    {
        let theoretical_ns = saturating_add_ns(self.shared.clock.time_ns(), delay_ns);
        self.submit_timed(Box::new(task), theoretical_ns)
    }

    /// Submit a task to run after `delay_s` seconds of clock time.
    ///
    /// NaN is an invalid argument: the task is dropped without either
    /// hook running. Infinite and overflowing delays saturate.
    pub fn execute_after_s<T>(&self, task: T, delay_s: f64) -> SchedResult<SubmitOutcome>
    where
        T: Cancellable + 'static,
    {
        let delay_ns = s_to_ns_saturating(delay_s)
            .ok_or(SchedError::InvalidArgument("delay seconds must not be NaN"))?;
        Ok(self.execute_after_ns(task, delay_ns))
    }

    fn submit_asap(&self, task: Box<dyn Cancellable>) -> SubmitOutcome {
        let mut core = self.shared.core.lock().unwrap();
        if let Some(reason) = self.refusal_reason() {
            drop(core);
            task.on_cancel();
            return SubmitOutcome::Rejected(reason);
        }
        let entry = SchedEntry::asap(task, core.next_seq);
        match core.asap.try_push(entry) {
            Ok(()) => {
                core.next_seq += 1;
                drop(core);
                self.shared.condvar.notify_one();
                SubmitOutcome::Accepted
            }
            Err(entry) => {
                drop(core);
                entry.cancel();
                SubmitOutcome::Rejected(RejectReason::QueueFull)
            }
        }
    }

    fn submit_timed(&self, task: Box<dyn Cancellable>, theoretical_ns: i64) -> SubmitOutcome {
        let mut core = self.shared.core.lock().unwrap();
        if let Some(reason) = self.refusal_reason() {
            drop(core);
            task.on_cancel();
            return SubmitOutcome::Rejected(reason);
        }
        let entry = SchedEntry::timed(task, theoretical_ns, core.next_seq);
        match core.timed.try_push(entry) {
            Ok(()) => {
                core.next_seq += 1;
                drop(core);
                self.shared.condvar.notify_one();
                SubmitOutcome::Accepted
            }
            Err(entry) => {
                drop(core);
                entry.cancel();
                SubmitOutcome::Rejected(RejectReason::QueueFull)
            }
        }
    }

    fn refusal_reason(&self) -> Option<RejectReason> {
        if self.shared.flags.is_shutdown() {
            Some(RejectReason::Shutdown)
        } else if !self.shared.flags.is_accepting() {
            Some(RejectReason::NotAccepting)
        } else {
            None
        }
    }

    // ------------------------------------------------------------------
    // Controls
    // ------------------------------------------------------------------

    /// Turn acceptance and processing on
    pub fn start(&self) {
        self.shared.flags.set_accepting(true);
        self.shared.flags.set_processing(true);
        self.wake_all();
    }

    /// Turn acceptance and processing off. In-flight runs are not
    /// preempted.
    pub fn stop(&self) {
        self.shared.flags.set_accepting(false);
        self.shared.flags.set_processing(false);
        self.wake_all();
    }

    pub fn start_accepting(&self) {
        self.shared.flags.set_accepting(true);
        self.wake_all();
    }

    pub fn stop_accepting(&self) {
        self.shared.flags.set_accepting(false);
        self.wake_all();
    }

    pub fn start_processing(&self) {
        self.shared.flags.set_processing(true);
        self.wake_all();
    }

    pub fn stop_processing(&self) {
        self.shared.flags.set_processing(false);
        self.wake_all();
    }

    /// One-way shutdown: every future submission is rejected, and the
    /// workers terminate once both queues are empty. Pending entries
    /// still run while `processing` holds; entries that can no longer
    /// run (future-dated timed entries once nothing else remains, or
    /// anything while `processing` is off) are cancelled by the workers.
    pub fn shutdown(&self) {
        if self.shared.flags.set_shutdown() {
            log::debug!("scheduler shutdown requested");
        }
        self.wake_all();
    }

    /// `shutdown` plus cancellation of everything still pending, on the
    /// calling thread. With `interrupt_working` the workers also receive
    /// an interrupt, observable by whatever they are running.
    pub fn shutdown_now(&self, interrupt_working: bool) {
        self.shutdown();
        self.cancel_pending_schedules();
        if interrupt_working {
            self.interrupt_workers();
        }
    }

    fn wake_all(&self) {
        // The lock orders the wake after any worker deciding to sleep
        drop(self.shared.core.lock().unwrap());
        self.shared.condvar.notify_all();
    }

    // ------------------------------------------------------------------
    // Observation
    // ------------------------------------------------------------------

    pub fn is_accepting(&self) -> bool {
        self.shared.flags.is_accepting()
    }

    pub fn is_processing(&self) -> bool {
        self.shared.flags.is_processing()
    }

    pub fn is_shutdown(&self) -> bool {
        self.shared.flags.is_shutdown()
    }

    pub fn nbr_of_pending_schedules(&self) -> usize {
        let core = self.shared.core.lock().unwrap();
        core.asap.len() + core.timed.len()
    }

    pub fn nbr_of_pending_asap_schedules(&self) -> usize {
        self.shared.core.lock().unwrap().asap.len()
    }

    pub fn nbr_of_pending_timed_schedules(&self) -> usize {
        self.shared.core.lock().unwrap().timed.len()
    }

    pub fn nbr_of_running_workers(&self) -> usize {
        self.shared.core.lock().unwrap().running_workers
    }

    pub fn nbr_of_working_workers(&self) -> usize {
        self.shared.core.lock().unwrap().working_workers
    }

    pub fn nbr_of_idle_workers(&self) -> usize {
        let core = self.shared.core.lock().unwrap();
        core.running_workers - core.working_workers
    }

    // ------------------------------------------------------------------
    // Worker-thread identity
    // ------------------------------------------------------------------

    /// Whether the calling thread is one of this scheduler's workers.
    ///
    /// In thread-less mode, the thread inside
    /// `start_and_work_in_current_thread` is the worker.
    pub fn is_worker_thread(&self) -> bool {
        worker::current_worker_tag() == worker::scheduler_tag(&self.shared)
    }

    pub fn check_is_worker_thread(&self) -> SchedResult<()> {
        if self.is_worker_thread() {
            Ok(())
        } else {
            Err(SchedError::ConcurrentModification(
                "must be called from a worker thread",
            ))
        }
    }

    pub fn check_is_not_worker_thread(&self) -> SchedResult<()> {
        if self.is_worker_thread() {
            Err(SchedError::IllegalState(
                "must not be called from a worker thread",
            ))
        } else {
            Ok(())
        }
    }

    // ------------------------------------------------------------------
    // Bulk cancel and drain
    // ------------------------------------------------------------------

    /// Cancel every pending ASAP schedule in FIFO order, invoking each
    /// on-cancel on the calling thread.
    ///
    /// If an on-cancel panics, the panic surfaces to the caller and the
    /// remaining entries stay queued; a repeated call resumes where this
    /// one stopped.
    pub fn cancel_pending_asap_schedules(&self) {
        loop {
            let entry = self.shared.core.lock().unwrap().asap.pop_front();
            match entry {
                Some(entry) => entry.cancel(),
                None => break,
            }
        }
    }

    /// Cancel every pending timed schedule in priority order; panic
    /// semantics as for [`cancel_pending_asap_schedules`](Self::cancel_pending_asap_schedules)
    pub fn cancel_pending_timed_schedules(&self) {
        loop {
            let entry = self.shared.core.lock().unwrap().timed.pop_min();
            match entry {
                Some(entry) => entry.cancel(),
                None => break,
            }
        }
    }

    /// Cancel every pending schedule, ASAP queue first
    pub fn cancel_pending_schedules(&self) {
        self.cancel_pending_asap_schedules();
        self.cancel_pending_timed_schedules();
    }

    /// Move the pending ASAP tasks into `out` without invoking on-cancel;
    /// ownership is surrendered to the caller
    pub fn drain_pending_asap_runnables_into(&self, out: &mut Vec<Box<dyn Cancellable>>) {
        let mut entries = Vec::new();
        self.shared.core.lock().unwrap().asap.drain_into(&mut entries);
        out.extend(entries.into_iter().map(SchedEntry::take_task));
    }

    /// Timed-queue counterpart of
    /// [`drain_pending_asap_runnables_into`](Self::drain_pending_asap_runnables_into),
    /// in priority order
    pub fn drain_pending_timed_runnables_into(&self, out: &mut Vec<Box<dyn Cancellable>>) {
        let mut entries = Vec::new();
        self.shared.core.lock().unwrap().timed.drain_into(&mut entries);
        out.extend(entries.into_iter().map(SchedEntry::take_task));
    }

    // ------------------------------------------------------------------
    // Interruption
    // ------------------------------------------------------------------

    /// Interrupt every worker thread, idle or running.
    ///
    /// Idle workers absorb the interrupt around their own wait and
    /// retry; a worker inside a user run leaves the flag observable to
    /// that run. Workers never die from interruption alone.
    pub fn interrupt_workers(&self) {
        let handles: Vec<InterruptHandle> = self.shared.interrupts.lock().unwrap().clone();
        for handle in &handles {
            handle.interrupt();
        }
        self.wake_all();
    }

    // ------------------------------------------------------------------
    // Waits
    // ------------------------------------------------------------------

    /// Wait until no worker thread is running, up to `timeout_ns` of
    /// wall-clock time. Returns whether the condition held before the
    /// timeout; `Err(Interrupted)` if the calling thread's interrupt
    /// flag is raised while waiting (the flag is cleared).
    pub fn wait_for_no_more_running_worker_system_time_ns(
        &self,
        timeout_ns: i64,
    ) -> SchedResult<bool> {
        let start = Instant::now();
        let timeout = ns_to_duration(timeout_ns);
        let mut core = self.shared.core.lock().unwrap();
        loop {
            if core.running_workers == 0 {
                return Ok(true);
            }
            if interrupt::take_current_interrupt() {
                return Err(SchedError::Interrupted);
            }
            let elapsed = start.elapsed();
            if elapsed >= timeout {
                return Ok(false);
            }
            let (guard, _timeout) = self
                .shared
                .condvar
                .wait_timeout(core, timeout - elapsed)
                .unwrap();
            core = guard;
        }
    }

    /// As [`wait_for_no_more_running_worker_system_time_ns`](Self::wait_for_no_more_running_worker_system_time_ns),
    /// but `timeout_ns` is clock time, scaled by the clock's current
    /// speed. A frozen clock waits without bound; an infinitely fast one
    /// checks once.
    pub fn wait_for_no_more_running_worker_clock_time_ns(
        &self,
        timeout_ns: i64,
    ) -> SchedResult<bool> {
        let speed = self.shared.clock.time_speed();
        let wall_ns = if speed.is_infinite() {
            0
        } else if speed <= 0.0 {
            i64::MAX
        } else {
            let scaled = timeout_ns as f64 / speed;
            if scaled >= i64::MAX as f64 {
                i64::MAX
            } else {
                scaled as i64
            }
        };
        self.wait_for_no_more_running_worker_system_time_ns(wall_ns)
    }

    // ------------------------------------------------------------------
    // Thread-less mode
    // ------------------------------------------------------------------

    /// Run the worker loop on the calling thread until shutdown is set
    /// and both queues are empty, then return.
    ///
    /// Only valid with `nbr_of_threads == 0`; this is the sole way such
    /// a scheduler executes work. A panic from a user task propagates
    /// out of this call, and a subsequent call resumes the remaining
    /// work.
    pub fn start_and_work_in_current_thread(&self) -> SchedResult<()> {
        if self.nbr_of_threads > 0 {
            return Err(SchedError::IllegalState(
                "thread-less work requires nbr_of_threads == 0",
            ));
        }
        self.check_is_not_worker_thread()?;
        self.start();

        {
            let mut core = self.shared.core.lock().unwrap();
            core.running_workers += 1;
        }
        let _identity = worker::WorkerIdentity::enter(&self.shared);
        worker::worker_loop(&self.shared, false);
        Ok(())
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        if let Some(listener) = self.clock_listener.take() {
            self.shared.clock.remove_listener(&listener);
        }
        if !self.daemon {
            // Non-daemon workers do not outlive the scheduler: shut down
            // (workers drain or cancel the remainder) and join them
            self.shutdown();
            let handles = std::mem::take(&mut *self.handles.lock().unwrap());
            for handle in handles {
                let _ = handle.join();
            }
        }
    }
}
