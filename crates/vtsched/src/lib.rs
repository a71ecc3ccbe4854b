//! # vtsched - virtual-time scheduler
//!
//! A task scheduler whose notion of "when" is a pluggable clock: freeze
//! it, accelerate it, or jump it forward and backward, and the same
//! scheduling code drives simulations, test harnesses, and real-time
//! workloads alike.
//!
//! ## Features
//!
//! - **Two queues**: ASAP (FIFO) and timed (theoretical time, with
//!   submission order breaking ties), shared by a fixed worker pool
//! - **Virtual clocks**: a wall [`SystemClock`], a mutable
//!   [`ControllableClock`] with listener-driven wake-ups, or your own
//!   [`Clock`] implementation
//! - **Well-defined cancellation**: exactly one of `run` / `on_cancel`
//!   per accepted task, under overflow, rejection, bulk cancel, drain,
//!   and shutdown
//! - **Thread-less mode**: zero background threads, the caller works
//! - **Process helper**: begin/end hooks around a self-repeating tick
//!
//! ## Quick start
//!
//! ```ignore
//! use std::sync::Arc;
//! use vtsched::{ControllableClock, Scheduler, SchedulerConfig};
//!
//! let clock = Arc::new(ControllableClock::frozen_at(0));
//! let sched = Scheduler::new(clock.clone(), SchedulerConfig::new().nbr_of_threads(2))?;
//!
//! // Nothing runs: time is frozen
//! sched.execute_at_ns(|| println!("the future arrived"), 1_000_000_000);
//!
//! // Until the simulation says so
//! clock.set_time_ns(1_000_000_000);
//!
//! sched.shutdown();
//! # Ok::<(), vtsched::SchedError>(())
//! ```

pub use vtsched_core::cancellable::{Cancellable, FnTask};
pub use vtsched_core::clock::{Clock, ClockListener, ClockSnapshot};
pub use vtsched_core::clocks::{ControllableClock, SystemClock};
pub use vtsched_core::entry::{ScheduleKind, ScheduleState};
pub use vtsched_core::error::{SchedError, SchedResult};

pub use vtsched_runtime::config::SchedulerConfig;
pub use vtsched_runtime::interrupt;
pub use vtsched_runtime::process::{Process, ProcessHooks, ProcessNext, ProcessState};
pub use vtsched_runtime::scheduler::{
    panic_message, PanicPayload, RejectReason, Scheduler, SchedulerBuilder, SubmitOutcome,
    UncaughtHandler,
};
pub use vtsched_runtime::thread_factory::{StdThreadFactory, ThreadFactory};
