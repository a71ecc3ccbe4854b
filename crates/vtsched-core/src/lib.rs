//! # vtsched-core
//!
//! Core types for the vtsched virtual-time scheduler.
//!
//! This crate is platform-agnostic and contains no thread or signal code.
//! The scheduler itself (worker pool, process helper, interruption) lives
//! in `vtsched-runtime`.
//!
//! ## Modules
//!
//! - `clock` - Clock contract and listener interface
//! - `clocks` - Stock clock implementations (system, controllable)
//! - `cancellable` - Task contract with run and on-cancel hooks
//! - `entry` - Schedule envelope, kind and state enums
//! - `queue` - ASAP (FIFO) and timed (priority) queues
//! - `flags` - Accepting/processing/shutdown scheduler flags
//! - `error` - Error types
//! - `time` - Nanosecond arithmetic helpers
//! - `env` - Environment variable utilities

pub mod cancellable;
pub mod clock;
pub mod clocks;
pub mod entry;
pub mod env;
pub mod error;
pub mod flags;
pub mod queue;
pub mod time;

// Re-exports for convenience
pub use cancellable::{Cancellable, FnTask};
pub use clock::{Clock, ClockListener, ClockSnapshot};
pub use clocks::{ControllableClock, SystemClock};
pub use entry::{SchedEntry, ScheduleKind, ScheduleState};
pub use error::{SchedError, SchedResult};
pub use flags::SchedFlags;
pub use queue::{AsapQueue, TimedPop, TimedQueue};
