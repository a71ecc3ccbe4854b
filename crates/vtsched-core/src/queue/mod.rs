//! Pending-schedule queues
//!
//! Two plain collections, not internally synchronized: the scheduler
//! holds both under its own lock so queue contents, flags, and worker
//! counts mutate as one consistent state.
//!
//! - [`AsapQueue`] - FIFO of schedules with no time constraint
//! - [`TimedQueue`] - min-priority by (theoretical time, sequence number)
//!
//! Both are optionally bounded; a push against a full queue hands the
//! entry back so the caller can cancel it.

mod asap;
mod timed;

pub use asap::AsapQueue;
pub use timed::{TimedPop, TimedQueue};
