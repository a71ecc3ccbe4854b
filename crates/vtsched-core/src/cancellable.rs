//! Task contract
//!
//! Every unit of work submitted to the scheduler is a [`Cancellable`]: a
//! run action plus an on-cancel action. Both consume the task, so the
//! type system enforces that at most one of the two ever executes.
//!
//! Plain closures are tasks with a no-op on-cancel; [`FnTask`] pairs a
//! run closure with a cancel closure for callers that need both hooks.

/// A schedulable task with a cancellation hook.
///
/// Exactly one of `run` or `on_cancel` is invoked for every task the
/// scheduler accepts, and at most once: both take `Box<Self>` by value.
pub trait Cancellable: Send {
    /// Execute the task
    fn run(self: Box<Self>);

    /// Called instead of `run` when the task is cancelled
    /// (queue overflow, non-accepting scheduler, bulk cancel, shutdown)
    fn on_cancel(self: Box<Self>) {}
}

/// Plain tasks: any `FnOnce` closure, with a no-op on-cancel
impl<F> Cancellable for F
where
    F: FnOnce() + Send,
{
    fn run(self: Box<Self>) {
        (*self)()
    }
}

/// Already-boxed tasks stay submittable, so a drained task can be handed
/// back to a scheduler unchanged
impl Cancellable for Box<dyn Cancellable> {
    fn run(self: Box<Self>) {
        (*self).run()
    }

    fn on_cancel(self: Box<Self>) {
        (*self).on_cancel()
    }
}

/// A run closure paired with an on-cancel closure.
///
/// # Example
///
/// ```ignore
/// use vtsched_core::FnTask;
///
/// let task = FnTask::new(
///     || println!("ran"),
///     || println!("cancelled"),
/// );
/// ```
pub struct FnTask<R, C> {
    run: R,
    cancel: C,
}

impl<R, C> FnTask<R, C>
where
    R: FnOnce() + Send,
    C: FnOnce() + Send,
{
    pub fn new(run: R, cancel: C) -> Self {
        Self { run, cancel }
    }
}

impl<R, C> Cancellable for FnTask<R, C>
where
    R: FnOnce() + Send,
    C: FnOnce() + Send,
{
    fn run(self: Box<Self>) {
        (self.run)()
    }

    fn on_cancel(self: Box<Self>) {
        (self.cancel)()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_closure_is_plain_task() {
        let ran = Arc::new(AtomicUsize::new(0));
        let r = ran.clone();
        let task: Box<dyn Cancellable> = Box::new(move || {
            r.fetch_add(1, Ordering::SeqCst);
        });
        task.run();
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_closure_cancel_is_noop() {
        let ran = Arc::new(AtomicUsize::new(0));
        let r = ran.clone();
        let task: Box<dyn Cancellable> = Box::new(move || {
            r.fetch_add(1, Ordering::SeqCst);
        });
        task.on_cancel();
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_fn_task_hooks() {
        let ran = Arc::new(AtomicUsize::new(0));
        let cancelled = Arc::new(AtomicUsize::new(0));

        let (r, c) = (ran.clone(), cancelled.clone());
        let task: Box<dyn Cancellable> = Box::new(FnTask::new(
            move || {
                r.fetch_add(1, Ordering::SeqCst);
            },
            move || {
                c.fetch_add(1, Ordering::SeqCst);
            },
        ));
        task.on_cancel();
        assert_eq!(ran.load(Ordering::SeqCst), 0);
        assert_eq!(cancelled.load(Ordering::SeqCst), 1);
    }
}
