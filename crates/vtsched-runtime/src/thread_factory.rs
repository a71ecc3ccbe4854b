//! Worker thread construction

use std::io;
use std::thread::{self, JoinHandle};

/// Constructor for worker threads.
///
/// The default builds named `std::thread` workers; supply your own to
/// pin affinity, adjust priority, or intercept spawning in tests.
pub trait ThreadFactory: Send + Sync {
    /// Spawn a thread running `f`, named `name`, with an optional stack
    /// size in bytes.
    fn spawn(
        &self,
        name: String,
        stack_size: Option<usize>,
        f: Box<dyn FnOnce() + Send + 'static>,
    ) -> io::Result<JoinHandle<()>>;
}

/// Factory built on `std::thread::Builder`
pub struct StdThreadFactory;

impl ThreadFactory for StdThreadFactory {
    fn spawn(
        &self,
        name: String,
        stack_size: Option<usize>,
        f: Box<dyn FnOnce() + Send + 'static>,
    ) -> io::Result<JoinHandle<()>> {
        let mut builder = thread::Builder::new().name(name);
        if let Some(stack_size) = stack_size {
            builder = builder.stack_size(stack_size);
        }
        builder.spawn(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_named() {
        let factory = StdThreadFactory;
        let handle = factory
            .spawn(
                "vtsched-test-0".into(),
                None,
                Box::new(|| {
                    assert_eq!(thread::current().name(), Some("vtsched-test-0"));
                }),
            )
            .unwrap();
        handle.join().unwrap();
    }
}
