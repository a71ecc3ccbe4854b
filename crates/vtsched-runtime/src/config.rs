//! Scheduler configuration
//!
//! Compile-time defaults with runtime environment overrides.
//!
//! # Configuration priority (highest wins)
//!
//! 1. Builder methods
//! 2. Environment variables (`from_env()`)
//! 3. Library defaults
//!
//! # Example
//!
//! ```rust,ignore
//! use vtsched_runtime::SchedulerConfig;
//! use std::time::Duration;
//!
//! let config = SchedulerConfig::from_env()
//!     .nbr_of_threads(4)
//!     .asap_queue_capacity(Some(10_000))
//!     .max_system_wait(Duration::from_millis(100));
//! ```

use std::time::Duration;

use vtsched_core::env::{env_get, env_get_bool, env_get_opt, env_get_str};
use vtsched_core::error::{SchedError, SchedResult};

/// Compile-time defaults
pub mod defaults {
    use std::time::Duration;

    pub const THREAD_NAME_PREFIX: &str = "vtsched";
    pub const DAEMON: bool = true;
    pub const NBR_OF_THREADS: usize = 1;
    /// Upper bound on any worker sleep between deadline re-evaluations.
    /// This is the wake-up latency floor for frozen or non-listenable
    /// clocks, so tests against such clocks should lower it.
    pub const MAX_SYSTEM_WAIT: Duration = Duration::from_secs(1);
}

/// Scheduler configuration with builder pattern.
///
/// Use `from_env()` to start from the defaults with environment
/// overrides applied, or `new()` for the plain defaults.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Prefix for worker thread names ("{prefix}-{index}")
    pub thread_name_prefix: String,
    /// When false, the scheduler shuts down and joins its workers on drop
    pub daemon: bool,
    /// Pool size; 0 selects thread-less mode
    pub nbr_of_threads: usize,
    /// ASAP queue bound (None = unbounded)
    pub asap_queue_capacity: Option<usize>,
    /// Timed queue bound (None = unbounded)
    pub timed_queue_capacity: Option<usize>,
    /// Upper bound on any worker sleep between re-evaluations
    pub max_system_wait: Duration,
    /// Worker stack size in bytes (None = platform default)
    pub stack_size: Option<usize>,
}

impl SchedulerConfig {
    /// Create config with the plain library defaults (no env override)
    pub fn new() -> Self {
        Self {
            thread_name_prefix: defaults::THREAD_NAME_PREFIX.into(),
            daemon: defaults::DAEMON,
            nbr_of_threads: defaults::NBR_OF_THREADS,
            asap_queue_capacity: None,
            timed_queue_capacity: None,
            max_system_wait: defaults::MAX_SYSTEM_WAIT,
            stack_size: None,
        }
    }

    /// Create config from defaults with environment overrides.
    ///
    /// Environment variables (all optional):
    /// - `VTS_THREAD_NAME_PREFIX` - Worker thread name prefix
    /// - `VTS_DAEMON` - Detach workers from scheduler lifetime (0/1)
    /// - `VTS_NBR_OF_THREADS` - Pool size (0 = thread-less)
    /// - `VTS_ASAP_QUEUE_CAPACITY` - ASAP queue bound
    /// - `VTS_TIMED_QUEUE_CAPACITY` - Timed queue bound
    /// - `VTS_MAX_SYSTEM_WAIT_MS` - Max worker sleep in milliseconds
    /// - `VTS_STACK_SIZE` - Worker stack size in bytes
    pub fn from_env() -> Self {
        Self {
            thread_name_prefix: env_get_str("VTS_THREAD_NAME_PREFIX", defaults::THREAD_NAME_PREFIX),
            daemon: env_get_bool("VTS_DAEMON", defaults::DAEMON),
            nbr_of_threads: env_get("VTS_NBR_OF_THREADS", defaults::NBR_OF_THREADS),
            asap_queue_capacity: env_get_opt("VTS_ASAP_QUEUE_CAPACITY"),
            timed_queue_capacity: env_get_opt("VTS_TIMED_QUEUE_CAPACITY"),
            max_system_wait: Duration::from_millis(env_get(
                "VTS_MAX_SYSTEM_WAIT_MS",
                defaults::MAX_SYSTEM_WAIT.as_millis() as u64,
            )),
            stack_size: env_get_opt("VTS_STACK_SIZE"),
        }
    }

    // Builder methods

    pub fn thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    pub fn daemon(mut self, daemon: bool) -> Self {
        self.daemon = daemon;
        self
    }

    pub fn nbr_of_threads(mut self, n: usize) -> Self {
        self.nbr_of_threads = n;
        self
    }

    pub fn asap_queue_capacity(mut self, capacity: Option<usize>) -> Self {
        self.asap_queue_capacity = capacity;
        self
    }

    pub fn timed_queue_capacity(mut self, capacity: Option<usize>) -> Self {
        self.timed_queue_capacity = capacity;
        self
    }

    pub fn max_system_wait(mut self, d: Duration) -> Self {
        self.max_system_wait = d;
        self
    }

    pub fn stack_size(mut self, size: Option<usize>) -> Self {
        self.stack_size = size;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> SchedResult<()> {
        if self.max_system_wait.is_zero() {
            return Err(SchedError::InvalidArgument("max_system_wait must be > 0"));
        }
        if let Some(0) = self.stack_size {
            return Err(SchedError::InvalidArgument("stack_size must be > 0"));
        }
        Ok(())
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SchedulerConfig::new();
        assert_eq!(config.nbr_of_threads, 1);
        assert!(config.daemon);
        assert_eq!(config.asap_queue_capacity, None);
        assert_eq!(config.max_system_wait, Duration::from_secs(1));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = SchedulerConfig::new()
            .nbr_of_threads(8)
            .asap_queue_capacity(Some(100))
            .timed_queue_capacity(Some(50))
            .max_system_wait(Duration::from_millis(20))
            .daemon(false)
            .thread_name_prefix("sim");

        assert_eq!(config.nbr_of_threads, 8);
        assert_eq!(config.asap_queue_capacity, Some(100));
        assert_eq!(config.timed_queue_capacity, Some(50));
        assert_eq!(config.max_system_wait, Duration::from_millis(20));
        assert!(!config.daemon);
        assert_eq!(config.thread_name_prefix, "sim");
    }

    #[test]
    fn test_validation() {
        let config = SchedulerConfig::new().max_system_wait(Duration::ZERO);
        assert!(config.validate().is_err());

        let config = SchedulerConfig::new().stack_size(Some(0));
        assert!(config.validate().is_err());
    }
}
