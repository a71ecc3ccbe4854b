//! Stock clock implementations
//!
//! - [`SystemClock`] - monotonic wall clock, speed fixed at 1.0
//! - [`ControllableClock`] - mutable time and speed with listener
//!   notification, for simulations and tests

use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::clock::{Clock, ClockListener, ClockSnapshot};
use crate::error::{SchedError, SchedResult};
use crate::time::{duration_to_ns, s_to_ns_saturating, saturating_add_ns, NS_PER_S};

// ============================================================================
// SystemClock
// ============================================================================

/// Monotonic wall clock anchored at construction.
///
/// Epoch is the instant the clock was created, so `time_ns()` starts at
/// zero and grows at wall pace. Not listenable: time advances on its own
/// and speed never changes.
pub struct SystemClock {
    anchor: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            anchor: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    #[inline]
    fn time_ns(&self) -> i64 {
        duration_to_ns(self.anchor.elapsed())
    }

    #[inline]
    fn time_speed(&self) -> f64 {
        1.0
    }
}

// ============================================================================
// ControllableClock
// ============================================================================

/// State protected by the clock's lock
struct ControlState {
    /// Virtual time at the last mutation
    anchor_time_ns: i64,
    /// Wall instant of the last mutation
    anchor: Instant,
    /// Current time speed
    speed: f64,
}

impl ControlState {
    /// Virtual time implied by this state at the present wall instant
    fn time_ns_now(&self) -> i64 {
        if self.speed == 0.0 {
            return self.anchor_time_ns;
        }
        let offset_s = self.anchor.elapsed().as_secs_f64() * self.speed;
        // 0 elapsed * inf speed is NaN; the jump has not happened yet
        if offset_s.is_nan() {
            return self.anchor_time_ns;
        }
        match s_to_ns_saturating(offset_s) {
            Some(offset_ns) => saturating_add_ns(self.anchor_time_ns, offset_ns),
            None => self.anchor_time_ns,
        }
    }
}

/// Clock whose time and speed can be set at runtime.
///
/// Time flows continuously between mutations: at speed 2.0 one wall
/// second advances virtual time by two seconds; at speed 0.0 time holds
/// still until mutated. Every mutation re-anchors the clock and then
/// notifies registered listeners, outside the clock's lock.
///
/// # Example
///
/// ```ignore
/// use vtsched_core::{Clock, ControllableClock};
///
/// let clock = ControllableClock::frozen_at(0);
/// assert_eq!(clock.time_ns(), 0);
///
/// clock.set_time_ns(1_000);
/// assert_eq!(clock.time_ns(), 1_000);
/// ```
pub struct ControllableClock {
    state: Mutex<ControlState>,
    listeners: Mutex<Vec<Arc<dyn ClockListener>>>,
}

impl ControllableClock {
    /// Create a clock at time 0, running at wall pace
    pub fn new() -> Self {
        Self::with_time_and_speed(0, 1.0).expect("1.0 is a valid speed")
    }

    /// Create a frozen clock (speed 0) at the given time
    pub fn frozen_at(time_ns: i64) -> Self {
        Self::with_time_and_speed(time_ns, 0.0).expect("0.0 is a valid speed")
    }

    /// Create a clock with explicit initial time and speed
    pub fn with_time_and_speed(time_ns: i64, speed: f64) -> SchedResult<Self> {
        check_speed(speed)?;
        Ok(Self {
            state: Mutex::new(ControlState {
                anchor_time_ns: time_ns,
                anchor: Instant::now(),
                speed,
            }),
            listeners: Mutex::new(Vec::new()),
        })
    }

    /// Jump time to the given instant; speed is unchanged
    pub fn set_time_ns(&self, time_ns: i64) {
        {
            let mut state = self.state.lock().unwrap();
            state.anchor_time_ns = time_ns;
            state.anchor = Instant::now();
        }
        log::trace!("clock time set to {} ns", time_ns);
        self.notify_listeners();
    }

    /// Advance (or rewind, if negative) time by the given amount
    pub fn add_time_ns(&self, delta_ns: i64) {
        {
            let mut state = self.state.lock().unwrap();
            let now_ns = state.time_ns_now();
            state.anchor_time_ns = saturating_add_ns(now_ns, delta_ns);
            state.anchor = Instant::now();
        }
        self.notify_listeners();
    }

    /// Change the time speed; time remains continuous across the change
    pub fn set_time_speed(&self, speed: f64) -> SchedResult<()> {
        check_speed(speed)?;
        {
            let mut state = self.state.lock().unwrap();
            let now_ns = state.time_ns_now();
            state.anchor_time_ns = now_ns;
            state.anchor = Instant::now();
            state.speed = speed;
        }
        log::trace!("clock speed set to {}", speed);
        self.notify_listeners();
        Ok(())
    }

    /// Set time and speed in one mutation (a single notification)
    pub fn set_time_and_speed(&self, time_ns: i64, speed: f64) -> SchedResult<()> {
        check_speed(speed)?;
        {
            let mut state = self.state.lock().unwrap();
            state.anchor_time_ns = time_ns;
            state.anchor = Instant::now();
            state.speed = speed;
        }
        self.notify_listeners();
        Ok(())
    }

    /// Call every registered listener, outside the clock's locks
    fn notify_listeners(&self) {
        let listeners: Vec<_> = self.listeners.lock().unwrap().clone();
        for listener in listeners {
            listener.on_clock_modified();
        }
    }
}

impl Default for ControllableClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ControllableClock {
    fn time_ns(&self) -> i64 {
        self.state.lock().unwrap().time_ns_now()
    }

    fn time_speed(&self) -> f64 {
        self.state.lock().unwrap().speed
    }

    fn snapshot(&self) -> ClockSnapshot {
        let state = self.state.lock().unwrap();
        ClockSnapshot {
            time_ns: state.time_ns_now(),
            time_speed: state.speed,
        }
    }

    fn add_listener(&self, listener: Arc<dyn ClockListener>) -> bool {
        self.listeners.lock().unwrap().push(listener);
        true
    }

    fn remove_listener(&self, listener: &Arc<dyn ClockListener>) -> bool {
        let mut listeners = self.listeners.lock().unwrap();
        match listeners.iter().position(|l| Arc::ptr_eq(l, listener)) {
            Some(idx) => {
                listeners.remove(idx);
                true
            }
            None => false,
        }
    }
}

fn check_speed(speed: f64) -> SchedResult<()> {
    if speed.is_nan() {
        return Err(SchedError::InvalidArgument("time speed must not be NaN"));
    }
    if speed < 0.0 {
        return Err(SchedError::InvalidArgument("time speed must be >= 0"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn test_system_clock_monotonic() {
        let clock = SystemClock::new();
        let t1 = clock.time_ns();
        std::thread::sleep(Duration::from_micros(100));
        let t2 = clock.time_ns();
        assert!(t2 > t1);
        assert_eq!(clock.time_speed(), 1.0);
    }

    #[test]
    fn test_frozen_clock_holds_still() {
        let clock = ControllableClock::frozen_at(123);
        assert_eq!(clock.time_ns(), 123);
        std::thread::sleep(Duration::from_millis(10));
        assert_eq!(clock.time_ns(), 123);
    }

    #[test]
    fn test_time_jump() {
        let clock = ControllableClock::frozen_at(0);
        clock.set_time_ns(5_000);
        assert_eq!(clock.time_ns(), 5_000);

        // Backward jumps are allowed
        clock.set_time_ns(1_000);
        assert_eq!(clock.time_ns(), 1_000);
    }

    #[test]
    fn test_add_time() {
        let clock = ControllableClock::frozen_at(100);
        clock.add_time_ns(50);
        assert_eq!(clock.time_ns(), 150);
        clock.add_time_ns(-200);
        assert_eq!(clock.time_ns(), -50);
        clock.add_time_ns(i64::MAX);
        assert_eq!(clock.time_ns(), i64::MAX - 50);
    }

    #[test]
    fn test_running_clock_advances() {
        let clock = ControllableClock::new();
        let t1 = clock.time_ns();
        std::thread::sleep(Duration::from_millis(5));
        let t2 = clock.time_ns();
        assert!(t2 > t1);
    }

    #[test]
    fn test_accelerated_clock() {
        let clock = ControllableClock::with_time_and_speed(0, 100.0).unwrap();
        std::thread::sleep(Duration::from_millis(10));
        // 10ms wall at 100x is at least 1s virtual (with generous slack)
        assert!(clock.time_ns() >= NS_PER_S / 2);
    }

    #[test]
    fn test_speed_validation() {
        assert!(ControllableClock::with_time_and_speed(0, f64::NAN).is_err());
        assert!(ControllableClock::with_time_and_speed(0, -1.0).is_err());
        assert!(ControllableClock::with_time_and_speed(0, f64::INFINITY).is_ok());

        let clock = ControllableClock::new();
        assert_eq!(
            clock.set_time_speed(f64::NAN),
            Err(SchedError::InvalidArgument("time speed must not be NaN"))
        );
        assert!(clock.set_time_speed(0.0).is_ok());
    }

    #[test]
    fn test_speed_change_keeps_time_continuous() {
        let clock = ControllableClock::frozen_at(1_000);
        clock.set_time_speed(1.0).unwrap();
        let t = clock.time_ns();
        assert!(t >= 1_000);
        assert!(t < 1_000 + NS_PER_S);
    }

    struct CountingListener(AtomicUsize);

    impl ClockListener for CountingListener {
        fn on_clock_modified(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_listeners_notified_on_mutation() {
        let clock = ControllableClock::frozen_at(0);
        let listener = Arc::new(CountingListener(AtomicUsize::new(0)));
        assert!(clock.add_listener(listener.clone()));

        clock.set_time_ns(10);
        clock.set_time_speed(2.0).unwrap();
        clock.set_time_and_speed(0, 0.0).unwrap();
        assert_eq!(listener.0.load(Ordering::SeqCst), 3);

        // Rejected mutations do not notify
        let _ = clock.set_time_speed(-1.0);
        assert_eq!(listener.0.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_remove_listener() {
        let clock = ControllableClock::frozen_at(0);
        let listener = Arc::new(CountingListener(AtomicUsize::new(0)));
        let erased: Arc<dyn ClockListener> = listener.clone();

        clock.add_listener(erased.clone());
        assert!(clock.remove_listener(&erased));
        assert!(!clock.remove_listener(&erased));

        clock.set_time_ns(10);
        assert_eq!(listener.0.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_snapshot_consistent() {
        let clock = ControllableClock::with_time_and_speed(77, 0.0).unwrap();
        let snap = clock.snapshot();
        assert_eq!(snap.time_ns, 77);
        assert!(snap.is_frozen());
    }
}
