//! Time-warp vtsched example
//!
//! Drives a scheduler from a controllable clock: tasks scheduled on a
//! frozen timeline run only when the clock is jumped or sped up.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use vtsched::{ControllableClock, Scheduler, SchedulerConfig};

const SECOND_NS: i64 = 1_000_000_000;

fn main() {
    env_logger::init();

    println!("=== vtsched timewarp example ===\n");

    let clock = Arc::new(ControllableClock::frozen_at(0));
    let config = SchedulerConfig::default().nbr_of_threads(1);
    let sched = Scheduler::new(clock.clone(), config).expect("scheduler construction");

    let ran = Arc::new(AtomicUsize::new(0));
    for hour in 1..=3i64 {
        let r = ran.clone();
        let outcome = sched.execute_at_ns(
            move || {
                println!("[t+{}h] simulated hourly task ran", hour);
                r.fetch_add(1, Ordering::SeqCst);
            },
            hour * 3600 * SECOND_NS,
        );
        println!("scheduled hour {}: {:?}", hour, outcome);
    }

    println!("clock frozen at t=0: nothing runs...");
    std::thread::sleep(Duration::from_millis(300));
    assert_eq!(ran.load(Ordering::SeqCst), 0);

    println!("jumping the clock to t=1h");
    clock.set_time_ns(3600 * SECOND_NS);
    while ran.load(Ordering::SeqCst) < 1 {
        std::thread::sleep(Duration::from_millis(5));
    }

    println!("running time at 7200x: one wall second per simulated 2h");
    clock.set_time_speed(7200.0).expect("valid speed");
    while ran.load(Ordering::SeqCst) < 3 {
        std::thread::sleep(Duration::from_millis(5));
    }

    sched.shutdown();
    sched
        .wait_for_no_more_running_worker_system_time_ns(i64::MAX)
        .expect("wait");
    println!("\nthree simulated hours elapsed, workers terminated");
}
