//! End-to-end lifecycle tests for the executor.
//!
//! All scheduler-behavior tests run on a hand-driven clock so delays and
//! timeouts are exact; only the runner test uses real time.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use cmdloop::{
    Clock, Cmd, Command, DurationMillis, Executor, ExecutorConfig, MonoMillis, Runner,
    RunnerConfig,
};

/// Hand-driven clock shared between the test and the executor.
#[derive(Clone, Default)]
struct TestClock(Arc<AtomicU64>);

impl TestClock {
    fn set(&self, millis: u64) {
        self.0.store(millis, Ordering::SeqCst);
    }
}

impl Clock for TestClock {
    fn now(&self) -> MonoMillis {
        MonoMillis::new(self.0.load(Ordering::SeqCst))
    }
}

/// Shared hook-invocation counters for a probe command.
#[derive(Clone, Default)]
struct Counters {
    starts: Arc<AtomicUsize>,
    periodics: Arc<AtomicUsize>,
    stops: Arc<AtomicUsize>,
    drops: Arc<AtomicUsize>,
}

impl Counters {
    fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    fn periodics(&self) -> usize {
        self.periodics.load(Ordering::SeqCst)
    }

    fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    fn drops(&self) -> usize {
        self.drops.load(Ordering::SeqCst)
    }
}

/// Probe command recording every hook invocation.
struct Probe {
    counters: Counters,
    complete_after: Option<usize>,
    allow_start: bool,
}

impl Probe {
    fn new(counters: &Counters) -> Self {
        Self {
            counters: counters.clone(),
            complete_after: None,
            allow_start: true,
        }
    }

    /// Report completion once `periodic` has run `count` times.
    fn complete_after(mut self, count: usize) -> Self {
        self.complete_after = Some(count);
        self
    }

    /// Make the gate reject the start.
    fn rejecting(mut self) -> Self {
        self.allow_start = false;
        self
    }
}

impl Command for Probe {
    fn start(&mut self) {
        self.counters.starts.fetch_add(1, Ordering::SeqCst);
    }

    fn periodic(&mut self) {
        self.counters.periodics.fetch_add(1, Ordering::SeqCst);
    }

    fn stop(&mut self) {
        self.counters.stops.fetch_add(1, Ordering::SeqCst);
    }

    fn complete(&self) -> bool {
        self.complete_after
            .is_some_and(|count| self.counters.periodics() >= count)
    }

    fn can_start(&self) -> bool {
        self.allow_start
    }
}

impl Drop for Probe {
    fn drop(&mut self) {
        self.counters.drops.fetch_add(1, Ordering::SeqCst);
    }
}

fn executor(clock: &TestClock) -> Executor<TestClock> {
    Executor::with_clock(ExecutorConfig::default(), clock.clone())
}

#[test]
fn push_tick_pop_tick_full_lifecycle() {
    let clock = TestClock::default();
    let mut exec = executor(&clock);
    let counters = Counters::default();

    let id = exec.push(Cmd::new(Probe::new(&counters)));
    exec.tick();
    assert_eq!(counters.starts(), 1);
    assert!(exec.is_active(id));
    assert_eq!(exec.active_count(), 1);

    exec.pop(id);
    exec.tick();
    assert_eq!(counters.stops(), 1);
    assert!(!exec.is_active(id));
    assert_eq!(exec.active_count(), 0);
    assert_eq!(counters.drops(), 1, "executor destroyed the command");
}

#[test]
fn rejected_command_sees_no_hooks_and_is_destroyed() {
    let clock = TestClock::default();
    let mut exec = executor(&clock);
    let counters = Counters::default();

    let id = exec.push(Cmd::new(Probe::new(&counters).rejecting()));
    exec.tick();
    exec.tick();

    assert_eq!(counters.starts(), 0);
    assert_eq!(counters.periodics(), 0);
    assert_eq!(counters.stops(), 0);
    assert_eq!(counters.drops(), 1);
    assert!(!exec.is_active(id));
    assert_eq!(exec.pending_count(), 0);
}

#[test]
fn timeout_stops_exactly_once_at_expiry() {
    let clock = TestClock::default();
    let mut exec = executor(&clock);
    let counters = Counters::default();

    let id = exec.push(Cmd::new(Probe::new(&counters)).timeout(100));
    exec.tick(); // started at t=0

    clock.set(50);
    exec.tick();
    assert_eq!(counters.periodics(), 1);
    assert_eq!(counters.stops(), 0);

    clock.set(100);
    exec.tick();
    assert_eq!(counters.periodics(), 1, "no periodic on the expiring tick");
    assert_eq!(counters.stops(), 1);
    assert!(!exec.is_active(id));

    clock.set(200);
    exec.tick();
    assert_eq!(counters.stops(), 1, "stop fires exactly once");
}

#[test]
fn completion_stops_on_the_same_tick() {
    let clock = TestClock::default();
    let mut exec = executor(&clock);
    let counters = Counters::default();

    let id = exec.push(Cmd::new(Probe::new(&counters).complete_after(2)));
    exec.tick(); // start
    exec.tick(); // periodic #1, not complete
    assert_eq!(counters.stops(), 0);

    exec.tick(); // periodic #2, complete -> stopped in the same tick
    assert_eq!(counters.periodics(), 2);
    assert_eq!(counters.stops(), 1);
    assert!(!exec.is_active(id));

    exec.tick();
    assert_eq!(counters.periodics(), 2, "no periodic after completion");
}

#[test]
fn delayed_start_honors_the_delay() {
    let clock = TestClock::default();
    let mut exec = executor(&clock);
    let counters = Counters::default();

    exec.push_after(
        Cmd::new(Probe::new(&counters)),
        DurationMillis::from_millis(2000),
    );

    clock.set(500);
    exec.tick();
    assert_eq!(counters.starts(), 0);

    clock.set(2100);
    exec.tick();
    assert_eq!(counters.starts(), 1);
}

#[test]
fn zero_delay_successor_starts_within_the_stopping_tick() {
    let clock = TestClock::default();
    let mut exec = executor(&clock);
    let a_counters = Counters::default();
    let b_counters = Counters::default();

    let b = Cmd::new(Probe::new(&b_counters));
    let b_id = b.id();
    let a_id = exec.push(Cmd::new(Probe::new(&a_counters)).then(b, 0));
    exec.tick();
    assert!(exec.is_active(a_id));

    exec.pop(a_id);
    exec.tick();
    assert_eq!(a_counters.stops(), 1);
    assert_eq!(b_counters.starts(), 1, "successor started in the same tick");
    assert!(exec.is_active(b_id));
    assert!(!exec.is_active(a_id));
}

#[test]
fn delayed_successor_starts_once_its_delay_elapses() {
    let clock = TestClock::default();
    let mut exec = executor(&clock);
    let a_counters = Counters::default();
    let b_counters = Counters::default();

    let b = Cmd::new(Probe::new(&b_counters));
    let b_id = b.id();
    let a_id = exec.push(Cmd::new(Probe::new(&a_counters)).then(b, 1000));
    exec.tick();

    exec.pop(a_id);
    exec.tick(); // a stops at t=0, b queued with delay 1000
    assert_eq!(a_counters.stops(), 1);
    assert_eq!(b_counters.starts(), 0);

    clock.set(999);
    exec.tick();
    assert_eq!(b_counters.starts(), 0);

    clock.set(1000);
    exec.tick();
    assert_eq!(b_counters.starts(), 1);
    assert!(exec.is_active(b_id));
}

#[test]
fn pop_is_idempotent() {
    let clock = TestClock::default();
    let mut exec = executor(&clock);
    let counters = Counters::default();

    let id = exec.push(Cmd::new(Probe::new(&counters)));
    exec.tick();

    exec.pop(id);
    exec.pop(id);
    exec.tick();
    exec.pop(id);
    exec.tick();
    assert_eq!(counters.stops(), 1);

    // Popping a command that was never pushed is equally harmless.
    let stray = Cmd::new(Probe::new(&Counters::default()));
    exec.pop(stray.id());
    exec.tick();
    assert_eq!(counters.stops(), 1);
}

/// One-at-a-time gate in the style of the classic "command running" flag:
/// the capability lives in the command, checked in `can_start`.
struct Exclusive {
    running: Arc<AtomicBool>,
    counters: Counters,
}

impl Command for Exclusive {
    fn start(&mut self) {
        self.running.store(true, Ordering::SeqCst);
        self.counters.starts.fetch_add(1, Ordering::SeqCst);
    }

    fn periodic(&mut self) {}

    fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }

    fn can_start(&self) -> bool {
        !self.running.load(Ordering::SeqCst)
    }
}

#[test]
fn gate_enforces_one_instance_at_a_time() {
    let clock = TestClock::default();
    let mut exec = executor(&clock);
    let running = Arc::new(AtomicBool::new(false));
    let counters = Counters::default();
    let make = || {
        Cmd::new(Exclusive {
            running: Arc::clone(&running),
            counters: counters.clone(),
        })
    };

    let first = exec.push(make());
    exec.push(make());
    exec.tick();

    assert_eq!(counters.starts(), 1, "second instance rejected by the gate");
    assert_eq!(exec.active_count(), 1);
    assert!(exec.is_active(first));

    // Once the first stops, a new instance may start.
    exec.pop(first);
    exec.tick();
    exec.push(make());
    exec.tick();
    assert_eq!(counters.starts(), 2);
}

#[test]
fn concurrent_push_pop_converges_to_the_requested_set() {
    const THREADS: usize = 8;
    const PER_THREAD: usize = 10;

    let clock = TestClock::default();
    let mut exec = executor(&clock);
    let handle = exec.handle();

    let workers: Vec<_> = (0..THREADS)
        .map(|_| {
            let handle = handle.clone();
            thread::spawn(move || {
                let mut kept = Vec::new();
                let mut popped = Vec::new();
                for n in 0..PER_THREAD {
                    let counters = Counters::default();
                    let id = handle.push(Cmd::new(Probe::new(&counters)));
                    if n % 2 == 0 {
                        handle.pop(id);
                        popped.push(id);
                    } else {
                        kept.push(id);
                    }
                }
                (kept, popped)
            })
        })
        .collect();

    let mut kept = Vec::new();
    let mut popped = Vec::new();
    for worker in workers {
        let (k, p) = worker.join().expect("worker panicked");
        kept.extend(k);
        popped.extend(p);
    }

    exec.tick();

    assert_eq!(exec.active_count(), kept.len());
    for id in kept {
        assert!(exec.is_active(id));
    }
    for id in popped {
        assert!(!exec.is_active(id));
    }
    assert_eq!(exec.pending_count(), 0);
}

#[test]
fn runner_drives_a_command_to_completion() {
    let exec = Executor::new();
    let runner = Runner::spawn(
        exec,
        RunnerConfig {
            period: Duration::from_millis(1),
            ..RunnerConfig::default()
        },
    )
    .expect("spawn runner");

    let counters = Counters::default();
    runner
        .handle()
        .push(Cmd::new(Probe::new(&counters).complete_after(3)));

    // Generous budget: 3 periodic ticks at a 1ms period.
    thread::sleep(Duration::from_millis(300));
    runner.shutdown();

    assert_eq!(counters.starts(), 1);
    assert_eq!(counters.periodics(), 3);
    assert_eq!(counters.stops(), 1);
    assert_eq!(counters.drops(), 1);
}
