//! Two-table polling executor.
//!
//! The [`Executor`] owns the canonical state: an active table of started
//! commands and a pending table of not-yet-applied start/stop requests. One
//! control thread drives [`Executor::tick`] at a fixed cadence; any other
//! thread requests work through a cloned [`Handle`], which only ever appends
//! to the pending table under its mutex. Structural changes to the active
//! table happen in exactly one place, the drain phase of `tick`, so the
//! active scan runs without any lock.
//!
//! # Tick phases
//!
//! 1. **Active phase** (no lock): run `periodic` for every active command in
//!    slot order; commands past their timeout or reporting completion get a
//!    stop queued through the pending table like any external `pop`.
//! 2. **Drain phase** (pending lock held throughout): apply every due
//!    request in slot order. Starts run the gate and move the command into
//!    the active table; stops remove it, fire `stop`, and queue or inline
//!    its successor.
//!
//! Requests are applied in pending-slot order, which after slot churn is not
//! FIFO by submission time; the guarantee is "applied at or after the
//! requested delay", not inter-command ordering. The pending table grows
//! without bound by design.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::command::{Cmd, CmdId};
use crate::table::SlotTable;
use crate::time::{Clock, DurationMillis, MonoMillis, MonotonicClock};
use crate::trace::{debug, trace};

/// Executor sizing knobs.
#[derive(Debug, Clone, Copy)]
pub struct ExecutorConfig {
    /// Slots preallocated in each table.
    pub initial_slots: usize,
    /// Slots appended when a full scan finds no free slot.
    pub grow_by: NonZeroUsize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            initial_slots: 16,
            grow_by: NonZeroUsize::new(8).expect("8 != 0"),
        }
    }
}

/// A queued request awaiting the drain phase. An applied request frees its
/// slot (the table stores `None`).
enum PendingOp {
    /// Start `cmd` once `delay` has elapsed since `requested_at`.
    Start {
        cmd: Cmd,
        requested_at: MonoMillis,
        delay: DurationMillis,
    },
    /// Stop the command, wherever it is. Unknown ids are ignored.
    Stop { id: CmdId },
}

/// An entry in the active table: a started command plus its timeout window.
struct ActiveSlot {
    id: CmdId,
    cmd: Cmd,
    started_at: MonoMillis,
    /// Snapshot of the command's timeout at start; zero disables auto-stop.
    timeout: DurationMillis,
}

/// State shared between the executor and its handles: the clock and the
/// mutex-guarded pending table.
struct Shared<C: Clock> {
    clock: C,
    pending: Mutex<SlotTable<PendingOp>>,
}

impl<C: Clock> Shared<C> {
    fn lock_pending(&self) -> MutexGuard<'_, SlotTable<PendingOp>> {
        // A panicking hook poisons the mutex; later push/pop callers must
        // keep working, so recover the guard instead of propagating.
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, cmd: Cmd, delay: DurationMillis) -> CmdId {
        let id = cmd.id();
        let requested_at = self.clock.now();
        self.lock_pending().insert(PendingOp::Start {
            cmd,
            requested_at,
            delay,
        });
        trace!(id = %id, delay = %delay, "start requested");
        id
    }

    fn pop(&self, id: CmdId) {
        self.lock_pending().insert(PendingOp::Stop { id });
        trace!(id = %id, "stop requested");
    }
}

/// Cheap cloneable entry point for requesting starts and stops from any
/// thread. Handles stay valid for the life of the shared state; requests
/// queued after the executor is gone are simply never drained.
pub struct Handle<C: Clock = MonotonicClock> {
    shared: Arc<Shared<C>>,
}

impl<C: Clock> Clone for Handle<C> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<C: Clock> Handle<C> {
    /// Requests that `cmd` start on the next tick. Returns its id.
    pub fn push(&self, cmd: Cmd) -> CmdId {
        self.shared.push(cmd, DurationMillis::ZERO)
    }

    /// Requests that `cmd` start on the first tick at or after `delay` from
    /// now. Returns its id.
    pub fn push_after(&self, cmd: Cmd, delay: DurationMillis) -> CmdId {
        self.shared.push(cmd, delay)
    }

    /// Requests that the command stop on the next tick. Ids that never
    /// started or already stopped are ignored, so `pop` is idempotent.
    pub fn pop(&self, id: CmdId) {
        self.shared.pop(id);
    }
}

/// The polling scheduler. Owned by the single control thread that calls
/// [`tick`](Self::tick); everything else goes through a [`Handle`].
pub struct Executor<C: Clock = MonotonicClock> {
    active: SlotTable<ActiveSlot>,
    shared: Arc<Shared<C>>,
}

impl Executor<MonotonicClock> {
    /// Creates an executor on the system monotonic clock with default
    /// sizing.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(ExecutorConfig::default())
    }

    /// Creates an executor on the system monotonic clock.
    #[must_use]
    pub fn with_config(config: ExecutorConfig) -> Self {
        Self::with_clock(config, MonotonicClock::new())
    }
}

impl Default for Executor<MonotonicClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> Executor<C> {
    /// Creates an executor on a caller-supplied clock. Tests drive a
    /// deterministic clock through this.
    #[must_use]
    pub fn with_clock(config: ExecutorConfig, clock: C) -> Self {
        Self {
            active: SlotTable::new(config.initial_slots, config.grow_by),
            shared: Arc::new(Shared {
                clock,
                pending: Mutex::new(SlotTable::new(config.initial_slots, config.grow_by)),
            }),
        }
    }

    /// Returns a handle for requesting starts and stops from other threads.
    #[must_use]
    pub fn handle(&self) -> Handle<C> {
        Handle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// See [`Handle::push`].
    pub fn push(&self, cmd: Cmd) -> CmdId {
        self.shared.push(cmd, DurationMillis::ZERO)
    }

    /// See [`Handle::push_after`].
    pub fn push_after(&self, cmd: Cmd, delay: DurationMillis) -> CmdId {
        self.shared.push(cmd, delay)
    }

    /// See [`Handle::pop`].
    pub fn pop(&self, id: CmdId) {
        self.shared.pop(id);
    }

    /// Number of currently started commands.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.active.occupied()
    }

    /// Whether the command is currently in the active table.
    #[must_use]
    pub fn is_active(&self, id: CmdId) -> bool {
        self.active.position(|slot| slot.id == id).is_some()
    }

    /// Number of queued requests not yet applied. Briefly takes the pending
    /// lock.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.shared.lock_pending().occupied()
    }

    /// Advances the system by one control cycle. Call from exactly one
    /// thread at a fixed cadence.
    pub fn tick(&mut self) {
        self.run_active();
        self.drain_pending();
    }

    /// Active phase: periodic hooks, timeout and completion checks. Holds no
    /// lock, so concurrent push/pop stay unblocked; the stops requested here
    /// go through the pending table and land in the drain phase, keeping all
    /// active-table structural changes there.
    fn run_active(&mut self) {
        for i in 0..self.active.capacity() {
            let now = self.shared.clock.now();
            let Some(slot) = self.active.get_mut(i) else {
                continue;
            };
            if !slot.timeout.is_zero() && now >= slot.started_at + slot.timeout {
                debug!(id = %slot.id, timeout = %slot.timeout, "timeout elapsed, requesting stop");
                self.shared.pop(slot.id);
            } else {
                slot.cmd.periodic();
                if slot.cmd.complete() {
                    debug!(id = %slot.id, "command complete, requesting stop");
                    self.shared.pop(slot.id);
                }
            }
        }
    }

    /// Drain phase: applies every due request in slot order, holding the
    /// pending lock for the whole pass.
    fn drain_pending(&mut self) {
        let shared = Arc::clone(&self.shared);
        let mut pending = shared.lock_pending();
        let mut i = 0;
        // Re-read capacity every pass: stops may append delayed successors
        // to this same table, and those must be visited (and left pending,
        // since they cannot be due yet) within this drain.
        while i < pending.capacity() {
            let now = shared.clock.now();
            let due = match pending.get(i) {
                Some(PendingOp::Start {
                    requested_at,
                    delay,
                    ..
                }) => delay.is_zero() || now >= *requested_at + *delay,
                Some(PendingOp::Stop { .. }) => true,
                None => false,
            };
            if due && let Some(op) = pending.take(i) {
                match op {
                    PendingOp::Start { cmd, .. } => self.start_now(cmd),
                    PendingOp::Stop { id } => self.stop_now(&mut pending, id),
                }
            }
            i += 1;
        }
    }

    /// Applies a due start: gate, launch stamp, `start` hook, active-table
    /// insert. Runs with the pending lock held.
    fn start_now(&mut self, mut cmd: Cmd) {
        let id = cmd.id();
        if !cmd.can_start() {
            debug!(id = %id, "start rejected by gate, discarding");
            return;
        }
        let now = self.shared.clock.now();
        cmd.mark_launched(now);
        cmd.start();
        let timeout = cmd.timeout_millis();
        self.active.insert(ActiveSlot {
            id,
            cmd,
            started_at: now,
            timeout,
        });
        debug!(id = %id, timeout = %timeout, "command started");
    }

    /// Applies a stop: removes the command from the active table, fires
    /// `stop`, then handles its successor. Runs with the pending lock held;
    /// a zero-delay successor starts inline rather than round-tripping
    /// through the pending table, so chained commands start within the same
    /// tick that stopped their parent.
    fn stop_now(&mut self, pending: &mut SlotTable<PendingOp>, id: CmdId) {
        let Some(idx) = self.active.position(|slot| slot.id == id) else {
            trace!(id = %id, "stop for inactive command ignored");
            return;
        };
        let Some(slot) = self.active.take(idx) else {
            return;
        };
        let mut cmd = slot.cmd;
        cmd.stop();
        debug!(id = %id, "command stopped");
        if let Some(successor) = cmd.take_successor() {
            if successor.delay.is_zero() {
                self.start_now(*successor.cmd);
            } else {
                let requested_at = self.shared.clock.now();
                pending.insert(PendingOp::Start {
                    cmd: *successor.cmd,
                    requested_at,
                    delay: successor.delay,
                });
            }
        }
    }
}
