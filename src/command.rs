//! Command contract: lifecycle hooks plus the owning cell the executor
//! schedules.
//!
//! Implementors write the hooks ([`Command`]); the executor deals only in
//! [`Cmd`], which owns the boxed hook object together with its scheduling
//! metadata (timeout, launch timestamp, optional successor). Once a `Cmd` is
//! handed to `push`, the executor owns it and drops it on exactly one of two
//! paths: gate rejection or stop.

use core::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::time::{DurationMillis, MonoMillis};

/// Lifecycle hooks for a schedulable unit of work.
///
/// Only `periodic` is required. `start` and `stop` fire exactly once each
/// (or never, if the gate rejects the command). All hooks run synchronously
/// on the control thread; `start` and `stop` additionally run with the
/// pending-table lock held, so they must not block.
pub trait Command: Send {
    /// Called once when the command enters the active table.
    fn start(&mut self) {}

    /// Called once per tick while the command is active.
    fn periodic(&mut self);

    /// Called once when the command leaves the active table, whatever the
    /// reason (explicit pop, timeout, or self-reported completion).
    fn stop(&mut self) {}

    /// Checked right after each `periodic` call; returning `true` stops the
    /// command on the current tick.
    fn complete(&self) -> bool {
        false
    }

    /// Gate evaluated once, at the moment the executor is about to start the
    /// command. Returning `false` discards it: no `start`, no `stop`, never
    /// active. The designed mechanism for "reject if already running" gates.
    fn can_start(&self) -> bool {
        true
    }
}

/// Process-unique identity of a scheduled command.
///
/// Assigned at [`Cmd::new`]; every table lookup keys on it, so `pop` of an
/// id that never started or already stopped is a harmless no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CmdId(u64);

impl CmdId {
    fn generate() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for CmdId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cmd#{}", self.0)
    }
}

/// A successor command queued to start when its parent stops.
pub(crate) struct Successor {
    pub(crate) cmd: Box<Cmd>,
    pub(crate) delay: DurationMillis,
}

/// Owning cell around a [`Command`] and its scheduling metadata.
pub struct Cmd {
    id: CmdId,
    hooks: Box<dyn Command>,
    timeout: DurationMillis,
    launched_at: Option<MonoMillis>,
    successor: Option<Successor>,
}

impl Cmd {
    /// Wraps a hook object, assigning it a fresh [`CmdId`]. No timeout, no
    /// successor.
    #[must_use]
    pub fn new(hooks: impl Command + 'static) -> Self {
        Self {
            id: CmdId::generate(),
            hooks: Box::new(hooks),
            timeout: DurationMillis::ZERO,
            launched_at: None,
            successor: None,
        }
    }

    /// Sets the auto-stop timeout. Zero (the default) disables it.
    #[must_use]
    pub fn timeout(mut self, millis: u64) -> Self {
        self.timeout = DurationMillis::from_millis(millis);
        self
    }

    /// Records `successor` to be started `delay_millis` after this command
    /// stops. Zero delay starts it within the same tick that stopped this
    /// one. Chains compose by nesting:
    /// `a.then(b.then(c, 0), 500)` runs a, then b 500ms after a stops, then
    /// c as soon as b stops.
    #[must_use]
    pub fn then(mut self, successor: Cmd, delay_millis: u64) -> Self {
        self.successor = Some(Successor {
            cmd: Box::new(successor),
            delay: DurationMillis::from_millis(delay_millis),
        });
        self
    }

    /// This command's identity; keep it around to `pop` the command later.
    #[must_use]
    pub fn id(&self) -> CmdId {
        self.id
    }

    /// Configured timeout; zero means disabled.
    #[must_use]
    pub fn timeout_millis(&self) -> DurationMillis {
        self.timeout
    }

    /// When the command actually started, if it has.
    #[must_use]
    pub fn launched_at(&self) -> Option<MonoMillis> {
        self.launched_at
    }

    /// Stamps the launch time. Set exactly once, by the executor, at the
    /// moment the command moves into the active table.
    pub(crate) fn mark_launched(&mut self, now: MonoMillis) {
        debug_assert!(self.launched_at.is_none(), "command launched twice");
        self.launched_at = Some(now);
    }

    /// Consumes the successor record, if any. Called once, on stop.
    pub(crate) fn take_successor(&mut self) -> Option<Successor> {
        self.successor.take()
    }

    pub(crate) fn start(&mut self) {
        self.hooks.start();
    }

    pub(crate) fn periodic(&mut self) {
        self.hooks.periodic();
    }

    pub(crate) fn stop(&mut self) {
        self.hooks.stop();
    }

    pub(crate) fn complete(&self) -> bool {
        self.hooks.complete()
    }

    pub(crate) fn can_start(&self) -> bool {
        self.hooks.can_start()
    }
}
