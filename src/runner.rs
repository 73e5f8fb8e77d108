//! Host control-loop helper: a dedicated thread ticking an executor at a
//! fixed period.
//!
//! Hosts that already have a periodic callback (a robot control cycle, a
//! game loop) call [`Executor::tick`] from it directly and never need this.
//! [`Runner`] is for everything else: it moves the executor onto a named
//! thread, ticks it until shutdown, and hands back a [`Handle`] for
//! requesting work.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::executor::{Executor, Handle};
use crate::time::{Clock, MonotonicClock};
use crate::trace::info;

/// Runner configuration.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Interval between ticks.
    pub period: Duration,
    /// Name for the tick thread.
    pub thread_name: String,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_millis(20),
            thread_name: "cmdloop-tick".into(),
        }
    }
}

/// Error spawning the runner.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// The OS refused to spawn the tick thread.
    #[error("failed to spawn tick thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Handle to a running tick thread.
///
/// Dropping the runner signals shutdown but does not wait for the thread;
/// use [`Runner::shutdown`] for a graceful join.
pub struct Runner<C: Clock = MonotonicClock> {
    shutdown_flag: Arc<AtomicBool>,
    handle: Handle<C>,
    thread: Option<JoinHandle<()>>,
}

impl<C: Clock + 'static> Runner<C> {
    /// Moves `executor` onto a new thread that ticks it every
    /// `config.period` until shutdown.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::Spawn`] if the thread cannot be created.
    pub fn spawn(mut executor: Executor<C>, config: RunnerConfig) -> Result<Self, RunnerError> {
        let RunnerConfig {
            period,
            thread_name,
        } = config;
        let shutdown_flag = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&shutdown_flag);
        let handle = executor.handle();

        let thread = thread::Builder::new().name(thread_name).spawn(move || {
            info!(period_ms = period.as_millis() as u64, "tick thread started");
            while !flag.load(Ordering::Relaxed) {
                executor.tick();
                thread::sleep(period);
            }
            info!("tick thread exiting");
        })?;

        Ok(Self {
            shutdown_flag,
            handle,
            thread: Some(thread),
        })
    }

    /// Returns a handle for requesting starts and stops.
    #[must_use]
    pub fn handle(&self) -> Handle<C> {
        self.handle.clone()
    }

    /// Signals shutdown and joins the tick thread. In-flight requests that
    /// were not drained by the final tick are dropped with the executor.
    pub fn shutdown(mut self) {
        self.shutdown_flag.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl<C: Clock> Drop for Runner<C> {
    fn drop(&mut self) {
        self.shutdown_flag.store(true, Ordering::Relaxed);
    }
}
