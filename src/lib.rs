//! cmdloop — polling command executor for fixed-cadence control loops.
//!
//! Commands are short-lived units of work with a start/periodic/stop
//! lifecycle, an optional timeout, an optional chained successor, and a gate
//! that can refuse the start. One control thread calls [`Executor::tick`] at
//! a fixed cadence; any other thread queues starts and stops through a
//! [`Handle`], optionally after a delay.
//!
//! # Example
//!
//! ```
//! use cmdloop::{Cmd, Command, Executor};
//!
//! struct Blink;
//!
//! impl Command for Blink {
//!     fn start(&mut self) { /* lamp on */ }
//!     fn periodic(&mut self) { /* toggle */ }
//!     fn stop(&mut self) { /* lamp off */ }
//! }
//!
//! let mut exec = Executor::new();
//! let id = exec.push(Cmd::new(Blink).timeout(1000));
//!
//! // Host control cycle:
//! exec.tick();
//! assert!(exec.is_active(id));
//! ```

pub mod command;
pub mod executor;
pub mod runner;
mod table;
pub mod time;
pub(crate) mod trace;

pub use command::{Cmd, CmdId, Command};
pub use executor::{Executor, ExecutorConfig, Handle};
pub use runner::{Runner, RunnerConfig, RunnerError};
pub use time::{Clock, DurationMillis, MonoMillis, MonotonicClock};
pub use trace::init_tracing;
