//! cooprt - a minimal single-threaded cooperative async executor
//!
//! Design principles:
//! - Tractable: the whole runtime is readable in one sitting
//! - One thread polls; any thread may wake
//! - No busy-waiting: the executor parks when nothing is ready
//! - Explicit state: an `Executor` value per `block_on`, nothing global
//!   beyond the timer thread
//!
//! ```no_run
//! use cooprt::{block_on, spawn, Event};
//!
//! let done = Event::new();
//! let signal = done.clone();
//! block_on(async move {
//!     spawn(async move { signal.set() });
//!     done.wait().await;
//! });
//! ```

pub mod config;
pub mod error;
pub mod event;
pub mod executor;
pub mod future;
pub mod task;
pub mod time;
mod waker;

pub use config::Config;
pub use error::{Result, RuntimeError};
pub use event::Event;
pub use executor::{Executor, Stats, block_on, spawn, try_spawn};
pub use task::{TaskHandle, TaskId, TaskState};
