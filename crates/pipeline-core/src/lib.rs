//! Concurrent substrate for a linear string-transformation pipeline: a
//! sticky-signal [`monitor`], a bounded FIFO [`queue`] built on it, the
//! per-stage worker [`stage`] runtime, and the chain composition/join
//! protocol in [`host`].
//!
//! Nothing here knows about command lines, dynamic loading, or the specific
//! transforms a pipeline runs — those are the job of the loader/host binary
//! (`analyzer`) and the individual `stages/*` crates.

pub mod host;
pub mod monitor;
pub mod queue;
pub mod stage;

pub use host::{NextSubmit, Pipeline, StageHandle, END_SENTINEL};
pub use monitor::Monitor;
pub use queue::BoundedQueue;
pub use stage::StageRuntime;
