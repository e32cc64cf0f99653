//! Continuous aggregation runtime: a cycle loop with signal-driven shutdown.

mod error;
mod runtime;

pub use error::DaemonError;
pub use runtime::{
    init_tracing, run, run_loop, run_with_signal, start_blocking, LogFormat, LoopStats, RunMode,
};
