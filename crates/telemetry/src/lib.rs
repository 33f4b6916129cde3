//! Process telemetry for the log consumer.
//!
//! Everything stays in-process: structured logs through `tracing`, plus
//! counters and health flags that the worker reports in its own log lines.

pub mod health;
pub mod metrics;
pub mod tracing_setup;

pub use health::*;
pub use metrics::*;
pub use tracing_setup::*;
