//! Worker that drains the log topics into the database.
//!
//! - Cycle: one polling pass over every topic, producing a batch
//! - Consumer: the long-running loop that persists batches, sleeps and
//!   backs off on failure
//! - Config: loop timings

pub mod config;
pub mod consumer;
pub mod cycle;

pub use config::WorkerSettings;
pub use consumer::*;
pub use cycle::*;
