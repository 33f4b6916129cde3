//! Kafka topic subscriptions for the log consumer.
//!
//! Each configured topic gets its own consumer in the shared group. Polls are
//! best effort: a poll yields at most one record and never fails.

pub mod config;
pub mod decode;
pub mod health;
pub mod source;

pub use config::*;
pub use source::*;
