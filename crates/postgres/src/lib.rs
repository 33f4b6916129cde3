//! PostgreSQL persistence for the log consumer.

pub mod client;
pub mod config;
pub mod health;
pub mod schema;
pub mod sink;

pub use client::*;
pub use config::*;
pub use sink::*;
