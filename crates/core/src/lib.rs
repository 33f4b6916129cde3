//! Core types, routing, and error handling for the log consumer.

pub mod clock;
pub mod destination;
pub mod error;
pub mod guard;
pub mod record;

pub use clock::ReceiveClock;
pub use destination::Destination;
pub use error::{DbErrorCode, Error, Result};
pub use guard::{ensure_not_empty, with_error_handling, OnError};
pub use record::*;
