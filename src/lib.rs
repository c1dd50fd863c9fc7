//! `evently-engine`: the booking/inventory core behind a ticket platform —
//! optimistic-concurrency capacity control, per-seat state machines, a
//! booking lifecycle with hold expiry, a FIFO waitlist with strict
//! head-of-line offers, dynamic pricing, and the background sweepers that
//! keep all of it honest without a caller in the loop.
pub mod capacity;
pub mod config;
pub mod engine;
pub mod error;
pub mod lock;
pub mod models;
pub mod notify;
pub mod pricing;
pub mod retry;
pub mod schema;
pub mod scheduler;
pub mod seats;
pub mod store;
pub mod tx;
pub mod waitlist;

#[cfg(any(test, feature = "test-support"))]
pub mod memory;

pub use config::Config;
pub use engine::BookingEngine;
pub use error::{EngineError, EngineResult, ErrorKind};
pub use scheduler::Scheduler;
pub use tx::{PgStore, TxStore};
