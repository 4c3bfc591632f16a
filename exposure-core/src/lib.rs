//! Exposure Core
//!
//! Peer-to-peer exposure on top of a fungible-token ledger: a giver commits
//! a bounded, time-locked allowance of its own balance to a taker, who may
//! draw it down, splitting the drawn amount with a privileged operator
//! account.
//!
//! # Architecture
//!
//! - **Exposure Engine**: the state machine — increase, reduce, take, and
//!   the read-only projections
//! - **Exposure Store**: keyed (giver, taker) → record map, in-memory or
//!   RocksDB, mutated only by the engine
//! - **Ledger seam**: balances and transfers come from `token-ledger`
//!   through its two-method `Ledger` trait
//! - **Single Writer**: one actor task serializes every operation
//!
//! # Invariants
//!
//! - Effective exposure never exceeds the giver's live balance
//! - Record writes are whole-record replacements, never partial
//! - A failed operation leaves no observable state change
//! - Take splits floor-half to the taker, the rest to the operator

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod actor;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod store;
pub mod types;

// Re-exports
pub use actor::{spawn_exposure_actor, ExposureHandle};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use engine::ExposureEngine;
pub use error::{Error, Result};
pub use metrics::Metrics;
pub use store::{ExposureStore, MemoryExposureStore, RocksDbExposureStore};
pub use types::{Exposure, ExposureEvent, ExposureEventKind};
