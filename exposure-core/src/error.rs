//! Error types for the exposure engine

use chrono::{DateTime, Utc};
use thiserror::Error;
use token_ledger::Amount;

/// Result type for exposure operations
pub type Result<T> = std::result::Result<T, Error>;

/// Exposure engine errors
///
/// Every variant rejects the whole operation; no state change is observable
/// from a returned error.
#[derive(Debug, Error)]
pub enum Error {
    /// Zero amount where a strictly positive one is required
    #[error("Amount must be positive")]
    InvalidAmount,

    /// Increase would push the stored amount past the giver's balance
    #[error("Exposure exceeds balance: stored {stored} + delta {delta} > balance {balance}")]
    ExceedsBalance {
        /// Stored amount before the increase
        stored: Amount,
        /// Requested increment
        delta: Amount,
        /// Giver's balance at the time of the attempt
        balance: Amount,
    },

    /// Giver-initiated reduce attempted while the lock is active
    #[error("Exposure locked until {expiry}")]
    ExposureLocked {
        /// Time at which the lock lapses
        expiry: DateTime<Utc>,
    },

    /// Requested reduce/take amount exceeds the effective exposure
    #[error("Requested {requested} exceeds effective exposure {effective}")]
    ExceedsExposure {
        /// Amount the caller asked for
        requested: Amount,
        /// Balance-clamped exposure at the time of the attempt
        effective: Amount,
    },

    /// Ledger collaborator failure, surfaced unchanged.
    ///
    /// An `InsufficientBalance` here means a transfer failed despite the
    /// effective-exposure invariant; the operation is rolled back and never
    /// retried.
    #[error(transparent)]
    Ledger(#[from] token_ledger::Error),

    /// Storage error (RocksDB)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Concurrency error (actor mailbox closed, etc.)
    #[error("Concurrency error: {0}")]
    Concurrency(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Storage(err.to_string())
    }
}
