//! Fungible token bookkeeping
//!
//! Single-asset account ledger: balances, transfers, minting/burning, and
//! spender allowances. The exposure engine consumes this crate only through
//! the [`Ledger`] trait (read a balance, move value between two accounts);
//! everything else is ordinary holder-facing bookkeeping.
//!
//! # Invariants
//!
//! - Conservation: Σ(balances) == total supply at all times
//! - Transfers are atomic: debit and credit happen together or not at all
//! - An absent account is identical to an account with balance zero

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod error;
pub mod ledger;
pub mod types;

// Re-exports
pub use error::{Error, Result};
pub use ledger::{Ledger, TokenLedger};
pub use types::{AccountId, Amount};
