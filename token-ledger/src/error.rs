//! Error types for the token ledger

use crate::types::{AccountId, Amount};
use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
    /// Debit larger than the account's balance
    #[error("Insufficient balance: {account} holds {available}, required {required}")]
    InsufficientBalance {
        /// Account being debited
        account: AccountId,
        /// Balance at the time of the attempt
        available: Amount,
        /// Amount the operation needed
        required: Amount,
    },

    /// Spend larger than the allowance granted to the spender
    #[error("Insufficient allowance: {spender} may spend {available} of {owner}'s funds, required {required}")]
    InsufficientAllowance {
        /// Account whose funds are being spent
        owner: AccountId,
        /// Account doing the spending
        spender: AccountId,
        /// Allowance at the time of the attempt
        available: Amount,
        /// Amount the operation needed
        required: Amount,
    },

    /// Mint that would overflow the total supply
    #[error("Total supply would overflow")]
    SupplyOverflow,
}
