//! Core types for the token ledger

use serde::{Deserialize, Serialize};
use std::fmt;

/// Token amount in indivisible base units.
///
/// All arithmetic on amounts is checked; there is no fractional unit.
pub type Amount = u128;

/// Account identifier (opaque to the ledger)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountId(String);

impl AccountId {
    /// Create new account ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_id_display() {
        let account = AccountId::new("alice");
        assert_eq!(account.as_str(), "alice");
        assert_eq!(account.to_string(), "alice");
    }
}
