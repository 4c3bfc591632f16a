//! Account balances, transfers, and allowances
//!
//! [`Ledger`] is the two-method seam consumed by the exposure engine.
//! [`TokenLedger`] is the in-process implementation backing it, plus the
//! holder-facing operations (mint, burn, approvals) that never cross that
//! seam.

use crate::{
    error::{Error, Result},
    types::{AccountId, Amount},
};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Read/move interface the exposure engine depends on
pub trait Ledger: Send + Sync {
    /// Current balance; zero for accounts the ledger has never seen
    fn balance_of(&self, account: &AccountId) -> Amount;

    /// Atomically move `amount` from one account to another.
    ///
    /// Fails with [`Error::InsufficientBalance`] when `from` is short; on
    /// failure neither balance changes.
    fn transfer(&self, from: &AccountId, to: &AccountId, amount: Amount) -> Result<()>;
}

/// Mutable ledger state, guarded as one unit so a transfer's debit and
/// credit are observed together
struct State {
    balances: HashMap<AccountId, Amount>,
    allowances: HashMap<(AccountId, AccountId), Amount>,
    total_supply: Amount,
}

/// Single-asset in-memory token ledger
pub struct TokenLedger {
    state: RwLock<State>,
}

impl TokenLedger {
    /// Create an empty ledger with zero supply
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State {
                balances: HashMap::new(),
                allowances: HashMap::new(),
                total_supply: 0,
            }),
        }
    }

    /// Create `amount` new units credited to `to`
    pub fn mint(&self, to: &AccountId, amount: Amount) -> Result<()> {
        let mut state = self.state.write();

        let new_supply = state
            .total_supply
            .checked_add(amount)
            .ok_or(Error::SupplyOverflow)?;

        state.total_supply = new_supply;
        credit(&mut state, to, amount);

        tracing::debug!(account = %to, amount, total_supply = state.total_supply, "Minted");
        Ok(())
    }

    /// Destroy `amount` units held by `from`
    pub fn burn(&self, from: &AccountId, amount: Amount) -> Result<()> {
        let mut state = self.state.write();

        debit(&mut state, from, amount)?;
        state.total_supply -= amount;

        tracing::debug!(account = %from, amount, total_supply = state.total_supply, "Burned");
        Ok(())
    }

    /// Grant `spender` the right to move up to `amount` of `owner`'s funds.
    ///
    /// Replaces any prior allowance for the pair.
    pub fn approve(&self, owner: &AccountId, spender: &AccountId, amount: Amount) {
        let mut state = self.state.write();
        state
            .allowances
            .insert((owner.clone(), spender.clone()), amount);

        tracing::debug!(owner = %owner, spender = %spender, amount, "Allowance set");
    }

    /// Remaining allowance for the (owner, spender) pair
    pub fn allowance(&self, owner: &AccountId, spender: &AccountId) -> Amount {
        let state = self.state.read();
        state
            .allowances
            .get(&(owner.clone(), spender.clone()))
            .copied()
            .unwrap_or(0)
    }

    /// Move `amount` of `owner`'s funds to `to`, spending `spender`'s
    /// allowance
    pub fn transfer_from(
        &self,
        spender: &AccountId,
        owner: &AccountId,
        to: &AccountId,
        amount: Amount,
    ) -> Result<()> {
        let mut state = self.state.write();

        let key = (owner.clone(), spender.clone());
        let available = state.allowances.get(&key).copied().unwrap_or(0);
        if available < amount {
            return Err(Error::InsufficientAllowance {
                owner: owner.clone(),
                spender: spender.clone(),
                available,
                required: amount,
            });
        }

        debit(&mut state, owner, amount)?;
        credit(&mut state, to, amount);
        state.allowances.insert(key, available - amount);

        tracing::debug!(spender = %spender, owner = %owner, to = %to, amount, "Transferred from allowance");
        Ok(())
    }

    /// Total units in circulation
    pub fn total_supply(&self) -> Amount {
        self.state.read().total_supply
    }
}

impl Default for TokenLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger for TokenLedger {
    fn balance_of(&self, account: &AccountId) -> Amount {
        self.state.read().balances.get(account).copied().unwrap_or(0)
    }

    fn transfer(&self, from: &AccountId, to: &AccountId, amount: Amount) -> Result<()> {
        let mut state = self.state.write();

        // Debit before credit also covers from == to: the balance is still
        // required, the net effect is nil.
        debit(&mut state, from, amount)?;
        credit(&mut state, to, amount);

        tracing::debug!(from = %from, to = %to, amount, "Transferred");
        Ok(())
    }
}

impl<L: Ledger + ?Sized> Ledger for std::sync::Arc<L> {
    fn balance_of(&self, account: &AccountId) -> Amount {
        (**self).balance_of(account)
    }

    fn transfer(&self, from: &AccountId, to: &AccountId, amount: Amount) -> Result<()> {
        (**self).transfer(from, to, amount)
    }
}

fn debit(state: &mut State, account: &AccountId, amount: Amount) -> Result<()> {
    let available = state.balances.get(account).copied().unwrap_or(0);
    let remaining = available
        .checked_sub(amount)
        .ok_or_else(|| Error::InsufficientBalance {
            account: account.clone(),
            available,
            required: amount,
        })?;

    state.balances.insert(account.clone(), remaining);
    Ok(())
}

fn credit(state: &mut State, account: &AccountId, amount: Amount) {
    let entry = state.balances.entry(account.clone()).or_insert(0);
    // Cannot overflow: Σ(balances) == total_supply, checked at mint
    *entry += amount;
}
