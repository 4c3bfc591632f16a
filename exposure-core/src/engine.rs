//! Exposure engine
//!
//! The exposure state machine: how peer-to-peer allowances are created,
//! capped against a moving balance, expired, reduced, and consumed.
//!
//! # Invariants
//!
//! - Effective exposure never exceeds the giver's live balance; the stored
//!   amount is only a high-water mark
//! - A record's amount and expiry are replaced together, never separately
//! - Every reduction (giver-initiated or take-driven) goes through one write
//!   path, which clamps and preserves expiry
//! - A take rewrites the record before any value moves
//!
//! The engine performs no locking of its own: operations must not
//! interleave. Run it behind the single-writer actor
//! ([`crate::actor::spawn_exposure_actor`]) or provide an equivalent
//! serialization discipline.

use crate::{
    clock::Clock,
    error::{Error, Result},
    metrics::Metrics,
    store::ExposureStore,
    types::{Exposure, ExposureEvent},
};
use chrono::{DateTime, Duration, Utc};
use token_ledger::{AccountId, Amount, Ledger};
use tokio::sync::broadcast;

/// Capacity of the notification channel; lagging subscribers lose oldest
/// events first
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Exposure engine over a ledger, a record store, and a clock
pub struct ExposureEngine<L, S, C> {
    /// Balance/transfer collaborator
    ledger: L,

    /// Exposure record store, owned exclusively by this engine
    store: S,

    /// Time source for the reduction lock
    clock: C,

    /// Account credited with the operator share of every take
    operator: AccountId,

    /// Lock window applied by every successful increase
    lock_duration: Duration,

    /// Notification fan-out
    events: broadcast::Sender<ExposureEvent>,

    /// Prometheus collectors
    metrics: Metrics,
}

impl<L, S, C> ExposureEngine<L, S, C>
where
    L: Ledger,
    S: ExposureStore,
    C: Clock,
{
    /// Create an engine with the default 14-day lock window
    pub fn new(ledger: L, store: S, clock: C, operator: AccountId) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            ledger,
            store,
            clock,
            operator,
            lock_duration: Duration::seconds(crate::config::DEFAULT_LOCK_SECS as i64),
            events,
            metrics: Metrics::default(),
        }
    }

    /// Override the lock window
    pub fn with_lock_duration(mut self, lock_duration: Duration) -> Self {
        self.lock_duration = lock_duration;
        self
    }

    /// Subscribe to state-change notifications
    pub fn subscribe(&self) -> broadcast::Receiver<ExposureEvent> {
        self.events.subscribe()
    }

    /// Engine metrics
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Operator account
    pub fn operator(&self) -> &AccountId {
        &self.operator
    }

    /// Raise the exposure `giver` grants `taker` by `delta`.
    ///
    /// The caller is the giver. The *stored* amount plus the increment must
    /// fit within the giver's current balance — checking only the effective
    /// amount would let a giver re-arm a balance-clamped exposure for free.
    /// Every successful increase resets the expiry to a full lock window
    /// from now. No value moves. Returns the new stored amount.
    pub fn increase_exposure(
        &self,
        giver: &AccountId,
        taker: &AccountId,
        delta: Amount,
    ) -> Result<Amount> {
        if delta == 0 {
            return Err(Error::InvalidAmount);
        }

        let stored = self.store.get(giver, taker)?;
        let balance = self.ledger.balance_of(giver);

        let new_amount = stored
            .amount
            .checked_add(delta)
            .filter(|total| *total <= balance)
            .ok_or(Error::ExceedsBalance {
                stored: stored.amount,
                delta,
                balance,
            })?;

        let now = self.clock.now();
        let record = Exposure {
            amount: new_amount,
            expiry: now + self.lock_duration,
        };
        self.store.put(giver, taker, record)?;

        self.metrics.record_increase();
        tracing::info!(
            giver = %giver,
            taker = %taker,
            delta,
            amount = new_amount,
            expiry = %record.expiry,
            "Exposure increased"
        );
        self.emit(ExposureEvent::updated(
            now,
            giver.clone(),
            taker.clone(),
            new_amount,
        ));

        Ok(new_amount)
    }

    /// Lower the exposure `giver` grants `taker` by `amount`.
    ///
    /// The caller is the giver. Forbidden while the lock is active,
    /// regardless of the requested amount; after that, the request must not
    /// exceed the effective (balance-clamped) exposure. The expiry is left
    /// untouched. Returns the remaining stored amount.
    pub fn reduce_exposure(
        &self,
        giver: &AccountId,
        taker: &AccountId,
        amount: Amount,
    ) -> Result<Amount> {
        let stored = self.store.get(giver, taker)?;
        let now = self.clock.now();

        if !stored.unlocked_at(now) {
            return Err(Error::ExposureLocked {
                expiry: stored.expiry,
            });
        }

        let effective = self.effective(&stored, giver);
        if amount > effective {
            return Err(Error::ExceedsExposure {
                requested: amount,
                effective,
            });
        }

        let record = self.reduce_stored(giver, taker, amount)?;

        self.metrics.record_reduce();
        tracing::info!(
            giver = %giver,
            taker = %taker,
            amount,
            remaining = record.amount,
            "Exposure reduced"
        );
        self.emit(ExposureEvent::updated(
            now,
            giver.clone(),
            taker.clone(),
            record.amount,
        ));

        Ok(record.amount)
    }

    /// Draw `amount` from the exposure `giver` grants `taker`.
    ///
    /// The caller is the taker; the lock never gates a take. The drawn
    /// amount splits into `amount / 2` for the taker and the rest — the odd
    /// unit included — for the operator. The record is rewritten before
    /// either transfer, so a nested call cannot reuse the allowance. If a
    /// transfer fails anyway, the record and any completed leg are rolled
    /// back and the ledger error surfaces unchanged.
    pub fn take_exposure(
        &self,
        giver: &AccountId,
        taker: &AccountId,
        amount: Amount,
    ) -> Result<()> {
        if amount == 0 {
            return Err(Error::InvalidAmount);
        }

        let stored = self.store.get(giver, taker)?;
        let effective = self.effective(&stored, giver);
        if amount > effective {
            return Err(Error::ExceedsExposure {
                requested: amount,
                effective,
            });
        }

        let record = self.reduce_stored(giver, taker, amount)?;

        let to_taker = amount / 2;
        let to_owner = amount - to_taker;

        if let Err(err) = self.ledger.transfer(giver, &self.operator, to_owner) {
            self.store.put(giver, taker, stored)?;
            tracing::warn!(giver = %giver, taker = %taker, amount, %err, "Take rolled back");
            return Err(err.into());
        }

        if let Err(err) = self.ledger.transfer(giver, taker, to_taker) {
            // Refund the operator leg, then restore the record. The refund
            // cannot be short: the operator was credited to_owner in this
            // same serialized operation.
            self.ledger.transfer(&self.operator, giver, to_owner)?;
            self.store.put(giver, taker, stored)?;
            tracing::warn!(giver = %giver, taker = %taker, amount, %err, "Take rolled back");
            return Err(err.into());
        }

        let now = self.clock.now();
        self.metrics.record_take(amount);
        tracing::info!(
            giver = %giver,
            taker = %taker,
            amount,
            to_taker,
            to_owner,
            remaining = record.amount,
            "Exposure taken"
        );
        self.emit(ExposureEvent::updated(
            now,
            giver.clone(),
            taker.clone(),
            record.amount,
        ));
        self.emit(ExposureEvent::taken(
            now,
            giver.clone(),
            taker.clone(),
            amount,
        ));

        Ok(())
    }

    /// Effective exposure: the stored amount clamped to the giver's current
    /// balance. This is the enforceable limit, not the stored field.
    pub fn current_exposure_amount(&self, giver: &AccountId, taker: &AccountId) -> Result<Amount> {
        let stored = self.store.get(giver, taker)?;
        Ok(self.effective(&stored, giver))
    }

    /// Raw stored expiry, unclamped
    pub fn current_exposure_expiry(
        &self,
        giver: &AccountId,
        taker: &AccountId,
    ) -> Result<DateTime<Utc>> {
        let stored = self.store.get(giver, taker)?;
        Ok(stored.expiry)
    }

    fn effective(&self, stored: &Exposure, giver: &AccountId) -> Amount {
        stored.amount.min(self.ledger.balance_of(giver))
    }

    /// Single write path for every reduction.
    ///
    /// Clamps to the stored amount (over-reduction is capped, not an error)
    /// and preserves the expiry verbatim; only [`Self::increase_exposure`]
    /// ever moves the expiry.
    fn reduce_stored(
        &self,
        giver: &AccountId,
        taker: &AccountId,
        amount: Amount,
    ) -> Result<Exposure> {
        let stored = self.store.get(giver, taker)?;
        let clamped = amount.min(stored.amount);
        let record = Exposure {
            amount: stored.amount - clamped,
            expiry: stored.expiry,
        };
        self.store.put(giver, taker, record)?;
        Ok(record)
    }

    fn emit(&self, event: ExposureEvent) {
        // No receivers is fine; notification is best-effort
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::MemoryExposureStore;
    use crate::types::ExposureEventKind;
    use std::sync::Arc;
    use token_ledger::TokenLedger;

    type TestEngine = ExposureEngine<Arc<TokenLedger>, MemoryExposureStore, Arc<ManualClock>>;

    fn acct(name: &str) -> AccountId {
        AccountId::new(name)
    }

    fn setup() -> (TestEngine, Arc<TokenLedger>, Arc<ManualClock>) {
        let ledger = Arc::new(TokenLedger::new());
        let clock = Arc::new(ManualClock::new(DateTime::<Utc>::UNIX_EPOCH));
        let engine = ExposureEngine::new(
            ledger.clone(),
            MemoryExposureStore::new(),
            clock.clone(),
            acct("operator"),
        );
        (engine, ledger, clock)
    }

    #[test]
    fn test_increase_rejects_zero_delta() {
        let (engine, ledger, _) = setup();
        ledger.mint(&acct("giver"), 100).unwrap();

        let err = engine
            .increase_exposure(&acct("giver"), &acct("taker"), 0)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidAmount));
    }

    #[test]
    fn test_increase_rejects_amount_over_balance() {
        let (engine, ledger, _) = setup();
        ledger.mint(&acct("giver"), 100).unwrap();

        let err = engine
            .increase_exposure(&acct("giver"), &acct("taker"), 101)
            .unwrap_err();
        assert!(matches!(err, Error::ExceedsBalance { .. }));

        // Nothing written
        assert_eq!(
            engine
                .current_exposure_amount(&acct("giver"), &acct("taker"))
                .unwrap(),
            0
        );
    }

    #[test]
    fn test_increase_checks_stored_not_effective() {
        let (engine, ledger, _) = setup();
        ledger.mint(&acct("giver"), 100).unwrap();

        engine
            .increase_exposure(&acct("giver"), &acct("taker"), 80)
            .unwrap();

        // Drop the balance so the effective amount clamps to 40
        ledger.transfer(&acct("giver"), &acct("other"), 60).unwrap();
        assert_eq!(
            engine
                .current_exposure_amount(&acct("giver"), &acct("taker"))
                .unwrap(),
            40
        );

        // stored (80) + 10 > balance (40): rejected even though
        // effective (40) + 10 would fit
        let err = engine
            .increase_exposure(&acct("giver"), &acct("taker"), 10)
            .unwrap_err();
        assert!(matches!(err, Error::ExceedsBalance { .. }));
    }

    #[test]
    fn test_increase_handles_overflow() {
        let (engine, ledger, _) = setup();
        ledger.mint(&acct("giver"), Amount::MAX).unwrap();

        engine
            .increase_exposure(&acct("giver"), &acct("taker"), Amount::MAX)
            .unwrap();

        let err = engine
            .increase_exposure(&acct("giver"), &acct("taker"), 1)
            .unwrap_err();
        assert!(matches!(err, Error::ExceedsBalance { .. }));
    }

    #[test]
    fn test_increase_accumulates_and_resets_expiry() {
        let (engine, ledger, clock) = setup();
        ledger.mint(&acct("giver"), 100).unwrap();

        engine
            .increase_exposure(&acct("giver"), &acct("taker"), 30)
            .unwrap();
        let first_expiry = engine
            .current_exposure_expiry(&acct("giver"), &acct("taker"))
            .unwrap();
        assert_eq!(first_expiry, clock.now() + Duration::days(14));

        clock.advance(Duration::days(5));
        engine
            .increase_exposure(&acct("giver"), &acct("taker"), 20)
            .unwrap();

        assert_eq!(
            engine
                .current_exposure_amount(&acct("giver"), &acct("taker"))
                .unwrap(),
            50
        );
        // Second increase re-arms the lock from its own time
        assert_eq!(
            engine
                .current_exposure_expiry(&acct("giver"), &acct("taker"))
                .unwrap(),
            clock.now() + Duration::days(14)
        );
    }

    #[test]
    fn test_reduce_locked_until_expiry_lapses() {
        let (engine, ledger, clock) = setup();
        ledger.mint(&acct("giver"), 100).unwrap();
        engine
            .increase_exposure(&acct("giver"), &acct("taker"), 50)
            .unwrap();

        // Locked: even a zero reduce is rejected
        let err = engine
            .reduce_exposure(&acct("giver"), &acct("taker"), 0)
            .unwrap_err();
        assert!(matches!(err, Error::ExposureLocked { .. }));

        // Exactly at expiry the lock still holds (strict comparison)
        clock.advance(Duration::days(14));
        let err = engine
            .reduce_exposure(&acct("giver"), &acct("taker"), 10)
            .unwrap_err();
        assert!(matches!(err, Error::ExposureLocked { .. }));

        clock.advance(Duration::seconds(1));
        let remaining = engine
            .reduce_exposure(&acct("giver"), &acct("taker"), 10)
            .unwrap();
        assert_eq!(remaining, 40);
    }

    #[test]
    fn test_reduce_preserves_expiry() {
        let (engine, ledger, clock) = setup();
        ledger.mint(&acct("giver"), 100).unwrap();
        engine
            .increase_exposure(&acct("giver"), &acct("taker"), 50)
            .unwrap();
        let expiry = engine
            .current_exposure_expiry(&acct("giver"), &acct("taker"))
            .unwrap();

        clock.advance(Duration::days(15));
        engine
            .reduce_exposure(&acct("giver"), &acct("taker"), 10)
            .unwrap();

        assert_eq!(
            engine
                .current_exposure_expiry(&acct("giver"), &acct("taker"))
                .unwrap(),
            expiry
        );
    }

    #[test]
    fn test_reduce_capped_by_effective_amount() {
        let (engine, ledger, clock) = setup();
        ledger.mint(&acct("giver"), 100).unwrap();
        engine
            .increase_exposure(&acct("giver"), &acct("taker"), 50)
            .unwrap();
        clock.advance(Duration::days(15));

        // Balance drops to 30, clamping the effective amount
        ledger.transfer(&acct("giver"), &acct("other"), 70).unwrap();

        let err = engine
            .reduce_exposure(&acct("giver"), &acct("taker"), 31)
            .unwrap_err();
        assert!(matches!(err, Error::ExceedsExposure { .. }));

        // Reducing by exactly the effective amount works; the stored
        // amount drops from its high-water mark by that much
        engine
            .reduce_exposure(&acct("giver"), &acct("taker"), 30)
            .unwrap();
        assert_eq!(
            engine
                .current_exposure_amount(&acct("giver"), &acct("taker"))
                .unwrap(),
            20
        );
    }

    #[test]
    fn test_reduce_to_zero() {
        let (engine, ledger, clock) = setup();
        ledger.mint(&acct("giver"), 100).unwrap();
        engine
            .increase_exposure(&acct("giver"), &acct("taker"), 50)
            .unwrap();
        clock.advance(Duration::days(15));

        let remaining = engine
            .reduce_exposure(&acct("giver"), &acct("taker"), 50)
            .unwrap();
        assert_eq!(remaining, 0);
    }

    #[test]
    fn test_take_splits_between_taker_and_operator() {
        let (engine, ledger, _) = setup();
        ledger.mint(&acct("giver"), 100).unwrap();
        engine
            .increase_exposure(&acct("giver"), &acct("taker"), 50)
            .unwrap();

        engine
            .take_exposure(&acct("giver"), &acct("taker"), 31)
            .unwrap();

        // Floor to the taker, remainder to the operator
        assert_eq!(ledger.balance_of(&acct("taker")), 15);
        assert_eq!(ledger.balance_of(&acct("operator")), 16);
        assert_eq!(ledger.balance_of(&acct("giver")), 69);

        assert_eq!(
            engine
                .current_exposure_amount(&acct("giver"), &acct("taker"))
                .unwrap(),
            19
        );
    }

    #[test]
    fn test_take_rejects_zero_amount() {
        let (engine, ledger, _) = setup();
        ledger.mint(&acct("giver"), 100).unwrap();
        engine
            .increase_exposure(&acct("giver"), &acct("taker"), 50)
            .unwrap();

        let err = engine
            .take_exposure(&acct("giver"), &acct("taker"), 0)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidAmount));
    }

    #[test]
    fn test_take_ignores_lock() {
        let (engine, ledger, _) = setup();
        ledger.mint(&acct("giver"), 100).unwrap();
        engine
            .increase_exposure(&acct("giver"), &acct("taker"), 50)
            .unwrap();

        // Lock is active; the taker may still draw
        engine
            .take_exposure(&acct("giver"), &acct("taker"), 10)
            .unwrap();
        assert_eq!(
            engine
                .current_exposure_amount(&acct("giver"), &acct("taker"))
                .unwrap(),
            40
        );
    }

    #[test]
    fn test_take_clamped_by_balance_drop() {
        let (engine, ledger, _) = setup();
        ledger.mint(&acct("giver"), 100).unwrap();
        engine
            .increase_exposure(&acct("giver"), &acct("taker"), 50)
            .unwrap();

        // External transfer shrinks the effective exposure to 30
        ledger.transfer(&acct("giver"), &acct("other"), 70).unwrap();

        let err = engine
            .take_exposure(&acct("giver"), &acct("taker"), 50)
            .unwrap_err();
        assert!(matches!(err, Error::ExceedsExposure { .. }));

        engine
            .take_exposure(&acct("giver"), &acct("taker"), 30)
            .unwrap();
        assert_eq!(ledger.balance_of(&acct("taker")), 15);
        assert_eq!(ledger.balance_of(&acct("operator")), 15);
        assert_eq!(ledger.balance_of(&acct("giver")), 0);
    }

    #[test]
    fn test_take_conserves_total_supply() {
        let (engine, ledger, _) = setup();
        ledger.mint(&acct("giver"), 100).unwrap();
        engine
            .increase_exposure(&acct("giver"), &acct("taker"), 50)
            .unwrap();

        engine
            .take_exposure(&acct("giver"), &acct("taker"), 33)
            .unwrap();

        let sum = ledger.balance_of(&acct("giver"))
            + ledger.balance_of(&acct("taker"))
            + ledger.balance_of(&acct("operator"));
        assert_eq!(sum, 100);
        assert_eq!(ledger.total_supply(), 100);
    }

    #[test]
    fn test_take_with_giver_as_operator() {
        let ledger = Arc::new(TokenLedger::new());
        let clock = Arc::new(ManualClock::new(DateTime::<Utc>::UNIX_EPOCH));
        let engine = ExposureEngine::new(
            ledger.clone(),
            MemoryExposureStore::new(),
            clock,
            acct("giver"),
        );
        ledger.mint(&acct("giver"), 100).unwrap();
        engine
            .increase_exposure(&acct("giver"), &acct("taker"), 40)
            .unwrap();

        // Operator share returns to the giver; only the taker half leaves
        engine
            .take_exposure(&acct("giver"), &acct("taker"), 40)
            .unwrap();
        assert_eq!(ledger.balance_of(&acct("giver")), 80);
        assert_eq!(ledger.balance_of(&acct("taker")), 20);
    }

    #[test]
    fn test_opposite_direction_exposure_untouched_by_take() {
        let (engine, ledger, _) = setup();
        ledger.mint(&acct("a"), 100).unwrap();
        ledger.mint(&acct("b"), 100).unwrap();
        engine.increase_exposure(&acct("a"), &acct("b"), 50).unwrap();
        engine.increase_exposure(&acct("b"), &acct("a"), 60).unwrap();

        engine.take_exposure(&acct("a"), &acct("b"), 20).unwrap();

        // b's own grant toward a is a separate record
        assert_eq!(
            engine.current_exposure_amount(&acct("a"), &acct("b")).unwrap(),
            30
        );
        assert_eq!(
            engine.current_exposure_amount(&acct("b"), &acct("a")).unwrap(),
            60
        );
    }

    #[test]
    fn test_projections_on_untouched_pair() {
        let (engine, _, _) = setup();
        assert_eq!(
            engine
                .current_exposure_amount(&acct("nobody"), &acct("anyone"))
                .unwrap(),
            0
        );
        assert_eq!(
            engine
                .current_exposure_expiry(&acct("nobody"), &acct("anyone"))
                .unwrap(),
            DateTime::<Utc>::UNIX_EPOCH
        );
    }

    #[test]
    fn test_events_emitted_on_take() {
        let (engine, ledger, _) = setup();
        let mut rx = engine.subscribe();

        ledger.mint(&acct("giver"), 100).unwrap();
        engine
            .increase_exposure(&acct("giver"), &acct("taker"), 50)
            .unwrap();
        engine
            .take_exposure(&acct("giver"), &acct("taker"), 20)
            .unwrap();

        // increase: Updated(50); take: Updated(30) then Taken(20)
        let first = rx.try_recv().unwrap();
        assert_eq!(
            first.kind,
            ExposureEventKind::Updated {
                giver: acct("giver"),
                taker: acct("taker"),
                amount: 50
            }
        );

        let second = rx.try_recv().unwrap();
        assert_eq!(
            second.kind,
            ExposureEventKind::Updated {
                giver: acct("giver"),
                taker: acct("taker"),
                amount: 30
            }
        );

        let third = rx.try_recv().unwrap();
        assert_eq!(
            third.kind,
            ExposureEventKind::Taken {
                giver: acct("giver"),
                taker: acct("taker"),
                amount: 20
            }
        );
    }

    #[test]
    fn test_failed_operations_emit_nothing() {
        let (engine, ledger, _) = setup();
        let mut rx = engine.subscribe();

        ledger.mint(&acct("giver"), 10).unwrap();
        let _ = engine.increase_exposure(&acct("giver"), &acct("taker"), 11);
        let _ = engine.take_exposure(&acct("giver"), &acct("taker"), 5);

        assert!(rx.try_recv().is_err());
    }
}
