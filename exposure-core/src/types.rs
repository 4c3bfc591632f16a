//! Core types for the exposure engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use token_ledger::{AccountId, Amount};
use uuid::Uuid;

/// Exposure record for one ordered (giver, taker) pair
///
/// `amount` is the nominal amount as last written — a high-water mark, not
/// the enforceable limit. The limit applied to every reduction check and
/// every take is the amount clamped to the giver's live balance; see
/// [`crate::engine::ExposureEngine::current_exposure_amount`].
///
/// `amount` and `expiry` are only ever replaced together, as one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exposure {
    /// Nominal exposure amount as last written
    pub amount: Amount,

    /// Earliest time at which the giver may unilaterally reduce this
    /// exposure below its effective amount
    pub expiry: DateTime<Utc>,
}

impl Exposure {
    /// True once the giver-side reduction lock has lapsed at `now`
    pub fn unlocked_at(&self, now: DateTime<Utc>) -> bool {
        self.expiry < now
    }
}

impl Default for Exposure {
    fn default() -> Self {
        // Absence of a record and the zero record are the same state
        Self {
            amount: 0,
            expiry: DateTime::<Utc>::UNIX_EPOCH,
        }
    }
}

/// Notification emitted after a successful state change
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExposureEvent {
    /// Event ID (UUIDv7 for time-ordering)
    pub id: Uuid,

    /// Emission time, from the engine's clock
    pub at: DateTime<Utc>,

    /// What happened
    pub kind: ExposureEventKind,
}

/// Event payloads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExposureEventKind {
    /// An exposure record was rewritten; carries the new stored amount
    Updated {
        /// Committing account
        giver: AccountId,
        /// Benefiting account
        taker: AccountId,
        /// Stored amount after the write
        amount: Amount,
    },

    /// A taker drew down an exposure; carries the drawn amount
    Taken {
        /// Account whose balance was drawn
        giver: AccountId,
        /// Account that performed the draw
        taker: AccountId,
        /// Total amount drawn (before the operator split)
        amount: Amount,
    },
}

impl ExposureEvent {
    /// Record-update notification
    pub fn updated(at: DateTime<Utc>, giver: AccountId, taker: AccountId, amount: Amount) -> Self {
        Self {
            id: Uuid::now_v7(),
            at,
            kind: ExposureEventKind::Updated {
                giver,
                taker,
                amount,
            },
        }
    }

    /// Draw-down notification
    pub fn taken(at: DateTime<Utc>, giver: AccountId, taker: AccountId, amount: Amount) -> Self {
        Self {
            id: Uuid::now_v7(),
            at,
            kind: ExposureEventKind::Taken {
                giver,
                taker,
                amount,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_default_exposure_is_zero_record() {
        let exposure = Exposure::default();
        assert_eq!(exposure.amount, 0);
        assert_eq!(exposure.expiry, DateTime::<Utc>::UNIX_EPOCH);
    }

    #[test]
    fn test_unlock_is_strict() {
        let expiry = DateTime::<Utc>::UNIX_EPOCH + Duration::days(14);
        let exposure = Exposure { amount: 10, expiry };

        // At the expiry instant the lock still holds
        assert!(!exposure.unlocked_at(expiry));
        assert!(exposure.unlocked_at(expiry + Duration::seconds(1)));
    }
}
