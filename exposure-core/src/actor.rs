//! Actor-based concurrency for the exposure engine
//!
//! The host this engine targets does not hand us a globally-ordered
//! transaction sequencer, so the single-writer discipline is built here:
//! one task owns the engine, all operations arrive through a bounded
//! mailbox, and each runs to completion (success or rollback) before the
//! next begins. Read-then-write sequences inside an operation therefore
//! never interleave and need no further locking.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │              ExposureHandle (Clone)                   │
//! │         Sends messages to actor mailbox               │
//! └─────────────────────┬────────────────────────────────┘
//!                       │ mpsc::channel (bounded)
//!                       ▼
//! ┌──────────────────────────────────────────────────────┐
//! │             ExposureActor (Single Task)               │
//! │        ExposureEngine::increase / reduce / take       │
//! └──────────────────────────────────────────────────────┘
//! ```

use crate::{
    clock::Clock,
    engine::ExposureEngine,
    error::{Error, Result},
    store::ExposureStore,
    types::ExposureEvent,
};
use chrono::{DateTime, Utc};
use std::time::Instant;
use token_ledger::{AccountId, Amount, Ledger};
use tokio::sync::{broadcast, mpsc, oneshot};

/// Mailbox capacity; provides backpressure on bursty callers
const MAILBOX_CAPACITY: usize = 1000;

/// Message sent to the exposure actor
pub enum ExposureMessage {
    /// Raise an exposure (caller is the giver)
    Increase {
        /// Committing account
        giver: AccountId,
        /// Benefiting account
        taker: AccountId,
        /// Increment
        delta: Amount,
        /// Reply channel
        response: oneshot::Sender<Result<Amount>>,
    },

    /// Lower an exposure (caller is the giver)
    Reduce {
        /// Committing account
        giver: AccountId,
        /// Benefiting account
        taker: AccountId,
        /// Decrement
        amount: Amount,
        /// Reply channel
        response: oneshot::Sender<Result<Amount>>,
    },

    /// Draw down an exposure (caller is the taker)
    Take {
        /// Committing account
        giver: AccountId,
        /// Benefiting account
        taker: AccountId,
        /// Amount to draw
        amount: Amount,
        /// Reply channel
        response: oneshot::Sender<Result<()>>,
    },

    /// Effective (balance-clamped) exposure amount
    GetAmount {
        /// Committing account
        giver: AccountId,
        /// Benefiting account
        taker: AccountId,
        /// Reply channel
        response: oneshot::Sender<Result<Amount>>,
    },

    /// Raw stored expiry
    GetExpiry {
        /// Committing account
        giver: AccountId,
        /// Benefiting account
        taker: AccountId,
        /// Reply channel
        response: oneshot::Sender<Result<DateTime<Utc>>>,
    },

    /// Subscribe to state-change notifications
    Subscribe {
        /// Reply channel
        response: oneshot::Sender<broadcast::Receiver<ExposureEvent>>,
    },

    /// Shutdown actor
    Shutdown,
}

/// Actor that serializes engine operations
pub struct ExposureActor<L, S, C> {
    /// The engine, owned exclusively by this task
    engine: ExposureEngine<L, S, C>,

    /// Mailbox for incoming messages
    mailbox: mpsc::Receiver<ExposureMessage>,
}

impl<L, S, C> ExposureActor<L, S, C>
where
    L: Ledger,
    S: ExposureStore,
    C: Clock,
{
    /// Create new actor
    pub fn new(engine: ExposureEngine<L, S, C>, mailbox: mpsc::Receiver<ExposureMessage>) -> Self {
        Self { engine, mailbox }
    }

    /// Run the actor event loop
    pub async fn run(mut self) {
        while let Some(msg) = self.mailbox.recv().await {
            match msg {
                ExposureMessage::Shutdown => break,
                msg => self.handle_message(msg),
            }
        }

        tracing::debug!("Exposure actor stopped");
    }

    /// Handle a single message
    fn handle_message(&mut self, msg: ExposureMessage) {
        match msg {
            ExposureMessage::Increase {
                giver,
                taker,
                delta,
                response,
            } => {
                let start = Instant::now();
                let result = self.engine.increase_exposure(&giver, &taker, delta);
                self.engine
                    .metrics()
                    .record_op_duration(start.elapsed().as_secs_f64());
                let _ = response.send(result);
            }

            ExposureMessage::Reduce {
                giver,
                taker,
                amount,
                response,
            } => {
                let start = Instant::now();
                let result = self.engine.reduce_exposure(&giver, &taker, amount);
                self.engine
                    .metrics()
                    .record_op_duration(start.elapsed().as_secs_f64());
                let _ = response.send(result);
            }

            ExposureMessage::Take {
                giver,
                taker,
                amount,
                response,
            } => {
                let start = Instant::now();
                let result = self.engine.take_exposure(&giver, &taker, amount);
                self.engine
                    .metrics()
                    .record_op_duration(start.elapsed().as_secs_f64());
                let _ = response.send(result);
            }

            ExposureMessage::GetAmount {
                giver,
                taker,
                response,
            } => {
                let result = self.engine.current_exposure_amount(&giver, &taker);
                let _ = response.send(result);
            }

            ExposureMessage::GetExpiry {
                giver,
                taker,
                response,
            } => {
                let result = self.engine.current_exposure_expiry(&giver, &taker);
                let _ = response.send(result);
            }

            ExposureMessage::Subscribe { response } => {
                let _ = response.send(self.engine.subscribe());
            }

            ExposureMessage::Shutdown => {
                // Handled in main loop
            }
        }
    }
}

/// Handle for sending messages to the actor
#[derive(Clone)]
pub struct ExposureHandle {
    sender: mpsc::Sender<ExposureMessage>,
}

impl ExposureHandle {
    /// Create new handle
    pub fn new(sender: mpsc::Sender<ExposureMessage>) -> Self {
        Self { sender }
    }

    /// Raise the exposure `giver` grants `taker`; returns the new stored
    /// amount
    pub async fn increase_exposure(
        &self,
        giver: AccountId,
        taker: AccountId,
        delta: Amount,
    ) -> Result<Amount> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(ExposureMessage::Increase {
                giver,
                taker,
                delta,
                response: tx,
            })
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Lower the exposure `giver` grants `taker`; returns the remaining
    /// stored amount
    pub async fn reduce_exposure(
        &self,
        giver: AccountId,
        taker: AccountId,
        amount: Amount,
    ) -> Result<Amount> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(ExposureMessage::Reduce {
                giver,
                taker,
                amount,
                response: tx,
            })
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Draw down the exposure `giver` grants `taker`
    pub async fn take_exposure(
        &self,
        giver: AccountId,
        taker: AccountId,
        amount: Amount,
    ) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(ExposureMessage::Take {
                giver,
                taker,
                amount,
                response: tx,
            })
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Effective (balance-clamped) exposure amount
    pub async fn current_exposure_amount(
        &self,
        giver: AccountId,
        taker: AccountId,
    ) -> Result<Amount> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(ExposureMessage::GetAmount {
                giver,
                taker,
                response: tx,
            })
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Raw stored expiry
    pub async fn current_exposure_expiry(
        &self,
        giver: AccountId,
        taker: AccountId,
    ) -> Result<DateTime<Utc>> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(ExposureMessage::GetExpiry {
                giver,
                taker,
                response: tx,
            })
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Subscribe to state-change notifications
    pub async fn subscribe(&self) -> Result<broadcast::Receiver<ExposureEvent>> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(ExposureMessage::Subscribe { response: tx })
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))
    }

    /// Shutdown actor
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(ExposureMessage::Shutdown)
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;
        Ok(())
    }
}

/// Spawn the exposure actor, taking ownership of the engine
pub fn spawn_exposure_actor<L, S, C>(engine: ExposureEngine<L, S, C>) -> ExposureHandle
where
    L: Ledger + 'static,
    S: ExposureStore + 'static,
    C: Clock + 'static,
{
    let (tx, rx) = mpsc::channel(MAILBOX_CAPACITY);
    let actor = ExposureActor::new(engine, rx);

    tokio::spawn(async move {
        actor.run().await;
    });

    ExposureHandle::new(tx)
}
