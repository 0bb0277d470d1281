//! Cart abandonment
//!
//! A periodic monitor promotes an idle, non-empty cart to an abandoned-cart
//! record carrying a unique recovery token and an incentive discount. The
//! record's lifecycle runs `Abandoned → Recovered → Converted` and never
//! reverts.

use std::{sync::Arc, time::Duration};

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    auth::UserProfile,
    cart::{CartItem, CartLedger},
    persistence::{ABANDONED_KEY, Persistence, SnapshotError, load_json, save_json},
};

/// Errors from recovery-token redemption.
///
/// Failures are rejected results with no side effects, never exceptions.
#[derive(Debug, Error)]
pub enum RecoveryError {
    /// No record carries the presented token.
    #[error("unknown recovery token")]
    UnknownToken,

    /// The record is not in a state this transition accepts.
    #[error("recovery token already used (cart is {status:?})")]
    NotRecoverable {
        /// Status the record is currently in.
        status: AbandonedStatus,
    },

    /// The abandoned-cart snapshot could not be persisted.
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

/// Lifecycle of an abandoned-cart record. Transitions never revert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AbandonedStatus {
    /// Captured by the monitor; recovery still open.
    Abandoned,
    /// Customer redeemed the recovery token.
    Recovered,
    /// Customer completed a purchase after recovering.
    Converted,
}

/// Snapshot of a cart the customer walked away from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbandonedCart {
    /// Record id.
    pub id: Uuid,
    /// Owner of the abandoned cart.
    pub user_id: String,
    /// Cart lines at the moment of abandonment.
    pub items: Vec<CartItem>,
    /// Cart subtotal at the moment of abandonment, in pesos.
    pub cart_value: u64,
    /// When the monitor captured the record.
    pub abandoned_at: Timestamp,
    /// Unique token redeemed to resume the cart.
    pub recovery_token: String,
    /// Incentive discount offered on recovery, in whole percent points.
    pub recovery_discount_percent: u8,
    /// Lifecycle status.
    pub status: AbandonedStatus,
    /// When the token was redeemed.
    pub recovered_at: Option<Timestamp>,
    /// When the recovered cart converted to a purchase.
    pub converted_at: Option<Timestamp>,
}

/// Persistent list of abandoned-cart records.
pub struct AbandonedCartStore {
    records: Vec<AbandonedCart>,
    store: Arc<dyn Persistence>,
}

impl AbandonedCartStore {
    /// Create an empty store writing snapshots to `store`.
    pub fn new(store: Arc<dyn Persistence>) -> Self {
        Self {
            records: Vec::new(),
            store,
        }
    }

    /// Restore records persisted by a previous session, or start empty.
    ///
    /// # Errors
    ///
    /// Returns a [`SnapshotError`] if the snapshot exists but cannot be
    /// decoded.
    pub fn restore(store: Arc<dyn Persistence>) -> Result<Self, SnapshotError> {
        let records = load_json(store.as_ref(), ABANDONED_KEY)?.unwrap_or_default();

        Ok(Self { records, store })
    }

    /// All records, oldest first.
    pub fn records(&self) -> &[AbandonedCart] {
        &self.records
    }

    /// Whether the user still has a record open in `Abandoned`.
    pub fn has_open_for(&self, user_id: &str) -> bool {
        self.records
            .iter()
            .any(|record| record.user_id == user_id && record.status == AbandonedStatus::Abandoned)
    }

    /// Look up a record by recovery token.
    pub fn find_by_token(&self, token: &str) -> Option<&AbandonedCart> {
        self.records
            .iter()
            .find(|record| record.recovery_token == token)
    }

    /// Token of the user's most recent `Recovered` record, awaiting
    /// conversion.
    pub fn recovered_token_for(&self, user_id: &str) -> Option<String> {
        self.records
            .iter()
            .rev()
            .find(|record| {
                record.user_id == user_id && record.status == AbandonedStatus::Recovered
            })
            .map(|record| record.recovery_token.clone())
    }

    /// Capture a new abandoned-cart record for `user`.
    ///
    /// # Errors
    ///
    /// Returns a [`SnapshotError`] if persisting fails.
    pub fn capture(
        &mut self,
        user: &UserProfile,
        items: Vec<CartItem>,
        cart_value: u64,
        recovery_discount_percent: u8,
        now: Timestamp,
    ) -> Result<AbandonedCart, SnapshotError> {
        let record = AbandonedCart {
            id: Uuid::now_v7(),
            user_id: user.id.clone(),
            items,
            cart_value,
            abandoned_at: now,
            recovery_token: format!("rcv_{}", Uuid::now_v7().simple()),
            recovery_discount_percent,
            status: AbandonedStatus::Abandoned,
            recovered_at: None,
            converted_at: None,
        };

        info!(
            user_id = %record.user_id,
            cart_value = record.cart_value,
            "cart abandoned"
        );

        self.records.push(record.clone());
        self.persist()?;

        Ok(record)
    }

    /// Redeem a recovery token: `Abandoned → Recovered`, exactly once.
    ///
    /// # Errors
    ///
    /// Returns [`RecoveryError::UnknownToken`] or
    /// [`RecoveryError::NotRecoverable`] without side effects; a snapshot
    /// error if persisting the transition fails.
    pub fn recover(&mut self, token: &str, now: Timestamp) -> Result<AbandonedCart, RecoveryError> {
        let record = self
            .records
            .iter_mut()
            .find(|record| record.recovery_token == token)
            .ok_or(RecoveryError::UnknownToken)?;

        if record.status != AbandonedStatus::Abandoned {
            return Err(RecoveryError::NotRecoverable {
                status: record.status,
            });
        }

        record.status = AbandonedStatus::Recovered;
        record.recovered_at = Some(now);

        let recovered = record.clone();

        info!(user_id = %recovered.user_id, "abandoned cart recovered");

        self.persist()?;

        Ok(recovered)
    }

    /// Record the purchase that followed a recovery: `Recovered → Converted`.
    ///
    /// Externally triggered by checkout, never by the monitor.
    ///
    /// # Errors
    ///
    /// Returns [`RecoveryError::UnknownToken`] or
    /// [`RecoveryError::NotRecoverable`]; a snapshot error if persisting the
    /// transition fails.
    pub fn mark_converted(&mut self, token: &str, now: Timestamp) -> Result<(), RecoveryError> {
        let record = self
            .records
            .iter_mut()
            .find(|record| record.recovery_token == token)
            .ok_or(RecoveryError::UnknownToken)?;

        if record.status != AbandonedStatus::Recovered {
            return Err(RecoveryError::NotRecoverable {
                status: record.status,
            });
        }

        record.status = AbandonedStatus::Converted;
        record.converted_at = Some(now);

        info!(user_id = %record.user_id, "recovered cart converted");

        self.persist()?;

        Ok(())
    }

    fn persist(&self) -> Result<(), SnapshotError> {
        save_json(self.store.as_ref(), ABANDONED_KEY, &self.records)
    }
}

/// Monitor configuration.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Idle minutes before a cart counts as abandoned.
    pub idle_threshold_minutes: i64,
    /// Incentive discount attached to new records, in whole percent points.
    pub recovery_discount_percent: u8,
    /// Wall-clock period between checks.
    pub poll_interval: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            idle_threshold_minutes: 30,
            recovery_discount_percent: 10,
            poll_interval: Duration::from_secs(60),
        }
    }
}

/// What a single monitor check did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    /// No signed-in user or empty cart; nothing inspected or touched.
    Skipped,
    /// Cart inspected; idle window restarted without a new record.
    Refreshed,
    /// A new abandoned-cart record was captured.
    Abandoned {
        /// Token for the freshly captured record.
        recovery_token: String,
    },
}

/// Timeout-driven abandonment detection over the session's cart.
#[derive(Debug, Clone, Default)]
pub struct AbandonedCartMonitor {
    config: MonitorConfig,
}

impl AbandonedCartMonitor {
    /// Create a monitor with the given thresholds.
    pub fn new(config: MonitorConfig) -> Self {
        Self { config }
    }

    /// The monitor's thresholds.
    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Run one check against the session's cart.
    ///
    /// With no signed-in user or an empty cart the check is a side-effect
    /// free no-op. Otherwise, a cart idle past the threshold — for a user
    /// with no record still `Abandoned` — is captured exactly once.
    ///
    /// # Errors
    ///
    /// Returns a [`SnapshotError`] if persisting a new record fails.
    pub fn check_once(
        &self,
        user: Option<&UserProfile>,
        cart: &CartLedger,
        last_activity: &mut Timestamp,
        store: &mut AbandonedCartStore,
        now: Timestamp,
    ) -> Result<CheckOutcome, SnapshotError> {
        let Some(user) = user else {
            return Ok(CheckOutcome::Skipped);
        };

        if cart.is_empty() {
            return Ok(CheckOutcome::Skipped);
        }

        let idle_minutes = (now.as_millisecond() - last_activity.as_millisecond()) / 60_000;

        let outcome = if idle_minutes > self.config.idle_threshold_minutes
            && !store.has_open_for(&user.id)
        {
            let record = store.capture(
                user,
                cart.snapshot(),
                cart.subtotal(),
                self.config.recovery_discount_percent,
                now,
            )?;

            CheckOutcome::Abandoned {
                recovery_token: record.recovery_token.clone(),
            }
        } else {
            debug!(idle_minutes, "abandonment check passed");

            CheckOutcome::Refreshed
        };

        // The idle window restarts from this check, not from the last cart
        // mutation. Long-standing storefront behavior, kept as-is.
        *last_activity = now;

        Ok(outcome)
    }
}

/// Handle to the monitor's periodic tick task.
///
/// The tick stops when [`MonitorHandle::stop`] is called or the handle is
/// dropped with the owning session.
#[derive(Debug)]
pub struct MonitorHandle {
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl MonitorHandle {
    /// Spawn a periodic task invoking `tick` every `interval`.
    pub fn spawn<F>(interval: Duration, mut tick: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        let (shutdown, mut rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut timer = tokio::time::interval(interval);

            // Consume the interval's immediate first tick; checks start one
            // full period after the session opens.
            timer.tick().await;

            loop {
                tokio::select! {
                    _ = timer.tick() => tick(),
                    changed = rx.changed() => {
                        if changed.is_err() || *rx.borrow() {
                            break;
                        }
                    }
                }
            }
        });

        Self {
            shutdown,
            task: Some(task),
        }
    }

    /// Stop the tick and wait for the task to exit.
    pub async fn stop(mut self) {
        self.shutdown.send(true).ok();

        if let Some(task) = self.task.take() {
            task.await.ok();
        }
    }

    /// Stop the tick without waiting.
    pub fn abort(&self) {
        self.shutdown.send(true).ok();
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.shutdown.send(true).ok();
    }
}
