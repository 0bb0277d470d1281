//! Order tracking
//!
//! One tracking record per committed order: a linear delivery-status machine
//! (Processing → Delivered) with a separate absorbing Cancelled state, plus
//! an append-only event timeline. Status updates and event appends are
//! distinct operations performed by the originating process; an update never
//! writes an event on its own.

use jiff::Timestamp;
use rustc_hash::FxHashMap;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::{orders::Order, rules::ShippingOption};

/// Milliseconds per day, for ETA arithmetic.
const DAY_MS: i64 = 86_400_000;

/// Errors from tracking commands.
///
/// Queries never error; unknown ids yield `None` or an empty list.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TrackingError {
    /// No tracking record exists for the order id.
    #[error("no tracking record for order {0}")]
    NotFound(String),

    /// A record for this order already exists; tracking is 1:1 with orders.
    #[error("order {0} is already tracked")]
    AlreadyTracked(String),

    /// The requested status move is not allowed.
    #[error("cannot move delivery status from {from:?} to {to:?}")]
    InvalidTransition {
        /// Status the record is currently in.
        from: DeliveryStatus,
        /// Status the caller asked for.
        to: DeliveryStatus,
    },

    /// The event timeline is chronologically non-decreasing.
    #[error("event timestamp predates the latest timeline entry")]
    EventOutOfOrder,

    /// The newest event must carry the record's current status.
    #[error("event status {event:?} does not match record status {record:?}")]
    EventStatusMismatch {
        /// Status on the rejected event.
        event: DeliveryStatus,
        /// Status currently on the record.
        record: DeliveryStatus,
    },
}

/// Delivery status of a tracked order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    /// Order received, not yet confirmed by the warehouse.
    Processing,
    /// Warehouse confirmed and packing.
    Confirmed,
    /// Handed to the carrier.
    Shipped,
    /// Moving through the carrier network.
    InTransit,
    /// On the last-mile vehicle.
    OutForDelivery,
    /// Received by the customer; terminal.
    Delivered,
    /// Voided; absorbing, reachable from any non-terminal state.
    Cancelled,
}

impl DeliveryStatus {
    /// The linear forward progression, index 0..=5.
    pub const FORWARD: [DeliveryStatus; 6] = [
        DeliveryStatus::Processing,
        DeliveryStatus::Confirmed,
        DeliveryStatus::Shipped,
        DeliveryStatus::InTransit,
        DeliveryStatus::OutForDelivery,
        DeliveryStatus::Delivered,
    ];

    /// Position in the linear progression; `None` for `Cancelled`.
    pub fn index(self) -> Option<u8> {
        match self {
            DeliveryStatus::Processing => Some(0),
            DeliveryStatus::Confirmed => Some(1),
            DeliveryStatus::Shipped => Some(2),
            DeliveryStatus::InTransit => Some(3),
            DeliveryStatus::OutForDelivery => Some(4),
            DeliveryStatus::Delivered => Some(5),
            DeliveryStatus::Cancelled => None,
        }
    }

    /// Progress through the linear progression as a whole percentage,
    /// `(index + 1) / 6` rounded; `None` for `Cancelled`.
    pub fn progress_percent(self) -> Option<u8> {
        let step = u16::from(self.index()?) + 1;
        let percent = (step * 200 + 6) / 12;

        Some(u8::try_from(percent).unwrap_or(100))
    }

    /// Check whether no further status moves are allowed.
    pub fn is_terminal(self) -> bool {
        matches!(self, DeliveryStatus::Delivered | DeliveryStatus::Cancelled)
    }

    /// Whether a record in this status may move to `next`.
    ///
    /// Forward (or same-status) moves along the linear progression are
    /// allowed; `Cancelled` is reachable from any non-terminal state;
    /// terminal states accept nothing.
    pub fn can_transition(self, next: DeliveryStatus) -> bool {
        if self.is_terminal() {
            return false;
        }

        match next.index() {
            None => true, // Cancelled, from any non-terminal state
            Some(to) => self.index().is_some_and(|from| to >= from),
        }
    }

    /// Customer-facing label.
    pub fn label(self) -> &'static str {
        match self {
            DeliveryStatus::Processing => "Processing",
            DeliveryStatus::Confirmed => "Confirmed",
            DeliveryStatus::Shipped => "Shipped",
            DeliveryStatus::InTransit => "In Transit",
            DeliveryStatus::OutForDelivery => "Out for Delivery",
            DeliveryStatus::Delivered => "Delivered",
            DeliveryStatus::Cancelled => "Cancelled",
        }
    }
}

/// An immutable, timestamped entry on an order's delivery timeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingEvent {
    /// When the event occurred.
    pub at: Timestamp,
    /// Delivery status at the time of the event.
    pub status: DeliveryStatus,
    /// Where the event occurred, carrier-reported.
    pub location: String,
    /// Free-text carrier or back-office detail.
    pub details: String,
}

/// Carrier and status record for one order.
#[derive(Debug, Clone)]
pub struct TrackingRecord {
    /// Order this record tracks, 1:1.
    pub order_id: String,
    /// Current delivery status.
    pub status: DeliveryStatus,
    /// Carrier fulfilling the shipment.
    pub carrier: String,
    /// Carrier reference for the shipment.
    pub tracking_number: String,
    /// Expected delivery instant, from the shipping option's ETA.
    pub estimated_delivery: Timestamp,
    /// Append-only timeline, oldest first.
    events: Vec<TrackingEvent>,
    /// Instant of the latest status update or event append.
    pub last_update: Timestamp,
}

impl TrackingRecord {
    /// Timeline entries, oldest first.
    pub fn events(&self) -> &[TrackingEvent] {
        &self.events
    }

    /// Timeline entries in reverse-chronological order, for display.
    pub fn events_newest_first(&self) -> impl Iterator<Item = &TrackingEvent> {
        self.events.iter().rev()
    }
}

/// All tracking records, keyed by order id.
#[derive(Debug, Default)]
pub struct OrderTrackingEngine {
    records: FxHashMap<String, TrackingRecord>,
}

impl OrderTrackingEngine {
    /// Create an engine with no records.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a committed order.
    ///
    /// The record opens in `Processing` with a seeded "order received"
    /// timeline entry and an ETA derived from the shipping option.
    ///
    /// # Errors
    ///
    /// Returns [`TrackingError::AlreadyTracked`] if the order already has a
    /// record.
    pub fn init_for_order(
        &mut self,
        order: &Order,
        option: &ShippingOption,
        now: Timestamp,
    ) -> Result<&TrackingRecord, TrackingError> {
        if self.records.contains_key(&order.id) {
            return Err(TrackingError::AlreadyTracked(order.id.clone()));
        }

        let eta_ms = now
            .as_millisecond()
            .saturating_add(i64::from(option.eta_days) * DAY_MS);
        let estimated_delivery = Timestamp::from_millisecond(eta_ms).unwrap_or(now);

        let record = TrackingRecord {
            order_id: order.id.clone(),
            status: DeliveryStatus::Processing,
            carrier: option.carrier.clone(),
            tracking_number: format!("trk_{}", Uuid::now_v7().simple()),
            estimated_delivery,
            events: vec![TrackingEvent {
                at: now,
                status: DeliveryStatus::Processing,
                location: "Sort facility".to_owned(),
                details: "Order received".to_owned(),
            }],
            last_update: now,
        };

        info!(order_id = %order.id, carrier = %record.carrier, "tracking opened");

        Ok(self.records.entry(order.id.clone()).or_insert(record))
    }

    /// Move an order's delivery status.
    ///
    /// Sets the status and refreshes `last_update`; appends no event — the
    /// originating process records the timeline entry separately.
    ///
    /// # Errors
    ///
    /// Returns [`TrackingError::NotFound`] for unknown orders and
    /// [`TrackingError::InvalidTransition`] for disallowed moves.
    pub fn update_status(
        &mut self,
        order_id: &str,
        status: DeliveryStatus,
        now: Timestamp,
    ) -> Result<(), TrackingError> {
        let record = self
            .records
            .get_mut(order_id)
            .ok_or_else(|| TrackingError::NotFound(order_id.to_owned()))?;

        if !record.status.can_transition(status) {
            return Err(TrackingError::InvalidTransition {
                from: record.status,
                to: status,
            });
        }

        record.status = status;
        record.last_update = now;

        info!(order_id, status = status.label(), "delivery status updated");

        Ok(())
    }

    /// Append a timeline event for an order.
    ///
    /// The event must not predate the newest timeline entry and must carry
    /// the record's current status, keeping the newest event in step with
    /// the record.
    ///
    /// # Errors
    ///
    /// Returns [`TrackingError::NotFound`], [`TrackingError::EventOutOfOrder`]
    /// or [`TrackingError::EventStatusMismatch`].
    pub fn append_event(
        &mut self,
        order_id: &str,
        status: DeliveryStatus,
        location: impl Into<String>,
        details: impl Into<String>,
        now: Timestamp,
    ) -> Result<(), TrackingError> {
        let record = self
            .records
            .get_mut(order_id)
            .ok_or_else(|| TrackingError::NotFound(order_id.to_owned()))?;

        if record.events.last().is_some_and(|latest| now < latest.at) {
            return Err(TrackingError::EventOutOfOrder);
        }

        if status != record.status {
            return Err(TrackingError::EventStatusMismatch {
                event: status,
                record: record.status,
            });
        }

        record.events.push(TrackingEvent {
            at: now,
            status,
            location: location.into(),
            details: details.into(),
        });
        record.last_update = now;

        Ok(())
    }

    /// Look up one order's record.
    pub fn get(&self, order_id: &str) -> Option<&TrackingRecord> {
        self.records.get(order_id)
    }

    /// All records, in no particular order.
    pub fn all(&self) -> impl Iterator<Item = &TrackingRecord> {
        self.records.values()
    }

    /// Records fulfilled by the given carrier.
    pub fn by_carrier<'a>(&'a self, carrier: &'a str) -> impl Iterator<Item = &'a TrackingRecord> {
        self.records
            .values()
            .filter(move |record| record.carrier.eq_ignore_ascii_case(carrier))
    }

    /// Records past their ETA and not yet delivered.
    pub fn delayed(&self, now: Timestamp) -> Vec<&TrackingRecord> {
        self.records
            .values()
            .filter(|record| {
                record.estimated_delivery < now && record.status != DeliveryStatus::Delivered
            })
            .collect()
    }
}
