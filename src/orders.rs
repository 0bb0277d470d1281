//! Orders
//!
//! A committed order is an immutable snapshot of the cart and its pricing at
//! commit time; only the delivery-tracking dimension moves afterwards, and
//! that lives in [`crate::tracking`]. The store appends orders under
//! sequential human-readable codes and never deletes them.

use std::sync::Arc;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::{
    cart::CartItem,
    persistence::{ORDERS_KEY, Persistence, SnapshotError, load_json, save_json},
};

/// Errors from order persistence.
#[derive(Debug, Error)]
pub enum OrderError {
    /// The order log could not be written or read.
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

/// Commit status of an order.
///
/// Independent of the delivery-status machine: a `Completed` order still
/// walks Processing → Delivered on the tracking side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Checkout started but not yet committed; never stored by commit.
    Pending,
    /// Committed through checkout.
    Completed,
    /// Voided by back office after commit.
    Cancelled,
}

/// Payment method chosen at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMethod {
    /// Settle in cash at the door.
    CashOnDelivery,
    /// Card captured through the payment collaborator.
    Card,
    /// GCash wallet transfer.
    GCash,
}

impl PaymentMethod {
    /// Customer-facing label.
    pub fn label(self) -> &'static str {
        match self {
            PaymentMethod::CashOnDelivery => "Cash on Delivery",
            PaymentMethod::Card => "Credit/Debit Card",
            PaymentMethod::GCash => "GCash",
        }
    }
}

/// Order fields assembled by checkout, before an id is assigned.
#[derive(Debug, Clone)]
pub struct OrderDraft {
    /// Cart lines snapshotted at commit time.
    pub items: Vec<CartItem>,
    /// Σ unit price × quantity, in pesos.
    pub subtotal: u64,
    /// Discount amount applied to the subtotal, in pesos.
    pub loyalty_discount: u64,
    /// Tax on the discounted subtotal, in pesos.
    pub tax: u64,
    /// Shipping fee after the free-shipping rule, in pesos.
    pub shipping_fee: u64,
    /// Final amount collected, in pesos.
    pub total: u64,
    /// Customer name from the info step.
    pub customer_name: String,
    /// Customer email from the info step.
    pub customer_email: String,
    /// Rendered shipping address.
    pub shipping_address: String,
    /// Selected shipping option name.
    pub shipping_method: String,
    /// Selected payment method.
    pub payment_method: PaymentMethod,
}

/// A committed order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Sequential human-readable code, e.g. `SO-1001`.
    pub id: String,
    /// Commit instant.
    pub created_at: Timestamp,
    /// Cart lines snapshotted at commit time.
    pub items: Vec<CartItem>,
    /// Σ unit price × quantity, in pesos.
    pub subtotal: u64,
    /// Discount amount applied to the subtotal, in pesos.
    pub loyalty_discount: u64,
    /// Tax on the discounted subtotal, in pesos.
    pub tax: u64,
    /// Shipping fee after the free-shipping rule, in pesos.
    pub shipping_fee: u64,
    /// Final amount collected, in pesos.
    pub total: u64,
    /// Customer name from the info step.
    pub customer_name: String,
    /// Customer email from the info step.
    pub customer_email: String,
    /// Rendered shipping address.
    pub shipping_address: String,
    /// Selected shipping option name.
    pub shipping_method: String,
    /// Selected payment method.
    pub payment_method: PaymentMethod,
    /// Commit status; always `Completed` when written by checkout.
    pub status: OrderStatus,
}

/// Append-only store of committed orders.
pub struct OrderStore {
    orders: Vec<Order>,
    store: Arc<dyn Persistence>,
}

impl OrderStore {
    /// First order code minus one; `SO-1001` is the first commit.
    const SEQ_BASE: u64 = 1000;

    /// Create an empty store writing snapshots to `store`.
    pub fn new(store: Arc<dyn Persistence>) -> Self {
        Self {
            orders: Vec::new(),
            store,
        }
    }

    /// Restore orders persisted by a previous session, or start empty.
    ///
    /// # Errors
    ///
    /// Returns an [`OrderError`] if the snapshot exists but cannot be
    /// decoded.
    pub fn restore(store: Arc<dyn Persistence>) -> Result<Self, OrderError> {
        let orders = load_json(store.as_ref(), ORDERS_KEY)?.unwrap_or_default();

        Ok(Self { orders, store })
    }

    /// Commit a draft: assign the next sequential code, stamp it, append it.
    ///
    /// # Errors
    ///
    /// Returns an [`OrderError`] if persisting the order log fails.
    pub fn commit(&mut self, draft: OrderDraft, now: Timestamp) -> Result<Order, OrderError> {
        let seq = Self::SEQ_BASE + self.orders.len() as u64 + 1;
        let order = Order {
            id: format!("SO-{seq}"),
            created_at: now,
            items: draft.items,
            subtotal: draft.subtotal,
            loyalty_discount: draft.loyalty_discount,
            tax: draft.tax,
            shipping_fee: draft.shipping_fee,
            total: draft.total,
            customer_name: draft.customer_name,
            customer_email: draft.customer_email,
            shipping_address: draft.shipping_address,
            shipping_method: draft.shipping_method,
            payment_method: draft.payment_method,
            status: OrderStatus::Completed,
        };

        self.orders.push(order.clone());

        if let Err(error) = save_json(self.store.as_ref(), ORDERS_KEY, &self.orders) {
            // Keep the in-memory log consistent with storage.
            self.orders.pop();

            return Err(error.into());
        }

        info!(order_id = %order.id, total = order.total, "order committed");

        Ok(order)
    }

    /// Look up an order by code.
    pub fn get(&self, id: &str) -> Option<&Order> {
        self.orders.iter().find(|order| order.id == id)
    }

    /// All committed orders, oldest first.
    pub fn all(&self) -> &[Order] {
        &self.orders
    }

    /// Number of committed orders.
    pub fn len(&self) -> usize {
        self.orders.len()
    }

    /// Check whether any order has been committed.
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use crate::persistence::MemoryStore;

    use super::*;

    fn draft(total: u64) -> OrderDraft {
        OrderDraft {
            items: vec![CartItem {
                product_id: "p1".to_owned(),
                name: "Abaca Tote".to_owned(),
                unit_price: total,
                image_ref: "/img/p1.jpg".to_owned(),
                quantity: 1,
            }],
            subtotal: total,
            loyalty_discount: 0,
            tax: 0,
            shipping_fee: 0,
            total,
            customer_name: "Maria Santos".to_owned(),
            customer_email: "maria@example.com".to_owned(),
            shipping_address: "12 Mabini St, Quezon City".to_owned(),
            shipping_method: "Standard Delivery".to_owned(),
            payment_method: PaymentMethod::GCash,
        }
    }

    #[test]
    fn commit_assigns_sequential_codes() -> TestResult {
        let mut store = OrderStore::new(Arc::new(MemoryStore::new()));

        let first = store.commit(draft(500), Timestamp::UNIX_EPOCH)?;
        let second = store.commit(draft(700), Timestamp::UNIX_EPOCH)?;

        assert_eq!(first.id, "SO-1001");
        assert_eq!(second.id, "SO-1002");
        assert_eq!(first.status, OrderStatus::Completed);

        Ok(())
    }

    #[test]
    fn get_finds_by_code() -> TestResult {
        let mut store = OrderStore::new(Arc::new(MemoryStore::new()));

        store.commit(draft(500), Timestamp::UNIX_EPOCH)?;

        assert_eq!(store.get("SO-1001").map(|o| o.total), Some(500));
        assert!(store.get("SO-9999").is_none());

        Ok(())
    }

    #[test]
    fn restore_continues_the_sequence() -> TestResult {
        let persistence = Arc::new(MemoryStore::new());

        let mut store = OrderStore::new(Arc::clone(&persistence) as Arc<dyn Persistence>);
        store.commit(draft(500), Timestamp::UNIX_EPOCH)?;
        store.commit(draft(700), Timestamp::UNIX_EPOCH)?;

        let mut restored = OrderStore::restore(persistence)?;

        assert_eq!(restored.len(), 2);

        let next = restored.commit(draft(900), Timestamp::UNIX_EPOCH)?;

        assert_eq!(next.id, "SO-1003");

        Ok(())
    }
}
