//! Cart ledger
//!
//! Line items for the active session. Items are unique per product id;
//! re-adding a product merges quantities, and a quantity update that drops
//! to zero removes the line. Every mutation writes a snapshot through the
//! persistence collaborator so the cart survives the session.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::persistence::{CART_KEY, Persistence, SnapshotError, load_json, save_json};

/// Errors from cart mutations.
#[derive(Debug, Error)]
pub enum CartError {
    /// Items enter the cart with a quantity of at least one.
    #[error("quantity must be at least 1")]
    ZeroQuantity,

    /// The cart snapshot could not be written or read.
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

/// A single cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    /// Product identifier, unique within the cart.
    pub product_id: String,
    /// Product display name, snapshotted for order history.
    pub name: String,
    /// Unit price in pesos.
    pub unit_price: u64,
    /// Reference to the product image shown in cart and order views.
    pub image_ref: String,
    /// Units of this product; always at least one while the line exists.
    pub quantity: u32,
}

impl CartItem {
    /// Line total: unit price × quantity.
    pub fn line_total(&self) -> u64 {
        self.unit_price * u64::from(self.quantity)
    }
}

/// The active session's cart.
pub struct CartLedger {
    items: Vec<CartItem>,
    store: Arc<dyn Persistence>,
}

impl CartLedger {
    /// Create an empty cart writing snapshots to `store`.
    pub fn new(store: Arc<dyn Persistence>) -> Self {
        Self {
            items: Vec::new(),
            store,
        }
    }

    /// Restore the cart persisted by a previous session, or start empty.
    ///
    /// # Errors
    ///
    /// Returns a [`CartError`] if the snapshot exists but cannot be decoded.
    pub fn restore(store: Arc<dyn Persistence>) -> Result<Self, CartError> {
        let items = load_json(store.as_ref(), CART_KEY)?.unwrap_or_default();

        Ok(Self { items, store })
    }

    /// Current lines, in insertion order.
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    /// Copy of the current lines, for order and abandonment snapshots.
    pub fn snapshot(&self) -> Vec<CartItem> {
        self.items.clone()
    }

    /// Check whether the cart has no lines.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Total units across all lines.
    pub fn item_count(&self) -> u64 {
        self.items
            .iter()
            .map(|item| u64::from(item.quantity))
            .sum()
    }

    /// Subtotal in pesos: Σ unit price × quantity.
    ///
    /// Invariant to line insertion order.
    pub fn subtotal(&self) -> u64 {
        self.items.iter().map(CartItem::line_total).sum()
    }

    /// Add an item, merging quantity into an existing line for the same
    /// product.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::ZeroQuantity`] for a zero-quantity item, or a
    /// snapshot error if persisting fails.
    pub fn add(&mut self, item: CartItem) -> Result<(), CartError> {
        if item.quantity == 0 {
            return Err(CartError::ZeroQuantity);
        }

        match self
            .items
            .iter_mut()
            .find(|line| line.product_id == item.product_id)
        {
            Some(line) => line.quantity = line.quantity.saturating_add(item.quantity),
            None => self.items.push(item),
        }

        self.persist()?;

        Ok(())
    }

    /// Remove the line for `product_id`; `false` if no such line existed.
    ///
    /// # Errors
    ///
    /// Returns a snapshot error if persisting fails.
    pub fn remove(&mut self, product_id: &str) -> Result<bool, CartError> {
        let before = self.items.len();

        self.items.retain(|line| line.product_id != product_id);

        if self.items.len() == before {
            return Ok(false);
        }

        self.persist()?;

        Ok(true)
    }

    /// Set the quantity for `product_id`; zero removes the line. Unknown
    /// products are ignored.
    ///
    /// # Errors
    ///
    /// Returns a snapshot error if persisting fails.
    pub fn set_quantity(&mut self, product_id: &str, quantity: u32) -> Result<(), CartError> {
        if quantity == 0 {
            self.remove(product_id)?;

            return Ok(());
        }

        let Some(line) = self
            .items
            .iter_mut()
            .find(|line| line.product_id == product_id)
        else {
            return Ok(());
        };

        line.quantity = quantity;

        self.persist()?;

        Ok(())
    }

    /// Remove every line.
    ///
    /// # Errors
    ///
    /// Returns a snapshot error if persisting fails.
    pub fn clear(&mut self) -> Result<(), CartError> {
        self.items.clear();

        self.persist()?;

        Ok(())
    }

    /// Replace the cart contents wholesale, e.g. when resuming a recovered
    /// cart. Zero-quantity lines in the snapshot are dropped.
    ///
    /// # Errors
    ///
    /// Returns a [`SnapshotError`] if persisting fails.
    pub fn replace(&mut self, items: Vec<CartItem>) -> Result<(), SnapshotError> {
        self.items = items.into_iter().filter(|item| item.quantity > 0).collect();

        self.persist()
    }

    fn persist(&self) -> Result<(), SnapshotError> {
        save_json(self.store.as_ref(), CART_KEY, &self.items)?;
        debug!(lines = self.items.len(), subtotal = self.subtotal(), "cart persisted");

        Ok(())
    }
}
