//! Persistence
//!
//! The storefront treats persistence as a string key-value collaborator.
//! Engines snapshot their state through [`Persistence`] at defined mutation
//! points (cart mutations, order commits, loyalty awards, abandonment
//! records); nothing writes storage as an ambient side effect.

use std::sync::{PoisonError, RwLock};

use mockall::automock;
use rustc_hash::FxHashMap;
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;

/// Snapshot key for the active cart.
pub const CART_KEY: &str = "sari.cart";

/// Snapshot key for committed orders.
pub const ORDERS_KEY: &str = "sari.orders";

/// Snapshot key for the loyalty account.
pub const LOYALTY_KEY: &str = "sari.loyalty";

/// Snapshot key for abandoned-cart records.
pub const ABANDONED_KEY: &str = "sari.abandoned";

/// Errors surfaced by a persistence backend.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// The backend failed to read or write a key.
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Errors from encoding or storing an engine snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The snapshot could not be encoded or decoded.
    #[error("snapshot serialization failed")]
    Codec(#[from] serde_json::Error),

    /// The backend rejected the read or write.
    #[error(transparent)]
    Store(#[from] PersistenceError),
}

/// String key-value persistence collaborator.
#[automock]
pub trait Persistence: Send + Sync {
    /// Load the value stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError`] if the backend fails to read.
    fn load(&self, key: &str) -> Result<Option<String>, PersistenceError>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError`] if the backend fails to write.
    fn save(&self, key: &str, value: String) -> Result<(), PersistenceError>;
}

/// Encode `value` as JSON and store it under `key`.
///
/// # Errors
///
/// Returns a [`SnapshotError`] if encoding or the backend write fails.
pub fn save_json<T: Serialize>(
    store: &dyn Persistence,
    key: &str,
    value: &T,
) -> Result<(), SnapshotError> {
    let encoded = serde_json::to_string(value)?;

    store.save(key, encoded)?;

    Ok(())
}

/// Load and decode the JSON value stored under `key`, if any.
///
/// # Errors
///
/// Returns a [`SnapshotError`] if the backend read or decoding fails.
pub fn load_json<T: DeserializeOwned>(
    store: &dyn Persistence,
    key: &str,
) -> Result<Option<T>, SnapshotError> {
    match store.load(key)? {
        Some(encoded) => Ok(Some(serde_json::from_str(&encoded)?)),
        None => Ok(None),
    }
}

/// In-memory persistence backend for session-scoped runs and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<FxHashMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Check whether the store holds no keys.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Persistence for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        Ok(self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned())
    }

    fn save(&self, key: &str, value: String) -> Result<(), PersistenceError> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_owned(), value);

        Ok(())
    }
}
