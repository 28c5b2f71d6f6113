//! Persistence for cart line items.
//!
//! The engine only talks to [`CartStore`]; the service picks the Postgres
//! implementation when a database URL is configured and the in-memory one
//! otherwise.

mod memory;
mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::LineItem;

pub use memory::InMemoryCartStore;
pub use postgres::{DbPool, PgCartStore};

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("constraint violation: {0}")]
    Constraint(String),

    #[error("query failed: {0}")]
    Query(String),
}

/// Keyed collection of line items, unique per `(basket_id, dish_id)`.
///
/// Nothing here is retried; callers see the first failure.
#[async_trait]
pub trait CartStore: Send + Sync {
    async fn find_item(
        &self,
        basket_id: &str,
        dish_id: Uuid,
    ) -> Result<Option<LineItem>, StorageError>;

    async fn list_items(&self, basket_id: &str) -> Result<Vec<LineItem>, StorageError>;

    /// Insert the item, or overwrite the mutable columns of the row with the same key.
    /// `created_at` of an existing row is kept.
    async fn upsert(&self, item: &LineItem) -> Result<(), StorageError>;

    /// Insert `item` as given, or add `delta` to the quantity of the existing row as one
    /// atomic step, capped per [`incremented_quantity`]. Only `quantity` and `updated_at`
    /// of an existing row change. Returns the stored row.
    async fn add_or_increment(
        &self,
        item: &LineItem,
        delta: i32,
        limit: i32,
    ) -> Result<LineItem, StorageError>;

    async fn delete(&self, item: &LineItem) -> Result<(), StorageError>;

    /// Returns the number of removed rows.
    async fn delete_all(&self, basket_id: &str) -> Result<usize, StorageError>;
}

/// Quantity of a line holding `existing` units after `delta` more are added.
///
/// A positive delta that would pass `limit` is cut to `max(1, limit - existing)`.
pub fn incremented_quantity(existing: i32, delta: i32, limit: i32) -> i32 {
    let existing = i64::from(existing);
    let mut delta = i64::from(delta);
    if delta > 0 && existing + delta > i64::from(limit) {
        delta = (i64::from(limit) - existing).max(1);
    }

    i32::try_from(existing + delta).unwrap_or(i32::MAX)
}
