use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use uuid::Uuid;

use super::{CartStore, StorageError, incremented_quantity};
use crate::models::LineItem;

type ItemKey = (String, Uuid);

/// In-memory cart store for development and tests.
#[derive(Clone, Debug, Default)]
pub struct InMemoryCartStore {
    items: Arc<RwLock<HashMap<ItemKey, LineItem>>>,
}

impl InMemoryCartStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows across all baskets.
    pub fn len(&self) -> usize {
        self.items.read().map(|items| items.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned<E: std::fmt::Display>(err: E) -> StorageError {
    StorageError::Unavailable(format!("Failed to acquire lock: {}", err))
}

#[async_trait]
impl CartStore for InMemoryCartStore {
    async fn find_item(
        &self,
        basket_id: &str,
        dish_id: Uuid,
    ) -> Result<Option<LineItem>, StorageError> {
        let items = self.items.read().map_err(poisoned)?;

        Ok(items.get(&(basket_id.to_string(), dish_id)).cloned())
    }

    async fn list_items(&self, basket_id: &str) -> Result<Vec<LineItem>, StorageError> {
        let items = self.items.read().map_err(poisoned)?;

        Ok(items
            .values()
            .filter(|item| item.basket_id == basket_id)
            .cloned()
            .collect())
    }

    async fn upsert(&self, item: &LineItem) -> Result<(), StorageError> {
        let mut items = self.items.write().map_err(poisoned)?;

        let key = (item.basket_id.clone(), item.dish_id);
        let mut row = item.clone();
        if let Some(existing) = items.get(&key) {
            row.created_at = existing.created_at;
        }
        items.insert(key, row);

        Ok(())
    }

    async fn add_or_increment(
        &self,
        item: &LineItem,
        delta: i32,
        limit: i32,
    ) -> Result<LineItem, StorageError> {
        let mut items = self.items.write().map_err(poisoned)?;

        let row = items
            .entry((item.basket_id.clone(), item.dish_id))
            .and_modify(|existing| {
                existing.quantity = incremented_quantity(existing.quantity, delta, limit);
                existing.updated_at = item.updated_at;
            })
            .or_insert_with(|| item.clone());

        Ok(row.clone())
    }

    async fn delete(&self, item: &LineItem) -> Result<(), StorageError> {
        let mut items = self.items.write().map_err(poisoned)?;

        items.remove(&(item.basket_id.clone(), item.dish_id));

        Ok(())
    }

    async fn delete_all(&self, basket_id: &str) -> Result<usize, StorageError> {
        let mut items = self.items.write().map_err(poisoned)?;

        let before = items.len();
        items.retain(|(basket, _), _| basket != basket_id);

        Ok(before - items.len())
    }
}
