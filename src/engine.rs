use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    defects::DefectInjector,
    error::ServiceError,
    flags::FlagSet,
    models::{AddToCartRequest, Basket, CartSummaryResponse, LineItem},
    store::{CartStore, StorageError},
};

/// Cart operations on top of a [`CartStore`].
///
/// Each call is an independent unit of work reading the flags it is given.
/// Public operations never fail: errors come back as `success = false` responses.
#[derive(Clone)]
pub struct CartEngine {
    store: Arc<dyn CartStore>,
}

impl CartEngine {
    pub fn new(store: Arc<dyn CartStore>) -> Self {
        Self { store }
    }

    /// Fresh client-facing basket id, e.g. `basket_1f0c9a7b2e4d`.
    pub fn generate_basket_id() -> String {
        let id = Uuid::new_v4().simple().to_string();
        format!("basket_{}", &id[..12])
    }

    pub async fn basket(&self, basket_id: &str) -> Result<Basket, StorageError> {
        let items = self.store.list_items(basket_id).await?;
        Ok(Basket::new(basket_id, items))
    }

    /// Full cart view. Without a basket id a new one is issued with an empty cart.
    pub async fn get_cart(&self, flags: &FlagSet, basket_id: Option<&str>) -> CartSummaryResponse {
        let basket_id = match basket_id.map(str::trim).filter(|id| !id.is_empty()) {
            Some(basket_id) => basket_id,
            None => {
                let basket_id = Self::generate_basket_id();
                info!("Issued new basket {}", basket_id);
                return CartSummaryResponse::empty(basket_id);
            }
        };

        let defects = DefectInjector::new(flags);
        let outcome = self.summary(basket_id, true).await;
        finish(&defects, basket_id, outcome, "Failed to load the cart")
    }

    pub async fn get_cart_summary(&self, flags: &FlagSet, basket_id: &str) -> CartSummaryResponse {
        let defects = DefectInjector::new(flags);
        let outcome = match require_basket_id(basket_id) {
            Ok(()) => self.summary(basket_id, false).await,
            Err(err) => Err(err),
        };
        finish(&defects, basket_id, outcome, "Failed to load the cart")
    }

    pub async fn add_to_cart(
        &self,
        flags: &FlagSet,
        basket_id: &str,
        request: AddToCartRequest,
    ) -> CartSummaryResponse {
        let defects = DefectInjector::new(flags);
        let dish_id = request.dish_id;
        let (price, name) = (request.price, request.name.clone());

        match self.try_add(flags, &defects, basket_id, request).await {
            Ok(response) => defects.adjust_summary_response(response),
            Err(err) => {
                match &err {
                    ServiceError::Validation(_) | ServiceError::NotFound(_) => {
                        warn!("Rejected add to basket {}: {}", basket_id, err)
                    }
                    _ if defects.should_log_sensitive_info() => error!(
                        basket_id,
                        %dish_id,
                        %price,
                        dish_name = %name,
                        "Error adding item to cart: {}",
                        err
                    ),
                    _ => error!("Error adding item to cart for basket {}: {}", basket_id, err),
                }
                CartSummaryResponse::failure(basket_id, err.user_message("Failed to add item to cart"))
            }
        }
    }

    async fn try_add(
        &self,
        flags: &FlagSet,
        defects: &DefectInjector<'_>,
        basket_id: &str,
        request: AddToCartRequest,
    ) -> Result<CartSummaryResponse, ServiceError> {
        require_basket_id(basket_id)?;
        if request.quantity < 1 {
            return Err(ServiceError::validation("Quantity must be at least 1"));
        }

        let request = defects.adjust_incoming_add(request);

        if defects.should_skip_validation(&request.dish_id) {
            warn!("Validation skipped for dish {}", request.dish_id);
        }

        // Applies to an existing line only; a new line is stored with the requested quantity.
        let delta = if defects.should_suppress_quantity_change_on_add() {
            debug!("Quantity change on add suppressed for dish {}", request.dish_id);
            0
        } else {
            defects.adjust_quantity_delta(request.quantity)
        };

        let now = Utc::now();
        let item = LineItem {
            basket_id: basket_id.to_string(),
            dish_id: request.dish_id,
            name: request.name,
            unit_price: request.price,
            image_url: defects.adjust_image_url(&request.image_url),
            quantity: request.quantity,
            created_at: now,
            updated_at: now,
        };

        let stored = self
            .store
            .add_or_increment(&item, delta, flags.cart_item_limit)
            .await?;
        debug!(
            basket_id,
            dish_id = %stored.dish_id,
            quantity = stored.quantity,
            "Line item stored"
        );

        self.summary(basket_id, true).await
    }

    pub async fn remove_from_cart(
        &self,
        flags: &FlagSet,
        basket_id: &str,
        dish_id: &str,
    ) -> CartSummaryResponse {
        let defects = DefectInjector::new(flags);
        let outcome = self.try_remove(&defects, basket_id, dish_id).await;
        finish(&defects, basket_id, outcome, "Failed to remove item from cart")
    }

    async fn try_remove(
        &self,
        defects: &DefectInjector<'_>,
        basket_id: &str,
        dish_id: &str,
    ) -> Result<CartSummaryResponse, ServiceError> {
        require_basket_id(basket_id)?;
        let dish_id = parse_dish_id(dish_id)?;

        let mut item = self
            .store
            .find_item(basket_id, dish_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Item not found in cart"))?;

        if defects.should_suppress_removal() {
            debug!("Removal suppressed for dish {}", dish_id);
            item.touch();
            self.store.upsert(&item).await?;
        } else {
            self.store.delete(&item).await?;
        }

        self.summary(basket_id, true).await
    }

    pub async fn update_quantity(
        &self,
        flags: &FlagSet,
        basket_id: &str,
        dish_id: &str,
        quantity: i32,
    ) -> CartSummaryResponse {
        let defects = DefectInjector::new(flags);
        let outcome = self.try_update(basket_id, dish_id, quantity).await;
        finish(&defects, basket_id, outcome, "Failed to update quantity")
    }

    async fn try_update(
        &self,
        basket_id: &str,
        dish_id: &str,
        quantity: i32,
    ) -> Result<CartSummaryResponse, ServiceError> {
        require_basket_id(basket_id)?;
        if quantity < 1 {
            return Err(ServiceError::validation("Quantity must be at least 1"));
        }
        let dish_id = parse_dish_id(dish_id)?;

        let mut item = self
            .store
            .find_item(basket_id, dish_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Item not found in cart"))?;

        item.quantity = quantity;
        item.touch();
        self.store.upsert(&item).await?;

        self.summary(basket_id, true).await
    }

    /// Removes every item of the basket. Never subject to defects.
    pub async fn clear_cart(&self, basket_id: &str) -> CartSummaryResponse {
        let outcome = self.try_clear(basket_id).await;
        match outcome {
            Ok(response) => response,
            Err(err) => {
                log_failure(basket_id, &err);
                CartSummaryResponse::failure(basket_id, err.user_message("Failed to clear the cart"))
            }
        }
    }

    async fn try_clear(&self, basket_id: &str) -> Result<CartSummaryResponse, ServiceError> {
        require_basket_id(basket_id)?;

        let removed = self.store.delete_all(basket_id).await?;
        info!("Cleared basket {} ({} items removed)", basket_id, removed);

        Ok(CartSummaryResponse::empty(basket_id))
    }

    /// Existence check; malformed input and storage failures read as "not in cart".
    pub async fn is_in_cart(&self, basket_id: &str, dish_id: &str) -> bool {
        if basket_id.trim().is_empty() {
            return false;
        }
        let Ok(dish_id) = Uuid::parse_str(dish_id) else {
            return false;
        };

        match self.store.find_item(basket_id, dish_id).await {
            Ok(item) => item.is_some(),
            Err(err) => {
                error!("Error checking if item is in cart for basket {}: {}", basket_id, err);
                false
            }
        }
    }

    async fn summary(
        &self,
        basket_id: &str,
        include_items: bool,
    ) -> Result<CartSummaryResponse, ServiceError> {
        let basket = self.basket(basket_id).await?;
        Ok(CartSummaryResponse::from_basket(&basket, include_items))
    }
}

fn require_basket_id(basket_id: &str) -> Result<(), ServiceError> {
    if basket_id.trim().is_empty() {
        return Err(ServiceError::validation("Basket ID is required"));
    }
    Ok(())
}

fn parse_dish_id(dish_id: &str) -> Result<Uuid, ServiceError> {
    Uuid::parse_str(dish_id.trim()).map_err(|_| ServiceError::validation("Invalid dish id format"))
}

fn log_failure(basket_id: &str, err: &ServiceError) {
    match err {
        ServiceError::Validation(_) | ServiceError::NotFound(_) => {
            warn!("Cart operation on basket {} rejected: {}", basket_id, err)
        }
        _ => error!("Cart operation on basket {} failed: {}", basket_id, err),
    }
}

fn finish(
    defects: &DefectInjector<'_>,
    basket_id: &str,
    outcome: Result<CartSummaryResponse, ServiceError>,
    generic: &str,
) -> CartSummaryResponse {
    match outcome {
        Ok(response) => defects.adjust_summary_response(response),
        Err(err) => {
            log_failure(basket_id, &err);
            CartSummaryResponse::failure(basket_id, err.user_message(generic))
        }
    }
}
