use std::sync::Arc;

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    api::orders::{DownstreamError, OrderPayload, OrderServiceClient},
    defects::{DefectInjector, ModePicker},
    engine::CartEngine,
    error::ServiceError,
    flags::FlagSet,
    models::{OrderCreationResponse, OrderRequest, PaymentMethod},
};

const ORDER_FAILED: &str = "Failed to create the order in the order system";

/// Turns a basket into an order at the downstream order service.
#[derive(Clone)]
pub struct OrderSubmitter {
    engine: CartEngine,
    client: OrderServiceClient,
    picker: Arc<dyn ModePicker>,
}

impl OrderSubmitter {
    pub fn new(engine: CartEngine, client: OrderServiceClient, picker: Arc<dyn ModePicker>) -> Self {
        Self {
            engine,
            client,
            picker,
        }
    }

    /// Validates the request, forwards the basket and clears it once the order
    /// service has confirmed the order. A failed submission leaves the cart intact.
    pub async fn create_order_from_cart(
        &self,
        flags: &FlagSet,
        basket_id: &str,
        user_id: Option<&str>,
        credential: Option<&str>,
        request: &OrderRequest,
    ) -> OrderCreationResponse {
        match self
            .try_create(flags, basket_id, user_id, credential, request)
            .await
        {
            Ok(response) => response,
            Err(err) => {
                match &err {
                    ServiceError::Validation(_) | ServiceError::NotFound(_) => {
                        warn!("Order for basket {} rejected: {}", basket_id, err)
                    }
                    _ => error!("Error creating order for basket {}: {}", basket_id, err),
                }
                OrderCreationResponse::failure(err.user_message(ORDER_FAILED))
            }
        }
    }

    async fn try_create(
        &self,
        flags: &FlagSet,
        basket_id: &str,
        user_id: Option<&str>,
        credential: Option<&str>,
        request: &OrderRequest,
    ) -> Result<OrderCreationResponse, ServiceError> {
        if basket_id.trim().is_empty() {
            return Err(ServiceError::validation("Basket ID is required"));
        }

        let user_id = user_id.map(str::trim).unwrap_or_default();
        let missing_field = [
            user_id,
            request.phone_number.as_str(),
            request.address.as_str(),
            request.payment_method.as_str(),
        ]
        .iter()
        .any(|field| field.trim().is_empty());
        if missing_field {
            return Err(ServiceError::validation("Not all required fields are filled"));
        }

        let user_id =
            Uuid::parse_str(user_id).map_err(|_| ServiceError::validation("Invalid user id"))?;

        if !is_valid_phone_number(&request.phone_number) {
            return Err(ServiceError::validation("Invalid phone number format"));
        }

        let payment_method: PaymentMethod = request
            .payment_method
            .parse()
            .map_err(|_| ServiceError::validation("Invalid payment method"))?;

        let basket = self.engine.basket(basket_id).await?;
        if basket.is_empty() {
            return Err(ServiceError::validation("Cart is empty"));
        }

        info!(
            %user_id,
            basket_id,
            payment_method = %payment_method,
            lines = basket.items.len(),
            total = %basket.total(),
            "Creating order from cart"
        );

        let payload = OrderPayload::build(user_id, &basket, request, payment_method);
        if !self.dispatch(flags, &payload, credential).await? {
            warn!("Order service did not confirm order for basket {}", basket_id);
            return Ok(OrderCreationResponse::failure(ORDER_FAILED));
        }

        if DefectInjector::new(flags).should_suppress_cart_clear_after_order() {
            debug!("Cart clear after order suppressed for basket {}", basket_id);
        } else {
            let cleared = self.engine.clear_cart(basket_id).await;
            if !cleared.success {
                warn!(
                    "Order placed but basket {} was not cleared: {}",
                    basket_id,
                    cleared.error_message.unwrap_or_default()
                );
            }
        }

        info!("Order created for basket {}", basket_id);
        Ok(OrderCreationResponse::created())
    }

    /// The downstream call on its own: `Ok(true)` only when the order service
    /// accepted the payload (or a broken mode pretends it did).
    pub async fn dispatch(
        &self,
        flags: &FlagSet,
        payload: &OrderPayload,
        credential: Option<&str>,
    ) -> Result<bool, DownstreamError> {
        let Some(credential) = credential.filter(|credential| !credential.trim().is_empty()) else {
            error!("No authorization token found in current request");
            return Ok(false);
        };

        let mode = DefectInjector::new(flags).choose_order_submission_failure_mode(self.picker.as_ref());

        self.client
            .submit(
                &flags.order_service_url,
                payload,
                credential,
                mode,
                self.picker.as_ref(),
            )
            .await
    }
}

/// Eleven digits starting with 7 or 8 once `+`, `-`, `(`, `)` and spaces are removed.
pub fn is_valid_phone_number(phone_number: &str) -> bool {
    let digits: String = phone_number
        .chars()
        .filter(|c| !matches!(c, '+' | '-' | '(' | ')' | ' '))
        .collect();

    digits.len() == 11
        && digits.chars().all(|c| c.is_ascii_digit())
        && (digits.starts_with('7') || digits.starts_with('8'))
}
