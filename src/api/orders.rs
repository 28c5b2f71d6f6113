use std::time::Duration;

use reqwest::{
    Client, RequestBuilder, Url,
    header::{AUTHORIZATION, CONTENT_TYPE},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    defects::{ModePicker, OrderFailureMode},
    models::{Basket, OrderRequest, PaymentMethod},
};

pub const ORDER_CREATE_PATH: &str = "/order/create";

const DEFAULT_SHORT_DELAY: Duration = Duration::from_millis(500);
const DEFAULT_WATCHDOG: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum DownstreamError {
    #[error("order service unavailable: {0}")]
    Unavailable(String),
}

/// Body of `POST {order_service_url}/order/create`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderPayload {
    pub success: bool,
    pub error_message: Option<String>,
    pub user_id: Uuid,
    pub item_count: usize,
    pub total: Decimal,
    pub items: Vec<OrderPayloadItem>,
    pub is_empty: bool,
    pub has_items: bool,
    pub phone_number: String,
    pub address: String,
    pub payment_method: String,
    pub comment: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderPayloadItem {
    pub id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub image_url: Vec<String>,
    pub quantity: i32,
}

impl OrderPayload {
    /// `item_count` counts order lines, not units.
    pub fn build(
        user_id: Uuid,
        basket: &Basket,
        request: &OrderRequest,
        payment_method: PaymentMethod,
    ) -> Self {
        let items: Vec<OrderPayloadItem> = basket
            .items
            .iter()
            .map(|item| OrderPayloadItem {
                id: item.dish_id,
                name: item.name.clone(),
                price: item.unit_price,
                image_url: if item.image_url.is_empty() {
                    Vec::new()
                } else {
                    vec![item.image_url.clone()]
                },
                quantity: item.quantity,
            })
            .collect();

        Self {
            success: true,
            error_message: None,
            user_id,
            item_count: items.len(),
            total: basket.total(),
            is_empty: items.is_empty(),
            has_items: !items.is_empty(),
            items,
            phone_number: request.phone_number.clone(),
            address: request.address.clone(),
            payment_method: payment_method.as_str().to_string(),
            comment: request.comment.clone(),
        }
    }
}

/// HTTP client of the downstream order service.
///
/// `submit` performs the real call, or one of the deliberately broken variants
/// when a failure mode is given.
#[derive(Clone, Debug)]
pub struct OrderServiceClient {
    http: Client,
    short_delay: Duration,
    watchdog: Duration,
}

impl OrderServiceClient {
    pub fn new(http: Client) -> Self {
        Self {
            http,
            short_delay: DEFAULT_SHORT_DELAY,
            watchdog: DEFAULT_WATCHDOG,
        }
    }

    /// Overrides the pause of the instant failure/fake success modes and the
    /// bound on the hanging mode.
    pub fn with_timings(mut self, short_delay: Duration, watchdog: Duration) -> Self {
        self.short_delay = short_delay;
        self.watchdog = watchdog;
        self
    }

    /// `Ok(true)` when the order service accepted the order.
    ///
    /// Every failure is `Ok(false)` except [`OrderFailureMode::ThrowException`],
    /// which returns an error instead.
    pub async fn submit(
        &self,
        base_url: &str,
        payload: &OrderPayload,
        credential: &str,
        mode: Option<OrderFailureMode>,
        picker: &dyn ModePicker,
    ) -> Result<bool, DownstreamError> {
        let endpoint = endpoint(base_url);
        let authorization = bearer(credential);

        let Some(mode) = mode else {
            debug!(
                "Sending order to {}: {}",
                endpoint,
                serde_json::to_string(payload).unwrap_or_default()
            );
            let request = self
                .http
                .post(&endpoint)
                .header(AUTHORIZATION, &authorization)
                .json(payload);
            return Ok(self.send(request, true).await);
        };

        warn!("Order submission running in broken mode {}", mode);

        match mode {
            OrderFailureMode::ReturnFalseImmediately => {
                tokio::time::sleep(self.short_delay).await;
                Ok(false)
            }
            OrderFailureMode::ThrowException => Err(DownstreamError::Unavailable(
                "order service did not respond".into(),
            )),
            OrderFailureMode::InfiniteTimeout => {
                let hang = futures::future::pending::<()>();
                if tokio::time::timeout(self.watchdog, hang).await.is_err() {
                    error!("Order submission cancelled after {:?}", self.watchdog);
                }
                Ok(false)
            }
            OrderFailureMode::WrongUrl => {
                let url = wrong_url(&endpoint, picker.pick(4));
                let request = self
                    .http
                    .post(url)
                    .header(AUTHORIZATION, &authorization)
                    .json(payload);
                Ok(self.send(request, true).await)
            }
            OrderFailureMode::InvalidData => {
                let broken = json!({
                    "userId": "not-a-uuid",
                    "itemCount": "several",
                    "total": "free",
                    "items": { "first": payload.items.first().map(|item| item.name.clone()) },
                    "paymentMethod": 42,
                });
                let request = self
                    .http
                    .post(&endpoint)
                    .header(AUTHORIZATION, &authorization)
                    .json(&broken);
                Ok(self.send(request, true).await)
            }
            OrderFailureMode::FakeSuccess => {
                tokio::time::sleep(self.short_delay).await;
                Ok(true)
            }
            OrderFailureMode::WrongHttpMethod => {
                let request = self
                    .http
                    .get(&endpoint)
                    .header(AUTHORIZATION, &authorization)
                    .json(payload);
                Ok(self.send(request, true).await)
            }
            OrderFailureMode::WrongHeaders => {
                let body = serde_json::to_string(payload).unwrap_or_default();
                let request = self
                    .http
                    .post(&endpoint)
                    .header(AUTHORIZATION, &authorization)
                    .header(CONTENT_TYPE, "text/plain")
                    .header("X-Order-Poison", "drop-table")
                    .body(body);
                Ok(self.send(request, true).await)
            }
            OrderFailureMode::HideErrors => {
                let request = self
                    .http
                    .post(&endpoint)
                    .header(AUTHORIZATION, &authorization)
                    .json(payload);
                Ok(self.send(request, false).await)
            }
        }
    }

    async fn send(&self, request: RequestBuilder, report_errors: bool) -> bool {
        match request.send().await {
            Ok(response) if response.status().is_success() => {
                info!("Order accepted by order service ({})", response.status());
                true
            }
            Ok(response) => {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                if report_errors {
                    error!("Order service error: {} - {}", status, body);
                }
                false
            }
            Err(err) => {
                if report_errors {
                    error!("Failed to reach order service: {}", err);
                }
                false
            }
        }
    }
}

pub fn endpoint(base_url: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), ORDER_CREATE_PATH)
}

/// Adds the `Bearer ` scheme when the forwarded credential lacks it.
pub fn bearer(credential: &str) -> String {
    let credential = credential.trim();
    let has_scheme = credential
        .get(..7)
        .is_some_and(|scheme| scheme.eq_ignore_ascii_case("bearer "));
    if has_scheme {
        credential.to_string()
    } else {
        format!("Bearer {}", credential)
    }
}

/// Breaks one part of the endpoint: host, port, path or scheme.
fn wrong_url(endpoint: &str, variant: usize) -> String {
    let Ok(mut url) = Url::parse(endpoint) else {
        return "invalid-url-without-protocol".to_string();
    };

    match variant % 4 {
        0 => {
            let _ = url.set_host(Some("order-service-wrong.invalid"));
        }
        1 => {
            let _ = url.set_port(Some(9));
        }
        2 => url.set_path("/wrong-endpoint"),
        _ => {
            let scheme = if url.scheme() == "https" { "http" } else { "https" };
            let _ = url.set_scheme(scheme);
        }
    }

    url.to_string()
}
