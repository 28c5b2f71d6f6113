use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use diesel::{
    QueryableByName, Selectable,
    prelude::{Insertable, Queryable},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

// Line items

/// One dish in one basket. `(basket_id, dish_id)` is unique.
#[derive(
    Queryable,
    QueryableByName,
    Selectable,
    Insertable,
    Serialize,
    Clone,
    Debug,
    PartialEq,
    ToSchema,
)]
#[diesel(table_name = crate::schema::cart_items)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub basket_id: String,
    pub dish_id: Uuid,
    pub name: String,
    pub unit_price: Decimal,
    pub image_url: String,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LineItem {
    pub fn subtotal(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Derived view over every line item sharing a basket id.
#[derive(Clone, Debug)]
pub struct Basket {
    pub basket_id: String,
    pub items: Vec<LineItem>,
}

impl Basket {
    pub fn new(basket_id: impl Into<String>, mut items: Vec<LineItem>) -> Self {
        items.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.dish_id.cmp(&b.dish_id))
        });
        Self {
            basket_id: basket_id.into(),
            items,
        }
    }

    /// Units across all lines. Lines are not capped on creation, so the sum is widened.
    pub fn item_count(&self) -> i64 {
        self.items.iter().map(|item| i64::from(item.quantity)).sum()
    }

    pub fn total(&self) -> Decimal {
        self.items.iter().map(LineItem::subtotal).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.item_count() == 0
    }
}

// Requests

#[derive(Deserialize, Serialize, Clone, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartRequest {
    pub dish_id: Uuid,
    pub name: String,
    pub price: Decimal,
    #[serde(default)]
    pub image_url: String,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
}

fn default_quantity() -> i32 {
    1
}

#[derive(Deserialize, Serialize, Clone, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateQuantityRequest {
    pub dish_id: String,
    pub quantity: i32,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct OrderRequest {
    pub phone_number: String,
    pub address: String,
    pub payment_method: String,
    pub comment: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    CardOnline,
    CardCourier,
    CashCourier,
}

impl PaymentMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentMethod::CardOnline => "CARD_ONLINE",
            PaymentMethod::CardCourier => "CARD_COURIER",
            PaymentMethod::CashCourier => "CASH_COURIER",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "CARD_ONLINE" => Ok(PaymentMethod::CardOnline),
            "CARD_COURIER" => Ok(PaymentMethod::CardCourier),
            "CASH_COURIER" => Ok(PaymentMethod::CashCourier),
            _ => Err(()),
        }
    }
}

// Responses

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CartItemResponse {
    pub dish_id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub image_url: String,
    pub quantity: i32,
    pub subtotal: Decimal,
}

impl From<&LineItem> for CartItemResponse {
    fn from(item: &LineItem) -> Self {
        Self {
            dish_id: item.dish_id,
            name: item.name.clone(),
            price: item.unit_price,
            image_url: item.image_url.clone(),
            quantity: item.quantity,
            subtotal: item.subtotal(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CartSummaryResponse {
    pub success: bool,
    pub error_message: Option<String>,
    pub basket_id: String,
    pub item_count: i64,
    pub total: Decimal,
    pub items: Option<Vec<CartItemResponse>>,
    pub is_empty: bool,
    pub has_items: bool,
}

impl CartSummaryResponse {
    pub fn from_basket(basket: &Basket, include_items: bool) -> Self {
        let item_count = basket.item_count();
        Self {
            success: true,
            error_message: None,
            basket_id: basket.basket_id.clone(),
            item_count,
            total: basket.total(),
            items: include_items.then(|| basket.items.iter().map(CartItemResponse::from).collect()),
            is_empty: item_count == 0,
            has_items: item_count > 0,
        }
    }

    pub fn empty(basket_id: impl Into<String>) -> Self {
        Self::from_basket(&Basket::new(basket_id, Vec::new()), true)
    }

    pub fn failure(basket_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            error_message: Some(message.into()),
            basket_id: basket_id.into(),
            item_count: 0,
            total: Decimal::ZERO,
            items: None,
            is_empty: true,
            has_items: false,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderCreationResponse {
    pub success: bool,
    pub message: Option<String>,
    pub error_message: Option<String>,
}

impl OrderCreationResponse {
    pub fn created() -> Self {
        Self {
            success: true,
            message: Some("Order created successfully".into()),
            error_message: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: None,
            error_message: Some(message.into()),
        }
    }
}
