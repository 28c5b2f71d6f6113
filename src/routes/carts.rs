use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::router::OpenApiRouter;

use crate::{
    app_error::AppError,
    app_state::AppState,
    models::{
        AddToCartRequest, CartSummaryResponse, OrderCreationResponse, OrderRequest,
        UpdateQuantityRequest,
    },
};

/// Header carrying the client's basket id.
pub const BASKET_ID_HEADER: &str = "basketid";
/// Header set by the authentication gateway once the bearer token has been verified.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Defines the cart routes with OpenAPI specs.
pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().nest(
        "/api/cart",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(get_cart))
            .routes(utoipa_axum::routes!(add_to_cart))
            .routes(utoipa_axum::routes!(update_quantity))
            .routes(utoipa_axum::routes!(remove_from_cart))
            .routes(utoipa_axum::routes!(clear_cart))
            .routes(utoipa_axum::routes!(get_cart_summary))
            .routes(utoipa_axum::routes!(is_in_cart))
            .routes(utoipa_axum::routes!(create_order)),
    )
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn basket_id(headers: &HeaderMap) -> &str {
    header(headers, BASKET_ID_HEADER).unwrap_or_default()
}

fn cart_reply(response: CartSummaryResponse) -> (StatusCode, Json<CartSummaryResponse>) {
    let status = if response.success {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };
    (status, Json(response))
}

#[derive(Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
struct GetCartQuery {
    /// Basket to load; a new one is issued when absent.
    basket_id: Option<String>,
}

/// Fetch the full cart, issuing a basket id when none is given.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Cart"],
    params(GetCartQuery),
    responses(
        (status = 200, description = "Cart contents", body = CartSummaryResponse)
    )
)]
async fn get_cart(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<GetCartQuery>,
) -> impl IntoResponse {
    let flags = state.flags.snapshot();
    let basket_id = query
        .basket_id
        .as_deref()
        .or_else(|| header(&headers, BASKET_ID_HEADER));

    cart_reply(state.engine.get_cart(&flags, basket_id).await)
}

/// Add a dish to the cart, or increase its quantity.
#[utoipa::path(
    post,
    path = "/add",
    tags = ["Cart"],
    params(("basketId" = String, Header, description = "Basket id")),
    request_body = AddToCartRequest,
    responses(
        (status = 200, description = "Item added", body = CartSummaryResponse),
        (status = 400, description = "Item not added", body = CartSummaryResponse)
    )
)]
async fn add_to_cart(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<AddToCartRequest>,
) -> impl IntoResponse {
    let flags = state.flags.snapshot();
    cart_reply(state.engine.add_to_cart(&flags, basket_id(&headers), body).await)
}

/// Set the quantity of a dish already in the cart.
#[utoipa::path(
    put,
    path = "/update",
    tags = ["Cart"],
    params(("basketId" = String, Header, description = "Basket id")),
    request_body = UpdateQuantityRequest,
    responses(
        (status = 200, description = "Quantity updated", body = CartSummaryResponse),
        (status = 400, description = "Quantity not updated", body = CartSummaryResponse)
    )
)]
async fn update_quantity(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<UpdateQuantityRequest>,
) -> impl IntoResponse {
    let flags = state.flags.snapshot();
    cart_reply(
        state
            .engine
            .update_quantity(&flags, basket_id(&headers), &body.dish_id, body.quantity)
            .await,
    )
}

/// Remove a dish from the cart.
#[utoipa::path(
    delete,
    path = "/remove/{dish_id}",
    tags = ["Cart"],
    params(
        ("dish_id" = String, Path, description = "Dish to remove"),
        ("basketId" = String, Header, description = "Basket id")
    ),
    responses(
        (status = 200, description = "Item removed", body = CartSummaryResponse),
        (status = 400, description = "Item not removed", body = CartSummaryResponse)
    )
)]
async fn remove_from_cart(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(dish_id): Path<String>,
) -> impl IntoResponse {
    let flags = state.flags.snapshot();
    cart_reply(
        state
            .engine
            .remove_from_cart(&flags, basket_id(&headers), &dish_id)
            .await,
    )
}

/// Remove every item from the cart.
#[utoipa::path(
    delete,
    path = "/clear",
    tags = ["Cart"],
    params(("basketId" = String, Header, description = "Basket id")),
    responses(
        (status = 200, description = "Cart cleared", body = CartSummaryResponse)
    )
)]
async fn clear_cart(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    cart_reply(state.engine.clear_cart(basket_id(&headers)).await)
}

/// Item count and total without the item list.
#[utoipa::path(
    get,
    path = "/summary",
    tags = ["Cart"],
    params(("basketId" = String, Header, description = "Basket id")),
    responses(
        (status = 200, description = "Cart summary", body = CartSummaryResponse)
    )
)]
async fn get_cart_summary(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let flags = state.flags.snapshot();
    cart_reply(
        state
            .engine
            .get_cart_summary(&flags, basket_id(&headers))
            .await,
    )
}

#[derive(Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IsInCartRes {
    pub dish_id: String,
    pub in_cart: bool,
}

/// Check whether a dish is in the cart.
#[utoipa::path(
    get,
    path = "/check/{dish_id}",
    tags = ["Cart"],
    params(
        ("dish_id" = String, Path, description = "Dish to look for"),
        ("basketId" = String, Header, description = "Basket id")
    ),
    responses(
        (status = 200, description = "Membership flag", body = IsInCartRes)
    )
)]
async fn is_in_cart(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(dish_id): Path<String>,
) -> impl IntoResponse {
    let in_cart = state.engine.is_in_cart(basket_id(&headers), &dish_id).await;
    Json(IsInCartRes { dish_id, in_cart })
}

/// Submit the cart as an order for the authenticated user.
#[utoipa::path(
    post,
    path = "/create-order",
    tags = ["Cart"],
    security(("bearerAuth" = [])),
    params(("basketId" = String, Header, description = "Basket id")),
    request_body = OrderRequest,
    responses(
        (status = 200, description = "Order created", body = OrderCreationResponse),
        (status = 400, description = "Order not created", body = OrderCreationResponse),
        (status = 401, description = "Caller not authenticated")
    )
)]
async fn create_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<OrderRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = header(&headers, USER_ID_HEADER)
        .ok_or_else(|| AppError::Unauthorized("User authentication failed".into()))?;
    let credential = header(&headers, AUTHORIZATION.as_str());

    let flags = state.flags.snapshot();
    let response = state
        .submitter
        .create_order_from_cart(&flags, basket_id(&headers), Some(user_id), credential, &body)
        .await;

    let status = if response.success {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };
    Ok((status, Json(response)))
}
