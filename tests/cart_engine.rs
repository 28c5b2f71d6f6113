mod common;

use common::{FailingStore, YieldingStore, dish, engine, same_dish};
use hits_cartservice::{
    engine::CartEngine,
    flags::{BugFlag, FlagSet},
    store::{CartStore, InMemoryCartStore},
};
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

const BASKET: &str = "basket_test00000001";

fn clean() -> FlagSet {
    FlagSet::default()
}

#[tokio::test]
async fn repeated_add_merges_into_one_line() {
    let store = InMemoryCartStore::new();
    let engine = engine(&store);
    let request = dish(250, 2);

    engine.add_to_cart(&clean(), BASKET, request.clone()).await;
    let response = engine
        .add_to_cart(&clean(), BASKET, same_dish(&request, 3))
        .await;

    assert!(response.success);
    assert_eq!(response.item_count, 5);
    assert_eq!(response.total, Decimal::from(1250));
    let items = response.items.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].quantity, 5);
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn suppressed_add_keeps_quantity() {
    let store = InMemoryCartStore::new();
    let engine = engine(&store);
    let request = dish(100, 2);
    engine.add_to_cart(&clean(), BASKET, request.clone()).await;

    let flags = clean().with(BugFlag::NoQuantityChangeOnAdd, true);
    let response = engine
        .add_to_cart(&flags, BASKET, same_dish(&request, 4))
        .await;

    assert!(response.success);
    assert_eq!(response.item_count, 2);
    let stored = store.find_item(BASKET, request.dish_id).await.unwrap().unwrap();
    assert_eq!(stored.quantity, 2);
    assert!(stored.updated_at >= stored.created_at);

    // a dish not yet in the cart still lands with the requested quantity
    let fresh = dish(50, 3);
    let response = engine.add_to_cart(&flags, BASKET, fresh.clone()).await;

    assert!(response.success);
    assert_eq!(response.item_count, 5);
    let stored = store.find_item(BASKET, fresh.dish_id).await.unwrap().unwrap();
    assert_eq!(stored.quantity, 3);
    assert_eq!(store.len(), 2);
}

#[tokio::test]
async fn concurrent_adds_of_one_dish_are_not_lost() {
    let store = YieldingStore::default();
    let engine = CartEngine::new(Arc::new(store.clone()));
    let request = dish(100, 2);
    let flags = clean();

    let (first, second) = tokio::join!(
        engine.add_to_cart(&flags, BASKET, request.clone()),
        engine.add_to_cart(&flags, BASKET, same_dish(&request, 3)),
    );

    assert!(first.success);
    assert!(second.success);
    let items = store.inner.list_items(BASKET).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].quantity, 5);
}

#[tokio::test]
async fn item_count_does_not_wrap_on_large_lines() {
    let store = InMemoryCartStore::new();
    let engine = engine(&store);
    engine.add_to_cart(&clean(), BASKET, dish(1, 2_000_000_000)).await;

    let response = engine
        .add_to_cart(&clean(), BASKET, dish(1, 2_000_000_000))
        .await;

    assert!(response.success);
    assert!(response.has_items);
    assert!(!response.is_empty);
    assert_eq!(response.item_count, 4_000_000_000);
    assert_eq!(response.total, Decimal::from(4_000_000_000_i64));
}

#[tokio::test]
async fn prices_and_long_basket_ids_are_kept_exactly() {
    let store = InMemoryCartStore::new();
    let engine = engine(&store);
    let basket_id = format!("basket_{}", "x".repeat(120));
    let mut request = dish(0, 2);
    request.price = Decimal::new(12345, 3);
    request.name = "Pelmeni ".repeat(20);

    let response = engine.add_to_cart(&clean(), &basket_id, request.clone()).await;

    assert!(response.success, "{:?}", response.error_message);
    assert_eq!(response.total, Decimal::new(24690, 3));
    let stored = store.find_item(&basket_id, request.dish_id).await.unwrap().unwrap();
    assert_eq!(stored.unit_price, Decimal::new(12345, 3));
    assert_eq!(stored.name, request.name);
}

#[tokio::test]
async fn suppressed_removal_keeps_item() {
    let store = InMemoryCartStore::new();
    let engine = engine(&store);
    let request = dish(100, 1);
    engine.add_to_cart(&clean(), BASKET, request.clone()).await;
    let dish_id = request.dish_id.to_string();

    let flags = clean().with(BugFlag::NoQuantityChangeOnRemove, true);
    let response = engine.remove_from_cart(&flags, BASKET, &dish_id).await;
    assert!(response.success);
    assert_eq!(response.item_count, 1);
    assert!(engine.is_in_cart(BASKET, &dish_id).await);

    let response = engine.remove_from_cart(&clean(), BASKET, &dish_id).await;
    assert!(response.success);
    assert!(response.is_empty);
    assert!(!engine.is_in_cart(BASKET, &dish_id).await);
}

#[tokio::test]
async fn calculation_bug_inflates_stored_price() {
    let store = InMemoryCartStore::new();
    let engine = engine(&store);
    let request = dish(100, 2);

    let flags = clean().with(BugFlag::Calculation, true);
    let response = engine.add_to_cart(&flags, BASKET, request.clone()).await;

    assert!(response.success);
    assert_eq!(response.total, Decimal::from(204));
    let stored = store.find_item(BASKET, request.dish_id).await.unwrap().unwrap();
    assert_eq!(stored.unit_price, Decimal::from(102));
}

#[tokio::test]
async fn response_bug_only_touches_reported_total() {
    let store = InMemoryCartStore::new();
    let engine = engine(&store);
    engine.add_to_cart(&clean(), BASKET, dish(100, 3)).await;

    let flags = clean().with(BugFlag::Response, true);
    let inflated = engine.get_cart_summary(&flags, BASKET).await;
    assert_eq!(inflated.total, Decimal::from(330));
    assert_eq!(inflated.item_count, 3);

    let basket = engine.basket(BASKET).await.unwrap();
    assert_eq!(basket.total(), Decimal::from(300));
    assert_eq!(engine.get_cart_summary(&clean(), BASKET).await.total, Decimal::from(300));
}

#[tokio::test]
async fn increments_are_clamped_to_item_limit() {
    let store = InMemoryCartStore::new();
    let engine = engine(&store);
    let flags = FlagSet {
        cart_item_limit: 10,
        ..clean()
    };
    let request = dish(10, 8);
    engine.add_to_cart(&flags, BASKET, request.clone()).await;

    let response = engine
        .add_to_cart(&flags, BASKET, same_dish(&request, 5))
        .await;
    assert_eq!(response.item_count, 10);

    // at the limit an add still moves the quantity by one
    let response = engine
        .add_to_cart(&flags, BASKET, same_dish(&request, 5))
        .await;
    assert_eq!(response.item_count, 11);
}

#[tokio::test]
async fn overflow_bug_is_still_clamped() {
    let store = InMemoryCartStore::new();
    let engine = engine(&store);
    let request = dish(10, 1);
    engine.add_to_cart(&clean(), BASKET, request.clone()).await;

    let flags = clean().with(BugFlag::Overflow, true);
    let response = engine
        .add_to_cart(&flags, BASKET, same_dish(&request, 1))
        .await;

    assert_eq!(response.item_count, i64::from(flags.cart_item_limit));
}

#[tokio::test]
async fn validation_bug_still_clamps_matching_dishes() {
    let store = InMemoryCartStore::new();
    let engine = engine(&store);
    let mut request = dish(10, 1);
    request.dish_id = Uuid::parse_str("3f2c1b4a-5d6e-4f70-8a9b-0c1d2e3f4a59").unwrap();
    engine.add_to_cart(&clean(), BASKET, request.clone()).await;

    let flags = clean()
        .with(BugFlag::Overflow, true)
        .with(BugFlag::Validation, true);
    let response = engine
        .add_to_cart(&flags, BASKET, same_dish(&request, 1))
        .await;

    assert!(response.success);
    assert_eq!(response.item_count, i64::from(flags.cart_item_limit));
}

#[tokio::test]
async fn rejects_bad_input() {
    let store = InMemoryCartStore::new();
    let engine = engine(&store);

    let response = engine.add_to_cart(&clean(), " ", dish(10, 1)).await;
    assert!(!response.success);
    assert_eq!(response.error_message.as_deref(), Some("Basket ID is required"));

    let response = engine.add_to_cart(&clean(), BASKET, dish(10, 0)).await;
    assert_eq!(response.error_message.as_deref(), Some("Quantity must be at least 1"));

    let response = engine.remove_from_cart(&clean(), BASKET, "not-a-uuid").await;
    assert_eq!(response.error_message.as_deref(), Some("Invalid dish id format"));

    let missing = Uuid::new_v4().to_string();
    let response = engine.remove_from_cart(&clean(), BASKET, &missing).await;
    assert_eq!(response.error_message.as_deref(), Some("Item not found in cart"));

    assert!(store.is_empty());
}

#[tokio::test]
async fn update_sets_absolute_quantity() {
    let store = InMemoryCartStore::new();
    let engine = engine(&store);
    let request = dish(40, 2);
    engine.add_to_cart(&clean(), BASKET, request.clone()).await;
    let dish_id = request.dish_id.to_string();

    let response = engine.update_quantity(&clean(), BASKET, &dish_id, 7).await;
    assert!(response.success);
    assert_eq!(response.item_count, 7);
    assert_eq!(response.total, Decimal::from(280));

    let response = engine.update_quantity(&clean(), BASKET, &dish_id, 0).await;
    assert!(!response.success);

    let missing = Uuid::new_v4().to_string();
    let response = engine.update_quantity(&clean(), BASKET, &missing, 3).await;
    assert_eq!(response.error_message.as_deref(), Some("Item not found in cart"));
}

#[tokio::test]
async fn clear_only_touches_its_basket() {
    let store = InMemoryCartStore::new();
    let engine = engine(&store);
    engine.add_to_cart(&clean(), BASKET, dish(10, 1)).await;
    engine.add_to_cart(&clean(), BASKET, dish(20, 1)).await;
    engine.add_to_cart(&clean(), "basket_other", dish(30, 1)).await;

    let response = engine.clear_cart(BASKET).await;

    assert!(response.success);
    assert!(response.is_empty);
    assert_eq!(response.total, Decimal::ZERO);
    assert_eq!(store.len(), 1);
    assert_eq!(engine.basket("basket_other").await.unwrap().item_count(), 1);
}

#[tokio::test]
async fn summary_leaves_out_items() {
    let store = InMemoryCartStore::new();
    let engine = engine(&store);
    engine.add_to_cart(&clean(), BASKET, dish(15, 2)).await;

    let summary = engine.get_cart_summary(&clean(), BASKET).await;
    assert!(summary.success);
    assert!(summary.items.is_none());
    assert!(summary.has_items);

    let full = engine.get_cart(&clean(), Some(BASKET)).await;
    assert_eq!(full.items.map(|items| items.len()), Some(1));
}

#[tokio::test]
async fn get_cart_without_id_issues_one() {
    let store = InMemoryCartStore::new();
    let engine = engine(&store);

    let response = engine.get_cart(&clean(), None).await;

    assert!(response.success);
    assert!(response.basket_id.starts_with("basket_"));
    assert_eq!(response.basket_id.len(), "basket_".len() + 12);
    assert!(response.is_empty);
    assert_ne!(response.basket_id, CartEngine::generate_basket_id());
}

#[tokio::test]
async fn relative_images_get_the_base_url() {
    let store = InMemoryCartStore::new();
    let engine = engine(&store);
    let mut request = dish(10, 1);
    request.image_url = "/images/olivier.png".into();

    engine.add_to_cart(&clean(), BASKET, request.clone()).await;

    let stored = store.find_item(BASKET, request.dish_id).await.unwrap().unwrap();
    assert_eq!(stored.image_url, "http://localhost:5000/images/olivier.png");
}

#[tokio::test]
async fn storage_failures_become_generic_errors() {
    let engine = CartEngine::new(Arc::new(FailingStore));

    let response = engine.add_to_cart(&clean(), BASKET, dish(10, 1)).await;
    assert!(!response.success);
    assert_eq!(response.error_message.as_deref(), Some("Failed to add item to cart"));

    let leaky = clean().with(BugFlag::InfoLeak, true);
    let response = engine.add_to_cart(&leaky, BASKET, dish(10, 1)).await;
    assert_eq!(response.error_message.as_deref(), Some("Failed to add item to cart"));

    let response = engine.clear_cart(BASKET).await;
    assert_eq!(response.error_message.as_deref(), Some("Failed to clear the cart"));

    let dish_id = Uuid::new_v4().to_string();
    assert!(!engine.is_in_cart(BASKET, &dish_id).await);
}

#[tokio::test]
async fn is_in_cart_tolerates_bad_input() {
    let store = InMemoryCartStore::new();
    let engine = engine(&store);
    let request = dish(10, 1);
    engine.add_to_cart(&clean(), BASKET, request.clone()).await;

    assert!(engine.is_in_cart(BASKET, &request.dish_id.to_string()).await);
    assert!(!engine.is_in_cart("", &request.dish_id.to_string()).await);
    assert!(!engine.is_in_cart(BASKET, "dish-42").await);
}
