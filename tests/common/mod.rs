#![allow(dead_code)]

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    routing::post,
};
use hits_cartservice::{
    api::orders::{OrderPayload, OrderServiceClient},
    defects::ModePicker,
    engine::CartEngine,
    models::{AddToCartRequest, LineItem, OrderRequest},
    orders::OrderSubmitter,
    store::{CartStore, InMemoryCartStore, StorageError},
};
use rust_decimal::Decimal;
use tokio::net::TcpListener;
use uuid::Uuid;

pub fn dish(price: i64, quantity: i32) -> AddToCartRequest {
    AddToCartRequest {
        dish_id: Uuid::new_v4(),
        name: "Olivier salad".into(),
        price: Decimal::from(price),
        image_url: "https://cdn.example.com/olivier.png".into(),
        quantity,
    }
}

pub fn same_dish(request: &AddToCartRequest, quantity: i32) -> AddToCartRequest {
    AddToCartRequest {
        quantity,
        ..request.clone()
    }
}

pub fn order_request() -> OrderRequest {
    OrderRequest {
        phone_number: "+7 (999) 123-45-67".into(),
        address: "Lenina 1, Tomsk".into(),
        payment_method: "card_online".into(),
        comment: Some("Ring twice".into()),
    }
}

pub fn engine(store: &InMemoryCartStore) -> CartEngine {
    CartEngine::new(Arc::new(store.clone()))
}

/// Submitter with fast simulated delays so broken modes finish quickly.
pub fn submitter(store: Arc<dyn CartStore>, picker: impl ModePicker + 'static) -> OrderSubmitter {
    let client = OrderServiceClient::new(reqwest::Client::new())
        .with_timings(Duration::from_millis(10), Duration::from_millis(100));
    OrderSubmitter::new(CartEngine::new(store), client, Arc::new(picker))
}

/// Store whose every operation fails.
#[derive(Clone, Debug, Default)]
pub struct FailingStore;

#[async_trait]
impl CartStore for FailingStore {
    async fn find_item(&self, _: &str, _: Uuid) -> Result<Option<LineItem>, StorageError> {
        Err(StorageError::Unavailable("connection refused".into()))
    }

    async fn list_items(&self, _: &str) -> Result<Vec<LineItem>, StorageError> {
        Err(StorageError::Unavailable("connection refused".into()))
    }

    async fn upsert(&self, _: &LineItem) -> Result<(), StorageError> {
        Err(StorageError::Unavailable("connection refused".into()))
    }

    async fn add_or_increment(
        &self,
        _: &LineItem,
        _: i32,
        _: i32,
    ) -> Result<LineItem, StorageError> {
        Err(StorageError::Unavailable("connection refused".into()))
    }

    async fn delete(&self, _: &LineItem) -> Result<(), StorageError> {
        Err(StorageError::Unavailable("connection refused".into()))
    }

    async fn delete_all(&self, _: &str) -> Result<usize, StorageError> {
        Err(StorageError::Unavailable("connection refused".into()))
    }
}

/// In-memory store that counts how often it is called.
#[derive(Clone, Debug, Default)]
pub struct CountingStore {
    pub inner: InMemoryCartStore,
    calls: Arc<AtomicUsize>,
}

impl CountingStore {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl CartStore for CountingStore {
    async fn find_item(
        &self,
        basket_id: &str,
        dish_id: Uuid,
    ) -> Result<Option<LineItem>, StorageError> {
        self.hit();
        self.inner.find_item(basket_id, dish_id).await
    }

    async fn list_items(&self, basket_id: &str) -> Result<Vec<LineItem>, StorageError> {
        self.hit();
        self.inner.list_items(basket_id).await
    }

    async fn upsert(&self, item: &LineItem) -> Result<(), StorageError> {
        self.hit();
        self.inner.upsert(item).await
    }

    async fn add_or_increment(
        &self,
        item: &LineItem,
        delta: i32,
        limit: i32,
    ) -> Result<LineItem, StorageError> {
        self.hit();
        self.inner.add_or_increment(item, delta, limit).await
    }

    async fn delete(&self, item: &LineItem) -> Result<(), StorageError> {
        self.hit();
        self.inner.delete(item).await
    }

    async fn delete_all(&self, basket_id: &str) -> Result<usize, StorageError> {
        self.hit();
        self.inner.delete_all(basket_id).await
    }
}

/// In-memory store that gives way to other tasks before every call, so concurrent
/// operations interleave between their store calls.
#[derive(Clone, Debug, Default)]
pub struct YieldingStore {
    pub inner: InMemoryCartStore,
}

#[async_trait]
impl CartStore for YieldingStore {
    async fn find_item(
        &self,
        basket_id: &str,
        dish_id: Uuid,
    ) -> Result<Option<LineItem>, StorageError> {
        tokio::task::yield_now().await;
        self.inner.find_item(basket_id, dish_id).await
    }

    async fn list_items(&self, basket_id: &str) -> Result<Vec<LineItem>, StorageError> {
        tokio::task::yield_now().await;
        self.inner.list_items(basket_id).await
    }

    async fn upsert(&self, item: &LineItem) -> Result<(), StorageError> {
        tokio::task::yield_now().await;
        self.inner.upsert(item).await
    }

    async fn add_or_increment(
        &self,
        item: &LineItem,
        delta: i32,
        limit: i32,
    ) -> Result<LineItem, StorageError> {
        tokio::task::yield_now().await;
        self.inner.add_or_increment(item, delta, limit).await
    }

    async fn delete(&self, item: &LineItem) -> Result<(), StorageError> {
        tokio::task::yield_now().await;
        self.inner.delete(item).await
    }

    async fn delete_all(&self, basket_id: &str) -> Result<usize, StorageError> {
        tokio::task::yield_now().await;
        self.inner.delete_all(basket_id).await
    }
}

#[derive(Clone, Debug)]
pub struct ReceivedOrder {
    pub authorization: Option<String>,
    pub payload: OrderPayload,
}

type Received = Arc<Mutex<Vec<ReceivedOrder>>>;

/// Order service stand-in listening on a random local port.
pub struct StubOrderService {
    pub base_url: String,
    received: Received,
}

impl StubOrderService {
    /// Accepts well-formed `POST /order/create` JSON and answers with `status`.
    pub async fn spawn(status: StatusCode) -> Self {
        let received: Received = Arc::default();
        let app = Router::new()
            .route("/order/create", post(create_order))
            .with_state((received.clone(), status));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{}", addr),
            received,
        }
    }

    pub fn received(&self) -> Vec<ReceivedOrder> {
        self.received.lock().unwrap().clone()
    }
}

async fn create_order(
    State((received, status)): State<(Received, StatusCode)>,
    headers: HeaderMap,
    Json(payload): Json<OrderPayload>,
) -> StatusCode {
    let authorization = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    received.lock().unwrap().push(ReceivedOrder {
        authorization,
        payload,
    });
    status
}
