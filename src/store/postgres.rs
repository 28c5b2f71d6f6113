use anyhow::Context;
use async_trait::async_trait;
use diesel::{
    ExpressionMethods, OptionalExtension, QueryDsl, SelectableHelper,
    result::{DatabaseErrorKind, Error as DieselError},
    sql_types::{Integer, Numeric, Text, Timestamptz, Uuid as SqlUuid},
    upsert::excluded,
};
use diesel_async::{
    AsyncPgConnection, RunQueryDsl,
    pooled_connection::{AsyncDieselConnectionManager, bb8::Pool},
};
use uuid::Uuid;

use super::{CartStore, StorageError};
use crate::{models::LineItem, schema::cart_items};

pub type DbPool = Pool<AsyncPgConnection>;

/// Insert-or-increment in one statement. The arithmetic runs in BIGINT and follows
/// `incremented_quantity`: a positive delta past the limit is cut to `max(1, limit - quantity)`.
const ADD_OR_INCREMENT: &str = "\
INSERT INTO cart_items \
    (basket_id, dish_id, name, unit_price, image_url, quantity, created_at, updated_at) \
VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
ON CONFLICT (basket_id, dish_id) DO UPDATE SET \
    quantity = LEAST( \
        CASE \
            WHEN $9 > 0 AND cart_items.quantity::BIGINT + $9 > $10 \
                THEN cart_items.quantity::BIGINT + GREATEST($10::BIGINT - cart_items.quantity, 1) \
            ELSE cart_items.quantity::BIGINT + $9 \
        END, \
        2147483647 \
    )::INTEGER, \
    updated_at = EXCLUDED.updated_at \
RETURNING basket_id, dish_id, name, unit_price, image_url, quantity, created_at, updated_at";

/// Postgres-backed cart store over the `cart_items` table.
#[derive(Clone)]
pub struct PgCartStore {
    pool: DbPool,
}

impl PgCartStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(database_url);
        let pool = Pool::builder()
            .build(manager)
            .await
            .context("Failed to build a DB connection pool")?;

        Ok(Self::new(pool))
    }
}

impl From<DieselError> for StorageError {
    fn from(err: DieselError) -> Self {
        match err {
            DieselError::DatabaseError(
                DatabaseErrorKind::UniqueViolation
                | DatabaseErrorKind::ForeignKeyViolation
                | DatabaseErrorKind::NotNullViolation
                | DatabaseErrorKind::CheckViolation,
                info,
            ) => StorageError::Constraint(info.message().to_string()),
            DieselError::DatabaseError(DatabaseErrorKind::ClosedConnection, info) => {
                StorageError::Unavailable(info.message().to_string())
            }
            other => StorageError::Query(other.to_string()),
        }
    }
}

fn pool_error<E: std::fmt::Display>(err: E) -> StorageError {
    StorageError::Unavailable(format!("Failed to obtain a DB connection: {}", err))
}

#[async_trait]
impl CartStore for PgCartStore {
    async fn find_item(
        &self,
        basket_id: &str,
        dish_id: Uuid,
    ) -> Result<Option<LineItem>, StorageError> {
        let conn = &mut self.pool.get().await.map_err(pool_error)?;

        let item = cart_items::table
            .filter(cart_items::basket_id.eq(basket_id))
            .filter(cart_items::dish_id.eq(dish_id))
            .select(LineItem::as_select())
            .first(conn)
            .await
            .optional()?;

        Ok(item)
    }

    async fn list_items(&self, basket_id: &str) -> Result<Vec<LineItem>, StorageError> {
        let conn = &mut self.pool.get().await.map_err(pool_error)?;

        let items = cart_items::table
            .filter(cart_items::basket_id.eq(basket_id))
            .order_by(cart_items::created_at.asc())
            .select(LineItem::as_select())
            .get_results(conn)
            .await?;

        Ok(items)
    }

    async fn upsert(&self, item: &LineItem) -> Result<(), StorageError> {
        let conn = &mut self.pool.get().await.map_err(pool_error)?;

        // Single statement so concurrent adds for one key never race into a duplicate row.
        diesel::insert_into(cart_items::table)
            .values(item)
            .on_conflict((cart_items::basket_id, cart_items::dish_id))
            .do_update()
            .set((
                cart_items::name.eq(excluded(cart_items::name)),
                cart_items::unit_price.eq(excluded(cart_items::unit_price)),
                cart_items::image_url.eq(excluded(cart_items::image_url)),
                cart_items::quantity.eq(excluded(cart_items::quantity)),
                cart_items::updated_at.eq(excluded(cart_items::updated_at)),
            ))
            .execute(conn)
            .await?;

        Ok(())
    }

    async fn add_or_increment(
        &self,
        item: &LineItem,
        delta: i32,
        limit: i32,
    ) -> Result<LineItem, StorageError> {
        let conn = &mut self.pool.get().await.map_err(pool_error)?;

        let row = diesel::sql_query(ADD_OR_INCREMENT)
            .bind::<Text, _>(&item.basket_id)
            .bind::<SqlUuid, _>(item.dish_id)
            .bind::<Text, _>(&item.name)
            .bind::<Numeric, _>(item.unit_price)
            .bind::<Text, _>(&item.image_url)
            .bind::<Integer, _>(item.quantity)
            .bind::<Timestamptz, _>(item.created_at)
            .bind::<Timestamptz, _>(item.updated_at)
            .bind::<Integer, _>(delta)
            .bind::<Integer, _>(limit)
            .get_result::<LineItem>(conn)
            .await?;

        Ok(row)
    }

    async fn delete(&self, item: &LineItem) -> Result<(), StorageError> {
        let conn = &mut self.pool.get().await.map_err(pool_error)?;

        diesel::delete(
            cart_items::table
                .filter(cart_items::basket_id.eq(&item.basket_id))
                .filter(cart_items::dish_id.eq(item.dish_id)),
        )
        .execute(conn)
        .await?;

        Ok(())
    }

    async fn delete_all(&self, basket_id: &str) -> Result<usize, StorageError> {
        let conn = &mut self.pool.get().await.map_err(pool_error)?;

        let removed = diesel::delete(cart_items::table.filter(cart_items::basket_id.eq(basket_id)))
            .execute(conn)
            .await?;

        Ok(removed)
    }
}
