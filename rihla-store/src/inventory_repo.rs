use async_trait::async_trait;
use rihla_core::{
    Availability, Catalog, CoreError, CoreResult, InventoryLedger, PriceSnapshot, ReservationToken, ResourceInfo,
    ResourceRef,
};
use rust_decimal::Decimal;
use sqlx::{PgPool, Row};
use tracing::debug;

/// Postgres-backed inventory ledger.
///
/// Each mutation is one transaction: the capacity row is changed by a conditional
/// `UPDATE` and the hold is tracked in `reservation_holds`, so concurrent reserves
/// on the same row are serialized by Postgres row locking.
#[derive(Clone)]
pub struct PgInventoryLedger {
    pool: PgPool,
}

impl PgInventoryLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts a resource with all of its capacity available; no-op if it exists.
    pub async fn register(
        &self,
        resource: ResourceRef,
        title: &str,
        total_capacity: u32,
        price: PriceSnapshot,
    ) -> CoreResult<()> {
        let total = to_db_quantity(total_capacity)?;
        if total == 0 {
            return Err(CoreError::Validation(format!(
                "{} must have a total capacity of at least 1",
                resource
            )));
        }

        sqlx::query(
            "INSERT INTO resources (kind, id, title, total_capacity, available_capacity, price_sar, price_usd) \
             VALUES ($1, $2, $3, $4, $4, $5, $6) ON CONFLICT (kind, id) DO NOTHING",
        )
        .bind(resource.kind().as_str())
        .bind(resource.id())
        .bind(title)
        .bind(total)
        .bind(price.sar)
        .bind(price.usd)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }
}

#[async_trait]
impl InventoryLedger for PgInventoryLedger {
    /// Decrements `available_capacity` only where it still covers `quantity`; a
    /// miss leaves the row untouched and no hold row is written.
    async fn reserve(&self, resource: ResourceRef, quantity: u32) -> CoreResult<ReservationToken> {
        if quantity == 0 {
            return Err(CoreError::Validation("quantity must be at least 1".to_string()));
        }
        let requested = to_db_quantity(quantity)?;

        let mut tx = self.pool.begin().await.map_err(db_error)?;

        let updated = sqlx::query(
            "UPDATE resources SET available_capacity = available_capacity - $3 \
             WHERE kind = $1 AND id = $2 AND available_capacity >= $3 \
             RETURNING available_capacity",
        )
        .bind(resource.kind().as_str())
        .bind(resource.id())
        .bind(requested)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_error)?;

        let Some(row) = updated else {
            let current: Option<i32> =
                sqlx::query_scalar("SELECT available_capacity FROM resources WHERE kind = $1 AND id = $2")
                    .bind(resource.kind().as_str())
                    .bind(resource.id())
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(db_error)?;
            tx.rollback().await.map_err(db_error)?;

            return Err(match current {
                None => CoreError::not_found("resource", resource),
                Some(available) => CoreError::InsufficientCapacity {
                    resource: resource.to_string(),
                    requested: quantity,
                    available: available.max(0) as u32,
                },
            });
        };
        let remaining: i32 = row.try_get("available_capacity").map_err(db_error)?;

        let token = ReservationToken::issue(resource, quantity);
        sqlx::query(
            "INSERT INTO reservation_holds (token_id, kind, resource_id, quantity, issued_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(token.id)
        .bind(resource.kind().as_str())
        .bind(resource.id())
        .bind(requested)
        .bind(token.issued_at)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        tx.commit().await.map_err(db_error)?;

        debug!(%resource, quantity, remaining, token = %token.id, "Capacity reserved");
        Ok(token)
    }

    /// Deleting the hold row is the release claim: a second release of the same
    /// token finds nothing to delete. The capacity update refuses to push
    /// `available_capacity` past `total_capacity`.
    async fn release(&self, token: &ReservationToken) -> CoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        let held: Option<i32> = sqlx::query_scalar(
            "DELETE FROM reservation_holds WHERE token_id = $1 AND kind = $2 AND resource_id = $3 RETURNING quantity",
        )
        .bind(token.id)
        .bind(token.resource.kind().as_str())
        .bind(token.resource.id())
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_error)?;

        let Some(held) = held else {
            tx.rollback().await.map_err(db_error)?;
            return Err(CoreError::invariant(format!(
                "release of unknown or already released token {} on {}",
                token.id, token.resource
            )));
        };

        if held != to_db_quantity(token.quantity)? {
            tx.rollback().await.map_err(db_error)?;
            return Err(CoreError::invariant(format!(
                "token {} claims {} units but holds {}",
                token.id, token.quantity, held
            )));
        }

        let restored = sqlx::query(
            "UPDATE resources SET available_capacity = available_capacity + $3 \
             WHERE kind = $1 AND id = $2 AND available_capacity + $3 <= total_capacity",
        )
        .bind(token.resource.kind().as_str())
        .bind(token.resource.id())
        .bind(held)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        if restored.rows_affected() == 0 {
            tx.rollback().await.map_err(db_error)?;
            return Err(CoreError::invariant(format!(
                "release of {} units on {} would exceed total capacity",
                held, token.resource
            )));
        }

        tx.commit().await.map_err(db_error)?;
        debug!(resource = %token.resource, quantity = held, "Capacity released");
        Ok(())
    }

    /// Marks the hold as backing a confirmed booking. Capacity stays held until release.
    async fn commit(&self, token: &ReservationToken) -> CoreResult<()> {
        let result = sqlx::query("UPDATE reservation_holds SET committed = TRUE WHERE token_id = $1")
            .bind(token.id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(CoreError::invariant(format!(
                "commit of unknown or released token {} on {}",
                token.id, token.resource
            )));
        }
        Ok(())
    }

    async fn availability(&self, resource: ResourceRef) -> CoreResult<Availability> {
        let row = sqlx::query("SELECT total_capacity, available_capacity FROM resources WHERE kind = $1 AND id = $2")
            .bind(resource.kind().as_str())
            .bind(resource.id())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?
            .ok_or_else(|| CoreError::not_found("resource", resource))?;

        Ok(Availability {
            total: from_db_quantity(row.try_get("total_capacity").map_err(db_error)?),
            available: from_db_quantity(row.try_get("available_capacity").map_err(db_error)?),
        })
    }
}

/// Catalog reads from the `resources` table.
#[derive(Clone)]
pub struct PgCatalog {
    pool: PgPool,
}

impl PgCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Catalog for PgCatalog {
    async fn get_resource(&self, resource: ResourceRef) -> CoreResult<ResourceInfo> {
        let row = sqlx::query(
            "SELECT title, total_capacity, available_capacity, price_sar, price_usd, is_active \
             FROM resources WHERE kind = $1 AND id = $2",
        )
        .bind(resource.kind().as_str())
        .bind(resource.id())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?
        .ok_or_else(|| CoreError::not_found("resource", resource))?;

        let sar: Decimal = row.try_get("price_sar").map_err(db_error)?;
        let usd: Decimal = row.try_get("price_usd").map_err(db_error)?;

        Ok(ResourceInfo {
            resource,
            title: row.try_get("title").map_err(db_error)?,
            total_capacity: from_db_quantity(row.try_get("total_capacity").map_err(db_error)?),
            available_capacity: from_db_quantity(row.try_get("available_capacity").map_err(db_error)?),
            list_price: PriceSnapshot::new(sar, usd),
            is_active: row.try_get("is_active").map_err(db_error)?,
        })
    }
}

fn to_db_quantity(quantity: u32) -> CoreResult<i32> {
    i32::try_from(quantity).map_err(|_| CoreError::Validation(format!("quantity {} is too large", quantity)))
}

fn from_db_quantity(value: i32) -> u32 {
    value.max(0) as u32
}

fn db_error(e: sqlx::Error) -> CoreError {
    tracing::error!(error = %e, "Database error");
    CoreError::Internal(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantity_conversion() {
        assert_eq!(to_db_quantity(42).unwrap(), 42);
        assert!(matches!(to_db_quantity(u32::MAX), Err(CoreError::Validation(_))));
        assert_eq!(from_db_quantity(-3), 0);
    }

    #[test]
    fn test_database_errors_become_internal() {
        let err = db_error(sqlx::Error::RowNotFound);
        assert_eq!(err.kind(), "internal_error");
    }

    async fn seeded(pool: &PgPool, capacity: u32) -> (PgInventoryLedger, ResourceRef) {
        let ledger = PgInventoryLedger::new(pool.clone());
        let hotel = ResourceRef::Hotel(uuid::Uuid::new_v4());
        ledger
            .register(hotel, "Makkah Clock Royal Tower", capacity, PriceSnapshot::new(Decimal::new(95000, 2), Decimal::new(25300, 2)))
            .await
            .unwrap();
        (ledger, hotel)
    }

    async fn hold_count(pool: &PgPool, resource: ResourceRef) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM reservation_holds WHERE kind = $1 AND resource_id = $2")
            .bind(resource.kind().as_str())
            .bind(resource.id())
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[sqlx::test(migrations = "../migrations")]
    #[ignore = "needs a Postgres DATABASE_URL"]
    async fn test_reserve_never_oversells(pool: PgPool) {
        let (ledger, hotel) = seeded(&pool, 5).await;

        ledger.reserve(hotel, 3).await.unwrap();
        let err = ledger.reserve(hotel, 3).await.unwrap_err();
        assert!(matches!(
            err,
            CoreError::InsufficientCapacity { requested: 3, available: 2, .. }
        ));
        ledger.reserve(hotel, 2).await.unwrap();

        let availability = ledger.availability(hotel).await.unwrap();
        assert_eq!(availability.total, 5);
        assert_eq!(availability.available, 0);
        assert_eq!(hold_count(&pool, hotel).await, 2);

        let missing = ResourceRef::Hotel(uuid::Uuid::new_v4());
        assert!(matches!(ledger.reserve(missing, 1).await, Err(CoreError::NotFound { .. })));
    }

    #[sqlx::test(migrations = "../migrations")]
    #[ignore = "needs a Postgres DATABASE_URL"]
    async fn test_concurrent_reserves_respect_capacity(pool: PgPool) {
        let (ledger, hotel) = seeded(&pool, 4).await;

        let attempts = (0..10).map(|_| {
            let ledger = ledger.clone();
            async move { ledger.reserve(hotel, 1).await }
        });
        let results = futures_util::future::join_all(attempts).await;

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 4);
        assert_eq!(ledger.availability(hotel).await.unwrap().available, 0);
        assert_eq!(hold_count(&pool, hotel).await, 4);
    }

    #[sqlx::test(migrations = "../migrations")]
    #[ignore = "needs a Postgres DATABASE_URL"]
    async fn test_release_is_single_use(pool: PgPool) {
        let (ledger, hotel) = seeded(&pool, 3).await;
        let token = ledger.reserve(hotel, 2).await.unwrap();

        ledger.release(&token).await.unwrap();
        assert_eq!(ledger.availability(hotel).await.unwrap().available, 3);

        let err = ledger.release(&token).await.unwrap_err();
        assert_eq!(err.kind(), "invariant_violation");
        assert_eq!(ledger.availability(hotel).await.unwrap().available, 3);
        assert_eq!(hold_count(&pool, hotel).await, 0);
    }

    #[sqlx::test(migrations = "../migrations")]
    #[ignore = "needs a Postgres DATABASE_URL"]
    async fn test_committed_hold_keeps_capacity_until_released(pool: PgPool) {
        let (ledger, hotel) = seeded(&pool, 2).await;
        let token = ledger.reserve(hotel, 1).await.unwrap();

        ledger.commit(&token).await.unwrap();
        let committed: bool = sqlx::query_scalar("SELECT committed FROM reservation_holds WHERE token_id = $1")
            .bind(token.id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert!(committed);
        assert_eq!(ledger.availability(hotel).await.unwrap().available, 1);

        ledger.release(&token).await.unwrap();
        assert_eq!(ledger.availability(hotel).await.unwrap().available, 2);
        assert_eq!(ledger.commit(&token).await.unwrap_err().kind(), "invariant_violation");
    }
}
