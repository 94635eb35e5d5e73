use async_trait::async_trait;
use bigdecimal::{BigDecimal, RoundingMode, ToPrimitive};
use chrono::NaiveDate;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

use super::prices::PriceRepository;
use crate::domain::error::{AppError, Result};
use crate::domain::price::{PriceRecord, StatsDelta, StoredPrice};

/// Embedded price store.
///
/// Prices are kept as integer cents so sums stay exact. The pool holds a single
/// connection, which serializes ingestions and keeps `sqlite::memory:` databases alive
/// for the lifetime of the repository.
pub struct SqlitePriceRepository {
    pool: SqlitePool,
}

impl SqlitePriceRepository {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| {
                AppError::DatabaseError(format!("Failed to parse connection string: {}", e))
            })?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to connect: {}", e)))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS prices (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                source_id INTEGER,
                name TEXT NOT NULL,
                category TEXT NOT NULL,
                price_cents INTEGER NOT NULL CHECK (price_cents >= 0),
                create_date TEXT NOT NULL
            )",
        )
        .execute(&pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to create table: {}", e)))?;

        tracing::info!(url = %database_url, "Opened SQLite price store");
        Ok(Self { pool })
    }

    pub async fn in_memory() -> Result<Self> {
        Self::connect("sqlite::memory:").await
    }
}

fn to_cents(price: &BigDecimal) -> Result<i64> {
    let (digits, _) = price
        .with_scale_round(2, RoundingMode::HalfUp)
        .as_bigint_and_exponent();
    digits
        .to_i64()
        .ok_or_else(|| AppError::DatabaseError(format!("Price out of range: {}", price)))
}

fn from_cents(cents: i64) -> BigDecimal {
    BigDecimal::new(cents.into(), 2)
}

#[async_trait]
impl PriceRepository for SqlitePriceRepository {
    async fn insert_batch(&self, records: &[PriceRecord]) -> Result<StatsDelta> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to start ingest tx: {e}")))?;

        let watermark = sqlx::query_scalar::<_, i64>("SELECT COALESCE(MAX(id), 0) FROM prices")
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to read watermark: {e}")))?;

        for record in records {
            sqlx::query(
                "INSERT INTO prices (source_id, name, category, price_cents, create_date)
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(record.source_id)
            .bind(&record.name)
            .bind(&record.category)
            .bind(to_cents(&record.price)?)
            .bind(record.create_date)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to insert price: {e}")))?;
        }

        let (total_items, total_categories, total_cents) =
            sqlx::query_as::<_, (i64, i64, i64)>(
                "SELECT COUNT(*), COUNT(DISTINCT category), COALESCE(SUM(price_cents), 0)
                 FROM prices WHERE id > ?",
            )
            .bind(watermark)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to aggregate delta: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to commit ingest tx: {e}")))?;

        Ok(StatsDelta {
            total_items,
            total_categories,
            total_price: from_cents(total_cents),
        })
    }

    async fn list_prices(&self) -> Result<Vec<StoredPrice>> {
        sqlx::query_as::<_, PriceEntity>(
            "SELECT COALESCE(source_id, id) AS id, name, category, price_cents, create_date
             FROM prices ORDER BY prices.id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to list prices: {e}")))
        .map(|entities| entities.into_iter().map(|e| e.into()).collect())
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Health check failed: {e}")))?;
        Ok(())
    }
}

// Internal entity for database mapping
#[derive(sqlx::FromRow)]
struct PriceEntity {
    id: i64,
    name: String,
    category: String,
    price_cents: i64,
    create_date: NaiveDate,
}

impl From<PriceEntity> for StoredPrice {
    fn from(e: PriceEntity) -> Self {
        Self {
            id: e.id,
            name: e.name,
            category: e.category,
            price: from_cents(e.price_cents),
            create_date: e.create_date,
        }
    }
}
