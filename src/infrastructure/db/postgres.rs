//! PostgreSQL price store.
//!
//! Ingestions take a transaction-scoped advisory lock before reading the watermark, so
//! two uploads never interleave their insert phases under the default READ COMMITTED
//! isolation. The lock is released by commit or rollback.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgSslMode};
use std::time::Duration;
use tracing::{error, info};

use super::prices::PriceRepository;
use crate::domain::error::{AppError, Result};
use crate::domain::price::{PriceRecord, StatsDelta, StoredPrice};
use crate::infrastructure::config::DatabaseConfig;

/// Key for `pg_advisory_xact_lock`, shared by every ingesting process.
const INGEST_LOCK_KEY: i64 = 0x7072_6963_6573;

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS prices (
    id BIGINT GENERATED BY DEFAULT AS IDENTITY PRIMARY KEY,
    source_id BIGINT,
    name VARCHAR(255) NOT NULL,
    category VARCHAR(255) NOT NULL,
    price NUMERIC(10, 2) NOT NULL CHECK (price >= 0),
    create_date DATE NOT NULL
)";

pub struct PgPriceRepository {
    pool: PgPool,
}

impl PgPriceRepository {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(&config.password)
            .database(&config.name)
            .ssl_mode(parse_ssl_mode(&config.ssl_mode));

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .connect_with(options)
            .await
            .map_err(|e| {
                error!("Failed to connect to PostgreSQL: {}", e);
                AppError::DatabaseError(format!("Failed to connect to PostgreSQL: {}", e))
            })?;

        info!(
            host = %config.host,
            port = config.port,
            database = %config.name,
            "Created PostgreSQL connection pool"
        );

        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: PgPool) -> Result<Self> {
        sqlx::query(CREATE_TABLE)
            .execute(&pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to create table: {}", e)))?;

        Ok(Self { pool })
    }
}

/// Parse SSL mode string to PgSslMode
fn parse_ssl_mode(ssl_mode: &str) -> PgSslMode {
    match ssl_mode.to_lowercase().as_str() {
        "disable" => PgSslMode::Disable,
        "allow" => PgSslMode::Allow,
        "prefer" => PgSslMode::Prefer,
        "require" => PgSslMode::Require,
        "verify-ca" => PgSslMode::VerifyCa,
        "verify-full" => PgSslMode::VerifyFull,
        _ => PgSslMode::Prefer,
    }
}

#[async_trait]
impl PriceRepository for PgPriceRepository {
    async fn insert_batch(&self, records: &[PriceRecord]) -> Result<StatsDelta> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to start ingest tx: {e}")))?;

        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(INGEST_LOCK_KEY)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to take ingest lock: {e}")))?;

        let watermark = sqlx::query_scalar::<_, i64>("SELECT COALESCE(MAX(id), 0) FROM prices")
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to read watermark: {e}")))?;

        for record in records {
            sqlx::query(
                "INSERT INTO prices (source_id, name, category, price, create_date)
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(record.source_id)
            .bind(&record.name)
            .bind(&record.category)
            .bind(&record.price)
            .bind(record.create_date)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to insert price: {e}")))?;
        }

        let (total_items, total_categories, total_price) =
            sqlx::query_as::<_, (i64, i64, BigDecimal)>(
                "SELECT COUNT(*), COUNT(DISTINCT category), COALESCE(SUM(price), 0)
                 FROM prices WHERE id > $1",
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
            total_price,
        })
    }

    async fn list_prices(&self) -> Result<Vec<StoredPrice>> {
        sqlx::query_as::<_, PriceEntity>(
            "SELECT COALESCE(source_id, id) AS id, name, category, price, create_date
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

#[derive(sqlx::FromRow)]
struct PriceEntity {
    id: i64,
    name: String,
    category: String,
    price: BigDecimal,
    create_date: NaiveDate,
}

impl From<PriceEntity> for StoredPrice {
    fn from(e: PriceEntity) -> Self {
        Self {
            id: e.id,
            name: e.name,
            category: e.category,
            price: e.price,
            create_date: e.create_date,
        }
    }
}
