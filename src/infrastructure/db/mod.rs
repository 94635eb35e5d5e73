pub mod postgres;
pub mod prices;
pub mod sqlite;

use std::sync::Arc;

use crate::domain::error::Result;
use crate::infrastructure::config::{DatabaseConfig, StoreBackend};

pub use postgres::PgPriceRepository;
pub use prices::PriceRepository;
pub use sqlite::SqlitePriceRepository;

/// Open the configured backend and make sure its table exists.
pub async fn connect_repository(config: &DatabaseConfig) -> Result<Arc<dyn PriceRepository>> {
    let repository: Arc<dyn PriceRepository> = match config.backend {
        StoreBackend::Postgres => Arc::new(PgPriceRepository::connect(config).await?),
        StoreBackend::Sqlite => Arc::new(SqlitePriceRepository::connect(&config.sqlite_url).await?),
    };
    Ok(repository)
}
