use async_trait::async_trait;

use crate::domain::error::Result;
use crate::domain::price::{PriceRecord, StatsDelta, StoredPrice};

/// Store capability shared by every backend.
#[async_trait]
pub trait PriceRepository: Send + Sync {
    /// Insert `records` in one transaction and aggregate over exactly those rows.
    ///
    /// The maximum identity is read first (the watermark); everything above it after
    /// the inserts belongs to this call. Ingestions must be serialized by the
    /// backend for the watermark to be exact. Any failure rolls the whole batch back.
    async fn insert_batch(&self, records: &[PriceRecord]) -> Result<StatsDelta>;

    /// Every stored row, ordered by identity.
    async fn list_prices(&self) -> Result<Vec<StoredPrice>>;

    async fn ping(&self) -> Result<()>;
}
