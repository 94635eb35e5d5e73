use std::sync::Arc;

use crate::domain::error::{AppError, Result};
use crate::infrastructure::csv::write_export;
use crate::infrastructure::db::PriceRepository;

pub struct ExportPricesUseCase {
    repository: Arc<dyn PriceRepository>,
}

impl ExportPricesUseCase {
    pub fn new(repository: Arc<dyn PriceRepository>) -> Self {
        Self { repository }
    }

    /// Zip archive holding every stored row as `data.csv`.
    pub async fn execute(&self) -> Result<Vec<u8>> {
        let rows = self.repository.list_prices().await?;
        let row_count = rows.len();

        let archive = tokio::task::spawn_blocking(move || write_export(&rows))
            .await
            .map_err(|e| AppError::Internal(format!("Export worker failed: {e}")))??;

        tracing::info!(rows = row_count, bytes = archive.len(), "Exported price archive");
        Ok(archive)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::archive::ArchiveFormat;
    use crate::infrastructure::db::SqlitePriceRepository;
    use std::io::{Cursor, Read};

    #[tokio::test]
    async fn test_export_of_empty_store_has_header_only() {
        let repo: Arc<dyn PriceRepository> =
            Arc::new(SqlitePriceRepository::in_memory().await.unwrap());
        let bytes = ExportPricesUseCase::new(repo).execute().await.unwrap();

        let content = ArchiveFormat::Zip
            .locate_payload(Cursor::new(bytes), |_, reader| {
                let mut content = String::new();
                reader.read_to_string(&mut content)?;
                Ok(content)
            })
            .unwrap();
        assert_eq!(content, "id,name,category,price,create_date\n");
    }
}
