use std::io::Cursor;
use std::sync::Arc;

use tracing::{debug, error, info};

use crate::domain::archive::ArchiveFormat;
use crate::domain::error::{AppError, Result};
use crate::domain::price::{IdPolicy, StatsDelta};
use crate::infrastructure::csv::{ParsedBatch, PriceCsvParser};
use crate::infrastructure::db::PriceRepository;

pub struct IngestPricesUseCase {
    repository: Arc<dyn PriceRepository>,
    parser: PriceCsvParser,
}

impl IngestPricesUseCase {
    pub fn new(repository: Arc<dyn PriceRepository>, id_policy: IdPolicy) -> Self {
        Self {
            repository,
            parser: PriceCsvParser::new(id_policy),
        }
    }

    /// Locate, parse and persist one uploaded archive.
    ///
    /// Archive and CSV failures return before the store is touched.
    pub async fn execute(&self, archive: Vec<u8>, format: ArchiveFormat) -> Result<StatsDelta> {
        let parser = self.parser.clone();
        let batch = tokio::task::spawn_blocking(move || extract_records(&parser, archive, format))
            .await
            .map_err(|e| AppError::Internal(format!("Archive worker failed: {e}")))??;

        info!(
            format = %format,
            accepted = batch.records.len(),
            skipped = batch.skipped,
            "Parsed price payload"
        );

        let delta = self
            .repository
            .insert_batch(&batch.records)
            .await
            .map_err(|e| {
                error!(error = %e, "Price ingestion rolled back");
                e
            })?;

        info!(
            total_items = delta.total_items,
            total_categories = delta.total_categories,
            total_price = %delta.total_price,
            "Ingested price batch"
        );

        Ok(delta)
    }
}

/// Archive bytes -> validated records. CPU-bound; callers run it off the async workers.
pub fn extract_records(
    parser: &PriceCsvParser,
    archive: Vec<u8>,
    format: ArchiveFormat,
) -> Result<ParsedBatch> {
    format.locate_payload(Cursor::new(archive), |name, reader| {
        debug!(payload = %name, "Parsing CSV payload");
        parser.parse_all(reader)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::use_cases::export_prices::ExportPricesUseCase;
    use crate::infrastructure::db::SqlitePriceRepository;
    use crate::test_support::{tar_bytes, zip_bytes, SAMPLE_CSV};
    use bigdecimal::BigDecimal;
    use std::str::FromStr;

    async fn repository() -> Arc<dyn PriceRepository> {
        Arc::new(SqlitePriceRepository::in_memory().await.unwrap())
    }

    #[tokio::test]
    async fn test_ingest_zip_reports_delta() {
        let repo = repository().await;
        let use_case = IngestPricesUseCase::new(repo, IdPolicy::Generate);

        let delta = use_case
            .execute(zip_bytes(&[("data.csv", SAMPLE_CSV.as_bytes())]), ArchiveFormat::Zip)
            .await
            .unwrap();

        assert_eq!(delta.total_items, 3);
        assert_eq!(delta.total_categories, 2);
        assert_eq!(delta.total_price, BigDecimal::from_str("36.75").unwrap());
    }

    #[tokio::test]
    async fn test_only_accepted_rows_are_counted() {
        let repo = repository().await;
        let use_case = IngestPricesUseCase::new(repo, IdPolicy::Generate);
        let csv = "id,name,category,price,create_date\n\
                   1, Widget , Tools,19.999,2024-01-15\n\
                   2,Broken,Tools,notanumber,2024-01-15\n\
                   3,Short,Tools\n\
                   4,Pear,Food,0.50,2024-01-20\n";

        let delta = use_case
            .execute(tar_bytes(&[("prices.csv", csv.as_bytes())]), ArchiveFormat::Tar)
            .await
            .unwrap();

        assert_eq!(delta.total_items, 2);
        assert_eq!(delta.total_categories, 2);
        assert_eq!(delta.total_price, BigDecimal::from_str("20.50").unwrap());
    }

    #[tokio::test]
    async fn test_zero_valid_rows_is_zero_delta() {
        let repo = repository().await;
        let use_case = IngestPricesUseCase::new(Arc::clone(&repo), IdPolicy::Generate);
        use_case
            .execute(zip_bytes(&[("data.csv", SAMPLE_CSV.as_bytes())]), ArchiveFormat::Zip)
            .await
            .unwrap();

        let csv = "id,name,category,price,create_date\n1,Bad,Tools,x,2024-01-01\n";
        let delta = use_case
            .execute(zip_bytes(&[("data.csv", csv.as_bytes())]), ArchiveFormat::Zip)
            .await
            .unwrap();

        assert_eq!(delta, StatsDelta::empty());
        assert_eq!(repo.list_prices().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_missing_payload_inserts_nothing() {
        let repo = repository().await;
        let use_case = IngestPricesUseCase::new(Arc::clone(&repo), IdPolicy::Generate);

        let err = use_case
            .execute(zip_bytes(&[("prices.txt", SAMPLE_CSV.as_bytes())]), ArchiveFormat::Zip)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::PayloadNotFound(_)));
        assert!(repo.list_prices().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_csv_inserts_nothing() {
        let repo = repository().await;
        let use_case = IngestPricesUseCase::new(Arc::clone(&repo), IdPolicy::Generate);
        let mut csv = SAMPLE_CSV.as_bytes().to_vec();
        csv.extend_from_slice(b"4,Bro\xffken,Tools,1.00,2024-01-01\n");

        let err = use_case
            .execute(zip_bytes(&[("data.csv", csv.as_slice())]), ArchiveFormat::Zip)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::MalformedCsv(_)));
        assert!(repo.list_prices().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_export_round_trip() {
        let repo = repository().await;
        let ingest = IngestPricesUseCase::new(Arc::clone(&repo), IdPolicy::Generate);
        let export = ExportPricesUseCase::new(Arc::clone(&repo));
        let parser = PriceCsvParser::default();

        let uploaded = zip_bytes(&[("data.csv", SAMPLE_CSV.as_bytes())]);
        let original = extract_records(&parser, uploaded.clone(), ArchiveFormat::Zip).unwrap();
        ingest.execute(uploaded, ArchiveFormat::Zip).await.unwrap();

        let exported = export.execute().await.unwrap();
        let reparsed = extract_records(&parser, exported, ArchiveFormat::Zip).unwrap();

        assert_eq!(reparsed.records, original.records);
        assert_eq!(reparsed.skipped, 0);
    }

    #[tokio::test]
    async fn test_preserve_policy_round_trips_ids() {
        let repo = repository().await;
        let ingest = IngestPricesUseCase::new(Arc::clone(&repo), IdPolicy::Preserve);
        let csv = "id,name,category,price,create_date\n\
                   70,Widget,Tools,1.00,2024-01-15\n\
                   12,Gadget,Tools,2.00,2024-01-16\n";
        ingest
            .execute(zip_bytes(&[("data.csv", csv.as_bytes())]), ArchiveFormat::Zip)
            .await
            .unwrap();

        let stored = repo.list_prices().await.unwrap();
        let ids: Vec<_> = stored.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![70, 12]);
    }
}
