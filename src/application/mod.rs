pub mod use_cases;

pub use use_cases::export_prices::ExportPricesUseCase;
pub use use_cases::ingest_prices::IngestPricesUseCase;
pub use use_cases::stats_report::StatsResponse;
