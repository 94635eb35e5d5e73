pub mod export_prices;
pub mod ingest_prices;
pub mod stats_report;
