// ============================================================
// CSV INFRASTRUCTURE LAYER
// ============================================================
// Price row parsing on upload, CSV-in-zip writing on export

mod csv_parser;
mod export_writer;

pub use csv_parser::{ParsedBatch, PriceCsvParser, PriceRows, DATE_FORMAT};
pub use export_writer::{format_price, write_csv, write_export, EXPORT_HEADER};
