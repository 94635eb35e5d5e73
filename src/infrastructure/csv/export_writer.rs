// ============================================================
// EXPORT WRITER
// ============================================================
// Stored prices -> data.csv inside a zip archive

use std::io::{Cursor, Write};

use bigdecimal::{BigDecimal, RoundingMode};
use csv::WriterBuilder;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use super::csv_parser::DATE_FORMAT;
use crate::domain::archive::PREFERRED_PAYLOAD_NAME;
use crate::domain::error::{AppError, Result};
use crate::domain::price::StoredPrice;

pub const EXPORT_HEADER: [&str; 5] = ["id", "name", "category", "price", "create_date"];

/// Price with exactly two decimal digits.
pub fn format_price(price: &BigDecimal) -> String {
    price.with_scale_round(2, RoundingMode::HalfUp).to_string()
}

/// Write `rows` as CSV into any writer, header first.
pub fn write_csv<W: Write>(writer: W, rows: &[StoredPrice]) -> Result<()> {
    let mut csv_writer = WriterBuilder::new().from_writer(writer);
    csv_writer.write_record(EXPORT_HEADER).map_err(csv_error)?;

    for row in rows {
        csv_writer
            .write_record([
                row.id.to_string(),
                row.name.clone(),
                row.category.clone(),
                format_price(&row.price),
                row.create_date.format(DATE_FORMAT).to_string(),
            ])
            .map_err(csv_error)?;
    }

    csv_writer.flush()?;
    Ok(())
}

/// Build the download archive: a single `data.csv` entry.
pub fn write_export(rows: &[StoredPrice]) -> Result<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    zip.start_file(PREFERRED_PAYLOAD_NAME, SimpleFileOptions::default())
        .map_err(zip_error)?;
    write_csv(&mut zip, rows)?;

    let cursor = zip.finish().map_err(zip_error)?;
    Ok(cursor.into_inner())
}

fn csv_error(err: csv::Error) -> AppError {
    AppError::Internal(format!("Failed to write export CSV: {}", err))
}

fn zip_error(err: zip::result::ZipError) -> AppError {
    AppError::Internal(format!("Failed to write export archive: {}", err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::archive::ArchiveFormat;
    use chrono::NaiveDate;
    use std::str::FromStr;

    fn stored(id: i64, name: &str, price: &str) -> StoredPrice {
        StoredPrice {
            id,
            name: name.to_string(),
            category: "Tools".to_string(),
            price: BigDecimal::from_str(price).unwrap(),
            create_date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
        }
    }

    #[test]
    fn test_format_price_two_decimals() {
        assert_eq!(format_price(&BigDecimal::from_str("20").unwrap()), "20.00");
        assert_eq!(format_price(&BigDecimal::from_str("1.5").unwrap()), "1.50");
        assert_eq!(format_price(&BigDecimal::from_str("19.999").unwrap()), "20.00");
    }

    #[test]
    fn test_csv_layout() {
        let mut out = Vec::new();
        write_csv(&mut out, &[stored(1, "Widget", "10.5"), stored(2, "Nut, small", "0.1")])
            .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "id,name,category,price,create_date\n\
             1,Widget,Tools,10.50,2024-01-15\n\
             2,\"Nut, small\",Tools,0.10,2024-01-15\n"
        );
    }

    #[test]
    fn test_export_archive_contains_data_csv() {
        let bytes = write_export(&[stored(1, "Widget", "3")]).unwrap();
        let (name, content) = ArchiveFormat::Zip
            .locate_payload(Cursor::new(bytes), |name, reader| {
                let mut content = String::new();
                reader.read_to_string(&mut content)?;
                Ok((name.to_string(), content))
            })
            .unwrap();
        assert_eq!(name, "data.csv");
        assert!(content.ends_with("1,Widget,Tools,3.00,2024-01-15\n"));
    }

    #[test]
    fn test_empty_export_has_header_only() {
        let mut out = Vec::new();
        write_csv(&mut out, &[]).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "id,name,category,price,create_date\n");
    }
}
