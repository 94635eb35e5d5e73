// ============================================================
// PRICE CSV PARSER
// ============================================================
// Turn CSV payload rows into validated price records

use std::fmt;
use std::io::{self, Read};
use std::str::FromStr;

use bigdecimal::{BigDecimal, RoundingMode, Zero};
use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord, StringRecordsIntoIter, Trim};

use crate::domain::error::{AppError, Result};
use crate::domain::price::{IdPolicy, PriceRecord};

/// Date format used on both the upload and export paths.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// id, name, category, price, create_date
const MIN_FIELDS: usize = 5;

/// Prices are stored as NUMERIC(10, 2): eight integer digits, two decimals.
const PRICE_SCALE: i64 = 2;
const PRICE_INTEGER_DIGITS: i64 = 8;

/// Parser for the `id,name,category,price,create_date` layout.
#[derive(Debug, Clone)]
pub struct PriceCsvParser {
    /// Delimiter character (default: comma)
    delimiter: u8,

    /// How the id column is treated
    id_policy: IdPolicy,
}

impl Default for PriceCsvParser {
    fn default() -> Self {
        Self {
            delimiter: b',',
            id_policy: IdPolicy::default(),
        }
    }
}

impl PriceCsvParser {
    pub fn new(id_policy: IdPolicy) -> Self {
        Self {
            id_policy,
            ..Self::default()
        }
    }

    /// Set custom delimiter
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Lazily parse rows from `reader`. The first row is a header and is skipped.
    pub fn rows<R: Read>(&self, reader: R) -> PriceRows<R> {
        let records = ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(true)
            .flexible(true)
            .trim(Trim::None)
            .from_reader(QuoteGuard::new(reader, self.delimiter))
            .into_records();

        PriceRows {
            records,
            id_policy: self.id_policy,
            skipped: 0,
            failed: false,
        }
    }

    /// Parse every row, stopping at the first structural CSV error.
    pub fn parse_all<R: Read>(&self, reader: R) -> Result<ParsedBatch> {
        let mut rows = self.rows(reader);
        let records = rows.by_ref().collect::<Result<Vec<_>>>()?;
        Ok(ParsedBatch {
            records,
            skipped: rows.skipped(),
        })
    }
}

/// Records accepted from one payload plus the number of rows dropped on the way.
#[derive(Debug, Clone, Default)]
pub struct ParsedBatch {
    pub records: Vec<PriceRecord>,
    pub skipped: usize,
}

/// Single-pass iterator over validated rows.
///
/// Semantically invalid rows are dropped and counted. A CSV syntax error yields one
/// `Err(MalformedCsv)` and ends the iteration.
pub struct PriceRows<R> {
    records: StringRecordsIntoIter<QuoteGuard<R>>,
    id_policy: IdPolicy,
    skipped: usize,
    failed: bool,
}

impl<R> PriceRows<R> {
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

impl<R: Read> Iterator for PriceRows<R> {
    type Item = Result<PriceRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        loop {
            let record = match self.records.next()? {
                Ok(record) => record,
                Err(err) => {
                    self.failed = true;
                    return Some(Err(AppError::MalformedCsv(err.to_string())));
                }
            };

            match parse_record(&record, self.id_policy) {
                Ok(price) => return Some(Ok(price)),
                Err(defect) => {
                    self.skipped += 1;
                    tracing::debug!(
                        line = record.position().map(|p| p.line()),
                        reason = %defect,
                        "Skipping CSV row"
                    );
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QuoteState {
    FieldStart,
    Unquoted,
    Quoted,
    QuoteInQuoted,
}

/// Reader adapter that fails on CSV quoting errors.
///
/// The `csv` reader accepts a bare `"` inside an unquoted field and lets an unterminated
/// quoted field swallow the rest of the payload. Both surface here as `InvalidData`, which
/// the reader reports as a CSV error.
struct QuoteGuard<R> {
    inner: R,
    delimiter: u8,
    state: QuoteState,
    line: u64,
}

impl<R> QuoteGuard<R> {
    fn new(inner: R, delimiter: u8) -> Self {
        Self {
            inner,
            delimiter,
            state: QuoteState::FieldStart,
            line: 1,
        }
    }

    fn advance(&mut self, byte: u8) -> io::Result<()> {
        let ends_field = byte == self.delimiter || byte == b'\n' || byte == b'\r';
        self.state = match (self.state, byte) {
            (QuoteState::Quoted, b'"') => QuoteState::QuoteInQuoted,
            (QuoteState::Quoted, _) => QuoteState::Quoted,
            (QuoteState::FieldStart, b'"') | (QuoteState::QuoteInQuoted, b'"') => {
                QuoteState::Quoted
            }
            (QuoteState::Unquoted, b'"') => {
                return Err(quote_error(format!("bare quote in field on line {}", self.line)));
            }
            (QuoteState::QuoteInQuoted, _) if !ends_field => {
                return Err(quote_error(format!(
                    "unexpected character after closing quote on line {}",
                    self.line
                )));
            }
            (_, _) if ends_field => QuoteState::FieldStart,
            (_, _) => QuoteState::Unquoted,
        };
        if byte == b'\n' {
            self.line += 1;
        }
        Ok(())
    }
}

impl<R: Read> Read for QuoteGuard<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n == 0 && self.state == QuoteState::Quoted {
            return Err(quote_error(format!(
                "unterminated quoted field at end of input (line {})",
                self.line
            )));
        }
        for &byte in &buf[..n] {
            self.advance(byte)?;
        }
        Ok(n)
    }
}

fn quote_error(message: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message)
}

/// Why a row was dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
enum RowDefect {
    TooFewFields(usize),
    InvalidId,
    InvalidPrice,
    NegativePrice,
    PriceOutOfRange,
    InvalidDate,
}

impl fmt::Display for RowDefect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowDefect::TooFewFields(n) => write!(f, "expected {} fields, got {}", MIN_FIELDS, n),
            RowDefect::InvalidId => write!(f, "id is not an integer"),
            RowDefect::InvalidPrice => write!(f, "price is not a number"),
            RowDefect::NegativePrice => write!(f, "price is negative"),
            RowDefect::PriceOutOfRange => {
                write!(f, "price needs more than {} integer digits", PRICE_INTEGER_DIGITS)
            }
            RowDefect::InvalidDate => write!(f, "create_date is not YYYY-MM-DD"),
        }
    }
}

fn parse_record(
    record: &StringRecord,
    id_policy: IdPolicy,
) -> std::result::Result<PriceRecord, RowDefect> {
    if record.len() < MIN_FIELDS {
        return Err(RowDefect::TooFewFields(record.len()));
    }
    let field = |idx: usize| record.get(idx).unwrap_or("").trim();

    let source_id = match id_policy {
        IdPolicy::Generate => None,
        IdPolicy::Preserve => Some(field(0).parse::<i64>().map_err(|_| RowDefect::InvalidId)?),
    };

    let price = BigDecimal::from_str(field(3)).map_err(|_| RowDefect::InvalidPrice)?;
    let price = normalize_price(price)?;

    let create_date =
        NaiveDate::parse_from_str(field(4), DATE_FORMAT).map_err(|_| RowDefect::InvalidDate)?;

    Ok(PriceRecord {
        source_id,
        name: field(1).to_string(),
        category: field(2).to_string(),
        price,
        create_date,
    })
}

/// Round to the stored scale, rejecting values the store cannot hold.
///
/// Magnitude is checked on the digit count before any rescaling, so exponents such as
/// `1e200000000` are rejected without materializing the number.
fn normalize_price(price: BigDecimal) -> std::result::Result<BigDecimal, RowDefect> {
    if price.is_zero() {
        return Ok(BigDecimal::zero().with_scale(PRICE_SCALE));
    }
    if price < BigDecimal::zero() {
        return Err(RowDefect::NegativePrice);
    }

    let (_, scale) = price.as_bigint_and_exponent();
    let integer_digits = (price.digits() as i64).saturating_sub(scale);
    if integer_digits > PRICE_INTEGER_DIGITS {
        return Err(RowDefect::PriceOutOfRange);
    }
    // Below 0.001 the value rounds to zero.
    if integer_digits < -PRICE_SCALE {
        return Ok(BigDecimal::zero().with_scale(PRICE_SCALE));
    }

    let rounded = price.with_scale_round(PRICE_SCALE, RoundingMode::HalfUp);
    if rounded >= BigDecimal::from(10_i64.pow(PRICE_INTEGER_DIGITS as u32)) {
        return Err(RowDefect::PriceOutOfRange);
    }
    Ok(rounded)
}
