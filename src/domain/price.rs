use bigdecimal::{BigDecimal, Zero};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One priced item as read from an uploaded CSV payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceRecord {
    /// Caller-supplied id, only populated under [`IdPolicy::Preserve`].
    pub source_id: Option<i64>,
    pub name: String,
    pub category: String,
    pub price: BigDecimal,
    pub create_date: NaiveDate,
}

/// A persisted row as read back from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredPrice {
    pub id: i64,
    pub name: String,
    pub category: String,
    pub price: BigDecimal,
    pub create_date: NaiveDate,
}

/// Aggregates over the rows inserted by a single ingestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsDelta {
    pub total_items: i64,
    pub total_categories: i64,
    pub total_price: BigDecimal,
}

impl StatsDelta {
    pub fn empty() -> Self {
        Self {
            total_items: 0,
            total_categories: 0,
            total_price: BigDecimal::zero(),
        }
    }
}

/// How the first CSV column is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdPolicy {
    /// Ignore the caller id; the store assigns every identity.
    #[default]
    Generate,
    /// Require an integer caller id and keep it next to the store identity.
    Preserve,
}
