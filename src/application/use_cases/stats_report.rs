use bigdecimal::ToPrimitive;
use serde::{Deserialize, Serialize};

use crate::domain::price::StatsDelta;

/// Upload response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsResponse {
    pub total_items: i64,
    pub total_categories: i64,
    pub total_price: f64,
}

impl From<&StatsDelta> for StatsResponse {
    fn from(delta: &StatsDelta) -> Self {
        Self {
            total_items: delta.total_items,
            total_categories: delta.total_categories,
            total_price: delta.total_price.to_f64().unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;
    use std::str::FromStr;

    #[test]
    fn test_serializes_wire_names() {
        let delta = StatsDelta {
            total_items: 3,
            total_categories: 2,
            total_price: BigDecimal::from_str("36.75").unwrap(),
        };
        let json = serde_json::to_value(StatsResponse::from(&delta)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"total_items": 3, "total_categories": 2, "total_price": 36.75})
        );
    }

    #[test]
    fn test_empty_delta() {
        let response = StatsResponse::from(&StatsDelta::empty());
        assert_eq!(response.total_items, 0);
        assert_eq!(response.total_price, 0.0);
    }
}
