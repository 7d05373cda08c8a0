//! Market data access for the screener.
//!
//! Defines the `UniverseProvider` trait the screening engine pulls
//! candidates from, the `StockRecord` snapshot type, and two
//! implementations:
//!
//! - **twse**: REST adapter for the exchange open-data API (production)
//! - **memory**: in-memory provider for tests and offline development

mod memory;
mod twse;

pub use memory::StaticProvider;
pub use twse::TwseProvider;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::criteria::CriterionField;

// ============================================================================
// Stock Record
// ============================================================================

/// Snapshot of one tradable symbol's attributes at evaluation time.
///
/// Partially populated records are valid; unavailable attributes stay
/// `None` and any criterion referencing them evaluates to a non-match.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StockRecord {
    /// Exchange symbol (e.g. "2330")
    pub code: String,
    /// Display name
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pe_ratio: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dividend_yield: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_cap: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change_percent: Option<f64>,
    /// 20-day moving average of the closing price
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ma20: Option<f64>,
    /// 60-day moving average of the closing price
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ma60: Option<f64>,
}

impl StockRecord {
    /// Create an empty record for a symbol.
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    /// Look up the attribute a criterion field refers to.
    ///
    /// Moving-average relations are derived: price divided by the
    /// average, available only when both sides are known and the
    /// average is non-zero.
    pub fn attribute(&self, field: CriterionField) -> Option<f64> {
        match field {
            CriterionField::Price => self.price,
            CriterionField::Volume => self.volume,
            CriterionField::PeRatio => self.pe_ratio,
            CriterionField::DividendYield => self.dividend_yield,
            CriterionField::MarketCap => self.market_cap,
            CriterionField::ChangePercent => self.change_percent,
            CriterionField::PriceToMa20 => self.ratio_to(self.ma20),
            CriterionField::PriceToMa60 => self.ratio_to(self.ma60),
        }
    }

    fn ratio_to(&self, average: Option<f64>) -> Option<f64> {
        match (self.price, average) {
            (Some(price), Some(avg)) if avg > 0.0 => Some(price / avg),
            _ => None,
        }
    }
}

// ============================================================================
// Provider Error
// ============================================================================

/// Errors specific to universe providers.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// Network error (connection failed, timeout)
    #[error("Network error: {0}")]
    Network(String),

    /// Symbol is not listed or has no data
    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    /// Upstream returned a payload we could not parse
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Provider is temporarily unavailable
    #[error("Provider unavailable: {0}")]
    Unavailable(String),
}

impl ProviderError {
    /// Check if the error is recoverable (worth retrying later).
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Unavailable(_))
    }
}

// ============================================================================
// Universe Provider Trait
// ============================================================================

/// Trait for stock-universe data sources.
///
/// The screening engine only ever consumes this interface; the concrete
/// adapter decides where the fundamentals actually come from. Must be
/// safely callable from concurrent screening workers.
#[async_trait]
pub trait UniverseProvider: Send + Sync {
    /// Provider name for logging (e.g. "twse").
    fn name(&self) -> &'static str;

    /// List the tradable symbol universe, in the provider's order.
    async fn list_symbols(&self) -> Result<Vec<String>, ProviderError>;

    /// Fetch the current snapshot for one symbol.
    ///
    /// Returns `SymbolNotFound` for unlisted symbols; the engine treats
    /// any error here as skip-and-continue.
    async fn get_record(&self, symbol: &str) -> Result<StockRecord, ProviderError>;

    /// Lightweight availability check.
    async fn health_check(&self) -> Result<(), ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_lookup() {
        let record = StockRecord {
            price: Some(100.0),
            dividend_yield: Some(4.2),
            ma20: Some(80.0),
            ..StockRecord::new("2330", "TSMC")
        };

        assert_eq!(record.attribute(CriterionField::Price), Some(100.0));
        assert_eq!(record.attribute(CriterionField::DividendYield), Some(4.2));
        assert_eq!(record.attribute(CriterionField::PriceToMa20), Some(1.25));
        // Missing underlying data stays missing
        assert_eq!(record.attribute(CriterionField::Volume), None);
        assert_eq!(record.attribute(CriterionField::PriceToMa60), None);
    }

    #[test]
    fn test_ma_ratio_requires_positive_average() {
        let record = StockRecord {
            price: Some(50.0),
            ma20: Some(0.0),
            ..StockRecord::new("0050", "ETF")
        };
        assert_eq!(record.attribute(CriterionField::PriceToMa20), None);
    }

    #[test]
    fn test_provider_error_recoverable() {
        assert!(ProviderError::Network("timeout".into()).is_recoverable());
        assert!(ProviderError::Unavailable("maintenance".into()).is_recoverable());
        assert!(!ProviderError::SymbolNotFound("9999".into()).is_recoverable());
        assert!(!ProviderError::InvalidResponse("bad json".into()).is_recoverable());
    }

    #[test]
    fn test_record_serialization_skips_missing_fields() {
        let record = StockRecord {
            price: Some(12.5),
            ..StockRecord::new("0056", "Yuanta High Dividend")
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["code"], "0056");
        assert_eq!(json["price"], 12.5);
        assert!(json.get("pe_ratio").is_none());
    }
}
