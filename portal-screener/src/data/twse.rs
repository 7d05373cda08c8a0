//! TWSE open-data adapter.
//!
//! Fetches the daily fundamentals and quote tables published by the
//! exchange's open API and assembles them into [`StockRecord`]
//! snapshots.
//!
//! # Endpoints
//! - `BWIBBU_ALL`: P/E ratio and dividend yield for every listing;
//!   also defines the universe and its order
//! - `STOCK_DAY_ALL`: closing price, volume and daily change
//! - `STOCK_DAY_AVG_ALL`: monthly (about 20 trading days) average price
//!
//! All three are whole-universe tables, so one screening run costs three
//! upstream requests. Values arrive as display strings ("1,234.56",
//! "-", ""); anything unparseable leaves the attribute unset.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

use super::{ProviderError, StockRecord, UniverseProvider};
use crate::criteria::parse_decimal;

// ============================================================================
// Constants
// ============================================================================

/// P/E and dividend-yield table (defines the universe)
const FUNDAMENTALS_ENDPOINT: &str = "/exchangeReport/BWIBBU_ALL";

/// Daily closing price / volume / change table
const DAILY_QUOTES_ENDPOINT: &str = "/exchangeReport/STOCK_DAY_ALL";

/// Monthly average closing price table
const MONTHLY_AVG_ENDPOINT: &str = "/exchangeReport/STOCK_DAY_AVG_ALL";

// ============================================================================
// Wire Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct FundamentalsRow {
    #[serde(rename = "Code")]
    code: String,
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "PEratio")]
    pe_ratio: String,
    #[serde(rename = "DividendYield")]
    dividend_yield: String,
}

#[derive(Debug, Deserialize)]
struct DailyQuoteRow {
    #[serde(rename = "Code")]
    code: String,
    #[serde(rename = "TradeVolume")]
    trade_volume: String,
    #[serde(rename = "ClosingPrice")]
    closing_price: String,
    #[serde(rename = "Change")]
    change: String,
}

#[derive(Debug, Deserialize)]
struct MonthlyAvgRow {
    #[serde(rename = "Code")]
    code: String,
    #[serde(rename = "MonthlyAveragePrice")]
    monthly_average_price: String,
}

/// Percent change derived from close and absolute change.
fn percent_change(close: Option<f64>, change: Option<f64>) -> Option<f64> {
    let close = close?;
    let change = change?;
    let previous = close - change;
    if previous > 0.0 {
        Some(change / previous * 100.0)
    } else {
        None
    }
}

// ============================================================================
// Provider
// ============================================================================

/// Snapshot of the merged universe tables for one refresh.
#[derive(Debug, Default)]
struct UniverseSnapshot {
    /// Symbols in exchange table order
    order: Vec<String>,
    records: HashMap<String, StockRecord>,
}

/// Universe provider backed by the exchange open-data API.
pub struct TwseProvider {
    client: reqwest::Client,
    base_url: String,
    snapshot: RwLock<UniverseSnapshot>,
}

impl TwseProvider {
    /// Create a provider for the given API base URL.
    ///
    /// Fails if the HTTP client cannot be built; the per-request
    /// timeout must not be dropped silently.
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .context("building TWSE HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            snapshot: RwLock::new(UniverseSnapshot::default()),
        })
    }

    async fn fetch_table<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
    ) -> Result<Vec<T>, ProviderError> {
        let url = format!("{}{}", self.base_url, endpoint);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(ProviderError::Unavailable(format!(
                "{} returned {}",
                endpoint, status
            )));
        }
        if !status.is_success() {
            return Err(ProviderError::InvalidResponse(format!(
                "{} returned {}",
                endpoint, status
            )));
        }

        response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))
    }

    /// Re-fetch all three tables and rebuild the merged snapshot.
    ///
    /// The fundamentals table defines the universe and its order; the
    /// quote and average tables only enrich rows already present.
    async fn refresh(&self) -> Result<(), ProviderError> {
        let fundamentals: Vec<FundamentalsRow> =
            self.fetch_table(FUNDAMENTALS_ENDPOINT).await?;
        let quotes: Vec<DailyQuoteRow> = self.fetch_table(DAILY_QUOTES_ENDPOINT).await?;
        let averages: Vec<MonthlyAvgRow> = self.fetch_table(MONTHLY_AVG_ENDPOINT).await?;

        let quotes: HashMap<&str, &DailyQuoteRow> =
            quotes.iter().map(|row| (row.code.as_str(), row)).collect();
        let averages: HashMap<&str, &MonthlyAvgRow> =
            averages.iter().map(|row| (row.code.as_str(), row)).collect();

        let mut next = UniverseSnapshot::default();
        for row in &fundamentals {
            let mut record = StockRecord::new(&row.code, &row.name);
            record.pe_ratio = parse_decimal(&row.pe_ratio);
            record.dividend_yield = parse_decimal(&row.dividend_yield);

            if let Some(quote) = quotes.get(row.code.as_str()) {
                record.price = parse_decimal(&quote.closing_price);
                record.volume = parse_decimal(&quote.trade_volume);
                let change = parse_decimal(&quote.change);
                record.change_percent = percent_change(record.price, change);
            }

            if let Some(avg) = averages.get(row.code.as_str()) {
                record.ma20 = parse_decimal(&avg.monthly_average_price);
            }

            next.order.push(row.code.clone());
            next.records.insert(row.code.clone(), record);
        }

        debug!(
            universe = next.order.len(),
            "Refreshed TWSE universe snapshot"
        );

        *self.snapshot.write().await = next;
        Ok(())
    }
}

#[async_trait]
impl UniverseProvider for TwseProvider {
    fn name(&self) -> &'static str {
        "twse"
    }

    async fn list_symbols(&self) -> Result<Vec<String>, ProviderError> {
        // Each screening run starts from a fresh snapshot
        self.refresh().await?;
        Ok(self.snapshot.read().await.order.clone())
    }

    async fn get_record(&self, symbol: &str) -> Result<StockRecord, ProviderError> {
        let snapshot = self.snapshot.read().await;
        snapshot
            .records
            .get(symbol)
            .cloned()
            .ok_or_else(|| ProviderError::SymbolNotFound(symbol.to_string()))
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        let url = format!("{}{}", self.base_url, FUNDAMENTALS_ENDPOINT);
        let response = self
            .client
            .head(&url)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(ProviderError::Unavailable(format!(
                "health check returned {}",
                response.status()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_construction_keeps_timeout() {
        let provider =
            TwseProvider::new("https://openapi.twse.com.tw/v1", Duration::from_secs(10));
        assert!(provider.is_ok());
        assert_eq!(provider.unwrap().name(), "twse");
    }

    #[test]
    fn test_fundamentals_row_parsing() {
        let json = r#"[
            {"Code": "2330", "Name": "台積電", "PEratio": "25.67", "DividendYield": "1.58", "PBratio": "7.21"},
            {"Code": "0056", "Name": "元大高股息", "PEratio": "-", "DividendYield": "6.9", "PBratio": ""}
        ]"#;
        let rows: Vec<FundamentalsRow> = serde_json::from_str(json).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(parse_decimal(&rows[0].pe_ratio), Some(25.67));
        // "-" markers become missing attributes
        assert_eq!(parse_decimal(&rows[1].pe_ratio), None);
        assert_eq!(parse_decimal(&rows[1].dividend_yield), Some(6.9));
    }

    #[test]
    fn test_daily_quote_row_parsing() {
        let json = r#"[
            {"Code": "2330", "Name": "台積電", "TradeVolume": "21,544,886",
             "TradeValue": "23,107,262,725", "OpeningPrice": "1,070.00",
             "HighestPrice": "1,075.00", "LowestPrice": "1,065.00",
             "ClosingPrice": "1,070.00", "Change": "10.0000", "Transaction": "35,971"}
        ]"#;
        let rows: Vec<DailyQuoteRow> = serde_json::from_str(json).unwrap();
        assert_eq!(parse_decimal(&rows[0].trade_volume), Some(21_544_886.0));
        assert_eq!(parse_decimal(&rows[0].closing_price), Some(1070.0));
    }

    #[test]
    fn test_percent_change() {
        // 100 -> 105: +5 absolute is +5% of the previous close
        assert_eq!(percent_change(Some(105.0), Some(5.0)), Some(5.0));
        let down = percent_change(Some(95.0), Some(-5.0)).unwrap();
        assert!((down - (-5.0)).abs() < 1e-9);
        assert_eq!(percent_change(None, Some(5.0)), None);
        assert_eq!(percent_change(Some(5.0), None), None);
        // Degenerate previous close
        assert_eq!(percent_change(Some(5.0), Some(5.0)), None);
    }
}
