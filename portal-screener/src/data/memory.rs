//! In-memory universe provider.
//!
//! Serves a fixed set of records for tests and offline development.
//! Supports an optional per-fetch delay (for deadline tests) and
//! per-symbol failure injection (for partial-failure tests).

use async_trait::async_trait;
use std::collections::HashSet;
use std::time::Duration;

use super::{ProviderError, StockRecord, UniverseProvider};

/// Universe provider over a fixed in-memory record set.
#[derive(Debug, Default)]
pub struct StaticProvider {
    records: Vec<StockRecord>,
    fetch_delay: Option<Duration>,
    failing: HashSet<String>,
    unhealthy: bool,
}

impl StaticProvider {
    /// Create a provider serving the given records, in the given order.
    pub fn new(records: Vec<StockRecord>) -> Self {
        Self {
            records,
            ..Self::default()
        }
    }

    /// Delay every `get_record` call by the given duration.
    pub fn with_fetch_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = Some(delay);
        self
    }

    /// Make `get_record` fail for the given symbol.
    pub fn with_failing_symbol(mut self, code: impl Into<String>) -> Self {
        self.failing.insert(code.into());
        self
    }

    /// Make `health_check` report the provider as unavailable.
    pub fn with_unhealthy(mut self) -> Self {
        self.unhealthy = true;
        self
    }
}

#[async_trait]
impl UniverseProvider for StaticProvider {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn list_symbols(&self) -> Result<Vec<String>, ProviderError> {
        Ok(self.records.iter().map(|r| r.code.clone()).collect())
    }

    async fn get_record(&self, symbol: &str) -> Result<StockRecord, ProviderError> {
        if let Some(delay) = self.fetch_delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing.contains(symbol) {
            return Err(ProviderError::Network(format!(
                "injected failure for {symbol}"
            )));
        }

        self.records
            .iter()
            .find(|r| r.code == symbol)
            .cloned()
            .ok_or_else(|| ProviderError::SymbolNotFound(symbol.to_string()))
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        if self.unhealthy {
            return Err(ProviderError::Unavailable("injected outage".into()));
        }
        Ok(())
    }
}
