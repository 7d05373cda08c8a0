//! Preset screening strategies.
//!
//! A fixed, hand-curated table of named criteria bundles offered as
//! shortcuts in the screener form. Built once at startup and read-only
//! afterwards; safe for unsynchronized concurrent reads.

use portal_common::{Error, Result};
use serde::Serialize;

use crate::criteria::{Constraint, Criterion, CriterionField};

/// An immutable named preset.
#[derive(Debug, Clone, Serialize)]
pub struct Strategy {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub criteria: Vec<Criterion>,
}

/// Registry of preset strategies, in curated display order.
#[derive(Debug)]
pub struct StrategyRegistry {
    strategies: Vec<Strategy>,
}

impl StrategyRegistry {
    /// Build the curated preset table.
    pub fn new() -> Self {
        use Constraint::{AtLeast, AtMost, Between};
        use CriterionField::*;

        let strategies = vec![
            Strategy {
                id: "high_dividend",
                name: "High Dividend Yield",
                description: "Generous payers at a reasonable earnings multiple",
                criteria: vec![
                    Criterion::new(DividendYield, AtLeast(5.0)),
                    Criterion::new(PeRatio, AtMost(20.0)),
                ],
            },
            Strategy {
                id: "value",
                name: "Value Screen",
                description: "Cheap on earnings with a dividend cushion",
                criteria: vec![
                    Criterion::new(PeRatio, Between(4.0, 12.0)),
                    Criterion::new(DividendYield, AtLeast(3.0)),
                ],
            },
            Strategy {
                id: "momentum",
                name: "Momentum Breakout",
                description: "Strong movers trading above their monthly average on volume",
                criteria: vec![
                    Criterion::new(ChangePercent, AtLeast(3.0)),
                    Criterion::new(PriceToMa20, AtLeast(1.03)),
                    Criterion::new(Volume, AtLeast(5_000_000.0)),
                ],
            },
            Strategy {
                id: "active_large",
                name: "Active Large Caps",
                description: "Heavily traded names above the penny range",
                criteria: vec![
                    Criterion::new(Volume, AtLeast(10_000_000.0)),
                    Criterion::new(Price, AtLeast(50.0)),
                ],
            },
        ];

        Self { strategies }
    }

    /// All presets in curated display order.
    pub fn list(&self) -> &[Strategy] {
        &self.strategies
    }

    /// Resolve a preset id into its criteria.
    pub fn resolve(&self, id: &str) -> Result<Vec<Criterion>> {
        self.strategies
            .iter()
            .find(|s| s.id == id)
            .map(|s| s.criteria.clone())
            .ok_or_else(|| Error::NotFound(format!("unknown strategy '{id}'")))
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_is_stable_and_nonempty() {
        let registry = StrategyRegistry::new();
        let ids: Vec<_> = registry.list().iter().map(|s| s.id).collect();
        assert_eq!(ids, vec!["high_dividend", "value", "momentum", "active_large"]);

        for strategy in registry.list() {
            assert!(!strategy.criteria.is_empty(), "{} has no criteria", strategy.id);
            assert!(!strategy.description.is_empty());
        }
    }

    #[test]
    fn test_resolve_known_id() {
        let registry = StrategyRegistry::new();
        let criteria = registry.resolve("high_dividend").unwrap();
        assert_eq!(criteria[0].field, CriterionField::DividendYield);
    }

    #[test]
    fn test_resolve_unknown_id_is_not_found() {
        let registry = StrategyRegistry::new();
        let err = registry.resolve("moonshot").unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert_eq!(err.status_code(), 404);
    }

    #[test]
    fn test_strategy_serialization() {
        let registry = StrategyRegistry::new();
        let json = serde_json::to_value(registry.list()).unwrap();
        assert_eq!(json[0]["id"], "high_dividend");
        assert_eq!(json[0]["criteria"][0]["field"], "dividend_yield");
    }
}
