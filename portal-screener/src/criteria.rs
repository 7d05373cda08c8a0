//! Criteria model for the stock screener.
//!
//! Turns the loosely-typed JSON criteria map sent by the web form into a
//! closed set of typed constraints. Normalization never fails hard:
//! unrecognized fields, wrong value types and malformed operators are
//! dropped with a warning so an evolving client form cannot break the
//! endpoint. An empty set after normalization means "match all".

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::fmt;

// ============================================================================
// Fields
// ============================================================================

/// Closed set of screenable stock attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CriterionField {
    /// Last traded / closing price
    Price,
    /// Daily share volume
    Volume,
    /// Price-to-earnings ratio
    PeRatio,
    /// Dividend yield in percent
    DividendYield,
    /// Market capitalization
    MarketCap,
    /// Daily change in percent
    ChangePercent,
    /// Price divided by the 20-day moving average
    PriceToMa20,
    /// Price divided by the 60-day moving average
    PriceToMa60,
}

impl CriterionField {
    /// All recognized fields, in display order.
    pub const ALL: &'static [Self] = &[
        Self::Price,
        Self::Volume,
        Self::PeRatio,
        Self::DividendYield,
        Self::MarketCap,
        Self::ChangePercent,
        Self::PriceToMa20,
        Self::PriceToMa60,
    ];

    /// Canonical wire name.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Price => "price",
            Self::Volume => "volume",
            Self::PeRatio => "pe_ratio",
            Self::DividendYield => "dividend_yield",
            Self::MarketCap => "market_cap",
            Self::ChangePercent => "change_percent",
            Self::PriceToMa20 => "price_to_ma20",
            Self::PriceToMa60 => "price_to_ma60",
        }
    }

    /// Parse a field name from the criteria map, accepting the aliases
    /// historical client forms have used.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "price" | "close" | "close_price" => Some(Self::Price),
            "volume" | "trade_volume" => Some(Self::Volume),
            "pe" | "pe_ratio" | "p/e" | "per" => Some(Self::PeRatio),
            "yield" | "dividend_yield" | "div_yield" => Some(Self::DividendYield),
            "market_cap" | "marketcap" | "cap" => Some(Self::MarketCap),
            "change" | "change_percent" | "percent_change" | "pct_change" => {
                Some(Self::ChangePercent)
            }
            "price_to_ma20" | "ma20_ratio" | "above_ma20" => Some(Self::PriceToMa20),
            "price_to_ma60" | "ma60_ratio" | "above_ma60" => Some(Self::PriceToMa60),
            _ => None,
        }
    }
}

impl fmt::Display for CriterionField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Constraints
// ============================================================================

/// Numeric constraint applied to one field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Constraint {
    /// value >= threshold
    AtLeast(f64),
    /// value <= threshold
    AtMost(f64),
    /// value == threshold (relative epsilon comparison)
    Equals(f64),
    /// low <= value <= high
    Between(f64, f64),
}

/// Relative tolerance for equality matching.
const EQ_EPSILON: f64 = 1e-6;

impl Constraint {
    /// Whether a concrete attribute value satisfies the constraint.
    pub fn matches(&self, value: f64) -> bool {
        match *self {
            Self::AtLeast(t) => value >= t,
            Self::AtMost(t) => value <= t,
            Self::Equals(t) => (value - t).abs() <= EQ_EPSILON * t.abs().max(1.0),
            Self::Between(low, high) => value >= low && value <= high,
        }
    }

    /// How strongly the value passes, normalized by the threshold scale.
    ///
    /// Positive means passing with room to spare; used by the engine to
    /// rank survivors so the result cap keeps the best matches. Only
    /// meaningful for values that already satisfy the constraint.
    pub fn margin(&self, value: f64) -> f64 {
        match *self {
            Self::AtLeast(t) => (value - t) / t.abs().max(1.0),
            Self::AtMost(t) => (t - value) / t.abs().max(1.0),
            Self::Equals(_) => 1.0,
            Self::Between(low, high) => {
                let span = (high - low).max(1.0);
                let mid = (low + high) / 2.0;
                (span / 2.0 - (value - mid).abs()) / span
            }
        }
    }

    /// Operator name used for echo-back.
    pub const fn op_str(&self) -> &'static str {
        match self {
            Self::AtLeast(_) => ">=",
            Self::AtMost(_) => "<=",
            Self::Equals(_) => "=",
            Self::Between(..) => "between",
        }
    }
}

// ============================================================================
// Criterion
// ============================================================================

/// A single named filter constraint on one stock attribute.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Criterion {
    pub field: CriterionField,
    pub constraint: Constraint,
}

impl Criterion {
    pub const fn new(field: CriterionField, constraint: Constraint) -> Self {
        Self { field, constraint }
    }
}

// Echo-back shape: {"field": "...", "op": ">=", "value": 5.0} or
// {"field": "...", "op": "between", "low": 2.0, "high": 4.0}
impl Serialize for Criterion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("field", self.field.as_str())?;
        map.serialize_entry("op", self.constraint.op_str())?;
        match self.constraint {
            Constraint::AtLeast(v) | Constraint::AtMost(v) | Constraint::Equals(v) => {
                map.serialize_entry("value", &v)?;
            }
            Constraint::Between(low, high) => {
                map.serialize_entry("low", &low)?;
                map.serialize_entry("high", &high)?;
            }
        }
        map.end()
    }
}

// ============================================================================
// Warnings
// ============================================================================

/// Non-fatal normalization problem. The entry is dropped, not rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Warning {
    /// Field name as sent by the client
    pub field: String,
    /// Why the entry was dropped
    pub reason: String,
}

impl Warning {
    fn new(field: &str, reason: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

// ============================================================================
// Normalization
// ============================================================================

/// Parse a decimal from a display string, accepting thousands
/// separators ("1,234.5") and a trailing percent sign. Exchange feeds
/// and client forms both use these formats.
pub fn parse_decimal(s: &str) -> Option<f64> {
    let cleaned: String = s
        .trim()
        .trim_end_matches('%')
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse().ok().filter(|v: &f64| v.is_finite())
}

/// Parse a numeric JSON value, accepting numbers and decimal strings.
pub fn parse_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::String(s) => parse_decimal(s),
        _ => None,
    }
}

/// Parse an operator name from the criteria map.
fn parse_operator(op: &str) -> Option<&'static str> {
    match op.trim() {
        ">=" | "gte" | "min" | "at_least" => Some(">="),
        "<=" | "lte" | "max" | "at_most" => Some("<="),
        "=" | "==" | "eq" => Some("="),
        "between" | "range" => Some("between"),
        _ => None,
    }
}

/// Build a constraint from one criteria-map entry value.
///
/// Accepted shapes:
/// - `{"op": ">=", "value": 5}` (canonical form)
/// - `{"min": 5, "max": 20}` (legacy form, becomes between / >= / <=)
/// - a bare number, shorthand for ">="
fn parse_constraint(field: &str, entry: &Value, warnings: &mut Vec<Warning>) -> Option<Constraint> {
    // Bare number shorthand
    if let Some(v) = parse_number(entry) {
        return Some(Constraint::AtLeast(v));
    }

    let Some(obj) = entry.as_object() else {
        warnings.push(Warning::new(field, "expected an object or a number"));
        return None;
    };

    // Legacy min/max form
    if !obj.contains_key("op") && !obj.contains_key("operator") {
        let min = obj.get("min").and_then(parse_number);
        let max = obj.get("max").and_then(parse_number);
        return match (min, max) {
            (Some(low), Some(high)) => Some(ordered_between(low, high)),
            (Some(low), None) => Some(Constraint::AtLeast(low)),
            (None, Some(high)) => Some(Constraint::AtMost(high)),
            (None, None) => {
                warnings.push(Warning::new(field, "missing operator"));
                None
            }
        };
    }

    let op = obj
        .get("op")
        .or_else(|| obj.get("operator"))
        .and_then(Value::as_str)
        .and_then(parse_operator);

    let Some(op) = op else {
        warnings.push(Warning::new(field, "unrecognized operator"));
        return None;
    };

    let raw_value = obj.get("value");

    if op == "between" {
        // Pair may be [low, high] or {"low": .., "high": ..}
        let pair = match raw_value {
            Some(Value::Array(arr)) if arr.len() == 2 => {
                match (parse_number(&arr[0]), parse_number(&arr[1])) {
                    (Some(a), Some(b)) => Some((a, b)),
                    _ => None,
                }
            }
            _ => {
                let low = obj.get("low").and_then(parse_number);
                let high = obj.get("high").and_then(parse_number);
                low.zip(high)
            }
        };

        return match pair {
            Some((a, b)) => Some(ordered_between(a, b)),
            None => {
                warnings.push(Warning::new(field, "between requires a numeric pair"));
                None
            }
        };
    }

    let Some(value) = raw_value.and_then(parse_number) else {
        warnings.push(Warning::new(field, "value is not numeric"));
        return None;
    };

    Some(match op {
        ">=" => Constraint::AtLeast(value),
        "<=" => Constraint::AtMost(value),
        _ => Constraint::Equals(value),
    })
}

/// An inverted pair is swapped rather than rejected.
fn ordered_between(a: f64, b: f64) -> Constraint {
    if a <= b {
        Constraint::Between(a, b)
    } else {
        Constraint::Between(b, a)
    }
}

/// Normalize a raw criteria map into typed criteria.
///
/// Never fails: every malformed entry becomes a [`Warning`] and is
/// dropped. Returns the criteria in the map's iteration order together
/// with the warnings collected along the way.
pub fn normalize(raw: &serde_json::Map<String, Value>) -> (Vec<Criterion>, Vec<Warning>) {
    let mut criteria = Vec::new();
    let mut warnings = Vec::new();

    for (name, entry) in raw {
        let Some(field) = CriterionField::parse(name) else {
            warnings.push(Warning::new(name, "unknown field"));
            continue;
        };

        if let Some(constraint) = parse_constraint(name, entry, &mut warnings) {
            criteria.push(Criterion::new(field, constraint));
        }
    }

    (criteria, warnings)
}
