//! Screening engine.
//!
//! Iterates the stock universe, evaluates every candidate against the
//! normalized criteria, scores the survivors and truncates to the
//! result cap. The scan always runs to completion before truncation so
//! the cap returns the best matches, not merely the first encountered.
//!
//! Per-symbol fetch failures are skipped: a single bad symbol must
//! never abort the scan.

use futures::stream::{self, StreamExt};
use portal_common::{Error, Result};
use serde::Serialize;
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::debug;

use crate::criteria::Criterion;
use crate::data::{StockRecord, UniverseProvider};
use crate::runner::CancelToken;

/// Hard ceiling (and default) for returned results. Part of the API
/// contract, not client-configurable.
pub const MAX_RESULTS: usize = 30;

/// Concurrent in-flight record fetches per screening run.
const FETCH_CONCURRENCY: usize = 8;

// ============================================================================
// Result Types
// ============================================================================

/// A surviving record together with its ranking score.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredRecord {
    #[serde(flatten)]
    pub record: StockRecord,
    pub score: f64,
}

/// Outcome of one screening run.
#[derive(Debug, Clone, Serialize)]
pub struct ScreeningResult {
    /// Ranked survivors, truncated to the cap
    pub results: Vec<ScoredRecord>,
    /// Survivors found before truncation
    pub total_count: usize,
    /// Criteria actually applied, post-normalization (echo-back)
    pub criteria: Vec<Criterion>,
}

// ============================================================================
// Evaluation
// ============================================================================

/// Coerce a requested cap into the valid range.
///
/// Zero is invalid input and falls back to the default; requests can
/// lower the cap but never raise it past the ceiling.
pub fn effective_cap(requested: Option<usize>) -> usize {
    match requested {
        Some(cap) if (1..=MAX_RESULTS).contains(&cap) => cap,
        _ => MAX_RESULTS,
    }
}

/// Logical AND over all criteria. A criterion whose field is missing on
/// the record is a non-match (fail-closed).
fn matches_all(record: &StockRecord, criteria: &[Criterion]) -> bool {
    criteria.iter().all(|criterion| {
        record
            .attribute(criterion.field)
            .is_some_and(|value| criterion.constraint.matches(value))
    })
}

/// Ranking score: how strongly the record passes, summed over criteria.
///
/// Only called for survivors, so every attribute is present. With no
/// criteria every record scores the same and provider order survives
/// the (stable) sort.
fn score(record: &StockRecord, criteria: &[Criterion]) -> f64 {
    criteria
        .iter()
        .filter_map(|criterion| {
            record
                .attribute(criterion.field)
                .map(|value| criterion.constraint.margin(value))
        })
        .sum()
}

/// Run one screening pass over the provider's universe.
///
/// Checks the cancel token between candidates and returns
/// `Error::Timeout` once it trips; the controller has already answered
/// the caller by then, so the partial state is simply dropped.
pub async fn run_screening(
    provider: Arc<dyn UniverseProvider>,
    criteria: Vec<Criterion>,
    cap: Option<usize>,
    cancel: CancelToken,
) -> Result<ScreeningResult> {
    let cap = effective_cap(cap);

    let symbols = provider
        .list_symbols()
        .await
        .map_err(|e| Error::MarketData(format!("listing universe: {e}")))?;

    debug!(
        provider = provider.name(),
        universe = symbols.len(),
        criteria = criteria.len(),
        "Screening started"
    );

    let mut fetches = stream::iter(symbols)
        .map(|symbol| {
            let provider = Arc::clone(&provider);
            async move {
                let fetched = provider.get_record(&symbol).await;
                (symbol, fetched)
            }
        })
        .buffered(FETCH_CONCURRENCY);

    let mut survivors: Vec<ScoredRecord> = Vec::new();
    let mut skipped = 0usize;

    while let Some((symbol, fetched)) = fetches.next().await {
        if cancel.is_cancelled() {
            debug!(symbol = %symbol, "Screening cancelled mid-scan");
            return Err(Error::Timeout);
        }

        let record = match fetched {
            Ok(record) => record,
            Err(e) => {
                // Partial-failure isolation: skip and continue
                debug!(symbol = %symbol, error = %e, "Skipping symbol");
                skipped += 1;
                continue;
            }
        };

        if matches_all(&record, &criteria) {
            let score = score(&record, &criteria);
            survivors.push(ScoredRecord { record, score });
        }
    }

    let total_count = survivors.len();

    // Stable sort keeps provider order among equal scores
    survivors.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    survivors.truncate(cap);

    debug!(
        total_count,
        returned = survivors.len(),
        skipped,
        "Screening finished"
    );

    Ok(ScreeningResult {
        results: survivors,
        total_count,
        criteria,
    })
}
