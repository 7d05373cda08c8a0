//! HTTP routes for the screener service.
//!
//! Every response is a definitive JSON envelope with a `success`
//! boolean; the client never sees a partial result. Timeouts map to
//! 408, unknown preset ids to 404, everything else unexpected to 500.

use axum::extract::rejection::JsonRejection;
use axum::{extract::State, http::StatusCode, response::Json};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use portal_common::Error;

use crate::criteria::{self, Criterion};
use crate::engine;
use crate::runner::{self, Outcome};
use crate::ScreenerState;

// ============================================================================
// Request Types
// ============================================================================

/// Screening request body.
#[derive(Debug, Default, Deserialize)]
pub struct ScreenRequest {
    /// Criteria map: `{field: {op, value | [low, high]}, ...}`
    #[serde(default)]
    pub criteria: serde_json::Map<String, Value>,

    /// Optional preset strategy id used as the base criteria;
    /// explicit criteria override the preset per field.
    #[serde(default)]
    pub strategy: Option<String>,
}

// ============================================================================
// Envelope Helpers
// ============================================================================

fn error_envelope(status: u16, message: &str) -> (StatusCode, Json<Value>) {
    (
        StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        Json(json!({
            "success": false,
            "error": message,
            "timestamp": Utc::now().to_rfc3339(),
        })),
    )
}

fn error_to_envelope(error: &Error) -> (StatusCode, Json<Value>) {
    error_envelope(error.status_code(), &error.to_string())
}

// ============================================================================
// Route Handlers
// ============================================================================

/// Health check endpoint. Consults the universe provider so a dead
/// upstream shows up as degraded rather than a false "healthy".
pub async fn health(State(state): State<Arc<ScreenerState>>) -> Json<Value> {
    let market_data = state.provider.health_check().await.is_ok();
    Json(json!({
        "status": if market_data { "healthy" } else { "degraded" },
        "market_data": market_data,
        "version": env!("CARGO_PKG_VERSION"),
        "service": "portal-screener",
    }))
}

/// Run a screening pass under the service deadline.
///
/// Takes the body extraction result directly so a malformed body still
/// answers with the standard error envelope instead of axum's
/// plain-text rejection.
pub async fn screen(
    State(state): State<Arc<ScreenerState>>,
    payload: Result<Json<ScreenRequest>, JsonRejection>,
) -> (StatusCode, Json<Value>) {
    let Json(request) = match payload {
        Ok(json) => json,
        Err(rejection) => {
            tracing::warn!(error = %rejection.body_text(), "Rejected screening request body");
            return error_envelope(rejection.status().as_u16(), &rejection.body_text());
        }
    };

    let (explicit, warnings) = criteria::normalize(&request.criteria);
    for warning in &warnings {
        tracing::debug!(field = %warning.field, reason = %warning.reason, "Dropped criterion");
    }

    let applied = match request.strategy.as_deref() {
        Some(id) => match state.registry.resolve(id) {
            Ok(preset) => merge_criteria(preset, explicit),
            Err(e) => {
                tracing::warn!(strategy = %id, "Unknown preset strategy");
                return error_to_envelope(&e);
            }
        },
        None => explicit,
    };

    tracing::info!(
        criteria = applied.len(),
        dropped = warnings.len(),
        strategy = request.strategy.as_deref().unwrap_or("-"),
        "Screening request"
    );

    let provider = Arc::clone(&state.provider);
    let outcome = runner::run_bounded(state.deadline, move |cancel| {
        engine::run_screening(provider, applied, None, cancel)
    })
    .await;

    match outcome {
        Outcome::Completed(Ok(result)) => {
            let returned = result.results.len();
            (
                StatusCode::OK,
                Json(json!({
                    "success": true,
                    "results": result.results,
                    "total_count": result.total_count,
                    "criteria": result.criteria,
                    "message": format!("Matched {} stocks, returning {}", result.total_count, returned),
                    "timestamp": Utc::now().to_rfc3339(),
                })),
            )
        }
        Outcome::Completed(Err(e)) => {
            tracing::error!(error = %e, "Screening failed");
            error_to_envelope(&e)
        }
        Outcome::TimedOut => {
            tracing::warn!(deadline_secs = state.deadline.as_secs(), "Screening timed out");
            error_envelope(408, "screening took too long; narrow the criteria and retry")
        }
        Outcome::Aborted => {
            tracing::error!("Screening worker aborted");
            error_envelope(500, "screening worker failed")
        }
    }
}

/// List the preset strategies.
pub async fn strategies(State(state): State<Arc<ScreenerState>>) -> Json<Value> {
    Json(json!({
        "success": true,
        "strategies": state.registry.list(),
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

/// Preset criteria overridden per-field by explicit criteria.
fn merge_criteria(preset: Vec<Criterion>, explicit: Vec<Criterion>) -> Vec<Criterion> {
    let mut merged = preset;
    merged.retain(|p| !explicit.iter().any(|c| c.field == p.field));
    merged.extend(explicit);
    merged
}
