//! Portal Screener
//!
//! Criteria-driven stock screener for the portal, exposed as an HTTP
//! service. The portal's other surfaces (watchlists, calculators, news)
//! talk to this service over `POST /api/screener`.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                 portal-screener (Rust Service)               │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌────────────┐  ┌───────────┐  ┌──────────────────────────┐ │
//! │  │  Criteria  │  │ Screening │  │  Bounded Execution       │ │
//! │  │  Model     │─▶│ Engine    │◀─│  Controller (60s budget) │ │
//! │  └────────────┘  └─────┬─────┘  └──────────────────────────┘ │
//! │  ┌────────────┐        ▼                                     │
//! │  │  Strategy  │  ┌───────────┐                               │
//! │  │  Registry  │  │ Universe  │ TWSE open data                │
//! │  └────────────┘  │ Provider  │                               │
//! │                  └───────────┘                               │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each request gets its own worker task under a hard wall-clock
//! budget; a slow scan answers 408 instead of stalling the web layer.

#![warn(clippy::all)]

pub mod criteria;
pub mod data;
pub mod engine;
pub mod registry;
pub mod routes;
pub mod runner;

use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;

use portal_common::config::Config;

use crate::data::{TwseProvider, UniverseProvider};
use crate::registry::StrategyRegistry;
use crate::runner::SCREENING_DEADLINE;

/// Maximum accepted request body (the criteria map is tiny).
const MAX_BODY_BYTES: usize = 64 * 1024;

/// Screener service state.
pub struct ScreenerState {
    /// Configuration
    pub config: Config,
    /// Stock universe source
    pub provider: Arc<dyn UniverseProvider>,
    /// Preset strategy registry (read-only after startup)
    pub registry: StrategyRegistry,
    /// Per-request screening budget
    pub deadline: Duration,
}

impl ScreenerState {
    /// Create state backed by the TWSE open-data provider.
    pub fn new(config: Config) -> Result<Self> {
        let provider = Arc::new(TwseProvider::new(
            config.market_data.base_url.clone(),
            Duration::from_secs(config.market_data.request_timeout_secs),
        )?);
        Ok(Self::with_provider(config, provider))
    }

    /// Create state over an arbitrary provider (tests, other markets).
    pub fn with_provider(config: Config, provider: Arc<dyn UniverseProvider>) -> Self {
        Self {
            config,
            provider,
            registry: StrategyRegistry::new(),
            deadline: SCREENING_DEADLINE,
        }
    }

    /// Override the screening deadline (deadline tests).
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }
}

/// Build the HTTP router over the given state.
pub fn build_router(state: Arc<ScreenerState>) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/api/screener", post(routes::screen))
        .route("/api/screener/strategies", get(routes::strategies))
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .with_state(state)
}

/// Main screener service.
pub struct ScreenerService {
    state: Arc<ScreenerState>,
}

impl ScreenerService {
    /// Create a new screener service.
    pub fn new(config: Config) -> Result<Self> {
        let state = Arc::new(ScreenerState::new(config)?);
        Ok(Self { state })
    }

    /// Start the HTTP server.
    pub async fn start(self) -> Result<()> {
        let host = self.state.config.network.bind.clone();
        let port = self.state.config.screener.port;

        let app = build_router(self.state.clone());

        let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
        tracing::info!(address = %addr, "Starting HTTP server");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}
