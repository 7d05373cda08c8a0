//! Shared infrastructure for the stock portal services.
//!
//! Provides the pieces every service needs: configuration loading,
//! a unified error taxonomy with HTTP status mapping, and logging
//! initialization with noise suppression for chatty HTTP libraries.

#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod logging;

pub use error::{Error, Result};
