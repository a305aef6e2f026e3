//! # Product Search
//!
//! Main library for the product search catalog worker.
//!
//! This crate provides configuration, dependency wiring, and the background
//! worker that drains the task outbox and runs periodic rating sweeps.

pub mod config;
pub mod worker;

pub use config::{CatalogConfig, Dependencies};
pub use worker::Worker;

use thiserror::Error;

/// Errors that can occur during startup or while the worker runs.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Catalog error.
    #[error("Catalog error: {0}")]
    CatalogError(#[from] product_search_pipeline::CatalogError),

    /// Search index error.
    #[error("Search index error: {0}")]
    SearchIndexError(#[from] product_search_repository::SearchIndexError),
}

impl AppError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}
