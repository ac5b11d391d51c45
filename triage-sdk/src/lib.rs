//! # Triage SDK
//!
//! Turns free-text field reports into tracked tickets.
//!
//! This crate provides:
//!
//! - A classifier that maps free-form model output onto a typed classification
//! - Typed clients for text generation, asset storage and the ticket board
//! - A tool-router integration: sessions, JSON-RPC over event streams,
//!   tool discovery and execution
//! - An orchestrator that runs one report end to end and reports a single outcome
//! - Error handling and configuration shared by all of the above
//!
//! ## Architecture
//!
//! The pipeline is built around a handful of traits:
//!
//! - `ServiceClient`: identity, health and metrics for every HTTP client
//! - `TextGenerator`: free-form text generation used by the classifier
//! - `AssetStore`: photo upload returning a public URL
//! - `TicketBackend`: one of three ticket-creation tiers
//! - `ServiceError`: one error type for every stage

// Re-export core modules
pub mod core;
pub use core::{AssetStore, ClientBuilder, ServiceClient, TextGenerator, TicketBackend, UploadedAsset};

// Re-export service-specific modules
pub mod services;
pub use services::{cloudinary, gemini, tool_router, trello};

// Re-export error handling
pub mod error;
pub use error::{ErrorContext, Result, ServiceError};

// Re-export configuration management
pub mod config;
pub use config::{ConfigProvider, ServiceConfig, TicketTier, TriageConfig};

pub mod pipeline;
pub use pipeline::{Classification, ExecutionOutcome, Orchestrator, Photo, Report, ReportSummary};

// Utility module for common functionality
pub mod util;

#[cfg(test)]
mod tests;

/// Create a new default client builder
pub fn client() -> core::ClientBuilder {
    core::ClientBuilder::new()
}

/// Build an orchestrator from process environment variables
pub fn orchestrator_from_env() -> Result<Orchestrator> {
    Orchestrator::from_config(&TriageConfig::from_env()?)
}
