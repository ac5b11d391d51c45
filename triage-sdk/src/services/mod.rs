//! Service-specific client implementations
//!
//! This module contains client implementations for specific external services.

pub mod cloudinary;
pub mod gemini;
pub mod tool_router;
pub mod trello;
mod common;

pub use common::{ClientMetrics, UserAgent};
