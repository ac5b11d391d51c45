//! Unit tests for the Triage SDK
//!
//! This module contains tests that exercise the clients against mock servers
//! and the pipeline end to end.

pub mod gemini_mock_tests;
pub mod tool_router_mock_tests;
