//! The triage pipeline: report in, ticket out

pub mod backends;
pub mod classifier;
pub mod model;
pub mod orchestrator;

pub use backends::{build_tool_arguments, extract_ticket_ref, DirectBackend, DiscoveryBackend, SingleToolBackend, TicketRef};
pub use classifier::{build_prompt, extract_first_json_object, ClassificationResult, Classifier};
pub use model::*;
pub use orchestrator::Orchestrator;
