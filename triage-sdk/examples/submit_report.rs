//! Submit a Field Report
//!
//! Runs one report through the whole pipeline using credentials from the
//! environment (see `.env.example` in the gateway crate).
//!
//! To run this example:
//! ```
//! GEMINI_API_KEY=... TRELLO_API_KEY=... TRELLO_TOKEN=... TRELLO_LIST_ID=... \
//!     cargo run --example submit_report -- "Hydraulic press leaking oil" PRESS-4 photo.jpg
//! ```

use std::env;

use triage_sdk::{error::Result, orchestrator_from_env, Photo, Report, ServiceError};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let mut args = env::args().skip(1);
    let text = args.next().unwrap_or_else(|| "Conveyor belt on line 2 is slipping".to_string());
    let machine_id = args.next();
    let photo_path = args.next();

    let mut report = Report::new(text)?;
    if let Some(machine_id) = machine_id {
        report = report.with_machine_id(machine_id);
    }
    if let Some(photo_path) = photo_path {
        let bytes = std::fs::read(&photo_path)
            .map_err(|e| ServiceError::validation(format!("Cannot read {}: {}", photo_path, e)))?;
        report = report.with_photo(Photo::new(bytes, "image/jpeg").with_file_name(photo_path));
    }

    let orchestrator = orchestrator_from_env()?;
    println!("Submitting report via the {} tier...", orchestrator.tier());

    let outcome = orchestrator.run(&report).await;

    let classification = outcome.classification();
    println!(
        "Classified as {} / {}: {}",
        classification.severity, classification.category, classification.title
    );

    for diagnostic in outcome.diagnostics() {
        println!("  [{:?}] {:?}: {}", diagnostic.level, diagnostic.stage, diagnostic.message);
    }

    match outcome.failure() {
        None => println!("Ticket created: {}", outcome.ticket_url().unwrap_or("(no link returned)")),
        Some(failure) => println!("Ticket creation failed ({}): {}", failure.kind, failure.message),
    }

    Ok(())
}
