// triage-gateway-rs/src/main.rs
// Field Report Triage Gateway - HTTP intake for the triage pipeline
// Port 8000 - multipart report submission, report listing, health

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use triage_gateway::TriageGateway;
use triage_sdk::TriageConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Credentials are checked by each call that needs them, not here
    let config = TriageConfig::from_env().context("invalid triage configuration")?;
    tracing::info!("Ticket tier: {}", config.tier);

    let gateway = Arc::new(TriageGateway::from_config(&config).context("failed to build the triage pipeline")?);
    let app = gateway.create_router();

    let port = config_rs::get_default_port("TRIAGE_GATEWAY");
    let addr = config_rs::get_bind_address("TRIAGE_GATEWAY", port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("cannot bind {}", addr))?;

    tracing::info!("{} listening on {}", config_rs::get_formatted_service_name("TRIAGE_GATEWAY"), addr);

    axum::serve(listener, app).await?;

    Ok(())
}
