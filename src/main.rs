//! Retell SIP Relay
//!
//! Bridges Twilio call-control webhooks to Retell AI voice agents by
//! handing calls off over SIP.
//!
//! Runs an Axum server exposing the Twilio and Retell webhooks.

mod models;
mod server;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("retell_sip_relay=info".parse()?),
        )
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    let config = server::config::RelayConfig::from_env()?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(run_server(config))
}

async fn run_server(config: server::config::RelayConfig) -> anyhow::Result<()> {
    tracing::info!("Starting relay on port {}", config.port);

    if let Err(e) = server::run_server(config).await {
        tracing::error!("Server error: {}", e);
        return Err(e);
    }

    Ok(())
}
