//! Server-side code for the relay
//!
//! This module contains all backend functionality:
//! - Twilio API integration (carrier call control)
//! - Retell API integration (voice-agent call registration)
//! - Call correlation and SIP handoff
//! - Webhook routes

pub mod config;
pub mod handoff;
pub mod retell;
pub mod store;
pub mod transfer;
pub mod twilio;
pub mod webhooks;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use config::RelayConfig;
use handoff::CallRelay;
use retell::RetellClient;
use store::InMemoryCorrelationStore;
use twilio::TwilioClient;

/// Application state shared across all routes
pub struct AppState {
    pub relay: CallRelay,
}

/// Create the Axum router with all webhook routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health_check))

        // Twilio call-control webhooks
        .route("/new-call", post(webhooks::new_call))
        .route("/call-status", post(webhooks::call_status))
        .route("/amd-status/{agent_id}", post(webhooks::amd_status))

        // Outbound calls
        .route("/create-phonecall", post(webhooks::create_phone_call))

        // Retell function calls
        .route("/run-function", post(webhooks::run_function))

        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

// Health check
async fn health_check() -> &'static str {
    "OK"
}

pub async fn run_server(config: RelayConfig) -> anyhow::Result<()> {
    config.validate()?;

    let twilio = TwilioClient::new(
        config.twilio_account_sid.clone(),
        config.twilio_auth_token.clone(),
    )
    .with_base_url(config.twilio_api_url.clone());
    let retell = RetellClient::new(config.retell_api_key.clone())
        .with_base_url(config.retell_api_url.clone());

    tracing::info!(
        "Agents: inbound {}, outbound {}; SIP domain {}; outbound number {}",
        config.agents.inbound,
        config.agents.outbound,
        config.sip_domain,
        config.phone_number
    );
    if config.transfers.is_empty() {
        tracing::warn!("No transfer routes configured, /run-function transfers will fail");
    } else {
        tracing::info!(
            "Transfer functions: {}",
            config.transfers.function_names().collect::<Vec<_>>().join(", ")
        );
    }

    let port = config.port;
    let relay = CallRelay::new(
        Arc::new(config),
        Arc::new(twilio),
        Arc::new(retell),
        Arc::new(InMemoryCorrelationStore::new()),
    );

    let app = create_router(AppState { relay });

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    tracing::info!("Server running on http://0.0.0.0:{}", port);

    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use super::test_support::{test_config, FakeCarrier, FakeVoiceAgent};
    use tower::util::ServiceExt;

    fn router() -> Router {
        create_router(AppState {
            relay: CallRelay::new(
                Arc::new(test_config()),
                Arc::new(FakeCarrier::new()),
                Arc::new(FakeVoiceAgent::new()),
                Arc::new(InMemoryCorrelationStore::new()),
            ),
        })
    }

    #[tokio::test]
    async fn test_health_check() {
        let response = router()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"OK");
    }

    #[tokio::test]
    async fn test_webhooks_reject_get() {
        let response = router()
            .oneshot(Request::builder().uri("/new-call").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
