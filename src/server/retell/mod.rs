//! Retell AI API client
//!
//! Registers phone calls with Retell so the carrier can bridge them to
//! the agent's SIP endpoint. The `call_id` Retell returns addresses the
//! session: `sip:{call_id}@{sip_domain}`.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::config::DEFAULT_RETELL_API_URL;
use crate::models::{CallDirection, DynamicVariables};

#[derive(Error, Debug)]
pub enum RetellError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Retell API error ({status}): {message}")]
    Api { status: u16, message: String },
}

/// Voice-agent platform operations the relay depends on
#[async_trait::async_trait]
pub trait VoiceAgentApi: Send + Sync {
    async fn register_phone_call(&self, request: &RegisterPhoneCall) -> Result<RegisteredCall, RetellError>;
}

/// Retell API client
#[derive(Clone)]
pub struct RetellClient {
    client: Client,
    api_key: String,
    base_url: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RegisterPhoneCall {
    pub agent_id: String,
    pub from_number: String,
    pub to_number: String,
    pub direction: CallDirection,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retell_llm_dynamic_variables: Option<DynamicVariables>,
}

/// Registered call returned by Retell
#[derive(Debug, Clone, Deserialize)]
pub struct RegisteredCall {
    pub call_id: String,
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub call_status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RetellErrorBody {
    #[serde(alias = "error_message")]
    message: Option<String>,
}

impl RetellClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: DEFAULT_RETELL_API_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait::async_trait]
impl VoiceAgentApi for RetellClient {
    async fn register_phone_call(&self, request: &RegisterPhoneCall) -> Result<RegisteredCall, RetellError> {
        let response = self
            .client
            .post(format!("{}/v2/register-phone-call", self.base_url))
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            // Prefer the structured message when Retell sends one
            let message = serde_json::from_str::<RetellErrorBody>(&error_text)
                .ok()
                .and_then(|body| body.message)
                .unwrap_or(error_text);
            return Err(RetellError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let registered: RegisteredCall = response.json().await?;
        tracing::debug!(
            "Retell registered call {} for agent {:?} (status: {:?})",
            registered.call_id,
            registered.agent_id,
            registered.call_status
        );
        Ok(registered)
    }
}
