//! Twilio Voice API client

pub mod twiml;

use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

use super::config::DEFAULT_TWILIO_API_URL;

pub use twiml::VoiceResponse;

#[derive(Error, Debug)]
pub enum TwilioError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Twilio API error ({status}): {message}")]
    Api { status: u16, message: String },
}

/// Carrier operations the relay depends on
#[async_trait::async_trait]
pub trait CarrierApi: Send + Sync {
    /// Place an outbound call
    async fn create_call(&self, request: &CreateCallRequest) -> Result<CarrierCall, TwilioError>;

    /// Replace the instructions of a live call with new TwiML
    async fn update_call(&self, call_sid: &str, twiml: &str) -> Result<CarrierCall, TwilioError>;
}

#[derive(Clone)]
pub struct TwilioClient {
    client: Client,
    account_sid: String,
    auth_token: String,
    base_url: String,
}

impl TwilioClient {
    pub fn new(account_sid: String, auth_token: String) -> Self {
        Self {
            client: Client::new(),
            account_sid,
            auth_token,
            base_url: DEFAULT_TWILIO_API_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn post_form<T: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        path: &str,
        form: &T,
    ) -> Result<R, TwilioError> {
        let response = self
            .client
            .post(format!(
                "{}/2010-04-01/Accounts/{}{}",
                self.base_url, self.account_sid, path
            ))
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(TwilioError::Api {
                status: status.as_u16(),
                message: error_text,
            });
        }

        Ok(response.json().await?)
    }
}

#[async_trait::async_trait]
impl CarrierApi for TwilioClient {
    async fn create_call(&self, request: &CreateCallRequest) -> Result<CarrierCall, TwilioError> {
        self.post_form("/Calls.json", &request.to_form()).await
    }

    async fn update_call(&self, call_sid: &str, twiml: &str) -> Result<CarrierCall, TwilioError> {
        self.post_form(&format!("/Calls/{}.json", call_sid), &[("Twiml", twiml)])
            .await
    }
}

/// Answering-machine detection settings for an outbound call
#[derive(Debug, Clone, PartialEq)]
pub struct MachineDetection {
    pub timeout_secs: u32,
    pub status_callback: String,
}

/// Parameters for `POST /Calls.json`
#[derive(Debug, Clone, PartialEq)]
pub struct CreateCallRequest {
    pub to: String,
    pub from: String,
    /// Voice webhook Twilio fetches once the call connects
    pub url: String,
    /// Receives terminal call states only
    pub status_callback: String,
    pub machine_detection: Option<MachineDetection>,
}

impl CreateCallRequest {
    // Twilio takes flat form fields; built by hand so optional AMD
    // fields can be omitted.
    fn to_form(&self) -> Vec<(&'static str, String)> {
        let mut form = vec![
            ("To", self.to.clone()),
            ("From", self.from.clone()),
            ("Url", self.url.clone()),
            ("Method", "POST".to_string()),
            ("StatusCallback", self.status_callback.clone()),
            ("StatusCallbackMethod", "POST".to_string()),
            ("StatusCallbackEvent", "completed".to_string()),
        ];

        if let Some(amd) = &self.machine_detection {
            form.extend([
                ("MachineDetection", "Enable".to_string()),
                ("MachineDetectionTimeout", amd.timeout_secs.to_string()),
                ("AsyncAmd", "true".to_string()),
                ("AsyncAmdStatusCallback", amd.status_callback.clone()),
                ("AsyncAmdStatusCallbackMethod", "POST".to_string()),
            ]);
        }

        form
    }
}

/// Twilio call resource (subset)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CarrierCall {
    pub sid: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub from: Option<String>,
}
