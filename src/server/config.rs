//! Relay Configuration
//!
//! Environment-sourced settings for the Twilio and Retell integrations.

use thiserror::Error;

use super::transfer::TransferDirectory;
use crate::models::CallDirection;

const DEFAULT_PORT: u16 = 5000;
const DEFAULT_MACHINE_DETECTION_TIMEOUT: u32 = 30;

pub const DEFAULT_RETELL_API_URL: &str = "https://api.retellai.com";
pub const DEFAULT_TWILIO_API_URL: &str = "https://api.twilio.com";

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{var} is invalid: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Retell agent ids per call direction
///
/// A single `RETELL_AGENT_ID` serves both directions unless an
/// inbound/outbound override is configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentRoster {
    pub inbound: String,
    pub outbound: String,
}

impl AgentRoster {
    #[cfg(test)]
    pub fn single(agent_id: impl Into<String>) -> Self {
        let agent_id = agent_id.into();
        Self {
            inbound: agent_id.clone(),
            outbound: agent_id,
        }
    }

    pub fn agent_for(&self, direction: CallDirection) -> &str {
        match direction {
            CallDirection::Inbound => &self.inbound,
            CallDirection::Outbound => &self.outbound,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub retell_api_key: String,
    pub retell_api_url: String,
    pub agents: AgentRoster,

    pub twilio_account_sid: String,
    pub twilio_auth_token: String,
    pub twilio_api_url: String,

    /// SIP domain of the voice-agent bridge
    pub sip_domain: String,

    /// The system's own number; calls placed from it are outbound legs
    pub phone_number: String,

    /// Externally reachable base URL used to build Twilio callbacks
    pub base_url: String,

    pub port: u16,

    pub transfers: TransferDirectory,

    /// Seconds Twilio spends on answering-machine detection
    pub machine_detection_timeout: u32,
}

impl RelayConfig {
    /// Create config from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from any key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &'static str| var(key).ok_or(ConfigError::Missing(key));

        let default_agent = var("RETELL_AGENT_ID");
        let inbound = var("RETELL_INBOUND_AGENT_ID").or_else(|| default_agent.clone());
        let outbound = var("RETELL_OUTBOUND_AGENT_ID").or_else(|| default_agent.clone());
        let agents = match (inbound, outbound) {
            (Some(inbound), Some(outbound)) => AgentRoster { inbound, outbound },
            _ => return Err(ConfigError::Missing("RETELL_AGENT_ID")),
        };

        let port = match var("PORT") {
            Some(p) => p.parse::<u16>().map_err(|e: std::num::ParseIntError| ConfigError::Invalid {
                var: "PORT",
                reason: e.to_string(),
            })?,
            None => DEFAULT_PORT,
        };

        let machine_detection_timeout = match var("MACHINE_DETECTION_TIMEOUT") {
            Some(t) => t.parse::<u32>().map_err(|e: std::num::ParseIntError| ConfigError::Invalid {
                var: "MACHINE_DETECTION_TIMEOUT",
                reason: e.to_string(),
            })?,
            None => DEFAULT_MACHINE_DETECTION_TIMEOUT,
        };

        let transfers = TransferDirectory::parse(&var("TRANSFER_ROUTES").unwrap_or_default())
            .map_err(|reason| ConfigError::Invalid {
                var: "TRANSFER_ROUTES",
                reason,
            })?;

        Ok(Self {
            retell_api_key: required("RETELL_API_KEY")?,
            retell_api_url: var("RETELL_API_URL").unwrap_or_else(|| DEFAULT_RETELL_API_URL.to_string()),
            agents,
            twilio_account_sid: required("TWILIO_ACCOUNT_SID")?,
            twilio_auth_token: required("TWILIO_AUTH_TOKEN")?,
            twilio_api_url: var("TWILIO_API_URL").unwrap_or_else(|| DEFAULT_TWILIO_API_URL.to_string()),
            sip_domain: required("SIP_DOMAIN")?,
            phone_number: required("PHONE_NUMBER")?,
            base_url: required("BASE_URL")?.trim_end_matches('/').to_string(),
            port,
            transfers,
            machine_detection_timeout,
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(ConfigError::Invalid {
                var: "BASE_URL",
                reason: "must start with http:// or https://".to_string(),
            });
        }
        if self.sip_domain.contains('@') || self.sip_domain.starts_with("sip:") {
            return Err(ConfigError::Invalid {
                var: "SIP_DOMAIN",
                reason: "expected a bare domain".to_string(),
            });
        }
        if self.machine_detection_timeout == 0 {
            return Err(ConfigError::Invalid {
                var: "MACHINE_DETECTION_TIMEOUT",
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }

    /// Resolve the direction of a call from its source number
    pub fn direction_of(&self, from_number: &str) -> CallDirection {
        if from_number == self.phone_number {
            CallDirection::Outbound
        } else {
            CallDirection::Inbound
        }
    }

    /// SIP target for a Retell session
    pub fn sip_uri(&self, agent_session_id: &str) -> String {
        format!("sip:{}@{}", agent_session_id, self.sip_domain)
    }

    pub fn callback_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}
