use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Dynamic variables injected into the voice agent's runtime context.
pub type DynamicVariables = HashMap<String, String>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CallDirection {
    Inbound,
    Outbound,
}

impl CallDirection {
    /// Pick the number a correlation record is keyed by.
    ///
    /// Inbound calls are keyed by the caller, outbound legs by the party
    /// being dialed.
    pub fn correlation_key<'a>(&self, from_number: &'a str, to_number: &'a str) -> &'a str {
        match self {
            CallDirection::Inbound => from_number,
            CallDirection::Outbound => to_number,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CallDirection::Inbound => "inbound",
            CallDirection::Outbound => "outbound",
        }
    }
}

impl std::fmt::Display for CallDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Association between a phone number, the Twilio call and the Retell session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CallCorrelation {
    pub phone_number: String,
    pub carrier_call_id: String,
    pub agent_session_id: String,
    pub direction: CallDirection,
    pub created_at: DateTime<Utc>,
}

impl CallCorrelation {
    pub fn new(
        phone_number: impl Into<String>,
        carrier_call_id: impl Into<String>,
        agent_session_id: impl Into<String>,
        direction: CallDirection,
    ) -> Self {
        Self {
            phone_number: phone_number.into(),
            carrier_call_id: carrier_call_id.into(),
            agent_session_id: agent_session_id.into(),
            direction,
            created_at: Utc::now(),
        }
    }
}

/// Twilio voice webhook form (`POST /new-call`).
///
/// Fields are optional so a malformed webhook still gets TwiML back
/// instead of an extractor rejection.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewCallWebhook {
    #[serde(rename = "CallSid")]
    pub call_sid: Option<String>,
    #[serde(rename = "From")]
    pub from: Option<String>,
    #[serde(rename = "To")]
    pub to: Option<String>,
}

/// Twilio status callback form (`POST /call-status`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallStatusCallback {
    #[serde(rename = "CallSid")]
    pub call_sid: Option<String>,
    #[serde(rename = "CallStatus")]
    pub call_status: Option<String>,
    #[serde(rename = "CallDuration")]
    pub call_duration: Option<String>,
    #[serde(rename = "From")]
    pub from: Option<String>,
    #[serde(rename = "To")]
    pub to: Option<String>,
}

/// Twilio async answering-machine-detection callback (`POST /amd-status/{agent_id}`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AmdStatusCallback {
    #[serde(rename = "CallSid")]
    pub call_sid: Option<String>,
    #[serde(rename = "AnsweredBy")]
    pub answered_by: Option<String>,
    #[serde(rename = "MachineDetectionDuration")]
    pub machine_detection_duration: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreatePhoneCallRequest {
    pub to_number: Option<String>,
    #[serde(default)]
    pub from_number: Option<String>,
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub retell_llm_dynamic_variables: Option<DynamicVariables>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePhoneCallResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_sid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Retell custom-function webhook body (`POST /run-function`).
#[derive(Debug, Clone, Deserialize)]
pub struct RunFunctionRequest {
    #[serde(default)]
    pub call: RetellCallContext,
    pub name: String,
    #[serde(default)]
    pub args: serde_json::Value,
}

/// The subset of the Retell call object the relay reads.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RetellCallContext {
    pub call_id: Option<String>,
    pub from_number: Option<String>,
}

/// Successful transfer result returned to the voice agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransferOutcome {
    pub transfer_number: String,
    pub original_call_sid: String,
    pub function_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correlation_key_follows_direction() {
        assert_eq!(CallDirection::Inbound.correlation_key("+1111", "+2222"), "+1111");
        assert_eq!(CallDirection::Outbound.correlation_key("+1111", "+2222"), "+2222");
    }

    #[test]
    fn test_direction_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&CallDirection::Outbound).unwrap(), "\"outbound\"");
        assert_eq!(CallDirection::Inbound.to_string(), "inbound");
    }

    #[test]
    fn test_run_function_request_tolerates_extra_fields() {
        let body = serde_json::json!({
            "call": {
                "call_id": "retell-abc",
                "from_number": "+15550001111",
                "to_number": "+15559990000",
                "agent_id": "agent_1",
                "call_status": "ongoing"
            },
            "name": "transfer_to_sales",
            "args": {"reason": "pricing"}
        });

        let req: RunFunctionRequest = serde_json::from_value(body).unwrap();
        assert_eq!(req.name, "transfer_to_sales");
        assert_eq!(req.call.from_number.as_deref(), Some("+15550001111"));
        assert_eq!(req.call.call_id.as_deref(), Some("retell-abc"));
        assert_eq!(req.args["reason"], "pricing");
    }

    #[test]
    fn test_create_phone_call_request_without_to_number() {
        let req: CreatePhoneCallRequest = serde_json::from_str("{}").unwrap();
        assert!(req.to_number.is_none());
        assert!(req.retell_llm_dynamic_variables.is_none());
    }
}
