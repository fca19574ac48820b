//! Call correlation and SIP handoff
//!
//! This module holds the relay's call flow:
//! - Bridging Twilio calls to a Retell session over SIP
//! - Placing outbound calls that are pre-registered with Retell
//! - Redirecting live calls when the agent invokes a transfer function

use std::sync::Arc;

use reqwest::Url;

use super::config::RelayConfig;
use super::retell::{RegisterPhoneCall, RetellError, VoiceAgentApi};
use super::store::CorrelationStore;
use super::twilio::{CarrierApi, CarrierCall, CreateCallRequest, MachineDetection, TwilioError, VoiceResponse};
use crate::models::{CallCorrelation, CallDirection, DynamicVariables, TransferOutcome};

/// Errors from the handoff flow
#[derive(Debug, thiserror::Error)]
pub enum HandoffError {
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("Call registration failed: {0}")]
    Registration(#[from] RetellError),

    #[error("Carrier request failed: {0}")]
    Carrier(#[from] TwilioError),

    #[error("Call SID not found")]
    CallNotFound { from_number: String },

    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    #[error("Invalid callback URL: {0}")]
    CallbackUrl(String),
}

/// A call arriving on the voice webhook
#[derive(Debug, Clone)]
pub struct IncomingCall {
    pub call_sid: String,
    pub from_number: String,
    pub to_number: String,
    pub dynamic_variables: Option<DynamicVariables>,
}

/// Where a call was bridged to
#[derive(Debug, Clone, PartialEq)]
pub struct Handoff {
    pub direction: CallDirection,
    pub agent_session_id: String,
    pub sip_uri: String,
    /// The session came from an outbound pre-registration
    pub reused: bool,
}

#[derive(Debug, Clone, Default)]
pub struct OutboundCallRequest {
    pub to_number: String,
    pub from_number: Option<String>,
    pub agent_id: Option<String>,
    pub dynamic_variables: DynamicVariables,
}

/// A transfer function invoked by the voice agent
#[derive(Debug, Clone)]
pub struct FunctionInvocation {
    pub function_name: String,
    pub from_number: String,
    pub agent_session_id: Option<String>,
}

/// Correlates Twilio calls with Retell sessions
pub struct CallRelay {
    config: Arc<RelayConfig>,
    carrier: Arc<dyn CarrierApi>,
    agents: Arc<dyn VoiceAgentApi>,
    store: Arc<dyn CorrelationStore>,
}

impl CallRelay {
    pub fn new(
        config: Arc<RelayConfig>,
        carrier: Arc<dyn CarrierApi>,
        agents: Arc<dyn VoiceAgentApi>,
        store: Arc<dyn CorrelationStore>,
    ) -> Self {
        Self {
            config,
            carrier,
            agents,
            store,
        }
    }

    /// Resolve the Retell session for a call and build its SIP target
    pub async fn handoff(&self, call: &IncomingCall) -> Result<Handoff, HandoffError> {
        let direction = self.config.direction_of(&call.from_number);

        if direction == CallDirection::Outbound {
            if let Some(existing) = self.store.get(&call.to_number).await {
                tracing::info!(
                    "Outbound leg {} to {} reuses session {}",
                    call.call_sid,
                    call.to_number,
                    existing.agent_session_id
                );
                return Ok(Handoff {
                    direction,
                    sip_uri: self.config.sip_uri(&existing.agent_session_id),
                    agent_session_id: existing.agent_session_id,
                    reused: true,
                });
            }

            tracing::warn!(
                "Outbound leg {} to {} was not pre-registered, registering now",
                call.call_sid,
                call.to_number
            );
        }

        let registered = self
            .agents
            .register_phone_call(&RegisterPhoneCall {
                agent_id: self.config.agents.agent_for(direction).to_string(),
                from_number: call.from_number.clone(),
                to_number: call.to_number.clone(),
                direction,
                retell_llm_dynamic_variables: call.dynamic_variables.clone(),
            })
            .await?;

        let key = direction.correlation_key(&call.from_number, &call.to_number);
        self.store
            .put(CallCorrelation::new(key, &call.call_sid, &registered.call_id, direction))
            .await;
        tracing::debug!("{} calls tracked", self.store.len().await);

        tracing::info!(
            "Registered {} call {} as Retell session {}",
            direction,
            call.call_sid,
            registered.call_id
        );

        Ok(Handoff {
            direction,
            sip_uri: self.config.sip_uri(&registered.call_id),
            agent_session_id: registered.call_id,
            reused: false,
        })
    }

    /// TwiML for the voice webhook
    ///
    /// Always a valid document: a SIP bridge on success, a spoken apology
    /// otherwise, so Twilio never drops the call on a failed handoff.
    pub async fn answer(&self, call: &IncomingCall) -> String {
        match self.handoff(call).await {
            Ok(handoff) => {
                tracing::info!("Dialing SIP endpoint: {}", handoff.sip_uri);
                VoiceResponse::bridge_to_sip(&handoff.sip_uri)
            }
            Err(e) => {
                tracing::error!("Handoff failed for call {}: {}", call.call_sid, e);
                VoiceResponse::connect_error()
            }
        }
    }

    /// Place an outbound call and pre-register it with Retell
    pub async fn initiate_outbound_call(
        &self,
        request: OutboundCallRequest,
    ) -> Result<CarrierCall, HandoffError> {
        if request.to_number.trim().is_empty() {
            return Err(HandoffError::MissingField("to_number"));
        }

        let from_number = request
            .from_number
            .clone()
            .unwrap_or_else(|| self.config.phone_number.clone());
        let agent_id = request
            .agent_id
            .clone()
            .unwrap_or_else(|| self.config.agents.agent_for(CallDirection::Outbound).to_string());

        let create = CreateCallRequest {
            to: request.to_number.clone(),
            from: from_number.clone(),
            url: self.voice_webhook_url(&request.dynamic_variables)?,
            status_callback: self.config.callback_url("/call-status"),
            machine_detection: Some(MachineDetection {
                timeout_secs: self.config.machine_detection_timeout,
                status_callback: self.config.callback_url(&format!("/amd-status/{}", agent_id)),
            }),
        };

        let call = self.carrier.create_call(&create).await?;
        tracing::info!("Outbound call {} placed to {}", call.sid, request.to_number);

        let dynamic_variables = if request.dynamic_variables.is_empty() {
            None
        } else {
            Some(request.dynamic_variables.clone())
        };

        let registered = self
            .agents
            .register_phone_call(&RegisterPhoneCall {
                agent_id,
                from_number,
                to_number: request.to_number.clone(),
                direction: CallDirection::Outbound,
                retell_llm_dynamic_variables: dynamic_variables,
            })
            .await?;

        self.store
            .put(CallCorrelation::new(
                &request.to_number,
                &call.sid,
                &registered.call_id,
                CallDirection::Outbound,
            ))
            .await;
        tracing::debug!("{} calls tracked", self.store.len().await);

        tracing::info!(
            "Outbound call {} pre-registered as Retell session {}",
            call.sid,
            registered.call_id
        );

        Ok(call)
    }

    /// Redirect a live call to the line behind a transfer function
    pub async fn run_function(
        &self,
        invocation: &FunctionInvocation,
    ) -> Result<TransferOutcome, HandoffError> {
        let correlation = self
            .store
            .get(&invocation.from_number)
            .await
            .ok_or_else(|| HandoffError::CallNotFound {
                from_number: invocation.from_number.clone(),
            })?;

        if let Some(session) = &invocation.agent_session_id {
            if *session != correlation.agent_session_id {
                tracing::warn!(
                    "Function call from session {} matched record for session {} on {}",
                    session,
                    correlation.agent_session_id,
                    invocation.from_number
                );
            }
        }

        let target = self
            .config
            .transfers
            .resolve(&invocation.function_name)
            .ok_or_else(|| HandoffError::UnknownFunction(invocation.function_name.clone()))?;

        let twiml = VoiceResponse::new()
            .dial_number(&target.number, Some(invocation.from_number.as_str()))
            .build();

        self.carrier
            .update_call(&correlation.carrier_call_id, &twiml)
            .await?;

        tracing::info!(
            "Transferred call {} to {} via {}",
            correlation.carrier_call_id,
            target.number,
            target.function_name
        );

        Ok(TransferOutcome {
            transfer_number: target.number,
            original_call_sid: correlation.carrier_call_id,
            function_name: target.function_name,
        })
    }

    /// `/new-call` URL carrying dynamic variables as a query string
    fn voice_webhook_url(&self, variables: &DynamicVariables) -> Result<String, HandoffError> {
        let base = self.config.callback_url("/new-call");
        let url = if variables.is_empty() {
            Url::parse(&base)
        } else {
            let mut pairs: Vec<_> = variables.iter().collect();
            pairs.sort();
            Url::parse_with_params(&base, pairs)
        };

        url.map(String::from)
            .map_err(|e| HandoffError::CallbackUrl(e.to_string()))
    }
}
