//! In-process fakes for the Twilio and Retell APIs

use std::sync::Mutex;

use super::config::{AgentRoster, RelayConfig};
use super::retell::{RegisterPhoneCall, RegisteredCall, RetellError, VoiceAgentApi};
use super::transfer::TransferDirectory;
use super::twilio::{CarrierApi, CarrierCall, CreateCallRequest, TwilioError};

pub fn test_config() -> RelayConfig {
    RelayConfig {
        retell_api_key: "key_test".to_string(),
        retell_api_url: "http://retell.invalid".to_string(),
        agents: AgentRoster {
            inbound: "agent_inbound".to_string(),
            outbound: "agent_outbound".to_string(),
        },
        twilio_account_sid: "AC_test".to_string(),
        twilio_auth_token: "token_test".to_string(),
        twilio_api_url: "http://twilio.invalid".to_string(),
        sip_domain: "sip.retellai.com".to_string(),
        phone_number: "+15550000000".to_string(),
        base_url: "https://relay.example.com".to_string(),
        port: 5000,
        transfers: TransferDirectory::new()
            .with_route("transfer_to_sales", "+15550001111")
            .with_route("transfer_to_support", "+15550002222"),
        machine_detection_timeout: 30,
    }
}

/// Records every carrier request; hands out `CA_fake_{n}` sids
pub struct FakeCarrier {
    fail: bool,
    created: Mutex<Vec<CreateCallRequest>>,
    updates: Mutex<Vec<(String, String)>>,
}

impl FakeCarrier {
    pub fn new() -> Self {
        Self {
            fail: false,
            created: Mutex::new(Vec::new()),
            updates: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub fn created_calls(&self) -> Vec<CreateCallRequest> {
        self.created.lock().unwrap().clone()
    }

    /// `(call_sid, twiml)` pairs sent as live call updates
    pub fn updates(&self) -> Vec<(String, String)> {
        self.updates.lock().unwrap().clone()
    }

    fn api_error() -> TwilioError {
        TwilioError::Api {
            status: 503,
            message: "carrier unavailable".to_string(),
        }
    }
}

#[async_trait::async_trait]
impl CarrierApi for FakeCarrier {
    async fn create_call(&self, request: &CreateCallRequest) -> Result<CarrierCall, TwilioError> {
        let mut created = self.created.lock().unwrap();
        created.push(request.clone());
        if self.fail {
            return Err(Self::api_error());
        }
        Ok(CarrierCall {
            sid: format!("CA_fake_{}", created.len()),
            status: Some("queued".to_string()),
            to: Some(request.to.clone()),
            from: Some(request.from.clone()),
        })
    }

    async fn update_call(&self, call_sid: &str, twiml: &str) -> Result<CarrierCall, TwilioError> {
        self.updates
            .lock()
            .unwrap()
            .push((call_sid.to_string(), twiml.to_string()));
        if self.fail {
            return Err(Self::api_error());
        }
        Ok(CarrierCall {
            sid: call_sid.to_string(),
            status: Some("in-progress".to_string()),
            to: None,
            from: None,
        })
    }
}

/// Records every registration; hands out `retell_call_{n}` session ids
pub struct FakeVoiceAgent {
    fail: bool,
    registrations: Mutex<Vec<RegisterPhoneCall>>,
}

impl FakeVoiceAgent {
    pub fn new() -> Self {
        Self {
            fail: false,
            registrations: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    /// Successful registrations only
    pub fn registrations(&self) -> Vec<RegisterPhoneCall> {
        self.registrations.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl VoiceAgentApi for FakeVoiceAgent {
    async fn register_phone_call(&self, request: &RegisterPhoneCall) -> Result<RegisteredCall, RetellError> {
        if self.fail {
            return Err(RetellError::Api {
                status: 500,
                message: "agent platform unavailable".to_string(),
            });
        }

        let mut registrations = self.registrations.lock().unwrap();
        registrations.push(request.clone());
        Ok(RegisteredCall {
            call_id: format!("retell_call_{}", registrations.len()),
            agent_id: Some(request.agent_id.clone()),
            call_status: Some("registered".to_string()),
        })
    }
}
