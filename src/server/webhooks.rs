//! Twilio and Retell webhook routes

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{
        rejection::{FormRejection, JsonRejection},
        Path, Query, State,
    },
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Form, Json,
};
use serde_json::json;

use super::handoff::{FunctionInvocation, HandoffError, IncomingCall, OutboundCallRequest};
use super::twilio::VoiceResponse;
use super::AppState;
use crate::models::{
    AmdStatusCallback, CallStatusCallback, CreatePhoneCallRequest, CreatePhoneCallResponse,
    ErrorResponse, NewCallWebhook, RunFunctionRequest,
};

fn twiml_response(twiml: String) -> Response {
    (StatusCode::OK, [(header::CONTENT_TYPE, "text/xml")], twiml).into_response()
}

/// POST /new-call
///
/// Twilio voice webhook for inbound calls and for the outbound legs placed
/// by `/create-phonecall`. Dynamic variables ride in the query string.
/// Always answers 200 with TwiML, including for bodies that fail to parse.
pub async fn new_call(
    State(state): State<Arc<AppState>>,
    Query(dynamic_variables): Query<HashMap<String, String>>,
    webhook: Result<Form<NewCallWebhook>, FormRejection>,
) -> Response {
    let webhook = match webhook {
        Ok(Form(webhook)) => webhook,
        Err(rejection) => {
            tracing::error!("new-call: unreadable webhook body: {}", rejection.body_text());
            return twiml_response(VoiceResponse::connect_error());
        }
    };

    tracing::info!(
        "new-call: Call SID: {:?}, From: {:?}, To: {:?}",
        webhook.call_sid,
        webhook.from,
        webhook.to
    );

    let call = match (webhook.call_sid, webhook.from, webhook.to) {
        (Some(call_sid), Some(from_number), Some(to_number)) => IncomingCall {
            call_sid,
            from_number,
            to_number,
            dynamic_variables: if dynamic_variables.is_empty() {
                None
            } else {
                Some(dynamic_variables)
            },
        },
        _ => {
            tracing::error!("new-call: webhook is missing CallSid, From or To");
            return twiml_response(VoiceResponse::connect_error());
        }
    };

    twiml_response(state.relay.answer(&call).await)
}

/// POST /create-phonecall
pub async fn create_phone_call(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreatePhoneCallRequest>,
) -> Response {
    let to_number = match req.to_number.filter(|n| !n.trim().is_empty()) {
        Some(n) => n,
        None => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error: "to_number is required".to_string(),
                }),
            )
                .into_response();
        }
    };

    let request = OutboundCallRequest {
        to_number,
        from_number: req.from_number,
        agent_id: req.agent_id,
        dynamic_variables: req.retell_llm_dynamic_variables.unwrap_or_default(),
    };

    match state.relay.initiate_outbound_call(request).await {
        Ok(call) => Json(CreatePhoneCallResponse {
            success: true,
            call_sid: Some(call.sid),
            error: None,
        })
        .into_response(),
        Err(e) => {
            tracing::error!("create-phonecall: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(CreatePhoneCallResponse {
                    success: false,
                    call_sid: None,
                    error: Some(e.to_string()),
                }),
            )
                .into_response()
        }
    }
}

/// POST /run-function
///
/// Retell custom-function webhook. Results and failures are both returned
/// as JSON bodies so the agent's tool call always gets an answer.
pub async fn run_function(
    State(state): State<Arc<AppState>>,
    req: Result<Json<RunFunctionRequest>, JsonRejection>,
) -> Json<serde_json::Value> {
    let req = match req {
        Ok(Json(req)) => req,
        Err(rejection) => {
            tracing::warn!("run-function: rejected body: {}", rejection.body_text());
            return Json(json!({ "error": rejection.body_text() }));
        }
    };

    tracing::info!(
        "run-function: {} from {:?} (session {:?}, args {})",
        req.name,
        req.call.from_number,
        req.call.call_id,
        req.args
    );

    let Some(from_number) = req.call.from_number else {
        tracing::warn!("run-function: call context has no from_number");
        return Json(json!({ "error": "Call SID not found" }));
    };

    let invocation = FunctionInvocation {
        function_name: req.name,
        from_number,
        agent_session_id: req.call.call_id,
    };

    match state.relay.run_function(&invocation).await {
        Ok(outcome) => Json(json!(outcome)),
        Err(HandoffError::CallNotFound { from_number }) => {
            tracing::warn!("run-function: no call correlated with {}", from_number);
            Json(json!({ "error": "Call SID not found" }))
        }
        Err(e) => {
            tracing::error!("run-function: {}", e);
            Json(json!({ "error": e.to_string() }))
        }
    }
}

/// POST /call-status
pub async fn call_status(Form(status): Form<CallStatusCallback>) -> StatusCode {
    tracing::info!(
        "call-status: Call SID: {:?}, status: {:?}, duration: {:?}s, {:?} -> {:?}",
        status.call_sid,
        status.call_status,
        status.call_duration,
        status.from,
        status.to
    );
    StatusCode::OK
}

/// POST /amd-status/{agent_id}
pub async fn amd_status(
    Path(agent_id): Path<String>,
    Form(amd): Form<AmdStatusCallback>,
) -> StatusCode {
    tracing::info!(
        "amd-status: agent {}, Call SID: {:?}, answered by: {:?} after {:?}ms",
        agent_id,
        amd.call_sid,
        amd.answered_by,
        amd.machine_detection_duration
    );
    StatusCode::OK
}
