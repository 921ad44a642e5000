use crate::slack::{constant_time_eq, verify_signature};
use crate::types::SlackEvent;
use axum::http::{header, HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

/// Rejections that end a request before extraction. Everything past the gate
/// is acknowledged with `200 OK`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GateError {
    #[error("Method Not Allowed")]
    MethodNotAllowed,
    #[error("Invalid JSON or empty payload.")]
    InvalidPayload,
    #[error("Unauthorized - invalid Slack token")]
    Unauthorized,
}

impl GateError {
    pub fn status(&self) -> StatusCode {
        match self {
            GateError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            GateError::InvalidPayload => StatusCode::BAD_REQUEST,
            GateError::Unauthorized => StatusCode::UNAUTHORIZED,
        }
    }
}

impl IntoResponse for GateError {
    fn into_response(self) -> Response {
        let mut response = (self.status(), self.to_string()).into_response();
        if self == GateError::MethodNotAllowed {
            response
                .headers_mut()
                .insert(header::ALLOW, header::HeaderValue::from_static("POST"));
        }
        response
    }
}

/// Optional authentication checks, each enabled by configuring its secret.
#[derive(Debug, Clone, Default)]
pub struct InboundAuth {
    /// Legacy outgoing-webhook token, compared against the payload `token` field.
    pub token: Option<String>,
    /// Slack app signing secret, checked against `X-Slack-Signature`.
    pub signing_secret: Option<String>,
}

impl InboundAuth {
    fn check(
        &self,
        payload: &Map<String, Value>,
        headers: &HeaderMap,
        body: &[u8],
    ) -> Result<(), GateError> {
        if let Some(expected) = &self.token {
            let received = payload
                .get("token")
                .and_then(Value::as_str)
                .unwrap_or_default();
            if !constant_time_eq(received.as_bytes(), expected.as_bytes()) {
                warn!("Rejecting event: token mismatch");
                return Err(GateError::Unauthorized);
            }
        }

        if let Some(secret) = &self.signing_secret {
            let timestamp = header_str(headers, "X-Slack-Request-Timestamp");
            let signature = header_str(headers, "X-Slack-Signature");
            let (Some(timestamp), Some(signature)) = (timestamp, signature) else {
                warn!("Rejecting event: missing signature headers");
                return Err(GateError::Unauthorized);
            };
            verify_signature(secret, timestamp, signature, body).map_err(|e| {
                warn!("Rejecting event: signature verification failed: {}", e);
                GateError::Unauthorized
            })?;
        }

        Ok(())
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|h| h.to_str().ok())
}

/// What the gate lets through.
#[derive(Debug)]
pub enum Admitted {
    /// URL-verification handshake; the value is echoed back untouched.
    Challenge(Value),
    /// An authenticated callback. `None` when the payload carried no usable
    /// `event` object.
    Event(Option<SlackEvent>),
}

pub fn admit(
    auth: &InboundAuth,
    method: &Method,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<Admitted, GateError> {
    if *method != Method::POST {
        warn!("Rejecting {} request", method);
        return Err(GateError::MethodNotAllowed);
    }

    let payload: Value = serde_json::from_slice(body).map_err(|e| {
        warn!("Failed to parse Slack payload: {}", e);
        GateError::InvalidPayload
    })?;
    let Value::Object(payload) = payload else {
        warn!("Slack payload is not a JSON object");
        return Err(GateError::InvalidPayload);
    };
    if payload.is_empty() {
        warn!("Slack payload is empty");
        return Err(GateError::InvalidPayload);
    }

    // Handshake is answered before any authentication
    if let Some(challenge) = payload.get("challenge").filter(|c| !c.is_null()) {
        debug!("Answering URL verification challenge");
        return Ok(Admitted::Challenge(challenge.clone()));
    }

    auth.check(&payload, headers, body)?;

    let event = payload
        .get("event")
        .and_then(|event| match SlackEvent::deserialize(event) {
            Ok(event) => Some(event),
            Err(e) => {
                debug!("Ignoring undecodable event: {}", e);
                None
            }
        });

    Ok(Admitted::Event(event))
}
