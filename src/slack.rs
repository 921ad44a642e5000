use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

pub const DEFAULT_API_BASE: &str = "https://slack.com/api";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum accepted clock skew for signed requests, in seconds.
const SIGNATURE_MAX_AGE_SECS: u64 = 300;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("invalid timestamp")]
    InvalidTimestamp,
    #[error("timestamp outside the accepted window")]
    Stale,
    #[error("signature mismatch")]
    Mismatch,
    #[error("invalid signing key")]
    InvalidKey,
}

/// Verifies a Slack request signature (`v0=` HMAC-SHA256 over
/// `v0:{timestamp}:{body}`).
pub fn verify_signature(
    signing_secret: &str,
    timestamp: &str,
    signature: &str,
    raw_body: &[u8],
) -> Result<(), SignatureError> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    verify_signature_at(signing_secret, timestamp, signature, raw_body, now)
}

fn verify_signature_at(
    signing_secret: &str,
    timestamp: &str,
    signature: &str,
    raw_body: &[u8],
    now: u64,
) -> Result<(), SignatureError> {
    let ts: u64 = timestamp
        .parse()
        .map_err(|_| SignatureError::InvalidTimestamp)?;

    if now.abs_diff(ts) > SIGNATURE_MAX_AGE_SECS {
        return Err(SignatureError::Stale);
    }

    let computed = sign(signing_secret, ts, raw_body)?;
    if !constant_time_eq(signature.as_bytes(), computed.as_bytes()) {
        return Err(SignatureError::Mismatch);
    }

    Ok(())
}

fn sign(signing_secret: &str, ts: u64, raw_body: &[u8]) -> Result<String, SignatureError> {
    let mut mac = HmacSha256::new_from_slice(signing_secret.as_bytes())
        .map_err(|_| SignatureError::InvalidKey)?;
    mac.update(format!("v0:{}:", ts).as_bytes());
    mac.update(raw_body);
    Ok(format!("v0={}", hex::encode(mac.finalize().into_bytes())))
}

pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Minimal Slack Web API client, used once at startup to turn a channel name
/// into the channel identifier events carry.
pub struct SlackWebClient {
    bot_token: String,
    api_base: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct ConversationsListResponse {
    channels: Vec<Channel>,
    response_metadata: Option<ResponseMetadata>,
}

#[derive(Debug, Deserialize)]
struct Channel {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct ResponseMetadata {
    next_cursor: Option<String>,
}

impl SlackWebClient {
    pub fn new(bot_token: String, api_base: String) -> Self {
        Self {
            bot_token,
            api_base: api_base.trim_end_matches('/').to_string(),
            client: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_default(),
        }
    }

    pub async fn resolve_channel_id_by_name(
        &self,
        channel_name: &str,
    ) -> Result<Option<String>, String> {
        let url = format!("{}/conversations.list", self.api_base);
        let channel_name = channel_name.trim_start_matches('#');
        let mut cursor: Option<String> = None;
        let max_pages = 5;

        for _ in 0..max_pages {
            let mut params = vec![
                ("limit", "200"),
                ("types", "public_channel,private_channel"),
            ];
            if let Some(ref c) = cursor {
                params.push(("cursor", c));
            }

            let raw: serde_json::Value = self
                .client
                .get(&url)
                .header("Authorization", format!("Bearer {}", self.bot_token))
                .query(&params)
                .send()
                .await
                .map_err(|e| format!("Request failed: {}", e))?
                .json()
                .await
                .map_err(|e| format!("Parse failed: {}", e))?;

            if !raw.get("ok").and_then(|v| v.as_bool()).unwrap_or(false) {
                let error_msg = raw
                    .get("error")
                    .and_then(|e| e.as_str())
                    .unwrap_or("Unknown error");
                let mut details = format!("Slack API error: {}", error_msg);
                if error_msg == "missing_scope" {
                    if let Some(needed) = raw.get("needed") {
                        details.push_str(&format!(" (needed: {})", needed));
                    }
                }
                return Err(details);
            }

            let response: ConversationsListResponse = serde_json::from_value(raw)
                .map_err(|e| format!("Failed to parse response: {}", e))?;

            if let Some(channel) = response.channels.iter().find(|c| c.name == channel_name) {
                return Ok(Some(channel.id.clone()));
            }

            cursor = response
                .response_metadata
                .and_then(|m| m.next_cursor)
                .filter(|c| !c.is_empty());
            if cursor.is_none() {
                break;
            }
        }

        Ok(None)
    }
}
