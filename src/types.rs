use serde::Deserialize;
use serde_json::Value;

/// The `event` object of a Slack Events API callback, reduced to the fields
/// the relay reads. Missing fields default so that partially populated events
/// still reach the relevance filters instead of failing to decode.
#[derive(Debug, Default, Deserialize)]
pub struct SlackEvent {
    pub channel: Option<String>,
    pub text: Option<String>,
    /// Kept untyped: only the first attachment's `color` matters, and a
    /// malformed later attachment must not discard the event.
    #[serde(default)]
    pub attachments: Value,
}

impl SlackEvent {
    pub fn first_attachment_color(&self) -> Option<&str> {
        self.attachments.get(0)?.get("color")?.as_str()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertStatus {
    Started,
    Resolved,
}

impl AlertStatus {
    /// Maps a Grafana attachment color to a status. Only `danger` and `good`
    /// are recognized, case-insensitively.
    pub fn from_color(color: &str) -> Option<Self> {
        match color.to_lowercase().as_str() {
            "danger" => Some(AlertStatus::Started),
            "good" => Some(AlertStatus::Resolved),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertRecord {
    pub status: AlertStatus,
    pub servers: Vec<String>,
}

/// Outcome of one delivery, returned to callers that await
/// [`Dispatcher::dispatch`](crate::dispatch::Dispatcher::dispatch). The
/// webhook handler does not wait for it.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(dead_code)]
pub struct DeliveryResult {
    pub delivered: bool,
    pub error_detail: Option<String>,
}

impl DeliveryResult {
    pub fn delivered() -> Self {
        Self {
            delivered: true,
            error_detail: None,
        }
    }

    pub fn failed(detail: impl Into<String>) -> Self {
        Self {
            delivered: false,
            error_detail: Some(detail.into()),
        }
    }
}
