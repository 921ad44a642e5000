use crate::types::{AlertRecord, AlertStatus, SlackEvent};
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

// Grafana renders each affected host as "SERVER = <host> <detail>"
static SERVER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)server\s*=\s*").expect("Invalid server regex"));

/// Turns Grafana alert messages posted to Slack into [`AlertRecord`]s.
///
/// Holds only read-only configuration, so one instance is shared by every
/// request.
#[derive(Debug, Clone)]
pub struct AlertExtractor {
    channel_id: String,
    marker: String,
    tenant_regex: Regex,
}

impl AlertExtractor {
    pub fn new(channel_id: String, marker: &str, tenant: &str) -> Result<Self, regex::Error> {
        let tenant_pattern = tenant
            .split_whitespace()
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(r"\s+");
        let tenant_regex = Regex::new(&format!(r"(?i)tenant\s*=\s*{}", tenant_pattern))?;

        Ok(Self {
            channel_id,
            marker: marker.to_lowercase(),
            tenant_regex,
        })
    }

    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    /// Returns `None` for anything that is not an actionable alert for the
    /// configured channel and tenant.
    pub fn extract(&self, event: Option<&SlackEvent>) -> Option<AlertRecord> {
        let Some(event) = event else {
            debug!("Payload has no event, ignoring");
            return None;
        };

        let channel = event.channel.as_deref().unwrap_or_default();
        if channel != self.channel_id {
            debug!("Ignoring message from channel {:?}", channel);
            return None;
        }

        let text = event.text.as_deref().unwrap_or_default();
        if !text.to_lowercase().contains(&self.marker) {
            debug!("Message does not mention {:?}, ignoring", self.marker);
            return None;
        }

        let status = event
            .first_attachment_color()
            .and_then(AlertStatus::from_color);
        let Some(status) = status else {
            debug!("No recognized attachment color, ignoring");
            return None;
        };

        let lines: Vec<&str> = text
            .split('\n')
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect();

        // The tenant line gates the whole message, not the block it appears in
        if !lines.iter().any(|line| self.tenant_regex.is_match(line)) {
            debug!("Tenant line not found, ignoring");
            return None;
        }

        let servers = lines
            .iter()
            .filter(|line| SERVER_REGEX.is_match(line))
            .map(|line| SERVER_REGEX.replace_all(line, "").trim().to_string())
            .collect();

        Some(AlertRecord { status, servers })
    }
}
