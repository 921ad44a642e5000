use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The remote API answered but reported a failed send.
    #[error("SendMessage error code: {code} SendMessage description: {description}")]
    Api { code: i64, description: String },

    #[error("Parse failed: {0}")]
    Decode(String),
}

/// Outbound delivery capability. Implementations own their connection and
/// credentials; callers only name a destination and hand over text.
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &'static str;

    async fn send(&self, destination: &str, text: &str) -> Result<(), NotifyError>;
}

/// Dry-run notifier: logs what would have been sent.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn send(&self, destination: &str, text: &str) -> Result<(), NotifyError> {
        info!("[DRY RUN] Would send to {}:\n{}", destination, text);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn log_notifier_always_succeeds() {
        assert!(LogNotifier.send("-100123", "hello").await.is_ok());
    }

    #[test]
    fn api_error_carries_code_and_description() {
        let err = NotifyError::Api {
            code: 400,
            description: "Bad Request: chat not found".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "SendMessage error code: 400 SendMessage description: Bad Request: chat not found"
        );
    }
}
