use crate::notify::Notifier;
use crate::types::{AlertRecord, AlertStatus, DeliveryResult};
use std::sync::Arc;
use tracing::{error, info};

/// Renders the outbound text: title, threshold line, then one server per line.
pub fn format_alert(record: &AlertRecord) -> String {
    let (title, subtext) = match record.status {
        AlertStatus::Started => ("Agent CPU Throttling Started", "Servers over 85%:"),
        AlertStatus::Resolved => ("Agent CPU Throttling Resolved", "Servers below 85%:"),
    };
    format!("{}\n{}\n{}", title, subtext, record.servers.join("\n"))
}

/// Delivers alert records to a single destination. Delivery failures end here:
/// they are logged and reported in the returned [`DeliveryResult`], never
/// propagated.
#[derive(Clone)]
pub struct Dispatcher {
    notifier: Arc<dyn Notifier>,
    destination: String,
}

impl Dispatcher {
    pub fn new(notifier: Arc<dyn Notifier>, destination: String) -> Self {
        Self {
            notifier,
            destination,
        }
    }

    pub async fn dispatch(&self, record: AlertRecord) -> DeliveryResult {
        let text = format_alert(&record);
        match self.notifier.send(&self.destination, &text).await {
            Ok(()) => {
                info!(
                    notifier = self.notifier.name(),
                    status = ?record.status,
                    servers = record.servers.len(),
                    "Alert forwarded"
                );
                DeliveryResult::delivered()
            }
            Err(e) => {
                error!(
                    notifier = self.notifier.name(),
                    destination = %self.destination,
                    error = %e,
                    "Failed to forward alert"
                );
                DeliveryResult::failed(e.to_string())
            }
        }
    }

    /// Fire-and-forget variant used by the webhook handler.
    pub fn spawn(&self, record: AlertRecord) -> tokio::task::JoinHandle<DeliveryResult> {
        let dispatcher = self.clone();
        tokio::spawn(async move { dispatcher.dispatch(record).await })
    }
}
