use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};
use vigil_core::incident::Incident;
use vigil_core::notify::Notifier;

const DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Posts incident open/close messages to a set of webhook URLs. Delivery is
/// best-effort: a failed recipient is logged and skipped, the rest still
/// receive the message.
pub struct WebhookNotifier {
    client: Client,
    webhooks: Vec<String>,
}

impl WebhookNotifier {
    pub fn new(webhooks: Vec<String>) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(DELIVERY_TIMEOUT).build()?;
        Ok(Self { client, webhooks })
    }

    async fn broadcast(&self, message: &str) {
        let payload = serde_json::json!({ "content": message });
        for url in &self.webhooks {
            match self.client.post(url).json(&payload).send().await {
                Ok(_) => debug!(webhook = %url, "notification delivered"),
                Err(e) => warn!(webhook = %url, error = %e, "notification delivery failed"),
            }
        }
    }
}

impl Notifier for WebhookNotifier {
    async fn notify_incident(&self, incident: &Incident) {
        self.broadcast(&format!("Incident opened: {incident}")).await;
    }

    async fn notify_recovery(&self, incident: &Incident) {
        self.broadcast(&format!("Recovered: {incident}")).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_delivery_failure_does_not_propagate() {
        // No listener on port 1: every delivery fails, yet notify returns
        let notifier = WebhookNotifier::new(vec!["http://127.0.0.1:1/hook".to_string()]).unwrap();
        let incident = Incident::open("res1", 500, "");
        notifier.notify_incident(&incident).await;
        notifier.notify_recovery(&incident).await;
    }
}
