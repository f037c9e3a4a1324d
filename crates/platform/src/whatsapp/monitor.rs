//! Background poller for the gateway's connection status.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use super::client::{GatewayStatus, WhatsAppClient};

/// Latest poll result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MonitorSnapshot {
    pub status: GatewayStatus,
    /// Error text of the last failed poll; cleared by the next success.
    pub error: Option<String>,
    pub checked_at: Option<DateTime<Utc>>,
}

impl MonitorSnapshot {
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.status.connected && self.error.is_none()
    }
}

/// Polls `GET /status` on a fixed interval and keeps the latest answer.
///
/// One monitor per process; the poll task is aborted when the last clone
/// of the monitor is dropped.
#[derive(Debug, Clone)]
pub struct StatusMonitor {
    receiver: watch::Receiver<MonitorSnapshot>,
    task: std::sync::Arc<AbortOnDrop>,
}

#[derive(Debug)]
struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

impl StatusMonitor {
    #[must_use]
    pub fn spawn(client: WhatsAppClient, interval: Duration) -> Self {
        let (sender, receiver) = watch::channel(MonitorSnapshot::default());
        let handle = tokio::spawn(poll(client, interval, sender));
        Self {
            receiver,
            task: std::sync::Arc::new(AbortOnDrop(handle)),
        }
    }

    #[must_use]
    pub fn latest(&self) -> MonitorSnapshot {
        self.receiver.borrow().clone()
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.receiver.borrow().is_connected()
    }

    /// Receiver that wakes on every change, e.g. for a status SSE stream.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<MonitorSnapshot> {
        self.receiver.clone()
    }
}

async fn poll(client: WhatsAppClient, period: Duration, sender: watch::Sender<MonitorSnapshot>) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let snapshot = match client.status().await {
            Ok(status) => MonitorSnapshot {
                status,
                error: None,
                checked_at: Some(Utc::now()),
            },
            Err(e) => MonitorSnapshot {
                status: GatewayStatus::default(),
                error: Some(e.to_string()),
                checked_at: Some(Utc::now()),
            },
        };

        let was_connected = sender.borrow().is_connected();
        if snapshot.is_connected() != was_connected {
            if snapshot.is_connected() {
                info!(phone = ?snapshot.status.phone, "WhatsApp gateway connected");
            } else {
                warn!(error = ?snapshot.error, "WhatsApp gateway disconnected");
            }
        }

        sender.send_if_modified(|current| {
            // Only wake subscribers when something other than the timestamp changed.
            let changed = current.status != snapshot.status || current.error != snapshot.error;
            *current = snapshot;
            changed
        });
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::whatsapp::client::tests::client_for;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_publishes_connected_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "connected": true,
                "phone": "6281234567890",
                "state": "open"
            })))
            .mount(&server)
            .await;

        let monitor = StatusMonitor::spawn(client_for(&server), Duration::from_secs(60));
        let mut updates = monitor.subscribe();
        updates.changed().await.unwrap();

        assert!(monitor.is_connected());
        assert_eq!(monitor.latest().status.state.as_deref(), Some("open"));
    }

    #[tokio::test]
    async fn test_gateway_failure_reads_as_disconnected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/status"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let monitor = StatusMonitor::spawn(client_for(&server), Duration::from_secs(60));
        let mut updates = monitor.subscribe();
        updates.changed().await.unwrap();

        let snapshot = monitor.latest();
        assert!(!snapshot.is_connected());
        assert!(snapshot.error.is_some());
        assert!(snapshot.checked_at.is_some());
    }
}
