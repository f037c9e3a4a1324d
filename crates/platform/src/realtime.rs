//! Change feed over Postgres LISTEN/NOTIFY.
//!
//! Triggers installed by the migrations publish a small JSON payload on
//! `order_changes` and `catalog_changes`. One listener task per process
//! forwards them to a broadcast channel; every open page (SSE stream) holds
//! its own receiver and drops it when the client goes away.

use std::time::Duration;

use serde::Deserialize;
use sqlx::PgPool;
use sqlx::postgres::PgListener;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use brewline_core::{FulfillmentType, OrderStatus};

pub const ORDER_CHANNEL: &str = "order_changes";
pub const CATALOG_CHANNEL: &str = "catalog_changes";

const CHANNEL_CAPACITY: usize = 256;
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeOp {
    Insert,
    Update,
    Delete,
}

/// One row change.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChangeEvent {
    pub table: String,
    pub op: ChangeOp,
    /// Primary key as text (`uuid` for orders, integer for catalog rows).
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub status: Option<OrderStatus>,
    #[serde(default)]
    pub fulfillment_type: Option<FulfillmentType>,
    #[serde(default)]
    pub user_id: Option<Uuid>,
}

impl ChangeEvent {
    #[must_use]
    pub fn is_order(&self) -> bool {
        self.table == "orders"
    }

    #[must_use]
    pub fn is_catalog(&self) -> bool {
        !self.is_order()
    }

    /// Whether this is a change to the given order.
    #[must_use]
    pub fn concerns_order(&self, order_id: Uuid) -> bool {
        self.is_order() && self.id.as_deref() == Some(order_id.to_string().as_str())
    }

    /// Parse a notification payload.
    ///
    /// # Errors
    ///
    /// Returns the JSON error for malformed payloads.
    pub fn parse(payload: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(payload)
    }
}

/// Handle to the process-wide change feed.
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    sender: broadcast::Sender<ChangeEvent>,
}

impl ChangeFeed {
    /// Spawn the listener task and return the feed handle.
    #[must_use]
    pub fn start(pool: PgPool) -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        let feed = Self {
            sender: sender.clone(),
        };
        tokio::spawn(listen(pool, sender));
        feed
    }

    /// A feed with no listener behind it; events come only from
    /// [`Self::publish`].
    #[must_use]
    pub fn detached() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.sender.subscribe()
    }

    /// Push an event to local subscribers. Returns how many received it.
    pub fn publish(&self, event: ChangeEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }
}

async fn listen(pool: PgPool, sender: broadcast::Sender<ChangeEvent>) {
    loop {
        match run_listener(&pool, &sender).await {
            Ok(()) => return,
            Err(e) => {
                error!(error = %e, "Change feed listener failed, reconnecting");
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        }
    }
}

/// Runs until the connection fails. `Ok` only when the pool was closed.
async fn run_listener(
    pool: &PgPool,
    sender: &broadcast::Sender<ChangeEvent>,
) -> Result<(), sqlx::Error> {
    let mut listener = PgListener::connect_with(pool).await?;
    listener
        .listen_all([ORDER_CHANNEL, CATALOG_CHANNEL])
        .await?;
    info!("Change feed listening");

    loop {
        let notification = match listener.recv().await {
            Ok(n) => n,
            Err(sqlx::Error::PoolClosed) => return Ok(()),
            Err(e) => return Err(e),
        };
        match ChangeEvent::parse(notification.payload()) {
            Ok(event) => {
                debug!(
                    channel = notification.channel(),
                    table = %event.table,
                    op = ?event.op,
                    "Change received"
                );
                // No subscribers is fine.
                let _ = sender.send(event);
            }
            Err(e) => warn!(
                channel = notification.channel(),
                error = %e,
                "Ignoring malformed change payload"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_order_payload() {
        let id = Uuid::new_v4();
        let payload = format!(
            r#"{{"table":"orders","op":"UPDATE","id":"{id}","status":"ready","fulfillment_type":"delivery","user_id":null}}"#
        );
        let event = ChangeEvent::parse(&payload).expect("parse");

        assert!(event.is_order());
        assert!(event.concerns_order(id));
        assert!(!event.concerns_order(Uuid::new_v4()));
        assert_eq!(event.status, Some(OrderStatus::Ready));
        assert_eq!(event.fulfillment_type, Some(FulfillmentType::Delivery));
        assert_eq!(event.user_id, None);
    }

    #[test]
    fn test_parses_catalog_delete() {
        let event =
            ChangeEvent::parse(r#"{"table":"products","op":"DELETE","id":"12"}"#).expect("parse");
        assert!(event.is_catalog());
        assert_eq!(event.op, ChangeOp::Delete);
        assert_eq!(event.id.as_deref(), Some("12"));
    }

    #[test]
    fn test_rejects_unknown_op() {
        assert!(ChangeEvent::parse(r#"{"table":"orders","op":"TRUNCATE"}"#).is_err());
    }

    #[tokio::test]
    async fn test_each_subscriber_gets_events_until_dropped() {
        let feed = ChangeFeed::detached();
        let mut first = feed.subscribe();
        let second = feed.subscribe();

        let event = ChangeEvent::parse(r#"{"table":"promos","op":"INSERT","id":"3"}"#).expect("parse");
        assert_eq!(feed.publish(event.clone()), 2);
        assert_eq!(first.recv().await.expect("event"), event);

        drop(second);
        assert_eq!(feed.publish(event), 1);
    }

    #[tokio::test]
    async fn test_lagged_subscriber_skips_ahead_to_retained_events() {
        use tokio::sync::broadcast::error::{RecvError, TryRecvError};

        let feed = ChangeFeed::detached();
        let mut slow = feed.subscribe();

        let total = CHANNEL_CAPACITY + 10;
        for id in 0..total {
            let payload = format!(r#"{{"table":"products","op":"UPDATE","id":"{id}"}}"#);
            feed.publish(ChangeEvent::parse(&payload).expect("parse"));
        }

        assert!(matches!(slow.recv().await, Err(RecvError::Lagged(10))));
        assert_eq!(slow.recv().await.expect("event").id.as_deref(), Some("10"));

        let mut last = None;
        while let Ok(event) = slow.try_recv() {
            last = event.id;
        }
        assert_eq!(last, Some((total - 1).to_string()));
        assert!(matches!(slow.try_recv(), Err(TryRecvError::Empty)));
    }
}
