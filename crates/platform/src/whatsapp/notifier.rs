//! Fire-and-forget order notifications.
//!
//! Checkout and the back office call the notifier after the database
//! write has committed. Sending happens on a spawned task so a slow or
//! broken gateway never holds up the request; failures end up in the log.

use sqlx::PgPool;
use tracing::{Instrument, debug, info_span, warn};

use brewline_core::PhoneNumber;
use brewline_core::order::{Order, OrderItem};
use brewline_core::settings::StoreSettings;

use super::client::WhatsAppClient;
use super::messages;
use super::monitor::StatusMonitor;
use crate::db::SettingsRepository;

/// What happened to the order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderEvent {
    Placed,
    StatusChanged,
}

/// One message to deliver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outgoing {
    pub phone: PhoneNumber,
    pub text: String,
}

/// Decide which messages an event produces. Empty when notifications are
/// off, the gateway is down, or nobody has a usable number.
#[must_use]
pub fn plan(
    settings: &StoreSettings,
    gateway_connected: bool,
    event: OrderEvent,
    order: &Order,
    items: &[OrderItem],
) -> Vec<Outgoing> {
    if !settings.whatsapp_notifications || !gateway_connected {
        return Vec::new();
    }

    let mut outgoing = Vec::new();
    let customer = order
        .customer_phone
        .as_deref()
        .and_then(|p| PhoneNumber::parse(p).ok());

    let customer_text = match event {
        OrderEvent::Placed => Some(messages::order_received(order, &settings.store_name)),
        OrderEvent::StatusChanged => messages::status_update(order, &settings.store_name),
    };
    if let (Some(phone), Some(text)) = (customer, customer_text) {
        outgoing.push(Outgoing { phone, text });
    }

    if event == OrderEvent::Placed
        && let Some(phone) = settings.admin_whatsapp.clone()
    {
        outgoing.push(Outgoing {
            phone,
            text: messages::new_order_alert(order, items),
        });
    }
    outgoing
}

/// Sends order notifications when a gateway is configured.
#[derive(Debug, Clone)]
pub struct OrderNotifier {
    pool: PgPool,
    gateway: Option<Gateway>,
}

#[derive(Debug, Clone)]
struct Gateway {
    client: WhatsAppClient,
    monitor: Option<StatusMonitor>,
}

impl OrderNotifier {
    /// A notifier that never sends, for deployments without a gateway.
    #[must_use]
    pub const fn disabled(pool: PgPool) -> Self {
        Self {
            pool,
            gateway: None,
        }
    }

    /// Without a monitor the gateway is assumed to be up and a failed send
    /// is simply logged.
    #[must_use]
    pub const fn new(pool: PgPool, client: WhatsAppClient, monitor: Option<StatusMonitor>) -> Self {
        Self {
            pool,
            gateway: Some(Gateway { client, monitor }),
        }
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.gateway.is_some()
    }

    /// Queue notifications for `order`. Returns immediately.
    pub fn notify(&self, event: OrderEvent, order: Order, items: Vec<OrderItem>) {
        let Some(gateway) = self.gateway.clone() else {
            return;
        };
        let pool = self.pool.clone();
        let span = info_span!(
            "order_notification",
            order_id = %order.id,
            event = ?event,
            status = %order.status
        );

        tokio::spawn(
            async move {
                let settings = match SettingsRepository::new(&pool).store().await {
                    Ok(settings) => settings,
                    Err(e) => {
                        warn!(error = %e, "Could not load settings, skipping notification");
                        return;
                    }
                };
                let connected = gateway.monitor.as_ref().is_none_or(StatusMonitor::is_connected);

                let outgoing = plan(&settings, connected, event, &order, &items);
                if outgoing.is_empty() {
                    debug!(
                        enabled = settings.whatsapp_notifications,
                        connected, "No WhatsApp notification to send"
                    );
                    return;
                }

                for message in outgoing {
                    if let Err(e) = gateway.client.send_message(&message.phone, &message.text).await {
                        warn!(phone = %message.phone, error = %e, "WhatsApp notification failed");
                    }
                }
            }
            .instrument(span),
        );
    }
}
