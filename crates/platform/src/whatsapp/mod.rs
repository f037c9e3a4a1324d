//! WhatsApp gateway integration.
//!
//! This module provides:
//! - [`WhatsAppClient`] for the gateway's HTTP API (status, QR pairing,
//!   login/logout, sending messages)
//! - [`StatusMonitor`] which polls the connection status in the background
//! - [`messages`] with the texts customers and the shop receive
//! - [`OrderNotifier`] which decides who gets what and sends off-request

mod client;
mod error;
pub mod messages;
mod monitor;
mod notifier;

pub use client::{GatewayStatus, QrCode, WhatsAppClient};
pub use error::WhatsAppError;
pub use monitor::{MonitorSnapshot, StatusMonitor};
pub use notifier::{OrderEvent, OrderNotifier, Outgoing, plan};
