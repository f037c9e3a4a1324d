//! WhatsApp gateway errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WhatsAppError {
    /// HTTP request failed (gateway down, DNS, timeout).
    #[error("WhatsApp gateway request failed: {0}")]
    Request(String),

    /// The gateway answered with something we could not parse.
    #[error("WhatsApp gateway response error: {0}")]
    Response(String),

    /// The gateway answered with a non-2xx status.
    #[error("WhatsApp gateway error ({status}): {message}")]
    Api { status: u16, message: String },

    /// No QR code because the session is already paired.
    #[error("WhatsApp is already connected")]
    AlreadyConnected,

    #[error("WhatsApp configuration error: {0}")]
    Config(String),
}
