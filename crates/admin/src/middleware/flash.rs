//! Flash messages shown once after a redirect.

use tower_sessions::Session;

use brewline_core::messages::Flash;

use crate::models::session_keys;

/// Queue a flash for the next page. A session failure only loses the
/// message.
pub async fn push_flash(session: &Session, flash: Flash) {
    let mut queue: Vec<Flash> = session
        .get(session_keys::FLASH)
        .await
        .ok()
        .flatten()
        .unwrap_or_default();
    queue.push(flash);
    if let Err(e) = session.insert(session_keys::FLASH, queue).await {
        tracing::warn!(error = %e, "Failed to store flash message");
    }
}

/// Take every queued flash, leaving the queue empty.
pub async fn take_flash(session: &Session) -> Vec<Flash> {
    session
        .remove::<Vec<Flash>>(session_keys::FLASH)
        .await
        .ok()
        .flatten()
        .unwrap_or_default()
}
