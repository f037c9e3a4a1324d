//! One-shot flash messages carried across a redirect.
//!
//! Handlers queue a message before redirecting; the next full page render
//! takes the queue and shows each entry as a toast.

use tower_sessions::Session;

use brewline_core::messages::Flash;

use crate::models::session_keys;

/// Queue a flash for the next page.
///
/// A session failure only loses the message, so it is logged and ignored.
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

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use tower_sessions::MemoryStore;

    use super::*;

    #[tokio::test]
    async fn test_flash_is_shown_once() {
        let session = Session::new(None, Arc::new(MemoryStore::default()), None);
        push_flash(&session, Flash::success("Added to cart")).await;
        push_flash(&session, Flash::error("Out of stock")).await;

        let shown = take_flash(&session).await;
        assert_eq!(shown.len(), 2);
        assert_eq!(shown[0].message, "Added to cart");
        assert!(take_flash(&session).await.is_empty());
    }
}
