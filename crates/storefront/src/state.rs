//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use brewline_platform::auth::AuthClient;
use brewline_platform::realtime::ChangeFeed;
use brewline_platform::whatsapp::{OrderNotifier, WhatsAppClient, WhatsAppError};

use crate::config::StorefrontConfig;
use crate::services::menu::MenuCache;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: PgPool,
    auth: AuthClient,
    changes: ChangeFeed,
    menu: MenuCache,
    notifier: OrderNotifier,
}

impl AppState {
    /// Build the state and wire the menu cache to the change feed.
    ///
    /// The storefront has no gateway monitor of its own, so a configured
    /// gateway is assumed reachable and send failures are only logged.
    ///
    /// # Errors
    ///
    /// Returns `WhatsAppError::Config` if the gateway client cannot be built.
    pub fn new(
        config: StorefrontConfig,
        pool: PgPool,
        changes: ChangeFeed,
    ) -> Result<Self, WhatsAppError> {
        let auth = AuthClient::new(&config.platform);
        let notifier = match &config.whatsapp {
            Some(whatsapp) => {
                OrderNotifier::new(pool.clone(), WhatsAppClient::new(whatsapp)?, None)
            }
            None => OrderNotifier::disabled(pool.clone()),
        };
        let menu = MenuCache::new();
        menu.spawn_invalidator(&changes);

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                auth,
                changes,
                menu,
                notifier,
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Platform auth API client.
    #[must_use]
    pub fn auth(&self) -> &AuthClient {
        &self.inner.auth
    }

    /// Realtime order and catalog changes.
    #[must_use]
    pub fn changes(&self) -> &ChangeFeed {
        &self.inner.changes
    }

    #[must_use]
    pub fn menu(&self) -> &MenuCache {
        &self.inner.menu
    }

    #[must_use]
    pub fn notifier(&self) -> &OrderNotifier {
        &self.inner.notifier
    }
}
