//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;
use thiserror::Error;

use brewline_platform::auth::AuthClient;
use brewline_platform::realtime::ChangeFeed;
use brewline_platform::storage::{StorageClient, StorageError};
use brewline_platform::whatsapp::{OrderNotifier, StatusMonitor, WhatsAppClient, WhatsAppError};

use crate::config::AdminConfig;

/// Failure to build one of the platform clients at startup.
#[derive(Debug, Error)]
pub enum StateError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    WhatsApp(#[from] WhatsAppError),
}

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AdminConfig,
    pool: PgPool,
    auth: AuthClient,
    storage: StorageClient,
    changes: ChangeFeed,
    whatsapp: Option<Gateway>,
    notifier: OrderNotifier,
}

/// Configured gateway plus its status poller.
struct Gateway {
    client: WhatsAppClient,
    monitor: StatusMonitor,
}

impl AppState {
    /// Build the platform clients. With a gateway configured this also
    /// starts the one status poller for the process, so it must run
    /// inside the tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `StateError` if the storage or gateway client cannot be
    /// built (missing service role key, bad URL).
    pub fn new(config: AdminConfig, pool: PgPool, changes: ChangeFeed) -> Result<Self, StateError> {
        let auth = AuthClient::new(&config.platform);
        let storage = StorageClient::new(&config.platform)?;

        let whatsapp = match &config.whatsapp {
            Some(whatsapp) => {
                let client = WhatsAppClient::new(whatsapp)?;
                let monitor = StatusMonitor::spawn(client.clone(), whatsapp.poll_interval);
                Some(Gateway { client, monitor })
            }
            None => None,
        };
        let notifier = match &whatsapp {
            Some(gateway) => OrderNotifier::new(
                pool.clone(),
                gateway.client.clone(),
                Some(gateway.monitor.clone()),
            ),
            None => OrderNotifier::disabled(pool.clone()),
        };

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                auth,
                storage,
                changes,
                whatsapp,
                notifier,
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &AdminConfig {
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

    /// Image storage with the service role key.
    #[must_use]
    pub fn storage(&self) -> &StorageClient {
        &self.inner.storage
    }

    /// Realtime order and catalog changes.
    #[must_use]
    pub fn changes(&self) -> &ChangeFeed {
        &self.inner.changes
    }

    /// `None` when no gateway is configured.
    #[must_use]
    pub fn whatsapp(&self) -> Option<&WhatsAppClient> {
        self.inner.whatsapp.as_ref().map(|g| &g.client)
    }

    #[must_use]
    pub fn whatsapp_monitor(&self) -> Option<&StatusMonitor> {
        self.inner.whatsapp.as_ref().map(|g| &g.monitor)
    }

    #[must_use]
    pub fn notifier(&self) -> &OrderNotifier {
        &self.inner.notifier
    }
}
