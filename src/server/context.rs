//! State shared by every connection of one server

use super::accessory::AccessoryGraph;
use super::config::HapServerConfig;
use super::connection::{ConnectionId, HapConnection};
use super::events::EventNotifier;
use crate::protocol::pairing::{AccessoryIdentity, PairingStorage};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{Mutex, RwLock};

/// Shared server state
pub struct ServerContext {
    pub config: HapServerConfig,
    pub identity: AccessoryIdentity,
    pub store: RwLock<Box<dyn PairingStorage>>,
    pub graph: Arc<dyn AccessoryGraph>,
    pub notifier: EventNotifier,
    failed_attempts: AtomicUsize,
    setup_owner: Mutex<Option<ConnectionId>>,
}

impl ServerContext {
    #[must_use]
    pub fn new(
        config: HapServerConfig,
        identity: AccessoryIdentity,
        store: Box<dyn PairingStorage>,
        graph: Arc<dyn AccessoryGraph>,
    ) -> Self {
        let notifier = EventNotifier::new(config.event_capacity);
        Self {
            config,
            identity,
            store: RwLock::new(store),
            graph,
            notifier,
            failed_attempts: AtomicUsize::new(0),
            setup_owner: Mutex::new(None),
        }
    }

    /// Count one failed Pair-Setup proof, returning the new total
    pub fn record_failed_attempt(&self) -> usize {
        self.failed_attempts.fetch_add(1, Ordering::SeqCst) + 1
    }

    #[must_use]
    pub fn failed_attempts(&self) -> usize {
        self.failed_attempts.load(Ordering::SeqCst)
    }

    /// Whether Pair-Setup is locked until restart
    #[must_use]
    pub fn too_many_attempts(&self) -> bool {
        self.failed_attempts() > self.config.max_failed_attempts
    }

    /// Claim the Pair-Setup slot for `connection`
    ///
    /// Returns `false` if another connection holds it.
    pub async fn claim_setup(&self, connection: ConnectionId) -> bool {
        let mut owner = self.setup_owner.lock().await;
        match *owner {
            Some(current) if current != connection => false,
            _ => {
                *owner = Some(connection);
                true
            }
        }
    }

    /// Release the Pair-Setup slot if `connection` holds it
    pub async fn release_setup(&self, connection: ConnectionId) {
        let mut owner = self.setup_owner.lock().await;
        if *owner == Some(connection) {
            *owner = None;
        }
    }

    /// Whether any controller is paired
    pub async fn is_paired(&self) -> bool {
        self.store.read().await.is_paired().await
    }

    /// Whether `username` is a paired admin
    pub async fn is_admin(&self, username: &str) -> bool {
        self.store.read().await.is_admin(username).await
    }

    /// Whether `conn` is authenticated as a controller no longer in the store
    pub async fn pairing_revoked(&self, conn: &HapConnection) -> bool {
        match conn.username() {
            Some(username) => self.store.read().await.load(username).await.is_none(),
            None => false,
        }
    }
}
