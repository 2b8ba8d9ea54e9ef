//! Event fan-out to connected controllers

use super::accessory::CharacteristicId;
use super::connection::ConnectionId;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::{broadcast, watch};

/// Events distributed to every connection task
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    /// A characteristic value changed
    CharacteristicChanged {
        id: CharacteristicId,
        value: Value,
        /// Connection whose write caused the change, which is not notified
        origin: Option<ConnectionId>,
    },
    /// Periodic empty event keeping idle sessions alive
    Keepalive,
    /// A pairing was removed; its sessions must close
    PairingRemoved { username: String },
}

/// Handle for publishing events, cheap to clone
#[derive(Debug, Clone)]
pub struct EventNotifier {
    tx: broadcast::Sender<ServerEvent>,
}

impl EventNotifier {
    /// Create a notifier with the given channel capacity
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Subscribe to events
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.tx.subscribe()
    }

    /// Publish a changed characteristic value
    ///
    /// Only connections subscribed to `id` receive it, never `origin`.
    pub fn notify_change(&self, id: CharacteristicId, value: Value, origin: Option<ConnectionId>) {
        tracing::trace!(%id, "Characteristic changed");
        self.send(ServerEvent::CharacteristicChanged { id, value, origin });
    }

    pub(crate) fn keepalive(&self) {
        self.send(ServerEvent::Keepalive);
    }

    pub(crate) fn pairing_removed(&self, username: &str) {
        self.send(ServerEvent::PairingRemoved {
            username: username.to_string(),
        });
    }

    fn send(&self, event: ServerEvent) {
        // No receivers just means no controller is connected
        let _ = self.tx.send(event);
    }
}

/// One entry of an `EVENT/1.0` body
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventCharacteristic {
    pub aid: u64,
    pub iid: u64,
    pub value: Value,
}

#[derive(Debug, Serialize)]
struct EventBody<'a> {
    characteristics: &'a [EventCharacteristic],
}

/// Encode the JSON body of an event frame
///
/// # Errors
///
/// Returns error if a value fails to serialize
pub fn event_body(changes: &[EventCharacteristic]) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(&EventBody {
        characteristics: changes,
    })
}

/// Emit a keepalive every `interval` until `shutdown` flips
pub(crate) fn spawn_keepalive(
    notifier: EventNotifier,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // First tick completes immediately
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => notifier.keepalive(),
                _ = shutdown.changed() => break,
            }
        }
    })
}
