//! HAP accessory server
//!
//! One tokio task per controller connection. Requests are routed through a
//! fixed dispatch table; Pair-Verify switches the connection to encrypted
//! framing, after which the accessory may also push `EVENT/1.0` frames.

#![allow(missing_docs)]

pub mod accessory;
pub mod characteristics;
pub mod config;
pub mod connection;
pub mod context;
pub mod encrypted_channel;
pub mod events;
pub mod pairing_handlers;
pub mod request_handler;
pub mod request_router;
#[allow(clippy::module_inception)]
pub mod server;
pub mod status;


pub use accessory::{
    Access, AccessoryGraph, CharacteristicId, CharacteristicInfo, CharacteristicMeta, Perm,
    RequestContext, ResourceRequest,
};
pub use config::{ConfigError, HapServerConfig};
pub use connection::{ConnectionId, HapConnection, SessionState};
pub use context::ServerContext;
pub use encrypted_channel::{EncryptedChannel, EncryptionError};
pub use events::{EventNotifier, ServerEvent};
pub use server::HapServer;
pub use status::{CharacteristicError, HapStatus, StatusBody};
