//! # hap-server
//!
//! The accessory side of the `HomeKit` Accessory Protocol over IP.
//!
//! ## Features
//!
//! - Pair-Setup (SRP-6a over the setup code) and Pair-Verify
//! - Encrypted per-connection transport (ChaCha20-Poly1305 framing)
//! - Pairing management: add, remove and list controllers
//! - Characteristic reads, writes, timed writes and event subscriptions
//! - `EVENT/1.0` notifications pushed to subscribed controllers
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use hap_server::prelude::*;
//!
//! # async fn example(graph: Arc<dyn AccessoryGraph>) -> Result<(), HapError> {
//! let config = HapServerConfig::new("Lamp").with_pincode("031-45-154");
//! let identity = AccessoryIdentity::generate(config.username.clone());
//! let mut server = HapServer::new(config, identity, Box::new(MemoryStorage::new()), graph)?;
//!
//! let addr = server.start().await?;
//! println!("listening on {addr}");
//!
//! // Push a value change to every subscribed controller
//! server.notifier().notify_change(CharacteristicId::new(1, 10), serde_json::json!(true), None);
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - **Server**: `HapServer` - listener, connection loop and request routing
//! - **Accessory seam**: `AccessoryGraph` - implemented by the application
//! - **Protocol**: TLV8, pairing engines, HTTP framing and crypto primitives

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Error types
pub mod error;
pub mod protocol;
pub mod server;

/// Testing utilities
pub mod testing;

pub use error::HapError;
pub use protocol::pairing::{
    AccessoryIdentity, FileStorage, MemoryStorage, PairedController, PairingStorage, Permission,
};
pub use server::{
    AccessoryGraph, CharacteristicError, CharacteristicId, CharacteristicInfo, EventNotifier,
    HapServer, HapServerConfig, HapStatus, RequestContext,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude for common imports
///
/// Convenient re-exports
pub mod prelude {
    pub use crate::{
        AccessoryGraph, AccessoryIdentity, CharacteristicError, CharacteristicId,
        CharacteristicInfo, HapError, HapServer, HapServerConfig, HapStatus, MemoryStorage,
        PairingStorage, RequestContext,
    };
}
