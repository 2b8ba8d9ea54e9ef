//! Testing utilities
//!
//! A scripted controller plus helpers for standing up a server on an
//! ephemeral port with in-memory state.

pub mod mock_controller;

pub use mock_controller::{
    AccessoryPairing, ControllerIdentity, MockController, SetupExchange, VerifyExchange,
    encode_request,
};

use crate::protocol::pairing::{AccessoryIdentity, MemoryStorage};
use crate::server::{AccessoryGraph, HapServer, HapServerConfig};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

/// Setup code used by [`test_config`]
pub const TEST_PINCODE: &str = "031-45-154";

/// Accessory identifier used by [`test_config`]
pub const TEST_USERNAME: &str = "AA:BB:CC:DD:EE:FF";

/// Config bound to `127.0.0.1` on an ephemeral port
#[must_use]
pub fn test_config() -> HapServerConfig {
    HapServerConfig::new("Test Accessory")
        .with_username(TEST_USERNAME)
        .with_pincode(TEST_PINCODE)
        .with_bind_address(IpAddr::V4(Ipv4Addr::LOCALHOST))
        .with_port(0)
}

/// Start a server for `graph` with in-memory pairings
///
/// # Errors
/// Returns error if the config is invalid or the port cannot be bound.
pub async fn start_test_server(
    config: HapServerConfig,
    graph: Arc<dyn AccessoryGraph>,
) -> crate::error::Result<(HapServer, SocketAddr)> {
    let identity = AccessoryIdentity::generate(config.username.clone());
    let mut server = HapServer::new(config, identity, Box::new(MemoryStorage::new()), graph)?;
    let addr = server.start().await?;
    Ok((server, addr))
}
