//! Server configuration

use rand::Rng;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Setup codes HomeKit rejects as trivial
const TRIVIAL_PINCODES: [&str; 12] = [
    "000-00-000",
    "111-11-111",
    "222-22-222",
    "333-33-333",
    "444-44-444",
    "555-55-555",
    "666-66-666",
    "777-77-777",
    "888-88-888",
    "999-99-999",
    "123-45-678",
    "876-54-321",
];

/// Configuration for a [`HapServer`](super::HapServer)
#[derive(Debug, Clone)]
pub struct HapServerConfig {
    /// Accessory display name
    pub name: String,

    /// Accessory pairing identifier (MAC address format: AA:BB:CC:DD:EE:FF)
    pub username: String,

    /// Setup code, `XXX-XX-XXX`
    pub pincode: String,

    /// Address to bind
    pub bind_address: IpAddr,

    /// TCP port, 0 for an ephemeral port
    pub port: u16,

    /// Skip pairing and session encryption checks
    pub allow_insecure: bool,

    /// Failed Pair-Setup proofs tolerated before refusing until restart
    pub max_failed_attempts: usize,

    /// Maximum number of stored pairings
    pub max_pairings: usize,

    /// Period of the empty keepalive event
    pub keepalive_interval: Duration,

    /// Capacity of the event broadcast channel
    pub event_capacity: usize,
}

impl Default for HapServerConfig {
    fn default() -> Self {
        Self {
            name: "HAP Accessory".to_string(),
            username: Self::generate_username(),
            pincode: "031-45-154".to_string(),
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 51826,
            allow_insecure: false,
            max_failed_attempts: 100,
            max_pairings: 16,
            keepalive_interval: Duration::from_secs(600),
            event_capacity: 256,
        }
    }
}

impl HapServerConfig {
    /// Create a new configuration with the given display name
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    #[must_use]
    pub fn with_pincode(mut self, pincode: impl Into<String>) -> Self {
        self.pincode = pincode.into();
        self
    }

    #[must_use]
    pub fn with_bind_address(mut self, address: IpAddr) -> Self {
        self.bind_address = address;
        self
    }

    /// Set custom server port
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Accept unauthenticated requests on every endpoint
    #[must_use]
    pub fn with_allow_insecure(mut self, allow: bool) -> Self {
        self.allow_insecure = allow;
        self
    }

    #[must_use]
    pub fn with_max_failed_attempts(mut self, attempts: usize) -> Self {
        self.max_failed_attempts = attempts;
        self
    }

    #[must_use]
    pub fn with_max_pairings(mut self, pairings: usize) -> Self {
        self.max_pairings = pairings;
        self
    }

    #[must_use]
    pub fn with_keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive_interval = interval;
        self
    }

    #[must_use]
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Socket address to bind
    #[must_use]
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }

    /// Check the configuration before the server starts
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for a malformed or trivial setup code, a
    /// malformed username or a zero-sized limit.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_valid_pincode(&self.pincode) {
            return Err(ConfigError::InvalidPincode);
        }
        if TRIVIAL_PINCODES.contains(&self.pincode.as_str()) {
            return Err(ConfigError::TrivialPincode);
        }
        if !is_valid_username(&self.username) {
            return Err(ConfigError::InvalidUsername(self.username.clone()));
        }
        if self.max_pairings == 0 {
            return Err(ConfigError::InvalidLimit("max_pairings"));
        }
        if self.event_capacity == 0 {
            return Err(ConfigError::InvalidLimit("event_capacity"));
        }
        if self.keepalive_interval.is_zero() {
            return Err(ConfigError::InvalidLimit("keepalive_interval"));
        }
        Ok(())
    }

    /// Generate a random username in MAC address format
    fn generate_username() -> String {
        let mut rng = rand::thread_rng();
        let bytes: [u8; 6] = rng.r#gen();
        format!(
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5]
        )
    }
}

fn is_valid_pincode(pincode: &str) -> bool {
    let bytes = pincode.as_bytes();
    bytes.len() == 10
        && bytes.iter().enumerate().all(|(i, b)| match i {
            3 | 6 => *b == b'-',
            _ => b.is_ascii_digit(),
        })
}

fn is_valid_username(username: &str) -> bool {
    let parts: Vec<&str> = username.split(':').collect();
    parts.len() == 6
        && parts
            .iter()
            .all(|part| part.len() == 2 && part.chars().all(|c| c.is_ascii_hexdigit()))
}

/// Configuration errors
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("setup code must have the form XXX-XX-XXX")]
    InvalidPincode,

    #[error("setup code is too trivial")]
    TrivialPincode,

    #[error("username {0:?} is not in MAC address format")]
    InvalidUsername(String),

    #[error("{0} must be non-zero")]
    InvalidLimit(&'static str),
}
