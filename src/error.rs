use crate::protocol::crypto::CryptoError;
use crate::protocol::http::ParseError;
use crate::protocol::pairing::{PairingError, StorageError, TlvError};
use crate::server::{CharacteristicError, ConfigError, EncryptionError};
use std::io;
use thiserror::Error;

/// Errors that can occur while running a HAP accessory server
#[derive(Debug, Error)]
pub enum HapError {
    /// Invalid server configuration
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Socket I/O failed
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Pairing handshake failed
    #[error("pairing error: {0}")]
    Pairing(#[from] PairingError),

    /// Pairing store failed
    #[error("pairing store error: {0}")]
    Storage(#[from] StorageError),

    /// Cryptographic primitive failed
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// TLV body could not be decoded
    #[error("TLV error: {0}")]
    Tlv(#[from] TlvError),

    /// HTTP message could not be parsed
    #[error("HTTP parse error: {0}")]
    Http(#[from] ParseError),

    /// Transport encryption failed
    #[error("transport error: {0}")]
    Encryption(#[from] EncryptionError),

    /// Accessory code reported a failure
    #[error("characteristic error: {0}")]
    Characteristic(#[from] CharacteristicError),

    /// JSON body could not be produced or parsed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// `start` called twice
    #[error("server is already running")]
    AlreadyRunning,

    /// Peer closed the connection
    #[error("connection closed")]
    ConnectionClosed,

    /// Peer answered with something unexpected
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}

/// Result type for HAP server operations
pub type Result<T> = std::result::Result<T, HapError>;
