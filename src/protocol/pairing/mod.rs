//! `HomeKit` pairing protocol, accessory side
//!
//! Pair-Setup establishes long-term trust from the setup code, Pair-Verify
//! turns that trust into per-connection traffic keys. Both engines are
//! synchronous: they consume a decoded TLV plus the previous step's state
//! and return the response bytes plus the next state.

pub mod setup;
pub mod storage;
pub mod tlv;
pub mod verify;


pub use setup::{PairSetup, PairSetupState, SetupComplete};
pub use storage::{
    FileStorage, MemoryStorage, PairedController, PairingStorage, Permission, StorageError,
};
pub use tlv::{TlvDecoder, TlvEncoder, TlvError, TlvItem, TlvType};
pub use verify::{PairVerify, PairVerifyState, VerifyComplete};

use crate::protocol::crypto::{CryptoError, Ed25519KeyPair};

/// Long-term identity of the accessory
#[derive(Debug, Clone)]
pub struct AccessoryIdentity {
    /// Accessory pairing identifier, `XX:XX:XX:XX:XX:XX`
    pub username: String,
    /// Accessory long-term Ed25519 key pair
    pub keypair: Ed25519KeyPair,
}

impl AccessoryIdentity {
    /// Create an identity with a fresh random key pair
    #[must_use]
    pub fn generate(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            keypair: Ed25519KeyPair::generate(),
        }
    }

    /// Create an identity from a stored Ed25519 secret
    ///
    /// # Errors
    ///
    /// Returns error if the secret is not 32 bytes
    pub fn from_secret(username: impl Into<String>, secret: &[u8]) -> Result<Self, CryptoError> {
        Ok(Self {
            username: username.into(),
            keypair: Ed25519KeyPair::from_bytes(secret)?,
        })
    }
}

/// Traffic keys established by Pair-Verify
#[derive(Clone)]
pub struct SessionKeys {
    /// Accessory to controller
    pub encrypt_key: [u8; 32],
    /// Controller to accessory
    pub decrypt_key: [u8; 32],
}

impl std::fmt::Debug for SessionKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionKeys { .. }")
    }
}

impl Drop for SessionKeys {
    fn drop(&mut self) {
        use zeroize::Zeroize;
        self.encrypt_key.zeroize();
        self.decrypt_key.zeroize();
    }
}

/// Pairing errors
#[derive(Debug, thiserror::Error)]
pub enum PairingError {
    #[error("invalid state: expected M{expected}, got M{actual}")]
    InvalidState { expected: u8, actual: u8 },

    #[error("invalid TLV: {0}")]
    Tlv(#[from] TlvError),

    #[error("unsupported method: {0}")]
    UnsupportedMethod(u8),

    #[error("SRP verification failed")]
    SrpVerificationFailed,

    #[error("signature verification failed")]
    SignatureVerificationFailed,

    #[error("controller is not paired")]
    UnknownController,

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("maximum number of pairings reached")]
    MaxPeers,

    #[error("too many failed attempts")]
    MaxTries,

    #[error("another pairing is in progress")]
    Busy,

    #[error("accessory is already paired")]
    Unavailable,

    #[error("admin permission required")]
    NotAdmin,

    #[error("pairing exists with a different key")]
    UnknownPairingKey,

    #[error("peer reported TLV error {0}")]
    PeerError(u8),
}

impl PairingError {
    /// TLV error code reported to the controller
    #[must_use]
    pub fn tlv_code(&self) -> u8 {
        match self {
            Self::SrpVerificationFailed
            | Self::SignatureVerificationFailed
            | Self::UnknownController
            | Self::Crypto(_)
            | Self::NotAdmin => tlv::errors::AUTHENTICATION,
            Self::MaxPeers => tlv::errors::MAX_PEERS,
            Self::MaxTries => tlv::errors::MAX_TRIES,
            Self::Busy => tlv::errors::BUSY,
            Self::Unavailable => tlv::errors::UNAVAILABLE,
            Self::PeerError(code) => *code,
            Self::InvalidState { .. }
            | Self::Tlv(_)
            | Self::UnsupportedMethod(_)
            | Self::UnknownPairingKey
            | Self::Storage(_) => tlv::errors::UNKNOWN,
        }
    }

    /// Error response for the step that answers with `state`
    #[must_use]
    pub fn response(&self, state: u8) -> Vec<u8> {
        TlvEncoder::new()
            .add_state(state)
            .add_error(self.tlv_code())
            .build()
    }
}
