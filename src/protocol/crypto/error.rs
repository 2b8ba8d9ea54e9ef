use thiserror::Error;

/// Failures of the pairing and transport primitives
///
/// Messages never include key material.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    #[error("{what} must be {expected} bytes, got {actual}")]
    InvalidLength {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("signature does not verify")]
    InvalidSignature,

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("key exchange produced a non-contributory secret")]
    NonContributory,

    #[error("authentication tag mismatch")]
    DecryptionFailed,

    #[error("AEAD seal failed")]
    EncryptionFailed,

    #[error("HKDF cannot produce {0} bytes")]
    KeyDerivation(usize),

    #[error("SRP: {0}")]
    Srp(&'static str),
}

impl CryptoError {
    pub(crate) fn length(what: &'static str, expected: usize, actual: usize) -> Self {
        Self::InvalidLength {
            what,
            expected,
            actual,
        }
    }
}
