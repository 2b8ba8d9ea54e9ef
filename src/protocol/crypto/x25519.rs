use super::{CryptoError, lengths};
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroize;

/// Ephemeral X25519 key pair for one Pair-Verify exchange
pub struct X25519KeyPair {
    secret: StaticSecret,
    public: PublicKey,
}

impl X25519KeyPair {
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(rand::rngs::OsRng);
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }

    /// Fixed key pair, for reproducible exchanges
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CryptoError::length("X25519 secret", 32, bytes.len()))?;
        let secret = StaticSecret::from(bytes);
        let public = PublicKey::from(&secret);
        Ok(Self { secret, public })
    }

    pub fn public_key(&self) -> X25519PublicKey {
        X25519PublicKey { inner: self.public }
    }

    /// ECDH with the peer's ephemeral key
    ///
    /// Low-order peer keys yield an all-zero secret and are rejected.
    pub fn diffie_hellman(
        &self,
        their_public: &X25519PublicKey,
    ) -> Result<X25519SharedSecret, CryptoError> {
        let shared = self.secret.diffie_hellman(&their_public.inner);
        if !shared.was_contributory() {
            return Err(CryptoError::NonContributory);
        }
        Ok(X25519SharedSecret {
            bytes: shared.to_bytes(),
        })
    }
}

/// X25519 public key
#[derive(Clone, Copy, Debug)]
pub struct X25519PublicKey {
    inner: PublicKey,
}

impl X25519PublicKey {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let bytes: [u8; 32] = bytes.try_into().map_err(|_| {
            CryptoError::length("X25519 public key", lengths::X25519_PUBLIC_KEY, bytes.len())
        })?;
        Ok(Self {
            inner: PublicKey::from(bytes),
        })
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        self.inner.as_bytes()
    }
}

/// ECDH output, zeroed on drop
pub struct X25519SharedSecret {
    bytes: [u8; 32],
}

impl X25519SharedSecret {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }
}

impl Drop for X25519SharedSecret {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}
