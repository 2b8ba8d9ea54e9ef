use super::{CryptoError, lengths};
use ed25519_dalek::{Signer, Verifier};

/// Concatenate signing material such as `X || PairingID || LTPK`
fn material(parts: &[&[u8]]) -> Vec<u8> {
    parts.concat()
}

/// Ed25519 long-term key pair
#[derive(Clone)]
pub struct Ed25519KeyPair {
    signing_key: ed25519_dalek::SigningKey,
}

impl Ed25519KeyPair {
    pub fn generate() -> Self {
        let signing_key = ed25519_dalek::SigningKey::generate(&mut rand::rngs::OsRng);
        Self { signing_key }
    }

    /// Restore a key pair from its 32-byte seed
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let seed: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CryptoError::length("Ed25519 seed", 32, bytes.len()))?;
        Ok(Self {
            signing_key: ed25519_dalek::SigningKey::from_bytes(&seed),
        })
    }

    pub fn public_key(&self) -> Ed25519PublicKey {
        Ed25519PublicKey {
            verifying_key: self.signing_key.verifying_key(),
        }
    }

    /// Seed bytes, for persisting the accessory identity
    pub fn secret_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }

    /// Sign the concatenation of `parts`
    pub fn sign(&self, parts: &[&[u8]]) -> Ed25519Signature {
        Ed25519Signature {
            inner: self.signing_key.sign(&material(parts)),
        }
    }
}

impl std::fmt::Debug for Ed25519KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ed25519KeyPair")
            .field("public", &self.public_key().as_bytes())
            .finish_non_exhaustive()
    }
}

/// Ed25519 long-term public key
#[derive(Clone, Debug)]
pub struct Ed25519PublicKey {
    verifying_key: ed25519_dalek::VerifyingKey,
}

impl Ed25519PublicKey {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let bytes: [u8; 32] = bytes.try_into().map_err(|_| {
            CryptoError::length("Ed25519 public key", lengths::ED25519_PUBLIC_KEY, bytes.len())
        })?;
        let verifying_key = ed25519_dalek::VerifyingKey::from_bytes(&bytes)
            .map_err(|_| CryptoError::InvalidPublicKey)?;
        Ok(Self { verifying_key })
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        self.verifying_key.as_bytes()
    }

    /// Verify `signature` over the concatenation of `parts`
    pub fn verify(&self, parts: &[&[u8]], signature: &Ed25519Signature) -> Result<(), CryptoError> {
        self.verifying_key
            .verify(&material(parts), &signature.inner)
            .map_err(|_| CryptoError::InvalidSignature)
    }

    /// Parse a raw signature and verify it in one step
    ///
    /// A malformed signature is reported the same way as a wrong one.
    pub fn verify_raw(&self, parts: &[&[u8]], signature: &[u8]) -> Result<(), CryptoError> {
        let signature =
            Ed25519Signature::from_bytes(signature).map_err(|_| CryptoError::InvalidSignature)?;
        self.verify(parts, &signature)
    }
}

/// Ed25519 signature
pub struct Ed25519Signature {
    inner: ed25519_dalek::Signature,
}

impl Ed25519Signature {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let bytes: [u8; 64] = bytes.try_into().map_err(|_| {
            CryptoError::length("Ed25519 signature", lengths::ED25519_SIGNATURE, bytes.len())
        })?;
        Ok(Self {
            inner: ed25519_dalek::Signature::from_bytes(&bytes),
        })
    }

    pub fn to_bytes(&self) -> [u8; 64] {
        self.inner.to_bytes()
    }
}
