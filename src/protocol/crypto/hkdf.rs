use super::CryptoError;
use hkdf::Hkdf;
use sha2::Sha512;

/// HKDF-SHA512 over one input key material
pub struct HkdfSha512 {
    hkdf: Hkdf<Sha512>,
}

impl HkdfSha512 {
    pub fn new(salt: &[u8], ikm: &[u8]) -> Self {
        Self {
            hkdf: Hkdf::<Sha512>::new(Some(salt), ikm),
        }
    }

    /// Expand into a fixed-size array
    pub fn expand<const N: usize>(&self, info: &[u8]) -> Result<[u8; N], CryptoError> {
        let mut okm = [0u8; N];
        self.hkdf
            .expand(info, &mut okm)
            .map_err(|_| CryptoError::KeyDerivation(N))?;
        Ok(okm)
    }
}

/// A salt/info pair from the HAP key schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyLabel {
    pub salt: &'static [u8],
    pub info: &'static [u8],
}

impl KeyLabel {
    /// Derive the 32-byte key this label names from `ikm`
    pub fn derive(&self, ikm: &[u8]) -> Result<[u8; 32], CryptoError> {
        HkdfSha512::new(self.salt, ikm).expand::<32>(self.info)
    }
}

/// Every key HAP derives, by purpose
pub mod labels {
    use super::KeyLabel;

    /// Seals Pair-Setup M5/M6; input is the SRP session key
    pub const PAIR_SETUP_ENCRYPT: KeyLabel = KeyLabel {
        salt: b"Pair-Setup-Encrypt-Salt",
        info: b"Pair-Setup-Encrypt-Info",
    };

    /// `iOSDeviceX` signed by the controller in M5
    pub const PAIR_SETUP_CONTROLLER_SIGN: KeyLabel = KeyLabel {
        salt: b"Pair-Setup-Controller-Sign-Salt",
        info: b"Pair-Setup-Controller-Sign-Info",
    };

    /// `AccessoryX` signed by the accessory in M6
    pub const PAIR_SETUP_ACCESSORY_SIGN: KeyLabel = KeyLabel {
        salt: b"Pair-Setup-Accessory-Sign-Salt",
        info: b"Pair-Setup-Accessory-Sign-Info",
    };

    /// Seals Pair-Verify M2/M3; input is the X25519 shared secret
    pub const PAIR_VERIFY_ENCRYPT: KeyLabel = KeyLabel {
        salt: b"Pair-Verify-Encrypt-Salt",
        info: b"Pair-Verify-Encrypt-Info",
    };

    /// Accessory to controller traffic
    pub const CONTROL_READ: KeyLabel = KeyLabel {
        salt: b"Control-Salt",
        info: b"Control-Read-Encryption-Key",
    };

    /// Controller to accessory traffic
    pub const CONTROL_WRITE: KeyLabel = KeyLabel {
        salt: b"Control-Salt",
        info: b"Control-Write-Encryption-Key",
    };
}
