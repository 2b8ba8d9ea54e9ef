use super::{CryptoError, lengths};
use chacha20poly1305::{
    ChaCha20Poly1305 as ChaChaImpl, Nonce as ChaChaNonce,
    aead::{Aead, KeyInit, Payload},
};

/// 96-bit nonce: 4 zero bytes followed by an 8-byte counter or label
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Nonce([u8; 12]);

impl Nonce {
    /// Session frame nonce, little-endian counter
    pub fn from_counter(counter: u64) -> Self {
        Self::from_tail(counter.to_le_bytes())
    }

    /// Handshake nonce such as `PS-Msg05` or `PV-Msg02`
    pub fn from_label(label: &[u8; 8]) -> Self {
        Self::from_tail(*label)
    }

    fn from_tail(tail: [u8; 8]) -> Self {
        let mut arr = [0u8; 12];
        arr[4..].copy_from_slice(&tail);
        Self(arr)
    }

    pub fn as_bytes(&self) -> &[u8; 12] {
        &self.0
    }
}

/// ChaCha20-Poly1305 under one 32-byte key
pub struct ChaCha20Poly1305Cipher {
    cipher: ChaChaImpl,
}

impl ChaCha20Poly1305Cipher {
    pub fn new(key: &[u8]) -> Result<Self, CryptoError> {
        let cipher = ChaChaImpl::new_from_slice(key)
            .map_err(|_| CryptoError::length("ChaCha20 key", lengths::CHACHA_KEY, key.len()))?;
        Ok(Self { cipher })
    }

    /// Encrypt `plaintext`, returning ciphertext with the 16-byte tag appended
    pub fn seal(&self, nonce: &Nonce, aad: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        self.cipher
            .encrypt(
                &ChaChaNonce::from(nonce.0),
                Payload {
                    msg: plaintext,
                    aad,
                },
            )
            .map_err(|_| CryptoError::EncryptionFailed)
    }

    /// Verify and decrypt ciphertext carrying a trailing tag
    pub fn open(&self, nonce: &Nonce, aad: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if ciphertext.len() < lengths::CHACHA_TAG {
            return Err(CryptoError::DecryptionFailed);
        }
        self.cipher
            .decrypt(
                &ChaChaNonce::from(nonce.0),
                Payload {
                    msg: ciphertext,
                    aad,
                },
            )
            .map_err(|_| CryptoError::DecryptionFailed)
    }
}

/// Seal a handshake sub-TLV under `key` with a label nonce and no AAD
pub fn seal_labelled(key: &[u8], label: &[u8; 8], plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    ChaCha20Poly1305Cipher::new(key)?.seal(&Nonce::from_label(label), &[], plaintext)
}

/// Open a handshake sub-TLV sealed by [`seal_labelled`]
pub fn open_labelled(key: &[u8], label: &[u8; 8], ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    ChaCha20Poly1305Cipher::new(key)?.open(&Nonce::from_label(label), &[], ciphertext)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_nonce_layout() {
        let nonce = Nonce::from_label(b"PS-Msg05");
        assert_eq!(&nonce.as_bytes()[..4], &[0, 0, 0, 0]);
        assert_eq!(&nonce.as_bytes()[4..], b"PS-Msg05");
    }

    #[test]
    fn test_counter_nonce_layout() {
        let nonce = Nonce::from_counter(0x0102);
        assert_eq!(nonce.as_bytes(), &[0, 0, 0, 0, 0x02, 0x01, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_labelled_seal_open() {
        let key = [0x42u8; 32];
        let sealed = seal_labelled(&key, b"PV-Msg02", b"sub-tlv").unwrap();
        assert_eq!(sealed.len(), 7 + lengths::CHACHA_TAG);

        assert_eq!(open_labelled(&key, b"PV-Msg02", &sealed).unwrap(), b"sub-tlv");
        assert_eq!(
            open_labelled(&key, b"PV-Msg03", &sealed),
            Err(CryptoError::DecryptionFailed)
        );
    }

    #[test]
    fn test_aad_is_authenticated() {
        let cipher = ChaCha20Poly1305Cipher::new(&[0x42u8; 32]).unwrap();
        let nonce = Nonce::from_counter(1);

        let sealed = cipher.seal(&nonce, &[4, 0], b"data").unwrap();
        assert_eq!(cipher.open(&nonce, &[4, 0], &sealed).unwrap(), b"data");
        assert!(cipher.open(&nonce, &[5, 0], &sealed).is_err());
    }

    #[test]
    fn test_short_ciphertext_rejected() {
        let cipher = ChaCha20Poly1305Cipher::new(&[1u8; 32]).unwrap();
        assert_eq!(
            cipher.open(&Nonce::from_counter(0), &[], &[0u8; 5]),
            Err(CryptoError::DecryptionFailed)
        );
    }

    #[test]
    fn test_bad_key_length() {
        assert!(matches!(
            ChaCha20Poly1305Cipher::new(&[0u8; 16]),
            Err(CryptoError::InvalidLength {
                expected: 32,
                actual: 16,
                ..
            })
        ));
    }
}
