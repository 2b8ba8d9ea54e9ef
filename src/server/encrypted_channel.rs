//! Session transport encryption
//!
//! After Pair-Verify every byte on the connection is carried in frames of
//! `[u16 LE length][ciphertext][16-byte tag]`, where the two length bytes
//! are also the AEAD associated data and plaintext chunks never exceed
//! 1024 bytes.

use crate::protocol::pairing::SessionKeys;
use crate::protocol::crypto::{ChaCha20Poly1305Cipher, Nonce};
use bytes::{Buf, BufMut, BytesMut};

/// Maximum plaintext carried by one frame
pub const MAX_FRAME_PLAINTEXT: usize = 1024;

/// Auth tag size for ChaCha20-Poly1305
const TAG_SIZE: usize = 16;

/// Length prefix size
const LENGTH_SIZE: usize = 2;

/// One direction-pair of traffic keys with their nonce counters
pub struct EncryptedChannel {
    encrypt_cipher: ChaCha20Poly1305Cipher,
    decrypt_cipher: ChaCha20Poly1305Cipher,
    encrypt_nonce: u64,
    decrypt_nonce: u64,
    input_buffer: BytesMut,
}

impl EncryptedChannel {
    /// Create a channel from raw keys
    ///
    /// # Errors
    /// Returns `EncryptionError::InvalidKey` if either key is not 32 bytes.
    pub fn new(encrypt_key: &[u8], decrypt_key: &[u8]) -> Result<Self, EncryptionError> {
        Ok(Self {
            encrypt_cipher: ChaCha20Poly1305Cipher::new(encrypt_key)
                .map_err(|_| EncryptionError::InvalidKey)?,
            decrypt_cipher: ChaCha20Poly1305Cipher::new(decrypt_key)
                .map_err(|_| EncryptionError::InvalidKey)?,
            encrypt_nonce: 0,
            decrypt_nonce: 0,
            input_buffer: BytesMut::with_capacity(4096),
        })
    }

    /// Accessory-side channel from Pair-Verify keys
    ///
    /// # Errors
    /// Returns `EncryptionError::InvalidKey` if the keys are unusable.
    pub fn for_accessory(keys: &SessionKeys) -> Result<Self, EncryptionError> {
        Self::new(&keys.encrypt_key, &keys.decrypt_key)
    }

    /// Controller-side channel from the accessory's view of the keys
    ///
    /// # Errors
    /// Returns `EncryptionError::InvalidKey` if the keys are unusable.
    pub fn for_controller(keys: &SessionKeys) -> Result<Self, EncryptionError> {
        Self::new(&keys.decrypt_key, &keys.encrypt_key)
    }

    /// Whether outbound traffic should be encrypted yet
    ///
    /// The peer must have proven possession of the keys with at least one
    /// valid frame first.
    #[must_use]
    pub fn outbound_active(&self) -> bool {
        self.decrypt_nonce > 0
    }

    /// Encrypt a message into one or more frames
    ///
    /// # Errors
    /// Returns `EncryptionError` if the nonce space is exhausted or the
    /// cipher fails.
    pub fn encrypt(&mut self, plaintext: &[u8]) -> Result<Vec<u8>, EncryptionError> {
        let frames = plaintext.len().div_ceil(MAX_FRAME_PLAINTEXT).max(1);
        let mut output = Vec::with_capacity(plaintext.len() + frames * (LENGTH_SIZE + TAG_SIZE));

        for chunk in plaintext.chunks(MAX_FRAME_PLAINTEXT) {
            // chunk.len() <= 1024
            #[allow(clippy::cast_possible_truncation)]
            let aad = (chunk.len() as u16).to_le_bytes();

            let nonce = Nonce::from_counter(self.encrypt_nonce);
            self.encrypt_nonce = self
                .encrypt_nonce
                .checked_add(1)
                .ok_or(EncryptionError::NonceExhausted)?;

            let sealed = self
                .encrypt_cipher
                .seal(&nonce, &aad, chunk)
                .map_err(|_| EncryptionError::EncryptionFailed)?;

            output.put_slice(&aad);
            output.put_slice(&sealed);
        }

        Ok(output)
    }

    /// Feed bytes into the decryption buffer
    pub fn feed(&mut self, data: &[u8]) {
        self.input_buffer.extend_from_slice(data);
    }

    /// Try to decrypt one complete frame from the buffer
    ///
    /// # Errors
    /// Returns `EncryptionError` on an oversized length prefix or a failed
    /// authentication check. Either is fatal for the connection.
    pub fn decrypt(&mut self) -> Result<Option<Vec<u8>>, EncryptionError> {
        if self.input_buffer.len() < LENGTH_SIZE {
            return Ok(None);
        }

        let plaintext_len =
            u16::from_le_bytes([self.input_buffer[0], self.input_buffer[1]]) as usize;
        if plaintext_len > MAX_FRAME_PLAINTEXT {
            return Err(EncryptionError::InvalidFrameLength(plaintext_len));
        }

        let frame_size = LENGTH_SIZE + plaintext_len + TAG_SIZE;
        if self.input_buffer.len() < frame_size {
            return Ok(None);
        }

        let aad = self.input_buffer.get_u16_le().to_le_bytes();
        let ciphertext = self.input_buffer.split_to(plaintext_len + TAG_SIZE);

        let nonce = Nonce::from_counter(self.decrypt_nonce);
        let plaintext = self
            .decrypt_cipher
            .open(&nonce, &aad, &ciphertext)
            .map_err(|_| EncryptionError::DecryptionFailed)?;
        self.decrypt_nonce = self
            .decrypt_nonce
            .checked_add(1)
            .ok_or(EncryptionError::NonceExhausted)?;

        Ok(Some(plaintext))
    }

    /// Decrypt all complete frames and concatenate their plaintext
    ///
    /// # Errors
    /// Returns `EncryptionError` if any frame fails to decrypt.
    pub fn decrypt_all(&mut self) -> Result<Vec<u8>, EncryptionError> {
        let mut plaintext = Vec::new();
        while let Some(frame) = self.decrypt()? {
            plaintext.extend_from_slice(&frame);
        }
        Ok(plaintext)
    }

    /// Frames sent so far
    #[must_use]
    pub fn encrypt_nonce(&self) -> u64 {
        self.encrypt_nonce
    }

    /// Frames received so far
    #[must_use]
    pub fn decrypt_nonce(&self) -> u64 {
        self.decrypt_nonce
    }

    /// Bytes waiting for a complete frame
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.input_buffer.len()
    }
}

impl std::fmt::Debug for EncryptedChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptedChannel")
            .field("encrypt_nonce", &self.encrypt_nonce)
            .field("decrypt_nonce", &self.decrypt_nonce)
            .field("buffered", &self.input_buffer.len())
            .finish_non_exhaustive()
    }
}

/// Errors related to transport encryption
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EncryptionError {
    /// Traffic key has the wrong length
    #[error("Invalid traffic key")]
    InvalidKey,

    /// Length prefix exceeds the frame limit
    #[error("Invalid frame length: {0}")]
    InvalidFrameLength(usize),

    /// Counter would wrap
    #[error("Nonce counter exhausted")]
    NonceExhausted,

    /// Encryption failed
    #[error("Encryption failed")]
    EncryptionFailed,

    /// Decryption failed
    #[error("Decryption failed - authentication error or corrupted data")]
    DecryptionFailed,
}
