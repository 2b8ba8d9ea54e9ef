//! Pair-Verify, accessory side
//!
//! Establishes per-connection traffic keys from an X25519 exchange that both
//! sides authenticate with their long-term Ed25519 keys.

use super::{
    AccessoryIdentity, PairingError, PairingStorage, SessionKeys,
    tlv::{TlvDecoder, TlvEncoder, TlvType},
};
use crate::protocol::crypto::{
    Ed25519PublicKey, X25519KeyPair, X25519PublicKey, X25519SharedSecret, labels, open_labelled,
    seal_labelled,
};

/// Ephemeral material kept between M2 and M3
pub struct PairVerifyState {
    own_public: [u8; 32],
    client_public: [u8; 32],
    shared_secret: X25519SharedSecret,
    encrypt_key: [u8; 32],
}

impl std::fmt::Debug for PairVerifyState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PairVerifyState::AwaitingM3")
    }
}

impl Drop for PairVerifyState {
    fn drop(&mut self) {
        zeroize::Zeroize::zeroize(&mut self.encrypt_key);
    }
}

/// Result of a successful M3
#[derive(Debug)]
pub struct VerifyComplete {
    /// Verified controller pairing identifier
    pub username: String,
    /// Traffic keys for this connection
    pub keys: SessionKeys,
    /// Encoded M4 response (sent in plaintext)
    pub response: Vec<u8>,
}

/// Pair-Verify engine for one accessory
pub struct PairVerify<'a> {
    identity: &'a AccessoryIdentity,
}

impl<'a> PairVerify<'a> {
    #[must_use]
    pub fn new(identity: &'a AccessoryIdentity) -> Self {
        Self { identity }
    }

    /// Handle M1 with a fresh ephemeral key pair
    ///
    /// # Errors
    ///
    /// Returns error if the controller key is malformed
    pub fn handle_m1(&self, tlv: &TlvDecoder) -> Result<(Vec<u8>, PairVerifyState), PairingError> {
        self.handle_m1_with(tlv, X25519KeyPair::generate())
    }

    /// Handle M1 with a caller-provided ephemeral key pair
    ///
    /// # Errors
    ///
    /// Returns error if the controller key is malformed
    pub fn handle_m1_with(
        &self,
        tlv: &TlvDecoder,
        keypair: X25519KeyPair,
    ) -> Result<(Vec<u8>, PairVerifyState), PairingError> {
        let state = tlv.get_state()?;
        if state != 1 {
            return Err(PairingError::InvalidState {
                expected: 1,
                actual: state,
            });
        }

        let client_public = X25519PublicKey::from_bytes(tlv.get_required(TlvType::PublicKey)?)?;
        let shared_secret = keypair.diffie_hellman(&client_public)?;
        let own_public = *keypair.public_key().as_bytes();

        // AccessoryCurvePK || AccessoryPairingID || ControllerCurvePK
        let username = self.identity.username.as_bytes();
        let signature = self
            .identity
            .keypair
            .sign(&[&own_public, username, client_public.as_bytes()]);

        let encrypt_key = labels::PAIR_VERIFY_ENCRYPT.derive(shared_secret.as_bytes())?;

        let sub_tlv = TlvEncoder::new()
            .add(TlvType::Identifier, username)
            .add(TlvType::Signature, &signature.to_bytes())
            .build();
        let sealed = seal_labelled(&encrypt_key, b"PV-Msg02", &sub_tlv)?;

        let response = TlvEncoder::new()
            .add_state(2)
            .add(TlvType::PublicKey, &own_public)
            .add(TlvType::EncryptedData, &sealed)
            .build();

        Ok((
            response,
            PairVerifyState {
                own_public,
                client_public: *client_public.as_bytes(),
                shared_secret,
                encrypt_key,
            },
        ))
    }

    /// Handle M3: authenticate the controller against the pairing store
    ///
    /// An unknown controller and a bad signature fail with the same
    /// `AUTHENTICATION` code so the response does not reveal which
    /// identifiers are paired.
    ///
    /// # Errors
    ///
    /// Returns error if decryption, lookup or signature verification fails
    pub async fn handle_m3(
        &self,
        state: PairVerifyState,
        tlv: &TlvDecoder,
        store: &dyn PairingStorage,
    ) -> Result<VerifyComplete, PairingError> {
        let seq = tlv.get_state()?;
        if seq != 3 {
            return Err(PairingError::InvalidState {
                expected: 3,
                actual: seq,
            });
        }

        let encrypted = tlv.get_required(TlvType::EncryptedData)?;
        let decrypted = open_labelled(&state.encrypt_key, b"PV-Msg03", encrypted)?;
        let sub_tlv = TlvDecoder::decode(&decrypted)?;

        let username = sub_tlv.get_required(TlvType::Identifier)?;
        let proof = sub_tlv.get_required(TlvType::Signature)?;
        let username = String::from_utf8_lossy(username).into_owned();

        let controller = store
            .load(&username)
            .await
            .ok_or(PairingError::UnknownController)?;

        // ControllerCurvePK || ControllerPairingID || AccessoryCurvePK
        Ed25519PublicKey::from_bytes(&controller.public_key)
            .and_then(|ltpk| {
                ltpk.verify_raw(
                    &[&state.client_public, username.as_bytes(), &state.own_public],
                    proof,
                )
            })
            .map_err(|_| PairingError::SignatureVerificationFailed)?;

        let keys = derive_session_keys(state.shared_secret.as_bytes())?;

        Ok(VerifyComplete {
            username,
            keys,
            response: TlvEncoder::new().add_state(4).build(),
        })
    }
}

/// Derive accessory-side traffic keys from the Pair-Verify shared secret
///
/// # Errors
///
/// Returns error if HKDF expansion fails
pub fn derive_session_keys(shared_secret: &[u8]) -> Result<SessionKeys, PairingError> {
    Ok(SessionKeys {
        encrypt_key: labels::CONTROL_READ.derive(shared_secret)?,
        decrypt_key: labels::CONTROL_WRITE.derive(shared_secret)?,
    })
}
