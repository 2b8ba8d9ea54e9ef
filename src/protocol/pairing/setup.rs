//! Pair-Setup, accessory side (SRP-6a over the setup code)
//!
//! M1 -> M2: salt and SRP public key `B`
//! M3 -> M4: check the controller's SRP proof, answer with ours
//! M5 -> M6: exchange long-term Ed25519 keys under the SRP session key

use rand::RngCore;

use super::{
    AccessoryIdentity, PairedController, PairingError, Permission,
    tlv::{TlvDecoder, TlvEncoder, TlvType},
};
use crate::protocol::crypto::{
    Ed25519PublicKey, SRP_IDENTITY, SessionKey, SrpServer, labels, lengths, open_labelled,
    seal_labelled,
};

/// Progress of one Pair-Setup attempt
pub enum PairSetupState {
    /// M2 sent, waiting for the controller's proof
    AwaitingM3 {
        /// SRP server for this attempt
        srp: Box<SrpServer>,
    },
    /// M4 sent, waiting for the controller's long-term key
    AwaitingM5 {
        /// SRP session key `K`
        session_key: SessionKey,
        /// Key sealing M5 and M6
        encrypt_key: [u8; 32],
    },
}

impl PairSetupState {
    /// Sequence number of the next expected message
    #[must_use]
    pub fn expected(&self) -> u8 {
        match self {
            Self::AwaitingM3 { .. } => 3,
            Self::AwaitingM5 { .. } => 5,
        }
    }
}

impl std::fmt::Debug for PairSetupState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PairSetupState::AwaitingM{}", self.expected())
    }
}

/// Result of a successful M5
#[derive(Debug)]
pub struct SetupComplete {
    /// Controller to persist, always with admin permission
    pub controller: PairedController,
    /// Encoded M6 response
    pub response: Vec<u8>,
}

/// Pair-Setup engine for one accessory
pub struct PairSetup<'a> {
    identity: &'a AccessoryIdentity,
    pincode: &'a str,
}

impl<'a> PairSetup<'a> {
    /// Create an engine for `identity` guarded by `pincode` (`XXX-XX-XXX`)
    #[must_use]
    pub fn new(identity: &'a AccessoryIdentity, pincode: &'a str) -> Self {
        Self { identity, pincode }
    }

    /// Handle M1 with a random salt and SRP secret
    ///
    /// # Errors
    ///
    /// Returns error if the SRP group cannot be set up
    pub fn handle_m1(&self, tlv: &TlvDecoder) -> Result<(Vec<u8>, PairSetupState), PairingError> {
        let mut salt = [0u8; lengths::SRP_SALT];
        let mut secret = [0u8; 32];
        let mut rng = rand::thread_rng();
        rng.fill_bytes(&mut salt);
        rng.fill_bytes(&mut secret);

        let result = self.handle_m1_with(tlv, &salt, &secret);
        zeroize::Zeroize::zeroize(&mut secret);
        result
    }

    /// Handle M1 with caller-provided salt and SRP secret
    ///
    /// # Errors
    ///
    /// Returns error if the SRP group cannot be set up
    pub fn handle_m1_with(
        &self,
        tlv: &TlvDecoder,
        salt: &[u8],
        secret: &[u8],
    ) -> Result<(Vec<u8>, PairSetupState), PairingError> {
        expect_state(tlv, 1)?;

        let srp = SrpServer::with_secret(SRP_IDENTITY, self.pincode.as_bytes(), salt, secret)?;

        let response = TlvEncoder::new()
            .add_state(2)
            .add(TlvType::Salt, srp.salt())
            .add(TlvType::PublicKey, srp.public_key())
            .build();

        Ok((response, PairSetupState::AwaitingM3 { srp: Box::new(srp) }))
    }

    /// Handle M3: verify the controller's SRP proof
    ///
    /// # Errors
    ///
    /// Returns `SrpVerificationFailed` on a wrong setup code; the attempt
    /// cannot be resumed after any error.
    pub fn handle_m3(
        &self,
        state: PairSetupState,
        tlv: &TlvDecoder,
    ) -> Result<(Vec<u8>, PairSetupState), PairingError> {
        expect_state(tlv, 3)?;
        let expected = state.expected();
        let PairSetupState::AwaitingM3 { srp } = state else {
            return Err(PairingError::InvalidState {
                expected,
                actual: 3,
            });
        };

        let client_public = tlv.get_required(TlvType::PublicKey)?;
        let client_proof = tlv.get_required(TlvType::Proof)?;

        let (session_key, server_proof) = srp
            .verify_client(client_public, client_proof)
            .map_err(|_| PairingError::SrpVerificationFailed)?;

        let encrypt_key = labels::PAIR_SETUP_ENCRYPT.derive(session_key.as_bytes())?;

        let response = TlvEncoder::new()
            .add_state(4)
            .add(TlvType::Proof, &server_proof)
            .build();

        Ok((
            response,
            PairSetupState::AwaitingM5 {
                session_key,
                encrypt_key,
            },
        ))
    }

    /// Handle M5: verify the controller's long-term key and build M6
    ///
    /// # Errors
    ///
    /// Returns error if decryption or signature verification fails
    pub fn handle_m5(
        &self,
        state: PairSetupState,
        tlv: &TlvDecoder,
    ) -> Result<SetupComplete, PairingError> {
        expect_state(tlv, 5)?;
        let expected = state.expected();
        let PairSetupState::AwaitingM5 {
            session_key,
            encrypt_key,
        } = state
        else {
            return Err(PairingError::InvalidState {
                expected,
                actual: 5,
            });
        };

        let encrypted = tlv.get_required(TlvType::EncryptedData)?;
        let decrypted = open_labelled(&encrypt_key, b"PS-Msg05", encrypted)?;
        let sub_tlv = TlvDecoder::decode(&decrypted)?;

        let username = sub_tlv.get_required(TlvType::Identifier)?;
        let ltpk = sub_tlv.get_required(TlvType::PublicKey)?;
        let proof = sub_tlv.get_required(TlvType::Signature)?;

        let username = std::str::from_utf8(username)
            .map_err(|_| PairingError::Tlv(super::TlvError::InvalidValue(TlvType::Identifier)))?;

        let controller_x = labels::PAIR_SETUP_CONTROLLER_SIGN.derive(session_key.as_bytes())?;
        let controller_key = Ed25519PublicKey::from_bytes(ltpk)?;
        controller_key
            .verify_raw(&[&controller_x, username.as_bytes(), ltpk], proof)
            .map_err(|_| PairingError::SignatureVerificationFailed)?;

        let accessory_x = labels::PAIR_SETUP_ACCESSORY_SIGN.derive(session_key.as_bytes())?;
        let accessory_ltpk = self.identity.keypair.public_key();
        let accessory_id = self.identity.username.as_bytes();
        let accessory_signature =
            self.identity
                .keypair
                .sign(&[&accessory_x, accessory_id, accessory_ltpk.as_bytes()]);

        let sub_response = TlvEncoder::new()
            .add(TlvType::Identifier, accessory_id)
            .add(TlvType::PublicKey, accessory_ltpk.as_bytes())
            .add(TlvType::Signature, &accessory_signature.to_bytes())
            .build();
        let sealed = seal_labelled(&encrypt_key, b"PS-Msg06", &sub_response)?;

        let response = TlvEncoder::new()
            .add_state(6)
            .add(TlvType::EncryptedData, &sealed)
            .build();

        Ok(SetupComplete {
            controller: PairedController {
                username: username.to_string(),
                public_key: *controller_key.as_bytes(),
                permission: Permission::Admin,
            },
            response,
        })
    }
}

fn expect_state(tlv: &TlvDecoder, expected: u8) -> Result<(), PairingError> {
    let actual = tlv.get_state()?;
    if actual != expected {
        return Err(PairingError::InvalidState { expected, actual });
    }
    Ok(())
}
