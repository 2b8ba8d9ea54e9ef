//! Mock `HomeKit` controller for testing the accessory server
//!
//! Plays the iOS side of Pair-Setup, Pair-Verify and the encrypted session
//! so the server can be exercised end to end without a real device.

use crate::error::HapError;
use crate::protocol::crypto::{
    Ed25519KeyPair, Ed25519PublicKey, SRP_IDENTITY, SessionKey, SrpClient, X25519KeyPair,
    X25519PublicKey, labels, open_labelled, seal_labelled,
};
use crate::protocol::http::{
    HttpClientCodec, HttpResponse, IncomingMessage, Method, content_types,
};
use crate::protocol::pairing::tlv::methods;
use crate::protocol::pairing::{
    PairingError, SessionKeys, TlvDecoder, TlvEncoder, TlvType, verify,
};
use crate::server::EncryptedChannel;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Long-term identity of a controller
#[derive(Debug, Clone)]
pub struct ControllerIdentity {
    /// Controller pairing identifier
    pub username: String,
    /// Long-term Ed25519 key pair
    pub keypair: Ed25519KeyPair,
}

impl ControllerIdentity {
    /// Fresh identity with a random key
    #[must_use]
    pub fn generate(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            keypair: Ed25519KeyPair::generate(),
        }
    }

    /// Public key bytes
    #[must_use]
    pub fn public_key(&self) -> [u8; 32] {
        *self.keypair.public_key().as_bytes()
    }
}

/// What the controller learns about the accessory from Pair-Setup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessoryPairing {
    /// Accessory pairing identifier
    pub username: String,
    /// Accessory long-term public key
    pub public_key: [u8; 32],
}

fn check_response(tlv: &TlvDecoder, expected_state: u8) -> Result<(), PairingError> {
    if let Some(code) = tlv.get_error() {
        return Err(PairingError::PeerError(code));
    }
    let actual = tlv.get_state()?;
    if actual != expected_state {
        return Err(PairingError::InvalidState {
            expected: expected_state,
            actual,
        });
    }
    Ok(())
}

/// Controller side of Pair-Setup, without I/O
pub struct SetupExchange<'a> {
    identity: &'a ControllerIdentity,
    srp: SrpClient,
    session_key: Option<SessionKey>,
    encrypt_key: Option<[u8; 32]>,
}

impl<'a> SetupExchange<'a> {
    /// Start with a random SRP secret
    ///
    /// # Errors
    /// Returns error if the SRP group cannot be loaded.
    pub fn new(identity: &'a ControllerIdentity) -> Result<Self, PairingError> {
        Ok(Self::with_srp(identity, SrpClient::new()?))
    }

    /// Start with a fixed SRP secret
    ///
    /// # Errors
    /// Returns error if the SRP group cannot be loaded.
    pub fn with_secret(identity: &'a ControllerIdentity, secret: &[u8]) -> Result<Self, PairingError> {
        Ok(Self::with_srp(identity, SrpClient::with_secret(secret)?))
    }

    fn with_srp(identity: &'a ControllerIdentity, srp: SrpClient) -> Self {
        Self {
            identity,
            srp,
            session_key: None,
            encrypt_key: None,
        }
    }

    /// M1 body
    #[must_use]
    pub fn m1(&self) -> Vec<u8> {
        TlvEncoder::new()
            .add_state(1)
            .add_byte(TlvType::Method, methods::PAIR_SETUP)
            .build()
    }

    /// Answer M2 with M3 using `pincode`
    ///
    /// # Errors
    /// Returns error if M2 is malformed or carries an error code.
    pub fn m3(&self, m2: &[u8], pincode: &str) -> Result<(Vec<u8>, M3Pending), PairingError> {
        let tlv = TlvDecoder::decode(m2)?;
        check_response(&tlv, 2)?;
        let salt = tlv.get_required(TlvType::Salt)?;
        let server_public = tlv.get_required(TlvType::PublicKey)?;

        let verifier =
            self.srp
                .process_challenge(SRP_IDENTITY, pincode.as_bytes(), salt, server_public)?;
        let body = TlvEncoder::new()
            .add_state(3)
            .add(TlvType::PublicKey, self.srp.public_key())
            .add(TlvType::Proof, verifier.client_proof())
            .build();
        Ok((body, M3Pending { verifier }))
    }

    /// Check M4 and build M5
    ///
    /// # Errors
    /// Returns error if the accessory proof does not verify.
    pub fn m5(&mut self, m4: &[u8], pending: M3Pending) -> Result<Vec<u8>, PairingError> {
        let tlv = TlvDecoder::decode(m4)?;
        check_response(&tlv, 4)?;
        let session_key = pending
            .verifier
            .verify_server(tlv.get_required(TlvType::Proof)?)
            .map_err(|_| PairingError::SrpVerificationFailed)?;

        let encrypt_key = labels::PAIR_SETUP_ENCRYPT.derive(session_key.as_bytes())?;
        let controller_x = labels::PAIR_SETUP_CONTROLLER_SIGN.derive(session_key.as_bytes())?;

        let ltpk = self.identity.public_key();
        let username = self.identity.username.as_bytes();
        let signature = self.identity.keypair.sign(&[&controller_x, username, &ltpk]);

        let sub_tlv = TlvEncoder::new()
            .add(TlvType::Identifier, self.identity.username.as_bytes())
            .add(TlvType::PublicKey, &ltpk)
            .add(TlvType::Signature, &signature.to_bytes())
            .build();
        let sealed = seal_labelled(&encrypt_key, b"PS-Msg05", &sub_tlv)?;

        self.session_key = Some(session_key);
        self.encrypt_key = Some(encrypt_key);

        Ok(TlvEncoder::new()
            .add_state(5)
            .add(TlvType::EncryptedData, &sealed)
            .build())
    }

    /// Check M6 and return the accessory's long-term identity
    ///
    /// # Errors
    /// Returns error if M6 fails to decrypt or its signature is invalid.
    pub fn finish(&self, m6: &[u8]) -> Result<AccessoryPairing, PairingError> {
        let tlv = TlvDecoder::decode(m6)?;
        check_response(&tlv, 6)?;
        let (Some(session_key), Some(encrypt_key)) = (&self.session_key, &self.encrypt_key) else {
            return Err(PairingError::InvalidState {
                expected: 4,
                actual: 6,
            });
        };

        let decrypted = open_labelled(
            encrypt_key,
            b"PS-Msg06",
            tlv.get_required(TlvType::EncryptedData)?,
        )?;
        let sub_tlv = TlvDecoder::decode(&decrypted)?;
        let username = sub_tlv.get_required(TlvType::Identifier)?;
        let ltpk = sub_tlv.get_required(TlvType::PublicKey)?;
        let signature = sub_tlv.get_required(TlvType::Signature)?;

        let accessory_x = labels::PAIR_SETUP_ACCESSORY_SIGN.derive(session_key.as_bytes())?;
        let public_key = Ed25519PublicKey::from_bytes(ltpk)?;
        public_key
            .verify_raw(&[&accessory_x, username, ltpk], signature)
            .map_err(|_| PairingError::SignatureVerificationFailed)?;

        Ok(AccessoryPairing {
            username: String::from_utf8_lossy(username).into_owned(),
            public_key: *public_key.as_bytes(),
        })
    }
}

/// Client SRP state between M3 and M4
pub struct M3Pending {
    verifier: crate::protocol::crypto::SrpVerifier,
}

/// Controller side of Pair-Verify, without I/O
pub struct VerifyExchange<'a> {
    identity: &'a ControllerIdentity,
    ephemeral: X25519KeyPair,
    shared_secret: Option<[u8; 32]>,
}

impl<'a> VerifyExchange<'a> {
    /// Start with a random ephemeral key
    #[must_use]
    pub fn new(identity: &'a ControllerIdentity) -> Self {
        Self::with_keypair(identity, X25519KeyPair::generate())
    }

    /// Start with a fixed ephemeral key
    #[must_use]
    pub fn with_keypair(identity: &'a ControllerIdentity, ephemeral: X25519KeyPair) -> Self {
        Self {
            identity,
            ephemeral,
            shared_secret: None,
        }
    }

    /// M1 body
    #[must_use]
    pub fn m1(&self) -> Vec<u8> {
        TlvEncoder::new()
            .add_state(1)
            .add(TlvType::PublicKey, self.ephemeral.public_key().as_bytes())
            .build()
    }

    /// Check M2 and build M3
    ///
    /// The accessory signature is checked when its long-term key is known.
    ///
    /// # Errors
    /// Returns error if M2 fails to decrypt or verify.
    pub fn m3(
        &mut self,
        m2: &[u8],
        accessory: Option<&AccessoryPairing>,
    ) -> Result<Vec<u8>, PairingError> {
        let tlv = TlvDecoder::decode(m2)?;
        check_response(&tlv, 2)?;
        let accessory_public = X25519PublicKey::from_bytes(tlv.get_required(TlvType::PublicKey)?)?;
        let shared = self.ephemeral.diffie_hellman(&accessory_public)?;
        let encrypt_key = labels::PAIR_VERIFY_ENCRYPT.derive(shared.as_bytes())?;

        let decrypted = open_labelled(
            &encrypt_key,
            b"PV-Msg02",
            tlv.get_required(TlvType::EncryptedData)?,
        )?;
        let sub_tlv = TlvDecoder::decode(&decrypted)?;
        let accessory_username = sub_tlv.get_required(TlvType::Identifier)?;
        let own_public = *self.ephemeral.public_key().as_bytes();

        if let Some(accessory) = accessory {
            let signature = sub_tlv.get_required(TlvType::Signature)?;
            Ed25519PublicKey::from_bytes(&accessory.public_key)?
                .verify_raw(
                    &[accessory_public.as_bytes(), accessory_username, &own_public],
                    signature,
                )
                .map_err(|_| PairingError::SignatureVerificationFailed)?;
        }

        let signature = self.identity.keypair.sign(&[
            &own_public,
            self.identity.username.as_bytes(),
            accessory_public.as_bytes(),
        ]);

        let sub_tlv = TlvEncoder::new()
            .add(TlvType::Identifier, self.identity.username.as_bytes())
            .add(TlvType::Signature, &signature.to_bytes())
            .build();
        let sealed = seal_labelled(&encrypt_key, b"PV-Msg03", &sub_tlv)?;

        self.shared_secret = Some(*shared.as_bytes());

        Ok(TlvEncoder::new()
            .add_state(3)
            .add(TlvType::EncryptedData, &sealed)
            .build())
    }

    /// Check M4 and return the accessory-side view of the traffic keys
    ///
    /// # Errors
    /// Returns error if M4 carries an error code.
    pub fn finish(&self, m4: &[u8]) -> Result<SessionKeys, PairingError> {
        let tlv = TlvDecoder::decode(m4)?;
        check_response(&tlv, 4)?;
        let Some(shared) = &self.shared_secret else {
            return Err(PairingError::InvalidState {
                expected: 2,
                actual: 4,
            });
        };
        verify::derive_session_keys(shared)
    }
}

/// Mock controller connected over TCP
pub struct MockController {
    identity: ControllerIdentity,
    stream: TcpStream,
    codec: HttpClientCodec,
    channel: Option<EncryptedChannel>,
    events: VecDeque<HttpResponse>,
    accessory: Option<AccessoryPairing>,
}

impl MockController {
    /// Connect to an accessory server
    ///
    /// # Errors
    /// Returns `HapError::Io` if the connection fails.
    pub async fn connect(addr: SocketAddr, identity: ControllerIdentity) -> Result<Self, HapError> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        Ok(Self {
            identity,
            stream,
            codec: HttpClientCodec::new(),
            channel: None,
            events: VecDeque::new(),
            accessory: None,
        })
    }

    /// Controller identity used for pairing
    #[must_use]
    pub fn identity(&self) -> &ControllerIdentity {
        &self.identity
    }

    /// Accessory identity learned from Pair-Setup
    #[must_use]
    pub fn accessory(&self) -> Option<&AccessoryPairing> {
        self.accessory.as_ref()
    }

    /// Remember an accessory paired on another connection
    pub fn set_accessory(&mut self, accessory: AccessoryPairing) {
        self.accessory = Some(accessory);
    }

    /// Whether Pair-Verify has switched the connection to encrypted framing
    #[must_use]
    pub fn is_encrypted(&self) -> bool {
        self.channel.is_some()
    }

    /// Run Pair-Setup M1 to M6
    ///
    /// # Errors
    /// Returns error on I/O failure or when the accessory rejects a step.
    pub async fn pair_setup(&mut self, pincode: &str) -> Result<AccessoryPairing, HapError> {
        let identity = self.identity.clone();
        let mut exchange = SetupExchange::new(&identity)?;

        let m2 = self.post_tlv("/pair-setup", exchange.m1()).await?;
        let (m3, pending) = exchange.m3(&m2.body, pincode)?;
        let m4 = self.post_tlv("/pair-setup", m3).await?;
        let m5 = exchange.m5(&m4.body, pending)?;
        let m6 = self.post_tlv("/pair-setup", m5).await?;
        let accessory = exchange.finish(&m6.body)?;

        self.accessory = Some(accessory.clone());
        Ok(accessory)
    }

    /// Run Pair-Verify and switch to the encrypted transport
    ///
    /// # Errors
    /// Returns error on I/O failure or when the accessory rejects a step.
    pub async fn pair_verify(&mut self) -> Result<(), HapError> {
        let identity = self.identity.clone();
        let mut exchange = VerifyExchange::new(&identity);

        let m2 = self.post_tlv("/pair-verify", exchange.m1()).await?;
        let m3 = exchange.m3(&m2.body, self.accessory.as_ref())?;
        let m4 = self.post_tlv("/pair-verify", m3).await?;
        let keys = exchange.finish(&m4.body)?;

        self.channel = Some(EncryptedChannel::for_controller(&keys)?);
        Ok(())
    }

    /// POST a TLV body
    ///
    /// # Errors
    /// Returns error on I/O failure.
    pub async fn post_tlv(&mut self, path: &str, body: Vec<u8>) -> Result<HttpResponse, HapError> {
        self.request(Method::Post, path, Some((content_types::PAIRING_TLV8, body)))
            .await
    }

    /// GET a path
    ///
    /// # Errors
    /// Returns error on I/O failure.
    pub async fn get(&mut self, path: &str) -> Result<HttpResponse, HapError> {
        self.request(Method::Get, path, None).await
    }

    /// PUT a JSON body
    ///
    /// # Errors
    /// Returns error on I/O failure.
    pub async fn put_json(
        &mut self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<HttpResponse, HapError> {
        let body = serde_json::to_vec(body)?;
        self.request(Method::Put, path, Some((content_types::HAP_JSON, body)))
            .await
    }

    /// POST a JSON body
    ///
    /// # Errors
    /// Returns error on I/O failure.
    pub async fn post_json(
        &mut self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<HttpResponse, HapError> {
        let body = serde_json::to_vec(body)?;
        self.request(Method::Post, path, Some((content_types::HAP_JSON, body)))
            .await
    }

    /// Send a request and wait for its response
    ///
    /// Events arriving first are queued for [`next_event`](Self::next_event).
    ///
    /// # Errors
    /// Returns error on I/O failure or a malformed response.
    pub async fn request(
        &mut self,
        method: Method,
        path: &str,
        body: Option<(&str, Vec<u8>)>,
    ) -> Result<HttpResponse, HapError> {
        let bytes = encode_request(method, path, body);
        self.send_raw(&bytes).await?;

        loop {
            match self.read_message().await? {
                IncomingMessage::Response(response) => return Ok(response),
                IncomingMessage::Event(event) => self.events.push_back(event),
            }
        }
    }

    /// Write bytes through the transport without waiting for a reply
    ///
    /// # Errors
    /// Returns error on I/O failure.
    pub async fn send_raw(&mut self, bytes: &[u8]) -> Result<(), HapError> {
        let data = match self.channel.as_mut() {
            Some(channel) => channel.encrypt(bytes)?,
            None => bytes.to_vec(),
        };
        self.stream.write_all(&data).await?;
        Ok(())
    }

    /// Write bytes to the socket untouched
    ///
    /// # Errors
    /// Returns error on I/O failure.
    pub async fn send_unencrypted(&mut self, bytes: &[u8]) -> Result<(), HapError> {
        self.stream.write_all(bytes).await?;
        Ok(())
    }

    /// Wait for the next `EVENT/1.0` message
    ///
    /// # Errors
    /// Returns `HapError::UnexpectedResponse` on timeout or if a response
    /// arrives instead.
    pub async fn next_event(&mut self, timeout: Duration) -> Result<HttpResponse, HapError> {
        if let Some(event) = self.events.pop_front() {
            return Ok(event);
        }
        match tokio::time::timeout(timeout, self.read_message()).await {
            Ok(Ok(IncomingMessage::Event(event))) => Ok(event),
            Ok(Ok(IncomingMessage::Response(response))) => Err(HapError::UnexpectedResponse(
                format!("response {} while waiting for event", response.status.as_u16()),
            )),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(HapError::UnexpectedResponse("no event before timeout".into())),
        }
    }

    /// Whether the accessory has closed the connection
    ///
    /// # Errors
    /// Returns error if unexpected data arrives instead.
    pub async fn wait_closed(&mut self, timeout: Duration) -> Result<bool, HapError> {
        let mut buf = [0u8; 1024];
        match tokio::time::timeout(timeout, self.stream.read(&mut buf)).await {
            Ok(Ok(0) | Err(_)) => Ok(true),
            Ok(Ok(_)) => Err(HapError::UnexpectedResponse(
                "data received on closing connection".into(),
            )),
            Err(_) => Ok(false),
        }
    }

    async fn read_message(&mut self) -> Result<IncomingMessage, HapError> {
        let mut buf = vec![0u8; 4096];
        loop {
            if let Some(message) = self.codec.decode()? {
                return Ok(message);
            }

            let n = self.stream.read(&mut buf).await?;
            if n == 0 {
                return Err(HapError::ConnectionClosed);
            }

            match self.channel.as_mut() {
                Some(channel) => {
                    channel.feed(&buf[..n]);
                    let plaintext = channel.decrypt_all()?;
                    self.codec.feed(&plaintext);
                }
                None => self.codec.feed(&buf[..n]),
            }
        }
    }
}

/// Encode a controller request
#[must_use]
pub fn encode_request(method: Method, path: &str, body: Option<(&str, Vec<u8>)>) -> Vec<u8> {
    let mut output = format!("{method} {path} HTTP/1.1\r\nHost: accessory.local\r\n").into_bytes();
    match body {
        Some((content_type, body)) => {
            output.extend_from_slice(
                format!(
                    "Content-Type: {content_type}\r\nContent-Length: {}\r\n\r\n",
                    body.len()
                )
                .as_bytes(),
            );
            output.extend_from_slice(&body);
        }
        None => output.extend_from_slice(b"\r\n"),
    }
    output
}
