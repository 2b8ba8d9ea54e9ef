use super::{CryptoError, lengths};
use num_bigint::BigUint;
use num_traits::Zero;
use rand::RngCore;
use sha2::{Digest, Sha512};
use zeroize::Zeroize;

/// SRP username used by every HAP Pair-Setup exchange
pub const SRP_IDENTITY: &[u8] = b"Pair-Setup";

/// Length of the random SRP private exponent
const SECRET_LEN: usize = 32;

const N_3072_HEX: &[u8] = b"FFFFFFFFFFFFFFFFC90FDAA22168C234C4C6628B80DC1CD129024E08\
    8A67CC74020BBEA63B139B22514A08798E3404DDEF9519B3CD3A431B\
    302B0A6DF25F14374FE1356D6D51C245E485B576625E7EC6F44C42E9\
    A637ED6B0BFF5CB6F406B7EDEE386BFB5A899FA5AE9F24117C4B1FE6\
    49286651ECE45B3DC2007CB8A163BF0598DA48361C55D39A69163FA8\
    FD24CF5F83655D23DCA3AD961C62F356208552BB9ED529077096966D\
    670C354E4ABC9804F1746C08CA18217C32905E462E36CE3BE39E772C\
    180E86039B2783A2EC07A28FB5C55DF06F4C52C9DE2BCBF695581718\
    3995497CEA956AE515D2261898FA051015728E5A8AAAC42DAD33170D\
    04507A33A85521ABDF1CBA64ECFB850458DBEF0A8AEA71575D060C7D\
    B3970F85A6E1E4C7ABF5AE8CDB0933D71E8C94E04A25619DCEE3D226\
    1AD2EE6BF12FFA06D98A0864D87602733EC86A64521F2B18177B200C\
    BBE117577A615D6C770988C0BAD946E208E24FA074E5AB3143DB5BFC\
    E0FD108E4B82D120A93AD2CAFFFFFFFFFFFFFFFF";

/// RFC 5054 3072-bit group with SHA-512, as used by `HomeKit`
#[derive(Clone)]
pub struct SrpGroup {
    n: BigUint,
    g: BigUint,
    /// k = H(N | PAD(g))
    k: BigUint,
}

impl SrpGroup {
    /// Load the 3072-bit group (`g = 5`)
    pub fn rfc5054_3072() -> Result<Self, CryptoError> {
        // Whitespace from the line continuations is skipped by filtering
        let hex: Vec<u8> = N_3072_HEX
            .iter()
            .copied()
            .filter(u8::is_ascii_hexdigit)
            .collect();
        let n = BigUint::parse_bytes(&hex, 16)
            .ok_or_else(|| CryptoError::Srp("failed to parse N"))?;
        let g = BigUint::from(5u32);
        let k = BigUint::from_bytes_be(&hash(&[&n.to_bytes_be(), &pad(&g)]));
        Ok(Self { n, g, k })
    }

    fn verifier(&self, identity: &[u8], password: &[u8], salt: &[u8]) -> BigUint {
        // x = H(s | H(I ":" P))
        let inner = hash(&[identity, b":", password]);
        let x = BigUint::from_bytes_be(&hash(&[salt, &inner]));
        self.g.modpow(&x, &self.n)
    }

    /// M1 = H(H(N) xor H(g) | H(I) | s | A | B | K)
    fn client_proof(
        &self,
        identity: &[u8],
        salt: &[u8],
        a_pub: &[u8],
        b_pub: &[u8],
        session_key: &[u8],
    ) -> Vec<u8> {
        let hn = Sha512::digest(self.n.to_bytes_be());
        let hg = Sha512::digest(self.g.to_bytes_be());
        let hn_xor_hg: Vec<u8> = hn.iter().zip(hg.iter()).map(|(a, b)| a ^ b).collect();
        let h_identity = hash(&[identity]);
        hash(&[&hn_xor_hg, &h_identity, salt, a_pub, b_pub, session_key])
    }
}

/// Left-pad a group element to the modulus length
fn pad(value: &BigUint) -> Vec<u8> {
    pad_bytes(&value.to_bytes_be())
}

fn pad_bytes(bytes: &[u8]) -> Vec<u8> {
    if bytes.len() >= lengths::SRP_MODULUS {
        return bytes.to_vec();
    }
    let mut padded = vec![0u8; lengths::SRP_MODULUS];
    padded[lengths::SRP_MODULUS - bytes.len()..].copy_from_slice(bytes);
    padded
}

fn hash(parts: &[&[u8]]) -> Vec<u8> {
    let mut hasher = Sha512::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().to_vec()
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

fn random_secret() -> [u8; SECRET_LEN] {
    let mut secret = [0u8; SECRET_LEN];
    rand::thread_rng().fill_bytes(&mut secret);
    secret
}

/// Server side of SRP-6a, one instance per Pair-Setup attempt
pub struct SrpServer {
    group: SrpGroup,
    identity: Vec<u8>,
    salt: Vec<u8>,
    verifier: BigUint,
    b: BigUint,
    public_key: Vec<u8>,
}

impl SrpServer {
    /// Start a session for `identity`/`password` with a random private exponent
    pub fn new(identity: &[u8], password: &[u8], salt: &[u8]) -> Result<Self, CryptoError> {
        let mut secret = random_secret();
        let server = Self::with_secret(identity, password, salt, &secret);
        secret.zeroize();
        server
    }

    /// Start a session with a caller-provided private exponent
    pub fn with_secret(
        identity: &[u8],
        password: &[u8],
        salt: &[u8],
        secret: &[u8],
    ) -> Result<Self, CryptoError> {
        let group = SrpGroup::rfc5054_3072()?;
        let verifier = group.verifier(identity, password, salt);
        let b = BigUint::from_bytes_be(secret);

        // B = (k*v + g^b) % N
        let b_pub = (&group.k * &verifier + group.g.modpow(&b, &group.n)) % &group.n;
        let public_key = pad(&b_pub);

        Ok(Self {
            group,
            identity: identity.to_vec(),
            salt: salt.to_vec(),
            verifier,
            b,
            public_key,
        })
    }

    /// Salt the verifier was computed with
    pub fn salt(&self) -> &[u8] {
        &self.salt
    }

    /// Padded public ephemeral `B`
    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    /// Check the client's `A` and proof `M1`
    ///
    /// Returns the shared session key and the server proof `M2`.
    pub fn verify_client(
        &self,
        client_public: &[u8],
        client_proof: &[u8],
    ) -> Result<(SessionKey, Vec<u8>), CryptoError> {
        let n = &self.group.n;

        if client_public.len() > lengths::SRP_MODULUS {
            return Err(CryptoError::Srp("client public key too long"));
        }
        let a_pub = BigUint::from_bytes_be(client_public);
        if a_pub.is_zero() || &a_pub >= n {
            return Err(CryptoError::Srp("invalid client public key"));
        }
        let a_padded = pad_bytes(client_public);

        // u = H(PAD(A) | PAD(B))
        let u = BigUint::from_bytes_be(&hash(&[&a_padded, &self.public_key]));
        if u.is_zero() {
            return Err(CryptoError::Srp("scrambling parameter is zero"));
        }

        // S = (A * v^u) ^ b % N
        let base = (&a_pub * self.verifier.modpow(&u, n)) % n;
        let shared = base.modpow(&self.b, n);
        let session_key = hash(&[&pad(&shared)]);

        let expected = self.group.client_proof(
            &self.identity,
            &self.salt,
            &a_padded,
            &self.public_key,
            &session_key,
        );
        if !constant_time_eq(&expected, client_proof) {
            return Err(CryptoError::Srp("client proof mismatch"));
        }

        // M2 = H(A | M1 | K)
        let server_proof = hash(&[&a_padded, &expected, &session_key]);

        Ok((SessionKey { key: session_key }, server_proof))
    }
}

/// Client side of SRP-6a, used by controllers and in tests
pub struct SrpClient {
    group: SrpGroup,
    a: BigUint,
    public_key: Vec<u8>,
}

impl SrpClient {
    /// Create a client with a random private exponent
    pub fn new() -> Result<Self, CryptoError> {
        let mut secret = random_secret();
        let client = Self::with_secret(&secret);
        secret.zeroize();
        client
    }

    /// Create a client with a caller-provided private exponent
    pub fn with_secret(secret: &[u8]) -> Result<Self, CryptoError> {
        let group = SrpGroup::rfc5054_3072()?;
        let a = BigUint::from_bytes_be(secret) % &group.n;
        let public_key = pad(&group.g.modpow(&a, &group.n));
        Ok(Self {
            group,
            a,
            public_key,
        })
    }

    /// Padded public ephemeral `A`
    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    /// Compute the session key and client proof from the server's challenge
    pub fn process_challenge(
        &self,
        identity: &[u8],
        password: &[u8],
        salt: &[u8],
        server_public: &[u8],
    ) -> Result<SrpVerifier, CryptoError> {
        let n = &self.group.n;
        let b_pub = BigUint::from_bytes_be(server_public);
        if (&b_pub % n).is_zero() {
            return Err(CryptoError::Srp("invalid server public key"));
        }
        let b_padded = pad(&b_pub);

        let u = BigUint::from_bytes_be(&hash(&[&self.public_key, &b_padded]));
        let inner = hash(&[identity, b":", password]);
        let x = BigUint::from_bytes_be(&hash(&[salt, &inner]));

        // S = (B - k * g^x) ^ (a + u * x) % N, kept non-negative
        let k_g_x = (&self.group.k * self.group.g.modpow(&x, n)) % n;
        let base = ((&b_pub % n) + n - k_g_x) % n;
        let exponent = &self.a + (&u * x);
        let shared = base.modpow(&exponent, n);
        let session_key = hash(&[&pad(&shared)]);

        let proof = self.group.client_proof(
            identity,
            salt,
            &self.public_key,
            &b_padded,
            &session_key,
        );

        Ok(SrpVerifier {
            a_pub: self.public_key.clone(),
            proof,
            session_key,
        })
    }
}

/// Client state after sending `M1`
pub struct SrpVerifier {
    a_pub: Vec<u8>,
    proof: Vec<u8>,
    session_key: Vec<u8>,
}

impl SrpVerifier {
    /// Client proof `M1`
    pub fn client_proof(&self) -> &[u8] {
        &self.proof
    }

    /// Check the server proof `M2`
    pub fn verify_server(&self, server_proof: &[u8]) -> Result<SessionKey, CryptoError> {
        let expected = hash(&[&self.a_pub, &self.proof, &self.session_key]);

        if !constant_time_eq(&expected, server_proof) {
            return Err(CryptoError::Srp("server proof verification failed"));
        }

        Ok(SessionKey {
            key: self.session_key.clone(),
        })
    }
}

impl Drop for SrpVerifier {
    fn drop(&mut self) {
        self.session_key.zeroize();
    }
}

/// Shared SRP session key `K`
pub struct SessionKey {
    key: Vec<u8>,
}

impl SessionKey {
    pub fn as_bytes(&self) -> &[u8] {
        &self.key
    }
}

impl Drop for SessionKey {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}
