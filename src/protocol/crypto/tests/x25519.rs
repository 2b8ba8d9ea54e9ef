use super::super::*;
use super::hex;

// RFC 7748 section 6.1
const ALICE_SECRET: &str = "77076d0a7318a57d3c16c17251b26645df4c2f87ebc0992ab177fba51db92c2a";
const ALICE_PUBLIC: &str = "8520f0098930a754748b7ddcb43ef75a0dbf3a0d26381af4eba4a98eaa9b4e6a";
const BOB_SECRET: &str = "5dab087e624a8a4b79e17f8b83800ee66f3bb1292618b6fd1c2f8b27ff88e0eb";
const BOB_PUBLIC: &str = "de9edb7d7b7dc1b4d35b61c2ece435373f8343c85b78674dadfc7e146f882b4f";
const SHARED: &str = "4a5d9d5ba4ce2de1728e3bf480350f25e07e21c947d19e3376f09b3c1e161742";

#[test]
fn test_x25519_rfc7748_vector() {
    let alice = X25519KeyPair::from_bytes(&hex(ALICE_SECRET)).unwrap();
    let bob = X25519KeyPair::from_bytes(&hex(BOB_SECRET)).unwrap();

    assert_eq!(alice.public_key().as_bytes().to_vec(), hex(ALICE_PUBLIC));
    assert_eq!(bob.public_key().as_bytes().to_vec(), hex(BOB_PUBLIC));

    let bob_public = X25519PublicKey::from_bytes(&hex(BOB_PUBLIC)).unwrap();
    let shared = alice.diffie_hellman(&bob_public).unwrap();
    assert_eq!(shared.as_bytes().to_vec(), hex(SHARED));
}

#[test]
fn test_x25519_random_exchange_agrees() {
    let accessory = X25519KeyPair::generate();
    let controller = X25519KeyPair::generate();

    let a = accessory.diffie_hellman(&controller.public_key()).unwrap();
    let b = controller.diffie_hellman(&accessory.public_key()).unwrap();

    assert_eq!(a.as_bytes(), b.as_bytes());
}

#[test]
fn test_x25519_public_key_length() {
    assert!(matches!(
        X25519PublicKey::from_bytes(&[9u8; 16]),
        Err(CryptoError::InvalidLength {
            expected: 32,
            actual: 16,
            ..
        })
    ));
}

#[test]
fn test_x25519_rejects_low_order_point() {
    let accessory = X25519KeyPair::generate();
    let identity = X25519PublicKey::from_bytes(&[0u8; 32]).unwrap();
    assert!(matches!(
        accessory.diffie_hellman(&identity),
        Err(CryptoError::NonContributory)
    ));
}
