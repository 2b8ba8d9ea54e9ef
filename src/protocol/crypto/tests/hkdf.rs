use super::super::*;
use super::hex;

#[test]
fn test_hkdf_sha512_known_answer() {
    // RFC 5869 test case 1 inputs with SHA-512
    let ikm = hex("0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b");
    let salt = hex("000102030405060708090a0b0c");
    let info = hex("f0f1f2f3f4f5f6f7f8f9");

    let okm = HkdfSha512::new(&salt, &ikm).expand::<42>(&info).unwrap();
    assert_eq!(
        okm.to_vec(),
        hex("832390086cda71fb47625bb5ceb168e4c8e26a1a16ed34d9fc7fe92c1481579338da362cb8d9f925d7cb")
    );
}

#[test]
fn test_label_matches_raw_hkdf() {
    let ikm = [0x42u8; 32];
    let derived = labels::PAIR_VERIFY_ENCRYPT.derive(&ikm).unwrap();
    let raw = HkdfSha512::new(b"Pair-Verify-Encrypt-Salt", &ikm)
        .expand::<32>(b"Pair-Verify-Encrypt-Info")
        .unwrap();
    assert_eq!(derived, raw);
}

#[test]
fn test_control_keys_are_directional() {
    let shared = [0x42u8; 32];

    let read = labels::CONTROL_READ.derive(&shared).unwrap();
    let write = labels::CONTROL_WRITE.derive(&shared).unwrap();

    assert_ne!(read, write);
    assert_eq!(read, labels::CONTROL_READ.derive(&shared).unwrap());
    assert_eq!(labels::CONTROL_READ.salt, labels::CONTROL_WRITE.salt);
}

#[test]
fn test_setup_labels_are_distinct() {
    let all = [
        labels::PAIR_SETUP_ENCRYPT,
        labels::PAIR_SETUP_CONTROLLER_SIGN,
        labels::PAIR_SETUP_ACCESSORY_SIGN,
        labels::PAIR_VERIFY_ENCRYPT,
    ];
    let keys: Vec<_> = all.iter().map(|l| l.derive(b"K").unwrap()).collect();
    for (i, a) in keys.iter().enumerate() {
        for b in &keys[i + 1..] {
            assert_ne!(a, b);
        }
    }
}

#[test]
fn test_hkdf_rejects_oversized_output() {
    // SHA-512 HKDF can produce at most 255 * 64 bytes
    assert_eq!(
        HkdfSha512::new(b"", b"ikm").expand::<{ 255 * 64 + 1 }>(b"info"),
        Err(CryptoError::KeyDerivation(255 * 64 + 1))
    );
}
