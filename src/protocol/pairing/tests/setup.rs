use super::{PIN, accessory, controller, decode};
use crate::protocol::pairing::tlv::{TlvEncoder, TlvType, errors};
use crate::protocol::pairing::{PairSetup, PairSetupState, PairingError, Permission};
use crate::testing::SetupExchange;

const SALT: [u8; 16] = [0x5a; 16];
const SERVER_SECRET: [u8; 32] = [0x11; 32];

#[test]
fn test_full_setup_exchange() {
    let identity = accessory();
    let ctrl = controller();
    let engine = PairSetup::new(&identity, PIN);
    let mut exchange = SetupExchange::new(&ctrl).unwrap();

    let (m2, state) = engine.handle_m1(&decode(&exchange.m1())).unwrap();
    let (m3, pending) = exchange.m3(&m2, PIN).unwrap();
    let (m4, state) = engine.handle_m3(state, &decode(&m3)).unwrap();
    assert!(matches!(state, PairSetupState::AwaitingM5 { .. }));

    let m5 = exchange.m5(&m4, pending).unwrap();
    let complete = engine.handle_m5(state, &decode(&m5)).unwrap();

    assert_eq!(complete.controller.username, ctrl.username);
    assert_eq!(complete.controller.public_key, ctrl.public_key());
    assert_eq!(complete.controller.permission, Permission::Admin);

    let accessory_pairing = exchange.finish(&complete.response).unwrap();
    assert_eq!(accessory_pairing.username, identity.username);
    assert_eq!(
        accessory_pairing.public_key,
        *identity.keypair.public_key().as_bytes()
    );
}

#[test]
fn test_m2_carries_salt_and_padded_key() {
    let identity = accessory();
    let engine = PairSetup::new(&identity, PIN);
    let m1 = TlvEncoder::new()
        .add_state(1)
        .add_byte(TlvType::Method, 0)
        .build();

    let (m2, state) = engine
        .handle_m1_with(&decode(&m1), &SALT, &SERVER_SECRET)
        .unwrap();
    let m2 = decode(&m2);

    assert_eq!(m2.get_state().unwrap(), 2);
    assert_eq!(m2.get(TlvType::Salt), Some(&SALT[..]));
    assert_eq!(m2.get(TlvType::PublicKey).unwrap().len(), 384);
    assert_eq!(state.expected(), 3);
}

#[test]
fn test_m1_is_deterministic_with_fixed_secret() {
    let identity = accessory();
    let engine = PairSetup::new(&identity, PIN);
    let m1 = decode(&TlvEncoder::new().add_state(1).build());

    let (a, _) = engine.handle_m1_with(&m1, &SALT, &SERVER_SECRET).unwrap();
    let (b, _) = engine.handle_m1_with(&m1, &SALT, &SERVER_SECRET).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_wrong_pin_fails_authentication() {
    let identity = accessory();
    let ctrl = controller();
    let engine = PairSetup::new(&identity, PIN);
    let exchange = SetupExchange::new(&ctrl).unwrap();

    let (m2, state) = engine.handle_m1(&decode(&exchange.m1())).unwrap();
    let (m3, _) = exchange.m3(&m2, "111-22-333").unwrap();

    let err = engine.handle_m3(state, &decode(&m3)).unwrap_err();
    assert!(matches!(err, PairingError::SrpVerificationFailed));
    assert_eq!(err.tlv_code(), errors::AUTHENTICATION);
    assert_eq!(
        err.response(4),
        vec![0x06, 0x01, 0x04, 0x07, 0x01, errors::AUTHENTICATION]
    );
}

#[test]
fn test_out_of_order_message_is_rejected() {
    let identity = accessory();
    let ctrl = controller();
    let engine = PairSetup::new(&identity, PIN);
    let exchange = SetupExchange::new(&ctrl).unwrap();

    let (_, state) = engine.handle_m1(&decode(&exchange.m1())).unwrap();
    let m5 = TlvEncoder::new()
        .add_state(5)
        .add(TlvType::EncryptedData, &[0u8; 32])
        .build();

    let err = engine.handle_m5(state, &decode(&m5)).unwrap_err();
    assert!(matches!(
        err,
        PairingError::InvalidState {
            expected: 3,
            actual: 5
        }
    ));
    assert_eq!(err.tlv_code(), errors::UNKNOWN);
}

#[test]
fn test_m3_missing_proof() {
    let identity = accessory();
    let ctrl = controller();
    let engine = PairSetup::new(&identity, PIN);
    let exchange = SetupExchange::new(&ctrl).unwrap();

    let (_, state) = engine.handle_m1(&decode(&exchange.m1())).unwrap();
    let m3 = TlvEncoder::new()
        .add_state(3)
        .add(TlvType::PublicKey, &[1u8; 384])
        .build();

    let err = engine.handle_m3(state, &decode(&m3)).unwrap_err();
    assert!(matches!(err, PairingError::Tlv(_)));
}

#[test]
fn test_tampered_m5_fails_decryption() {
    let identity = accessory();
    let ctrl = controller();
    let engine = PairSetup::new(&identity, PIN);
    let mut exchange = SetupExchange::new(&ctrl).unwrap();

    let (m2, state) = engine.handle_m1(&decode(&exchange.m1())).unwrap();
    let (m3, pending) = exchange.m3(&m2, PIN).unwrap();
    let (m4, state) = engine.handle_m3(state, &decode(&m3)).unwrap();
    let m5 = exchange.m5(&m4, pending).unwrap();

    let mut sealed = decode(&m5).get(TlvType::EncryptedData).unwrap().to_vec();
    sealed[0] ^= 0xff;
    let tampered = TlvEncoder::new()
        .add_state(5)
        .add(TlvType::EncryptedData, &sealed)
        .build();

    let err = engine.handle_m5(state, &decode(&tampered)).unwrap_err();
    assert_eq!(err.tlv_code(), errors::AUTHENTICATION);
}
