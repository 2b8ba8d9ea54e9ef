use crate::protocol::pairing::SessionKeys;
use crate::server::encrypted_channel::{EncryptedChannel, EncryptionError, MAX_FRAME_PLAINTEXT};

fn keys() -> SessionKeys {
    SessionKeys {
        encrypt_key: [0x11; 32],
        decrypt_key: [0x22; 32],
    }
}

fn pair() -> (EncryptedChannel, EncryptedChannel) {
    let keys = keys();
    (
        EncryptedChannel::for_accessory(&keys).unwrap(),
        EncryptedChannel::for_controller(&keys).unwrap(),
    )
}

#[test]
fn test_frame_layout() {
    let (_, mut controller) = pair();
    let frame = controller.encrypt(b"hello").unwrap();

    assert_eq!(frame.len(), 2 + 5 + 16);
    assert_eq!(&frame[..2], &[5, 0]);
    assert_eq!(controller.encrypt_nonce(), 1);
}

#[test]
fn test_both_directions() {
    let (mut accessory, mut controller) = pair();

    let request = controller.encrypt(b"GET /accessories HTTP/1.1\r\n\r\n").unwrap();
    accessory.feed(&request);
    assert_eq!(
        accessory.decrypt().unwrap().unwrap(),
        b"GET /accessories HTTP/1.1\r\n\r\n"
    );

    let response = accessory.encrypt(b"HTTP/1.1 204 No Content\r\n\r\n").unwrap();
    controller.feed(&response);
    assert_eq!(
        controller.decrypt().unwrap().unwrap(),
        b"HTTP/1.1 204 No Content\r\n\r\n"
    );
}

#[test]
fn test_outbound_waits_for_first_inbound_frame() {
    let (mut accessory, mut controller) = pair();
    assert!(!accessory.outbound_active());

    accessory.feed(&controller.encrypt(b"x").unwrap());
    accessory.decrypt().unwrap();
    assert!(accessory.outbound_active());
}

#[test]
fn test_large_message_is_split() {
    let (mut accessory, mut controller) = pair();
    let message = vec![0xAB; MAX_FRAME_PLAINTEXT * 2 + 10];

    let frames = accessory.encrypt(&message).unwrap();
    assert_eq!(accessory.encrypt_nonce(), 3);
    assert_eq!(frames.len(), message.len() + 3 * 18);

    controller.feed(&frames);
    assert_eq!(controller.decrypt_all().unwrap(), message);
    assert_eq!(controller.decrypt_nonce(), 3);
}

#[test]
fn test_partial_frames() {
    let (mut accessory, mut controller) = pair();
    let frame = controller.encrypt(b"partial").unwrap();

    accessory.feed(&frame[..1]);
    assert!(accessory.decrypt().unwrap().is_none());
    accessory.feed(&frame[1..10]);
    assert!(accessory.decrypt().unwrap().is_none());
    assert_eq!(accessory.buffered(), 10);

    accessory.feed(&frame[10..]);
    assert_eq!(accessory.decrypt().unwrap().unwrap(), b"partial");
    assert_eq!(accessory.buffered(), 0);
}

#[test]
fn test_tampered_frame_fails() {
    let (mut accessory, mut controller) = pair();
    let mut frame = controller.encrypt(b"payload").unwrap();
    frame[4] ^= 0x01;

    accessory.feed(&frame);
    assert_eq!(accessory.decrypt(), Err(EncryptionError::DecryptionFailed));
}

#[test]
fn test_tampered_length_fails() {
    let (mut accessory, mut controller) = pair();
    let mut frame = controller.encrypt(b"payload").unwrap();
    frame.push(0);
    frame[0] = 8;

    accessory.feed(&frame);
    assert_eq!(accessory.decrypt(), Err(EncryptionError::DecryptionFailed));
}

#[test]
fn test_replayed_frame_fails() {
    let (mut accessory, mut controller) = pair();
    let frame = controller.encrypt(b"once").unwrap();

    accessory.feed(&frame);
    accessory.decrypt().unwrap();
    accessory.feed(&frame);
    assert_eq!(accessory.decrypt(), Err(EncryptionError::DecryptionFailed));
}

#[test]
fn test_oversized_length_prefix() {
    let (mut accessory, _) = pair();
    accessory.feed(&[0x01, 0x08]);
    assert_eq!(
        accessory.decrypt(),
        Err(EncryptionError::InvalidFrameLength(0x0801))
    );
}

#[test]
fn test_invalid_key_length() {
    assert!(matches!(
        EncryptedChannel::new(&[0u8; 16], &[0u8; 32]),
        Err(EncryptionError::InvalidKey)
    ));
}
