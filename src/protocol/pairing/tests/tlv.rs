use crate::protocol::pairing::tlv::{TlvDecoder, TlvEncoder, TlvError, TlvType, errors};

#[test]
fn test_tlv_encode_simple() {
    let encoded = TlvEncoder::new()
        .add_state(2)
        .add_error(errors::AUTHENTICATION)
        .build();

    assert_eq!(
        encoded,
        vec![
            0x06, 0x01, 0x02, // State = 2
            0x07, 0x01, 0x02, // Error = Authentication
        ]
    );
}

#[test]
fn test_tlv_decode_simple() {
    let data = vec![0x06, 0x01, 0x01, 0x00, 0x01, 0x00];
    let decoder = TlvDecoder::decode(&data).unwrap();

    assert_eq!(decoder.get_state().unwrap(), 1);
    assert_eq!(decoder.get(TlvType::Method), Some(&[0u8][..]));
    assert_eq!(decoder.items().len(), 2);
}

#[test]
fn test_tlv_exactly_255_is_one_fragment() {
    let value = vec![0x11; 255];
    let encoded = TlvEncoder::new().add(TlvType::PublicKey, &value).build();

    assert_eq!(encoded.len(), 257);
    assert_eq!(encoded[1], 255);

    let decoder = TlvDecoder::decode(&encoded).unwrap();
    assert_eq!(decoder.get(TlvType::PublicKey).unwrap(), &value[..]);
}

#[test]
fn test_tlv_256_splits_into_two_fragments() {
    let value = vec![0x22; 256];
    let encoded = TlvEncoder::new().add(TlvType::PublicKey, &value).build();

    // 2 + 255 + 2 + 1
    assert_eq!(encoded.len(), 260);
    assert_eq!(encoded[257], TlvType::PublicKey as u8);
    assert_eq!(encoded[258], 1);

    let decoder = TlvDecoder::decode(&encoded).unwrap();
    assert_eq!(decoder.get(TlvType::PublicKey).unwrap(), &value[..]);
    assert_eq!(decoder.items().len(), 1);
}

#[test]
fn test_tlv_srp_key_three_fragments() {
    // SRP public keys are 384 bytes; 255 + 129
    let mut value = vec![0u8; 384];
    for (i, b) in value.iter_mut().enumerate() {
        *b = (i % 251) as u8;
    }
    let encoded = TlvEncoder::new()
        .add_state(2)
        .add(TlvType::PublicKey, &value)
        .add(TlvType::Salt, &[7u8; 16])
        .build();

    let decoder = TlvDecoder::decode(&encoded).unwrap();
    assert_eq!(decoder.get(TlvType::PublicKey).unwrap(), &value[..]);
    assert_eq!(decoder.get(TlvType::Salt).unwrap(), &[7u8; 16][..]);

    let multiple = vec![0xAA; 520];
    let encoded = TlvEncoder::new().add(TlvType::EncryptedData, &multiple).build();
    assert_eq!(encoded.len(), 520 + 3 * 2);
    let decoder = TlvDecoder::decode(&encoded).unwrap();
    assert_eq!(decoder.get(TlvType::EncryptedData).unwrap().len(), 520);
}

#[test]
fn test_tlv_zero_length() {
    let encoded = TlvEncoder::new().add(TlvType::Method, &[]).build();

    assert_eq!(encoded, vec![0x00, 0x00]);

    let decoder = TlvDecoder::decode(&encoded).unwrap();
    assert_eq!(decoder.get(TlvType::Method), Some(&[][..]));
}

#[test]
fn test_tlv_preserves_emission_order() {
    let encoded = TlvEncoder::new()
        .add(TlvType::Signature, b"sig")
        .add(TlvType::Identifier, b"id")
        .add_state(3)
        .build();

    let decoder = TlvDecoder::decode(&encoded).unwrap();
    let tags: Vec<u8> = decoder.items().iter().map(|item| item.tag).collect();
    assert_eq!(tags, vec![0x0A, 0x01, 0x06]);
}

#[test]
fn test_tlv_get_returns_first_of_repeated_tag() {
    let encoded = TlvEncoder::new()
        .add(TlvType::Identifier, b"first")
        .add_state(1)
        .add(TlvType::Identifier, b"second")
        .build();

    let decoder = TlvDecoder::decode(&encoded).unwrap();
    assert_eq!(decoder.get(TlvType::Identifier), Some(&b"first"[..]));
    assert_eq!(decoder.items().len(), 3);
}

#[test]
fn test_tlv_truncated_header() {
    let result = TlvDecoder::decode(&[0x00]);
    assert_eq!(result, Err(TlvError::BufferTooSmall));
}

#[test]
fn test_tlv_truncated_value() {
    let data = vec![0x06, 0x01, 0x01, 0x00, 0x05, 0x01, 0x02];
    let result = TlvDecoder::decode(&data);
    assert_eq!(result, Err(TlvError::BufferTooSmall));
}

#[test]
fn test_tlv_fixed_width_integers_keep_all_bytes() {
    let encoded = TlvEncoder::new()
        .add_u16(TlvType::RetryDelay, 1)
        .add_u32(TlvType::Flags, 0x10)
        .add_u64(TlvType::Certificate, 0)
        .build();

    assert_eq!(&encoded[0..4], &[0x08, 0x02, 0x01, 0x00]);
    assert_eq!(&encoded[4..10], &[0x13, 0x04, 0x10, 0x00, 0x00, 0x00]);
    assert_eq!(&encoded[10..12], &[0x09, 0x08]);

    let decoder = TlvDecoder::decode(&encoded).unwrap();
    assert_eq!(decoder.get_u16(TlvType::RetryDelay).unwrap(), 1);
    assert_eq!(decoder.get_u32(TlvType::Flags).unwrap(), 0x10);
    assert_eq!(decoder.get_u64(TlvType::Certificate).unwrap(), 0);
    assert_eq!(
        decoder.get_u32(TlvType::RetryDelay),
        Err(TlvError::InvalidValue(TlvType::RetryDelay))
    );
}

#[test]
fn test_tlv_missing_state() {
    let decoder = TlvDecoder::decode(&[0x00, 0x01, 0x00]).unwrap();
    assert_eq!(
        decoder.get_state(),
        Err(TlvError::MissingField(TlvType::State))
    );
}

#[test]
fn test_decode_list_splits_on_separator_records() {
    let encoded = TlvEncoder::new()
        .add(TlvType::Identifier, b"alice")
        .add(TlvType::PublicKey, &[1u8; 32])
        .add_byte(TlvType::Permissions, 1)
        .add_separator()
        .add(TlvType::Identifier, b"bob")
        .add(TlvType::PublicKey, &[2u8; 32])
        .add_byte(TlvType::Permissions, 0)
        .build();

    let records = TlvDecoder::decode_list(&encoded, TlvType::Identifier).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].get(TlvType::Identifier), Some(&b"alice"[..]));
    assert_eq!(records[0].get_u8(TlvType::Permissions), Some(1));
    assert_eq!(records[1].get(TlvType::Identifier), Some(&b"bob"[..]));
    assert_eq!(records[1].get(TlvType::PublicKey), Some(&[2u8; 32][..]));
}

#[test]
fn test_decode_list_keeps_fragmented_list_tag_together() {
    let long_id = vec![b'x'; 300];
    let encoded = TlvEncoder::new()
        .add(TlvType::Identifier, &long_id)
        .add_byte(TlvType::Permissions, 0)
        .build();

    let records = TlvDecoder::decode_list(&encoded, TlvType::Identifier).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].get(TlvType::Identifier).unwrap().len(), 300);
}

#[test]
fn test_decode_list_requires_leading_list_tag() {
    let encoded = TlvEncoder::new()
        .add_state(2)
        .add(TlvType::Identifier, b"alice")
        .build();

    assert_eq!(
        TlvDecoder::decode_list(&encoded, TlvType::Identifier),
        Err(TlvError::InvalidStructure)
    );
}
