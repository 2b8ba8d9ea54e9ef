use crate::server::encrypted_channel::EncryptedChannel;
use proptest::prelude::*;

proptest! {
    // Arbitrary messages survive framing in any chunking
    #[test]
    fn test_encrypt_decrypt_roundtrip(
        key_a in proptest::collection::vec(any::<u8>(), 32),
        key_b in proptest::collection::vec(any::<u8>(), 32),
        message in proptest::collection::vec(any::<u8>(), 0..4096),
        split in 1usize..64,
    ) {
        let mut sender = EncryptedChannel::new(&key_a, &key_b).unwrap();
        let mut receiver = EncryptedChannel::new(&key_b, &key_a).unwrap();

        let encrypted = sender.encrypt(&message).unwrap();

        let mut decrypted = Vec::new();
        for chunk in encrypted.chunks(split) {
            receiver.feed(chunk);
            decrypted.extend(receiver.decrypt_all().unwrap());
        }

        prop_assert_eq!(decrypted, message);
        prop_assert_eq!(receiver.buffered(), 0);
    }

    // Garbage on the wire never panics
    #[test]
    fn test_decrypt_random_garbage(
        key in proptest::collection::vec(any::<u8>(), 32),
        garbage in proptest::collection::vec(any::<u8>(), 0..2048)
    ) {
        let mut receiver = EncryptedChannel::new(&key, &key).unwrap();

        receiver.feed(&garbage);
        let _ = receiver.decrypt_all();
    }
}
