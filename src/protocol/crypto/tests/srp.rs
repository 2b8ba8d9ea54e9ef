use super::super::*;

const PIN: &[u8] = b"031-45-154";

fn handshake(
    server: &SrpServer,
    client: &SrpClient,
    password: &[u8],
) -> Result<(SessionKey, Vec<u8>), CryptoError> {
    let verifier =
        client.process_challenge(SRP_IDENTITY, password, server.salt(), server.public_key())?;
    server.verify_client(client.public_key(), verifier.client_proof())
}

#[test]
fn test_srp_public_keys_are_padded() {
    let server = SrpServer::new(SRP_IDENTITY, PIN, &[1u8; 16]).unwrap();
    let client = SrpClient::new().unwrap();

    assert_eq!(server.public_key().len(), 384);
    assert_eq!(client.public_key().len(), 384);
    assert_eq!(server.salt(), &[1u8; 16]);
}

#[test]
fn test_srp_handshake_agrees_on_key() {
    let server = SrpServer::new(SRP_IDENTITY, PIN, &[7u8; 16]).unwrap();
    let client = SrpClient::new().unwrap();

    let verifier = client
        .process_challenge(SRP_IDENTITY, PIN, server.salt(), server.public_key())
        .unwrap();
    let (server_key, server_proof) = server
        .verify_client(client.public_key(), verifier.client_proof())
        .unwrap();
    let client_key = verifier.verify_server(&server_proof).unwrap();

    assert_eq!(client_key.as_bytes(), server_key.as_bytes());
    assert_eq!(server_key.as_bytes().len(), 64);
}

#[test]
fn test_srp_wrong_pin_rejected() {
    let server = SrpServer::new(SRP_IDENTITY, PIN, &[7u8; 16]).unwrap();
    let client = SrpClient::new().unwrap();

    let result = handshake(&server, &client, b"111-22-333");
    assert!(matches!(result, Err(CryptoError::Srp(_))));
}

#[test]
fn test_srp_deterministic_with_fixed_secrets() {
    let salt = [3u8; 16];
    let b = [0x55u8; 32];
    let a = [0x66u8; 32];

    let server1 = SrpServer::with_secret(SRP_IDENTITY, PIN, &salt, &b).unwrap();
    let server2 = SrpServer::with_secret(SRP_IDENTITY, PIN, &salt, &b).unwrap();
    assert_eq!(server1.public_key(), server2.public_key());

    let client = SrpClient::with_secret(&a).unwrap();
    let (_, proof1) = handshake(&server1, &client, PIN).unwrap();
    let (_, proof2) = handshake(&server2, &client, PIN).unwrap();
    assert_eq!(proof1, proof2);
}

#[test]
fn test_srp_rejects_degenerate_client_keys() {
    let server = SrpServer::new(SRP_IDENTITY, PIN, &[7u8; 16]).unwrap();
    let proof = [0u8; 64];

    // A = 0
    assert!(server.verify_client(&[0u8; 384], &proof).is_err());

    // Longer than the modulus
    let mut too_long = vec![0u8; 385];
    too_long[0] = 1;
    assert!(server.verify_client(&too_long, &proof).is_err());

    // Larger than N
    let all_ff = [0xFFu8; 384];
    assert!(server.verify_client(&all_ff, &proof).is_err());
}

#[test]
fn test_srp_accepts_unpadded_client_key() {
    let server = SrpServer::new(SRP_IDENTITY, PIN, &[9u8; 16]).unwrap();
    // a = 1 gives A = g = 5, which a controller may send unpadded
    let client = SrpClient::with_secret(&[1u8]).unwrap();
    let verifier = client
        .process_challenge(SRP_IDENTITY, PIN, server.salt(), server.public_key())
        .unwrap();

    let trimmed: Vec<u8> = client
        .public_key()
        .iter()
        .copied()
        .skip_while(|b| *b == 0)
        .collect();
    assert_eq!(trimmed, vec![5]);

    let (_, server_proof) = server
        .verify_client(&trimmed, verifier.client_proof())
        .unwrap();
    verifier.verify_server(&server_proof).unwrap();
}
