use vault_engine::crypto::asymmetric;
use vault_engine::metadata::{PRESEAL_SIZE, SEALED_SLICE_LEN};
use vault_engine::seal::tss;
use vault_engine::{
    CombinedCipher, CurveType, EncryptionSchema, KeyPair, PreSealed, Seal, Sealed, Sealer, SymmetricKey, VaultError,
    Version,
};

fn pre_sealed_payload() -> Vec<u8> {
    PreSealed {
        chunk_cid: format!("Qm{}", "Z".repeat(44)),
        hash: [0xab; 32],
        sealing_key: SymmetricKey::generate(),
        version: Version::CURRENT,
    }
    .serialize()
    .unwrap()
}

struct Weighted {
    author: KeyPair,
    first: KeyPair,
    second: KeyPair,
    schema: EncryptionSchema,
}

/// n = 5, k = 3, one clear piece, author weight 2, two members weight 1.
fn weighted_schema() -> Weighted {
    let author = KeyPair::generate(CurveType::Ed25519).unwrap();
    let first = KeyPair::generate(CurveType::Sr25519).unwrap();
    let second = KeyPair::generate(CurveType::Secp256k1).unwrap();

    let mut schema = EncryptionSchema::new(author.public, 5, 3, 1);
    schema.add_member(author.public, 2);
    schema.add_member(first.public, 1);
    schema.add_member(second.public, 1);
    assert!(schema.verify());

    Weighted {
        author,
        first,
        second,
        schema,
    }
}

#[test]
fn test_author_weight_plus_public_piece_meets_threshold() {
    let w = weighted_schema();
    let payload = pre_sealed_payload();
    let seal = Seal::default();

    let sealed = seal.seal(&payload, &w.schema).unwrap();
    let recovered = seal.recover(&sealed, &Sealer::unlock(w.author.secret.clone())).unwrap();
    assert_eq!(recovered, payload);
}

#[test]
fn test_single_member_plus_public_piece_is_threshold_not_met() {
    let w = weighted_schema();
    let seal = Seal::default();
    let sealed = seal.seal(&pre_sealed_payload(), &w.schema).unwrap();

    for member in [&w.first, &w.second] {
        let result = seal.recover(&sealed, &Sealer::unlock(member.secret.clone()));
        assert!(matches!(result, Err(VaultError::ThresholdNotMet)));
    }
}

#[test]
fn test_two_single_members_together_meet_threshold() {
    let w = weighted_schema();
    let payload = pre_sealed_payload();
    let seal = Seal::default();
    let sealed = seal.seal(&payload, &w.schema).unwrap();

    let sealer = Sealer::with_keys(vec![w.first.secret.clone(), w.second.secret.clone()]);
    assert_eq!(seal.recover(&sealed, &sealer).unwrap(), payload);
}

#[test]
fn test_sealed_bundle_survives_the_wire() {
    let w = weighted_schema();
    let payload = pre_sealed_payload();
    let seal = Seal::default();

    let bytes = seal.seal(&payload, &w.schema).unwrap().serialize().unwrap();
    assert_eq!(bytes.len(), 2 + 5 * SEALED_SLICE_LEN + 4);

    let decoded = Sealed::deserialize(&bytes).unwrap();
    assert_eq!(decoded.cipher.per_recipient_length as usize, SEALED_SLICE_LEN);
    assert_eq!(seal.recover(&decoded, &Sealer::unlock(w.author.secret)).unwrap(), payload);
}

#[test]
fn test_public_bundle_needs_no_keys() {
    let author = KeyPair::generate(CurveType::Sr25519).unwrap();
    let payload = pre_sealed_payload();
    let seal = Seal::default();

    let sealed = seal.seal(&payload, &EncryptionSchema::public(author.public)).unwrap();
    let bytes = sealed.serialize().unwrap();
    assert_eq!(bytes.len(), 2 + PRESEAL_SIZE + 4);

    let decoded = Sealed::deserialize(&bytes).unwrap();
    assert!(decoded.is_public);
    assert_eq!(seal.recover(&decoded, &Sealer::default()).unwrap(), payload);
}

#[test]
fn test_tss_round_trip_and_threshold() {
    for (n, k) in [(2u32, 2u32), (5, 3), (8, 5), (255, 2)] {
        let message: Vec<u8> = (0..(n as usize % 97 + 5)).map(|i| i as u8).collect();
        let shares = tss::generate_shares(&message, n, k).unwrap();

        let tail = &shares[shares.len() - k as usize..];
        assert_eq!(tss::recover(tail).unwrap(), message);

        let short = &shares[..k as usize - 1];
        assert!(matches!(tss::recover(short), Err(VaultError::ThresholdNotMet)));
    }
}

#[test]
fn test_cipher_mixed_curves() {
    let pairs: Vec<KeyPair> = [CurveType::Secp256k1, CurveType::Ed25519, CurveType::Sr25519]
        .into_iter()
        .map(|curve| KeyPair::generate(curve).unwrap())
        .collect();
    let recipients: Vec<_> = pairs.iter().map(|p| p.public).collect();

    let message = b"one plaintext, many envelopes";
    let cipher = CombinedCipher::build(message, &recipients).unwrap();
    assert_eq!(cipher.bytes.len(), recipients.len() * (message.len() + asymmetric::ENVELOPE_OVERHEAD));

    for pair in &pairs {
        assert_eq!(cipher.parse_with_keys(&[pair.secret.clone()]).unwrap(), message);
    }

    let outsider = KeyPair::generate(CurveType::Secp256k1).unwrap();
    assert!(matches!(
        cipher.parse_with_keys(&[outsider.secret]),
        Err(VaultError::DecryptionFailed)
    ));
}

#[test]
fn test_tampered_share_slice_does_not_yield_garbage() {
    let w = weighted_schema();
    let payload = pre_sealed_payload();
    let seal = Seal::default();
    let mut sealed = seal.seal(&payload, &w.schema).unwrap();

    // flip a byte inside the author's first encrypted share; its tag no longer verifies
    let offset = SEALED_SLICE_LEN + 60;
    sealed.cipher.bytes[offset] ^= 0xff;

    let result = seal.recover(&sealed, &Sealer::unlock(w.author.secret));
    assert!(matches!(result, Err(VaultError::ThresholdNotMet)));
}
