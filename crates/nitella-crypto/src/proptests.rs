use proptest::prelude::*;

use crate::cpace::{CPaceError, CPaceSession, Role};
use crate::fingerprint::{derive_fingerprint, SHORT_PALETTE};
use crate::mnemonic::{entropy_to_mnemonic, validate_mnemonic};
use crate::routing::{generate_routing_token, verify_routing_token};
use crate::wordlist::{parse_pairing_code, PAIRING_WORDS};

fn completed_pair(a_pw: &[u8], b_pw: &[u8]) -> (CPaceSession, CPaceSession) {
    let mut a = CPaceSession::new(Role::Authority, a_pw, None).unwrap();
    let mut b = CPaceSession::new(Role::Peer, b_pw, None).unwrap();
    let (ap, bp) = (a.public_value(), b.public_value());
    a.set_peer_public(&bp).unwrap();
    b.set_peer_public(&ap).unwrap();
    (a, b)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    // Matching passwords agree on key and emoji.
    #[test]
    fn test_matching_passwords_agree(pw in prop::collection::vec(any::<u8>(), 0..64)) {
        let (a, b) = completed_pair(&pw, &pw);
        prop_assert_eq!(a.shared_key(), b.shared_key());
        prop_assert_eq!(a.derive_confirmation_emoji(), b.derive_confirmation_emoji());
    }

    #[test]
    fn test_matching_explicit_session_ids_agree(
        pw in prop::collection::vec(any::<u8>(), 1..32),
        sid in prop::collection::vec(any::<u8>(), 1..32),
    ) {
        let mut a = CPaceSession::new(Role::Authority, &pw, Some(&sid)).unwrap();
        let mut b = CPaceSession::new(Role::Peer, &pw, Some(&sid)).unwrap();
        let (ap, bp) = (a.public_value(), b.public_value());
        a.set_peer_public(&bp).unwrap();
        b.set_peer_public(&ap).unwrap();
        prop_assert_eq!(a.shared_key(), b.shared_key());
    }

    // Different passwords give different keys.
    #[test]
    fn test_different_passwords_disagree(
        pw1 in prop::collection::vec(any::<u8>(), 1..32),
        pw2 in prop::collection::vec(any::<u8>(), 1..32),
    ) {
        prop_assume!(pw1 != pw2);
        let (a, b) = completed_pair(&pw1, &pw2);
        prop_assert_ne!(a.shared_key(), b.shared_key());
        let (ct, nonce) = a.encrypt(b"probe").unwrap();
        prop_assert_eq!(b.decrypt(&ct, &nonce), Err(CPaceError::AuthenticationFailed));
    }

    // All-zero peer values fail regardless of session state.
    #[test]
    fn test_identity_point_always_rejected(complete in any::<bool>()) {
        let (mut a, _b) = completed_pair(b"pw", b"pw");
        let mut fresh = CPaceSession::new(Role::Peer, b"pw", None).unwrap();
        let s = if complete { &mut a } else { &mut fresh };
        prop_assert_eq!(s.set_peer_public(&[0u8; 32]), Err(CPaceError::IdentityPointRejected));
    }

    #[test]
    fn test_wrong_length_always_rejected(
        value in prop::collection::vec(any::<u8>(), 0..80),
        complete in any::<bool>(),
    ) {
        prop_assume!(value.len() != 32);
        let (mut a, _b) = completed_pair(b"pw", b"pw");
        let mut fresh = CPaceSession::new(Role::Authority, b"pw", None).unwrap();
        let s = if complete { &mut a } else { &mut fresh };
        prop_assert_eq!(s.set_peer_public(&value), Err(CPaceError::InvalidPeerValue(value.len())));
    }

    // Either side can encrypt for the other, any length.
    #[test]
    fn test_encrypt_round_trip(
        plaintext in prop::collection::vec(any::<u8>(), 0..1024),
        from_authority in any::<bool>(),
    ) {
        let (a, b) = completed_pair(b"3-tiger-castle", b"3-tiger-castle");
        let (sender, receiver) = if from_authority { (&a, &b) } else { (&b, &a) };
        let (ct, nonce) = sender.encrypt(&plaintext).unwrap();
        prop_assert_eq!(receiver.decrypt(&ct, &nonce).unwrap(), plaintext);
    }

    #[test]
    fn test_fingerprint_shape(data in any::<Vec<u8>>()) {
        let fp = derive_fingerprint(&data);
        let mut rest = fp.as_str();
        for _ in 0..4 {
            let hit = SHORT_PALETTE.iter().find(|e| rest.starts_with(**e));
            prop_assert!(hit.is_some());
            rest = &rest[hit.unwrap().len()..];
        }
        prop_assert!(rest.is_empty());
    }

    #[test]
    fn test_generated_mnemonics_validate(entropy in any::<[u8; 16]>()) {
        let m = entropy_to_mnemonic(&entropy).unwrap();
        prop_assert!(validate_mnemonic(&m));
        prop_assert!(validate_mnemonic(&m.to_uppercase()));
    }

    #[test]
    fn test_pairing_code_parse(
        digit in 1u8..=9,
        w1 in 0..PAIRING_WORDS.len(),
        w2 in 0..PAIRING_WORDS.len(),
    ) {
        let code = format!("{}-{}-{}", digit, PAIRING_WORDS[w1], PAIRING_WORDS[w2]);
        prop_assert_eq!(parse_pairing_code(&format!("  {} ", code.to_uppercase())).unwrap(), code);
    }

    #[test]
    fn test_routing_token_verifies(node_id in "[a-z0-9-]{1,32}", secret in any::<[u8; 32]>()) {
        let token = generate_routing_token(&node_id, &secret).unwrap();
        prop_assert!(verify_routing_token(&node_id, &secret, &token));
    }
}
