use proptest::prelude::*;

use crate::errors::TrustError;
use crate::node_store::sanitize_node_id;
use crate::qr::QrPayload;
use crate::trust::{HubCaInfo, OnboardingContext, TrustChallengeStore};

fn hub_ca() -> HubCaInfo {
    HubCaInfo {
        ca_pem: "-----BEGIN CERTIFICATE-----\nMIIBhub\n-----END CERTIFICATE-----\n".into(),
        fingerprint: "fp".into(),
        emoji_hash: "emoji".into(),
        subject: "Hub Root CA".into(),
        expires: "2035-01-01".into(),
    }
}

proptest! {
    #[test]
    fn prop_qr_payload_survives_encoding(
        pem in proptest::collection::vec(any::<u8>(), 1..512),
        node_id in proptest::option::of("[a-z0-9-]{1,24}"),
        is_csr in any::<bool>(),
    ) {
        let payload = if is_csr {
            QrPayload::csr_payload(&pem, node_id.as_deref())
        } else {
            QrPayload::cert_payload(&pem, Some(&pem), node_id.as_deref())
        };
        let decoded = QrPayload::decode(&payload.encode().unwrap()).unwrap();
        prop_assert!(decoded.verify_fingerprint());
        prop_assert_eq!(decoded, payload);
    }

    #[test]
    fn prop_sanitized_node_id_has_no_separators(id in "\\PC{1,40}") {
        let clean = sanitize_node_id(&id);
        prop_assert!(!clean.contains('/'));
        prop_assert!(!clean.contains('\\'));
        prop_assert_eq!(clean.chars().count(), id.chars().count());
    }

    #[test]
    fn prop_challenge_taken_once(host in "[a-z]{1,12}", port in 1u16..) {
        let hub = format!("{host}.example:{port}");
        let store = TrustChallengeStore::new();
        let challenge = store
            .create_challenge(&hub, hub_ca(), OnboardingContext::default())
            .unwrap();

        prop_assert!(store.take_challenge(&hub, &challenge.challenge_id).is_ok());
        prop_assert_eq!(
            store.take_challenge(&hub, &challenge.challenge_id).unwrap_err(),
            TrustError::NotFound
        );
    }
}
