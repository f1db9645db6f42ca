//! Integration tests for the live pairing exchange.

use std::time::Duration;

use nitella_core::{
    config::Config,
    exchange::{
        complete_exchange, reject_exchange, run_exchange, run_exchange_with_deadline,
        CompletionParams, ExchangeState, MessageKind, PakeMessage, PakeStream,
    },
    harness::{ca_identity, csr_pem, duplex, node_key_and_csr, run_node, CsrKind, RecordingRegistry},
    identity::{Identity, IdentityConfig, CERT_FILE, KEY_FILE},
    node_store::NodeCertStore,
    ExchangeError, IdentityError,
};
use nitella_crypto::{
    cert::{certificate_public_key, parse_certificate, verify_issued_by, CertError},
    cpace::Role,
    kdf::KdfParams,
    pake::PakeSession,
    routing::verify_routing_token,
    wordlist::CodeError,
};

const CODE: &str = "7-tiger-castle";

/// Complete pairing between the CLI and a scripted node.
#[tokio::test]
async fn test_pairing_flow() {
    let identity = ca_identity();
    let (cli, node) = duplex();
    let (node_key, csr) = node_key_and_csr("node-42");

    let node_task = tokio::spawn(async move { run_node(node, CODE, &csr).await });

    let mut result = run_exchange(cli, CODE).await.expect("exchange should succeed");
    assert_eq!(result.state(), ExchangeState::CsrReceived);
    assert_eq!(result.node_id, "node-42");
    assert_eq!(result.node_public_key, node_key.verifying_key().to_bytes());
    assert_eq!(result.fingerprint.len(), 64);
    assert_eq!(result.csr_hash.len(), 64);

    let completion = complete_exchange(&mut result, CompletionParams::new(&identity))
        .await
        .expect("completion should succeed");
    assert_eq!(result.state(), ExchangeState::Completed);
    let emoji = result.emoji.clone();
    drop(result);

    let outcome = node_task.await.unwrap().unwrap();
    assert_eq!(outcome.emoji, emoji);
    assert!(outcome.error.is_none());
    assert!(outcome.routing_token.is_none());

    let cert = outcome.cert_pem.expect("node received certificate");
    let ca = outcome.ca_pem.expect("node received CA");
    assert_eq!(cert, completion.signed_cert_pem);
    assert_eq!(ca, identity.cert_pem());

    // Delivered certificate chains to the delivered CA and carries the CSR key.
    verify_issued_by(cert.as_bytes(), ca.as_bytes()).unwrap();
    assert_eq!(
        certificate_public_key(cert.as_bytes()).unwrap(),
        node_key.verifying_key().to_bytes()
    );
    assert_eq!(completion.node_public_key, node_key.verifying_key().to_bytes());
    assert!(!completion.registered);
}

/// Relay-style code without the leading digit.
#[tokio::test]
async fn test_pairing_flow_with_word_code() {
    let identity = ca_identity();
    let (cli, node) = duplex();
    let (node_key, csr) = node_key_and_csr("node-42");

    let node_task = tokio::spawn(async move { run_node(node, "tiger-castle", &csr).await });

    let mut result = run_exchange(cli, "tiger-castle").await.unwrap();
    assert_eq!(result.node_id, "node-42");
    complete_exchange(&mut result, CompletionParams::new(&identity))
        .await
        .unwrap();
    drop(result);

    let outcome = node_task.await.unwrap().unwrap();
    let cert = outcome.cert_pem.unwrap();
    let ca = outcome.ca_pem.unwrap();
    verify_issued_by(cert.as_bytes(), ca.as_bytes()).unwrap();
    assert_eq!(
        certificate_public_key(cert.as_bytes()).unwrap(),
        node_key.verifying_key().to_bytes()
    );
}

#[tokio::test]
async fn test_typed_code_is_normalized() {
    let identity = ca_identity();
    let (cli, node) = duplex();
    let csr = csr_pem(CsrKind::Ed25519, "node-n");
    let node_task = tokio::spawn(async move { run_node(node, CODE, &csr).await });

    let mut result = run_exchange(cli, "  7-Tiger-CASTLE \n").await.unwrap();
    complete_exchange(&mut result, CompletionParams::new(&identity))
        .await
        .unwrap();
    drop(result);
    assert!(node_task.await.unwrap().unwrap().cert_pem.is_some());
}

#[tokio::test]
async fn test_malformed_code_fails_before_sending() {
    let (cli, mut node) = duplex();
    let err = run_exchange(cli, "tiger castle").await.unwrap_err();
    assert!(matches!(err, ExchangeError::InvalidCode(CodeError::InvalidFormat)));
    assert!(node.recv().await.unwrap().is_none());
}

#[test]
fn test_mismatched_identity_on_disk_is_kept() {
    let tmp = tempfile::tempdir().unwrap();
    let mut config = IdentityConfig::new(tmp.path(), "carol");
    config.kdf = KdfParams::new(1, 64, 1);
    let (original, _) = Identity::load_or_create(&config).unwrap();
    let key_before = std::fs::read(tmp.path().join(KEY_FILE)).unwrap();
    let cert_before = std::fs::read(tmp.path().join(CERT_FILE)).unwrap();

    let stranger = ca_identity();
    std::fs::write(tmp.path().join(CERT_FILE), stranger.cert_pem()).unwrap();
    let err = Identity::load_or_create(&config).unwrap_err();
    assert!(matches!(err, IdentityError::Cert(CertError::KeyMismatch)));
    assert_eq!(std::fs::read(tmp.path().join(KEY_FILE)).unwrap(), key_before);

    // Restoring the certificate recovers the original CA.
    std::fs::write(tmp.path().join(CERT_FILE), cert_before).unwrap();
    let (reloaded, created) = Identity::load_or_create(&config).unwrap();
    assert!(!created);
    assert_eq!(reloaded.fingerprint(), original.fingerprint());
}

#[tokio::test]
async fn test_exchange_follows_pairing_config() {
    let identity = ca_identity();
    let mut config = Config::default();
    config.pairing.cert_valid_days = 14;
    config.pairing.exchange_timeout_secs = 60;

    let (cli, node) = duplex();
    let csr = csr_pem(CsrKind::Ed25519, "node-cfg");
    let node_task = tokio::spawn(async move { run_node(node, CODE, &csr).await });

    let mut result = run_exchange_with_deadline(cli, CODE, config.exchange_timeout())
        .await
        .unwrap();
    let completion = complete_exchange(&mut result, config.completion_params(&identity))
        .await
        .unwrap();
    drop(result);
    assert!(node_task.await.unwrap().unwrap().cert_pem.is_some());

    let info = parse_certificate(completion.signed_cert_pem.as_bytes()).unwrap();
    let days = (info.not_after - info.not_before).whole_days();
    assert!((13..=14).contains(&days), "validity was {days} days");
}

#[tokio::test]
async fn test_routing_token_and_registry() {
    let identity = ca_identity();
    let registry = RecordingRegistry::default();
    let tmp = tempfile::tempdir().unwrap();
    let store = NodeCertStore::new(tmp.path());
    let secret = [0x42u8; 32];

    let (cli, node) = duplex();
    let csr = csr_pem(CsrKind::Ed25519, "node-9");
    let node_task = tokio::spawn(async move { run_node(node, CODE, &csr).await });

    let mut result = run_exchange(cli, CODE).await.unwrap();
    let params = CompletionParams {
        user_secret: Some(&secret[..]),
        registry: Some(&registry),
        node_store: Some(&store),
        valid_days: 30,
        ..CompletionParams::new(&identity)
    };
    let completion = complete_exchange(&mut result, params).await.unwrap();
    drop(result);
    let outcome = node_task.await.unwrap().unwrap();

    let token = completion.routing_token.clone().unwrap();
    assert_eq!(outcome.routing_token.as_deref(), Some(token.as_str()));
    assert!(verify_routing_token("node-9", &secret, &token));

    assert!(completion.registered);
    let registrations = registry.registrations();
    assert_eq!(registrations.len(), 1);
    assert_eq!(registrations[0].node_id, "node-9");
    assert_eq!(registrations[0].routing_token, Some(token));
    assert_eq!(registrations[0].ca_pem, identity.cert_pem());

    assert_eq!(store.load("node-9").unwrap(), completion.signed_cert_pem);
}

#[tokio::test]
async fn test_registry_failure_is_not_fatal() {
    let identity = ca_identity();
    let registry = RecordingRegistry::failing("hub unavailable");
    let (cli, node) = duplex();
    let csr = csr_pem(CsrKind::Ed25519, "node-r");
    let node_task = tokio::spawn(async move { run_node(node, CODE, &csr).await });

    let mut result = run_exchange(cli, CODE).await.unwrap();
    let params = CompletionParams {
        registry: Some(&registry),
        ..CompletionParams::new(&identity)
    };
    let completion = complete_exchange(&mut result, params).await.unwrap();
    assert_eq!(result.state(), ExchangeState::Completed);
    drop(result);

    assert!(!completion.registered);
    assert_eq!(completion.registration_error.as_deref(), Some("hub unavailable"));
    assert!(node_task.await.unwrap().unwrap().cert_pem.is_some());
}

#[tokio::test]
async fn test_mismatched_codes_fail_authentication() {
    let (cli, node) = duplex();
    let csr = csr_pem(CsrKind::Ed25519, "node-x");
    let node_task = tokio::spawn(async move { run_node(node, "7-tiger-canyon", &csr).await });

    let err = run_exchange(cli, CODE).await.unwrap_err();
    assert!(matches!(err, ExchangeError::VerificationFailed));
    assert!(err.is_authentication_failure());

    // The node sees the stream close without a certificate.
    let outcome = node_task.await.unwrap().unwrap();
    assert!(outcome.cert_pem.is_none());
}

#[tokio::test]
async fn test_reject_notifies_node() {
    let (cli, node) = duplex();
    let csr = csr_pem(CsrKind::Ed25519, "node-z");
    let node_task = tokio::spawn(async move { run_node(node, CODE, &csr).await });

    let mut result = run_exchange(cli, CODE).await.unwrap();
    reject_exchange(&mut result, "fingerprint mismatch").await.unwrap();
    assert_eq!(result.state(), ExchangeState::Rejected);

    let identity = ca_identity();
    let err = complete_exchange(&mut result, CompletionParams::new(&identity))
        .await
        .unwrap_err();
    assert!(matches!(err, ExchangeError::InvalidState(_)));
    drop(result);

    let outcome = node_task.await.unwrap().unwrap();
    assert_eq!(outcome.error.as_deref(), Some("fingerprint mismatch"));
    assert!(outcome.cert_pem.is_none());
}

#[tokio::test]
async fn test_peer_error() {
    let (cli, mut node) = duplex();
    let node_task = tokio::spawn(async move {
        node.recv().await.unwrap().unwrap();
        node.send(PakeMessage::error(CODE, Role::Peer, "node busy"))
            .await
            .unwrap();
        node
    });

    let err = run_exchange(cli, CODE).await.unwrap_err();
    assert!(matches!(err, ExchangeError::PeerError(ref m) if m == "node busy"));
    assert!(!err.is_authentication_failure());
    drop(node_task.await.unwrap());
}

#[tokio::test]
async fn test_peer_disconnect() {
    let (cli, mut node) = duplex();
    tokio::spawn(async move {
        node.recv().await.unwrap().unwrap();
        drop(node);
    });

    let err = run_exchange(cli, CODE).await.unwrap_err();
    assert!(matches!(err, ExchangeError::PeerDisconnected));
}

#[tokio::test]
async fn test_unexpected_message_type() {
    let (cli, mut node) = duplex();
    let node_task = tokio::spawn(async move {
        let mut session = PakeSession::from_code(Role::Peer, CODE).unwrap();
        let init = node.recv().await.unwrap().unwrap();
        let own = session.process_init_message(&init.spake2_data).unwrap();
        node.send(PakeMessage::init(CODE, Role::Peer, own.clone())).await.unwrap();
        node.recv().await.unwrap().unwrap();
        // Another init instead of the encrypted CSR.
        node.send(PakeMessage::init(CODE, Role::Peer, own)).await.unwrap();
        node
    });

    let err = run_exchange(cli, CODE).await.unwrap_err();
    match err {
        ExchangeError::UnexpectedMessageType { expected, got } => {
            assert_eq!(expected, MessageKind::Encrypted.to_string());
            assert_eq!(got, MessageKind::Spake2Init.to_string());
        }
        other => panic!("unexpected error: {other:?}"),
    }
    drop(node_task.await.unwrap());
}

#[tokio::test]
async fn test_non_ed25519_csr_rejected() {
    let (cli, node) = duplex();
    let csr = csr_pem(CsrKind::Ecdsa, "node-p256");
    let node_task = tokio::spawn(async move { run_node(node, CODE, &csr).await });

    let err = run_exchange(cli, CODE).await.unwrap_err();
    assert!(matches!(err, ExchangeError::UnsupportedKeyType));
    let _ = node_task.await.unwrap();
}

#[tokio::test]
async fn test_csr_without_common_name_rejected() {
    let (cli, node) = duplex();
    let csr = csr_pem(CsrKind::NoCommonName, "");
    let node_task = tokio::spawn(async move { run_node(node, CODE, &csr).await });

    let err = run_exchange(cli, CODE).await.unwrap_err();
    assert!(matches!(err, ExchangeError::MissingCommonName));
    let _ = node_task.await.unwrap();
}

#[tokio::test]
async fn test_garbage_csr_rejected() {
    let (cli, node) = duplex();
    let node_task = tokio::spawn(async move { run_node(node, CODE, "not a csr").await });

    let err = run_exchange(cli, CODE).await.unwrap_err();
    assert!(matches!(err, ExchangeError::InvalidCsr(_)));
    let _ = node_task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_deadline_sends_timeout_notice() {
    let (cli, mut node) = duplex();
    let node_task = tokio::spawn(async move {
        let init = node.recv().await.unwrap().unwrap();
        assert_eq!(init.kind, MessageKind::Spake2Init);
        assert_eq!(init.role, "cli");
        // Stay silent; the next message is the timeout notice.
        node.recv().await.unwrap().unwrap()
    });

    let err = run_exchange_with_deadline(cli, CODE, Duration::from_secs(30))
        .await
        .unwrap_err();
    assert!(matches!(err, ExchangeError::Timeout));

    let notice = node_task.await.unwrap();
    assert_eq!(notice.kind, MessageKind::Error);
    assert_eq!(notice.error_message, "pairing timed out");
}

#[tokio::test]
async fn test_deadline_not_reached() {
    let identity = ca_identity();
    let (cli, node) = duplex();
    let csr = csr_pem(CsrKind::Ed25519, "node-fast");
    let node_task = tokio::spawn(async move { run_node(node, CODE, &csr).await });

    let mut result = run_exchange_with_deadline(cli, CODE, Duration::from_secs(30))
        .await
        .unwrap();
    complete_exchange(&mut result, CompletionParams::new(&identity))
        .await
        .unwrap();
    drop(result);
    assert!(node_task.await.unwrap().unwrap().cert_pem.is_some());
}
