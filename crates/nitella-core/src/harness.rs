//! Test harness for Nitella core.
//!
//! In-memory stream pairs, a scripted node for the far end of a pairing
//! exchange, CSR factories and mock collaborators for registry and Hub.

use async_trait::async_trait;
use ed25519_dalek::SigningKey;
use parking_lot::Mutex;
use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair, PKCS_ECDSA_P256_SHA256};
use tokio::sync::mpsc;

use nitella_crypto::{cert::create_csr, cpace::Role, pake::PakeSession, utils::random_bytes};

use crate::{
    errors::ExchangeError,
    exchange::{MessageKind, NodeRegistration, NodeRegistry, PakeMessage, PakeStream},
    identity::{Identity, IdentityConfig},
    trust::{ConnectError, HubCaInfo, HubConnector, UserRegistration},
};

/// Mnemonic behind [`ca_identity`].
pub const TEST_MNEMONIC: &str =
    "legal winner thank year wave sausage worth useful legal winner thank yellow";

const CHANNEL_DEPTH: usize = 16;

// ============================================================================
// Streams
// ============================================================================

/// One end of an in-memory duplex message stream.
pub struct ChannelStream {
    tx: mpsc::Sender<PakeMessage>,
    rx: mpsc::Receiver<PakeMessage>,
}

/// Two connected stream ends.
pub fn duplex() -> (ChannelStream, ChannelStream) {
    let (a_tx, b_rx) = mpsc::channel(CHANNEL_DEPTH);
    let (b_tx, a_rx) = mpsc::channel(CHANNEL_DEPTH);
    (
        ChannelStream { tx: a_tx, rx: a_rx },
        ChannelStream { tx: b_tx, rx: b_rx },
    )
}

#[async_trait]
impl PakeStream for ChannelStream {
    async fn send(&mut self, msg: PakeMessage) -> Result<(), ExchangeError> {
        self.tx
            .send(msg)
            .await
            .map_err(|_| ExchangeError::Transport("channel closed".into()))
    }

    async fn recv(&mut self) -> Result<Option<PakeMessage>, ExchangeError> {
        Ok(self.rx.recv().await)
    }
}

// ============================================================================
// Identities and CSRs
// ============================================================================

/// Deterministic CA identity for tests.
pub fn ca_identity() -> Identity {
    let config = IdentityConfig::new(std::env::temp_dir(), "harness");
    Identity::create_from_mnemonic(TEST_MNEMONIC, &config).expect("harness identity")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CsrKind {
    /// Well-formed ed25519 request.
    Ed25519,
    /// P-256 key, rejected by the signer.
    Ecdsa,
    /// ed25519 request with an empty subject.
    NoCommonName,
}

/// Build a CSR PEM of the given kind. `common_name` is ignored for
/// [`CsrKind::NoCommonName`].
pub fn csr_pem(kind: CsrKind, common_name: &str) -> String {
    match kind {
        CsrKind::Ed25519 => node_key_and_csr(common_name).1,
        CsrKind::Ecdsa => {
            let key = KeyPair::generate_for(&PKCS_ECDSA_P256_SHA256).expect("p256 key");
            let mut params = CertificateParams::default();
            params.distinguished_name = DistinguishedName::new();
            params.distinguished_name.push(DnType::CommonName, common_name);
            params
                .serialize_request(&key)
                .expect("ecdsa csr")
                .pem()
                .expect("ecdsa csr pem")
        }
        CsrKind::NoCommonName => {
            let key = SigningKey::from_bytes(&random_bytes::<32>());
            let der = ed25519_dalek::pkcs8::EncodePrivateKey::to_pkcs8_der(&key).expect("pkcs8");
            let pair = KeyPair::try_from(der.as_bytes()).expect("ed25519 key pair");
            let mut params = CertificateParams::default();
            params.distinguished_name = DistinguishedName::new();
            params
                .serialize_request(&pair)
                .expect("csr")
                .pem()
                .expect("csr pem")
        }
    }
}

/// Fresh node key with a matching ed25519 CSR.
pub fn node_key_and_csr(common_name: &str) -> (SigningKey, String) {
    let key = SigningKey::from_bytes(&random_bytes::<32>());
    let csr = create_csr(&key, common_name, "").expect("csr");
    (key, csr)
}

// ============================================================================
// Scripted node
// ============================================================================

/// What the node saw by the end of the exchange.
#[derive(Debug, Default, Clone)]
pub struct NodeOutcome {
    pub emoji: String,
    pub cert_pem: Option<String>,
    pub ca_pem: Option<String>,
    pub routing_token: Option<String>,
    /// Error message sent by the authority, if any.
    pub error: Option<String>,
}

/// Play the node side of a pairing: PAKE, send `csr_pem` encrypted, then
/// collect certificate, CA and routing token until the stream closes.
pub async fn run_node(mut stream: ChannelStream, code: &str, csr_pem: &str) -> Result<NodeOutcome, ExchangeError> {
    let mut session = PakeSession::from_code(Role::Peer, code)?;
    let mut outcome = NodeOutcome::default();

    let cli_init = stream.recv().await?.ok_or(ExchangeError::PeerDisconnected)?;
    if cli_init.kind != MessageKind::Spake2Init {
        return Err(ExchangeError::UnexpectedMessageType {
            expected: MessageKind::Spake2Init.to_string(),
            got: cli_init.kind.to_string(),
        });
    }
    let own = session.process_init_message(&cli_init.spake2_data)?;
    stream.send(PakeMessage::init(code, Role::Peer, own)).await?;

    let reply = stream.recv().await?.ok_or(ExchangeError::PeerDisconnected)?;
    if reply.kind != MessageKind::Spake2Reply || reply.spake2_data != cli_init.spake2_data {
        return Err(ExchangeError::UnexpectedMessageType {
            expected: MessageKind::Spake2Reply.to_string(),
            got: reply.kind.to_string(),
        });
    }
    outcome.emoji = session.derive_confirmation_emoji();

    let (ciphertext, nonce) = session.encrypt(csr_pem.as_bytes())?;
    stream
        .send(PakeMessage::encrypted(code, Role::Peer, ciphertext, nonce.to_vec()))
        .await?;

    let mut delivered = 0usize;
    while let Some(msg) = stream.recv().await? {
        match msg.kind {
            MessageKind::Encrypted => {
                let plain = session
                    .decrypt(&msg.encrypted_payload, &msg.nonce)
                    .map_err(|_| ExchangeError::VerificationFailed)?;
                let text = String::from_utf8(plain)
                    .map_err(|_| ExchangeError::InvalidCsr("non-utf8 payload".into()))?;
                // cert, CA, routing token
                match delivered {
                    0 => outcome.cert_pem = Some(text),
                    1 => outcome.ca_pem = Some(text),
                    2 => outcome.routing_token = Some(text),
                    _ => {}
                }
                delivered += 1;
            }
            MessageKind::Error => {
                outcome.error = Some(msg.error_message);
                break;
            }
            other => {
                return Err(ExchangeError::UnexpectedMessageType {
                    expected: MessageKind::Encrypted.to_string(),
                    got: other.to_string(),
                })
            }
        }
    }
    Ok(outcome)
}

// ============================================================================
// Mock collaborators
// ============================================================================

/// Registry that records registrations and can be told to fail.
#[derive(Default)]
pub struct RecordingRegistry {
    pub fail_with: Option<String>,
    registrations: Mutex<Vec<NodeRegistration>>,
}

impl RecordingRegistry {
    pub fn failing(message: &str) -> Self {
        Self {
            fail_with: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub fn registrations(&self) -> Vec<NodeRegistration> {
        self.registrations.lock().clone()
    }
}

#[async_trait]
impl NodeRegistry for RecordingRegistry {
    async fn register_node(&self, registration: &NodeRegistration) -> Result<(), String> {
        self.registrations.lock().push(registration.clone());
        match &self.fail_with {
            Some(msg) => Err(msg.clone()),
            None => Ok(()),
        }
    }
}

/// Hub stand-in. It presents `presented_ca` and accepts connections only
/// when the CA is pinned, unless `trusted_by_system` is set.
pub struct MockHub {
    presented_ca: Mutex<HubCaInfo>,
    pub trusted_by_system: bool,
    /// Message for non-trust connection failures.
    pub connect_failure: Option<String>,
    connects: Mutex<Vec<Option<String>>>,
    registrations: Mutex<Vec<(String, Option<String>)>>,
}

impl MockHub {
    pub fn new(presented_ca: HubCaInfo) -> Self {
        Self {
            presented_ca: Mutex::new(presented_ca),
            trusted_by_system: false,
            connect_failure: None,
            connects: Mutex::new(Vec::new()),
            registrations: Mutex::new(Vec::new()),
        }
    }

    /// Hub whose CA is issued by a fresh random identity.
    pub fn with_fresh_ca() -> Self {
        Self::new(fresh_hub_ca())
    }

    pub fn presented_ca(&self) -> HubCaInfo {
        self.presented_ca.lock().clone()
    }

    /// Simulate the Hub swapping its certificate.
    pub fn swap_ca(&self, ca: HubCaInfo) {
        *self.presented_ca.lock() = ca;
    }

    /// Pinned CA of every connect attempt, in order.
    pub fn connects(&self) -> Vec<Option<String>> {
        self.connects.lock().clone()
    }

    /// `(invite_code, token)` of every registration.
    pub fn registrations(&self) -> Vec<(String, Option<String>)> {
        self.registrations.lock().clone()
    }
}

/// CA info for a new random root.
pub fn fresh_hub_ca() -> HubCaInfo {
    let config = IdentityConfig::new(std::env::temp_dir(), "hub");
    let identity = Identity::create(&config).expect("hub identity");
    HubCaInfo::from_ca_pem(identity.cert_pem()).expect("hub ca info")
}

#[async_trait]
impl HubConnector for MockHub {
    async fn connect(&self, _hub_address: &str, pinned_ca: Option<&str>) -> Result<(), ConnectError> {
        self.connects.lock().push(pinned_ca.map(str::to_string));
        if let Some(msg) = &self.connect_failure {
            return Err(ConnectError::Failed(msg.clone()));
        }
        let presented = self.presented_ca.lock().ca_pem.clone();
        match pinned_ca {
            _ if self.trusted_by_system => Ok(()),
            Some(pinned) if pinned.trim() == presented.trim() => Ok(()),
            _ => Err(ConnectError::Failed(
                "transport: authentication handshake failed: x509: certificate signed by unknown authority"
                    .into(),
            )),
        }
    }

    async fn fetch_ca(&self, _hub_address: &str) -> Result<HubCaInfo, String> {
        Ok(self.presented_ca())
    }

    async fn probe_ca(&self, _hub_address: &str) -> Result<HubCaInfo, String> {
        Ok(self.presented_ca())
    }

    async fn register_user(
        &self,
        _hub_address: &str,
        invite_code: &str,
        token: Option<&str>,
    ) -> Result<UserRegistration, String> {
        self.registrations
            .lock()
            .push((invite_code.to_string(), token.map(str::to_string)));
        Ok(UserRegistration {
            user_id: "user-1".into(),
            tier: "free".into(),
            max_nodes: 3,
        })
    }
}
