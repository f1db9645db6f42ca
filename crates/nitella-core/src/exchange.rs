//! Live pairing exchange, authority side.
//!
//! The CLI and a node meet on a bidirectional message stream (usually relayed
//! by the Hub) and run CPace keyed by the pairing code. The node then sends
//! its CSR encrypted under the session key. Matching codes mean the CSR
//! decrypts; anything else surfaces as [`ExchangeError::VerificationFailed`].
//!
//! The flow is split in two so a human can compare the confirmation emoji
//! and the node fingerprint before anything is signed:
//!
//! 1. [`run_exchange`] up to the decrypted CSR
//! 2. [`complete_exchange`] or [`reject_exchange`]
//!
//! Message order within one exchange is init → reply → CSR → cert → CA →
//! token.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use nitella_crypto::{
    cert::{self, CertError},
    cpace::Role,
    fingerprint::{derive_fingerprint, generate_emoji_hash, generate_fingerprint},
    hash::sha256_hex,
    pake::PakeSession,
    routing::generate_routing_token,
    wordlist::normalize_pairing_code,
};

use crate::errors::ExchangeError;
use crate::identity::Identity;
use crate::node_store::NodeCertStore;

pub const DEFAULT_CERT_VALID_DAYS: u32 = 365;
const TIMEOUT_NOTICE: &str = "pairing timed out";
const NOTICE_SEND_TIMEOUT: Duration = Duration::from_secs(2);

// ============================================================================
// Wire messages
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Spake2Init,
    Spake2Reply,
    Encrypted,
    Error,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Spake2Init => "SPAKE2_INIT",
            MessageKind::Spake2Reply => "SPAKE2_REPLY",
            MessageKind::Encrypted => "ENCRYPTED",
            MessageKind::Error => "ERROR",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One message on the pairing stream. Unused fields are left empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PakeMessage {
    /// Pairing code, used by the relay to join the two ends.
    pub session_code: String,
    /// `cli` or `node`
    pub role: String,
    pub kind: MessageKind,
    pub spake2_data: Vec<u8>,
    pub encrypted_payload: Vec<u8>,
    pub nonce: Vec<u8>,
    pub error_message: String,
}

impl PakeMessage {
    fn empty(code: &str, role: Role, kind: MessageKind) -> Self {
        Self {
            session_code: code.to_string(),
            role: role.as_str().to_string(),
            kind,
            spake2_data: Vec::new(),
            encrypted_payload: Vec::new(),
            nonce: Vec::new(),
            error_message: String::new(),
        }
    }

    pub fn init(code: &str, role: Role, data: Vec<u8>) -> Self {
        Self {
            spake2_data: data,
            ..Self::empty(code, role, MessageKind::Spake2Init)
        }
    }

    pub fn reply(code: &str, role: Role, data: Vec<u8>) -> Self {
        Self {
            spake2_data: data,
            ..Self::empty(code, role, MessageKind::Spake2Reply)
        }
    }

    pub fn encrypted(code: &str, role: Role, payload: Vec<u8>, nonce: Vec<u8>) -> Self {
        Self {
            encrypted_payload: payload,
            nonce,
            ..Self::empty(code, role, MessageKind::Encrypted)
        }
    }

    pub fn error(code: &str, role: Role, message: impl Into<String>) -> Self {
        Self {
            error_message: message.into(),
            ..Self::empty(code, role, MessageKind::Error)
        }
    }
}

/// Bidirectional message stream between the two parties.
#[async_trait]
pub trait PakeStream: Send {
    async fn send(&mut self, msg: PakeMessage) -> Result<(), ExchangeError>;

    /// `Ok(None)` once the other end has closed.
    async fn recv(&mut self) -> Result<Option<PakeMessage>, ExchangeError>;
}

// ============================================================================
// State machine
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeState {
    InitSent,
    AwaitingPeerInit,
    KeyDerived,
    AwaitingCsr,
    CsrReceived,
    Completed,
    Rejected,
    Failed,
}

impl ExchangeState {
    fn can_transition_to(self, next: ExchangeState) -> bool {
        use ExchangeState::*;
        match (self, next) {
            (InitSent, AwaitingPeerInit)
            | (AwaitingPeerInit, KeyDerived)
            | (KeyDerived, AwaitingCsr)
            | (AwaitingCsr, CsrReceived)
            | (CsrReceived, Completed)
            | (CsrReceived, Rejected) => true,
            (Completed | Rejected | Failed, _) => false,
            (_, Failed) => true,
            _ => false,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ExchangeState::Completed | ExchangeState::Rejected | ExchangeState::Failed
        )
    }
}

fn transition(state: &mut ExchangeState, next: ExchangeState) -> Result<(), ExchangeError> {
    if !state.can_transition_to(next) {
        return Err(ExchangeError::InvalidState(format!(
            "cannot move from {:?} to {:?}",
            state, next
        )));
    }
    debug!(from = ?state, to = ?next, "exchange state");
    *state = next;
    Ok(())
}

// ============================================================================
// Exchange result
// ============================================================================

/// A finished key exchange holding the node's decrypted CSR, waiting for
/// the user to confirm or reject.
pub struct ExchangeResult<S: PakeStream> {
    session: PakeSession,
    stream: S,
    code: Zeroizing<String>,
    state: ExchangeState,
    pub csr_pem: Vec<u8>,
    /// CN of the CSR.
    pub node_id: String,
    pub node_public_key: [u8; 32],
    /// PAKE confirmation emoji, shown on both ends.
    pub emoji: String,
    /// `hex(SHA256(node public key))`
    pub fingerprint: String,
    pub emoji_hash: String,
    /// Emoji fingerprint of the CSR PEM as the node displays it.
    pub csr_fingerprint: String,
    pub csr_hash: String,
}

impl<S: PakeStream> ExchangeResult<S> {
    pub fn state(&self) -> ExchangeState {
        self.state
    }

    async fn send_encrypted(&mut self, plaintext: &[u8]) -> Result<(), ExchangeError> {
        let (ciphertext, nonce) = self.session.encrypt(plaintext)?;
        let msg = PakeMessage::encrypted(&self.code, Role::Authority, ciphertext, nonce.to_vec());
        self.stream.send(msg).await
    }
}

impl<S: PakeStream> fmt::Debug for ExchangeResult<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExchangeResult")
            .field("state", &self.state)
            .field("node_id", &self.node_id)
            .field("emoji", &self.emoji)
            .field("fingerprint", &self.fingerprint)
            .finish_non_exhaustive()
    }
}

struct DecryptedCsr {
    session: PakeSession,
    csr_pem: Vec<u8>,
    emoji: String,
}

async fn recv_required<S: PakeStream>(stream: &mut S) -> Result<PakeMessage, ExchangeError> {
    stream.recv().await?.ok_or(ExchangeError::PeerDisconnected)
}

/// Steps 1 to 6: PAKE plus CSR decryption.
async fn exchange_keys<S: PakeStream>(
    stream: &mut S,
    code: &str,
    state: &mut ExchangeState,
) -> Result<DecryptedCsr, ExchangeError> {
    let mut session = PakeSession::from_code(Role::Authority, code)?;

    stream
        .send(PakeMessage::init(code, Role::Authority, session.get_init_message()))
        .await?;
    transition(state, ExchangeState::AwaitingPeerInit)?;

    let peer_init = recv_required(stream).await?;
    if peer_init.kind == MessageKind::Error {
        return Err(ExchangeError::PeerError(peer_init.error_message));
    }
    let reply = session.process_init_message(&peer_init.spake2_data)?;
    transition(state, ExchangeState::KeyDerived)?;

    stream
        .send(PakeMessage::reply(code, Role::Authority, reply))
        .await?;
    let emoji = session.derive_confirmation_emoji();

    transition(state, ExchangeState::AwaitingCsr)?;
    let csr_msg = recv_required(stream).await?;
    match csr_msg.kind {
        MessageKind::Encrypted => {}
        MessageKind::Error => return Err(ExchangeError::PeerError(csr_msg.error_message)),
        other => {
            return Err(ExchangeError::UnexpectedMessageType {
                expected: MessageKind::Encrypted.to_string(),
                got: other.to_string(),
            })
        }
    }

    let csr_pem = session
        .decrypt(&csr_msg.encrypted_payload, &csr_msg.nonce)
        .map_err(|_| ExchangeError::VerificationFailed)?;

    Ok(DecryptedCsr {
        session,
        csr_pem,
        emoji,
    })
}

fn inspect_csr(csr_pem: &[u8]) -> Result<cert::CsrInfo, ExchangeError> {
    let info = cert::parse_csr(csr_pem).map_err(|e| match e {
        CertError::UnsupportedKeyType => ExchangeError::UnsupportedKeyType,
        other => ExchangeError::InvalidCsr(other.to_string()),
    })?;
    if info.common_name.trim().is_empty() {
        return Err(ExchangeError::MissingCommonName);
    }
    Ok(info)
}

/// Run the exchange up to a verified CSR.
///
/// `code` is trimmed and lowercased first; a malformed code fails before
/// anything is sent. The stream is only handed back inside the result; on
/// error it is dropped together with the session key.
pub async fn run_exchange<S: PakeStream>(mut stream: S, code: &str) -> Result<ExchangeResult<S>, ExchangeError> {
    let code = Zeroizing::new(normalize_pairing_code(code)?);
    let mut state = ExchangeState::InitSent;
    let decrypted = exchange_keys(&mut stream, &code, &mut state).await?;
    finish_exchange(stream, &code, state, decrypted)
}

fn finish_exchange<S: PakeStream>(
    stream: S,
    code: &str,
    mut state: ExchangeState,
    decrypted: DecryptedCsr,
) -> Result<ExchangeResult<S>, ExchangeError> {
    let info = inspect_csr(&decrypted.csr_pem)?;
    transition(&mut state, ExchangeState::CsrReceived)?;

    let node_id = info.common_name.trim().to_string();
    debug!(node_id = %node_id, "received node CSR");

    Ok(ExchangeResult {
        fingerprint: generate_fingerprint(&info.public_key),
        emoji_hash: generate_emoji_hash(&info.public_key),
        csr_fingerprint: derive_fingerprint(&decrypted.csr_pem),
        csr_hash: sha256_hex(&decrypted.csr_pem),
        node_public_key: info.public_key,
        node_id,
        emoji: decrypted.emoji,
        csr_pem: decrypted.csr_pem,
        session: decrypted.session,
        stream,
        code: Zeroizing::new(code.to_string()),
        state,
    })
}

/// [`run_exchange`] bounded by `deadline`. On expiry the node is told
/// "pairing timed out" and all key material is dropped.
pub async fn run_exchange_with_deadline<S: PakeStream>(
    mut stream: S,
    code: &str,
    deadline: Duration,
) -> Result<ExchangeResult<S>, ExchangeError> {
    let code = Zeroizing::new(normalize_pairing_code(code)?);
    let mut state = ExchangeState::InitSent;
    let outcome = tokio::time::timeout(deadline, exchange_keys(&mut stream, &code, &mut state)).await;

    match outcome {
        Ok(decrypted) => finish_exchange(stream, &code, state, decrypted?),
        Err(_) => {
            warn!(after = ?deadline, "pairing exchange timed out");
            let notice = PakeMessage::error(&code, Role::Authority, TIMEOUT_NOTICE);
            let _ = tokio::time::timeout(NOTICE_SEND_TIMEOUT, stream.send(notice)).await;
            Err(ExchangeError::Timeout)
        }
    }
}

// ============================================================================
// Completion
// ============================================================================

/// Registration sent to the node directory after a successful pairing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRegistration {
    pub node_id: String,
    pub cert_pem: String,
    pub routing_token: Option<String>,
    pub ca_pem: String,
}

/// Node directory, typically the Hub. Failures are reported, not fatal.
#[async_trait]
pub trait NodeRegistry: Send + Sync {
    async fn register_node(&self, registration: &NodeRegistration) -> Result<(), String>;
}

pub struct CompletionParams<'a> {
    pub identity: &'a Identity,
    /// Enables routing token generation and delivery.
    pub user_secret: Option<&'a [u8]>,
    pub registry: Option<&'a dyn NodeRegistry>,
    pub node_store: Option<&'a NodeCertStore>,
    /// 0 means [`DEFAULT_CERT_VALID_DAYS`].
    pub valid_days: u32,
}

impl<'a> CompletionParams<'a> {
    pub fn new(identity: &'a Identity) -> Self {
        Self {
            identity,
            user_secret: None,
            registry: None,
            node_store: None,
            valid_days: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompletionResult {
    pub signed_cert_pem: String,
    pub ca_pem: String,
    pub routing_token: Option<String>,
    pub node_id: String,
    pub fingerprint: String,
    pub emoji_hash: String,
    pub node_public_key: [u8; 32],
    pub registered: bool,
    pub registration_error: Option<String>,
}

fn require_csr_received(state: ExchangeState) -> Result<(), ExchangeError> {
    if state != ExchangeState::CsrReceived {
        return Err(ExchangeError::InvalidState(format!(
            "exchange is {:?}, expected CsrReceived",
            state
        )));
    }
    Ok(())
}

/// Sign the node's CSR and deliver certificate, CA and routing token over
/// the encrypted stream.
pub async fn complete_exchange<S: PakeStream>(
    result: &mut ExchangeResult<S>,
    params: CompletionParams<'_>,
) -> Result<CompletionResult, ExchangeError> {
    require_csr_received(result.state)?;

    match deliver(result, &params).await {
        Ok(completion) => {
            transition(&mut result.state, ExchangeState::Completed)?;
            result.session.close();
            info!(
                node_id = %completion.node_id,
                fingerprint = %completion.fingerprint,
                registered = completion.registered,
                "pairing completed"
            );
            Ok(completion)
        }
        Err(e) => {
            result.state = ExchangeState::Failed;
            result.session.close();
            Err(e)
        }
    }
}

async fn deliver<S: PakeStream>(
    result: &mut ExchangeResult<S>,
    params: &CompletionParams<'_>,
) -> Result<CompletionResult, ExchangeError> {
    let valid_days = match params.valid_days {
        0 => DEFAULT_CERT_VALID_DAYS,
        days => days,
    };
    let ca_pem = params.identity.cert_pem().to_string();

    let signed_cert_pem = params
        .identity
        .sign_csr(&result.csr_pem, valid_days)
        .map_err(ExchangeError::Signing)?;

    if let Some(store) = params.node_store {
        if let Err(e) = store.save(&result.node_id, &signed_cert_pem) {
            warn!(node_id = %result.node_id, error = %e, "failed to store node certificate");
        }
    }

    result.send_encrypted(signed_cert_pem.as_bytes()).await?;
    result.send_encrypted(ca_pem.as_bytes()).await?;

    let routing_token = match params.user_secret {
        Some(secret) => {
            let token = generate_routing_token(&result.node_id, secret)?;
            result.send_encrypted(token.as_bytes()).await?;
            Some(token)
        }
        None => None,
    };
    debug!(node_id = %result.node_id, token = routing_token.is_some(), "delivered certificate bundle");

    let (registered, registration_error) = match params.registry {
        Some(registry) => {
            let registration = NodeRegistration {
                node_id: result.node_id.clone(),
                cert_pem: signed_cert_pem.clone(),
                routing_token: routing_token.clone(),
                ca_pem: ca_pem.clone(),
            };
            match registry.register_node(&registration).await {
                Ok(()) => (true, None),
                Err(e) => {
                    warn!(node_id = %result.node_id, error = %e, "node registration failed");
                    (false, Some(e))
                }
            }
        }
        None => (false, None),
    };

    let node_public_key =
        cert::certificate_public_key(signed_cert_pem.as_bytes()).map_err(ExchangeError::Signing)?;

    Ok(CompletionResult {
        fingerprint: generate_fingerprint(&node_public_key),
        emoji_hash: generate_emoji_hash(&node_public_key),
        node_public_key,
        node_id: result.node_id.clone(),
        signed_cert_pem,
        ca_pem,
        routing_token,
        registered,
        registration_error,
    })
}

/// Tell the node the pairing was refused.
pub async fn reject_exchange<S: PakeStream>(
    result: &mut ExchangeResult<S>,
    reason: &str,
) -> Result<(), ExchangeError> {
    require_csr_received(result.state)?;
    let msg = PakeMessage::error(&result.code, Role::Authority, reason);
    let sent = result.stream.send(msg).await;
    transition(&mut result.state, ExchangeState::Rejected)?;
    result.session.close();
    info!(node_id = %result.node_id, "pairing rejected");
    sent
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_transitions() {
        use ExchangeState::*;
        assert!(InitSent.can_transition_to(AwaitingPeerInit));
        assert!(AwaitingCsr.can_transition_to(CsrReceived));
        assert!(CsrReceived.can_transition_to(Completed));
        assert!(CsrReceived.can_transition_to(Rejected));
        assert!(KeyDerived.can_transition_to(Failed));

        assert!(!InitSent.can_transition_to(CsrReceived));
        assert!(!Completed.can_transition_to(Rejected));
        assert!(!Rejected.can_transition_to(Completed));
        assert!(!Failed.can_transition_to(Failed));

        let mut state = Completed;
        assert!(matches!(
            transition(&mut state, Rejected),
            Err(ExchangeError::InvalidState(_))
        ));
        assert_eq!(state, Completed);
    }

    #[test]
    fn test_message_constructors() {
        let msg = PakeMessage::error("1-a-b", Role::Authority, "nope");
        assert_eq!(msg.kind, MessageKind::Error);
        assert_eq!(msg.role, "cli");
        assert_eq!(msg.error_message, "nope");
        assert!(msg.spake2_data.is_empty());
        assert_eq!(MessageKind::Spake2Reply.to_string(), "SPAKE2_REPLY");
    }
}
