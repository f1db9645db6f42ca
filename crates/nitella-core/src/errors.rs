//! Error types for Nitella core.
//!
//! One enum per flow. Lower-level crypto errors nest through `#[from]`, so a
//! caller can still match on the original cause.

use std::path::PathBuf;

use thiserror::Error;

use nitella_crypto::{
    cert::CertError, cpace::CPaceError, keystore::KeystoreError, mnemonic::MnemonicError,
    routing::RoutingError, wordlist::CodeError,
};

// ============================================================================
// Exchange
// ============================================================================

/// Errors raised by the live PAKE exchange.
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// PAKE setup or key agreement failed
    #[error("pake: {0}")]
    Pake(#[from] CPaceError),

    #[error("pairing code: {0}")]
    InvalidCode(#[from] CodeError),

    /// The node sent an explicit error message
    #[error("peer error: {0}")]
    PeerError(String),

    /// The stream ended before the exchange finished
    #[error("peer disconnected")]
    PeerDisconnected,

    /// The underlying stream failed
    #[error("transport: {0}")]
    Transport(String),

    /// The caller's deadline passed
    #[error("pairing timed out")]
    Timeout,

    #[error("unexpected message type: expected {expected}, got {got}")]
    UnexpectedMessageType { expected: String, got: String },

    /// The CSR could not be decrypted. With a well-formed peer this means the
    /// pairing codes differ.
    #[error("verification failed: pairing code mismatch or corrupted payload")]
    VerificationFailed,

    #[error("CSR is missing a common name")]
    MissingCommonName,

    #[error("CSR public key is not Ed25519")]
    UnsupportedKeyType,

    #[error("invalid CSR: {0}")]
    InvalidCsr(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("failed to sign CSR: {0}")]
    Signing(#[source] CertError),

    #[error("routing token: {0}")]
    Routing(#[from] RoutingError),
}

impl ExchangeError {
    /// True when the failure is the "wrong code" path rather than a protocol
    /// or transport problem.
    pub fn is_authentication_failure(&self) -> bool {
        matches!(
            self,
            ExchangeError::VerificationFailed
                | ExchangeError::Pake(CPaceError::AuthenticationFailed)
        )
    }
}

// ============================================================================
// Identity
// ============================================================================

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("identity not found in {}", .0.display())]
    NotFound(PathBuf),

    #[error("invalid mnemonic")]
    InvalidMnemonic,

    #[error(transparent)]
    Keystore(#[from] KeystoreError),

    #[error(transparent)]
    Cert(#[from] CertError),

    #[error(transparent)]
    Mnemonic(#[from] MnemonicError),
}

impl IdentityError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        IdentityError::Io {
            path: path.into(),
            source,
        }
    }

    /// The stored key is encrypted and no passphrase, or the wrong one, was
    /// given.
    pub fn is_passphrase_error(&self) -> bool {
        matches!(
            self,
            IdentityError::Keystore(KeystoreError::PassphraseRequired)
                | IdentityError::Keystore(KeystoreError::DecryptionFailed)
        )
    }
}

// ============================================================================
// Node certificate store
// ============================================================================

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("node id is empty")]
    EmptyNodeId,

    #[error("no certificate stored for node {0}")]
    NotFound(String),

    #[error(transparent)]
    Cert(#[from] CertError),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }
}

// ============================================================================
// QR payloads
// ============================================================================

#[derive(Debug, Error)]
pub enum QrError {
    #[error("empty QR payload")]
    Empty,

    #[error("unrecognized QR payload")]
    Unrecognized,

    #[error("invalid base64 in field {0}")]
    InvalidBase64(&'static str),

    #[error("payload missing field {0}")]
    MissingField(&'static str),

    #[error("payload type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),
}

// ============================================================================
// Offline pairing
// ============================================================================

#[derive(Debug, Error)]
pub enum OfflineError {
    #[error("scan session id is required")]
    MissingScanId,

    #[error("scan session not found")]
    NotFound,

    #[error("scan session expired")]
    Expired,

    #[error("CSR missing CommonName/node_id")]
    MissingNodeId,

    #[error("node_id mismatch with scan session")]
    NodeIdMismatch,

    #[error("CSR common name does not match node_id")]
    CommonNameMismatch,

    #[error(transparent)]
    Qr(#[from] QrError),

    #[error(transparent)]
    Cert(#[from] CertError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

// ============================================================================
// Hub trust challenges
// ============================================================================

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TrustError {
    #[error("hub CA data is missing")]
    MissingCaData,

    #[error("trust challenge not found or expired")]
    NotFound,

    #[error("trust challenge is for a different hub address")]
    HubAddressMismatch,
}

#[derive(Debug, Error)]
pub enum OnboardError {
    #[error("hub address is required")]
    MissingHubAddress,

    #[error("trust challenge id is required")]
    MissingChallengeId,

    #[error(transparent)]
    Trust(#[from] TrustError),

    #[error("hub certificate rejected by user")]
    Rejected,

    #[error("hub certificate fingerprint mismatch")]
    FingerprintMismatch,

    #[error("hub certificate emoji hash mismatch")]
    EmojiHashMismatch,

    #[error("trusted CA does not match current hub certificate")]
    CaMismatch,

    #[error("failed to verify current hub certificate: {0}")]
    Probe(String),

    #[error("failed to fetch hub CA: {0}")]
    FetchCa(String),

    #[error("failed to connect to hub: {0}")]
    Connect(String),

    #[error("registration failed: {0}")]
    Registration(String),
}

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("could not determine home directory")]
    NoHomeDir,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authentication_failures() {
        assert!(ExchangeError::VerificationFailed.is_authentication_failure());
        assert!(ExchangeError::Pake(CPaceError::AuthenticationFailed).is_authentication_failure());
        assert!(!ExchangeError::PeerDisconnected.is_authentication_failure());
        assert!(!ExchangeError::InvalidState("x".into()).is_authentication_failure());
        assert!(!ExchangeError::Pake(CPaceError::IdentityPointRejected).is_authentication_failure());
    }

    #[test]
    fn test_messages_match_wire_text() {
        assert_eq!(TrustError::NotFound.to_string(), "trust challenge not found or expired");
        assert_eq!(OnboardError::Rejected.to_string(), "hub certificate rejected by user");
        assert_eq!(OfflineError::Expired.to_string(), "scan session expired");
    }
}
