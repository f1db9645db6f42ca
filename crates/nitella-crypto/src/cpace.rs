//! CPace password-authenticated key exchange over Curve25519.
//!
//! Both parties hash the pairing password into a generator, run an X25519
//! exchange against that generator and expand the shared secret with
//! HKDF-SHA256. Without the password an observer cannot test guesses
//! offline; a wrong guess only shows up as an AEAD failure.
//!
//! ```text
//! sid       = SHA256("cpace-session-id:" || pw)[0..16]      (unless supplied)
//! generator = X25519(clamp(SHA256("cpace-v1-curve25519" || pw || sid)), 9)
//! public    = X25519(scalar, generator)
//! key       = HKDF-SHA256(ikm = X25519(scalar, peer),
//!                         info = authority_pub || peer_pub || sid)
//! ```

use std::fmt;
use std::str::FromStr;

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use hkdf::Hkdf;
use rand_core::{OsRng, RngCore};
use sha2::{Digest, Sha256};
use x25519_dalek::{x25519, X25519_BASEPOINT_BYTES};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::fingerprint::derive_fingerprint;
use crate::utils::is_all_zero;

const GENERATOR_DST: &[u8] = b"cpace-v1-curve25519";
const SESSION_ID_DST: &[u8] = b"cpace-session-id:";

pub const POINT_SIZE: usize = 32;
pub const KEY_SIZE: usize = 32;
pub const NONCE_SIZE: usize = 12;

/// Error type for CPace operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CPaceError {
    #[error("invalid role '{0}': expected 'cli' or 'node'")]
    InvalidRole(String),
    #[error("invalid peer public value size: expected 32 bytes, got {0}")]
    InvalidPeerValue(usize),
    #[error("invalid peer public value: identity point")]
    IdentityPointRejected,
    #[error("peer public value already set")]
    PeerAlreadySet,
    #[error("key exchange not complete")]
    KeyExchangeIncomplete,
    #[error("session closed")]
    SessionClosed,
    #[error("authentication failed")]
    AuthenticationFailed,
    #[error("encryption failed")]
    EncryptionFailed,
    #[error("key derivation failed")]
    KeyDerivation,
    #[error("RNG failed")]
    RngError,
}

/// Which side of the exchange a session plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// The CLI holding the root CA. Sends the first message.
    Authority,
    /// The node or hub being paired.
    Peer,
}

impl Role {
    /// Tag carried on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Authority => "cli",
            Role::Peer => "node",
        }
    }

    pub fn opposite(self) -> Role {
        match self {
            Role::Authority => Role::Peer,
            Role::Peer => Role::Authority,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = CPaceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cli" | "authority" => Ok(Role::Authority),
            "node" | "peer" => Ok(Role::Peer),
            other => Err(CPaceError::InvalidRole(other.to_string())),
        }
    }
}

/// One side of a CPace exchange.
///
/// Not `Clone`. Scalar, generator and key are wiped by [`close`](Self::close)
/// and on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct CPaceSession {
    #[zeroize(skip)]
    role: Role,
    session_id: Vec<u8>,
    scalar: [u8; 32],
    generator: [u8; 32],
    public: [u8; 32],
    peer_public: Option<[u8; 32]>,
    shared_key: Option<[u8; 32]>,
    // Cleared by zeroize, so a closed session stays unusable.
    open: bool,
}

impl CPaceSession {
    /// Start a session for `role`. When `session_id` is `None` it is derived
    /// from the password so that both sides agree without an extra message.
    pub fn new(role: Role, password: &[u8], session_id: Option<&[u8]>) -> Result<Self, CPaceError> {
        let session_id = match session_id {
            Some(sid) => sid.to_vec(),
            None => derive_session_id(password),
        };

        let generator = derive_generator(password, &session_id);

        let mut scalar = [0u8; 32];
        OsRng
            .try_fill_bytes(&mut scalar)
            .map_err(|_| CPaceError::RngError)?;
        clamp(&mut scalar);

        let public = x25519(scalar, generator);

        Ok(Self {
            role,
            session_id,
            scalar,
            generator,
            public,
            peer_public: None,
            shared_key: None,
            open: true,
        })
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn session_id(&self) -> &[u8] {
        &self.session_id
    }

    /// Own public value, sent to the peer.
    pub fn public_value(&self) -> [u8; 32] {
        self.public
    }

    pub fn is_complete(&self) -> bool {
        self.shared_key.is_some()
    }

    /// Derived session key, once the peer value has been accepted.
    pub fn shared_key(&self) -> Option<&[u8; 32]> {
        self.shared_key.as_ref()
    }

    /// Accept the peer's public value and derive the session key.
    pub fn set_peer_public(&mut self, peer: &[u8]) -> Result<(), CPaceError> {
        let peer: [u8; 32] = peer
            .try_into()
            .map_err(|_| CPaceError::InvalidPeerValue(peer.len()))?;
        if is_all_zero(&peer) {
            return Err(CPaceError::IdentityPointRejected);
        }
        if !self.open {
            return Err(CPaceError::SessionClosed);
        }
        if self.shared_key.is_some() {
            return Err(CPaceError::PeerAlreadySet);
        }

        let mut shared = x25519(self.scalar, peer);
        // Low-order peer points collapse the shared secret to zero.
        if is_all_zero(&shared) {
            shared.zeroize();
            return Err(CPaceError::IdentityPointRejected);
        }

        let key = self.derive_session_key(&shared, &peer);
        shared.zeroize();

        self.peer_public = Some(peer);
        self.shared_key = Some(key?);
        Ok(())
    }

    fn derive_session_key(&self, shared: &[u8; 32], peer: &[u8; 32]) -> Result<[u8; 32], CPaceError> {
        let (authority_pub, peer_pub) = match self.role {
            Role::Authority => (&self.public, peer),
            Role::Peer => (peer, &self.public),
        };

        let mut info = Vec::with_capacity(2 * POINT_SIZE + self.session_id.len());
        info.extend_from_slice(authority_pub);
        info.extend_from_slice(peer_pub);
        info.extend_from_slice(&self.session_id);

        let hk = Hkdf::<Sha256>::new(None, shared);
        let mut key = [0u8; KEY_SIZE];
        hk.expand(&info, &mut key)
            .map_err(|_| CPaceError::KeyDerivation)?;
        Ok(key)
    }

    /// AES-256-GCM with a fresh random nonce. Returns `(ciphertext, nonce)`.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<(Vec<u8>, [u8; NONCE_SIZE]), CPaceError> {
        let key = self.shared_key.as_ref().ok_or(CPaceError::KeyExchangeIncomplete)?;
        let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| CPaceError::EncryptionFailed)?;

        let mut nonce = [0u8; NONCE_SIZE];
        OsRng
            .try_fill_bytes(&mut nonce)
            .map_err(|_| CPaceError::RngError)?;

        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|_| CPaceError::EncryptionFailed)?;
        Ok((ciphertext, nonce))
    }

    /// Reverse of [`encrypt`](Self::encrypt). A wrong key, tampered
    /// ciphertext or malformed nonce all report `AuthenticationFailed`.
    pub fn decrypt(&self, ciphertext: &[u8], nonce: &[u8]) -> Result<Vec<u8>, CPaceError> {
        let key = self.shared_key.as_ref().ok_or(CPaceError::KeyExchangeIncomplete)?;
        if nonce.len() != NONCE_SIZE {
            return Err(CPaceError::AuthenticationFailed);
        }
        let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| CPaceError::AuthenticationFailed)?;
        cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| CPaceError::AuthenticationFailed)
    }

    /// Four emoji both users compare out of band. Empty until the key exists.
    pub fn derive_confirmation_emoji(&self) -> String {
        match self.shared_key.as_ref() {
            Some(key) => derive_fingerprint(key),
            None => String::new(),
        }
    }

    /// Wipe all key material. Safe to call more than once.
    pub fn close(&mut self) {
        self.zeroize();
    }
}

impl fmt::Debug for CPaceSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CPaceSession")
            .field("role", &self.role)
            .field("session_id", &hex::encode(&self.session_id))
            .field("complete", &self.is_complete())
            .finish_non_exhaustive()
    }
}

fn derive_session_id(password: &[u8]) -> Vec<u8> {
    let mut h = Sha256::new();
    h.update(SESSION_ID_DST);
    h.update(password);
    h.finalize()[..16].to_vec()
}

fn derive_generator(password: &[u8], session_id: &[u8]) -> [u8; 32] {
    let mut h = Sha256::new();
    h.update(GENERATOR_DST);
    h.update(password);
    h.update(session_id);

    let mut scalar = [0u8; 32];
    scalar.copy_from_slice(&h.finalize());
    clamp(&mut scalar);
    let generator = x25519(scalar, X25519_BASEPOINT_BYTES);
    scalar.zeroize();
    generator
}

fn clamp(scalar: &mut [u8; 32]) {
    scalar[0] &= 248;
    scalar[31] &= 127;
    scalar[31] |= 64;
}
