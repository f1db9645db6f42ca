//! Message-oriented wrapper around [`CPaceSession`].
//!
//! The authority sends its public value as the init message; the peer
//! answers with its own. Both sides then hold the same key if and only if
//! they typed the same pairing code.

use crate::cpace::{CPaceError, CPaceSession, Role, NONCE_SIZE};
use crate::wordlist::code_to_password;

/// A PAKE session bound to one pairing code.
#[derive(Debug)]
pub struct PakeSession {
    inner: CPaceSession,
}

impl PakeSession {
    pub fn new(role: Role, password: &[u8]) -> Result<Self, CPaceError> {
        Ok(Self {
            inner: CPaceSession::new(role, password, None)?,
        })
    }

    /// Session keyed by a `digit-word-word` pairing code.
    pub fn from_code(role: Role, code: &str) -> Result<Self, CPaceError> {
        Self::new(role, code_to_password(code))
    }

    pub fn role(&self) -> Role {
        self.inner.role()
    }

    /// First message of the exchange: our public value.
    pub fn get_init_message(&self) -> Vec<u8> {
        self.inner.public_value().to_vec()
    }

    /// Handle the other side's init and return our reply.
    pub fn process_init_message(&mut self, peer: &[u8]) -> Result<Vec<u8>, CPaceError> {
        self.inner.set_peer_public(peer)?;
        Ok(self.inner.public_value().to_vec())
    }

    /// Handle the reply to our init.
    pub fn process_reply_message(&mut self, peer: &[u8]) -> Result<(), CPaceError> {
        self.inner.set_peer_public(peer)
    }

    pub fn is_complete(&self) -> bool {
        self.inner.is_complete()
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> Result<(Vec<u8>, [u8; NONCE_SIZE]), CPaceError> {
        self.inner.encrypt(plaintext)
    }

    pub fn decrypt(&self, ciphertext: &[u8], nonce: &[u8]) -> Result<Vec<u8>, CPaceError> {
        self.inner.decrypt(ciphertext, nonce)
    }

    pub fn derive_confirmation_emoji(&self) -> String {
        self.inner.derive_confirmation_emoji()
    }

    pub fn shared_key(&self) -> Option<&[u8; 32]> {
        self.inner.shared_key()
    }

    pub fn close(&mut self) {
        self.inner.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_reply_flow() {
        let mut cli = PakeSession::from_code(Role::Authority, "4-tiger-castle").unwrap();
        let mut node = PakeSession::from_code(Role::Peer, "4-tiger-castle").unwrap();

        let init = cli.get_init_message();
        let reply = node.process_init_message(&init).unwrap();
        assert!(node.is_complete());
        assert!(!cli.is_complete());

        cli.process_reply_message(&reply).unwrap();
        assert!(cli.is_complete());
        assert_eq!(cli.derive_confirmation_emoji(), node.derive_confirmation_emoji());

        let (ct, nonce) = node.encrypt(b"-----BEGIN CERTIFICATE REQUEST-----").unwrap();
        assert_eq!(
            cli.decrypt(&ct, &nonce).unwrap(),
            b"-----BEGIN CERTIFICATE REQUEST-----"
        );
    }

    #[test]
    fn test_wrong_code_fails_authentication() {
        let mut cli = PakeSession::from_code(Role::Authority, "4-tiger-castle").unwrap();
        let mut node = PakeSession::from_code(Role::Peer, "5-tiger-castle").unwrap();
        let reply = node.process_init_message(&cli.get_init_message()).unwrap();
        cli.process_reply_message(&reply).unwrap();

        let (ct, nonce) = node.encrypt(b"csr").unwrap();
        assert_eq!(cli.decrypt(&ct, &nonce), Err(CPaceError::AuthenticationFailed));
    }

    #[test]
    fn test_bad_init_message() {
        let mut node = PakeSession::from_code(Role::Peer, "4-tiger-castle").unwrap();
        assert_eq!(
            node.process_init_message(&[0u8; 16]),
            Err(CPaceError::InvalidPeerValue(16))
        );
        assert!(!node.is_complete());
    }
}
