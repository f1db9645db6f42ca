//! Hub trust-on-first-use.
//!
//! When the Hub's certificate is not signed by anything we already trust,
//! onboarding stops with a [`TrustChallenge`]: the Hub CA with its
//! fingerprint and emoji hash, for the user to compare out of band. Accepting
//! the challenge re-probes the Hub, checks that it still presents the same CA,
//! pins it and carries on where onboarding left off.
//!
//! Challenges live for five minutes and are consumed exactly once.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, info, warn};

use nitella_crypto::{
    cert::{self, CertError},
    fingerprint::{generate_emoji_hash, generate_fingerprint, normalize_fingerprint},
    utils::random_hex_id,
};

use crate::errors::{OnboardError, TrustError};

pub const DEFAULT_CHALLENGE_TTL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_INVITE_CODE: &str = "NITELLA";

// ============================================================================
// Hub CA description
// ============================================================================

/// The CA a Hub presents, in displayable form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubCaInfo {
    pub ca_pem: String,
    /// Hex SHA-256 of the CA public key.
    pub fingerprint: String,
    pub emoji_hash: String,
    /// CN of the CA.
    pub subject: String,
    /// `YYYY-MM-DD` of the CA's notAfter.
    pub expires: String,
}

impl HubCaInfo {
    /// Describe an ed25519 CA certificate.
    pub fn from_ca_pem(ca_pem: &str) -> Result<Self, CertError> {
        let info = cert::parse_certificate(ca_pem.as_bytes())?;
        let public_key = info.public_key.ok_or(CertError::UnsupportedKeyType)?;
        let not_after = info.not_after;
        Ok(Self {
            ca_pem: ca_pem.to_string(),
            fingerprint: generate_fingerprint(&public_key),
            emoji_hash: generate_emoji_hash(&public_key),
            subject: info.common_name,
            expires: format!(
                "{:04}-{:02}-{:02}",
                not_after.year(),
                u8::from(not_after.month()),
                not_after.day()
            ),
        })
    }
}

/// Whether an error message from a TLS/gRPC stack looks like the Hub
/// certificate was not trusted.
pub fn looks_like_trust_failure(message: &str) -> bool {
    let msg = message.trim().to_lowercase();
    if msg.is_empty() {
        return false;
    }
    ["x509", "certificate", "tls", "transport", "authentication handshake failed"]
        .iter()
        .any(|needle| msg.contains(needle))
}

fn same_pem(a: &str, b: &str) -> bool {
    a.trim() == b.trim()
}

// ============================================================================
// Challenge store
// ============================================================================

/// What to do once the Hub is trusted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OnboardingContext {
    pub invite_code: String,
    pub token: Option<String>,
    pub skip_registration: bool,
}

/// A pending request for the user to trust a Hub CA.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustChallenge {
    pub challenge_id: String,
    pub hub_address: String,
    pub ca: HubCaInfo,
    pub expires_at: DateTime<Utc>,
}

struct ChallengeSession {
    challenge: TrustChallenge,
    context: OnboardingContext,
}

pub struct TrustChallengeStore {
    sessions: Mutex<HashMap<String, ChallengeSession>>,
    ttl: chrono::Duration,
}

impl Default for TrustChallengeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TrustChallengeStore {
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_CHALLENGE_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl: chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::minutes(5)),
        }
    }

    pub fn create_challenge(
        &self,
        hub_address: &str,
        ca: HubCaInfo,
        context: OnboardingContext,
    ) -> Result<TrustChallenge, TrustError> {
        if ca.ca_pem.trim().is_empty() {
            return Err(TrustError::MissingCaData);
        }

        let now = Utc::now();
        let challenge = TrustChallenge {
            challenge_id: random_hex_id(),
            hub_address: hub_address.trim().to_string(),
            ca,
            expires_at: now + self.ttl,
        };

        let mut sessions = self.sessions.lock();
        sweep(&mut sessions, now);
        sessions.insert(
            challenge.challenge_id.clone(),
            ChallengeSession {
                challenge: challenge.clone(),
                context,
            },
        );
        info!(
            hub = %challenge.hub_address,
            fingerprint = %challenge.ca.fingerprint,
            "hub trust challenge created"
        );
        Ok(challenge)
    }

    /// Look at a live challenge without consuming it.
    pub fn lookup(&self, challenge_id: &str) -> Result<(TrustChallenge, OnboardingContext), TrustError> {
        let mut sessions = self.sessions.lock();
        sweep(&mut sessions, Utc::now());
        sessions
            .get(challenge_id.trim())
            .map(|s| (s.challenge.clone(), s.context.clone()))
            .ok_or(TrustError::NotFound)
    }

    /// Consume a challenge. It is gone after this call whatever the outcome,
    /// including an address mismatch.
    pub fn take_challenge(
        &self,
        hub_address: &str,
        challenge_id: &str,
    ) -> Result<(TrustChallenge, OnboardingContext), TrustError> {
        let session = {
            let mut sessions = self.sessions.lock();
            sweep(&mut sessions, Utc::now());
            sessions.remove(challenge_id.trim()).ok_or(TrustError::NotFound)?
        };

        if session.challenge.hub_address != hub_address.trim() {
            warn!(
                expected = %session.challenge.hub_address,
                got = %hub_address.trim(),
                "trust challenge used for a different hub"
            );
            return Err(TrustError::HubAddressMismatch);
        }
        Ok((session.challenge, session.context))
    }

    /// A live challenge, preferring one for `hub_address`.
    pub fn pending_challenge(&self, hub_address: &str) -> Option<TrustChallenge> {
        let hub_address = hub_address.trim();
        let mut sessions = self.sessions.lock();
        sweep(&mut sessions, Utc::now());

        sessions
            .values()
            .find(|s| s.challenge.hub_address == hub_address)
            .or_else(|| sessions.values().next())
            .map(|s| s.challenge.clone())
    }

    /// Drop a challenge. Returns whether it was live.
    pub fn remove(&self, challenge_id: &str) -> bool {
        let mut sessions = self.sessions.lock();
        sweep(&mut sessions, Utc::now());
        sessions.remove(challenge_id.trim()).is_some()
    }

    pub fn len(&self) -> usize {
        let mut sessions = self.sessions.lock();
        sweep(&mut sessions, Utc::now());
        sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn sweep(sessions: &mut HashMap<String, ChallengeSession>, now: DateTime<Utc>) {
    let before = sessions.len();
    sessions.retain(|_, s| now < s.challenge.expires_at);
    let swept = before - sessions.len();
    if swept > 0 {
        debug!(swept, "expired trust challenges removed");
    }
}

// ============================================================================
// Onboarding
// ============================================================================

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConnectError {
    /// The Hub certificate did not verify against the trust store.
    #[error("hub certificate untrusted: {0}")]
    CertificateUntrusted(String),

    #[error("{0}")]
    Failed(String),
}

impl ConnectError {
    pub fn is_trust_failure(&self) -> bool {
        match self {
            ConnectError::CertificateUntrusted(_) => true,
            ConnectError::Failed(msg) => looks_like_trust_failure(msg),
        }
    }
}

/// Account created on the Hub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRegistration {
    pub user_id: String,
    pub tier: String,
    pub max_nodes: u32,
}

/// Network side of onboarding.
#[async_trait]
pub trait HubConnector: Send + Sync {
    /// Open the control connection. `pinned_ca` is a CA the user accepted.
    async fn connect(&self, hub_address: &str, pinned_ca: Option<&str>) -> Result<(), ConnectError>;

    /// Fetch the CA the Hub presents, without verifying it.
    async fn fetch_ca(&self, hub_address: &str) -> Result<HubCaInfo, String>;

    /// Fresh probe used to confirm an accepted CA is still what the Hub
    /// presents.
    async fn probe_ca(&self, hub_address: &str) -> Result<HubCaInfo, String>;

    async fn register_user(
        &self,
        hub_address: &str,
        invite_code: &str,
        token: Option<&str>,
    ) -> Result<UserRegistration, String>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OnboardRequest {
    pub hub_address: String,
    pub context: OnboardingContext,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnboardResult {
    pub hub_address: String,
    /// Set when the connection used a CA the user just accepted.
    pub trusted_ca: Option<HubCaInfo>,
    /// `None` when registration was skipped.
    pub registration: Option<UserRegistration>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OnboardOutcome {
    /// The user must compare and accept or reject the Hub CA.
    NeedsTrust(TrustChallenge),
    Completed(OnboardResult),
}

pub struct HubOnboarding<C: HubConnector> {
    connector: C,
    challenges: TrustChallengeStore,
    default_invite_code: String,
}

impl<C: HubConnector> HubOnboarding<C> {
    pub fn new(connector: C) -> Self {
        Self::with_store(connector, TrustChallengeStore::new())
    }

    pub fn with_store(connector: C, challenges: TrustChallengeStore) -> Self {
        Self {
            connector,
            challenges,
            default_invite_code: DEFAULT_INVITE_CODE.to_string(),
        }
    }

    pub fn with_default_invite_code(mut self, code: impl Into<String>) -> Self {
        self.default_invite_code = code.into();
        self
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    pub fn challenges(&self) -> &TrustChallengeStore {
        &self.challenges
    }

    pub async fn onboard(&self, request: OnboardRequest) -> Result<OnboardOutcome, OnboardError> {
        self.run(&request.hub_address, request.context, None).await
    }

    /// Answer a trust challenge. Rejecting consumes it; accepting re-probes
    /// the Hub and continues onboarding with the stored context.
    pub async fn resolve(&self, challenge_id: &str, accepted: bool) -> Result<OnboardOutcome, OnboardError> {
        let challenge_id = challenge_id.trim();
        if challenge_id.is_empty() {
            return Err(OnboardError::MissingChallengeId);
        }

        if !accepted {
            if !self.challenges.remove(challenge_id) {
                return Err(TrustError::NotFound.into());
            }
            warn!("hub certificate rejected by user");
            return Err(OnboardError::Rejected);
        }

        let (challenge, context) = self.challenges.lookup(challenge_id)?;
        self.run(&challenge.hub_address, context, Some(challenge_id))
            .await
    }

    /// Take the accepted challenge and make sure the Hub still presents the
    /// same CA.
    async fn confirm_accepted(&self, hub_address: &str, challenge_id: &str) -> Result<HubCaInfo, OnboardError> {
        let (challenge, _) = self.challenges.take_challenge(hub_address, challenge_id)?;
        let accepted = challenge.ca;
        let current = self
            .connector
            .probe_ca(hub_address)
            .await
            .map_err(OnboardError::Probe)?;

        if !accepted.fingerprint.trim().is_empty()
            && normalize_fingerprint(&accepted.fingerprint) != normalize_fingerprint(&current.fingerprint)
        {
            warn!(hub = %hub_address, "hub certificate fingerprint changed since challenge");
            return Err(OnboardError::FingerprintMismatch);
        }
        if !accepted.emoji_hash.trim().is_empty()
            && accepted.emoji_hash.trim() != current.emoji_hash.trim()
        {
            warn!(hub = %hub_address, "hub certificate emoji hash changed since challenge");
            return Err(OnboardError::EmojiHashMismatch);
        }
        if !same_pem(&accepted.ca_pem, &current.ca_pem) {
            warn!(hub = %hub_address, "hub CA changed since challenge");
            return Err(OnboardError::CaMismatch);
        }
        Ok(accepted)
    }

    async fn run(
        &self,
        hub_address: &str,
        context: OnboardingContext,
        accepted_challenge: Option<&str>,
    ) -> Result<OnboardOutcome, OnboardError> {
        let hub_address = hub_address.trim();
        if hub_address.is_empty() {
            return Err(OnboardError::MissingHubAddress);
        }

        let trusted_ca = match accepted_challenge {
            Some(id) => Some(self.confirm_accepted(hub_address, id).await?),
            None => None,
        };

        let pinned = trusted_ca.as_ref().map(|ca| ca.ca_pem.as_str());
        if let Err(e) = self.connector.connect(hub_address, pinned).await {
            if trusted_ca.is_none() && e.is_trust_failure() {
                debug!(hub = %hub_address, error = %e, "hub certificate not trusted");
                let ca = self
                    .connector
                    .fetch_ca(hub_address)
                    .await
                    .map_err(OnboardError::FetchCa)?;
                let challenge = self.challenges.create_challenge(hub_address, ca, context)?;
                return Ok(OnboardOutcome::NeedsTrust(challenge));
            }
            return Err(OnboardError::Connect(e.to_string()));
        }

        let registration = if context.skip_registration {
            None
        } else {
            let invite_code = match context.invite_code.trim() {
                "" => self.default_invite_code.as_str(),
                code => code,
            };
            let registration = self
                .connector
                .register_user(hub_address, invite_code, context.token.as_deref())
                .await
                .map_err(OnboardError::Registration)?;
            Some(registration)
        };

        info!(
            hub = %hub_address,
            pinned = trusted_ca.is_some(),
            registered = registration.is_some(),
            "hub onboarding completed"
        );
        Ok(OnboardOutcome::Completed(OnboardResult {
            hub_address: hub_address.to_string(),
            trusted_ca,
            registration,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ca(tag: &str) -> HubCaInfo {
        HubCaInfo {
            ca_pem: format!("-----BEGIN CERTIFICATE-----\n{tag}\n-----END CERTIFICATE-----\n"),
            fingerprint: format!("{tag}fp"),
            emoji_hash: format!("{tag}emoji"),
            subject: "Hub Root CA".into(),
            expires: "2035-01-01".into(),
        }
    }

    #[test]
    fn test_trust_failure_detection() {
        assert!(looks_like_trust_failure("x509: certificate signed by unknown authority"));
        assert!(looks_like_trust_failure("  TLS handshake error "));
        assert!(looks_like_trust_failure("rpc error: authentication handshake failed: EOF"));
        assert!(!looks_like_trust_failure("connection refused"));
        assert!(!looks_like_trust_failure("   "));
        assert!(ConnectError::CertificateUntrusted(String::new()).is_trust_failure());
        assert!(!ConnectError::Failed("timeout".into()).is_trust_failure());
    }

    #[test]
    fn test_challenge_taken_once() {
        let store = TrustChallengeStore::new();
        let challenge = store
            .create_challenge(" hub.example:443 ", ca("a"), OnboardingContext::default())
            .unwrap();
        assert_eq!(challenge.hub_address, "hub.example:443");
        assert_eq!(challenge.challenge_id.len(), 32);
        assert!(challenge.expires_at > Utc::now());

        let (taken, _) = store
            .take_challenge("hub.example:443", &challenge.challenge_id)
            .unwrap();
        assert_eq!(taken, challenge);
        assert_eq!(
            store.take_challenge("hub.example:443", &challenge.challenge_id),
            Err(TrustError::NotFound)
        );
    }

    #[test]
    fn test_expired_challenge_cannot_be_taken() {
        let store = TrustChallengeStore::with_ttl(Duration::ZERO);
        let challenge = store
            .create_challenge("hub", ca("a"), OnboardingContext::default())
            .unwrap();
        assert_eq!(
            store.take_challenge("hub", &challenge.challenge_id),
            Err(TrustError::NotFound)
        );
        assert!(store.is_empty());
    }

    #[test]
    fn test_address_mismatch_consumes() {
        let store = TrustChallengeStore::new();
        let challenge = store
            .create_challenge("hub-a", ca("a"), OnboardingContext::default())
            .unwrap();
        assert_eq!(
            store.take_challenge("hub-b", &challenge.challenge_id),
            Err(TrustError::HubAddressMismatch)
        );
        assert_eq!(
            store.take_challenge("hub-a", &challenge.challenge_id),
            Err(TrustError::NotFound)
        );
    }

    #[test]
    fn test_missing_ca_data() {
        let store = TrustChallengeStore::new();
        let mut empty = ca("a");
        empty.ca_pem = "  ".into();
        assert_eq!(
            store.create_challenge("hub", empty, OnboardingContext::default()),
            Err(TrustError::MissingCaData)
        );
    }

    #[test]
    fn test_pending_prefers_address() {
        let store = TrustChallengeStore::new();
        assert!(store.pending_challenge("hub-a").is_none());
        store
            .create_challenge("hub-a", ca("a"), OnboardingContext::default())
            .unwrap();
        let b = store
            .create_challenge("hub-b", ca("b"), OnboardingContext::default())
            .unwrap();
        assert_eq!(store.pending_challenge("hub-b").unwrap(), b);
        assert!(store.pending_challenge("hub-c").is_some());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_hub_ca_info_from_pem() {
        let identity = crate::harness::ca_identity();
        let info = HubCaInfo::from_ca_pem(identity.cert_pem()).unwrap();
        assert_eq!(info.fingerprint, identity.fingerprint());
        assert_eq!(info.emoji_hash, identity.emoji_hash());
        assert!(info.subject.ends_with("Root CA"));
        assert_eq!(info.expires.len(), 10);
    }
}
