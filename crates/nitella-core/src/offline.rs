//! Offline pairing through QR codes.
//!
//! [`OfflinePairing::scan`] validates a node's CSR QR code and parks it in a
//! short-lived scan session so the user can compare fingerprints.
//! [`OfflinePairing::respond`] then signs it and produces the reply QR code.
//! Sessions expire after five minutes and are swept on every access.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, info};

use nitella_crypto::{
    cert,
    fingerprint::{derive_fingerprint, generate_emoji_hash, generate_fingerprint},
    utils::random_hex_id,
};

use crate::errors::OfflineError;
use crate::exchange::DEFAULT_CERT_VALID_DAYS;
use crate::identity::Identity;
use crate::node_store::NodeCertStore;
use crate::qr::QrPayload;

pub const DEFAULT_SCAN_TTL: Duration = Duration::from_secs(5 * 60);

struct ScanSession {
    node_id: String,
    csr_pem: Vec<u8>,
    expires_at: Instant,
}

/// What the user sees after scanning a node's QR code.
#[derive(Debug, Clone)]
pub struct ScanResult {
    pub scan_id: String,
    pub node_id: String,
    pub csr_pem: Vec<u8>,
    /// `hex(SHA256(node public key))`
    pub fingerprint: String,
    pub emoji_hash: String,
}

/// Reply to show back to the node.
#[derive(Debug, Clone)]
pub struct QrResponse {
    /// Encoded `cert` payload, ready to render as a QR code.
    pub qr_data: String,
    pub cert_pem: String,
    pub node_id: String,
    /// Emoji fingerprint of the certificate PEM, as carried in the payload.
    pub fingerprint: String,
}

pub struct OfflinePairing {
    sessions: Mutex<HashMap<String, ScanSession>>,
    ttl: Duration,
    cert_valid_days: u32,
}

impl Default for OfflinePairing {
    fn default() -> Self {
        Self::new()
    }
}

impl OfflinePairing {
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_SCAN_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl,
            cert_valid_days: DEFAULT_CERT_VALID_DAYS,
        }
    }

    /// Validity of certificates signed by [`respond`](Self::respond).
    /// 0 means [`DEFAULT_CERT_VALID_DAYS`].
    pub fn with_cert_valid_days(mut self, days: u32) -> Self {
        self.cert_valid_days = if days == 0 { DEFAULT_CERT_VALID_DAYS } else { days };
        self
    }

    /// Live scan sessions.
    pub fn pending(&self) -> usize {
        let mut sessions = self.sessions.lock();
        sweep(&mut sessions, Instant::now());
        sessions.len()
    }

    pub fn scan(&self, qr_data: &str) -> Result<ScanResult, OfflineError> {
        let payload = QrPayload::decode(qr_data)?;
        let csr_pem = payload.get_csr()?.to_vec();
        let info = cert::parse_csr(&csr_pem)?;

        let node_id = match info.common_name.trim() {
            "" => payload.node_id.clone().unwrap_or_default(),
            cn => cn.to_string(),
        };
        if node_id.is_empty() {
            return Err(OfflineError::MissingNodeId);
        }

        let scan_id = random_hex_id();
        let now = Instant::now();
        {
            let mut sessions = self.sessions.lock();
            sweep(&mut sessions, now);
            sessions.insert(
                scan_id.clone(),
                ScanSession {
                    node_id: node_id.clone(),
                    csr_pem: csr_pem.clone(),
                    expires_at: now + self.ttl,
                },
            );
        }
        info!(node_id = %node_id, "scanned node CSR");

        Ok(ScanResult {
            scan_id,
            node_id,
            csr_pem,
            fingerprint: generate_fingerprint(&info.public_key),
            emoji_hash: generate_emoji_hash(&info.public_key),
        })
    }

    /// Take the scan session out of the map after checking it is live and
    /// matches `node_id`.
    fn take_session(&self, scan_id: &str, node_id: Option<&str>) -> Result<ScanSession, OfflineError> {
        let now = Instant::now();
        let mut sessions = self.sessions.lock();

        let session = sessions.get(scan_id).ok_or(OfflineError::NotFound)?;
        if now >= session.expires_at {
            sessions.remove(scan_id);
            return Err(OfflineError::Expired);
        }
        let requested = node_id.map(str::trim).unwrap_or("");
        if !requested.is_empty() && !session.node_id.is_empty() && requested != session.node_id {
            return Err(OfflineError::NodeIdMismatch);
        }

        let session = sessions.remove(scan_id).ok_or(OfflineError::NotFound)?;
        sweep(&mut sessions, now);
        Ok(session)
    }

    /// Sign the scanned CSR and build the `cert` reply payload. The scan
    /// session is consumed.
    pub fn respond(
        &self,
        scan_id: &str,
        node_id: Option<&str>,
        identity: &Identity,
        node_store: Option<&NodeCertStore>,
    ) -> Result<QrResponse, OfflineError> {
        let scan_id = scan_id.trim();
        if scan_id.is_empty() {
            return Err(OfflineError::MissingScanId);
        }
        let session = self.take_session(scan_id, node_id)?;

        let info = cert::parse_csr(&session.csr_pem)?;
        let cn = info.common_name.trim();
        if !cn.is_empty() && cn != session.node_id {
            return Err(OfflineError::CommonNameMismatch);
        }

        let cert_pem = identity.sign_csr(&session.csr_pem, self.cert_valid_days)?;
        if let Some(store) = node_store {
            store.save(&session.node_id, &cert_pem)?;
        }

        let payload = QrPayload::cert_payload(
            cert_pem.as_bytes(),
            Some(identity.cert_pem().as_bytes()),
            Some(&session.node_id),
        );
        let qr_data = payload.encode()?;
        info!(node_id = %session.node_id, "signed node certificate offline");

        Ok(QrResponse {
            qr_data,
            fingerprint: derive_fingerprint(cert_pem.as_bytes()),
            cert_pem,
            node_id: session.node_id,
        })
    }

    /// Drop a scan session. Returns whether it existed.
    pub fn cancel(&self, scan_id: &str) -> bool {
        let mut sessions = self.sessions.lock();
        sweep(&mut sessions, Instant::now());
        sessions.remove(scan_id.trim()).is_some()
    }
}

fn sweep(sessions: &mut HashMap<String, ScanSession>, now: Instant) {
    let before = sessions.len();
    sessions.retain(|_, s| now < s.expires_at);
    let swept = before - sessions.len();
    if swept > 0 {
        debug!(swept, "expired scan sessions removed");
    }
}
