//! Offline pairing from the command line
//!
//! `qr inspect` decodes a payload without side effects. `qr sign` scans a
//! node CSR payload, shows its fingerprint for confirmation and produces the
//! reply payload.

use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::Serialize;

use nitella_core::identity::Identity;
use nitella_core::node_store::NodeCertStore;
use nitella_core::offline::{OfflinePairing, QrResponse, ScanResult};
use nitella_core::qr::{PayloadKind, QrPayload};
use nitella_crypto::cert;
use nitella_crypto::fingerprint::{generate_emoji_hash, generate_fingerprint};

/// Read a payload from `path`, or stdin when `path` is `-`.
pub fn read_payload(path: &Path) -> anyhow::Result<String> {
    if path == Path::new("-") {
        return std::io::read_to_string(std::io::stdin()).context("reading payload from stdin");
    }
    fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

/// Decoded payload summary
#[derive(Debug, Clone, Serialize)]
pub struct QrInspection {
    pub kind: String,
    pub node_id: Option<String>,
    /// Emoji fingerprint carried in the payload
    pub fingerprint: String,
    pub fingerprint_valid: bool,
    /// CN of the CSR or certificate
    pub common_name: String,
    /// `hex(SHA256(public key))` of the CSR or certificate key
    pub key_fingerprint: String,
    pub key_emoji_hash: String,
    pub has_ca: bool,
}

pub fn inspect(data: &str) -> anyhow::Result<QrInspection> {
    let payload = QrPayload::decode(data)?;

    let (common_name, key) = match payload.kind {
        PayloadKind::Csr => {
            let info = cert::parse_csr(payload.get_csr()?).context("parsing CSR")?;
            (info.common_name, Some(info.public_key))
        }
        PayloadKind::Cert => {
            let info = cert::parse_certificate(payload.get_cert()?).context("parsing certificate")?;
            (info.common_name, info.public_key)
        }
    };
    let (key_fingerprint, key_emoji_hash) = match key {
        Some(key) => (generate_fingerprint(&key), generate_emoji_hash(&key)),
        None => (String::new(), String::new()),
    };

    Ok(QrInspection {
        kind: payload.kind.as_str().to_string(),
        node_id: payload.node_id.clone(),
        fingerprint_valid: payload.verify_fingerprint(),
        fingerprint: payload.fingerprint.clone(),
        common_name,
        key_fingerprint,
        key_emoji_hash,
        has_ca: payload.ca.is_some(),
    })
}

/// Reply payload for display
#[derive(Debug, Clone, Serialize)]
pub struct SignedReply {
    pub node_id: String,
    pub fingerprint: String,
    /// Encoded `cert` payload to render as a QR code
    pub qr_data: String,
}

impl From<QrResponse> for SignedReply {
    fn from(r: QrResponse) -> Self {
        Self {
            node_id: r.node_id,
            fingerprint: r.fingerprint,
            qr_data: r.qr_data,
        }
    }
}

/// Scan `data`, let `confirm` decide from the scan result, then sign.
/// Returns `None` when the user declined.
pub fn sign(
    offline: &OfflinePairing,
    data: &str,
    node_id: Option<&str>,
    identity: &Identity,
    store: &NodeCertStore,
    confirm: impl FnOnce(&ScanResult) -> anyhow::Result<bool>,
) -> anyhow::Result<Option<SignedReply>> {
    let scan = offline.scan(data)?;

    if !confirm(&scan)? {
        offline.cancel(&scan.scan_id);
        return Ok(None);
    }

    let reply = offline.respond(&scan.scan_id, node_id, identity, Some(store))?;
    Ok(Some(reply.into()))
}
