//! Stored node certificates

use anyhow::Context;
use serde::Serialize;
use tracing::warn;

use nitella_core::node_store::NodeCertStore;
use nitella_crypto::cert;
use nitella_crypto::fingerprint::{generate_emoji_hash, generate_fingerprint};

/// One stored node certificate, parsed for display
#[derive(Debug, Clone, Serialize)]
pub struct NodeInfo {
    pub node_id: String,
    pub subject: String,
    pub issuer: String,
    pub serial: String,
    pub not_before: String,
    pub not_after: String,
    /// `hex(SHA256(public key))`, empty for non-ed25519 keys
    pub fingerprint: String,
    pub emoji_hash: String,
}

fn rfc3339(t: i64) -> String {
    chrono::DateTime::from_timestamp(t, 0)
        .map(|t| t.to_rfc3339())
        .unwrap_or_default()
}

pub fn node_info(store: &NodeCertStore, node_id: &str) -> anyhow::Result<NodeInfo> {
    let pem = store.load(node_id)?;
    let info = cert::parse_certificate(pem.as_bytes())
        .with_context(|| format!("parsing certificate for {node_id}"))?;

    let (fingerprint, emoji_hash) = match info.public_key {
        Some(key) => (generate_fingerprint(&key), generate_emoji_hash(&key)),
        None => (String::new(), String::new()),
    };
    Ok(NodeInfo {
        node_id: node_id.to_string(),
        subject: info.subject,
        issuer: info.issuer,
        serial: info.serial,
        not_before: rfc3339(info.not_before.unix_timestamp()),
        not_after: rfc3339(info.not_after.unix_timestamp()),
        fingerprint,
        emoji_hash,
    })
}

/// Every readable certificate in the store. Unparseable files are skipped.
pub fn list(store: &NodeCertStore) -> anyhow::Result<Vec<NodeInfo>> {
    let mut nodes = Vec::new();
    for node_id in store.list()? {
        match node_info(store, &node_id) {
            Ok(info) => nodes.push(info),
            Err(e) => warn!(node_id = %node_id, error = %e, "skipping unreadable node certificate"),
        }
    }
    Ok(nodes)
}
