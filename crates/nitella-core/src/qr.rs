//! QR payloads for offline pairing.
//!
//! A node that cannot reach the CLI shows its CSR as a QR code; the CLI
//! answers with a QR code holding the signed certificate and the CA.
//!
//! Wire form is compact JSON:
//!
//! ```json
//! {"t":"csr","csr":"<base64 PEM>","fp":"🐱🚀🌵🎲","nid":"node-42"}
//! {"t":"cert","cert":"<base64 PEM>","ca":"<base64 PEM>","fp":"...","nid":"node-42"}
//! ```
//!
//! Older scanners produced JSON with raw PEM in the fields, or just the bare
//! PEM text. [`QrPayload::decode`] accepts all three.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use tracing::debug;

use nitella_crypto::fingerprint::derive_fingerprint;

use crate::errors::QrError;

const PEM_BEGIN: &str = "-----BEGIN";
const CSR_BEGIN: &str = "-----BEGIN CERTIFICATE REQUEST-----";
const CERT_BEGIN: &str = "-----BEGIN CERTIFICATE-----";
const CERT_END: &str = "-----END CERTIFICATE-----";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    Csr,
    Cert,
}

impl PayloadKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayloadKind::Csr => "csr",
            PayloadKind::Cert => "cert",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "csr" => Some(PayloadKind::Csr),
            "cert" => Some(PayloadKind::Cert),
            _ => None,
        }
    }
}

/// Decoded payload. PEM fields hold raw PEM bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrPayload {
    pub kind: PayloadKind,
    pub csr: Option<Vec<u8>>,
    pub cert: Option<Vec<u8>>,
    pub ca: Option<Vec<u8>>,
    pub fingerprint: String,
    pub node_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WirePayload {
    #[serde(rename = "t")]
    kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    csr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cert: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ca: Option<String>,
    #[serde(rename = "fp", default)]
    fingerprint: String,
    #[serde(rename = "nid", default, skip_serializing_if = "Option::is_none")]
    node_id: Option<String>,
}

impl QrPayload {
    /// CSR payload shown by a node.
    pub fn csr_payload(csr_pem: &[u8], node_id: Option<&str>) -> Self {
        Self {
            kind: PayloadKind::Csr,
            csr: Some(csr_pem.to_vec()),
            cert: None,
            ca: None,
            fingerprint: derive_fingerprint(csr_pem),
            node_id: non_empty(node_id),
        }
    }

    /// Certificate reply shown by the CLI.
    pub fn cert_payload(cert_pem: &[u8], ca_pem: Option<&[u8]>, node_id: Option<&str>) -> Self {
        Self {
            kind: PayloadKind::Cert,
            csr: None,
            cert: Some(cert_pem.to_vec()),
            ca: ca_pem.map(<[u8]>::to_vec),
            fingerprint: derive_fingerprint(cert_pem),
            node_id: non_empty(node_id),
        }
    }

    pub fn encode(&self) -> Result<String, QrError> {
        let wire = WirePayload {
            kind: self.kind.as_str().to_string(),
            csr: self.csr.as_deref().map(|b| STANDARD.encode(b)),
            cert: self.cert.as_deref().map(|b| STANDARD.encode(b)),
            ca: self.ca.as_deref().map(|b| STANDARD.encode(b)),
            fingerprint: self.fingerprint.clone(),
            node_id: self.node_id.clone(),
        };
        Ok(serde_json::to_string(&wire)?)
    }

    /// Decode scanned QR text. Attempts, in order: JSON with base64 fields,
    /// JSON with raw PEM fields, bare PEM.
    pub fn decode(data: &str) -> Result<Self, QrError> {
        let data = data.trim();
        if data.is_empty() {
            return Err(QrError::Empty);
        }

        if let Ok(wire) = serde_json::from_str::<WirePayload>(data) {
            if let Some(payload) = from_wire(&wire, FieldEncoding::Base64) {
                return Ok(payload);
            }
            if let Some(payload) = from_wire(&wire, FieldEncoding::RawPem) {
                debug!(kind = %wire.kind, "decoded legacy QR payload with raw PEM fields");
                return Ok(payload);
            }
        }

        if let Some(payload) = from_bare_pem(data) {
            debug!(kind = payload.kind.as_str(), "decoded bare PEM QR payload");
            return Ok(payload);
        }

        Err(QrError::Unrecognized)
    }

    fn expect_kind(&self, expected: PayloadKind) -> Result<(), QrError> {
        if self.kind != expected {
            return Err(QrError::TypeMismatch {
                expected: expected.as_str(),
                actual: self.kind.as_str(),
            });
        }
        Ok(())
    }

    pub fn get_csr(&self) -> Result<&[u8], QrError> {
        self.expect_kind(PayloadKind::Csr)?;
        self.csr.as_deref().ok_or(QrError::MissingField("csr"))
    }

    pub fn get_cert(&self) -> Result<&[u8], QrError> {
        self.expect_kind(PayloadKind::Cert)?;
        self.cert.as_deref().ok_or(QrError::MissingField("cert"))
    }

    /// CA bundled with a certificate reply, if any.
    pub fn get_ca_cert(&self) -> Result<Option<&[u8]>, QrError> {
        self.expect_kind(PayloadKind::Cert)?;
        Ok(self.ca.as_deref())
    }

    fn primary_pem(&self) -> Option<&[u8]> {
        match self.kind {
            PayloadKind::Csr => self.csr.as_deref(),
            PayloadKind::Cert => self.cert.as_deref(),
        }
    }

    /// Recompute the fingerprint over the carried PEM and compare.
    pub fn verify_fingerprint(&self) -> bool {
        match self.primary_pem() {
            Some(pem) => derive_fingerprint(pem) == self.fingerprint,
            None => false,
        }
    }
}

fn non_empty(s: Option<&str>) -> Option<String> {
    s.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

#[derive(Clone, Copy)]
enum FieldEncoding {
    Base64,
    RawPem,
}

fn decode_field(value: Option<&str>, encoding: FieldEncoding) -> Option<Option<Vec<u8>>> {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Some(None);
    };
    match encoding {
        FieldEncoding::Base64 => STANDARD.decode(value).ok().map(Some),
        FieldEncoding::RawPem if value.contains(PEM_BEGIN) => Some(Some(value.as_bytes().to_vec())),
        FieldEncoding::RawPem => None,
    }
}

fn from_wire(wire: &WirePayload, encoding: FieldEncoding) -> Option<QrPayload> {
    let kind = PayloadKind::parse(wire.kind.trim())?;
    let mut payload = QrPayload {
        kind,
        csr: decode_field(wire.csr.as_deref(), encoding)?,
        cert: decode_field(wire.cert.as_deref(), encoding)?,
        ca: decode_field(wire.ca.as_deref(), encoding)?,
        fingerprint: wire.fingerprint.trim().to_string(),
        node_id: non_empty(wire.node_id.as_deref()),
    };

    let primary = payload.primary_pem()?;
    if payload.fingerprint.is_empty() {
        payload.fingerprint = derive_fingerprint(primary);
    }
    Some(payload)
}

fn from_bare_pem(data: &str) -> Option<QrPayload> {
    if data.contains(CSR_BEGIN) {
        return Some(QrPayload::csr_payload(data.as_bytes(), None));
    }

    let start = data.find(CERT_BEGIN)?;
    let mut blocks = data[start..]
        .split_inclusive(CERT_END)
        .map(str::trim)
        .filter(|b| b.starts_with(CERT_BEGIN) && b.ends_with(CERT_END));
    let cert = blocks.next()?;
    let ca = blocks.next();
    Some(QrPayload::cert_payload(
        format!("{cert}\n").as_bytes(),
        ca.map(|c| format!("{c}\n").into_bytes()).as_deref(),
        None,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSR: &str = "-----BEGIN CERTIFICATE REQUEST-----\nMIGaMEACAQAwDTELMAkGA1UEAwwCbjE=\n-----END CERTIFICATE REQUEST-----\n";
    const CERT: &str = "-----BEGIN CERTIFICATE-----\nMIIBcert\n-----END CERTIFICATE-----\n";
    const CA: &str = "-----BEGIN CERTIFICATE-----\nMIIBca\n-----END CERTIFICATE-----\n";

    #[test]
    fn test_encode_shape() {
        let json = QrPayload::csr_payload(CSR.as_bytes(), Some("node-42")).encode().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["t"], "csr");
        assert_eq!(value["nid"], "node-42");
        assert_eq!(value["csr"], STANDARD.encode(CSR));
        assert_eq!(value["fp"], derive_fingerprint(CSR.as_bytes()));
        assert!(value.get("cert").is_none());
        assert!(value.get("ca").is_none());
    }

    #[test]
    fn test_decode_base64_json() {
        let original = QrPayload::cert_payload(CERT.as_bytes(), Some(CA.as_bytes()), Some("n1"));
        let decoded = QrPayload::decode(&original.encode().unwrap()).unwrap();
        assert_eq!(decoded, original);
        assert!(decoded.verify_fingerprint());
        assert_eq!(decoded.get_cert().unwrap(), CERT.as_bytes());
        assert_eq!(decoded.get_ca_cert().unwrap(), Some(CA.as_bytes()));
    }

    #[test]
    fn test_decode_raw_pem_json() {
        let json = serde_json::json!({ "t": "csr", "csr": CSR, "nid": "n2" }).to_string();
        let decoded = QrPayload::decode(&json).unwrap();
        assert_eq!(decoded.kind, PayloadKind::Csr);
        assert_eq!(decoded.get_csr().unwrap(), CSR.trim().as_bytes());
        assert_eq!(decoded.node_id.as_deref(), Some("n2"));
        assert!(decoded.verify_fingerprint());
    }

    #[test]
    fn test_decode_bare_pem() {
        let decoded = QrPayload::decode(&format!("\n  {CSR}  \n")).unwrap();
        assert_eq!(decoded.kind, PayloadKind::Csr);
        assert_eq!(decoded.get_csr().unwrap(), CSR.trim().as_bytes());
        assert!(decoded.verify_fingerprint());

        let bundle = format!("{CERT}{CA}");
        let decoded = QrPayload::decode(&bundle).unwrap();
        assert_eq!(decoded.get_cert().unwrap(), CERT.as_bytes());
        assert_eq!(decoded.get_ca_cert().unwrap(), Some(CA.as_bytes()));
    }

    #[test]
    fn test_type_mismatch() {
        let csr = QrPayload::csr_payload(CSR.as_bytes(), None);
        assert!(matches!(
            csr.get_cert(),
            Err(QrError::TypeMismatch { expected: "cert", actual: "csr" })
        ));
        assert!(matches!(csr.get_ca_cert(), Err(QrError::TypeMismatch { .. })));

        let cert = QrPayload::cert_payload(CERT.as_bytes(), None, None);
        assert!(matches!(cert.get_csr(), Err(QrError::TypeMismatch { .. })));
        assert_eq!(cert.get_ca_cert().unwrap(), None);
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(matches!(QrPayload::decode("   "), Err(QrError::Empty)));
        assert!(matches!(QrPayload::decode("hello"), Err(QrError::Unrecognized)));
        assert!(matches!(
            QrPayload::decode(r#"{"t":"invite","fp":"x"}"#),
            Err(QrError::Unrecognized)
        ));
        assert!(matches!(
            QrPayload::decode(r#"{"t":"csr","csr":"not base64 and not pem"}"#),
            Err(QrError::Unrecognized)
        ));
    }

    #[test]
    fn test_tampered_fingerprint() {
        let mut payload = QrPayload::csr_payload(CSR.as_bytes(), None);
        payload.fingerprint = "🐱🐱🐱🐱".into();
        assert!(!payload.verify_fingerprint());
    }
}
