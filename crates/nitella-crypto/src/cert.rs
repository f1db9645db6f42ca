//! X.509 primitives for the root CA: self-signed CA certificates, CSRs and
//! leaf issuance. Only ed25519 keys are accepted anywhere.

use ed25519_dalek::pkcs8::EncodePrivateKey;
use ed25519_dalek::SigningKey;
use rcgen::{
    BasicConstraints, CertificateParams, CertificateSigningRequestParams, DistinguishedName, DnType,
    ExtendedKeyUsagePurpose, IsCa, KeyPair, KeyUsagePurpose, SerialNumber,
};
use time::{Duration, OffsetDateTime};
use x509_parser::certificate::X509Certificate;
use x509_parser::certification_request::X509CertificationRequest;
use x509_parser::oid_registry::OID_SIG_ED25519;
use x509_parser::prelude::FromDer;
use x509_parser::x509::{SubjectPublicKeyInfo, X509Name};
use zeroize::Zeroizing;

use crate::utils::{constant_time_compare, random_bytes};

pub const CERTIFICATE_TAG: &str = "CERTIFICATE";
pub const CSR_TAG: &str = "CERTIFICATE REQUEST";
pub const CA_ORGANIZATION: &str = "Nitella";

/// Error type for certificate operations.
#[derive(Debug, thiserror::Error)]
pub enum CertError {
    #[error("failed to decode {0} PEM")]
    Pem(&'static str),
    #[error("failed to parse {0}")]
    Parse(&'static str),
    #[error("CSR signature verification failed")]
    Signature,
    #[error("CSR has no common name")]
    MissingCommonName,
    #[error("unsupported key type: only Ed25519 is accepted")]
    UnsupportedKeyType,
    #[error("certificate is not a CA")]
    NotCa,
    #[error("private key does not match certificate")]
    KeyMismatch,
    #[error("certificate was not issued by this CA")]
    NotIssuedBy,
    #[error("certificate generation failed: {0}")]
    Generation(String),
}

impl From<rcgen::Error> for CertError {
    fn from(e: rcgen::Error) -> Self {
        CertError::Generation(e.to_string())
    }
}

/// Identity claimed by a verified CSR.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsrInfo {
    /// Subject CN. May be empty; callers decide whether that is acceptable.
    pub common_name: String,
    pub public_key: [u8; 32],
}

/// Summary of a parsed certificate.
#[derive(Debug, Clone)]
pub struct CertInfo {
    pub subject: String,
    pub common_name: String,
    pub issuer: String,
    pub serial: String,
    pub not_before: OffsetDateTime,
    pub not_after: OffsetDateTime,
    pub is_ca: bool,
    /// Raw ed25519 key, `None` for other algorithms.
    pub public_key: Option<[u8; 32]>,
}

fn pem_contents(data: &[u8], tag: &'static str) -> Result<Vec<u8>, CertError> {
    let block = pem::parse(data).map_err(|_| CertError::Pem(tag))?;
    if block.tag() != tag {
        return Err(CertError::Pem(tag));
    }
    Ok(block.contents().to_vec())
}

fn pem_str<'a>(data: &'a [u8], tag: &'static str) -> Result<&'a str, CertError> {
    std::str::from_utf8(data).map_err(|_| CertError::Pem(tag))
}

fn ed25519_key(spki: &SubjectPublicKeyInfo<'_>) -> Option<[u8; 32]> {
    if spki.algorithm.algorithm != OID_SIG_ED25519 {
        return None;
    }
    <[u8; 32]>::try_from(&spki.subject_public_key.data[..]).ok()
}

fn common_name(name: &X509Name<'_>) -> String {
    name.iter_common_name()
        .next()
        .and_then(|cn| cn.as_str().ok())
        .unwrap_or_default()
        .to_string()
}

fn rcgen_key_pair(key: &SigningKey) -> Result<KeyPair, CertError> {
    let der = Zeroizing::new(
        key.to_pkcs8_der()
            .map_err(|e| CertError::Generation(e.to_string()))?
            .as_bytes()
            .to_vec(),
    );
    Ok(KeyPair::try_from(&der[..])?)
}

/// 8-byte big-endian nanosecond timestamp followed by 8 random bytes.
pub fn generate_serial() -> SerialNumber {
    let nanos = OffsetDateTime::now_utc().unix_timestamp_nanos() as u64;
    let mut serial = Vec::with_capacity(16);
    serial.extend_from_slice(&nanos.to_be_bytes());
    serial.extend_from_slice(&random_bytes::<8>());
    SerialNumber::from(serial)
}

fn years_after(start: OffsetDateTime, years: u32) -> OffsetDateTime {
    let target = start.year() + years as i32;
    start
        .replace_year(target)
        .unwrap_or_else(|_| start + Duration::days(365 * years as i64))
}

/// Self-signed CA certificate: CA with path length 1, cert and CRL signing,
/// client and server auth.
pub fn create_root_ca(key: &SigningKey, common_name: &str, valid_years: u32) -> Result<String, CertError> {
    let key_pair = rcgen_key_pair(key)?;

    let mut params = CertificateParams::default();
    params.distinguished_name = DistinguishedName::new();
    params.distinguished_name.push(DnType::CommonName, common_name);
    params
        .distinguished_name
        .push(DnType::OrganizationName, CA_ORGANIZATION);
    params.serial_number = Some(generate_serial());
    params.not_before = OffsetDateTime::now_utc();
    params.not_after = years_after(params.not_before, valid_years);
    params.is_ca = IsCa::Ca(BasicConstraints::Constrained(1));
    params.key_usages = vec![
        KeyUsagePurpose::KeyCertSign,
        KeyUsagePurpose::CrlSign,
        KeyUsagePurpose::DigitalSignature,
    ];
    params.extended_key_usages = vec![
        ExtendedKeyUsagePurpose::ClientAuth,
        ExtendedKeyUsagePurpose::ServerAuth,
    ];

    Ok(params.self_signed(&key_pair)?.pem())
}

/// PEM CSR for `key` with the given CN and optional OU.
pub fn create_csr(key: &SigningKey, common_name: &str, organizational_unit: &str) -> Result<String, CertError> {
    let key_pair = rcgen_key_pair(key)?;

    let mut params = CertificateParams::default();
    params.distinguished_name = DistinguishedName::new();
    params.distinguished_name.push(DnType::CommonName, common_name);
    if !organizational_unit.is_empty() {
        params
            .distinguished_name
            .push(DnType::OrganizationalUnitName, organizational_unit);
    }

    Ok(params.serialize_request(&key_pair)?.pem()?)
}

/// Parse a CSR, require an ed25519 key and check its self-signature.
pub fn parse_csr(csr_pem: &[u8]) -> Result<CsrInfo, CertError> {
    let der = pem_contents(csr_pem, CSR_TAG)?;
    let (_, csr) = X509CertificationRequest::from_der(&der).map_err(|_| CertError::Parse("CSR"))?;

    let info = &csr.certification_request_info;
    let public_key = ed25519_key(&info.subject_pki).ok_or(CertError::UnsupportedKeyType)?;
    csr.verify_signature().map_err(|_| CertError::Signature)?;

    Ok(CsrInfo {
        common_name: common_name(&info.subject),
        public_key,
    })
}

fn parse_der_certificate(der: &[u8]) -> Result<X509Certificate<'_>, CertError> {
    X509Certificate::from_der(der)
        .map(|(_, cert)| cert)
        .map_err(|_| CertError::Parse("certificate"))
}

pub fn parse_certificate(cert_pem: &[u8]) -> Result<CertInfo, CertError> {
    let der = pem_contents(cert_pem, CERTIFICATE_TAG)?;
    let cert = parse_der_certificate(&der)?;
    Ok(CertInfo {
        subject: cert.subject().to_string(),
        common_name: common_name(cert.subject()),
        issuer: cert.issuer().to_string(),
        serial: cert.raw_serial_as_string(),
        not_before: cert.validity().not_before.to_datetime(),
        not_after: cert.validity().not_after.to_datetime(),
        is_ca: cert.is_ca(),
        public_key: ed25519_key(cert.public_key()),
    })
}

/// ed25519 key of a certificate. Other algorithms are rejected.
pub fn certificate_public_key(cert_pem: &[u8]) -> Result<[u8; 32], CertError> {
    parse_certificate(cert_pem)?
        .public_key
        .ok_or(CertError::UnsupportedKeyType)
}

/// Check that `cert_pem` names `ca_pem` as issuer and carries its signature.
pub fn verify_issued_by(cert_pem: &[u8], ca_pem: &[u8]) -> Result<(), CertError> {
    let leaf_der = pem_contents(cert_pem, CERTIFICATE_TAG)?;
    let ca_der = pem_contents(ca_pem, CERTIFICATE_TAG)?;
    let leaf = parse_der_certificate(&leaf_der)?;
    let ca = parse_der_certificate(&ca_der)?;

    if leaf.issuer().as_raw() != ca.subject().as_raw() {
        return Err(CertError::NotIssuedBy);
    }
    leaf.verify_signature(Some(ca.public_key()))
        .map_err(|_| CertError::NotIssuedBy)
}

/// Rebuild an rcgen issuer from a CA PEM and its key.
fn load_issuer(ca_cert_pem: &[u8], ca_key: &SigningKey) -> Result<(rcgen::Certificate, KeyPair), CertError> {
    let ca_key_bytes = certificate_public_key(ca_cert_pem)?;
    if !constant_time_compare(&ca_key_bytes, ca_key.verifying_key().as_bytes()) {
        return Err(CertError::KeyMismatch);
    }

    let key_pair = rcgen_key_pair(ca_key)?;
    let params = CertificateParams::from_ca_cert_pem(pem_str(ca_cert_pem, CERTIFICATE_TAG)?)?;
    let issuer = params.self_signed(&key_pair)?;
    Ok((issuer, key_pair))
}

fn leaf_params(params: &mut CertificateParams, valid_days: u32, extended: Vec<ExtendedKeyUsagePurpose>) {
    params.serial_number = Some(generate_serial());
    params.not_before = OffsetDateTime::now_utc();
    params.not_after = params.not_before + Duration::days(i64::from(valid_days));
    params.is_ca = IsCa::NoCa;
    params.key_usages = vec![KeyUsagePurpose::DigitalSignature];
    params.extended_key_usages = extended;
    params.use_authority_key_identifier_extension = true;
}

/// Issue a leaf certificate for a verified ed25519 CSR. The subject is taken
/// from the request; client and server auth are both granted.
pub fn sign_csr(
    csr_pem: &[u8],
    ca_cert_pem: &[u8],
    ca_key: &SigningKey,
    valid_days: u32,
) -> Result<String, CertError> {
    parse_csr(csr_pem)?;
    let (issuer, issuer_key) = load_issuer(ca_cert_pem, ca_key)?;

    let mut csr = CertificateSigningRequestParams::from_pem(pem_str(csr_pem, CSR_TAG)?)?;
    leaf_params(
        &mut csr.params,
        valid_days,
        vec![
            ExtendedKeyUsagePurpose::ClientAuth,
            ExtendedKeyUsagePurpose::ServerAuth,
        ],
    );

    Ok(csr.signed_by(&issuer, &issuer_key)?.pem())
}

/// Fresh keypair plus a client-auth certificate for it, signed by the CA.
pub fn issue_client_cert(
    ca_cert_pem: &[u8],
    ca_key: &SigningKey,
    common_name: &str,
    valid_days: u32,
) -> Result<(SigningKey, String), CertError> {
    let (issuer, issuer_key) = load_issuer(ca_cert_pem, ca_key)?;

    let client_key = SigningKey::from_bytes(&Zeroizing::new(random_bytes::<32>()));
    let client_pair = rcgen_key_pair(&client_key)?;

    let mut params = CertificateParams::default();
    params.distinguished_name = DistinguishedName::new();
    params.distinguished_name.push(DnType::CommonName, common_name);
    params
        .distinguished_name
        .push(DnType::OrganizationName, CA_ORGANIZATION);
    leaf_params(&mut params, valid_days, vec![ExtendedKeyUsagePurpose::ClientAuth]);

    let cert = params.signed_by(&client_pair, &issuer, &issuer_key)?;
    Ok((client_key, cert.pem()))
}
