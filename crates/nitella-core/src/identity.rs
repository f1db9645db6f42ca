//! Root CA identity.
//!
//! The authority owns one ed25519 key and a self-signed CA certificate. The
//! key is either random-from-mnemonic (fresh identity) or re-derived from a
//! mnemonic the user kept. On disk it lives in the data directory:
//!
//! - `root_ca.crt` (0644)
//! - `root_ca.key` (0600), passphrase-encrypted when a passphrase is set

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use ed25519_dalek::{SigningKey, VerifyingKey};
use tracing::{debug, info};
use zeroize::Zeroizing;

use nitella_crypto::{
    cert::{self, CertError, CertInfo},
    fingerprint::{generate_emoji_hash, generate_fingerprint},
    kdf::KdfParams,
    keystore::{decode_private_key_pem, encrypt_private_key_pem, is_encrypted_pem},
    mnemonic::{derive_root_signing_key, generate_mnemonic, normalize_mnemonic, validate_mnemonic},
    utils::constant_time_compare,
};

use crate::config::default_data_dir;
use crate::errors::IdentityError;
use crate::files::{create_dir_with_mode, write_with_mode};

pub const CERT_FILE: &str = "root_ca.crt";
pub const KEY_FILE: &str = "root_ca.key";
pub const DEFAULT_VALID_YEARS: u32 = 10;
const ROOT_CA_SUFFIX: &str = " Root CA";

/// How to create or locate an identity.
#[derive(Clone)]
pub struct IdentityConfig {
    pub data_dir: PathBuf,
    /// Base name; the certificate CN is `"<common_name> Root CA"`.
    pub common_name: String,
    pub valid_years: u32,
    /// Empty or absent means the key is stored unencrypted.
    pub passphrase: Option<Zeroizing<String>>,
    pub kdf: KdfParams,
    pub force_create: bool,
}

impl IdentityConfig {
    pub fn new(data_dir: impl Into<PathBuf>, common_name: impl Into<String>) -> Self {
        Self {
            data_dir: data_dir.into(),
            common_name: common_name.into(),
            ..Self::default()
        }
    }

    pub fn with_passphrase(mut self, passphrase: impl Into<String>) -> Self {
        self.passphrase = Some(Zeroizing::new(passphrase.into()));
        self
    }

    fn passphrase(&self) -> Option<&str> {
        self.passphrase
            .as_ref()
            .map(|p| p.as_str())
            .filter(|p| !p.is_empty())
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            common_name: "nitella".to_string(),
            valid_years: DEFAULT_VALID_YEARS,
            passphrase: None,
            kdf: KdfParams::DEFAULT,
            force_create: false,
        }
    }
}

impl fmt::Debug for IdentityConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityConfig")
            .field("data_dir", &self.data_dir)
            .field("common_name", &self.common_name)
            .field("valid_years", &self.valid_years)
            .field("passphrase", &self.passphrase().map(|_| "<redacted>"))
            .field("kdf", &self.kdf)
            .field("force_create", &self.force_create)
            .finish()
    }
}

/// A client certificate issued by the CA, with its fresh private key.
pub struct ClientCert {
    pub cert_pem: String,
    pub key_pem: Zeroizing<String>,
}

/// The authority's root CA.
pub struct Identity {
    signing_key: SigningKey,
    cert_pem: String,
    fingerprint: String,
    emoji_hash: String,
    mnemonic: Option<Zeroizing<String>>,
}

impl Identity {
    fn from_parts(signing_key: SigningKey, cert_pem: String, mnemonic: Option<Zeroizing<String>>) -> Self {
        let public = signing_key.verifying_key().to_bytes();
        Self {
            fingerprint: generate_fingerprint(&public),
            emoji_hash: generate_emoji_hash(&public),
            signing_key,
            cert_pem,
            mnemonic,
        }
    }

    /// Fresh identity from a newly generated 12-word mnemonic. The mnemonic
    /// stays available through [`Identity::mnemonic`] so it can be shown once.
    pub fn create(config: &IdentityConfig) -> Result<Self, IdentityError> {
        let mnemonic = generate_mnemonic()?;
        let mut identity = Self::create_from_mnemonic(&mnemonic, config)?;
        identity.mnemonic = Some(mnemonic);
        info!(fingerprint = %identity.fingerprint, "created root CA identity");
        Ok(identity)
    }

    /// Deterministic re-creation: the same mnemonic gives the same key and
    /// fingerprint. The certificate itself is new.
    pub fn create_from_mnemonic(mnemonic: &str, config: &IdentityConfig) -> Result<Self, IdentityError> {
        if !validate_mnemonic(mnemonic) {
            return Err(IdentityError::InvalidMnemonic);
        }
        let normalized = normalize_mnemonic(mnemonic);
        let signing_key = derive_root_signing_key(&normalized)?;
        let common_name = format!("{}{}", config.common_name, ROOT_CA_SUFFIX);
        let cert_pem = cert::create_root_ca(&signing_key, &common_name, config.valid_years)?;
        Ok(Self::from_parts(signing_key, cert_pem, None))
    }

    /// Load the identity in `config.data_dir`, or create and persist one.
    ///
    /// Returns `(identity, created)`. A new identity is only created when no
    /// root key exists. Any failure to load an existing key (passphrase,
    /// parse, key mismatch, I/O) is returned and the files are left alone.
    pub fn load_or_create(config: &IdentityConfig) -> Result<(Self, bool), IdentityError> {
        let dir = &config.data_dir;
        create_dir_with_mode(dir, 0o700).map_err(|e| IdentityError::io(dir, e))?;

        if !config.force_create {
            let key_path = dir.join(KEY_FILE);
            match fs::symlink_metadata(&key_path) {
                Ok(_) => {
                    let identity = Self::load(dir, config.passphrase())?;
                    return Ok((identity, false));
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(IdentityError::io(&key_path, e)),
            }
        }

        let identity = Self::create(config)?;
        identity.save(config)?;
        Ok((identity, true))
    }

    /// Write `root_ca.crt` and `root_ca.key` into `config.data_dir`.
    pub fn save(&self, config: &IdentityConfig) -> Result<(), IdentityError> {
        let dir = &config.data_dir;
        create_dir_with_mode(dir, 0o700).map_err(|e| IdentityError::io(dir, e))?;

        let cert_path = dir.join(CERT_FILE);
        write_with_mode(&cert_path, self.cert_pem.as_bytes(), 0o644)
            .map_err(|e| IdentityError::io(&cert_path, e))?;

        let key_pem = encrypt_private_key_pem(
            &self.signing_key,
            config.passphrase().unwrap_or(""),
            config.kdf,
        )?;
        let key_path = dir.join(KEY_FILE);
        write_with_mode(&key_path, key_pem.as_bytes(), 0o600)
            .map_err(|e| IdentityError::io(&key_path, e))?;

        debug!(dir = %dir.display(), encrypted = config.passphrase().is_some(), "saved root CA identity");
        Ok(())
    }

    /// Read the identity in `data_dir`, decrypting the key when needed.
    pub fn load(data_dir: impl AsRef<Path>, passphrase: Option<&str>) -> Result<Self, IdentityError> {
        let dir = data_dir.as_ref();
        let cert_pem = read_file(&dir.join(CERT_FILE))?;
        let key_pem = Zeroizing::new(read_file(&dir.join(KEY_FILE))?);
        Self::import_from_pem(&cert_pem, &key_pem, passphrase)
    }

    /// Build an identity from PEM text. The certificate must be a CA with an
    /// ed25519 key, and the private key must belong to it.
    pub fn import_from_pem(cert_pem: &str, key_pem: &str, passphrase: Option<&str>) -> Result<Self, IdentityError> {
        let info = cert::parse_certificate(cert_pem.as_bytes())?;
        if !info.is_ca {
            return Err(CertError::NotCa.into());
        }
        let cert_key = info.public_key.ok_or(CertError::UnsupportedKeyType)?;

        let signing_key = decode_private_key_pem(key_pem, passphrase.filter(|p| !p.is_empty()))?;
        if !constant_time_compare(signing_key.verifying_key().as_bytes(), &cert_key) {
            return Err(CertError::KeyMismatch.into());
        }

        Ok(Self::from_parts(signing_key, cert_pem.to_string(), None))
    }

    pub fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    pub fn cert_pem(&self) -> &str {
        &self.cert_pem
    }

    /// `hex(SHA256(public key))`
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn emoji_hash(&self) -> &str {
        &self.emoji_hash
    }

    /// Only present on a freshly created identity.
    pub fn mnemonic(&self) -> Option<&str> {
        self.mnemonic.as_ref().map(|m| m.as_str())
    }

    /// Drop the mnemonic from memory once it has been shown.
    pub fn forget_mnemonic(&mut self) {
        self.mnemonic = None;
    }

    pub fn cert_info(&self) -> Result<CertInfo, IdentityError> {
        Ok(cert::parse_certificate(self.cert_pem.as_bytes())?)
    }

    /// Sign a node CSR under this CA.
    pub fn sign_csr(&self, csr_pem: &[u8], valid_days: u32) -> Result<String, CertError> {
        cert::sign_csr(csr_pem, self.cert_pem.as_bytes(), &self.signing_key, valid_days)
    }

    /// New keypair and a client-auth certificate for `common_name`.
    pub fn generate_client_cert(&self, common_name: &str, valid_days: u32) -> Result<ClientCert, IdentityError> {
        let (key, cert_pem) =
            cert::issue_client_cert(self.cert_pem.as_bytes(), &self.signing_key, common_name, valid_days)?;
        let key_pem = nitella_crypto::keystore::encode_private_key_pem(&key)?;
        Ok(ClientCert { cert_pem, key_pem })
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("fingerprint", &self.fingerprint)
            .field("emoji_hash", &self.emoji_hash)
            .field("has_mnemonic", &self.mnemonic.is_some())
            .finish_non_exhaustive()
    }
}

fn read_file(path: &Path) -> Result<String, IdentityError> {
    fs::read_to_string(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => IdentityError::NotFound(path.to_path_buf()),
        _ => IdentityError::io(path, e),
    })
}

pub fn key_exists(data_dir: impl AsRef<Path>) -> bool {
    data_dir.as_ref().join(KEY_FILE).is_file()
}

/// Whether the stored root key needs a passphrase.
pub fn is_key_encrypted(data_dir: impl AsRef<Path>) -> Result<bool, IdentityError> {
    let pem = Zeroizing::new(read_file(&data_dir.as_ref().join(KEY_FILE))?);
    Ok(is_encrypted_pem(&pem))
}
