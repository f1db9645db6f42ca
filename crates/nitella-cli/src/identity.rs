//! Root CA identity commands
//!
//! Thin wrappers over [`nitella_core::identity`] that resolve the passphrase
//! from the environment and shape results for display.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use serde::Serialize;
use zeroize::Zeroizing;

use nitella_core::config::Config;
use nitella_core::identity::{self, Identity, IdentityConfig};

/// Environment variable holding the root key passphrase.
pub const PASSPHRASE_ENV: &str = "NITELLA_PASSPHRASE";

/// Passphrase from [`PASSPHRASE_ENV`], if set and non-empty.
pub fn passphrase_from_env() -> Option<Zeroizing<String>> {
    std::env::var(PASSPHRASE_ENV)
        .ok()
        .map(Zeroizing::new)
        .filter(|p| !p.is_empty())
}

/// Identity settings from config plus the environment passphrase.
pub fn identity_config(config: &Config) -> anyhow::Result<IdentityConfig> {
    let mut identity_config = config
        .identity_config()
        .context("invalid identity configuration")?;
    identity_config.passphrase = passphrase_from_env();
    Ok(identity_config)
}

/// Displayable identity summary
#[derive(Debug, Clone, Serialize)]
pub struct IdentityInfo {
    pub subject: String,
    pub fingerprint: String,
    pub emoji_hash: String,
    /// RFC 3339 expiry of the root certificate
    pub expires: String,
    pub data_dir: PathBuf,
    pub encrypted: bool,
}

impl IdentityInfo {
    pub fn new(identity: &Identity, data_dir: &Path) -> anyhow::Result<Self> {
        let info = identity.cert_info()?;
        let expires = chrono::DateTime::from_timestamp(info.not_after.unix_timestamp(), 0)
            .map(|t| t.to_rfc3339())
            .unwrap_or_default();
        Ok(Self {
            subject: info.subject,
            fingerprint: identity.fingerprint().to_string(),
            emoji_hash: identity.emoji_hash().to_string(),
            expires,
            data_dir: data_dir.to_path_buf(),
            encrypted: identity::is_key_encrypted(data_dir).unwrap_or(false),
        })
    }
}

/// Result of `identity init`
pub struct InitOutcome {
    pub identity: Identity,
    pub created: bool,
}

/// Create or load the identity. A recovery `mnemonic` always rebuilds the
/// key, which requires `force` when one already exists.
pub fn init(mut config: IdentityConfig, force: bool, mnemonic: Option<&str>) -> anyhow::Result<InitOutcome> {
    let exists = identity::key_exists(&config.data_dir);

    if let Some(phrase) = mnemonic {
        if exists && !force {
            bail!(
                "an identity already exists in {}; pass --force to replace it",
                config.data_dir.display()
            );
        }
        let identity = Identity::create_from_mnemonic(phrase, &config)?;
        identity.save(&config).context("saving recovered identity")?;
        return Ok(InitOutcome {
            identity,
            created: true,
        });
    }

    config.force_create = force;
    let (identity, created) = Identity::load_or_create(&config).context("loading identity")?;
    Ok(InitOutcome { identity, created })
}

pub fn load(config: &IdentityConfig) -> anyhow::Result<Identity> {
    let passphrase = config.passphrase.as_ref().map(|p| p.as_str());
    Identity::load(&config.data_dir, passphrase).with_context(|| {
        format!("loading identity from {}", config.data_dir.display())
    })
}

/// Import a root CA from PEM files and store it under `config.data_dir`.
/// The key file is decrypted with the same passphrase it is re-encrypted
/// with.
pub fn import(config: &IdentityConfig, cert_path: &Path, key_path: &Path, force: bool) -> anyhow::Result<Identity> {
    if identity::key_exists(&config.data_dir) && !force {
        bail!(
            "an identity already exists in {}; pass --force to replace it",
            config.data_dir.display()
        );
    }

    let cert_pem = fs::read_to_string(cert_path)
        .with_context(|| format!("reading {}", cert_path.display()))?;
    let key_pem = Zeroizing::new(
        fs::read_to_string(key_path).with_context(|| format!("reading {}", key_path.display()))?,
    );

    let passphrase = config.passphrase.as_ref().map(|p| p.as_str());
    let identity = Identity::import_from_pem(&cert_pem, &key_pem, passphrase)?;
    identity.save(config).context("saving imported identity")?;
    Ok(identity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nitella_crypto::kdf::KdfParams;
    use tempfile::TempDir;

    const ABANDON: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    fn config(dir: &Path) -> IdentityConfig {
        let mut config = IdentityConfig::new(dir, "tester");
        config.kdf = KdfParams::new(1, 64, 1);
        config
    }

    #[test]
    fn test_init_then_load() {
        let tmp = TempDir::new().unwrap();
        let outcome = init(config(tmp.path()), false, None).unwrap();
        assert!(outcome.created);
        assert!(outcome.identity.mnemonic().is_some());

        let again = init(config(tmp.path()), false, None).unwrap();
        assert!(!again.created);
        assert_eq!(again.identity.fingerprint(), outcome.identity.fingerprint());

        let loaded = load(&config(tmp.path())).unwrap();
        assert_eq!(loaded.fingerprint(), outcome.identity.fingerprint());

        let info = IdentityInfo::new(&loaded, tmp.path()).unwrap();
        assert!(info.subject.contains("tester Root CA"));
        assert!(!info.encrypted);
        assert!(!info.expires.is_empty());
    }

    #[test]
    fn test_mnemonic_requires_force() {
        let tmp = TempDir::new().unwrap();
        let first = init(config(tmp.path()), false, Some(ABANDON)).unwrap();
        assert!(init(config(tmp.path()), false, Some(ABANDON)).is_err());

        let second = init(config(tmp.path()), true, Some(ABANDON)).unwrap();
        assert_eq!(
            second.identity.verifying_key(),
            first.identity.verifying_key()
        );
    }

    #[test]
    fn test_import_round_trip() {
        let source = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        let original = init(config(source.path()), false, None).unwrap().identity;

        let cert_path = source.path().join(identity::CERT_FILE);
        let key_path = source.path().join(identity::KEY_FILE);
        let imported = import(&config(target.path()), &cert_path, &key_path, false).unwrap();
        assert_eq!(imported.fingerprint(), original.fingerprint());
        assert!(identity::key_exists(target.path()));

        // Second import needs --force.
        assert!(import(&config(target.path()), &cert_path, &key_path, false).is_err());
        assert!(import(&config(target.path()), &cert_path, &key_path, true).is_ok());
    }

    #[test]
    fn test_load_missing_identity() {
        let tmp = TempDir::new().unwrap();
        let err = load(&config(tmp.path())).unwrap_err();
        assert_eq!(crate::ExitCode::for_error(&err), crate::ExitCode::NotFound);
    }
}
