//! Configuration for the Nitella CLI and core flows.
//!
//! Stored as TOML. The default location is platform specific:
//!
//! - Unix: `~/.config/nitella/config.toml`
//! - Windows: `%APPDATA%\nitella\config.toml`
//!
//! Identity material itself lives in the data directory, `~/.nitella` unless
//! configured otherwise.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use nitella_crypto::kdf::KdfParams;

use crate::errors::ConfigError;
use crate::exchange::CompletionParams;
use crate::identity::{Identity, IdentityConfig, DEFAULT_VALID_YEARS};
use crate::offline::OfflinePairing;
use crate::trust::{HubConnector, HubOnboarding, TrustChallengeStore, DEFAULT_INVITE_CODE};

/// `~/.nitella`, or `.nitella` in the working directory if there is no home.
pub fn default_data_dir() -> PathBuf {
    directories::BaseDirs::new()
        .map(|dirs| dirs.home_dir().join(".nitella"))
        .unwrap_or_else(|| PathBuf::from(".nitella"))
}

/// # Example TOML
///
/// ```toml
/// [identity]
/// data_dir = "/home/me/.nitella"
/// common_name = "nitella"
/// valid_years = 10
/// kdf_profile = "default"  # "default" | "server" | "secure"
///
/// [pairing]
/// exchange_timeout_secs = 300
/// cert_valid_days = 365
/// scan_session_ttl_secs = 300
///
/// [hub]
/// trust_challenge_ttl_secs = 300
/// default_invite_code = "NITELLA"
///
/// [logging]
/// level = "warn"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub identity: IdentitySettings,

    #[serde(default)]
    pub pairing: PairingSettings,

    #[serde(default)]
    pub hub: HubSettings,

    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentitySettings {
    /// Empty = `~/.nitella`
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    #[serde(default = "default_common_name")]
    pub common_name: String,

    #[serde(default = "default_valid_years")]
    pub valid_years: u32,

    /// Argon2id cost for an encrypted root key.
    #[serde(default = "default_kdf_profile")]
    pub kdf_profile: String,
}

fn default_common_name() -> String {
    "nitella".to_string()
}

fn default_valid_years() -> u32 {
    DEFAULT_VALID_YEARS
}

fn default_kdf_profile() -> String {
    "default".to_string()
}

impl Default for IdentitySettings {
    fn default() -> Self {
        Self {
            data_dir: None,
            common_name: default_common_name(),
            valid_years: default_valid_years(),
            kdf_profile: default_kdf_profile(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairingSettings {
    #[serde(default = "default_five_minutes")]
    pub exchange_timeout_secs: u64,

    #[serde(default = "default_cert_valid_days")]
    pub cert_valid_days: u32,

    #[serde(default = "default_five_minutes")]
    pub scan_session_ttl_secs: u64,
}

fn default_five_minutes() -> u64 {
    300
}

fn default_cert_valid_days() -> u32 {
    365
}

impl Default for PairingSettings {
    fn default() -> Self {
        Self {
            exchange_timeout_secs: default_five_minutes(),
            cert_valid_days: default_cert_valid_days(),
            scan_session_ttl_secs: default_five_minutes(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HubSettings {
    #[serde(default = "default_five_minutes")]
    pub trust_challenge_ttl_secs: u64,

    #[serde(default = "default_invite_code")]
    pub default_invite_code: String,
}

fn default_invite_code() -> String {
    DEFAULT_INVITE_CODE.to_string()
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            trust_challenge_ttl_secs: default_five_minutes(),
            default_invite_code: default_invite_code(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// "error", "warn", "info", "debug", "trace"
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

impl Config {
    /// Read and validate a config file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// `custom_path` if given, else the default location, else defaults.
    pub fn load(custom_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = custom_path {
            return Self::load_from(path);
        }
        match Self::default_path() {
            Ok(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn default_path() -> Result<PathBuf, ConfigError> {
        directories::ProjectDirs::from("io", "nitella", "nitella")
            .map(|dirs| dirs.config_dir().join("config.toml"))
            .ok_or(ConfigError::NoHomeDir)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        std::fs::write(path, content).map_err(io_err)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "invalid log level '{}', expected one of {:?}",
                self.logging.level, LOG_LEVELS
            )));
        }

        KdfParams::profile(&self.identity.kdf_profile)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        if self.identity.common_name.trim().is_empty() {
            return Err(ConfigError::Invalid("common_name must not be empty".into()));
        }
        if self.identity.valid_years == 0 {
            return Err(ConfigError::Invalid("valid_years must be greater than 0".into()));
        }
        if self.pairing.exchange_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "exchange_timeout_secs must be greater than 0".into(),
            ));
        }
        if self.pairing.cert_valid_days == 0 {
            return Err(ConfigError::Invalid("cert_valid_days must be greater than 0".into()));
        }
        if self.pairing.scan_session_ttl_secs == 0 || self.hub.trust_challenge_ttl_secs == 0 {
            return Err(ConfigError::Invalid("session TTLs must be greater than 0".into()));
        }
        Ok(())
    }

    pub fn data_dir(&self) -> PathBuf {
        self.identity
            .data_dir
            .clone()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(default_data_dir)
    }

    pub fn exchange_timeout(&self) -> Duration {
        Duration::from_secs(self.pairing.exchange_timeout_secs)
    }

    pub fn scan_session_ttl(&self) -> Duration {
        Duration::from_secs(self.pairing.scan_session_ttl_secs)
    }

    pub fn trust_challenge_ttl(&self) -> Duration {
        Duration::from_secs(self.hub.trust_challenge_ttl_secs)
    }

    /// Offline pairing with the configured scan TTL and certificate validity.
    pub fn offline_pairing(&self) -> OfflinePairing {
        OfflinePairing::with_ttl(self.scan_session_ttl()).with_cert_valid_days(self.pairing.cert_valid_days)
    }

    /// Completion parameters for a live exchange, signing for
    /// `cert_valid_days`.
    pub fn completion_params<'a>(&self, identity: &'a Identity) -> CompletionParams<'a> {
        CompletionParams {
            valid_days: self.pairing.cert_valid_days,
            ..CompletionParams::new(identity)
        }
    }

    pub fn trust_challenges(&self) -> TrustChallengeStore {
        TrustChallengeStore::with_ttl(self.trust_challenge_ttl())
    }

    /// Hub onboarding using the configured challenge TTL and invite code.
    pub fn hub_onboarding<C: HubConnector>(&self, connector: C) -> HubOnboarding<C> {
        HubOnboarding::with_store(connector, self.trust_challenges())
            .with_default_invite_code(self.hub.default_invite_code.clone())
    }

    /// Identity settings as an [`IdentityConfig`] for the identity manager.
    pub fn identity_config(&self) -> Result<IdentityConfig, ConfigError> {
        let kdf = KdfParams::profile(&self.identity.kdf_profile)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(IdentityConfig {
            valid_years: self.identity.valid_years,
            kdf,
            ..IdentityConfig::new(self.data_dir(), self.identity.common_name.clone())
        })
    }

    /// Command-line flags win over the file.
    pub fn with_overrides(mut self, overrides: &CliOverrides) -> Self {
        if overrides.debug {
            self.logging.level = "debug".to_string();
        } else if overrides.verbose {
            self.logging.level = "info".to_string();
        }
        if let Some(ref dir) = overrides.data_dir {
            self.identity.data_dir = Some(dir.clone());
        }
        self
    }
}

/// Flags that override config values.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub verbose: bool,
    pub debug: bool,
    pub data_dir: Option<PathBuf>,
}
