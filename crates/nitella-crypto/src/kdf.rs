//! Argon2id parameter profiles for passphrase-protected keys.
//!
//! Parameters travel with the encrypted key (9 bytes, big endian) so a key
//! written under one profile can still be opened after the default changes.

use std::fmt;

use argon2::{Algorithm, Argon2, Params, Version};
use zeroize::Zeroizing;

pub const ENCODED_LEN: usize = 9;
pub const KEY_LEN: usize = 32;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum KdfError {
    #[error("unknown KDF profile: {0} (available: default, server, secure)")]
    UnknownProfile(String),
    #[error("KDF params data too short: {0} bytes")]
    TooShort(usize),
    #[error("argon2 failed: {0}")]
    Argon2(String),
}

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    /// Iterations.
    pub time: u32,
    /// Memory in KiB.
    pub memory_kib: u32,
    /// Parallelism.
    pub threads: u8,
}

impl KdfParams {
    /// CLI and desktop use. Roughly 100ms and 64 MiB.
    pub const DEFAULT: KdfParams = KdfParams::new(2, 64 * 1024, 4);
    /// Servers doing many concurrent decryptions.
    pub const SERVER: KdfParams = KdfParams::new(1, 32 * 1024, 2);
    pub const SECURE: KdfParams = KdfParams::new(3, 128 * 1024, 4);

    const PROFILES: [(&'static str, KdfParams); 3] = [
        ("default", Self::DEFAULT),
        ("server", Self::SERVER),
        ("secure", Self::SECURE),
    ];

    pub const fn new(time: u32, memory_kib: u32, threads: u8) -> Self {
        Self {
            time,
            memory_kib,
            threads,
        }
    }

    /// Look up a named profile.
    pub fn profile(name: &str) -> Result<Self, KdfError> {
        Self::PROFILES
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, p)| *p)
            .ok_or_else(|| KdfError::UnknownProfile(name.to_string()))
    }

    /// Name of the matching predefined profile, or `"custom"`.
    pub fn profile_name(&self) -> &'static str {
        Self::PROFILES
            .iter()
            .find(|(_, p)| p == self)
            .map(|(n, _)| *n)
            .unwrap_or("custom")
    }

    /// `time(4) || memory(4) || threads(1)`, big endian.
    pub fn encode(&self) -> [u8; ENCODED_LEN] {
        let mut buf = [0u8; ENCODED_LEN];
        buf[0..4].copy_from_slice(&self.time.to_be_bytes());
        buf[4..8].copy_from_slice(&self.memory_kib.to_be_bytes());
        buf[8] = self.threads;
        buf
    }

    pub fn decode(data: &[u8]) -> Result<Self, KdfError> {
        if data.len() < ENCODED_LEN {
            return Err(KdfError::TooShort(data.len()));
        }
        let mut time = [0u8; 4];
        let mut memory = [0u8; 4];
        time.copy_from_slice(&data[0..4]);
        memory.copy_from_slice(&data[4..8]);
        Ok(Self {
            time: u32::from_be_bytes(time),
            memory_kib: u32::from_be_bytes(memory),
            threads: data[8],
        })
    }

    /// Work relative to the default profile, in words.
    pub fn security_comparison(&self) -> &'static str {
        let default_work = Self::DEFAULT.time as f64 * Self::DEFAULT.memory_kib as f64;
        let ratio = self.time as f64 * self.memory_kib as f64 / default_work;
        match ratio {
            r if r < 0.5 => "lower security (faster, less memory)",
            r if r < 0.9 => "slightly lower security",
            r if r < 1.1 => "standard security (OWASP recommended)",
            r if r < 2.0 => "higher security",
            _ => "maximum security (slower, more memory)",
        }
    }

    /// Stretch a passphrase into a 32-byte AES key.
    pub fn derive_key(&self, passphrase: &[u8], salt: &[u8]) -> Result<Zeroizing<[u8; KEY_LEN]>, KdfError> {
        let params = Params::new(
            self.memory_kib,
            self.time,
            u32::from(self.threads),
            Some(KEY_LEN),
        )
        .map_err(|e| KdfError::Argon2(e.to_string()))?;

        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        argon2
            .hash_password_into(passphrase, salt, &mut key[..])
            .map_err(|e| KdfError::Argon2(e.to_string()))?;
        Ok(key)
    }
}

impl Default for KdfParams {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for KdfParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Argon2id(t={}, m={:.0}MB, p={})",
            self.time,
            self.memory_kib as f64 / 1024.0,
            self.threads
        )
    }
}
