#![forbid(unsafe_code)]

pub mod bip39;
pub mod fingerprint;
pub mod hash;
pub mod utils;
pub mod wordlist;

pub mod cpace;
pub mod pake;

pub mod kdf;
pub mod keystore;
pub mod mnemonic;

pub mod cert;
pub mod routing;

#[cfg(test)]
mod proptests;
