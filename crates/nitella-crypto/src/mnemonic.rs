//! BIP-39 mnemonics and root key derivation.
//!
//! A root CA key is derived as:
//!
//! ```text
//! seed = PBKDF2-HMAC-SHA512(mnemonic, "mnemonic", 2048)     (64 bytes)
//! key  = HKDF-SHA256(salt = "nitella-root-ca", ikm = seed, info = "ed25519-key")
//! ```
//!
//! so the same phrase always restores the same authority.

use ed25519_dalek::SigningKey;
use hkdf::Hkdf;
use sha2::{Sha256, Sha512};
use zeroize::Zeroizing;

use crate::bip39::BIP39_ENGLISH;
use crate::hash::sha256;
use crate::utils::random_bytes;

const PBKDF2_ROUNDS: u32 = 2048;
const PBKDF2_SALT: &[u8] = b"mnemonic";
const ROOT_CA_SALT: &[u8] = b"nitella-root-ca";
const ROOT_CA_INFO: &[u8] = b"ed25519-key";

/// Error type for mnemonic operations.
#[derive(Debug, thiserror::Error)]
pub enum MnemonicError {
    #[error("invalid entropy length: expected 16 or 32 bytes, got {0}")]
    InvalidEntropyLength(usize),
    #[error("invalid mnemonic: expected 12 or 24 dictionary words")]
    InvalidMnemonic,
    #[error("key derivation failed")]
    KeyDerivation,
}

/// Encode 16 or 32 bytes of entropy as a 12 or 24 word phrase.
///
/// The checksum is the leading `len/4` bits of `SHA-256(entropy)`; words are
/// consecutive 11-bit chunks of `entropy || checksum`.
pub fn entropy_to_mnemonic(entropy: &[u8]) -> Result<Zeroizing<String>, MnemonicError> {
    if entropy.len() != 16 && entropy.len() != 32 {
        return Err(MnemonicError::InvalidEntropyLength(entropy.len()));
    }

    let checksum_bits = entropy.len() * 8 / 32;
    let word_count = (entropy.len() * 8 + checksum_bits) / 11;

    let mut combined = Zeroizing::new(Vec::with_capacity(entropy.len() + 1));
    combined.extend_from_slice(entropy);
    combined.push(sha256(entropy)[0]);

    let mut words = Vec::with_capacity(word_count);
    for i in 0..word_count {
        let bit_pos = i * 11;
        let byte_pos = bit_pos / 8;
        let bit_offset = bit_pos % 8;

        // 11 bits span at most three bytes.
        let mut bits = (combined[byte_pos] as u32) << 16;
        if let Some(b) = combined.get(byte_pos + 1) {
            bits |= (*b as u32) << 8;
        }
        if let Some(b) = combined.get(byte_pos + 2) {
            bits |= *b as u32;
        }

        let index = ((bits >> (13 - bit_offset)) & 0x7FF) as usize;
        words.push(BIP39_ENGLISH[index]);
    }

    Ok(Zeroizing::new(words.join(" ")))
}

/// Stretch a phrase into the 64-byte BIP-39 seed (empty passphrase).
pub fn mnemonic_to_seed(mnemonic: &str) -> Zeroizing<[u8; 64]> {
    let mut seed = Zeroizing::new([0u8; 64]);
    pbkdf2::pbkdf2_hmac::<Sha512>(
        mnemonic.as_bytes(),
        PBKDF2_SALT,
        PBKDF2_ROUNDS,
        &mut seed[..],
    );
    seed
}

/// Accept 12 or 24 whitespace separated words, all from the dictionary.
/// Case is ignored; the checksum is not checked.
pub fn validate_mnemonic(mnemonic: &str) -> bool {
    let words: Vec<&str> = mnemonic.split_whitespace().collect();
    if words.len() != 12 && words.len() != 24 {
        return false;
    }
    words
        .iter()
        .all(|w| BIP39_ENGLISH.binary_search(&w.to_lowercase().as_str()).is_ok())
}

/// Lowercase the phrase and collapse whitespace so that a hand-typed restore
/// derives the same seed as the generated phrase.
pub fn normalize_mnemonic(mnemonic: &str) -> Zeroizing<String> {
    Zeroizing::new(
        mnemonic
            .split_whitespace()
            .map(str::to_lowercase)
            .collect::<Vec<_>>()
            .join(" "),
    )
}

/// Fresh 12-word phrase from 128 bits of OS randomness.
pub fn generate_mnemonic() -> Result<Zeroizing<String>, MnemonicError> {
    let entropy = Zeroizing::new(random_bytes::<16>());
    entropy_to_mnemonic(&entropy[..])
}

/// Derive the root CA ed25519 key for a phrase.
pub fn derive_root_signing_key(mnemonic: &str) -> Result<SigningKey, MnemonicError> {
    let seed = mnemonic_to_seed(mnemonic);
    let hk = Hkdf::<Sha256>::new(Some(ROOT_CA_SALT), &seed[..]);
    let mut key_material = Zeroizing::new([0u8; 32]);
    hk.expand(ROOT_CA_INFO, &mut key_material[..])
        .map_err(|_| MnemonicError::KeyDerivation)?;
    Ok(SigningKey::from_bytes(&key_material))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Vector {
        entropy: &'static str,
        mnemonic: &'static str,
        seed: &'static str,
    }

    const VECTORS: &[Vector] = &[
        Vector {
            entropy: "00000000000000000000000000000000",
            mnemonic: "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about",
            seed: "5eb00bbddcf069084889a8ab9155568165f5c453ccb85e70811aaed6f6da5fc19a5ac40b389cd370d086206dec8aa6c43daea6690f20ad3d8d48b2d2ce9e38e4",
        },
        Vector {
            entropy: "7f7f7f7f7f7f7f7f7f7f7f7f7f7f7f7f",
            mnemonic: "legal winner thank year wave sausage worth useful legal winner thank yellow",
            seed: "878386efb78845b3355bd15ea4d39ef97d179cb712b77d5c12b6be415fffeffe5f377ba02bf3f8544ab800b955e51fbff09828f682052a20faa6addbbddfb096",
        },
        Vector {
            entropy: "80808080808080808080808080808080",
            mnemonic: "letter advice cage absurd amount doctor acoustic avoid letter advice cage above",
            seed: "77d6be9708c8218738934f84bbbb78a2e048ca007746cb764f0673e4b1812d176bbb173e1a291f31cf633f1d0bad7d3cf071c30e98cd0688b5bcce65ecaceb36",
        },
    ];

    #[test]
    fn test_bip39_vectors() {
        for v in VECTORS {
            let entropy = hex::decode(v.entropy).unwrap();
            let mnemonic = entropy_to_mnemonic(&entropy).unwrap();
            assert_eq!(mnemonic.as_str(), v.mnemonic);
            assert!(validate_mnemonic(v.mnemonic));
            assert_eq!(hex::encode(&mnemonic_to_seed(v.mnemonic)[..]), v.seed);
        }
    }

    #[test]
    fn test_24_word_entropy() {
        let mnemonic = entropy_to_mnemonic(&[0xff; 32]).unwrap();
        let words: Vec<&str> = mnemonic.split(' ').collect();
        assert_eq!(words.len(), 24);
        assert!(words[..23].iter().all(|w| *w == "zoo"));
        assert_eq!(words[23], "vote");
    }

    #[test]
    fn test_entropy_length_rejected() {
        assert!(matches!(
            entropy_to_mnemonic(&[0u8; 20]),
            Err(MnemonicError::InvalidEntropyLength(20))
        ));
    }

    #[test]
    fn test_validate_mnemonic() {
        let valid12 = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";
        let valid24 = vec!["abandon"; 24].join(" ");
        assert!(validate_mnemonic(valid12));
        assert!(validate_mnemonic(&valid24));
        assert!(validate_mnemonic(
            "Abandon abandon ABANDON abandon abandon abandon abandon abandon abandon abandon abandon ABOUT"
        ));

        // 11 and 13 words
        assert!(!validate_mnemonic(
            "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon"
        ));
        assert!(!validate_mnemonic(&format!("{valid12} about")));
        // unknown word
        assert!(!validate_mnemonic(
            "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon nitella"
        ));
        assert!(!validate_mnemonic(""));
    }

    #[test]
    fn test_generated_mnemonic_is_valid() {
        let m = generate_mnemonic().unwrap();
        assert_eq!(m.split(' ').count(), 12);
        assert!(validate_mnemonic(&m));
    }

    #[test]
    fn test_root_key_is_deterministic() {
        let m = VECTORS[0].mnemonic;
        let a = derive_root_signing_key(m).unwrap();
        let b = derive_root_signing_key(m).unwrap();
        assert_eq!(a.verifying_key(), b.verifying_key());

        let c = derive_root_signing_key(VECTORS[1].mnemonic).unwrap();
        assert_ne!(a.verifying_key(), c.verifying_key());
    }

    #[test]
    fn test_normalize_mnemonic() {
        assert_eq!(
            normalize_mnemonic("  Legal  WINNER\tthank ").as_str(),
            "legal winner thank"
        );
    }

    #[test]
    fn test_dictionary_sorted() {
        assert!(BIP39_ENGLISH.windows(2).all(|w| w[0] < w[1]));
    }
}
