//! Constant-time helpers and secure random byte generation.

use constant_time_eq::constant_time_eq;
use rand_core::{OsRng, RngCore};

/// Compare two byte slices in constant time.
///
/// Slices of different lengths compare unequal.
///
/// # Example
///
/// ```rust
/// use nitella_crypto::utils::constant_time_compare;
///
/// let a = [0u8; 32];
/// let b = [0u8; 32];
/// assert!(constant_time_compare(&a, &b));
///
/// let c = [1u8; 32];
/// assert!(!constant_time_compare(&a, &c));
/// ```
pub fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    constant_time_eq(a, b)
}

/// True if every byte is zero. Runs over the whole slice.
pub fn is_all_zero(bytes: &[u8]) -> bool {
    bytes.iter().fold(0u8, |acc, b| acc | b) == 0
}

/// Fill a fixed-size array from the OS RNG.
pub fn random_bytes<const N: usize>() -> [u8; N] {
    let mut out = [0u8; N];
    OsRng.fill_bytes(&mut out);
    out
}

/// 16 random bytes, hex encoded. Used for challenge and scan session ids.
pub fn random_hex_id() -> String {
    hex::encode(random_bytes::<16>())
}
