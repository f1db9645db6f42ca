//! Human-verifiable fingerprints.
//!
//! Every emoji rendering in the workspace goes through this module so the
//! confirmation emoji of a PAKE session, the QR payload fingerprint and the
//! identity emoji hash are computed from one set of tables.

use crate::hash::sha256;

/// 64-entry palette used for short (4 emoji) fingerprints of arbitrary data
/// and for PAKE confirmation emoji.
pub static SHORT_PALETTE: [&str; 64] = [
    "🐶", "🐱", "🐭", "🐹", "🐰", "🦊", "🐻", "🐼",
    "🐨", "🐯", "🦁", "🐮", "🐷", "🐸", "🐵", "🐔",
    "🐧", "🐦", "🐤", "🦆", "🦅", "🦉", "🦇", "🐺",
    "🐗", "🐴", "🦄", "🐝", "🐛", "🦋", "🐌", "🐞",
    "🌸", "🌺", "🌻", "🌹", "🌷", "🌼", "🌿", "🍀",
    "🍎", "🍊", "🍋", "🍇", "🍓", "🍒", "🍑", "🥝",
    "🌙", "⭐", "🌟", "✨", "⚡", "🔥", "🌈", "☀️",
    "🎸", "🎹", "🎺", "🎷", "🥁", "🎻", "🎤", "🎧",
];

/// 256-entry palette used for identity emoji hashes (one emoji per hash byte).
pub static IDENTITY_PALETTE: [&str; 256] = [
    "🐶", "🐱", "🐭", "🐹", "🐰", "🦊", "🐻", "🐼",
    "🐨", "🐯", "🦁", "🐮", "🐷", "🐸", "🐵", "🐔",
    "🐧", "🐦", "🐤", "🦆", "🦅", "🦉", "🦇", "🐺",
    "🐗", "🐴", "🦄", "🐝", "🐛", "🦋", "🐌", "🐞",
    "🐜", "🦟", "🦗", "🕷️", "🦂", "🐢", "🐍", "🦎",
    "🦖", "🦕", "🐙", "🦑", "🦐", "🦞", "🦀", "🐡",
    "🐠", "🐟", "🐬", "🐳", "🐋", "🦈", "🐊", "🐅",
    "🐆", "🦓", "🦍", "🦧", "🐘", "🦛", "🦏", "🐪",
    "🐫", "🦒", "🦘", "🐃", "🐂", "🐄", "🐎", "🐖",
    "🐏", "🐑", "🦙", "🐐", "🦌", "🐕", "🐩", "🦮",
    "🐕‍🦺", "🐈", "🐓", "🦃", "🦚", "🦜", "🦢", "🦩",
    "🕊️", "🐇", "🦝", "🦨", "🦡", "🦫", "🦦", "🦥",
    "🐁", "🐀", "🐿️", "🦔", "🌵", "🎄", "🌲", "🌳",
    "🌴", "🌱", "🌿", "☘️", "🍀", "🎍", "🎋", "🍃",
    "🍂", "🍁", "🍄", "🌾", "💐", "🌷", "🌹", "🥀",
    "🌺", "🌸", "🌼", "🌻", "🌞", "🌝", "🌛", "🌜",
    "🌚", "🌕", "🌖", "🌗", "🌘", "🌑", "🌒", "🌓",
    "🌔", "🌙", "🌎", "🌍", "🌏", "🪐", "💫", "⭐",
    "🌟", "✨", "⚡", "☄️", "💥", "🔥", "🌪️", "🌈",
    "☀️", "🌤️", "⛅", "🌥️", "☁️", "🌦️", "🌧️", "⛈️",
    "🌩️", "🌨️", "❄️", "☃️", "⛄", "🌬️", "💨", "💧",
    "💦", "☔", "☂️", "🌊", "🍏", "🍎", "🍐", "🍊",
    "🍋", "🍌", "🍉", "🍇", "🍓", "🫐", "🍈", "🍒",
    "🍑", "🥭", "🍍", "🥥", "🥝", "🍅", "🍆", "🥑",
    "🥦", "🥬", "🥒", "🌶️", "🫑", "🌽", "🥕", "🫒",
    "🧄", "🧅", "🥔", "🍠", "🥐", "🥯", "🍞", "🥖",
    "🥨", "🧀", "🥚", "🍳", "🧈", "🥞", "🧇", "🥓",
    "🥩", "🍗", "🍖", "🦴", "🌭", "🍔", "🍟", "🍕",
    "🫓", "🥪", "🥙", "🧆", "🌮", "🌯", "🫔", "🥗",
    "🥘", "🫕", "🥫", "🍝", "🍜", "🍲", "🍛", "🍣",
    "🍱", "🥟", "🦪", "🍤", "🍙", "🍚", "🍘", "🍥",
    "🥠", "🥮", "🍢", "🍡", "🍧", "🍨", "🍦", "🥧",
];

/// Short emoji fingerprint of arbitrary bytes.
///
/// Picks 4 emoji from [`SHORT_PALETTE`] using bytes 0, 2, 4 and 6 of
/// `SHA-256(data)`. Used for CSR/certificate QR payloads and, applied to a
/// derived session key, for PAKE confirmation.
pub fn derive_fingerprint(data: &[u8]) -> String {
    let hash = sha256(data);
    (0..4)
        .map(|i| SHORT_PALETTE[hash[i * 2] as usize % SHORT_PALETTE.len()])
        .collect()
}

/// Hex SHA-256 fingerprint of a public key.
pub fn generate_fingerprint(public_key: &[u8]) -> String {
    hex::encode(sha256(public_key))
}

/// 8-emoji visual hash of a public key, indexed by bytes 0..8 of its SHA-256.
pub fn generate_emoji_hash(public_key: &[u8]) -> String {
    let hash = sha256(public_key);
    hash[..8]
        .iter()
        .map(|b| IDENTITY_PALETTE[*b as usize % IDENTITY_PALETTE.len()])
        .collect()
}

/// Normalize a hex fingerprint for comparison: trimmed, lowercase, no colons.
pub fn normalize_fingerprint(fingerprint: &str) -> String {
    fingerprint.trim().to_lowercase().replace(':', "")
}
