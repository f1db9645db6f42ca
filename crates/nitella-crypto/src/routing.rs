//! Blind routing tokens.
//!
//! A relay forwards traffic by `HMAC-SHA256(user_secret, node_id)` so it can
//! route to a node without learning which user owns it. The user secret
//! stays on the authority.

use base64::{engine::general_purpose::URL_SAFE, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::utils::random_bytes;

type HmacSha256 = Hmac<Sha256>;

pub const USER_SECRET_LEN: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum RoutingError {
    #[error("invalid HMAC key")]
    InvalidKey,
}

fn mac(node_id: &str, user_secret: &[u8]) -> Result<HmacSha256, RoutingError> {
    let mut mac = HmacSha256::new_from_slice(user_secret).map_err(|_| RoutingError::InvalidKey)?;
    mac.update(node_id.as_bytes());
    Ok(mac)
}

/// URL-safe, padded base64 of `HMAC-SHA256(user_secret, node_id)`.
pub fn generate_routing_token(node_id: &str, user_secret: &[u8]) -> Result<String, RoutingError> {
    let tag = mac(node_id, user_secret)?.finalize().into_bytes();
    Ok(URL_SAFE.encode(tag))
}

/// Constant-time check of a token against `node_id`. Malformed tokens are
/// simply not valid.
pub fn verify_routing_token(node_id: &str, user_secret: &[u8], token: &str) -> bool {
    let Ok(tag) = URL_SAFE.decode(token) else {
        return false;
    };
    match mac(node_id, user_secret) {
        Ok(m) => m.verify_slice(&tag).is_ok(),
        Err(_) => false,
    }
}

/// Fresh 32-byte user secret.
pub fn generate_user_secret() -> Zeroizing<[u8; USER_SECRET_LEN]> {
    Zeroizing::new(random_bytes::<USER_SECRET_LEN>())
}
