use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::{Digest, Sha256};
use shelfguard_core::{AppError, AppResult};

/// Generates a 256-bit random token and returns `(raw_b64, sha256_hex)`.
///
/// The raw token is the only copy that ever leaves the trust boundary (into
/// a cookie or an email link); only its hash is persisted.
pub fn generate_token() -> AppResult<(String, String)> {
    let mut bytes = [0_u8; 32];
    getrandom::fill(&mut bytes)
        .map_err(|error| AppError::Store(format!("failed to generate random token: {error}")))?;
    let raw = URL_SAFE_NO_PAD.encode(bytes);
    let hashed = hash_token(&raw);
    Ok((raw, hashed))
}

/// Hashes a raw token with SHA-256, hex-encoded.
#[must_use]
pub fn hash_token(raw_token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw_token.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_token_hash_matches_hash_token() {
        let (raw, hashed) = generate_token().unwrap_or_else(|_| unreachable!());
        assert_eq!(hash_token(&raw), hashed);
    }

    #[test]
    fn generate_token_is_random() {
        let (raw_a, _) = generate_token().unwrap_or_else(|_| unreachable!());
        let (raw_b, _) = generate_token().unwrap_or_else(|_| unreachable!());
        assert_ne!(raw_a, raw_b);
    }
}
