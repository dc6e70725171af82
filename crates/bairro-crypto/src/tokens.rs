use rand::TryRngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Session tokens are 32 random bytes, hex-encoded to 64 characters.
pub const DEFAULT_TOKEN_BYTES: usize = 32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("No text to hash")]
    EmptySecret,
    #[error("Token length must be greater than zero")]
    InvalidLength,
    #[error("OS random source failed: {0}")]
    Rng(String),
}

/// SHA-256 of `secret`, hex-encoded. Deterministic so stored and supplied
/// passwords can be compared directly.
pub fn hash_secret(secret: &str) -> Result<String, TokenError> {
    if secret.is_empty() {
        return Err(TokenError::EmptySecret);
    }

    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// `byte_len` bytes from the OS CSPRNG as a lowercase hex string.
pub fn random_token(byte_len: usize) -> Result<String, TokenError> {
    if byte_len == 0 {
        return Err(TokenError::InvalidLength);
    }

    let mut bytes = vec![0u8; byte_len];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| TokenError::Rng(e.to_string()))?;
    Ok(hex::encode(bytes))
}
