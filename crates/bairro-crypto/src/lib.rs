/// Bairro Crypto Library
///
/// Password digests and session token generation.
///
/// Password storage is a plain SHA-256 of the secret, matching the accounts
/// already stored by the service. Moving to a salted slow hash needs a
/// migration path for existing rows and is tracked separately.

pub mod tokens;

pub use tokens::{DEFAULT_TOKEN_BYTES, TokenError, hash_secret, random_token};
