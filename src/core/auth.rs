//! Purpose: Server-side credential primitives: password hashing and bearer
//! tokens.
//! Exports: `generate_salt`, `hash_password`, `mint_token`, `verify_token`.
//! Role: Token signing/verification delegates to `jsonwebtoken` (HS256);
//! nothing here is custom cryptography beyond salting.
//! Invariants: Tokens expire after one hour; verification failures surface as
//! `Permission` with the fixed middleware message.

use crate::core::error::{Error, ErrorKind};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};

const TOKEN_TTL_SECS: u64 = 3600;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    iat: u64,
    exp: u64,
}

pub fn generate_salt() -> Result<String, Error> {
    let mut bytes = [0u8; 16];
    getrandom::fill(&mut bytes).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("failed to generate salt")
            .with_source(err)
    })?;
    Ok(hex(&bytes))
}

pub fn hash_password(password: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex(&hasher.finalize())
}

/// Issue a signed bearer token whose subject is the user id.
pub fn mint_token(user_id: &str, secret: &str) -> Result<String, Error> {
    let now = unix_now()?;
    mint_token_with_expiry(user_id, secret, now, now + TOKEN_TTL_SECS)
}

fn mint_token_with_expiry(
    user_id: &str,
    secret: &str,
    iat: u64,
    exp: u64,
) -> Result<String, Error> {
    let claims = Claims {
        sub: user_id.to_string(),
        iat,
        exp,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("failed to sign token")
            .with_source(err)
    })
}

/// Verify a bearer token and return the user id it was issued for.
/// Invalid, tampered, or expired tokens all collapse to one message so the
/// client cannot distinguish them.
pub fn verify_token(token: &str, secret: &str) -> Result<String, Error> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|err| {
        Error::new(ErrorKind::Permission)
            .with_message("Not authorized, token failed")
            .with_source(err)
    })?;
    Ok(data.claims.sub)
}

fn unix_now() -> Result<u64, Error> {
    let duration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("time went backwards")
                .with_source(err)
        })?;
    Ok(duration.as_secs())
}

fn hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        use std::fmt::Write;
        let _ = write!(out, "{byte:02x}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{generate_salt, hash_password, mint_token, mint_token_with_expiry, verify_token};
    use crate::core::error::ErrorKind;

    #[test]
    fn hash_is_deterministic_per_salt() {
        let salt = generate_salt().expect("salt");
        let first = hash_password("hunter2", &salt);
        let second = hash_password("hunter2", &salt);
        assert_eq!(first, second);
        assert_ne!(first, hash_password("hunter2", "other-salt"));
        assert_ne!(first, hash_password("hunter3", &salt));
    }

    #[test]
    fn token_round_trips_subject() {
        let token = mint_token("u42", "secret").expect("mint");
        let subject = verify_token(&token, "secret").expect("verify");
        assert_eq!(subject, "u42");
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = mint_token("u42", "secret").expect("mint");
        let err = verify_token(&token, "other").expect_err("verify");
        assert_eq!(err.kind(), ErrorKind::Permission);
        assert_eq!(err.message(), Some("Not authorized, token failed"));
    }

    #[test]
    fn garbage_token_is_rejected() {
        let err = verify_token("not-a-token", "secret").expect_err("verify");
        assert_eq!(err.kind(), ErrorKind::Permission);
    }

    #[test]
    fn expired_token_is_rejected() {
        let now = super::unix_now().expect("clock");
        // Well past the default validation leeway.
        let token =
            mint_token_with_expiry("u42", "secret", now - 7200, now - 3600).expect("mint");
        let err = verify_token(&token, "secret").expect_err("verify");
        assert_eq!(err.kind(), ErrorKind::Permission);
        assert_eq!(err.message(), Some("Not authorized, token failed"));
    }
}
