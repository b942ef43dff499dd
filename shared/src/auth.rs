use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use base64::{engine::general_purpose, Engine as _};
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use uuid::Uuid;

use crate::error::AuthError;
use crate::types::Role;

type HmacSha256 = Hmac<Sha256>;

/// Hash a plaintext password with a freshly generated salt.
/// Output is a PHC string; the plaintext is never stored anywhere.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(AuthError::Hash)?;
    Ok(hash.to_string())
}

/// Check a plaintext password against a stored PHC hash.
/// A wrong password returns Ok(false); only a malformed hash is an error.
pub fn verify_password(password: &str, password_hash: &str) -> Result<bool, AuthError> {
    let parsed = PasswordHash::new(password_hash).map_err(AuthError::Hash)?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(AuthError::Hash(e)),
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionClaims {
    pub token_id: String,
    pub email: String,
    pub role: Role,
    pub expires_at: i64, // unix seconds
}

/// Issue an HMAC-SHA256 signed session token: base64url(claims).base64url(mac).
pub fn issue_session_token(
    email: &str,
    role: Role,
    secret: &str,
    ttl_secs: i64,
) -> Result<String, AuthError> {
    let claims = SessionClaims {
        token_id: Uuid::new_v4().to_string(),
        email: email.to_string(),
        role,
        expires_at: Utc::now().timestamp() + ttl_secs,
    };
    let body = general_purpose::URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims)?);

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(body.as_bytes());
    let signature = general_purpose::URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

    Ok(format!("{}.{}", body, signature))
}

/// Verify a session token's signature and expiry, returning its claims.
pub fn verify_session_token(token: &str, secret: &str) -> Result<SessionClaims, AuthError> {
    let (body, signature) = token.split_once('.').ok_or(AuthError::MalformedToken)?;
    let signature_bytes = general_purpose::URL_SAFE_NO_PAD
        .decode(signature)
        .map_err(|_| AuthError::MalformedToken)?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(body.as_bytes());
    mac.verify_slice(&signature_bytes)
        .map_err(|_| AuthError::BadSignature)?;

    let payload = general_purpose::URL_SAFE_NO_PAD
        .decode(body)
        .map_err(|_| AuthError::MalformedToken)?;
    let claims: SessionClaims =
        serde_json::from_slice(&payload).map_err(|_| AuthError::MalformedToken)?;

    if claims.expires_at <= Utc::now().timestamp() {
        return Err(AuthError::ExpiredToken);
    }
    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_never_equals_plaintext() {
        let hash = hash_password("Sup3rSecret!").unwrap();
        assert_ne!(hash, "Sup3rSecret!");
        assert!(hash.starts_with("$argon2"));
    }

    #[test]
    fn test_hashes_are_salted_per_call() {
        let first = hash_password("same-password").unwrap();
        let second = hash_password("same-password").unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_verify_accepts_correct_and_rejects_wrong() {
        let hash = hash_password("Correct horse").unwrap();
        assert!(verify_password("Correct horse", &hash).unwrap());
        assert!(!verify_password("battery staple", &hash).unwrap());
    }

    #[test]
    fn test_verify_rejects_malformed_hash() {
        assert!(verify_password("anything", "not-a-phc-string").is_err());
    }

    #[test]
    fn test_session_token_round_trip() {
        let token = issue_session_token("admin@example.com", Role::Admin, "secret", 60).unwrap();
        let claims = verify_session_token(&token, "secret").unwrap();
        assert_eq!(claims.email, "admin@example.com");
        assert_eq!(claims.role, Role::Admin);
        assert!(claims.expires_at > Utc::now().timestamp());
    }

    #[test]
    fn test_session_token_rejects_wrong_secret() {
        let token = issue_session_token("admin@example.com", Role::Admin, "secret", 60).unwrap();
        assert!(matches!(
            verify_session_token(&token, "other-secret"),
            Err(AuthError::BadSignature)
        ));
    }

    #[test]
    fn test_session_token_rejects_tampered_body() {
        let token = issue_session_token("admin@example.com", Role::Admin, "secret", 60).unwrap();
        let (body, signature) = token.split_once('.').unwrap();
        let forged_body = general_purpose::URL_SAFE_NO_PAD.encode(
            general_purpose::URL_SAFE_NO_PAD
                .decode(body)
                .unwrap()
                .iter()
                .map(|b| b ^ 1)
                .collect::<Vec<u8>>(),
        );
        let forged = format!("{}.{}", forged_body, signature);
        assert!(verify_session_token(&forged, "secret").is_err());
    }

    #[test]
    fn test_session_token_rejects_expired() {
        let token = issue_session_token("admin@example.com", Role::Admin, "secret", -10).unwrap();
        assert!(matches!(
            verify_session_token(&token, "secret"),
            Err(AuthError::ExpiredToken)
        ));
    }

    #[test]
    fn test_session_token_rejects_garbage() {
        assert!(matches!(
            verify_session_token("no-dot-here", "secret"),
            Err(AuthError::MalformedToken)
        ));
    }
}
