use thiserror::Error;

/// Failures surfaced by the credential store adapter.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("credential store unreachable: {0}")]
    Unavailable(#[source] mongodb::error::Error),

    #[error("an account with this email already exists")]
    DuplicateKey,

    #[error("account document could not be encoded or decoded: {0}")]
    Codec(#[source] mongodb::error::Error),
}

/// Failures from password hashing and session tokens.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("password hashing failed: {0}")]
    Hash(argon2::password_hash::Error),

    #[error("session claims could not be encoded: {0}")]
    ClaimsEncoding(#[from] serde_json::Error),

    #[error("session token is malformed")]
    MalformedToken,

    #[error("session token signature mismatch")]
    BadSignature,

    #[error("session token expired")]
    ExpiredToken,
}

/// Failures from the identity operations.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("{0}")]
    Validation(String),

    #[error("no account found for this email")]
    NotFound,

    #[error("lost the creation race for this email and the record is still missing")]
    Conflict,

    #[error("invalid credentials")]
    Unauthorized,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

/// Environment configuration problems, reported before any store call.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set; it has no built-in default")]
    Missing(&'static str),

    #[error("{0} must be set explicitly when APP_ENV=production")]
    MissingInProduction(&'static str),

    #[error("{0} is not a valid number: {1}")]
    InvalidNumber(&'static str, String),
}
