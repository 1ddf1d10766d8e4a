//! Security-specific failures. The `auth` middleware (in `r2e-pipeline`) is
//! the only place these are normalized into `r2e_core::EngineError` — per
//! spec.md §9's resolved open question, normalization covers JWT-library
//! failures only; role/permission mismatches are raised directly as
//! `EngineError::Authorization` by the middleware itself, never through
//! this type.

use r2e_core::EngineError;

#[derive(Debug, Clone)]
pub enum SecurityError {
    /// The `Authorization` header is missing.
    MissingAuthHeader,
    /// The header is present but not a `Bearer` scheme.
    InvalidAuthScheme,
    /// The token is malformed or its signature doesn't verify.
    InvalidToken(String),
    /// `exp` is in the past.
    TokenExpired,
    /// `iss`/`aud` didn't match the verifier's configuration.
    ValidationFailed(String),
}

impl std::fmt::Display for SecurityError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SecurityError::MissingAuthHeader => write!(f, "missing Authorization header"),
            SecurityError::InvalidAuthScheme => write!(f, "invalid authorization scheme"),
            SecurityError::InvalidToken(msg) => write!(f, "invalid token: {msg}"),
            SecurityError::TokenExpired => write!(f, "token expired"),
            SecurityError::ValidationFailed(msg) => write!(f, "token validation failed: {msg}"),
        }
    }
}

impl std::error::Error for SecurityError {}

impl SecurityError {
    /// Stable machine code for the wire error body (§6).
    pub fn code(&self) -> &'static str {
        match self {
            SecurityError::MissingAuthHeader => "MISSING_AUTH_HEADER",
            SecurityError::InvalidAuthScheme => "INVALID_AUTH_SCHEME",
            SecurityError::InvalidToken(_) => "INVALID_TOKEN",
            SecurityError::TokenExpired => "TOKEN_EXPIRED",
            SecurityError::ValidationFailed(_) => "TOKEN_VALIDATION_FAILED",
        }
    }
}

impl From<SecurityError> for EngineError {
    fn from(err: SecurityError) -> Self {
        let code = err.code();
        EngineError::authentication(err.to_string()).with_code(code)
    }
}
