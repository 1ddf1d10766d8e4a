//! Error taxonomy and JSON error-response construction.

use bytes::Bytes;
use http::{Response, StatusCode};
use std::time::{SystemTime, UNIX_EPOCH};

/// The kind of failure, independent of the message that describes it.
///
/// Each kind carries its own HTTP status and stable wire `type`/default
/// `code` strings (§6/§7 of the error taxonomy).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Authentication,
    Authorization,
    NotFound,
    Conflict,
    PayloadTooLarge,
    RateLimit,
    Timeout,
    Internal,
    Unavailable,
}

impl ErrorKind {
    pub fn status(self) -> StatusCode {
        match self {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::Authentication => StatusCode::UNAUTHORIZED,
            ErrorKind::Authorization => StatusCode::FORBIDDEN,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ErrorKind::RateLimit => StatusCode::TOO_MANY_REQUESTS,
            ErrorKind::Timeout => StatusCode::REQUEST_TIMEOUT,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Wire `type` field. The first six match §6's enumerated set exactly;
    /// the remaining kinds extend it consistently for the taxonomy rows
    /// §7 adds beyond that set.
    pub fn wire_type(self) -> &'static str {
        match self {
            ErrorKind::Validation => "VALIDATION",
            ErrorKind::Authentication => "AUTHENTICATION",
            ErrorKind::Authorization => "AUTHORIZATION",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::RateLimit => "RATE_LIMIT",
            ErrorKind::Internal => "INTERNAL",
            ErrorKind::Conflict => "CONFLICT",
            ErrorKind::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            ErrorKind::Timeout => "TIMEOUT",
            ErrorKind::Unavailable => "UNAVAILABLE",
        }
    }

    fn default_code(self) -> &'static str {
        match self {
            ErrorKind::Validation => "VALIDATION_FAILED",
            ErrorKind::Authentication => "UNAUTHENTICATED",
            ErrorKind::Authorization => "FORBIDDEN",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Conflict => "CONFLICT",
            ErrorKind::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            ErrorKind::RateLimit => "RATE_LIMIT_EXCEEDED",
            ErrorKind::Timeout => "TIMEOUT",
            ErrorKind::Internal => "INTERNAL_ERROR",
            ErrorKind::Unavailable => "SERVICE_UNAVAILABLE",
        }
    }
}

/// A categorized engine error. Carries everything needed to build the JSON
/// error body in §6 without the caller repeating status/type bookkeeping.
#[derive(Debug, Clone)]
pub struct EngineError {
    pub kind: ErrorKind,
    pub code: String,
    pub message: String,
    pub stack_trace: Option<String>,
}

impl EngineError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            code: kind.default_code().to_string(),
            kind,
            message: message.into(),
            stack_trace: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = code.into();
        self
    }

    pub fn with_stack_trace(mut self, trace: impl Into<String>) -> Self {
        self.stack_trace = Some(trace.into());
        self
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Authentication, message)
    }

    pub fn authorization(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Authorization, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn rate_limit(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RateLimit, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    pub fn status(&self) -> StatusCode {
        self.kind.status()
    }

    /// Build the `{ success: false, error: {...} }` wire body (§6). `dev_mode`
    /// controls whether `stack_trace` is emitted — stripped in production.
    pub fn to_json(&self, dev_mode: bool) -> serde_json::Value {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let mut error = serde_json::json!({
            "type": self.kind.wire_type(),
            "code": self.code,
            "message": self.message,
            "timestamp": now,
        });
        if dev_mode {
            if let Some(trace) = &self.stack_trace {
                error["stack_trace"] = serde_json::Value::String(trace.clone());
            }
        }
        serde_json::json!({ "success": false, "error": error })
    }

    /// Build the full HTTP response for this error.
    pub fn into_response(self, dev_mode: bool) -> Response<Bytes> {
        if self.status().is_server_error() {
            tracing::error!(code = %self.code, message = %self.message, "engine error response");
        }
        let body = self.to_json(dev_mode);
        let bytes = Bytes::from(serde_json::to_vec(&body).unwrap_or_default());
        Response::builder()
            .status(self.status())
            .header("content-type", "application/json; charset=utf-8")
            .body(bytes)
            .expect("status/header values are always valid")
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}): {}", self.kind.wire_type(), self.code, self.message)
    }
}

impl std::error::Error for EngineError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_taxonomy() {
        assert_eq!(ErrorKind::Validation.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorKind::Authentication.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ErrorKind::Authorization.status(), StatusCode::FORBIDDEN);
        assert_eq!(ErrorKind::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorKind::Conflict.status(), StatusCode::CONFLICT);
        assert_eq!(ErrorKind::PayloadTooLarge.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(ErrorKind::RateLimit.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(ErrorKind::Timeout.status(), StatusCode::REQUEST_TIMEOUT);
        assert_eq!(ErrorKind::Internal.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(ErrorKind::Unavailable.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn json_body_shape() {
        let err = EngineError::authentication("missing Authorization header")
            .with_code("MISSING_AUTH_HEADER");
        let body = err.to_json(false);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["type"], "AUTHENTICATION");
        assert_eq!(body["error"]["code"], "MISSING_AUTH_HEADER");
        assert_eq!(body["error"]["message"], "missing Authorization header");
        assert!(body["error"]["timestamp"].is_u64());
        assert!(body["error"].get("stack_trace").is_none());
    }

    #[test]
    fn stack_trace_only_in_dev_mode() {
        let err = EngineError::internal("boom").with_stack_trace("at foo.rs:1");
        assert!(err.to_json(false).get("stack_trace").is_none());
        let dev_body = err.to_json(true);
        assert_eq!(dev_body["error"]["stack_trace"], "at foo.rs:1");
    }

    #[test]
    fn into_response_sets_status_and_content_type() {
        let resp = EngineError::not_found("no such route").into_response(false);
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            resp.headers().get("content-type").unwrap(),
            "application/json; charset=utf-8"
        );
    }
}
