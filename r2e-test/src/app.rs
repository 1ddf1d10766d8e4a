//! In-process HTTP test driver: builds a `RequestContext` directly and
//! hands it to an [`r2e::Engine`] via [`r2e_http::Service`], skipping the
//! TCP listener entirely so a test suite can drive hundreds of requests
//! without binding a port.

use bytes::Bytes;
use http::header::{AUTHORIZATION, CONTENT_TYPE};
use http::{HeaderMap, HeaderValue, Method, StatusCode};
use r2e::Engine;
use r2e_core::RequestContext;
use r2e_http::Service;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};

static REQUEST_COUNTER: AtomicU64 = AtomicU64::new(1);

fn next_request_id() -> String {
    format!("test-{}", REQUEST_COUNTER.fetch_add(1, Ordering::Relaxed))
}

/// A request to be driven through an engine, built incrementally.
pub struct TestRequest {
    method: Method,
    path: String,
    headers: HeaderMap,
    body: Option<Bytes>,
}

impl TestRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(
            http::HeaderName::from_bytes(name.as_bytes()).expect("valid header name"),
            HeaderValue::from_str(value).expect("valid header value"),
        );
        self
    }

    pub fn bearer(self, token: &str) -> Self {
        self.header(AUTHORIZATION.as_str(), &format!("Bearer {token}"))
    }

    pub fn json(mut self, body: &impl serde::Serialize) -> Self {
        self.body = Some(Bytes::from(serde_json::to_vec(body).expect("serializable body")));
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        self
    }

    fn into_context(self) -> RequestContext {
        let mut ctx = RequestContext::new(self.method, self.path, self.headers, next_request_id());
        ctx.body = self.body;
        ctx
    }
}

/// Drives requests against one built [`Engine`] without ever touching a
/// socket.
pub struct TestApp {
    engine: Engine,
}

impl TestApp {
    pub fn new(engine: Engine) -> Self {
        Self { engine }
    }

    pub async fn send(&self, request: TestRequest) -> TestResponse {
        let ctx = request.into_context();
        let response = self.engine.call(ctx).await;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.body().clone();
        TestResponse { status, headers, body }
    }

    pub async fn get(&self, path: &str) -> TestResponse {
        self.send(TestRequest::get(path)).await
    }

    pub async fn get_authenticated(&self, path: &str, token: &str) -> TestResponse {
        self.send(TestRequest::get(path).bearer(token)).await
    }

    pub async fn post_json(&self, path: &str, body: &impl serde::Serialize) -> TestResponse {
        self.send(TestRequest::post(path).json(body)).await
    }

    pub async fn post_json_authenticated(
        &self,
        path: &str,
        body: &impl serde::Serialize,
        token: &str,
    ) -> TestResponse {
        self.send(TestRequest::post(path).json(body).bearer(token)).await
    }

    pub async fn put_json_authenticated(
        &self,
        path: &str,
        body: &impl serde::Serialize,
        token: &str,
    ) -> TestResponse {
        self.send(TestRequest::put(path).json(body).bearer(token)).await
    }

    pub async fn delete_authenticated(&self, path: &str, token: &str) -> TestResponse {
        self.send(TestRequest::delete(path).bearer(token)).await
    }
}

/// Response wrapper with assertion helpers.
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    pub fn assert_ok(self) -> Self {
        assert_eq!(self.status, StatusCode::OK, "Expected 200 OK, got {}", self.status);
        self
    }

    pub fn assert_created(self) -> Self {
        assert_eq!(self.status, StatusCode::CREATED, "Expected 201 Created, got {}", self.status);
        self
    }

    pub fn assert_bad_request(self) -> Self {
        assert_eq!(self.status, StatusCode::BAD_REQUEST, "Expected 400 Bad Request, got {}", self.status);
        self
    }

    pub fn assert_unauthorized(self) -> Self {
        assert_eq!(self.status, StatusCode::UNAUTHORIZED, "Expected 401 Unauthorized, got {}", self.status);
        self
    }

    pub fn assert_forbidden(self) -> Self {
        assert_eq!(self.status, StatusCode::FORBIDDEN, "Expected 403 Forbidden, got {}", self.status);
        self
    }

    pub fn assert_not_found(self) -> Self {
        assert_eq!(self.status, StatusCode::NOT_FOUND, "Expected 404 Not Found, got {}", self.status);
        self
    }

    pub fn assert_status(self, expected: StatusCode) -> Self {
        assert_eq!(self.status, expected, "Expected {expected}, got {}", self.status);
        self
    }

    pub fn json<T: DeserializeOwned>(&self) -> T {
        serde_json::from_slice(&self.body)
            .unwrap_or_else(|e| panic!("Failed to parse JSON: {e}\nBody: {}", self.text()))
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }
}

/// One segment of a resolved JSON path, as produced by [`tokenize_path`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathToken {
    Field(String),
    Index(usize),
    /// `.len()`/`.size()` — counts array elements or object keys.
    Len,
}

/// Split a dotted/bracketed path like `groups[0].tags.len()` into tokens.
/// Used by assertion helpers that compare a JSON response against a
/// human-written path rather than writing out `value["groups"][0]["tags"]`.
pub fn tokenize_path(path: &str) -> Vec<PathToken> {
    let mut tokens = Vec::new();
    for segment in path.split('.') {
        if segment == "len()" || segment == "size()" {
            tokens.push(PathToken::Len);
            continue;
        }
        let mut rest = segment;
        if let Some(bracket) = rest.find('[') {
            let field = &rest[..bracket];
            if !field.is_empty() {
                tokens.push(PathToken::Field(field.to_string()));
            }
            rest = &rest[bracket..];
            while let Some(stripped) = rest.strip_prefix('[') {
                let Some(close) = stripped.find(']') else { break };
                let idx_str = &stripped[..close];
                if let Ok(idx) = idx_str.parse::<usize>() {
                    tokens.push(PathToken::Index(idx));
                }
                rest = &stripped[close + 1..];
            }
        } else if !rest.is_empty() {
            tokens.push(PathToken::Field(rest.to_string()));
        }
    }
    tokens
}

/// Walk `value` along `path`, returning `Value::Null` for any segment that
/// doesn't resolve rather than panicking — callers assert on the result.
pub fn resolve_path(value: &Value, path: &str) -> Value {
    let mut current = value;
    for token in tokenize_path(path) {
        match token {
            PathToken::Field(name) => match current.get(&name) {
                Some(v) => current = v,
                None => return Value::Null,
            },
            PathToken::Index(idx) => match current.get(idx) {
                Some(v) => current = v,
                None => return Value::Null,
            },
            PathToken::Len => {
                let len = match current {
                    Value::Array(a) => a.len(),
                    Value::Object(o) => o.len(),
                    Value::String(s) => s.len(),
                    _ => return Value::Null,
                };
                return Value::from(len);
            }
        }
    }
    current.clone()
}
