//! Wire adaptation: hyper's `Request<Incoming>`/`Response<Full<Bytes>>` on
//! one side, `r2e_core::RequestContext`/`Response` on the other.

use bytes::{Bytes, BytesMut};
use http::request::Parts;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use r2e_core::{AbortSignal, RequestContext};
use std::time::Duration;

/// Failure reading the request body (§5 "Body reads carry a timeout").
#[derive(Debug)]
pub enum BodyError {
    TooLarge,
    Timeout,
    Read(String),
}

impl std::fmt::Display for BodyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BodyError::TooLarge => write!(f, "body exceeds configured limit"),
            BodyError::Timeout => write!(f, "body read timed out"),
            BodyError::Read(msg) => write!(f, "failed to read body: {msg}"),
        }
    }
}

impl std::error::Error for BodyError {}

/// Drain `incoming` into a single buffer, rejecting as soon as the
/// configured byte limit is crossed rather than buffering the whole body
/// first (§7 "body exceeds limit" must not require reading past the limit).
pub async fn read_body(
    mut incoming: Incoming,
    max_bytes: usize,
    timeout: Duration,
) -> Result<Bytes, BodyError> {
    let drain = async {
        let mut buf = BytesMut::new();
        while let Some(frame) = incoming.frame().await {
            let frame = frame.map_err(|e| BodyError::Read(e.to_string()))?;
            if let Some(data) = frame.data_ref() {
                if buf.len() + data.len() > max_bytes {
                    return Err(BodyError::TooLarge);
                }
                buf.extend_from_slice(data);
            }
        }
        Ok(buf.freeze())
    };
    match tokio::time::timeout(timeout, drain).await {
        Ok(result) => result,
        Err(_) => Err(BodyError::Timeout),
    }
}

/// Build a `RequestContext` from the parsed head and an already-drained
/// body, sharing `abort` (one per connection) so a transport-level
/// disconnect can cancel whichever request is in flight on it.
pub fn context_from_request(
    parts: &Parts,
    body: Option<Bytes>,
    request_id: String,
    abort: AbortSignal,
) -> RequestContext {
    let url = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| parts.uri.path().to_string());
    let mut ctx = RequestContext::new(parts.method.clone(), url, parts.headers.clone(), request_id)
        .with_abort_signal(abort);
    ctx.body = body.filter(|b| !b.is_empty());
    ctx
}

/// Hand the engine's response back to hyper as a fixed (non-streaming) body.
pub fn response_to_hyper(resp: r2e_core::Response) -> hyper::Response<Full<Bytes>> {
    let (parts, body) = resp.into_parts();
    hyper::Response::from_parts(parts, Full::new(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{HeaderMap, Method, Request};

    #[test]
    fn context_from_request_splits_path_and_query() {
        let req = Request::builder()
            .method(Method::GET)
            .uri("/users/42?active=true")
            .body(())
            .unwrap();
        let (parts, _) = req.into_parts();
        let ctx = context_from_request(
            &parts,
            Some(Bytes::from_static(b"{}")),
            "req-1".into(),
            AbortSignal::new(),
        );
        assert_eq!(ctx.url, "/users/42?active=true");
        assert_eq!(ctx.query.get("active").map(String::as_str), Some("true"));
        assert_eq!(ctx.body.as_deref(), Some(&b"{}"[..]));
    }

    #[test]
    fn empty_body_becomes_none() {
        let req = Request::builder().uri("/").body(()).unwrap();
        let (parts, _) = req.into_parts();
        let ctx = context_from_request(&parts, Some(Bytes::new()), "req-2".into(), AbortSignal::new());
        assert!(ctx.body.is_none());
    }

    #[test]
    fn headers_pass_through_untouched() {
        let mut headers = HeaderMap::new();
        headers.insert("x-test", "1".parse().unwrap());
        let req = Request::builder()
            .uri("/")
            .body(())
            .unwrap();
        let (mut parts, _) = req.into_parts();
        parts.headers = headers;
        let ctx = context_from_request(&parts, None, "req-3".into(), AbortSignal::new());
        assert_eq!(ctx.headers.get("x-test").unwrap(), "1");
    }

    #[test]
    fn context_shares_the_connection_level_abort_signal() {
        let req = Request::builder().uri("/").body(()).unwrap();
        let (parts, _) = req.into_parts();
        let conn_abort = AbortSignal::new();
        let ctx = context_from_request(&parts, None, "req-4".into(), conn_abort.clone());
        assert!(!ctx.is_aborted());
        conn_abort.abort();
        assert!(ctx.is_aborted());
    }
}
