//! The mutable bag carried through the pipeline for a single request (§3).

use bytes::Bytes;
use http::{HeaderMap, Method};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Named path parameters extracted by the route index. Cheap to clone —
/// callers typically only read a handful of names per request.
#[derive(Debug, Clone, Default)]
pub struct PathParams {
    values: HashMap<String, String>,
}

impl PathParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Type-erased extension bag for middleware-to-handler data (§3 `data`,
/// §9 "typed namespace token" translation of the dynamically-typed
/// middleware context).
#[derive(Default)]
pub struct Extensions {
    entries: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl Extensions {
    pub fn insert<T: Send + Sync + 'static>(&mut self, value: T) {
        self.entries.insert(TypeId::of::<T>(), Box::new(value));
    }

    pub fn get<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.entries
            .get(&TypeId::of::<T>())
            .and_then(|b| b.downcast_ref::<T>())
    }

    pub fn remove<T: Send + Sync + 'static>(&mut self) -> Option<T> {
        self.entries
            .remove(&TypeId::of::<T>())
            .and_then(|b| b.downcast::<T>().ok())
            .map(|b| *b)
    }
}

/// A cooperative cancellation flag shared between the transport adapter and
/// the pipeline (§5 "abort hook"). Cheaply cloned; every clone observes the
/// same underlying flag.
#[derive(Clone, Default)]
pub struct AbortSignal(Arc<AtomicBool>);

impl AbortSignal {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn abort(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Per-request mutable state threaded through the middleware/guard/handler
/// chain (§3 Request Context). Owned exclusively by the request's pipeline
/// run; dropped when the response is finalized or the request aborts.
pub struct RequestContext {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub query: HashMap<String, String>,
    pub path_params: PathParams,
    pub body: Option<Bytes>,
    pub request_id: String,
    pub start_time: Instant,
    pub route_pattern: Option<String>,
    pub data: Extensions,
    abort: AbortSignal,
}

impl RequestContext {
    pub fn new(method: Method, url: String, headers: HeaderMap, request_id: String) -> Self {
        let query = parse_query(&url);
        Self {
            method,
            url,
            headers,
            query,
            path_params: PathParams::new(),
            body: None,
            request_id,
            start_time: Instant::now(),
            route_pattern: None,
            data: Extensions::default(),
            abort: AbortSignal::new(),
        }
    }

    pub fn abort_signal(&self) -> AbortSignal {
        self.abort.clone()
    }

    /// Replace this context's abort flag with one shared by something
    /// outside the pipeline — the transport adapter hands in a
    /// per-connection signal so a client disconnect can cancel whichever
    /// request is in flight on that connection.
    pub fn with_abort_signal(mut self, abort: AbortSignal) -> Self {
        self.abort = abort;
        self
    }

    pub fn is_aborted(&self) -> bool {
        self.abort.is_aborted()
    }

    pub fn mark_aborted(&self) {
        self.abort.abort();
    }

    pub fn elapsed(&self) -> std::time::Duration {
        self.start_time.elapsed()
    }
}

fn parse_query(url: &str) -> HashMap<String, String> {
    let Some((_, query)) = url.split_once('?') else {
        return HashMap::new();
    };
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (k.to_string(), v.to_string()),
            None => (pair.to_string(), String::new()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_parsing_splits_pairs() {
        let q = parse_query("/api/hello?a=1&b=2");
        assert_eq!(q.get("a").map(String::as_str), Some("1"));
        assert_eq!(q.get("b").map(String::as_str), Some("2"));
    }

    #[test]
    fn query_parsing_no_query_string() {
        let q = parse_query("/api/hello");
        assert!(q.is_empty());
    }

    #[test]
    fn path_params_round_trip() {
        let mut params = PathParams::new();
        params.insert("id", "42");
        assert_eq!(params.get("id"), Some("42"));
        assert_eq!(params.get("missing"), None);
    }

    #[test]
    fn abort_signal_shared_across_clones() {
        let ctx = RequestContext::new(
            Method::GET,
            "/x".into(),
            HeaderMap::new(),
            "req-1".into(),
        );
        let handle = ctx.abort_signal();
        assert!(!ctx.is_aborted());
        handle.abort();
        assert!(ctx.is_aborted());
    }

    #[test]
    fn extensions_insert_get_remove() {
        let mut ext = Extensions::default();
        ext.insert(42u32);
        assert_eq!(ext.get::<u32>(), Some(&42));
        assert_eq!(ext.remove::<u32>(), Some(42));
        assert_eq!(ext.get::<u32>(), None);
    }
}
