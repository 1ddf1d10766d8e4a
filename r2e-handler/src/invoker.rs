//! Specialized Invoker (spec.md §4.3): the fastest callable shape a Handler
//! Description can be turned into, built once at registration time.

use crate::description::HandlerDescription;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use http::StatusCode;
use r2e_core::response::{self, Response};
use r2e_core::RequestContext;
use std::panic::AssertUnwindSafe;

#[derive(Clone)]
enum Invoker {
    /// Fully pre-built response, cloned verbatim on every hit — covers
    /// `ConstString`/`ConstJson` (§4.3: payload serialized once at
    /// registration, headers pre-selected).
    Const(Response),
    Dynamic(crate::description::HandlerFn),
}

/// An opaque callable produced from a `HandlerDescription`. `invoke` returns
/// `None` when nothing should be written — either the request was aborted
/// before the handler ran, or it aborted while the handler was in flight.
#[derive(Clone)]
pub struct SpecializedInvoker {
    inner: Invoker,
    dev_mode: bool,
}

impl SpecializedInvoker {
    pub fn invoke(&self, ctx: RequestContext) -> BoxFuture<'static, Option<Response>> {
        let dev_mode = self.dev_mode;
        match &self.inner {
            Invoker::Const(resp) => {
                if ctx.is_aborted() {
                    return Box::pin(async { None });
                }
                let resp = resp.clone();
                Box::pin(async move { Some(resp) })
            }
            Invoker::Dynamic(f) => {
                if ctx.is_aborted() {
                    return Box::pin(async { None });
                }
                let f = f.clone();
                let abort = ctx.abort_signal();
                Box::pin(async move {
                    let outcome = AssertUnwindSafe(f(ctx)).catch_unwind().await;
                    if abort.is_aborted() {
                        return None;
                    }
                    match outcome {
                        Ok(Ok(value)) => Some(response::auto_serialize(StatusCode::OK, &value)),
                        Ok(Err(engine_error)) => Some(engine_error.into_response(dev_mode)),
                        Err(panic) => {
                            let msg = panic_message(&panic);
                            tracing::error!(panic = %msg, "handler panicked");
                            Some(response::text(
                                StatusCode::INTERNAL_SERVER_ERROR,
                                "Internal Server Error",
                            ))
                        }
                    }
                })
            }
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Turns Handler Descriptions into `SpecializedInvoker`s, keeping a
/// `(method, pattern)` → invoker cache so a hot reload of a route table does
/// not re-specialize unchanged entries (§4.3).
#[derive(Clone)]
pub struct Specializer {
    cache: std::sync::Arc<dashmap::DashMap<(http::Method, String), SpecializedInvoker>>,
    dev_mode: bool,
}

impl Default for Specializer {
    fn default() -> Self {
        Self::new(false)
    }
}

impl Specializer {
    pub fn new(dev_mode: bool) -> Self {
        Self {
            cache: std::sync::Arc::new(dashmap::DashMap::new()),
            dev_mode,
        }
    }

    pub fn specialize(
        &self,
        method: &http::Method,
        pattern: &str,
        desc: HandlerDescription,
    ) -> SpecializedInvoker {
        let key = (method.clone(), pattern.to_string());
        if let Some(cached) = self.cache.get(&key) {
            return cached.clone();
        }
        let inner = match desc {
            HandlerDescription::ConstString(s) => Invoker::Const(response::text(StatusCode::OK, s)),
            HandlerDescription::ConstJson(v) => {
                Invoker::Const(response::json_value(StatusCode::OK, &v))
            }
            HandlerDescription::StaticFn(f) | HandlerDescription::DynamicFn(f) => Invoker::Dynamic(f),
        };
        let invoker = SpecializedInvoker {
            inner,
            dev_mode: self.dev_mode,
        };
        self.cache.insert(key, invoker.clone());
        invoker
    }

    pub fn evict(&self, method: &http::Method, pattern: &str) {
        self.cache.remove(&(method.clone(), pattern.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;

    fn ctx() -> RequestContext {
        RequestContext::new(Method::GET, "/x".into(), http::HeaderMap::new(), "req-1".into())
    }

    #[tokio::test]
    async fn const_string_writes_text_plain() {
        let s = Specializer::new(false);
        let inv = s.specialize(
            &Method::GET,
            "/hello",
            HandlerDescription::ConstString("hi".into()),
        );
        let resp = inv.invoke(ctx()).await.unwrap();
        assert_eq!(resp.headers().get("content-type").unwrap(), response::TEXT_PLAIN);
        assert_eq!(resp.body().as_ref(), b"hi");
    }

    #[tokio::test]
    async fn const_json_serialized_once() {
        let s = Specializer::new(false);
        let inv = s.specialize(
            &Method::GET,
            "/j",
            HandlerDescription::ConstJson(serde_json::json!({"a": 1})),
        );
        let resp = inv.invoke(ctx()).await.unwrap();
        assert_eq!(
            resp.headers().get("content-type").unwrap(),
            response::APPLICATION_JSON
        );
    }

    #[tokio::test]
    async fn dynamic_fn_auto_serializes_object() {
        let s = Specializer::new(false);
        let f: crate::description::HandlerFn = std::sync::Arc::new(|ctx: RequestContext| {
            Box::pin(async move {
                Ok(serde_json::json!({"id": ctx.path_params.get("id").unwrap_or("")}))
            })
        });
        let inv = s.specialize(&Method::GET, "/items/:id", HandlerDescription::DynamicFn(f));
        let mut c = ctx();
        c.path_params.insert("id", "42");
        let resp = inv.invoke(c).await.unwrap();
        assert_eq!(
            resp.headers().get("content-type").unwrap(),
            response::APPLICATION_JSON
        );
        assert_eq!(resp.body().as_ref(), br#"{"id":"42"}"#);
    }

    #[tokio::test]
    async fn dynamic_fn_error_maps_through_normalizer() {
        let s = Specializer::new(false);
        let f: crate::description::HandlerFn = std::sync::Arc::new(|_ctx: RequestContext| {
            Box::pin(async move { Err(r2e_core::EngineError::not_found("no such widget")) })
        });
        let inv = s.specialize(&Method::GET, "/missing", HandlerDescription::DynamicFn(f));
        let resp = inv.invoke(ctx()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn panicking_handler_yields_500() {
        let s = Specializer::new(false);
        let f: crate::description::HandlerFn = std::sync::Arc::new(|_ctx: RequestContext| {
            Box::pin(async move {
                panic!("boom");
                #[allow(unreachable_code)]
                Ok(serde_json::Value::Null)
            })
        });
        let inv = s.specialize(&Method::GET, "/boom", HandlerDescription::DynamicFn(f));
        let resp = inv.invoke(ctx()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn aborted_before_invoke_writes_nothing() {
        let s = Specializer::new(false);
        let inv = s.specialize(
            &Method::GET,
            "/hello2",
            HandlerDescription::ConstString("hi".into()),
        );
        let c = ctx();
        c.mark_aborted();
        assert!(inv.invoke(c).await.is_none());
    }

    #[test]
    fn cache_returns_same_invoker_for_same_key() {
        let s = Specializer::new(false);
        let a = s.specialize(&Method::GET, "/x", HandlerDescription::ConstString("a".into()));
        let b = s.specialize(&Method::GET, "/x", HandlerDescription::ConstString("b".into()));
        // second registration under the same key is ignored; cache wins.
        let _ = (a, b);
        assert_eq!(s.cache.len(), 1);
    }
}
