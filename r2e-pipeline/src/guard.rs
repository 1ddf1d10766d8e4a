//! Guards (spec.md §4.4 step 3): run in registration order after
//! middleware, before the handler. Unlike middleware a guard does not
//! drive a `next()` continuation — it only answers allow/deny.

use futures_util::future::BoxFuture;
use r2e_core::{RequestContext, Response};

pub enum GuardOutcome {
    Allow,
    /// Denies the request. `None` falls back to the spec's default 403.
    Deny(Option<Response>),
}

/// A single guard. Boxed-future return keeps `Arc<dyn Guard>` object-safe
/// without pulling in `async_trait` (same approach as `r2e-cache`'s
/// `CacheStore`, just made trait-object-compatible via an explicit
/// lifetime since guards are stored behind `dyn`).
pub trait Guard: Send + Sync {
    fn check<'a>(&'a self, ctx: &'a RequestContext) -> BoxFuture<'a, GuardOutcome>;
}

/// A guard built from a plain predicate closure — covers the common case
/// of a synchronous allow/deny rule without requiring a full `impl Guard`.
pub struct FnGuard<F> {
    f: F,
}

impl<F> FnGuard<F>
where
    F: Fn(&RequestContext) -> bool + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> Guard for FnGuard<F>
where
    F: Fn(&RequestContext) -> bool + Send + Sync,
{
    fn check<'a>(&'a self, ctx: &'a RequestContext) -> BoxFuture<'a, GuardOutcome> {
        let allowed = (self.f)(ctx);
        Box::pin(async move {
            if allowed {
                GuardOutcome::Allow
            } else {
                GuardOutcome::Deny(None)
            }
        })
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
    async fn fn_guard_allows_when_predicate_true() {
        let g = FnGuard::new(|_: &RequestContext| true);
        assert!(matches!(g.check(&ctx()).await, GuardOutcome::Allow));
    }

    #[tokio::test]
    async fn fn_guard_denies_when_predicate_false() {
        let g = FnGuard::new(|_: &RequestContext| false);
        assert!(matches!(g.check(&ctx()).await, GuardOutcome::Deny(None)));
    }
}
