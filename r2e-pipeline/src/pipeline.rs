//! The pipeline executor itself (spec.md §4.4): builds the CPS chain from
//! `global_mw ++ route_mw`, then guards, then the route's invoker.

use crate::guard::{Guard, GuardOutcome};
use crate::step::{run_step, CompiledStep};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use r2e_core::{MiddlewareSpec, NextFn, RequestContext, Response};
use r2e_handler::SpecializedInvoker;
use r2e_rate_limit::FixedWindowLimiter;
use r2e_security::TokenVerifier;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub enum PipelineError {
    /// An `auth` middleware spec was supplied but no `TokenVerifier` was
    /// configured on the pipeline builder.
    MissingTokenVerifier,
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineError::MissingTokenVerifier => {
                write!(f, "an auth middleware is registered but no token verifier was configured")
            }
        }
    }
}

impl std::error::Error for PipelineError {}

/// One fully-assembled request pipeline: `global_mw ++ route_mw`, guards,
/// and the terminal Specialized Invoker (§4.4 step 1-4).
#[derive(Clone)]
pub struct Pipeline {
    steps: Arc<Vec<CompiledStep>>,
    guards: Arc<Vec<Arc<dyn Guard>>>,
    invoker: SpecializedInvoker,
}

impl Pipeline {
    /// Concatenates `global_mw ++ route_mw` (§4.4 step 1) and compiles each
    /// spec into a `CompiledStep`, building any stateful collaborator
    /// (a rate limiter per `rate_limit` spec) exactly once.
    pub fn new(
        global_mw: Vec<MiddlewareSpec>,
        route_mw: Vec<MiddlewareSpec>,
        guards: Vec<Arc<dyn Guard>>,
        invoker: SpecializedInvoker,
        token_verifier: Option<Arc<dyn TokenVerifier>>,
    ) -> Result<Self, PipelineError> {
        let mut steps = Vec::with_capacity(global_mw.len() + route_mw.len());
        for spec in global_mw.into_iter().chain(route_mw.into_iter()) {
            steps.push(compile_step(spec, &token_verifier)?);
        }
        Ok(Self {
            steps: Arc::new(steps),
            guards: Arc::new(guards),
            invoker,
        })
    }

    /// Run the pipeline for one request (§4.4). The abort signal is
    /// observed at every boundary — middleware, guards, and the invoker
    /// itself — so a request aborted mid-flight never writes a stale body.
    pub fn run(&self, ctx: RequestContext) -> BoxFuture<'static, Response> {
        run_from(0, self.steps.clone(), self.guards.clone(), self.invoker.clone(), ctx)
    }
}

fn compile_step(
    spec: MiddlewareSpec,
    token_verifier: &Option<Arc<dyn TokenVerifier>>,
) -> Result<CompiledStep, PipelineError> {
    Ok(match spec {
        MiddlewareSpec::Cors(opts) => CompiledStep::Cors(opts),
        MiddlewareSpec::Logging(opts) => CompiledStep::Logging(opts),
        MiddlewareSpec::Auth(options) => {
            let verifier = token_verifier.clone().ok_or(PipelineError::MissingTokenVerifier)?;
            CompiledStep::Auth { options, verifier }
        }
        MiddlewareSpec::Validate(opts) => CompiledStep::Validate(opts),
        MiddlewareSpec::RateLimit(options) => {
            let limiter = FixedWindowLimiter::new(options.max, options.window);
            CompiledStep::RateLimit { options, limiter }
        }
        MiddlewareSpec::Custom(mw) => CompiledStep::Custom(mw),
    })
}

fn run_from(
    idx: usize,
    steps: Arc<Vec<CompiledStep>>,
    guards: Arc<Vec<Arc<dyn Guard>>>,
    invoker: SpecializedInvoker,
    ctx: RequestContext,
) -> BoxFuture<'static, Response> {
    Box::pin(async move {
        if ctx.is_aborted() {
            return r2e_core::response::empty(http::StatusCode::INTERNAL_SERVER_ERROR);
        }
        if idx >= steps.len() {
            return run_guards_then_handler(ctx, &guards, &invoker).await;
        }
        let steps_for_next = steps.clone();
        let guards_for_next = guards.clone();
        let invoker_for_next = invoker.clone();
        let next: NextFn<RequestContext> = Box::new(move |ctx: RequestContext| {
            run_from(idx + 1, steps_for_next, guards_for_next, invoker_for_next, ctx)
        });
        // A middleware (or nested `next()` subtree) that panics is the
        // Rust analogue of §4.4's "a middleware that throws": emit 500 and
        // halt rather than poisoning the whole request task.
        match AssertUnwindSafe(run_step(&steps[idx], ctx, next)).catch_unwind().await {
            Ok(resp) => resp,
            Err(_) => r2e_core::EngineError::internal("middleware panicked").into_response(false),
        }
    })
}

async fn run_guards_then_handler(
    ctx: RequestContext,
    guards: &[Arc<dyn Guard>],
    invoker: &SpecializedInvoker,
) -> Response {
    for guard in guards.iter() {
        let outcome = AssertUnwindSafe(guard.check(&ctx)).catch_unwind().await;
        match outcome {
            Ok(GuardOutcome::Allow) => continue,
            Ok(GuardOutcome::Deny(resp)) => {
                return resp.unwrap_or_else(|| {
                    r2e_core::response::text(http::StatusCode::FORBIDDEN, "Forbidden")
                });
            }
            Err(_) => {
                return r2e_core::EngineError::internal("guard panicked").into_response(false);
            }
        }
    }
    if ctx.is_aborted() {
        return r2e_core::response::empty(http::StatusCode::INTERNAL_SERVER_ERROR);
    }
    match invoker.invoke(ctx).await {
        Some(resp) => resp,
        None => r2e_core::response::empty(http::StatusCode::OK),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::FnGuard;
    use futures_util::future::BoxFuture as BF;
    use http::Method;
    use r2e_core::{AuthOptions, CustomMiddleware, RateLimitOptions};
    use r2e_handler::{HandlerDescription, Specializer};
    use r2e_security::HmacJwtVerifier;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn ctx() -> RequestContext {
        RequestContext::new(Method::GET, "/x".into(), http::HeaderMap::new(), "req-1".into())
    }

    fn counting_invoker(calls: Arc<AtomicUsize>) -> SpecializedInvoker {
        let specializer = Specializer::new(false);
        let f: r2e_handler::HandlerFn = Arc::new(move |_ctx: RequestContext| {
            let calls = calls.clone();
            Box::pin(async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(serde_json::json!("ok"))
            })
        });
        specializer.specialize(&Method::GET, "/x", HandlerDescription::DynamicFn(f))
    }

    struct RecordingMiddleware {
        id: u32,
        log: Arc<std::sync::Mutex<Vec<String>>>,
    }

    impl CustomMiddleware<RequestContext> for RecordingMiddleware {
        fn call(&self, ctx: RequestContext, next: NextFn<RequestContext>) -> BF<'static, Response> {
            let id = self.id;
            let log = self.log.clone();
            Box::pin(async move {
                log.lock().unwrap().push(format!("enter {id}"));
                let resp = next(ctx).await;
                log.lock().unwrap().push(format!("exit {id}"));
                resp
            })
        }
    }

    struct ShortCircuitMiddleware;
    impl CustomMiddleware<RequestContext> for ShortCircuitMiddleware {
        fn call(&self, _ctx: RequestContext, _next: NextFn<RequestContext>) -> BF<'static, Response> {
            Box::pin(async move { r2e_core::response::text(http::StatusCode::TEAPOT, "nope") })
        }
    }

    struct PanicMiddleware;
    impl CustomMiddleware<RequestContext> for PanicMiddleware {
        fn call(&self, _ctx: RequestContext, _next: NextFn<RequestContext>) -> BF<'static, Response> {
            Box::pin(async move { panic!("middleware exploded") })
        }
    }

    #[tokio::test]
    async fn nested_middleware_completes_in_reverse_invocation_order() {
        let log = Arc::new(std::sync::Mutex::new(Vec::new()));
        let calls = Arc::new(AtomicUsize::new(0));
        let specs = vec![
            MiddlewareSpec::Custom(Arc::new(RecordingMiddleware { id: 1, log: log.clone() })),
            MiddlewareSpec::Custom(Arc::new(RecordingMiddleware { id: 2, log: log.clone() })),
        ];
        let pipeline = Pipeline::new(specs, vec![], vec![], counting_invoker(calls.clone()), None).unwrap();
        pipeline.run(ctx()).await;
        let entries = log.lock().unwrap().clone();
        assert_eq!(entries, vec!["enter 1", "enter 2", "exit 2", "exit 1"]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn middleware_not_calling_next_short_circuits_and_skips_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let specs = vec![
            MiddlewareSpec::Custom(Arc::new(ShortCircuitMiddleware)),
            // This one would record a call if it ever ran.
            MiddlewareSpec::Custom(Arc::new(RecordingMiddleware {
                id: 99,
                log: Arc::new(std::sync::Mutex::new(Vec::new())),
            })),
        ];
        let pipeline = Pipeline::new(specs, vec![], vec![], counting_invoker(calls.clone()), None).unwrap();
        let resp = pipeline.run(ctx()).await;
        assert_eq!(resp.status(), http::StatusCode::IM_A_TEAPOT);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn panicking_middleware_yields_500_and_halts_chain() {
        let calls = Arc::new(AtomicUsize::new(0));
        let specs = vec![MiddlewareSpec::Custom(Arc::new(PanicMiddleware))];
        let pipeline = Pipeline::new(specs, vec![], vec![], counting_invoker(calls.clone()), None).unwrap();
        let resp = pipeline.run(ctx()).await;
        assert_eq!(resp.status(), http::StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn denying_guard_returns_default_403() {
        let calls = Arc::new(AtomicUsize::new(0));
        let guards: Vec<Arc<dyn Guard>> = vec![Arc::new(FnGuard::new(|_: &RequestContext| false))];
        let pipeline = Pipeline::new(vec![], vec![], guards, counting_invoker(calls.clone()), None).unwrap();
        let resp = pipeline.run(ctx()).await;
        assert_eq!(resp.status(), http::StatusCode::FORBIDDEN);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn auth_middleware_without_verifier_fails_to_build() {
        let calls = Arc::new(AtomicUsize::new(0));
        let specs = vec![MiddlewareSpec::Auth(AuthOptions::default())];
        let err = Pipeline::new(specs, vec![], vec![], counting_invoker(calls), None).unwrap_err();
        assert!(matches!(err, PipelineError::MissingTokenVerifier));
    }

    #[tokio::test]
    async fn missing_bearer_token_rejected_when_required() {
        let calls = Arc::new(AtomicUsize::new(0));
        let verifier: Arc<dyn TokenVerifier> = Arc::new(HmacJwtVerifier::new(b"secret"));
        let specs = vec![MiddlewareSpec::Auth(AuthOptions {
            required: true,
            roles: vec![],
            check_all_roles: false,
        })];
        let pipeline = Pipeline::new(specs, vec![], vec![], counting_invoker(calls.clone()), Some(verifier)).unwrap();
        let resp = pipeline.run(ctx()).await;
        assert_eq!(resp.status(), http::StatusCode::UNAUTHORIZED);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn rate_limit_allows_then_rejects_third_request() {
        let calls = Arc::new(AtomicUsize::new(0));
        let specs = vec![MiddlewareSpec::RateLimit(RateLimitOptions {
            max: 2,
            window: Duration::from_secs(60),
            key_fn: None,
            skip_fn: None,
            standard_headers: true,
        })];
        let pipeline = Pipeline::new(specs, vec![], vec![], counting_invoker(calls.clone()), None).unwrap();
        let first = pipeline.run(ctx()).await;
        let second = pipeline.run(ctx()).await;
        let third = pipeline.run(ctx()).await;
        assert_eq!(first.status(), http::StatusCode::OK);
        assert_eq!(second.status(), http::StatusCode::OK);
        assert_eq!(third.status(), http::StatusCode::TOO_MANY_REQUESTS);
        assert!(third.headers().contains_key("retry-after"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn cors_preflight_short_circuits_with_204() {
        let calls = Arc::new(AtomicUsize::new(0));
        let specs = vec![MiddlewareSpec::Cors(r2e_core::CorsOptions::default())];
        let pipeline = Pipeline::new(specs, vec![], vec![], counting_invoker(calls.clone()), None).unwrap();
        let req = RequestContext::new(Method::OPTIONS, "/x".into(), http::HeaderMap::new(), "req-1".into());
        let resp = pipeline.run(req).await;
        assert_eq!(resp.status(), http::StatusCode::NO_CONTENT);
        assert!(resp.headers().contains_key("access-control-allow-origin"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
