//! Middleware Spec data model (§3 "Middleware Spec: `(type_tag,
//! options_bag)`", §4.4's recognized-types table). This crate owns the
//! declarative shape; `r2e-pipeline` owns the executor that interprets it.
//! Kept here (rather than in the pipeline crate) so `r2e-route`'s Route
//! Entry can carry a route's middleware specs without depending on the
//! pipeline crate — matching the leaves-first dependency order in §2.

use crate::config::CorsOptions;
use futures_util::future::BoxFuture;
use std::sync::Arc;

/// The continuation passed to a middleware step. Calling it consumes the
/// (possibly mutated) context and resolves to the final response once the
/// rest of the chain has run — the CPS encoding of §4.4's "the step MAY
/// call `next()` exactly zero or one time". A step that wants to inspect
/// the outcome (status, timing) after `next()` returns reads it off the
/// `Response`; the context itself is not handed back, matching how a
/// `tower`-style service consumes its request and returns only a response.
pub type NextFn<Ctx> = Box<dyn FnOnce(Ctx) -> BoxFuture<'static, crate::response::Response> + Send>;

/// User-supplied `custom` middleware (§4.4). Takes ownership of the
/// context for the duration of its run and must eventually either call
/// `next` or return a response of its own.
pub trait CustomMiddleware<Ctx>: Send + Sync {
    fn call(&self, ctx: Ctx, next: NextFn<Ctx>) -> BoxFuture<'static, crate::response::Response>;
}

/// `{log_requests, log_responses, log_body, excluded_headers[],
/// excluded_paths[]}` (§4.4 `logging`).
#[derive(Debug, Clone, Default)]
pub struct LoggingOptions {
    pub log_requests: bool,
    pub log_responses: bool,
    pub log_body: bool,
    pub excluded_headers: Vec<String>,
    pub excluded_paths: Vec<String>,
}

/// `{required, roles[], check_all_roles}` (§4.4 `auth`).
#[derive(Debug, Clone, Default)]
pub struct AuthOptions {
    pub required: bool,
    pub roles: Vec<String>,
    pub check_all_roles: bool,
}

/// A single validation rule: `target` names which part of the request it
/// applies to (`body`/`query`/`params`), `validate` reports either `Ok(())`
/// or a human-readable failure reason. Kept as a plain closure rather than
/// a schema-description type since JSON schema validation itself is an
/// external collaborator (§1) — the engine only owns *running* the rule
/// and turning a failure into a 400.
pub type ValidatorFn = Arc<dyn Fn(&serde_json::Value) -> Result<(), String> + Send + Sync>;

/// `{schema, body?, query?, params?, abort_early}` (§4.4 `validate`).
#[derive(Clone)]
pub struct ValidateOptions {
    pub body: Option<ValidatorFn>,
    pub query: Option<ValidatorFn>,
    pub params: Option<ValidatorFn>,
    pub abort_early: bool,
}

impl std::fmt::Debug for ValidateOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidateOptions")
            .field("body", &self.body.is_some())
            .field("query", &self.query.is_some())
            .field("params", &self.params.is_some())
            .field("abort_early", &self.abort_early)
            .finish()
    }
}

/// How the `rate_limit` middleware derives its per-request bucket key.
pub type RateLimitKeyFn = Arc<dyn Fn(&crate::context::RequestContext) -> String + Send + Sync>;
/// Optional escape hatch: when it returns `true` the request bypasses the
/// limiter entirely (§4.4 `skip_fn`).
pub type RateLimitSkipFn = Arc<dyn Fn(&crate::context::RequestContext) -> bool + Send + Sync>;

/// `{max, window, key_fn?, skip_fn?, standard_headers}` (§4.4 `rate_limit`).
#[derive(Clone)]
pub struct RateLimitOptions {
    pub max: u64,
    pub window: std::time::Duration,
    pub key_fn: Option<RateLimitKeyFn>,
    pub skip_fn: Option<RateLimitSkipFn>,
    pub standard_headers: bool,
}

impl std::fmt::Debug for RateLimitOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimitOptions")
            .field("max", &self.max)
            .field("window", &self.window)
            .field("key_fn", &self.key_fn.is_some())
            .field("skip_fn", &self.skip_fn.is_some())
            .field("standard_headers", &self.standard_headers)
            .finish()
    }
}

/// A Middleware Spec (§3): one of the six recognized `type_tag` values
/// from §4.4's table, carrying its own typed options bag.
#[derive(Clone)]
pub enum MiddlewareSpec {
    Cors(CorsOptions),
    Logging(LoggingOptions),
    Auth(AuthOptions),
    Validate(ValidateOptions),
    RateLimit(RateLimitOptions),
    Custom(Arc<dyn CustomMiddleware<crate::context::RequestContext>>),
}

impl std::fmt::Debug for MiddlewareSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MiddlewareSpec::Cors(o) => f.debug_tuple("Cors").field(o).finish(),
            MiddlewareSpec::Logging(o) => f.debug_tuple("Logging").field(o).finish(),
            MiddlewareSpec::Auth(o) => f.debug_tuple("Auth").field(o).finish(),
            MiddlewareSpec::Validate(o) => f.debug_tuple("Validate").field(o).finish(),
            MiddlewareSpec::RateLimit(o) => f.debug_tuple("RateLimit").field(o).finish(),
            MiddlewareSpec::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}
