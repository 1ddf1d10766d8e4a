//! Built-in middleware effects (spec.md §4.4's recognized-types table).
//! Each `MiddlewareSpec` is compiled once into a `CompiledStep` so stateful
//! collaborators (the rate limiter, the token verifier) are constructed a
//! single time rather than per request.

use futures_util::future::BoxFuture;
use http::{HeaderValue, Method, StatusCode};
use r2e_core::{AuthOptions, CustomMiddleware, LoggingOptions, NextFn, RequestContext, Response, ValidateOptions};
use r2e_rate_limit::FixedWindowLimiter;
use r2e_security::TokenVerifier;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

pub enum CompiledStep {
    Cors(r2e_core::CorsOptions),
    Logging(LoggingOptions),
    Auth {
        options: AuthOptions,
        verifier: Arc<dyn TokenVerifier>,
    },
    Validate(ValidateOptions),
    RateLimit {
        options: r2e_core::RateLimitOptions,
        limiter: FixedWindowLimiter,
    },
    Custom(Arc<dyn CustomMiddleware<RequestContext>>),
}

fn params_to_value<'a>(iter: impl Iterator<Item = (&'a str, &'a str)>) -> serde_json::Value {
    let map: serde_json::Map<String, serde_json::Value> = iter
        .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.to_string())))
        .collect();
    serde_json::Value::Object(map)
}

fn query_to_value(query: &std::collections::HashMap<String, String>) -> serde_json::Value {
    let map: serde_json::Map<String, serde_json::Value> = query
        .iter()
        .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
        .collect();
    serde_json::Value::Object(map)
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Run one compiled step: apply its effect, then either finalize a
/// response (short-circuit) or delegate to `next` (§4.4 execution model).
pub async fn run_step(step: &CompiledStep, ctx: RequestContext, next: NextFn<RequestContext>) -> Response {
    match step {
        CompiledStep::Cors(opts) => run_cors(opts, ctx, next).await,
        CompiledStep::Logging(opts) => run_logging(opts, ctx, next).await,
        CompiledStep::Auth { options, verifier } => run_auth(options, verifier, ctx, next).await,
        CompiledStep::Validate(opts) => run_validate(opts, ctx, next).await,
        CompiledStep::RateLimit { options, limiter } => run_rate_limit(options, limiter, ctx, next).await,
        CompiledStep::Custom(mw) => mw.call(ctx, next).await,
    }
}

async fn run_cors(opts: &r2e_core::CorsOptions, ctx: RequestContext, next: NextFn<RequestContext>) -> Response {
    let is_preflight = ctx.method == Method::OPTIONS;
    if is_preflight {
        let mut resp = r2e_core::response::empty(StatusCode::NO_CONTENT);
        apply_cors_headers(opts, &mut resp);
        return resp;
    }
    let mut resp = next(ctx).await;
    apply_cors_headers(opts, &mut resp);
    resp
}

fn apply_cors_headers(opts: &r2e_core::CorsOptions, resp: &mut Response) {
    let headers = resp.headers_mut();
    if let Ok(origin) = HeaderValue::from_str(&opts.origin) {
        headers.insert("access-control-allow-origin", origin);
    }
    if !opts.methods.is_empty() {
        if let Ok(v) = HeaderValue::from_str(&opts.methods.join(", ")) {
            headers.insert("access-control-allow-methods", v);
        }
    }
    if !opts.allowed_headers.is_empty() {
        if let Ok(v) = HeaderValue::from_str(&opts.allowed_headers.join(", ")) {
            headers.insert("access-control-allow-headers", v);
        }
    }
    if opts.credentials {
        headers.insert("access-control-allow-credentials", HeaderValue::from_static("true"));
    }
    if let Some(max_age) = opts.max_age {
        if let Ok(v) = HeaderValue::from_str(&max_age.to_string()) {
            headers.insert("access-control-max-age", v);
        }
    }
}

async fn run_logging(opts: &LoggingOptions, ctx: RequestContext, next: NextFn<RequestContext>) -> Response {
    let excluded = opts.excluded_paths.iter().any(|p| p == &ctx.url);
    if excluded {
        return next(ctx).await;
    }
    let method = ctx.method.clone();
    let url = ctx.url.clone();
    let request_id = ctx.request_id.clone();
    let start = ctx.start_time;
    if opts.log_requests {
        tracing::info!(%method, %url, %request_id, "request started");
    }
    let resp = next(ctx).await;
    if opts.log_responses {
        let elapsed = start.elapsed();
        tracing::info!(
            %method, %url, %request_id,
            status = resp.status().as_u16(),
            elapsed_ms = elapsed.as_millis() as u64,
            "request finished"
        );
    }
    resp
}

async fn run_auth(
    options: &AuthOptions,
    verifier: &Arc<dyn TokenVerifier>,
    mut ctx: RequestContext,
    next: NextFn<RequestContext>,
) -> Response {
    let header = ctx.headers.get(http::header::AUTHORIZATION).and_then(|v| v.to_str().ok());
    let token = match header {
        Some(h) => match h.strip_prefix("Bearer ") {
            Some(t) => t,
            None => {
                if !options.required {
                    return next(ctx).await;
                }
                return r2e_core::EngineError::from(r2e_security::SecurityError::InvalidAuthScheme)
                    .into_response(false);
            }
        },
        None => {
            if !options.required {
                return next(ctx).await;
            }
            return r2e_core::EngineError::from(r2e_security::SecurityError::MissingAuthHeader)
                .into_response(false);
        }
    };

    match verifier.verify(token) {
        Ok(principal) => {
            if !principal.satisfies(&options.roles, options.check_all_roles) {
                return r2e_core::EngineError::authorization("insufficient role")
                    .with_code("FORBIDDEN")
                    .into_response(false);
            }
            ctx.data.insert(principal);
            next(ctx).await
        }
        Err(err) => r2e_core::EngineError::from(err).into_response(false),
    }
}

async fn run_validate(opts: &ValidateOptions, ctx: RequestContext, next: NextFn<RequestContext>) -> Response {
    let mut failures = Vec::new();

    if let Some(validator) = &opts.body {
        let value = match &ctx.body {
            Some(bytes) => match serde_json::from_slice::<serde_json::Value>(bytes) {
                Ok(v) => v,
                Err(e) => {
                    failures.push(format!("body is not valid JSON: {e}"));
                    serde_json::Value::Null
                }
            },
            None => serde_json::Value::Null,
        };
        if let Err(reason) = validator(&value) {
            failures.push(reason);
            if opts.abort_early {
                return validation_response(&failures);
            }
        }
    }

    if let Some(validator) = &opts.query {
        let value = query_to_value(&ctx.query);
        if let Err(reason) = validator(&value) {
            failures.push(reason);
            if opts.abort_early {
                return validation_response(&failures);
            }
        }
    }

    if let Some(validator) = &opts.params {
        let value = params_to_value(ctx.path_params.iter());
        if let Err(reason) = validator(&value) {
            failures.push(reason);
            if opts.abort_early {
                return validation_response(&failures);
            }
        }
    }

    if !failures.is_empty() {
        return validation_response(&failures);
    }
    next(ctx).await
}

fn validation_response(failures: &[String]) -> Response {
    r2e_core::EngineError::validation(failures.join("; ")).into_response(false)
}

async fn run_rate_limit(
    options: &r2e_core::RateLimitOptions,
    limiter: &FixedWindowLimiter,
    ctx: RequestContext,
    next: NextFn<RequestContext>,
) -> Response {
    if let Some(skip) = &options.skip_fn {
        if skip(&ctx) {
            return next(ctx).await;
        }
    }
    let key = match &options.key_fn {
        Some(key_fn) => key_fn(&ctx),
        None => ctx
            .headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("global")
            .to_string(),
    };
    let decision = limiter.check(&key);

    if !decision.allowed {
        let retry_after = decision.reset_at.saturating_sub(unix_now()).max(1);
        let mut resp = r2e_core::EngineError::rate_limit("rate limit exceeded")
            .with_code("RATE_LIMIT_EXCEEDED")
            .into_response(false);
        if options.standard_headers {
            set_rate_limit_headers(&mut resp, &decision, retry_after);
        }
        return resp;
    }

    let mut resp = next(ctx).await;
    if options.standard_headers {
        let retry_after = decision.reset_at.saturating_sub(unix_now());
        set_rate_limit_headers(&mut resp, &decision, retry_after);
    }
    resp
}

fn set_rate_limit_headers(resp: &mut Response, decision: &r2e_rate_limit::RateLimitDecision, retry_after: u64) {
    let headers = resp.headers_mut();
    if !decision.allowed {
        if let Ok(v) = HeaderValue::from_str(&retry_after.to_string()) {
            headers.insert("retry-after", v);
        }
    }
    if let Ok(v) = HeaderValue::from_str(&decision.limit.to_string()) {
        headers.insert("x-ratelimit-limit", v);
    }
    if let Ok(v) = HeaderValue::from_str(&decision.remaining.to_string()) {
        headers.insert("x-ratelimit-remaining", v);
    }
    if let Ok(v) = HeaderValue::from_str(&decision.reset_at.to_string()) {
        headers.insert("x-ratelimit-reset", v);
    }
}
