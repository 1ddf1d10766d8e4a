//! R2E — a high-throughput HTTP routing and request-processing engine.
//!
//! This facade crate glues the five components (Container, Route Index,
//! Handler Specializer, Middleware/Guard Pipeline, Cache & Metrics
//! providers) and the hyper transport adapter behind one [`EngineBuilder`].
//! Pull in everything with:
//!
//! ```ignore
//! use r2e::prelude::*;
//! ```

mod builder;
mod engine;

pub use builder::{BuildError, EngineBuilder, CACHE_IDENTIFIER, METRICS_IDENTIFIER};
pub use engine::Engine;

/// Unified prelude — `use r2e::prelude::*` for the types most embedding
/// applications touch: request/response, errors, middleware specs, handler
/// descriptions, guards and the builder itself.
pub mod prelude {
    pub use crate::{BuildError, Engine, EngineBuilder, CACHE_IDENTIFIER, METRICS_IDENTIFIER};
    pub use r2e_cache::{CacheStore, InMemoryCache};
    pub use r2e_container::{Container, ContainerError, Scope};
    pub use r2e_core::{
        AuthOptions, ContainerConfig, CorsOptions, CustomMiddleware, EngineError, ErrorKind,
        LoggingOptions, MiddlewareSpec, RateLimitOptions, RequestContext, Response, RouterConfig,
        ValidateOptions,
    };
    pub use r2e_handler::{HandlerDescription, HandlerFn, HandlerResult};
    pub use r2e_metrics::InMemoryMetrics;
    pub use r2e_pipeline::{FnGuard, Guard, GuardOutcome};
    pub use r2e_security::{HmacJwtVerifier, Principal, TokenVerifier};
}
