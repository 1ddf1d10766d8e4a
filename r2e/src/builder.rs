//! `EngineBuilder` (spec.md §4.1-4.4): the single place that wires the
//! Container, Route Index, global middleware and per-route guards into one
//! immutable [`Engine`]. Mirrors the teacher's `.register(...)` / `.build()`
//! shape, just without the compile-time typestate — our container resolves
//! at runtime, so there is nothing for the builder to track at the type
//! level.

use http::Method;
use r2e_cache::InMemoryCache;
use r2e_container::{Container, ContainerError, Scope};
use r2e_core::{ContainerConfig, MiddlewareSpec, RouterConfig};
use r2e_handler::HandlerDescription;
use r2e_metrics::InMemoryMetrics;
use r2e_pipeline::{Guard, Pipeline, PipelineError};
use r2e_route::{RouteError, RouteIndex};
use r2e_security::TokenVerifier;
use std::collections::HashMap;
use std::sync::Arc;

/// Container identifiers the cache/metrics providers are registered under
/// by `with_cache`/`with_metrics`, and that handlers resolve them by.
pub const CACHE_IDENTIFIER: &str = "cache";
pub const METRICS_IDENTIFIER: &str = "metrics";

use crate::engine::Engine;

#[derive(Debug)]
pub enum BuildError {
    Route(RouteError),
    Pipeline(PipelineError),
}

impl std::fmt::Display for BuildError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuildError::Route(e) => write!(f, "{e}"),
            BuildError::Pipeline(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for BuildError {}

impl From<RouteError> for BuildError {
    fn from(e: RouteError) -> Self {
        BuildError::Route(e)
    }
}

impl From<PipelineError> for BuildError {
    fn from(e: PipelineError) -> Self {
        BuildError::Pipeline(e)
    }
}

/// Builds an [`Engine`]: routes and their own middleware/guards are
/// registered incrementally, global middleware and the token verifier are
/// set once, and `.build()` produces one compiled [`Pipeline`] per route
/// (spec.md §4.4 step 1: `global_mw ++ route_mw`, then guards, then invoker).
pub struct EngineBuilder {
    router_config: RouterConfig,
    container: Container,
    routes: RouteIndex,
    global_middleware: Vec<MiddlewareSpec>,
    guards: HashMap<(Method, String), Vec<Arc<dyn Guard>>>,
    token_verifier: Option<Arc<dyn TokenVerifier>>,
}

impl EngineBuilder {
    /// Wires `router_config.cors`/`enable_logging` into the global
    /// middleware chain automatically (§6 "The router accepts: `{cors:
    /// corsOptions?, enable_logging: bool, ...}`") — an embedder shouldn't
    /// have to call `use_middleware` twice to get what the config already
    /// says it wants. CORS goes first so its headers land on every
    /// response, including ones `logging` or later steps short-circuit.
    pub fn new(router_config: RouterConfig, container_config: ContainerConfig) -> Self {
        let mut global_middleware = Vec::new();
        if let Some(cors) = router_config.cors.clone() {
            global_middleware.push(MiddlewareSpec::Cors(cors));
        }
        if router_config.enable_logging {
            global_middleware.push(MiddlewareSpec::Logging(r2e_core::LoggingOptions {
                log_requests: true,
                log_responses: true,
                ..Default::default()
            }));
        }
        Self {
            container: Container::with_config(
                container_config.max_resolution_depth,
                container_config.detect_cycles,
                container_config.enable_debug,
            ),
            routes: RouteIndex::new(router_config.dev_mode),
            router_config,
            global_middleware,
            guards: HashMap::new(),
            token_verifier: None,
        }
    }

    /// Grants handlers access to the container built alongside this engine.
    pub fn container_mut(&mut self) -> &mut Container {
        &mut self.container
    }

    /// Middleware applied to every route ahead of that route's own specs
    /// (spec.md §4.4 step 1).
    pub fn use_middleware(&mut self, spec: MiddlewareSpec) -> &mut Self {
        self.global_middleware.push(spec);
        self
    }

    /// The verifier consulted by any `auth` middleware spec, global or
    /// per-route. Building with an `auth` spec and no verifier configured
    /// fails with [`PipelineError::MissingTokenVerifier`].
    pub fn with_token_verifier(&mut self, verifier: Arc<dyn TokenVerifier>) -> &mut Self {
        self.token_verifier = Some(verifier);
        self
    }

    /// Register a cache provider as a container singleton under
    /// [`CACHE_IDENTIFIER`] (spec.md §4.5: cache/metrics are sideband
    /// dependencies resolved via the container, not fields the pipeline
    /// reaches for directly).
    pub fn with_cache(&mut self, cache: InMemoryCache) -> Result<&mut Self, ContainerError> {
        self.container
            .register::<InMemoryCache, _>(CACHE_IDENTIFIER, Scope::Singleton, vec![], vec![], None, move |_, _| {
                Ok(cache.clone())
            })?;
        Ok(self)
    }

    /// Register a metrics provider as a container singleton under
    /// [`METRICS_IDENTIFIER`].
    pub fn with_metrics(&mut self, metrics: InMemoryMetrics) -> Result<&mut Self, ContainerError> {
        self.container.register::<InMemoryMetrics, _>(
            METRICS_IDENTIFIER,
            Scope::Singleton,
            vec![],
            vec![],
            None,
            move |_, _| Ok(metrics.clone()),
        )?;
        Ok(self)
    }

    /// Register one route (spec.md §4.2 steps 1-5). `base_path` is the
    /// class-level prefix joined with `pattern` before compilation.
    pub fn route(
        &mut self,
        method: Method,
        base_path: &str,
        pattern: &str,
        handler: HandlerDescription,
        middleware_specs: Vec<MiddlewareSpec>,
        guards: Vec<Arc<dyn Guard>>,
    ) -> Result<&mut Self, RouteError> {
        let full_path = r2e_route::join_base_path(base_path, pattern);
        self.routes
            .register(method.clone(), base_path, pattern, handler, middleware_specs)?;
        if !guards.is_empty() {
            self.guards.insert((method, full_path), guards);
        }
        Ok(self)
    }

    pub fn get(
        &mut self,
        pattern: &str,
        handler: HandlerDescription,
    ) -> Result<&mut Self, RouteError> {
        self.route(Method::GET, "", pattern, handler, vec![], vec![])
    }

    pub fn post(
        &mut self,
        pattern: &str,
        handler: HandlerDescription,
    ) -> Result<&mut Self, RouteError> {
        self.route(Method::POST, "", pattern, handler, vec![], vec![])
    }

    pub fn put(
        &mut self,
        pattern: &str,
        handler: HandlerDescription,
    ) -> Result<&mut Self, RouteError> {
        self.route(Method::PUT, "", pattern, handler, vec![], vec![])
    }

    pub fn delete(
        &mut self,
        pattern: &str,
        handler: HandlerDescription,
    ) -> Result<&mut Self, RouteError> {
        self.route(Method::DELETE, "", pattern, handler, vec![], vec![])
    }

    /// Compile one pipeline per registered route and freeze everything into
    /// an [`Engine`]. The route index itself is read-only from this point on
    /// (spec.md §5 "Route Index: build-phase mutable, read-only after
    /// server start").
    pub fn build(self) -> Result<Engine, BuildError> {
        let mut pipelines = HashMap::with_capacity(self.routes.len());
        for entry in self.routes.entries() {
            let key = (entry.method.clone(), entry.pattern.clone());
            let guards = self.guards.get(&key).cloned().unwrap_or_default();
            let pipeline = Pipeline::new(
                self.global_middleware.clone(),
                entry.middleware_specs.clone(),
                guards,
                entry.invoker.clone(),
                self.token_verifier.clone(),
            )?;
            pipelines.insert(key, pipeline);
        }
        Ok(Engine::new(
            self.router_config,
            self.container,
            self.routes,
            pipelines,
        ))
    }
}
