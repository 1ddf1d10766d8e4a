//! The built, immutable [`Engine`] (spec.md §4.2 Lookup, §5, §6). Implements
//! [`r2e_http::Service`] so it can be handed directly to the transport
//! adapter's accept loop, and exposes `.serve(addr)` as the one call most
//! embedding binaries need.

use futures_util::future::BoxFuture;
use http::Method;
use r2e_container::Container;
use r2e_core::{EngineError, RequestContext, Response, RouterConfig};
use r2e_pipeline::Pipeline;
use r2e_route::RouteIndex;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

struct EngineInner {
    config: RouterConfig,
    container: Container,
    routes: RouteIndex,
    pipelines: HashMap<(Method, String), Pipeline>,
}

/// A fully built engine: read-only route index, one precompiled pipeline
/// per route, and the container handlers resolve services from. Cheap to
/// clone — everything inside is `Arc`-shared.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

impl Engine {
    pub(crate) fn new(
        config: RouterConfig,
        container: Container,
        routes: RouteIndex,
        pipelines: HashMap<(Method, String), Pipeline>,
    ) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                config,
                container,
                routes,
                pipelines,
            }),
        }
    }

    pub fn route_count(&self) -> usize {
        self.inner.routes.len()
    }

    pub fn container(&self) -> &Container {
        &self.inner.container
    }

    pub fn config(&self) -> &RouterConfig {
        &self.inner.config
    }

    /// Bind a listener and serve until `ctrl_c`/`SIGTERM`, whichever comes
    /// first (graceful shutdown, same signal pair the teacher's builder
    /// waits on in `shutdown_signal()`).
    pub async fn serve(self, addr: SocketAddr) -> std::io::Result<()> {
        let config = self.inner.config.clone();
        let server = r2e_http::Server::new(addr, config, self);
        tokio::select! {
            result = server.run() => result,
            _ = shutdown_signal() => {
                tracing::info!("shutdown signal received, draining connections");
                Ok(())
            }
        }
    }

    fn dispatch(&self, mut ctx: RequestContext) -> BoxFuture<'static, Response> {
        let path = ctx.url.split('?').next().unwrap_or(&ctx.url).to_string();
        let Some((entry, params)) = self.inner.routes.lookup(&ctx.method, &path) else {
            let dev_mode = self.inner.config.dev_mode;
            return Box::pin(async move {
                EngineError::not_found(format!("no route matched {path}")).into_response(dev_mode)
            });
        };
        ctx.path_params = params;
        ctx.route_pattern = Some(entry.pattern.clone());
        let key = (entry.method.clone(), entry.pattern.clone());
        let pipeline = self
            .inner
            .pipelines
            .get(&key)
            .expect("every route index entry has a compiled pipeline")
            .clone();
        pipeline.run(ctx)
    }
}

impl r2e_http::Service for Engine {
    fn call(&self, ctx: RequestContext) -> BoxFuture<'static, Response> {
        self.dispatch(ctx)
    }
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut term = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {},
        _ = term.recv() => {},
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
