//! The accept loop (spec.md §5/§6): one `TcpListener`, one spawned task per
//! connection, hyper driving HTTP/1.1 (and HTTP/2 via its `auto` builder)
//! framing on top. Routing and middleware are entirely the caller's
//! business — we only ever call into the supplied [`Service`].

use crate::adapt::{self, BodyError};
use bytes::Bytes;
use futures_util::future::BoxFuture;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder;
use r2e_core::{AbortSignal, EngineError, ErrorKind, RequestContext, Response, RouterConfig};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

/// What the transport adapter calls for every fully-parsed request. The
/// facade crate implements this once, wiring route lookup and pipeline
/// execution behind it.
pub trait Service: Send + Sync + 'static {
    fn call(&self, ctx: RequestContext) -> BoxFuture<'static, Response>;
}

pub struct Server<S> {
    addr: SocketAddr,
    config: RouterConfig,
    service: Arc<S>,
}

impl<S: Service> Server<S> {
    pub fn new(addr: SocketAddr, config: RouterConfig, service: S) -> Self {
        Self {
            addr,
            config,
            service: Arc::new(service),
        }
    }

    pub async fn run(self) -> std::io::Result<()> {
        let listener = TcpListener::bind(self.addr).await?;
        tracing::info!(addr = %self.addr, "r2e transport listening");
        loop {
            let (stream, peer) = listener.accept().await?;
            let service = self.service.clone();
            let config = self.config.clone();
            tokio::spawn(async move {
                let io = TokioIo::new(stream);
                // One abort flag per connection, shared by every request
                // context built on it. `serve_connection` below drives both
                // the socket I/O and the in-flight handler in the same poll
                // loop, so an unexpected disconnect surfaces as this future
                // resolving to `Err` — at that point the handler task (run
                // independently, see below) is the only thing still able to
                // notice, via `conn_abort`.
                let conn_abort = AbortSignal::new();
                let abort_on_disconnect = conn_abort.clone();
                let conn_service = service_fn(move |req: hyper::Request<Incoming>| {
                    let service = service.clone();
                    let config = config.clone();
                    let conn_abort = conn_abort.clone();
                    async move {
                        let dev_mode = config.dev_mode;
                        let handler = tokio::spawn(handle(req, service, config, conn_abort));
                        let resp = handler.await.unwrap_or_else(|_| {
                            adapt::response_to_hyper(
                                EngineError::internal("request handler task panicked")
                                    .into_response(dev_mode),
                            )
                        });
                        Ok::<_, Infallible>(resp)
                    }
                });
                if let Err(err) = Builder::new(TokioExecutor::new())
                    .serve_connection(io, conn_service)
                    .await
                {
                    tracing::warn!(%peer, error = %err, "connection error");
                    abort_on_disconnect.abort();
                }
            });
        }
    }
}

async fn handle<S: Service>(
    req: hyper::Request<Incoming>,
    service: Arc<S>,
    config: RouterConfig,
    conn_abort: AbortSignal,
) -> hyper::Response<Full<Bytes>> {
    let request_id = uuid::Uuid::new_v4().to_string();
    let (parts, incoming) = req.into_parts();

    let body = match adapt::read_body(
        incoming,
        config.body_max_bytes,
        Duration::from_millis(config.body_timeout_ms),
    )
    .await
    {
        Ok(bytes) => bytes,
        Err(err) => return adapt::response_to_hyper(body_error_response(err, config.dev_mode)),
    };

    let ctx = adapt::context_from_request(&parts, Some(body), request_id.clone(), conn_abort);

    let resp = match tokio::time::timeout(
        Duration::from_millis(config.request_timeout_ms),
        service.call(ctx),
    )
    .await
    {
        Ok(resp) => resp,
        Err(_) => EngineError::timeout("request timed out")
            .with_code("REQUEST_TIMEOUT")
            .into_response(config.dev_mode),
    };

    adapt::response_to_hyper(resp)
}

fn body_error_response(err: BodyError, dev_mode: bool) -> Response {
    match err {
        BodyError::TooLarge => {
            EngineError::new(ErrorKind::PayloadTooLarge, "request body exceeds configured limit")
                .into_response(dev_mode)
        }
        BodyError::Timeout => EngineError::timeout("body read timed out")
            .with_code("BODY_TIMEOUT")
            .into_response(dev_mode),
        BodyError::Read(msg) => {
            EngineError::validation(format!("failed to read request body: {msg}")).into_response(dev_mode)
        }
    }
}
