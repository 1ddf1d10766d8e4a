//! Shared types for the R2E routing engine core: request context, response
//! helpers and the error taxonomy. Every other crate in the workspace
//! depends on this one and nothing else in the opposite direction.

pub mod config;
pub mod context;
pub mod error;
pub mod middleware;
pub mod response;

pub use config::{ContainerConfig, CorsOptions, RouterConfig};
pub use context::{AbortSignal, Extensions, PathParams, RequestContext};
pub use error::{EngineError, ErrorKind};
pub use middleware::{
    AuthOptions, CustomMiddleware, LoggingOptions, MiddlewareSpec, NextFn, RateLimitKeyFn,
    RateLimitOptions, RateLimitSkipFn, ValidateOptions, ValidatorFn,
};
pub use response::Response;
