//! In-process test harness for R2E engines: drive requests straight into a
//! built [`r2e::Engine`] and mint JWTs the engine's `auth` middleware will
//! accept, without a TCP listener or a real identity provider.

mod app;
mod jwt;

pub use app::{resolve_path, tokenize_path, PathToken, TestApp, TestRequest, TestResponse};
pub use jwt::{TestJwt, TokenBuilder, TEST_SECRET};
