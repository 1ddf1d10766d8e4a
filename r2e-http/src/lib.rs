//! Transport adapter (spec.md §6): owns the hyper server loop, the wire
//! parsing of `method`/`url`/`headers`/`body` into a [`RequestContext`], and
//! writing an `r2e_core::Response` back onto the socket. Knows nothing about
//! routing or middleware — it drives whatever [`Service`] the embedding
//! facade supplies.

mod adapt;
mod server;

pub use adapt::BodyError;
pub use server::{Server, Service};
