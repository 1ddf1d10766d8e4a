//! JWT principal verification and role checks backing the `auth` middleware
//! (spec.md §4.4). The JWT library itself is treated as a pure function
//! (spec.md §1); this crate is the seam between it and the engine's types.

mod error;
mod identity;
mod jwt;

pub use error::SecurityError;
pub use identity::Principal;
pub use jwt::{HmacJwtVerifier, TokenVerifier};
