//! C2 Route Index & Pattern Compiler (spec.md §4.2).

mod index;
mod pattern;

pub use index::{RouteEntry, RouteError, RouteIndex};
pub use pattern::{compile, join_base_path, CompiledPattern};
