//! C3 Handler Specializer (spec.md §4.3): turns declarative Handler
//! Descriptions into Specialized Invokers at registration time.

mod description;
mod invoker;

pub use description::{HandlerDescription, HandlerFn, HandlerResult};
pub use invoker::{SpecializedInvoker, Specializer};
