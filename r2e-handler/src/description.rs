//! Handler Description (spec.md §3/§4.3): the four declarative shapes a
//! route can bind to, before specialization turns them into invokers.

use futures_util::future::BoxFuture;
use r2e_core::RequestContext;
use std::sync::Arc;

pub type HandlerResult = Result<serde_json::Value, r2e_core::EngineError>;

/// A handler function: takes the (already parameter-populated) request
/// context by value and produces a JSON value for auto-serialization, or a
/// typed error for the §7 normalizer to map.
pub type HandlerFn = Arc<dyn Fn(RequestContext) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// A Handler Description (§3). `StaticFn` and `DynamicFn` carry the same
/// function shape — the context always carries whatever path params the
/// router extracted — the variants only record the author's declared
/// intent, matching the four names the spec enumerates.
#[derive(Clone)]
pub enum HandlerDescription {
    ConstString(String),
    ConstJson(serde_json::Value),
    StaticFn(HandlerFn),
    DynamicFn(HandlerFn),
}

impl std::fmt::Debug for HandlerDescription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HandlerDescription::ConstString(s) => f.debug_tuple("ConstString").field(s).finish(),
            HandlerDescription::ConstJson(v) => f.debug_tuple("ConstJson").field(v).finish(),
            HandlerDescription::StaticFn(_) => write!(f, "StaticFn(..)"),
            HandlerDescription::DynamicFn(_) => write!(f, "DynamicFn(..)"),
        }
    }
}
