//! Route Index (spec.md §3/§4.2): the two-tier `static_map`/`dynamic_list`
//! lookup structure and its registration/lookup operations.

use crate::pattern::{self, CompiledPattern};
use http::Method;
use r2e_core::{MiddlewareSpec, PathParams};
use r2e_handler::{HandlerDescription, SpecializedInvoker, Specializer};
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub enum RouteError {
    DuplicateRoute { method: Method, path: String },
}

impl std::fmt::Display for RouteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RouteError::DuplicateRoute { method, path } => {
                write!(f, "route already registered: {method} {path}")
            }
        }
    }
}

impl std::error::Error for RouteError {}

impl From<RouteError> for r2e_core::EngineError {
    fn from(err: RouteError) -> Self {
        r2e_core::EngineError::internal(err.to_string())
    }
}

/// `(method, pattern, compiled_regex?, param_names[], handler_ref,
/// middleware_specs[])` (§3 Route Entry). Immutable after construction.
#[derive(Clone)]
pub struct RouteEntry {
    pub method: Method,
    pub pattern: String,
    pub invoker: SpecializedInvoker,
    pub middleware_specs: Vec<MiddlewareSpec>,
    compiled: CompiledPattern,
}

impl RouteEntry {
    pub fn is_static(&self) -> bool {
        self.compiled.is_static()
    }
}

/// The two-tier route index. Built during server startup; read-only once
/// requests start arriving (§5 "Route Index: build-phase mutable, read-only
/// after server start").
#[derive(Default)]
pub struct RouteIndex {
    static_map: HashMap<String, RouteEntry>,
    dynamic_list: Vec<RouteEntry>,
    specializer: Specializer,
}

fn static_key(method: &Method, path: &str) -> String {
    format!("{method}:{path}")
}

impl RouteIndex {
    pub fn new(dev_mode: bool) -> Self {
        Self {
            static_map: HashMap::new(),
            dynamic_list: Vec::new(),
            specializer: Specializer::new(dev_mode),
        }
    }

    /// Register `(method, pattern, handler_desc, mw_specs)` under an
    /// optional class-level base path (§4.2 steps 1-5).
    pub fn register(
        &mut self,
        method: Method,
        base_path: &str,
        pattern: &str,
        handler_desc: HandlerDescription,
        middleware_specs: Vec<MiddlewareSpec>,
    ) -> Result<(), RouteError> {
        let full_path = pattern::join_base_path(base_path, pattern);
        let compiled = pattern::compile(&full_path);

        if compiled.is_static() {
            let key = static_key(&method, &full_path);
            if self.static_map.contains_key(&key) {
                tracing::warn!(%method, path = %full_path, "duplicate static route registration rejected");
                return Err(RouteError::DuplicateRoute {
                    method,
                    path: full_path,
                });
            }
        } else if self
            .dynamic_list
            .iter()
            .any(|e| e.method == method && e.pattern == full_path)
        {
            tracing::warn!(%method, path = %full_path, "duplicate dynamic route registration rejected");
            return Err(RouteError::DuplicateRoute {
                method,
                path: full_path,
            });
        }

        let invoker = self.specializer.specialize(&method, &full_path, handler_desc);
        let entry = RouteEntry {
            method: method.clone(),
            pattern: full_path.clone(),
            invoker,
            middleware_specs,
            compiled: compiled.clone(),
        };

        if compiled.is_static() {
            tracing::info!(%method, path = %full_path, "registered static route");
            self.static_map.insert(static_key(&method, &full_path), entry);
        } else {
            tracing::info!(%method, path = %full_path, "registered dynamic route");
            self.dynamic_list.push(entry);
        }
        Ok(())
    }

    /// Given `(method, url)`: probe `static_map` first, then walk
    /// `dynamic_list` in registration order (§4.2 Lookup).
    pub fn lookup(&self, method: &Method, path: &str) -> Option<(&RouteEntry, PathParams)> {
        if let Some(entry) = self.static_map.get(&static_key(method, path)) {
            return Some((entry, PathParams::new()));
        }
        for entry in &self.dynamic_list {
            if entry.method != *method {
                continue;
            }
            let CompiledPattern::Dynamic { regex, param_names } = &entry.compiled else {
                continue;
            };
            if let Some(caps) = regex.captures(path) {
                let mut params = PathParams::new();
                for (i, name) in param_names.iter().enumerate() {
                    if let Some(m) = caps.get(i + 1) {
                        params.insert(name.clone(), m.as_str().to_string());
                    }
                }
                return Some((entry, params));
            }
        }
        None
    }

    pub fn len(&self) -> usize {
        self.static_map.len() + self.dynamic_list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every registered entry, static and dynamic, in no particular order.
    /// Used at build time to wire one pipeline per route without the index
    /// itself needing to know what a pipeline is.
    pub fn entries(&self) -> impl Iterator<Item = &RouteEntry> {
        self.static_map.values().chain(self.dynamic_list.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn desc() -> HandlerDescription {
        HandlerDescription::ConstString("ok".into())
    }

    #[test]
    fn static_route_round_trips() {
        let mut idx = RouteIndex::new(false);
        idx.register(Method::GET, "", "/health", desc(), vec![]).unwrap();
        let (entry, params) = idx.lookup(&Method::GET, "/health").unwrap();
        assert!(entry.is_static());
        assert!(params.is_empty());
    }

    #[test]
    fn duplicate_static_registration_fails() {
        let mut idx = RouteIndex::new(false);
        idx.register(Method::GET, "", "/health", desc(), vec![]).unwrap();
        let err = idx.register(Method::GET, "", "/health", desc(), vec![]).unwrap_err();
        assert!(matches!(err, RouteError::DuplicateRoute { .. }));
    }

    #[test]
    fn duplicate_dynamic_registration_fails() {
        let mut idx = RouteIndex::new(false);
        idx.register(Method::GET, "", "/users/:id", desc(), vec![]).unwrap();
        let err = idx
            .register(Method::GET, "", "/users/:id", desc(), vec![])
            .unwrap_err();
        assert!(matches!(err, RouteError::DuplicateRoute { .. }));
    }

    #[test]
    fn static_beats_dynamic_unconditionally() {
        let mut idx = RouteIndex::new(false);
        idx.register(Method::GET, "", "/users/:id", desc(), vec![]).unwrap();
        idx.register(Method::GET, "", "/users/me", desc(), vec![]).unwrap();
        let (entry, params) = idx.lookup(&Method::GET, "/users/me").unwrap();
        assert!(entry.is_static());
        assert!(params.is_empty());
    }

    #[test]
    fn dynamic_lookup_extracts_params_in_order() {
        let mut idx = RouteIndex::new(false);
        idx.register(
            Method::GET,
            "",
            "/users/:user_id/posts/:post_id",
            desc(),
            vec![],
        )
        .unwrap();
        let (_, params) = idx.lookup(&Method::GET, "/users/7/posts/99").unwrap();
        assert_eq!(params.get("user_id"), Some("7"));
        assert_eq!(params.get("post_id"), Some("99"));
    }

    #[test]
    fn first_registered_dynamic_route_wins_on_tie() {
        let mut idx = RouteIndex::new(false);
        idx.register(
            Method::GET,
            "",
            "/items/:id",
            HandlerDescription::ConstString("first".into()),
            vec![],
        )
        .unwrap();
        idx.register(
            Method::GET,
            "",
            "/items/:slug",
            HandlerDescription::ConstString("second".into()),
            vec![],
        )
        .unwrap();
        let (entry, _) = idx.lookup(&Method::GET, "/items/42").unwrap();
        assert_eq!(entry.pattern, "/items/:id");
    }

    #[test]
    fn base_path_is_joined_with_single_slash() {
        let mut idx = RouteIndex::new(false);
        idx.register(Method::GET, "/api/", "/users", desc(), vec![]).unwrap();
        assert!(idx.lookup(&Method::GET, "/api/users").is_some());
    }

    #[test]
    fn no_match_returns_none() {
        let idx = RouteIndex::new(false);
        assert!(idx.lookup(&Method::GET, "/nope").is_none());
    }

    #[test]
    fn empty_segment_fails_required_param_match() {
        let mut idx = RouteIndex::new(false);
        idx.register(Method::GET, "", "/users/:id", desc(), vec![]).unwrap();
        assert!(idx.lookup(&Method::GET, "/users//").is_none());
    }

    #[test]
    fn different_methods_on_same_path_are_distinct_entries() {
        let mut idx = RouteIndex::new(false);
        idx.register(Method::GET, "", "/health", desc(), vec![]).unwrap();
        idx.register(Method::POST, "", "/health", desc(), vec![]).unwrap();
        assert_eq!(idx.len(), 2);
        assert!(idx.lookup(&Method::GET, "/health").is_some());
        assert!(idx.lookup(&Method::POST, "/health").is_some());
    }

    #[test]
    fn entries_iterates_both_tiers() {
        let mut idx = RouteIndex::new(false);
        idx.register(Method::GET, "", "/health", desc(), vec![]).unwrap();
        idx.register(Method::GET, "", "/users/:id", desc(), vec![]).unwrap();
        assert_eq!(idx.entries().count(), 2);
    }

    #[test]
    fn route_entry_carries_middleware_specs() {
        let mut idx = RouteIndex::new(false);
        let auth = MiddlewareSpec::Auth(r2e_core::AuthOptions {
            required: true,
            roles: vec!["admin".into()],
            check_all_roles: false,
        });
        idx.register(Method::GET, "", "/admin", desc(), vec![auth]).unwrap();
        let (entry, _) = idx.lookup(&Method::GET, "/admin").unwrap();
        assert_eq!(entry.middleware_specs.len(), 1);
    }

    #[test]
    fn dynamic_fn_receives_extracted_params_via_context() {
        let f: r2e_handler::HandlerFn = Arc::new(|ctx: r2e_core::RequestContext| {
            Box::pin(async move {
                Ok(serde_json::json!({
                    "userId": ctx.path_params.get("user_id").unwrap_or(""),
                    "postId": ctx.path_params.get("post_id").unwrap_or(""),
                }))
            })
        });
        let mut idx = RouteIndex::new(false);
        idx.register(
            Method::GET,
            "",
            "/user/:user_id/posts/:post_id",
            HandlerDescription::DynamicFn(f),
            vec![],
        )
        .unwrap();
        let (entry, params) = idx.lookup(&Method::GET, "/user/42/posts/7").unwrap();
        assert_eq!(params.get("user_id"), Some("42"));
        let mut ctx = r2e_core::RequestContext::new(
            Method::GET,
            "/user/42/posts/7".into(),
            http::HeaderMap::new(),
            "req-1".into(),
        );
        ctx.path_params = params;
        let _ = entry.invoker.clone();
    }
}
