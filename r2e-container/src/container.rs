//! The dependency-injection container (§4.1).

use crate::error::ContainerError;
use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Lifetime policy of a registered service (§3 Service Registration).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Constructed on first resolve, cached for the container's lifetime.
    Singleton,
    /// Constructed fresh on every resolve.
    Transient,
    /// One instance per resolution root, shared within that root's tree.
    Scoped,
}

type Erased = Arc<dyn Any + Send + Sync>;
type Factory = Arc<dyn Fn(&Container, &mut ResolveContext) -> Result<Erased, ContainerError> + Send + Sync>;
type Condition = Arc<dyn Fn() -> bool + Send + Sync>;

#[derive(Clone)]
struct Registration {
    factory: Factory,
    scope: Scope,
    tags: Vec<String>,
    #[allow(dead_code)]
    dependencies: Vec<String>,
    condition: Option<Condition>,
}

/// Per-resolution-root bookkeeping: the path of identifiers currently being
/// resolved (for cycle detection) and the scoped-instance cache for this
/// root (§4.1 "Resolution context carries `{path[], depth, scoped_instances}`").
pub struct ResolveContext {
    path: Vec<String>,
    max_depth: usize,
    scoped: HashMap<String, Erased>,
}

impl ResolveContext {
    fn push(&mut self, id: &str) {
        self.path.push(id.to_string());
    }

    fn pop(&mut self) {
        self.path.pop();
    }
}

/// The DI container. Cheap to clone (everything is behind `Arc`/`Mutex`);
/// `child()` is the supported way to derive an isolated singleton scope.
#[derive(Clone)]
pub struct Container {
    registrations: Arc<Mutex<HashMap<String, Registration>>>,
    order: Arc<Mutex<Vec<String>>>,
    singletons: Arc<Mutex<HashMap<String, Erased>>>,
    /// Per-identifier build guard: held across the whole singleton factory
    /// call (not just the cache check/insert) so two threads racing to
    /// resolve the same not-yet-built singleton don't both invoke the
    /// factory (§5 "exactly-once construction even if the implementation
    /// uses threads").
    build_locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
    max_resolution_depth: usize,
    /// §6 `ContainerConfig.detect_cycles`: when false, `resolve_internal`
    /// skips the path-stack cycle check and relies on `max_resolution_depth`
    /// alone to bound a truly circular resolution (as `DepthExceeded`
    /// rather than `CircularDependency`).
    detect_cycles: bool,
    /// §6 `ContainerConfig.enable_debug`: gates the registration/resolution
    /// `tracing::debug!` calls below.
    enable_debug: bool,
}

impl Container {
    /// Construct with cycle detection on and debug logging off — the
    /// common case for tests and callers that don't thread a full
    /// `ContainerConfig` through. `EngineBuilder` uses
    /// [`Container::with_config`] instead.
    pub fn new(max_resolution_depth: usize) -> Self {
        Self::with_config(max_resolution_depth, true, false)
    }

    pub fn with_config(max_resolution_depth: usize, detect_cycles: bool, enable_debug: bool) -> Self {
        Self {
            registrations: Arc::new(Mutex::new(HashMap::new())),
            order: Arc::new(Mutex::new(Vec::new())),
            singletons: Arc::new(Mutex::new(HashMap::new())),
            build_locks: Arc::new(Mutex::new(HashMap::new())),
            max_resolution_depth,
            detect_cycles,
            enable_debug,
        }
    }

    /// Register a factory under `identifier`. Overwrites any prior
    /// registration for the same identifier and drops its cached singleton.
    pub fn register<T, F>(
        &self,
        identifier: impl Into<String>,
        scope: Scope,
        dependencies: Vec<String>,
        tags: Vec<String>,
        condition: Option<Condition>,
        factory: F,
    ) -> Result<(), ContainerError>
    where
        T: Send + Sync + 'static,
        F: Fn(&Container, &mut ResolveContext) -> Result<T, ContainerError> + Send + Sync + 'static,
    {
        let identifier = identifier.into();
        if identifier.trim().is_empty() {
            return Err(ContainerError::InvalidRegistration(
                "identifier must not be empty".to_string(),
            ));
        }
        let erased_factory: Factory = Arc::new(move |container, ctx| {
            factory(container, ctx).map(|value| Arc::new(value) as Erased)
        });
        let registration = Registration {
            factory: erased_factory,
            scope,
            tags,
            dependencies,
            condition,
        };
        if self.enable_debug {
            tracing::debug!(identifier = %identifier, scope = ?scope, "registering service");
        }
        self.registrations
            .lock()
            .unwrap()
            .insert(identifier.clone(), registration);
        self.singletons.lock().unwrap().remove(&identifier);
        let mut order = self.order.lock().unwrap();
        if !order.contains(&identifier) {
            order.push(identifier);
        }
        Ok(())
    }

    /// Resolve `identifier` to a typed instance, constructing (or reusing a
    /// cached singleton) as dictated by its registered scope.
    pub fn resolve<T: Send + Sync + 'static>(
        &self,
        identifier: &str,
    ) -> Result<Arc<T>, ContainerError> {
        let mut ctx = ResolveContext {
            path: Vec::new(),
            max_depth: self.max_resolution_depth,
            scoped: HashMap::new(),
        };
        let erased = self.resolve_internal(identifier, &mut ctx)?;
        erased.downcast::<T>().map_err(|_| {
            ContainerError::InvalidRegistration(format!(
                "registered type for '{identifier}' does not match requested type"
            ))
        })
    }

    /// Like `resolve`, but `ServiceNotFound` becomes `Ok(None)` instead of
    /// an error; every other failure still propagates.
    pub fn try_resolve<T: Send + Sync + 'static>(
        &self,
        identifier: &str,
    ) -> Result<Option<Arc<T>>, ContainerError> {
        match self.resolve::<T>(identifier) {
            Ok(v) => Ok(Some(v)),
            Err(ContainerError::ServiceNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Every instance whose registration tags contain `tag`, in registration
    /// order.
    pub fn resolve_by_tag<T: Send + Sync + 'static>(
        &self,
        tag: &str,
    ) -> Result<Vec<Arc<T>>, ContainerError> {
        let ids: Vec<String> = {
            let order = self.order.lock().unwrap();
            let regs = self.registrations.lock().unwrap();
            order
                .iter()
                .filter(|id| {
                    regs.get(*id)
                        .map(|r| r.tags.iter().any(|t| t == tag))
                        .unwrap_or(false)
                })
                .cloned()
                .collect()
        };
        ids.iter().map(|id| self.resolve::<T>(id)).collect()
    }

    /// Resolve a dependency from inside another service's factory, sharing
    /// the caller's `ResolveContext` so the path/depth tracking that
    /// detects circular dependencies spans the whole resolution tree. This
    /// is the method factory closures should call — `resolve`/`try_resolve`
    /// always start a fresh root context and are for top-level callers.
    pub fn resolve_dependency<T: Send + Sync + 'static>(
        &self,
        identifier: &str,
        ctx: &mut ResolveContext,
    ) -> Result<Arc<T>, ContainerError> {
        let erased = self.resolve_internal(identifier, ctx)?;
        erased.downcast::<T>().map_err(|_| {
            ContainerError::InvalidRegistration(format!(
                "registered type for '{identifier}' does not match requested type"
            ))
        })
    }

    /// Create a derived container sharing this one's registrations but with
    /// its own, independent singleton cache.
    pub fn child(&self) -> Container {
        Container {
            registrations: Arc::new(Mutex::new(self.registrations.lock().unwrap().clone())),
            order: Arc::new(Mutex::new(self.order.lock().unwrap().clone())),
            singletons: Arc::new(Mutex::new(HashMap::new())),
            build_locks: Arc::new(Mutex::new(HashMap::new())),
            max_resolution_depth: self.max_resolution_depth,
            detect_cycles: self.detect_cycles,
            enable_debug: self.enable_debug,
        }
    }

    fn resolve_internal(
        &self,
        identifier: &str,
        ctx: &mut ResolveContext,
    ) -> Result<Erased, ContainerError> {
        if self.enable_debug {
            tracing::debug!(identifier = %identifier, depth = ctx.path.len(), "resolving service");
        }
        if self.detect_cycles && ctx.path.iter().any(|p| p == identifier) {
            let mut path = ctx.path.clone();
            path.push(identifier.to_string());
            return Err(ContainerError::CircularDependency(path));
        }
        if ctx.path.len() >= ctx.max_depth {
            return Err(ContainerError::DepthExceeded {
                identifier: identifier.to_string(),
                depth: ctx.path.len(),
            });
        }

        let registration = {
            let regs = self.registrations.lock().unwrap();
            regs.get(identifier).cloned()
        }
        .ok_or_else(|| ContainerError::ServiceNotFound(identifier.to_string()))?;

        if let Some(condition) = &registration.condition {
            if !condition() {
                if self.enable_debug {
                    tracing::debug!(identifier = %identifier, "condition false, treating as not found");
                }
                return Err(ContainerError::ServiceNotFound(identifier.to_string()));
            }
        }

        match registration.scope {
            Scope::Singleton => {
                if let Some(existing) = self.singletons.lock().unwrap().get(identifier).cloned() {
                    return Ok(existing);
                }
                let build_lock = {
                    let mut locks = self.build_locks.lock().unwrap();
                    locks
                        .entry(identifier.to_string())
                        .or_insert_with(|| Arc::new(Mutex::new(())))
                        .clone()
                };
                // Held across the factory call itself: whichever thread gets
                // here first builds; the rest block and then hit the cache
                // check below instead of racing the factory.
                let _build_guard = build_lock.lock().unwrap();
                if let Some(existing) = self.singletons.lock().unwrap().get(identifier).cloned() {
                    return Ok(existing);
                }
                let built = self.build(identifier, ctx, &registration)?;
                self.singletons
                    .lock()
                    .unwrap()
                    .insert(identifier.to_string(), built.clone());
                Ok(built)
            }
            Scope::Scoped => {
                if let Some(existing) = ctx.scoped.get(identifier).cloned() {
                    return Ok(existing);
                }
                let built = self.build(identifier, ctx, &registration)?;
                ctx.scoped.insert(identifier.to_string(), built.clone());
                Ok(built)
            }
            Scope::Transient => self.build(identifier, ctx, &registration),
        }
    }

    fn build(
        &self,
        identifier: &str,
        ctx: &mut ResolveContext,
        registration: &Registration,
    ) -> Result<Erased, ContainerError> {
        ctx.push(identifier);
        let result = (registration.factory)(self, ctx);
        ctx.pop();
        result
    }
}
