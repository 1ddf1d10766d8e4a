//! Container-specific failures (§4.1). Kept distinct from `r2e_core::EngineError`
//! since these are wiring-time/resolve-time faults, not per-request HTTP
//! errors — the embedding application maps them to a 500 at the boundary
//! where that distinction matters.

use r2e_core::EngineError;

#[derive(Debug, Clone)]
pub enum ContainerError {
    /// `identifier` has no registration.
    ServiceNotFound(String),
    /// `identifier` was encountered again while already on the resolution
    /// path; carries the full path including the repeated identifier.
    CircularDependency(Vec<String>),
    /// Resolution recursed past `max_resolution_depth`.
    DepthExceeded { identifier: String, depth: usize },
    /// `register` was called with an invalid scope or a non-callable factory.
    InvalidRegistration(String),
}

impl std::fmt::Display for ContainerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContainerError::ServiceNotFound(id) => write!(f, "service not found: {id}"),
            ContainerError::CircularDependency(path) => {
                write!(f, "circular dependency: {}", path.join(" -> "))
            }
            ContainerError::DepthExceeded { identifier, depth } => {
                write!(f, "resolution depth exceeded at {depth} resolving {identifier}")
            }
            ContainerError::InvalidRegistration(msg) => write!(f, "invalid registration: {msg}"),
        }
    }
}

impl std::error::Error for ContainerError {}

impl From<ContainerError> for EngineError {
    fn from(err: ContainerError) -> Self {
        EngineError::internal(err.to_string())
    }
}
