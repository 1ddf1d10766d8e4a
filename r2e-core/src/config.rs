//! Plain configuration structs (§6). Parsing them from files or env vars is
//! explicitly out of scope — the embedding application builds these however
//! it likes and hands them to `EngineBuilder`.

/// Options for the `cors` middleware (§4.4).
#[derive(Debug, Clone)]
pub struct CorsOptions {
    pub origin: String,
    pub methods: Vec<String>,
    pub allowed_headers: Vec<String>,
    pub credentials: bool,
    pub max_age: Option<u64>,
}

impl Default for CorsOptions {
    fn default() -> Self {
        Self {
            origin: "*".to_string(),
            methods: vec![
                "GET".into(),
                "POST".into(),
                "PUT".into(),
                "DELETE".into(),
                "PATCH".into(),
                "OPTIONS".into(),
            ],
            allowed_headers: vec!["content-type".into(), "authorization".into()],
            credentials: false,
            max_age: Some(86400),
        }
    }
}

/// Router-level configuration accepted by the engine builder (§6).
#[derive(Debug, Clone)]
pub struct RouterConfig {
    pub cors: Option<CorsOptions>,
    pub enable_logging: bool,
    pub request_timeout_ms: u64,
    pub body_max_bytes: usize,
    pub body_timeout_ms: u64,
    /// Controls whether `stack_trace` appears in error bodies (§7).
    pub dev_mode: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            cors: None,
            enable_logging: true,
            request_timeout_ms: 30_000,
            body_max_bytes: 10 * 1024 * 1024,
            body_timeout_ms: 30_000,
            dev_mode: false,
        }
    }
}

/// Container-level configuration (§6).
#[derive(Debug, Clone)]
pub struct ContainerConfig {
    pub enable_debug: bool,
    pub max_resolution_depth: usize,
    pub detect_cycles: bool,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            enable_debug: false,
            max_resolution_depth: 50,
            detect_cycles: true,
        }
    }
}
