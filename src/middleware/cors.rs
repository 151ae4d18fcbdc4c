use super::ResponseDecorator;
use crate::config::CorsConfig;
use crate::envelope::{HeaderVec, HeaderVecExt};
use crate::server::GatewayResponse;
use tracing::debug;

/// Adds CORS headers to every response.
///
/// With no allowed origins configured, the request `Origin` is echoed (or
/// `*` when the request has none). With a list, only listed origins get
/// CORS headers.
#[derive(Debug, Clone)]
pub struct CorsDecorator {
    allowed_origins: Vec<String>,
    allow_methods: String,
    allow_headers: String,
    expose_headers: String,
    allow_credentials: bool,
}

impl CorsDecorator {
    pub fn new(config: &CorsConfig) -> Self {
        Self {
            allowed_origins: config.allowed_origins.clone(),
            allow_methods: config.allow_methods.join(", "),
            allow_headers: config.allow_headers.join(", "),
            expose_headers: config.expose_headers.join(", "),
            allow_credentials: config.allow_credentials,
        }
    }

    fn allowed_origin(&self, origin: Option<&str>) -> Option<String> {
        match origin {
            Some(o) if self.allowed_origins.is_empty() => Some(o.to_string()),
            Some(o) if self.allowed_origins.iter().any(|a| a == o) => Some(o.to_string()),
            Some(o) => {
                debug!(origin = %o, "CORS: origin not allowed, skipping headers");
                None
            }
            None if self.allowed_origins.is_empty() => Some("*".to_string()),
            None => None,
        }
    }
}

impl ResponseDecorator for CorsDecorator {
    fn decorate(&self, request_headers: &HeaderVec, response: &mut GatewayResponse) {
        let origin = request_headers.get_header("origin");
        let Some(allowed) = self.allowed_origin(origin) else {
            return;
        };
        let echoed = allowed != "*";

        response.set_header("Access-Control-Allow-Origin", allowed);
        response.set_header("Access-Control-Allow-Methods", self.allow_methods.clone());
        response.set_header("Access-Control-Allow-Headers", self.allow_headers.clone());
        if self.allow_credentials && echoed {
            response.set_header("Access-Control-Allow-Credentials", "true");
        }
        if !self.expose_headers.is_empty() {
            response.set_header("Access-Control-Expose-Headers", self.expose_headers.clone());
        }
        if echoed {
            response.set_header("Vary", "Origin");
        }
    }
}

/// Sets the `Server` header.
#[derive(Debug, Clone)]
pub struct ServerBannerDecorator {
    banner: String,
}

impl ServerBannerDecorator {
    pub fn new(banner: impl Into<String>) -> Self {
        Self {
            banner: banner.into(),
        }
    }
}

impl ResponseDecorator for ServerBannerDecorator {
    fn decorate(&self, _request_headers: &HeaderVec, response: &mut GatewayResponse) {
        response.set_header("Server", self.banner.clone());
    }
}
