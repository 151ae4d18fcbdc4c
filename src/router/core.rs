//! In-process route matcher.
//!
//! [`Router`] is the crate's implementation of the [`RouteRegistrar`]
//! contract: compiled endpoints are registered once at startup and matched in
//! declaration order for every request.

use super::compile::{compile_endpoint, CompileError, CompiledEndpoint};
use crate::spec::RouteTable;
use http::Method;
use regex::Regex;
use smallvec::SmallVec;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Maximum number of path parameters before heap allocation.
pub const MAX_INLINE_PARAMS: usize = 8;

/// Path parameter storage: names are shared with the compiled endpoint,
/// values are per-request.
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

/// Registration capability of an HTTP listener: "method + pattern → route".
pub trait RouteRegistrar {
    fn register(
        &mut self,
        method: &Method,
        endpoint: Arc<CompiledEndpoint>,
        route_index: usize,
    ) -> Result<(), CompileError>;
}

/// Result of matching a request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch {
    /// Index of the matched route in the [`RouteTable`].
    pub route_index: usize,
    /// Bound path parameters (only parameters declared with a pattern).
    pub path_params: ParamVec,
    /// Format suffix (`json`, `xml`, ...) if the path carried one.
    pub format: Option<String>,
}

impl RouteMatch {
    /// Last occurrence wins when a name is bound twice.
    #[inline]
    pub fn get_path_param(&self, name: &str) -> Option<&str> {
        self.path_params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }
}

struct RouterEntry {
    method: Method,
    matcher: Regex,
    endpoint: Arc<CompiledEndpoint>,
    route_index: usize,
}

/// Regex-backed router over compiled endpoints.
#[derive(Default)]
pub struct Router {
    entries: Vec<RouterEntry>,
}

impl RouteRegistrar for Router {
    fn register(
        &mut self,
        method: &Method,
        endpoint: Arc<CompiledEndpoint>,
        route_index: usize,
    ) -> Result<(), CompileError> {
        let matcher = endpoint.matcher()?;
        info!(
            method = %method,
            pattern = %endpoint.pattern,
            route_index,
            bindings = ?endpoint.bound_names(),
            "Route registered"
        );
        self.entries.push(RouterEntry {
            method: method.clone(),
            matcher,
            endpoint,
            route_index,
        });
        Ok(())
    }
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile every route of `table` and register it with this router.
    pub fn from_table(table: &RouteTable) -> Result<Self, CompileError> {
        let mut router = Router::new();
        register_routes(table, &mut router)?;
        Ok(router)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered `(method, compiled endpoint, route index)` triples.
    pub fn entries(&self) -> impl Iterator<Item = (&Method, &CompiledEndpoint, usize)> {
        self.entries
            .iter()
            .map(|e| (&e.method, e.endpoint.as_ref(), e.route_index))
    }

    /// Match a request to the first registered route, in declaration order.
    ///
    /// `HEAD` requests fall back to `GET` routes when no `HEAD` route matches.
    pub fn route(&self, method: &Method, path: &str) -> Option<RouteMatch> {
        let path = path.split('?').next().unwrap_or(path);
        debug!(method = %method, path = %path, "Route match attempt");

        let found = self.find(method, path).or_else(|| {
            if *method == Method::HEAD {
                self.find(&Method::GET, path)
            } else {
                None
            }
        });

        if found.is_none() {
            warn!(method = %method, path = %path, "No route matched");
        }
        found
    }

    fn find(&self, method: &Method, path: &str) -> Option<RouteMatch> {
        self.entries
            .iter()
            .filter(|entry| entry.method == *method)
            .find_map(|entry| {
                let captures = entry.matcher.captures(path)?;
                let format = captures.name("format").map(|m| m.as_str().to_string());
                let stripped = match &format {
                    Some(f) => &path[..path.len() - f.len() - 1],
                    None => path,
                };
                let path_params = entry.endpoint.extract(stripped);
                debug!(
                    method = %method,
                    path = %path,
                    pattern = %entry.endpoint.pattern,
                    route_index = entry.route_index,
                    path_params = ?path_params,
                    "Route matched"
                );
                Some(RouteMatch {
                    route_index: entry.route_index,
                    path_params,
                    format,
                })
            })
    }
}

/// Route registration bootstrap: compile each route once and hand it to the
/// listener's registration API. Returns the compiled endpoints in table order.
pub fn register_routes<R: RouteRegistrar>(
    table: &RouteTable,
    registrar: &mut R,
) -> Result<Vec<Arc<CompiledEndpoint>>, CompileError> {
    let mut compiled = Vec::with_capacity(table.len());
    for (index, route) in table.routes.iter().enumerate() {
        let endpoint = Arc::new(compile_endpoint(route)?);
        registrar.register(&route.method, Arc::clone(&endpoint), index)?;
        compiled.push(endpoint);
    }
    info!(routes_count = compiled.len(), "Routing table compiled");
    Ok(compiled)
}
