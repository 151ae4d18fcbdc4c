use super::types::{
    library_basename, AuthSpec, CachePolicy, ParamType, ParameterMap, ParameterSpec,
    RouteDefinition, RouteTable,
};
use crate::cache::USE_CACHE_PARAM;
use crate::errors::{ErrorCatalog, ErrorCatalogEntry, MissingInternalError};
use http::Method;
use regex::Regex;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_STRATEGY: &str = "default";
pub const DEFAULT_TOKEN_PARAMETER: &str = "access_token";
pub const DEFAULT_ACCOUNT_PARAMETER: &str = "account_id";

/// Route file failures. All of them are fatal: the process must not serve
/// traffic with a route table it could not fully load.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("route file not found: {0}")]
    NotFound(PathBuf),
    #[error("cannot read route file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse route file {origin}: {message}")]
    Parse { origin: String, message: String },
    #[error("route {endpoint}: unsupported method '{method}'")]
    UnsupportedMethod { endpoint: String, method: String },
    #[error("route {endpoint}: unknown authentication '{name}'")]
    UnknownAuthentication { endpoint: String, name: String },
    #[error("route {endpoint}: parameter '{name}' has an invalid pattern: {message}")]
    InvalidPattern {
        endpoint: String,
        name: String,
        message: String,
    },
    #[error(transparent)]
    Catalog(#[from] MissingInternalError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Json,
    Yaml,
}

impl FileFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => FileFormat::Yaml,
            _ => FileFormat::Json,
        }
    }
}

/// Process-wide settings that shape how route declarations are resolved.
#[derive(Debug, Clone, Copy)]
pub struct LoadOptions {
    /// Global caching switch; when off every route's caching is disabled.
    pub caching_enabled: bool,
    /// TTL for routes that enable caching without naming one.
    pub default_cache_ttl: Duration,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            caching_enabled: false,
            default_cache_ttl: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RouteFile {
    #[serde(default)]
    routes: Vec<RawRoute>,
    #[serde(default)]
    authentication: BTreeMap<String, RawAuth>,
    #[serde(default)]
    errors: HashMap<String, ErrorCatalogEntry>,
}

#[derive(Debug, Deserialize)]
struct RawRoute {
    method: String,
    endpoint: String,
    #[serde(default, alias = "parameters")]
    endpoint_parameters: ParameterMap,
    library: String,
    callback: String,
    #[serde(default)]
    output_library: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    authentication: Option<String>,
    #[serde(default)]
    required_permissions: Vec<String>,
    #[serde(default)]
    caching: Option<CachingSetting>,
    #[serde(default)]
    event: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawAuth {
    #[serde(default)]
    strategy: Option<String>,
    #[serde(default)]
    token_parameter: Option<String>,
    #[serde(default)]
    account_parameter: Option<String>,
    #[serde(default)]
    parameters: ParameterMap,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
enum CachingSetting {
    Flag(bool),
    Policy {
        #[serde(default)]
        enabled: Option<bool>,
        #[serde(default)]
        ttl_secs: Option<u64>,
    },
}

/// Load and resolve a route file (JSON, or YAML for `.yaml`/`.yml`).
pub fn load_route_table(
    path: impl AsRef<Path>,
    options: &LoadOptions,
) -> Result<RouteTable, LoadError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(LoadError::NotFound(path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path).map_err(|source| LoadError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let table = parse_route_file(
        &content,
        FileFormat::from_path(path),
        &path.display().to_string(),
        options,
    )?;
    info!(
        path = %path.display(),
        routes_count = table.len(),
        catalog_entries = table.catalog.len(),
        "Route table loaded"
    );
    Ok(table)
}

/// Resolve a route file held in memory.
pub fn parse_route_table(
    content: &str,
    format: FileFormat,
    options: &LoadOptions,
) -> Result<RouteTable, LoadError> {
    parse_route_file(content, format, "<inline>", options)
}

fn parse_route_file(
    content: &str,
    format: FileFormat,
    origin: &str,
    options: &LoadOptions,
) -> Result<RouteTable, LoadError> {
    let parse_error = |message: String| LoadError::Parse {
        origin: origin.to_string(),
        message,
    };
    let file: RouteFile = match format {
        FileFormat::Json => serde_json::from_str(content).map_err(|e| parse_error(e.to_string()))?,
        FileFormat::Yaml => serde_yaml::from_str(content).map_err(|e| parse_error(e.to_string()))?,
    };

    let catalog = ErrorCatalog::new(file.errors)?;
    let routes = file
        .routes
        .into_iter()
        .map(|raw| resolve_route(raw, &file.authentication, options).map(Arc::new))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(RouteTable {
        routes,
        catalog: Arc::new(catalog),
    })
}

fn parse_method(raw: &str) -> Option<Method> {
    match raw.to_ascii_uppercase().as_str() {
        "GET" => Some(Method::GET),
        "POST" => Some(Method::POST),
        "PUT" => Some(Method::PUT),
        "DELETE" => Some(Method::DELETE),
        "HEAD" => Some(Method::HEAD),
        _ => None,
    }
}

/// Every declared `pattern` must compile, path-bound or not.
fn check_patterns(endpoint: &str, parameters: &ParameterMap) -> Result<(), LoadError> {
    for (name, spec) in parameters {
        let Some(pattern) = spec.pattern.as_deref() else {
            continue;
        };
        if let Err(e) = Regex::new(&format!("^(?:{pattern})$")) {
            return Err(LoadError::InvalidPattern {
                endpoint: endpoint.to_string(),
                name: name.clone(),
                message: e.to_string(),
            });
        }
    }
    Ok(())
}

fn resolve_route(
    raw: RawRoute,
    auth_specs: &BTreeMap<String, RawAuth>,
    options: &LoadOptions,
) -> Result<RouteDefinition, LoadError> {
    let method = parse_method(&raw.method).ok_or_else(|| LoadError::UnsupportedMethod {
        endpoint: raw.endpoint.clone(),
        method: raw.method.clone(),
    })?;

    let mut parameters = raw.endpoint_parameters;

    let authentication = match raw.authentication {
        Some(name) => {
            let spec = auth_specs
                .get(&name)
                .ok_or_else(|| LoadError::UnknownAuthentication {
                    endpoint: raw.endpoint.clone(),
                    name: name.clone(),
                })?;
            // Route-declared parameters win over the scheme's.
            for (param, param_spec) in &spec.parameters {
                parameters
                    .entry(param.clone())
                    .or_insert_with(|| param_spec.clone());
            }
            Some(AuthSpec {
                name,
                strategy: spec
                    .strategy
                    .clone()
                    .unwrap_or_else(|| DEFAULT_STRATEGY.to_string()),
                token_parameter: spec
                    .token_parameter
                    .clone()
                    .unwrap_or_else(|| DEFAULT_TOKEN_PARAMETER.to_string()),
                account_parameter: spec
                    .account_parameter
                    .clone()
                    .unwrap_or_else(|| DEFAULT_ACCOUNT_PARAMETER.to_string()),
                parameters: spec.parameters.clone(),
            })
        }
        None => None,
    };

    check_patterns(&raw.endpoint, &parameters)?;

    let caching = if options.caching_enabled {
        match raw.caching {
            None | Some(CachingSetting::Flag(false)) => None,
            Some(CachingSetting::Flag(true)) => Some(CachePolicy {
                enabled: true,
                ttl: options.default_cache_ttl,
            }),
            Some(CachingSetting::Policy { enabled, ttl_secs }) => Some(CachePolicy {
                enabled: enabled.unwrap_or(true),
                ttl: ttl_secs
                    .map(Duration::from_secs)
                    .unwrap_or(options.default_cache_ttl),
            }),
        }
    } else {
        None
    };

    if caching.is_some_and(|p| p.enabled) {
        parameters
            .entry(USE_CACHE_PARAM.to_string())
            .or_insert_with(|| ParameterSpec {
                kind: ParamType::Bool,
                required: false,
                default: None,
                description: Some("Read the response from the cache when available".to_string()),
                pattern: None,
            });
    }

    let output_library = raw
        .output_library
        .unwrap_or_else(|| library_basename(&raw.library).to_string());

    debug!(
        method = %method,
        endpoint = %raw.endpoint,
        library = %raw.library,
        callback = %raw.callback,
        authenticated = authentication.is_some(),
        cached = caching.is_some(),
        "Route resolved"
    );

    Ok(RouteDefinition {
        method,
        endpoint: raw.endpoint,
        parameters,
        library: raw.library,
        callback: raw.callback,
        output_library,
        description: raw.description,
        authentication,
        required_permissions: raw.required_permissions,
        caching,
        event: raw.event,
    })
}
