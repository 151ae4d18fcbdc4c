use crate::errors::ErrorCatalog;
use http::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Type tag of a declared parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    #[default]
    String,
    #[serde(alias = "int")]
    Integer,
    #[serde(alias = "float")]
    Number,
    #[serde(alias = "boolean")]
    Bool,
    Object,
    Array,
    Any,
}

impl std::fmt::Display for ParamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Number => "number",
            ParamType::Bool => "bool",
            ParamType::Object => "object",
            ParamType::Array => "array",
            ParamType::Any => "any",
        };
        f.write_str(s)
    }
}

/// Validation contract for one parameter.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ParameterSpec {
    #[serde(rename = "type", default)]
    pub kind: ParamType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub default: Option<Value>,
    #[serde(default)]
    pub description: Option<String>,
    /// Regular expression used for validation and, for path-bound
    /// parameters, for endpoint compilation.
    #[serde(default)]
    pub pattern: Option<String>,
}

pub type ParameterMap = BTreeMap<String, ParameterSpec>;

/// Resolved authentication requirement of a route.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthSpec {
    /// Name under which the scheme is declared in the route file.
    pub name: String,
    /// Registered authentication strategy to hand credentials to.
    pub strategy: String,
    /// Query/body parameter consulted when no `Authorization` header is sent.
    pub token_parameter: String,
    /// Path-bound parameter carrying the account identifier.
    pub account_parameter: String,
    /// Parameter specs the authentication scheme adds to every route using it.
    pub parameters: ParameterMap,
}

/// Per-route cache-aside policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    pub enabled: bool,
    pub ttl: Duration,
}

/// One declared API endpoint. Immutable after loading.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteDefinition {
    pub method: Method,
    /// Templated endpoint path, e.g. `/accounts/{account_id}`.
    pub endpoint: String,
    pub parameters: ParameterMap,
    pub library: String,
    pub callback: String,
    pub output_library: String,
    pub description: Option<String>,
    pub authentication: Option<AuthSpec>,
    pub required_permissions: Vec<String>,
    pub caching: Option<CachePolicy>,
    pub event: Option<String>,
}

impl RouteDefinition {
    /// Last path component of the handler library (`lib/accounts` → `accounts`).
    pub fn library_basename(&self) -> &str {
        library_basename(&self.library)
    }

    /// `library.callback`, used in logs.
    pub fn handler_id(&self) -> String {
        format!("{}.{}", self.library, self.callback)
    }

    pub fn caching_enabled(&self) -> bool {
        self.caching.is_some_and(|p| p.enabled)
    }
}

pub(crate) fn library_basename(library: &str) -> &str {
    library.rsplit('/').next().unwrap_or(library)
}

/// Loaded route file: route definitions in declaration order plus the
/// error catalog. Built once at startup and shared read-only.
#[derive(Debug, Clone)]
pub struct RouteTable {
    pub routes: Vec<Arc<RouteDefinition>>,
    pub catalog: Arc<ErrorCatalog>,
}

impl RouteTable {
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Arc<RouteDefinition>> {
        self.routes.get(index)
    }
}
