use crate::envelope::{HeaderVec, HeaderVecExt};
use crate::ids::RequestId;
use crate::router::ParamVec;
use crate::security::Principal;
use crate::spec::RouteDefinition;
use crate::validator::{is_blank, URL_PARAMS_KEY};
use http::Method;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// One uploaded file, passed through to the validator and handler untouched.
#[derive(Clone, PartialEq, Eq)]
pub struct UploadedFile {
    /// Form field the file was sent under.
    pub field: String,
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(
        field: impl Into<String>,
        filename: impl Into<String>,
        content_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            field: field.into(),
            filename: filename.into(),
            content_type: content_type.into(),
            bytes,
        }
    }
}

impl fmt::Debug for UploadedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadedFile")
            .field("field", &self.field)
            .field("filename", &self.filename)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Parse the query part of a request target.
///
/// Everything after the first `?` is URL-decoded; repeated names keep the
/// last value.
pub fn parse_query_params(target: &str) -> Map<String, Value> {
    match target.split_once('?') {
        Some((_, query)) => url::form_urlencoded::parse(query.as_bytes())
            .map(|(k, v)| (k.into_owned(), Value::String(v.into_owned())))
            .collect(),
        None => Map::new(),
    }
}

/// Request as read from the HTTP listener.
#[derive(Debug, Clone)]
pub struct GatewayRequest {
    pub method: Method,
    /// Path without the query string.
    pub path: String,
    pub query: Map<String, Value>,
    pub body: Option<Value>,
    pub headers: HeaderVec,
    pub files: Vec<UploadedFile>,
}

impl GatewayRequest {
    /// Build a request from a method and a request target (`/path?query`).
    pub fn new(method: Method, target: &str) -> Self {
        let path = target.split('?').next().unwrap_or(target).to_string();
        Self {
            method,
            path,
            query: parse_query_params(target),
            body: None,
            headers: HeaderVec::new(),
            files: Vec::new(),
        }
    }

    pub fn get(target: &str) -> Self {
        Self::new(Method::GET, target)
    }

    pub fn post(target: &str) -> Self {
        Self::new(Method::POST, target)
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.set_header(name, value);
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_file(mut self, file: UploadedFile) -> Self {
        self.files.push(file);
        self
    }

    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers.get_header(name)
    }

    /// Whether parameters come from the body rather than the query string.
    pub fn reads_body(&self) -> bool {
        matches!(self.method, Method::POST | Method::PUT | Method::DELETE)
    }

    /// Body parameters for POST/PUT/DELETE, query parameters otherwise.
    /// A non-object body contributes no parameters.
    pub fn params(&self) -> Map<String, Value> {
        if self.reads_body() {
            match &self.body {
                Some(Value::Object(map)) => map.clone(),
                _ => Map::new(),
            }
        } else {
            self.query.clone()
        }
    }
}

/// Per-request state handed down the pipeline.
///
/// Body/query parameters and path parameters are kept apart; handlers that
/// want one map use [`RequestContext::merged_params`], where path parameters
/// sit under `url_params`.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub route: Arc<RouteDefinition>,
    pub method: Method,
    pub path: String,
    pub params: Map<String, Value>,
    pub path_params: ParamVec,
    pub headers: HeaderVec,
    pub files: Vec<UploadedFile>,
    /// Set by the authenticator gate; `None` until then, and for routes
    /// without authentication.
    pub principal: Option<Principal>,
    pub request_id: RequestId,
    /// Format suffix of the request path (`json`, `xml`, ...).
    pub format: Option<String>,
}

impl RequestContext {
    pub fn new(
        route: Arc<RouteDefinition>,
        request: GatewayRequest,
        path_params: ParamVec,
        format: Option<String>,
        request_id: RequestId,
    ) -> Self {
        let mut params = request.params();
        apply_defaults(&route, &mut params, &path_params);
        Self {
            route,
            method: request.method,
            path: request.path,
            params,
            path_params,
            headers: request.headers,
            files: request.files,
            principal: None,
            request_id,
            format,
        }
    }

    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.path_params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params.get(name)
    }

    pub fn url_params(&self) -> Map<String, Value> {
        self.path_params
            .iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.clone())))
            .collect()
    }

    /// Parameters plus a `url_params` object with the path parameters.
    pub fn merged_params(&self) -> Map<String, Value> {
        let mut merged = self.params.clone();
        merged.insert(URL_PARAMS_KEY.to_string(), Value::Object(self.url_params()));
        merged
    }
}

/// Fill absent or blank parameters from their declared `default`.
/// Path-bound names are left alone; the path always supplies them.
fn apply_defaults(
    route: &RouteDefinition,
    params: &mut Map<String, Value>,
    path_params: &ParamVec,
) {
    for (name, spec) in &route.parameters {
        let Some(default) = &spec.default else {
            continue;
        };
        if path_params.iter().any(|(k, _)| k.as_ref() == name.as_str()) {
            continue;
        }
        if params.get(name).is_none_or(is_blank) {
            params.insert(name.clone(), default.clone());
        }
    }
}
