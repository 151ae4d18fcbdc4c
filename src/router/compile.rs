//! Endpoint pattern compiler.
//!
//! Walks a templated endpoint segment by segment. Index 0 is the empty root
//! segment and is skipped. A placeholder (`{name}` or `:name`) whose
//! [`ParameterSpec`](crate::spec::ParameterSpec) declares a `pattern` is
//! replaced by that pattern and recorded as a `(segment index, name)` binding;
//! a placeholder without a pattern is compiled verbatim and is not bound.
//! Literal segments pass through unchanged.

use crate::spec::RouteDefinition;
use regex::Regex;
use smallvec::SmallVec;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::core::{ParamVec, MAX_INLINE_PARAMS};

/// Optional content-negotiation suffix appended to every compiled pattern.
pub const FORMAT_SUFFIX: &str = r"(\.(json|jsonp|html|xml))?";

/// Formats recognised in the suffix.
pub const FORMATS: [&str; 4] = ["json", "jsonp", "html", "xml"];

/// Ordered `(segment index, parameter name)` bindings.
pub type BindingVec = SmallVec<[(usize, Arc<str>); MAX_INLINE_PARAMS]>;

#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("endpoint '{0}' must start with '/'")]
    NotAbsolute(String),
    #[error("endpoint '{endpoint}': parameter '{name}' has an invalid pattern: {source}")]
    InvalidPattern {
        endpoint: String,
        name: String,
        #[source]
        source: Box<regex::Error>,
    },
    #[error("compiled pattern for '{endpoint}' does not build a matcher: {source}")]
    Matcher {
        endpoint: String,
        #[source]
        source: Box<regex::Error>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    /// Placeholder with a declared pattern; produces a binding.
    Constrained { name: Arc<str>, pattern: String },
    /// Placeholder without a declared pattern, kept as written.
    Placeholder { name: Arc<str>, raw: String },
}

/// Matchable form of a route's endpoint.
///
/// Binding indices refer to segments of the templated path; they stay valid
/// only while the template's depth is unchanged, so any change to the
/// template requires recompiling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledEndpoint {
    /// Rendered pattern, including the optional format suffix.
    pub pattern: String,
    pub segments: Vec<Segment>,
    pub bindings: BindingVec,
}

/// Name of a placeholder segment, if the segment is one.
pub fn placeholder_name(segment: &str) -> Option<&str> {
    if let Some(inner) = segment
        .strip_prefix('{')
        .and_then(|s| s.strip_suffix('}'))
    {
        return Some(inner);
    }
    segment.strip_prefix(':').filter(|name| !name.is_empty())
}

/// Compile a route's templated endpoint.
pub fn compile_endpoint(route: &RouteDefinition) -> Result<CompiledEndpoint, CompileError> {
    let endpoint = route.endpoint.as_str();
    let mut parts = endpoint.split('/');
    if parts.next() != Some("") {
        return Err(CompileError::NotAbsolute(endpoint.to_string()));
    }

    let mut pattern = String::with_capacity(endpoint.len() + FORMAT_SUFFIX.len());
    let mut segments = Vec::new();
    let mut bindings = BindingVec::new();

    for (index, part) in parts.enumerate() {
        // `split` yielded the root segment already; indices start at 1.
        let index = index + 1;
        pattern.push('/');
        let segment = match placeholder_name(part) {
            Some(name) => {
                let declared = route.parameters.get(name).and_then(|p| p.pattern.as_ref());
                match declared {
                    Some(param_pattern) => {
                        Regex::new(&format!("^(?:{param_pattern})$")).map_err(|e| {
                            CompileError::InvalidPattern {
                                endpoint: endpoint.to_string(),
                                name: name.to_string(),
                                source: Box::new(e),
                            }
                        })?;
                        let name: Arc<str> = Arc::from(name);
                        bindings.push((index, Arc::clone(&name)));
                        pattern.push_str(param_pattern);
                        Segment::Constrained {
                            name,
                            pattern: param_pattern.clone(),
                        }
                    }
                    None => {
                        pattern.push_str(part);
                        Segment::Placeholder {
                            name: Arc::from(name),
                            raw: part.to_string(),
                        }
                    }
                }
            }
            None => {
                pattern.push_str(part);
                Segment::Literal(part.to_string())
            }
        };
        segments.push(segment);
    }

    pattern.push_str(FORMAT_SUFFIX);

    Ok(CompiledEndpoint {
        pattern,
        segments,
        bindings,
    })
}

impl CompiledEndpoint {
    /// Build the anchored matcher for this endpoint.
    ///
    /// Unbound placeholders match any single segment, lazily, so that a
    /// trailing format suffix is captured by the `format` group rather than
    /// swallowed by the segment.
    pub fn matcher(&self) -> Result<Regex, CompileError> {
        let mut re = String::with_capacity(self.pattern.len() + 32);
        re.push('^');
        for segment in &self.segments {
            re.push('/');
            match segment {
                Segment::Literal(text) => re.push_str(&regex::escape(text)),
                Segment::Constrained { pattern, .. } => {
                    re.push_str("(?:");
                    re.push_str(pattern);
                    re.push(')');
                }
                Segment::Placeholder { .. } => re.push_str("[^/]+?"),
            }
        }
        re.push_str(r"(?:\.(?P<format>");
        re.push_str(&FORMATS.join("|"));
        re.push_str("))?$");
        Regex::new(&re).map_err(|e| CompileError::Matcher {
            endpoint: self.pattern.clone(),
            source: Box::new(e),
        })
    }

    /// Re-extract bound path parameters from a request path whose format
    /// suffix has already been stripped.
    pub fn extract(&self, path: &str) -> ParamVec {
        let parts: Vec<&str> = path.split('/').collect();
        self.bindings
            .iter()
            .filter_map(|(index, name)| {
                parts
                    .get(*index)
                    .map(|value| (Arc::clone(name), (*value).to_string()))
            })
            .collect()
    }

    /// Names of the bound parameters, in binding order.
    pub fn bound_names(&self) -> Vec<&str> {
        self.bindings.iter().map(|(_, name)| name.as_ref()).collect()
    }

    /// Bindings as a name → index map, for introspection.
    pub fn binding_map(&self) -> BTreeMap<&str, usize> {
        self.bindings
            .iter()
            .map(|(index, name)| (name.as_ref(), *index))
            .collect()
    }
}
