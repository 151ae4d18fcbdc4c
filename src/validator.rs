//! # Parameter Validation
//!
//! The dispatcher only depends on [`ParameterValidator`]: given a route's
//! parameter specs, the merged request parameters and the uploaded files, it
//! returns a list of violation messages. An empty list means the request is
//! valid.
//!
//! Messages must start with the name of the offending parameter; the
//! dispatcher turns each one into a [`Violation`] by splitting off that first
//! token (see [`reshape`]).
//!
//! [`RuleValidator`] is the built-in implementation. Each parameter spec is
//! turned into a small JSON Schema (type and anchored `pattern`) compiled
//! with `jsonschema`; compiled validators are cached by schema text so every
//! distinct rule is compiled once per process.

use crate::errors::Violation;
use crate::server::UploadedFile;
use crate::spec::{ParamType, ParameterMap, ParameterSpec};
use async_trait::async_trait;
use jsonschema::Validator;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

/// Object under which path-bound parameters are merged into the request
/// parameters.
pub const URL_PARAMS_KEY: &str = "url_params";

#[async_trait]
pub trait ParameterValidator: Send + Sync {
    async fn validate(
        &self,
        specs: &ParameterMap,
        params: &Map<String, Value>,
        files: &[UploadedFile],
    ) -> Vec<String>;
}

/// Turn validator messages into `{property, message}` pairs.
pub fn reshape(messages: &[String]) -> Vec<Violation> {
    messages.iter().map(|m| Violation::from_message(m)).collect()
}

/// Built-in rule checker: required, type and pattern.
#[derive(Default)]
pub struct RuleValidator {
    /// Schema text -> compiled validator; `None` when the schema does not compile.
    cache: RwLock<HashMap<String, Option<Arc<Validator>>>>,
}

impl RuleValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct schemas compiled so far.
    pub fn compiled_count(&self) -> usize {
        self.cache.read().map(|c| c.len()).unwrap_or(0)
    }

    fn validator(&self, schema: &Value) -> Option<Arc<Validator>> {
        let key = schema.to_string();
        if let Ok(cache) = self.cache.read() {
            if let Some(hit) = cache.get(&key) {
                return hit.clone();
            }
        }
        let compiled = match jsonschema::validator_for(schema) {
            Ok(v) => Some(Arc::new(v)),
            Err(e) => {
                warn!(schema = %key, error = %e, "Parameter schema does not compile");
                None
            }
        };
        if let Ok(mut cache) = self.cache.write() {
            cache.insert(key, compiled.clone());
        }
        compiled
    }

    fn check(
        &self,
        name: &str,
        spec: &ParameterSpec,
        value: Option<&Value>,
        has_file: bool,
    ) -> Option<String> {
        let value = match value {
            Some(v) if !is_blank(v) => v,
            _ => {
                return (spec.required && !has_file).then(|| format!("{name} is required"));
            }
        };

        if let Some(schema) = type_schema(spec.kind) {
            let coerced = coerce(spec.kind, value);
            let valid = self
                .validator(&schema)
                .is_some_and(|v| v.is_valid(&coerced));
            if !valid {
                return Some(format!("{name} must be of type {}", spec.kind));
            }
        }

        let pattern = spec.pattern.as_deref()?;
        let text = scalar_text(value)?;
        let schema = json!({ "type": "string", "pattern": format!("^(?:{pattern})$") });
        let matched = self
            .validator(&schema)
            .is_some_and(|v| v.is_valid(&Value::String(text)));
        (!matched).then(|| format!("{name} does not match pattern {pattern}"))
    }
}

#[async_trait]
impl ParameterValidator for RuleValidator {
    async fn validate(
        &self,
        specs: &ParameterMap,
        params: &Map<String, Value>,
        files: &[UploadedFile],
    ) -> Vec<String> {
        let url_params = params.get(URL_PARAMS_KEY).and_then(Value::as_object);
        let violations: Vec<String> = specs
            .iter()
            .filter_map(|(name, spec)| {
                let value = params
                    .get(name)
                    .or_else(|| url_params.and_then(|u| u.get(name)));
                let has_file = files.iter().any(|f| f.field == *name);
                self.check(name, spec, value, has_file)
            })
            .collect();
        debug!(
            checked = specs.len(),
            violations = violations.len(),
            "Parameters validated"
        );
        violations
    }
}

pub(crate) fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

fn type_schema(kind: ParamType) -> Option<Value> {
    let name = match kind {
        ParamType::Any => return None,
        ParamType::String => "string",
        ParamType::Integer => "integer",
        ParamType::Number => "number",
        ParamType::Bool => "boolean",
        ParamType::Object => "object",
        ParamType::Array => "array",
    };
    Some(json!({ "type": name }))
}

/// Query strings carry everything as text, so numeric and boolean types
/// also accept their textual forms.
fn coerce(kind: ParamType, value: &Value) -> Value {
    let Value::String(s) = value else {
        return value.clone();
    };
    let text = s.trim();
    let coerced = match kind {
        ParamType::Integer => text.parse::<i64>().ok().map(Value::from),
        ParamType::Number => text
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number),
        ParamType::Bool => match text.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Some(Value::Bool(true)),
            "false" | "0" | "no" | "off" => Some(Value::Bool(false)),
            _ => None,
        },
        _ => None,
    };
    coerced.unwrap_or_else(|| value.clone())
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn spec(kind: ParamType, required: bool, pattern: Option<&str>) -> ParameterSpec {
        ParameterSpec {
            kind,
            required,
            pattern: pattern.map(str::to_string),
            ..ParameterSpec::default()
        }
    }

    fn params(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap_or_default()
    }

    #[tokio::test]
    async fn reports_each_missing_required_parameter() {
        let mut specs = ParameterMap::new();
        specs.insert("name".into(), spec(ParamType::String, true, None));
        specs.insert("email".into(), spec(ParamType::String, true, None));
        specs.insert("note".into(), spec(ParamType::String, false, None));

        let messages = RuleValidator::new()
            .validate(&specs, &params(json!({"note": ""})), &[])
            .await;
        assert_eq!(messages, vec!["email is required", "name is required"]);

        let violations = reshape(&messages);
        assert_eq!(violations[0].property, "email");
        assert_eq!(violations[1].message, "name is required");
    }

    #[tokio::test]
    async fn textual_numbers_and_patterns() {
        let mut specs = ParameterMap::new();
        specs.insert("limit".into(), spec(ParamType::Integer, false, None));
        specs.insert("code".into(), spec(ParamType::String, false, Some("[A-Z]{3}")));
        let validator = RuleValidator::new();

        let ok = validator
            .validate(&specs, &params(json!({"limit": "10", "code": "ABC"})), &[])
            .await;
        assert!(ok.is_empty());

        let bad = validator
            .validate(&specs, &params(json!({"limit": "ten", "code": "ABCD"})), &[])
            .await;
        assert_eq!(
            bad,
            vec![
                "code does not match pattern [A-Z]{3}",
                "limit must be of type integer"
            ]
        );
    }

    #[tokio::test]
    async fn path_params_and_files_satisfy_requirements() {
        let mut specs = ParameterMap::new();
        specs.insert("account_id".into(), spec(ParamType::Integer, true, Some("[0-9]+")));
        specs.insert("avatar".into(), spec(ParamType::Any, true, None));

        let files = vec![UploadedFile::new("avatar", "me.png", "image/png", vec![1, 2, 3])];
        let messages = RuleValidator::new()
            .validate(&specs, &params(json!({"url_params": {"account_id": "42"}})), &files)
            .await;
        assert!(messages.is_empty(), "{messages:?}");
    }

    #[tokio::test]
    async fn compiled_schemas_are_reused_across_requests() {
        let mut specs = ParameterMap::new();
        specs.insert("limit".into(), spec(ParamType::Integer, false, None));
        specs.insert("offset".into(), spec(ParamType::Integer, false, None));
        specs.insert("code".into(), spec(ParamType::String, false, Some("[a-z]+")));
        let validator = RuleValidator::new();

        for _ in 0..3 {
            let messages = validator
                .validate(
                    &specs,
                    &params(json!({"limit": "1", "offset": 2, "code": "abc"})),
                    &[],
                )
                .await;
            assert!(messages.is_empty(), "{messages:?}");
        }
        // integer, string and the anchored pattern
        assert_eq!(validator.compiled_count(), 3);
    }

    #[tokio::test]
    async fn textual_booleans_and_structured_types() {
        let mut specs = ParameterMap::new();
        specs.insert("flag".into(), spec(ParamType::Bool, false, None));
        specs.insert("tags".into(), spec(ParamType::Array, false, None));
        specs.insert("ratio".into(), spec(ParamType::Number, false, None));
        let validator = RuleValidator::new();

        let ok = validator
            .validate(
                &specs,
                &params(json!({"flag": "yes", "tags": ["a"], "ratio": "0.5"})),
                &[],
            )
            .await;
        assert!(ok.is_empty(), "{ok:?}");

        let bad = validator
            .validate(
                &specs,
                &params(json!({"flag": "maybe", "tags": "a", "ratio": "half"})),
                &[],
            )
            .await;
        assert_eq!(
            bad,
            vec![
                "flag must be of type bool",
                "ratio must be of type number",
                "tags must be of type array"
            ]
        );
    }
}
