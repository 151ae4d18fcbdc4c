//! # Error Catalog and Error Envelope Builder
//!
//! Every failure in the pipeline ends up here. The dispatcher records an
//! internal [`ErrorCode`] on a [`ResponseEnvelope`]; the builder resolves that
//! code against the [`ErrorCatalog`] loaded from the route file and produces the
//! stable client-facing [`ErrorDocument`].
//!
//! ```json
//! {
//!   "request_id": "req_01J9Z3...",
//!   "status_code": 400,
//!   "status_text": "Bad Request",
//!   "error_type": "InvalidInput",
//!   "error_code": "1001",
//!   "message": "One or more parameters are invalid",
//!   "message_detail": [{ "property": "name", "message": "name is required" }],
//!   "more_info": "https://docs.example.com/errors/1001"
//! }
//! ```
//!
//! Codes missing from the catalog fall back to the catalog's `InternalError`
//! entry, so the builder always produces a document.

use crate::envelope::ResponseEnvelope;
use crate::ids::RequestId;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;

/// Internal error codes. Handler and authentication-strategy codes that are
/// not part of the framework taxonomy travel as [`ErrorCode::Custom`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    InvalidInput,
    InvalidUri,
    AuthenticationFailed,
    InvalidAuthenticationScheme,
    InvalidClientBearerToken,
    InternalError,
    Custom(String),
}

impl ErrorCode {
    pub fn as_str(&self) -> &str {
        match self {
            ErrorCode::InvalidInput => "InvalidInput",
            ErrorCode::InvalidUri => "InvalidUri",
            ErrorCode::AuthenticationFailed => "AuthenticationFailed",
            ErrorCode::InvalidAuthenticationScheme => "InvalidAuthenticationScheme",
            ErrorCode::InvalidClientBearerToken => "InvalidClientBearerToken",
            ErrorCode::InternalError => "InternalError",
            ErrorCode::Custom(code) => code,
        }
    }

    pub fn parse(code: &str) -> Self {
        match code {
            "InvalidInput" => ErrorCode::InvalidInput,
            "InvalidUri" => ErrorCode::InvalidUri,
            "AuthenticationFailed" => ErrorCode::AuthenticationFailed,
            "InvalidAuthenticationScheme" => ErrorCode::InvalidAuthenticationScheme,
            "InvalidClientBearerToken" => ErrorCode::InvalidClientBearerToken,
            "InternalError" => ErrorCode::InternalError,
            other => ErrorCode::Custom(other.to_string()),
        }
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, ErrorCode::InternalError)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for ErrorCode {
    fn from(code: &str) -> Self {
        ErrorCode::parse(code)
    }
}

impl Serialize for ErrorCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ErrorCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(ErrorCode::parse(&s))
    }
}

/// One offending property and the message describing why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub property: String,
    pub message: String,
}

impl Violation {
    pub fn new(property: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            message: message.into(),
        }
    }

    /// Reshape a validator message: the first whitespace-separated token names
    /// the offending property, the whole string is the message.
    pub fn from_message(message: &str) -> Self {
        let property = message.split_whitespace().next().unwrap_or_default();
        Self::new(property, message)
    }
}

/// Catalog entry as declared in the route file's `errors` map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorCatalogEntry {
    pub status_code: u16,
    #[serde(default)]
    pub status_code_text: String,
    #[serde(deserialize_with = "string_or_number")]
    pub user_error_code: String,
    #[serde(default)]
    pub user_message: String,
    #[serde(default)]
    pub detail_url: Option<String>,
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(serde_json::Number),
    }
    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Number(n) => n.to_string(),
    })
}

impl ErrorCatalogEntry {
    /// `InternalError` entry of the default catalog.
    fn builtin_internal() -> Self {
        Self {
            status_code: 500,
            status_code_text: "Internal Server Error".to_string(),
            user_error_code: "500".to_string(),
            user_message: "An internal error occurred".to_string(),
            detail_url: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("error catalog has no 'InternalError' entry")]
pub struct MissingInternalError;

/// Read-only mapping from internal error code to catalog entry.
#[derive(Debug, Clone)]
pub struct ErrorCatalog {
    entries: HashMap<String, ErrorCatalogEntry>,
    internal: ErrorCatalogEntry,
}

impl ErrorCatalog {
    /// Build a catalog; the `InternalError` entry is mandatory because it is
    /// the fallback for every unknown code.
    pub fn new(entries: HashMap<String, ErrorCatalogEntry>) -> Result<Self, MissingInternalError> {
        let internal = entries
            .get(ErrorCode::InternalError.as_str())
            .cloned()
            .ok_or(MissingInternalError)?;
        Ok(Self { entries, internal })
    }

    pub fn get(&self, code: &ErrorCode) -> Option<&ErrorCatalogEntry> {
        self.entries.get(code.as_str())
    }

    /// Entry for `code`, or the `InternalError` entry when the code is unknown.
    pub fn resolve(&self, code: &ErrorCode) -> &ErrorCatalogEntry {
        self.get(code).unwrap_or(&self.internal)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ErrorCatalog {
    fn default() -> Self {
        let internal = ErrorCatalogEntry::builtin_internal();
        let mut entries = HashMap::new();
        entries.insert(ErrorCode::InternalError.to_string(), internal.clone());
        Self { entries, internal }
    }
}

/// Client-facing error document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDocument {
    pub request_id: String,
    pub status_code: u16,
    pub status_text: String,
    pub error_type: ErrorCode,
    pub error_code: String,
    pub message: String,
    pub message_detail: Vec<Violation>,
    pub more_info: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug_info: Option<String>,
}

/// Render the error document for an errored envelope.
///
/// An envelope without an error code is treated as an internal error: the
/// dispatcher only routes envelopes here when something went wrong.
/// `expose_debug` controls whether an internal error's debug payload reaches
/// the client; it is never included for other codes.
pub fn build_error_document(
    envelope: &ResponseEnvelope,
    request_id: &RequestId,
    catalog: &ErrorCatalog,
    expose_debug: bool,
) -> ErrorDocument {
    let code = envelope
        .error_code
        .clone()
        .unwrap_or(ErrorCode::InternalError);
    let entry = catalog.resolve(&code);
    let debug_info = if code.is_internal() && expose_debug {
        envelope.debug_info.clone()
    } else {
        None
    };

    ErrorDocument {
        request_id: request_id.to_string(),
        status_code: entry.status_code,
        status_text: entry.status_code_text.clone(),
        error_code: entry.user_error_code.clone(),
        message: entry.user_message.clone(),
        message_detail: envelope.violations.clone(),
        more_info: entry.detail_url.clone(),
        error_type: code,
        debug_info,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(status: u16, code: &str) -> ErrorCatalogEntry {
        ErrorCatalogEntry {
            status_code: status,
            status_code_text: format!("status {status}"),
            user_error_code: code.to_string(),
            user_message: format!("message {code}"),
            detail_url: Some(format!("https://errors.example/{code}")),
        }
    }

    fn catalog() -> ErrorCatalog {
        let mut entries = HashMap::new();
        entries.insert("InternalError".to_string(), entry(500, "9000"));
        entries.insert("InvalidInput".to_string(), entry(400, "1001"));
        ErrorCatalog::new(entries).unwrap()
    }

    #[test]
    fn violation_property_is_first_token() {
        let v = Violation::from_message("name is required");
        assert_eq!(v.property, "name");
        assert_eq!(v.message, "name is required");
    }

    #[test]
    fn unknown_code_falls_back_to_internal_error_entry() {
        let envelope = ResponseEnvelope::error(ErrorCode::Custom("NoSuchCode".into()));
        let doc = build_error_document(&envelope, &RequestId::new("req"), &catalog(), true);
        assert_eq!(doc.status_code, 500);
        assert_eq!(doc.error_code, "9000");
        assert_eq!(doc.error_type.as_str(), "NoSuchCode");
    }

    #[test]
    fn debug_payload_only_for_internal_errors() {
        let mut envelope = ResponseEnvelope::error(ErrorCode::InvalidInput);
        envelope.debug_info = Some("trace".into());
        let doc = build_error_document(&envelope, &RequestId::new("req"), &catalog(), true);
        assert!(doc.debug_info.is_none());

        let internal = ResponseEnvelope::internal("boom");
        let doc = build_error_document(&internal, &RequestId::new("req"), &catalog(), true);
        assert_eq!(doc.debug_info.as_deref(), Some("boom"));
        let hidden = build_error_document(&internal, &RequestId::new("req"), &catalog(), false);
        assert!(hidden.debug_info.is_none());
    }

    #[test]
    fn catalog_requires_internal_error() {
        let mut entries = HashMap::new();
        entries.insert("InvalidInput".to_string(), entry(400, "1001"));
        assert!(ErrorCatalog::new(entries).is_err());
    }

    #[test]
    fn numeric_user_error_codes_are_accepted() {
        let e: ErrorCatalogEntry = serde_json::from_str(
            r#"{"status_code":404,"status_code_text":"Not Found","user_error_code":2001,"user_message":"x"}"#,
        )
        .unwrap();
        assert_eq!(e.user_error_code, "2001");
    }
}
