//! Handler result envelope and the header storage shared by requests and
//! responses.

use crate::errors::{ErrorCode, Violation};
use serde_json::Value;
use smallvec::SmallVec;
use std::sync::Arc;

/// Maximum inline headers before heap allocation.
pub const MAX_INLINE_HEADERS: usize = 16;

/// Header storage: names are shared `Arc<str>`, lookups are case-insensitive.
pub type HeaderVec = SmallVec<[(Arc<str>, String); MAX_INLINE_HEADERS]>;

/// Case-insensitive header access for [`HeaderVec`].
pub trait HeaderVecExt {
    fn get_header(&self, name: &str) -> Option<&str>;
    /// Replace any existing header with the same name.
    fn set_header(&mut self, name: &str, value: impl Into<String>);
}

impl HeaderVecExt for HeaderVec {
    #[inline]
    fn get_header(&self, name: &str) -> Option<&str> {
        self.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.push((Arc::from(name), value.into()));
    }
}

pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Result of a handler invocation (or of a cache hit).
///
/// `error_code` and `data` are mutually exclusive: an envelope with an error
/// code takes the error path and its data is never sent.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseEnvelope {
    pub data: Option<Value>,
    pub status: u16,
    pub content_type: String,
    pub headers: HeaderVec,
    pub error_code: Option<ErrorCode>,
    /// Structured detail for the error document's `message_detail`.
    pub violations: Vec<Violation>,
    /// Diagnostic payload, reported only for internal errors.
    pub debug_info: Option<String>,
}

impl ResponseEnvelope {
    /// Successful envelope with status 200.
    pub fn ok(data: Value) -> Self {
        Self {
            data: Some(data),
            status: 200,
            content_type: JSON_CONTENT_TYPE.to_string(),
            headers: HeaderVec::new(),
            error_code: None,
            violations: Vec::new(),
            debug_info: None,
        }
    }

    pub fn error(code: ErrorCode) -> Self {
        Self {
            data: None,
            status: 500,
            content_type: JSON_CONTENT_TYPE.to_string(),
            headers: HeaderVec::new(),
            error_code: Some(code),
            violations: Vec::new(),
            debug_info: None,
        }
    }

    /// `InternalError` carrying a debug payload.
    pub fn internal(debug_info: impl Into<String>) -> Self {
        let mut envelope = Self::error(ErrorCode::InternalError);
        envelope.debug_info = Some(debug_info.into());
        envelope
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.set_header(name, value);
        self
    }

    pub fn with_violations(mut self, violations: Vec<Violation>) -> Self {
        self.violations = violations;
        self
    }

    #[inline]
    pub fn is_error(&self) -> bool {
        self.error_code.is_some()
    }
}
