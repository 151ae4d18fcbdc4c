use crate::envelope::{HeaderVec, HeaderVecExt, JSON_CONTENT_TYPE};
use crate::errors::ErrorDocument;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Json(Value),
    /// Body produced by an output transform, sent verbatim.
    Raw(String),
}

/// Final response handed back to the HTTP listener.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayResponse {
    pub status: u16,
    pub headers: HeaderVec,
    pub body: ResponseBody,
}

impl GatewayResponse {
    pub fn json(status: u16, body: Value) -> Self {
        let mut headers = HeaderVec::new();
        headers.set_header("Content-Type", JSON_CONTENT_TYPE);
        Self {
            status,
            headers,
            body: ResponseBody::Json(body),
        }
    }

    pub fn raw(status: u16, content_type: &str, body: impl Into<String>) -> Self {
        let mut headers = HeaderVec::new();
        headers.set_header("Content-Type", content_type);
        Self {
            status,
            headers,
            body: ResponseBody::Raw(body.into()),
        }
    }

    /// Error document sent with the catalog-resolved status.
    pub fn from_error_document(document: &ErrorDocument) -> Self {
        let body = serde_json::to_value(document).unwrap_or(Value::Null);
        Self::json(document.status_code, body)
    }

    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers.get_header(name)
    }

    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.set_header(name, value);
    }

    pub fn content_type(&self) -> Option<&str> {
        self.get_header("content-type")
    }

    pub fn json_body(&self) -> Option<&Value> {
        match &self.body {
            ResponseBody::Json(v) => Some(v),
            _ => None,
        }
    }

    /// Parse the body as an error document, if it is one.
    pub fn error_document(&self) -> Option<ErrorDocument> {
        self.json_body()
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Serialized body bytes.
    pub fn body_bytes(&self) -> Vec<u8> {
        match &self.body {
            ResponseBody::Json(v) => v.to_string().into_bytes(),
            ResponseBody::Raw(s) => s.clone().into_bytes(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_response_sets_content_type() {
        let res = GatewayResponse::json(201, json!({"id": 1}));
        assert_eq!(res.content_type(), Some("application/json"));
        assert_eq!(res.body_bytes(), br#"{"id":1}"#.to_vec());
        assert!(res.is_success());
    }

    #[test]
    fn raw_response_is_sent_verbatim() {
        let res = GatewayResponse::raw(200, "application/xml", "<items/>");
        assert_eq!(res.content_type(), Some("application/xml"));
        assert_eq!(res.body_bytes(), b"<items/>".to_vec());
        assert!(res.json_body().is_none());
        assert!(res.error_document().is_none());
    }
}
