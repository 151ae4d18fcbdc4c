//! # Handler Registry
//!
//! Route files name their business logic by `(library, callback)` and their
//! output formatting by `(output_library, callback)`. Both are resolved here,
//! against capabilities registered explicitly at startup; nothing is loaded
//! dynamically.
//!
//! ```rust,ignore
//! let mut registry = HandlerRegistry::new();
//! registry.register_handler("lib/accounts", "get_account", handler_fn(|ctx| async move {
//!     Ok(ResponseEnvelope::ok(json!({ "id": ctx.path_param("account_id") })))
//! }));
//! registry.register_transform("accounts", "get_account", transform_fn(|_ctx, envelope| async move {
//!     Ok(TransformedOutput::json(envelope.status, envelope.data.unwrap_or_default()))
//! }));
//!
//! let missing = registry.verify(&table);
//! ```

use crate::envelope::{HeaderVec, ResponseEnvelope};
use crate::server::{RequestContext, ResponseBody};
use crate::spec::{RouteDefinition, RouteTable};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

/// Business-logic capability bound to `(library, callback)`.
///
/// Returning `Err` is an internal error; business errors are reported by
/// setting an error code on the envelope.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn call(&self, ctx: &RequestContext) -> anyhow::Result<ResponseEnvelope>;
}

#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    #[error("output transform failed: {0}")]
    Failed(String),
}

/// Final shape of a successful response.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformedOutput {
    pub status: u16,
    pub content_type: String,
    pub headers: HeaderVec,
    pub body: ResponseBody,
}

impl TransformedOutput {
    pub fn json(status: u16, body: Value) -> Self {
        Self {
            status,
            content_type: crate::envelope::JSON_CONTENT_TYPE.to_string(),
            headers: HeaderVec::new(),
            body: ResponseBody::Json(body),
        }
    }

    pub fn text(status: u16, content_type: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type: content_type.into(),
            headers: HeaderVec::new(),
            body: ResponseBody::Raw(body.into()),
        }
    }
}

/// Output-formatting capability bound to `(output_library, callback)`.
#[async_trait]
pub trait OutputTransform: Send + Sync {
    async fn transform(
        &self,
        ctx: &RequestContext,
        envelope: &ResponseEnvelope,
    ) -> Result<TransformedOutput, TransformError>;
}

pub struct FnHandler<F>(F);

/// Adapt an async closure into a [`Handler`]. The closure receives an owned
/// copy of the request context.
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(RequestContext) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<ResponseEnvelope>> + Send,
{
    FnHandler(f)
}

#[async_trait]
impl<F, Fut> Handler for FnHandler<F>
where
    F: Fn(RequestContext) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<ResponseEnvelope>> + Send,
{
    async fn call(&self, ctx: &RequestContext) -> anyhow::Result<ResponseEnvelope> {
        (self.0)(ctx.clone()).await
    }
}

pub struct FnTransform<F>(F);

pub fn transform_fn<F, Fut>(f: F) -> FnTransform<F>
where
    F: Fn(RequestContext, ResponseEnvelope) -> Fut + Send + Sync,
    Fut: Future<Output = Result<TransformedOutput, TransformError>> + Send,
{
    FnTransform(f)
}

#[async_trait]
impl<F, Fut> OutputTransform for FnTransform<F>
where
    F: Fn(RequestContext, ResponseEnvelope) -> Fut + Send + Sync,
    Fut: Future<Output = Result<TransformedOutput, TransformError>> + Send,
{
    async fn transform(
        &self,
        ctx: &RequestContext,
        envelope: &ResponseEnvelope,
    ) -> Result<TransformedOutput, TransformError> {
        (self.0)(ctx.clone(), envelope.clone()).await
    }
}

type RegistryKey = (String, String);

fn key(library: &str, function: &str) -> RegistryKey {
    (library.to_string(), function.to_string())
}

#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<RegistryKey, Arc<dyn Handler>>,
    transforms: HashMap<RegistryKey, Arc<dyn OutputTransform>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler; a second registration under the same key
    /// replaces the first.
    pub fn register_handler<H>(&mut self, library: &str, callback: &str, handler: H)
    where
        H: Handler + 'static,
    {
        if self
            .handlers
            .insert(key(library, callback), Arc::new(handler))
            .is_some()
        {
            warn!(library = %library, callback = %callback, "Handler replaced");
        }
        debug!(library = %library, callback = %callback, "Handler registered");
    }

    pub fn register_transform<T>(&mut self, output_library: &str, callback: &str, transform: T)
    where
        T: OutputTransform + 'static,
    {
        self.transforms
            .insert(key(output_library, callback), Arc::new(transform));
        debug!(output_library = %output_library, callback = %callback, "Output transform registered");
    }

    pub fn handler(&self, route: &RouteDefinition) -> Option<Arc<dyn Handler>> {
        self.handlers
            .get(&key(&route.library, &route.callback))
            .cloned()
    }

    pub fn transform(&self, route: &RouteDefinition) -> Option<Arc<dyn OutputTransform>> {
        self.transforms
            .get(&key(&route.output_library, &route.callback))
            .cloned()
    }

    /// `library.callback` of every route without a registered handler.
    pub fn verify(&self, table: &RouteTable) -> Vec<String> {
        let missing: Vec<String> = table
            .routes
            .iter()
            .filter(|route| self.handler(route).is_none())
            .map(|route| route.handler_id())
            .collect();
        for id in &missing {
            warn!(handler = %id, "Route has no registered handler");
        }
        missing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorCatalog;
    use crate::spec::ParameterMap;
    use http::Method;

    fn route(library: &str, callback: &str) -> RouteDefinition {
        RouteDefinition {
            method: Method::GET,
            endpoint: "/x".into(),
            parameters: ParameterMap::new(),
            library: library.into(),
            callback: callback.into(),
            output_library: library.rsplit('/').next().unwrap_or(library).into(),
            description: None,
            authentication: None,
            required_permissions: Vec::new(),
            caching: None,
            event: None,
        }
    }

    #[test]
    fn lookup_and_verify() {
        let mut registry = HandlerRegistry::new();
        registry.register_handler(
            "lib/items",
            "list",
            handler_fn(|_ctx| async { Ok::<_, anyhow::Error>(ResponseEnvelope::ok(Value::Null)) }),
        );
        registry.register_transform(
            "items",
            "list",
            transform_fn(|_ctx, e: ResponseEnvelope| async move {
                Ok::<_, TransformError>(TransformedOutput::json(e.status, Value::Null))
            }),
        );

        let found = route("lib/items", "list");
        assert!(registry.handler(&found).is_some());
        assert!(registry.transform(&found).is_some());

        let table = RouteTable {
            routes: vec![Arc::new(found), Arc::new(route("lib/items", "create"))],
            catalog: Arc::new(ErrorCatalog::default()),
        };
        assert_eq!(registry.verify(&table), vec!["lib/items.create".to_string()]);
    }
}
