//! # routegate
//!
//! **routegate** is a declarative API gateway core. Route behaviour (endpoint
//! pattern, parameters, authentication, caching policy, handler binding and
//! output transformation) lives in a route file; the engine compiles that file
//! once at startup and drives every request through a fixed pipeline.
//!
//! ## Architecture
//!
//! - **[`spec`]** - route file types and the loader (JSON or YAML)
//! - **[`router`]** - endpoint pattern compiler and the in-process matcher
//! - **[`security`]** - credential extraction and the authenticator gate
//! - **[`validator`]** - parameter validation contract and a built-in rule checker
//! - **[`cache`]** - cache key derivation and the cache-aside gate
//! - **[`registry`]** - handler / output-transform lookup by library and function name
//! - **[`dispatcher`]** - the per-request state machine
//! - **[`errors`]** - error catalog and the client-facing error document
//! - **[`events`]** - fire-and-forget event emission
//! - **[`server`]** - request/response model and the [`Gateway`] service
//!
//! ### Request Handling Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Client
//!     participant Gateway
//!     participant Router
//!     participant Dispatcher
//!     participant Auth as AuthGate
//!     participant Validator
//!     participant Cache as CacheGate
//!     participant Handler
//!     participant Output as OutputTransform
//!
//!     Client->>Gateway: GET /accounts/42/items?_use_cache=1
//!     Gateway->>Router: route(GET, path)
//!     alt No Route Match
//!         Router-->>Client: InvalidUri error document
//!     end
//!     Gateway->>Dispatcher: dispatch(route, request)
//!     Dispatcher->>Auth: authenticate (if declared)
//!     alt Rejected
//!         Auth-->>Client: catalog-mapped error document
//!     end
//!     Dispatcher->>Validator: validate(specs, params, files)
//!     alt Violations
//!         Validator-->>Client: InvalidInput + {property, message} list
//!     end
//!     Dispatcher->>Cache: lookup(key)
//!     alt Hit
//!         Cache-->>Dispatcher: cached payload
//!     else Miss
//!         Dispatcher->>Handler: call(context)
//!         Handler-->>Dispatcher: ResponseEnvelope
//!         Dispatcher->>Cache: store(key, payload)
//!     end
//!     Dispatcher->>Output: transform(envelope)
//!     Dispatcher-->>Client: response + request id header
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use routegate::{spec::{load_route_table, LoadOptions}, registry::{HandlerRegistry, handler_fn}};
//! use routegate::{Gateway, envelope::ResponseEnvelope};
//!
//! let table = load_route_table("routes.yaml", &LoadOptions::default())?;
//! let mut registry = HandlerRegistry::new();
//! registry.register_handler("lib/accounts", "get_account", handler_fn(|ctx| async move {
//!     Ok(ResponseEnvelope::ok(serde_json::json!({ "id": ctx.path_param("account_id") })))
//! }));
//! let gateway = Gateway::builder(table).registry(registry).build()?;
//! let response = gateway.handle(request).await;
//! ```

pub mod cache;
pub mod cli;
pub mod config;
pub mod dispatcher;
pub mod envelope;
pub mod errors;
pub mod events;
pub mod ids;
pub mod logging;
pub mod middleware;
pub mod registry;
pub mod router;
pub mod security;
pub mod server;
pub mod spec;
pub mod validator;

pub use config::GatewayConfig;
pub use envelope::{HeaderVec, ResponseEnvelope};
pub use errors::{ErrorCatalog, ErrorCatalogEntry, ErrorCode, ErrorDocument, Violation};
pub use server::{Gateway, GatewayRequest, GatewayResponse};
pub use spec::{load_route_table, LoadOptions, ParameterSpec, RouteDefinition, RouteTable};
