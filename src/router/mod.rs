//! # Router Module
//!
//! Two phases:
//!
//! 1. **Compilation** (startup): each route's templated endpoint (e.g.
//!    `/accounts/{account_id}/items`) becomes a [`CompiledEndpoint`]: a
//!    rendered pattern plus the `(segment index, name)` bindings used to pull
//!    path parameters back out of a request URL.
//! 2. **Matching** (per request): [`Router::route`] tests the request path
//!    against the registered endpoints in declaration order.
//!
//! The compiled table is read-only after startup; no locking is involved.
//!
//! ```rust,ignore
//! let router = Router::from_table(&table)?;
//! if let Some(m) = router.route(&Method::GET, "/accounts/42/items.json") {
//!     assert_eq!(m.get_path_param("account_id"), Some("42"));
//!     assert_eq!(m.format.as_deref(), Some("json"));
//! }
//! ```

mod compile;
mod core;

pub use self::core::{register_routes, ParamVec, RouteMatch, RouteRegistrar, Router, MAX_INLINE_PARAMS};
pub use compile::{
    compile_endpoint, placeholder_name, BindingVec, CompileError, CompiledEndpoint, Segment,
    FORMATS, FORMAT_SUFFIX,
};
