//! Request/response model and the [`Gateway`] service.
//!
//! The HTTP listener itself is not part of this crate: it builds a
//! [`GatewayRequest`] from what it read off the wire, awaits
//! [`Gateway::handle`] and writes back the [`GatewayResponse`].

pub mod request;
pub mod response;
pub mod service;

pub use request::{parse_query_params, GatewayRequest, RequestContext, UploadedFile};
pub use response::{GatewayResponse, ResponseBody};
pub use service::{Gateway, GatewayBuilder};
