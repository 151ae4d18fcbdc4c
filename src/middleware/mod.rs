//! Response decorators.
//!
//! Decorators run on every response the gateway produces, error documents
//! included, after the request-id header is set.

mod cors;

pub use cors::{CorsDecorator, ServerBannerDecorator};

use crate::envelope::HeaderVec;
use crate::server::GatewayResponse;

pub trait ResponseDecorator: Send + Sync {
    fn decorate(&self, request_headers: &HeaderVec, response: &mut GatewayResponse);
}
