//! # Route Table
//!
//! Types describing a declared route file and the loader that turns it into
//! an immutable [`RouteTable`].
//!
//! The loader is a startup precondition: a missing, unreadable or malformed
//! file, an unsupported method, a dangling `authentication` reference or an
//! error catalog without an `InternalError` entry all produce a [`LoadError`]
//! and the process must not start serving.

mod load;
mod types;

pub use load::*;
pub use types::*;
