//! # Dispatcher Module
//!
//! Per-request state machine. A matched request moves strictly forward
//! through:
//!
//! ```text
//! Matched → Authenticating → Validating → CacheLookup → Invoking → Transforming → Responded
//!     └──────────────┴──────────────┴─────────────┴────────────┴──────→ Errored
//! ```
//!
//! - `Authenticating` is skipped for routes without an `authentication`
//!   reference.
//! - A cache hit goes from `CacheLookup` straight to `Transforming`; the
//!   handler is not invoked and nothing is written back.
//! - A handler envelope carrying an error code, a handler `Err` and a panic
//!   anywhere in the pipeline all end in `Errored`.
//! - Output transform failures do not error the request; the raw envelope is
//!   sent instead.
//!
//! On `Responded`, routes with an `event` topic emit a success event. Internal
//! errors are emitted on the configured error topic. Neither waits on
//! delivery.

mod core;

pub use self::core::{DispatchOutcome, DispatchState, Dispatcher, DispatcherParts};
