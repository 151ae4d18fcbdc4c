//! # CLI Module
//!
//! ```bash
//! # Load and compile a route file
//! routegate check --routes config/routes.yaml
//!
//! # List routes
//! routegate routes --routes config/routes.yaml
//!
//! # Resolve a request
//! routegate match --routes config/routes.yaml --method GET --path /accounts/42/items.json
//! ```
//!
//! Without `--routes`, the route file comes from the configuration
//! (`--config`, `ROUTEGATE_CONFIG`, then `ROUTEGATE_ROUTES_FILE`).

mod commands;

#[cfg(test)]
mod tests;

pub use commands::{execute, run_cli, Cli, Commands};
