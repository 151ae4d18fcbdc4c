use crate::config::GatewayConfig;
use crate::router::Router;
use crate::spec::{load_route_table, RouteTable};
use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use http::Method;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Command-line interface for routegate
///
/// Offline tooling over a route file: load and compile it, list its
/// routes, or resolve a request path against it.
#[derive(Parser, Debug)]
#[command(name = "routegate")]
#[command(about = "routegate route file tooling", long_about = None)]
pub struct Cli {
    /// Gateway configuration file (YAML)
    #[arg(short, long, global = true, env = "ROUTEGATE_CONFIG")]
    pub config: Option<PathBuf>,

    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load and compile a route file, reporting any error
    Check {
        /// Route file; defaults to `routes_file` from the configuration
        #[arg(short, long)]
        routes: Option<PathBuf>,
    },
    /// List compiled routes as `METHOD pattern -> library.callback`
    Routes {
        #[arg(short, long)]
        routes: Option<PathBuf>,
    },
    /// Show which route a request would reach and its path parameters
    Match {
        #[arg(short, long)]
        routes: Option<PathBuf>,

        #[arg(short, long, default_value = "GET")]
        method: String,

        /// Request path, optionally with a query string
        #[arg(short, long)]
        path: String,
    },
}

fn resolve_config(config: Option<&Path>) -> anyhow::Result<GatewayConfig> {
    let mut config = match config {
        Some(path) => GatewayConfig::load(path)?,
        None => GatewayConfig::default(),
    };
    config.apply_env();
    Ok(config)
}

fn load(config: &GatewayConfig, routes: Option<&PathBuf>) -> anyhow::Result<(RouteTable, Router)> {
    let path = routes.unwrap_or(&config.routes_file);
    let table = load_route_table(path, &config.load_options())
        .with_context(|| format!("failed to load route file {}", path.display()))?;
    let router = Router::from_table(&table)
        .with_context(|| format!("failed to compile route file {}", path.display()))?;
    Ok((table, router))
}

/// Run a parsed command, writing its report to stdout.
pub fn run_cli(cli: Cli) -> anyhow::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    execute(&cli, &mut out)
}

/// Run a parsed command against an arbitrary writer.
pub fn execute(cli: &Cli, out: &mut dyn Write) -> anyhow::Result<()> {
    let config = resolve_config(cli.config.as_deref())?;
    match &cli.command {
        Commands::Check { routes } => {
            let (table, router) = load(&config, routes.as_ref())?;
            let authenticated = table
                .routes
                .iter()
                .filter(|r| r.authentication.is_some())
                .count();
            let cached = table.routes.iter().filter(|r| r.caching_enabled()).count();
            writeln!(
                out,
                "ok: {} routes ({} authenticated, {} cached), {} error catalog entries",
                router.len(),
                authenticated,
                cached,
                table.catalog.len()
            )?;
        }
        Commands::Routes { routes } => {
            let (table, router) = load(&config, routes.as_ref())?;
            for (method, endpoint, index) in router.entries() {
                let handler = table
                    .get(index)
                    .map(|r| r.handler_id())
                    .unwrap_or_default();
                writeln!(out, "{:<6} {} -> {}", method.as_str(), endpoint.pattern, handler)?;
            }
        }
        Commands::Match {
            routes,
            method,
            path,
        } => {
            let (table, router) = load(&config, routes.as_ref())?;
            let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
                .map_err(|_| anyhow!("invalid method '{method}'"))?;
            let matched = router
                .route(&method, path)
                .ok_or_else(|| anyhow!("no route matches {method} {path}"))?;
            let route = table
                .get(matched.route_index)
                .ok_or_else(|| anyhow!("route index {} out of range", matched.route_index))?;
            writeln!(out, "{} {} -> {}", route.method, route.endpoint, route.handler_id())?;
            for (name, value) in &matched.path_params {
                writeln!(out, "  {name} = {value}")?;
            }
            if let Some(format) = &matched.format {
                writeln!(out, "  format = {format}")?;
            }
        }
    }
    Ok(())
}
