use clap::Parser;
use routegate::cli::{run_cli, Cli};
use routegate::config::GatewayConfig;
use routegate::logging::{init_logging, LogConfig};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut logging = match &cli.config {
        Some(path) => GatewayConfig::load(path)?.logging,
        None => LogConfig::default(),
    };
    logging.apply_env();
    init_logging(&logging)?;

    run_cli(cli)
}
