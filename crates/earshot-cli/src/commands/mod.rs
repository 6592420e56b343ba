//! Command implementations

mod config;
mod decode;
mod near;
mod walk;

use crate::cli::{Cli, Commands};
use crate::config_loader::load_config;
use crate::output::OutputWriter;
use anyhow::Result;

/// Execute a CLI command
pub async fn execute(cli: Cli) -> Result<()> {
    let output = OutputWriter::new(cli.json);
    let overrides = cli.overrides();

    match cli.command {
        Commands::Decode(args) => decode::execute(args, &output),
        Commands::Near(args) => {
            let config = load_config(cli.config.as_deref(), overrides)?;
            near::execute(args, &config, &output).await
        }
        Commands::Walk(args) => {
            let mut overrides = overrides;
            overrides.history_capacity = args.history_capacity;
            let config = load_config(cli.config.as_deref(), overrides)?;
            walk::execute(args, &config, &output).await
        }
        Commands::Config => {
            let config = load_config(cli.config.as_deref(), overrides)?;
            config::execute(&config, &output)
        }
    }
}
