use anyhow::Result;

use super::commands::Commands;
use super::config::cmd_config;
use super::demo::cmd_demo;
use super::env::CliArgs;
use crate::config::LoadedConfig;

pub async fn dispatch(cli: &CliArgs, loaded: LoadedConfig) -> Result<()> {
    match cli.command.clone() {
        Commands::Config(args) => cmd_config(args, &loaded),
        Commands::Demo(args) => cmd_demo(args, loaded.config).await,
    }
}
