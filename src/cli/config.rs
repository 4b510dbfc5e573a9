use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use serde_json::json;

use crate::config::LoadedConfig;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Yaml,
    Json,
}

#[derive(Args, Clone, Debug)]
pub struct ConfigArgs {
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Yaml)]
    pub format: OutputFormat,

    /// Also show where each value came from
    #[arg(long)]
    pub provenance: bool,
}

pub fn cmd_config(args: ConfigArgs, loaded: &LoadedConfig) -> Result<()> {
    println!("{}", render_config(&args, loaded)?);
    Ok(())
}

pub fn render_config(args: &ConfigArgs, loaded: &LoadedConfig) -> Result<String> {
    let document = if args.provenance {
        json!({
            "config": loaded.config,
            "source_file": loaded.path.as_ref().map(|path| path.display().to_string()),
            "provenance": loaded.provenance,
        })
    } else {
        serde_json::to_value(&loaded.config).context("Failed to serialize configuration")?
    };

    match args.format {
        OutputFormat::Yaml => {
            serde_yaml::to_string(&document).context("Failed to render configuration as YAML")
        }
        OutputFormat::Json => serde_json::to_string_pretty(&document)
            .context("Failed to render configuration as JSON"),
    }
}
