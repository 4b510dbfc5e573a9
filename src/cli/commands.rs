use clap::Subcommand;

use super::config::ConfigArgs;
use super::demo::DemoArgs;

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Print the effective configuration
    Config(ConfigArgs),

    /// Drive the sample account service through the pipeline
    Demo(DemoArgs),
}
