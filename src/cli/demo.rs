use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use prometheus::{Encoder, Registry, TextEncoder};
use tracing::info;

use crate::config::HostConfig;
use crate::demo::{descriptor, run_demo, AccountService};
use crate::host::DomainHost;

#[derive(Args, Clone, Debug)]
pub struct DemoArgs {
    /// Print session metrics after the run
    #[arg(long)]
    pub metrics: bool,
}

pub async fn cmd_demo(args: DemoArgs, config: HostConfig) -> Result<()> {
    let registry = Registry::new();
    if args.metrics {
        domainhost_session::metrics::register_metrics(&registry);
    }

    let host = DomainHost::builder(config)
        .service(descriptor())
        .build()
        .context("Failed to build domain host")?;
    host.start();

    let service = Arc::new(AccountService::with_accounts([("acc-1", 100), ("acc-2", 250)]));
    let steps = run_demo(&host, service).await;
    host.shutdown().await;
    let steps = steps.context("Demo aborted")?;

    info!(steps = steps.len(), "demo finished");
    for step in &steps {
        println!("{:<10} {:<24} {}", step.caller, step.action, step.outcome);
    }

    if args.metrics {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&registry.gather(), &mut buffer)
            .context("Failed to encode metrics")?;
        println!();
        print!("{}", String::from_utf8_lossy(&buffer));
    }
    Ok(())
}
