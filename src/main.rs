use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    domainhost::cli::run().await
}
