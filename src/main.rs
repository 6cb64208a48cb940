use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use pagewatch::delivery::{build_document, write_document, BuildArgs};

#[tokio::main]
async fn main() -> Result<()> {
    let args = BuildArgs::parse();

    // Logs go to stderr; stdout may carry the document.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Building delivery document...");
    let document = build_document(&args.template, &args.payload).await?;
    write_document(&document, args.output.as_deref()).await?;
    Ok(())
}
