//! Tandem CLI binary.

use anyhow::Result;
use tandem::cli::Cli;
use tracing_subscriber::EnvFilter;

/// Main entry point for the tandem CLI.
///
/// Each invocation runs one command against the repository, so the
/// current-thread runtime is enough.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Controlled via RUST_LOG, e.g. RUST_LOG=tandem=debug
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tandem=info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!("Starting tandem CLI");

    let cli = Cli::parse_args();
    cli.execute().await?;

    tracing::debug!("Tandem CLI completed successfully");
    Ok(())
}
