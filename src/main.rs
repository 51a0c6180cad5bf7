use clap::Parser;

use gaia_cli::cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    gaia_cli::cli::run(cli).await
}
