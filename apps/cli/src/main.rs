//! mdharvest: mirror a sitemap-listed documentation site as Markdown with
//! locally stored images.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing();
    commands::run(cli).await
}
