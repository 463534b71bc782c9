//! Docsmith HTTP server — PRD in, documentation page out.
//!
//! Exposes the process-docs pipeline over HTTP and serves the generated
//! pages.

mod server;

use clap::Parser;
use color_eyre::eyre::Result;

use server::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    server::init_tracing(&cli);
    server::run(cli).await
}
