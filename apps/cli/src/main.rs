//! stargazer CLI — collect a repository's stargazers and enrich them with
//! GitHub profile data and LinkedIn profile links.

mod commands;
mod gate;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
