use anyhow::Result;
use clap::Parser;

mod args;
mod demo;

use args::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    lft_common::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::PointToPoint => demo::run_point_to_point(&cli.cluster).await,
        Commands::Lan => demo::run_lan(&cli.cluster).await,
        Commands::Internet => demo::run_internet(&cli.cluster).await,
        Commands::Teardown => demo::run_teardown(&cli.cluster).await,
    }
}
