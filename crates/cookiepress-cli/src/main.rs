use clap::Parser;

mod args;
mod client;
mod handlers;

use args::{Cli, Commands};
use client::{CliError, Ctx};

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();
    let ctx = Ctx::new(&cli.server)?;

    match cli.command {
        Commands::Generate(args) => handlers::generate(&ctx, args).await,
        Commands::Variables(args) => handlers::variables(&ctx, args).await,
    }
}
