mod cli;
mod commands;

use std::process::ExitCode;

use clap::Parser;

use crate::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    cli.global.init_tracing();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    match cli.command {
        Commands::Create(args) => commands::create::execute(args, &cli.global)
            .await
            .map(|()| ExitCode::SUCCESS),
        Commands::Detach(args) => commands::detach::execute(args, &cli.global)
            .await
            .map(|()| ExitCode::SUCCESS),
        Commands::RunBypassed(args) => commands::run_bypassed::execute(args, &cli.global).await,
    }
}
