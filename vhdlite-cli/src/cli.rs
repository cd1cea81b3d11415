use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};
use vhdlite::{DiskHandleService, VhdliteOptions};

use crate::commands::{create::CreateArgs, detach::DetachArgs, run_bypassed::RunBypassedArgs};

#[derive(Parser, Debug)]
#[command(
    name = "vhdlite",
    version,
    about = "Create, detach and tune VHD/VHDX disk images"
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalFlags,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a new disk image
    Create(CreateArgs),

    /// Detach one or more disk images from the host
    Detach(DetachArgs),

    /// Run a command with the disk's write cache flushing disabled
    RunBypassed(RunBypassedArgs),
}

#[derive(Args, Debug, Clone)]
pub struct GlobalFlags {
    /// JSON options file
    #[arg(long, global = true, env = "VHDLITE_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
}

impl GlobalFlags {
    pub fn load_options(&self) -> anyhow::Result<VhdliteOptions> {
        Ok(VhdliteOptions::resolve(self.config.as_deref())?)
    }

    pub fn create_service(&self) -> DiskHandleService {
        DiskHandleService::new()
    }

    /// `RUST_LOG` applies unless `-v` was given. Default is `warn`.
    pub fn init_tracing(&self) {
        let filter = match self.verbose {
            0 => tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            1 => tracing_subscriber::EnvFilter::new("debug"),
            _ => tracing_subscriber::EnvFilter::new("trace"),
        };

        if let Err(e) = tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(filter)
            .try_init()
        {
            eprintln!("Failed to initialize tracing: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_bypassed_trailing_command() {
        let cli = Cli::try_parse_from([
            "vhdlite",
            "run-bypassed",
            "scratch.vhdx",
            "--",
            "tar",
            "-xf",
            "layer.tar",
        ])
        .unwrap();

        match cli.command {
            Commands::RunBypassed(args) => {
                assert_eq!(args.path, PathBuf::from("scratch.vhdx"));
                assert_eq!(args.command, vec!["tar", "-xf", "layer.tar"]);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["vhdlite", "detach", "a.vhdx", "-vv"]).unwrap();
        assert_eq!(cli.global.verbose, 2);
    }

    #[test]
    fn test_parent_conflicts_with_size() {
        let err = Cli::try_parse_from([
            "vhdlite",
            "create",
            "child.vhdx",
            "--parent",
            "base.vhdx",
            "--size-gb",
            "4",
        ])
        .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }
}
