use std::path::PathBuf;
use std::process::{ExitCode, ExitStatus};

use anyhow::Context;
use clap::Args;

#[derive(Args, Debug)]
pub struct RunBypassedArgs {
    /// Disk image whose write cache flushing is disabled while the command runs
    pub path: PathBuf,

    /// Command to run, given after `--`
    #[arg(required = true, num_args = 1.., last = true, value_name = "COMMAND")]
    pub command: Vec<String>,
}

/// Bypass, run, then always restore cache metadata mode and release the
/// handle, even when the command fails or is interrupted.
pub async fn execute(
    args: RunBypassedArgs,
    global: &crate::cli::GlobalFlags,
) -> anyhow::Result<ExitCode> {
    let service = global.create_service();

    let handle = {
        let service = service.clone();
        let path = args.path.clone();
        tokio::task::spawn_blocking(move || service.enable_write_cache_bypass(&path))
            .await?
            .with_context(|| format!("Failed to bypass write cache on {}", args.path.display()))?
    };

    let status = run_child(&args.command).await;

    let restored = service.restore_write_cache_metadata(&handle);
    let closed = handle.close();

    match (status, restored) {
        (Ok(status), Ok(())) => {
            closed.context("Failed to release disk handle")?;
            Ok(exit_code(status))
        }
        (Ok(_), Err(e)) => {
            if let Err(close_err) = closed {
                tracing::warn!("Failed to release disk handle: {}", close_err);
            }
            Err(anyhow::Error::new(e).context(format!(
                "Failed to restore write cache on {}",
                args.path.display()
            )))
        }
        (Err(e), restored) => {
            if let Err(restore_err) = restored {
                tracing::warn!(
                    "Failed to restore write cache on {}: {}",
                    args.path.display(),
                    restore_err
                );
            }
            if let Err(close_err) = closed {
                tracing::warn!("Failed to release disk handle: {}", close_err);
            }
            Err(e)
        }
    }
}

/// Run the child to completion. Ctrl-C kills it and waits for it to exit.
async fn run_child(command: &[String]) -> anyhow::Result<ExitStatus> {
    let (program, rest) = command.split_first().context("No command given")?;

    let mut child = tokio::process::Command::new(program)
        .args(rest)
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("Failed to start '{}'", program))?;
    tracing::debug!("Started '{}' (pid {:?})", program, child.id());

    tokio::select! {
        status = child.wait() => Ok(status?),
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Interrupted, stopping '{}'", program);
            child.kill().await?;
            Ok(child.wait().await?)
        }
    }
}

fn exit_code(status: ExitStatus) -> ExitCode {
    match status.code() {
        Some(0) => ExitCode::SUCCESS,
        Some(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        None => ExitCode::FAILURE,
    }
}
