use std::path::PathBuf;

use clap::Args;

#[derive(Args, Debug)]
pub struct DetachArgs {
    /// Disk image(s) to detach
    #[arg(required = true, num_args = 1..)]
    pub targets: Vec<PathBuf>,
}

pub async fn execute(args: DetachArgs, global: &crate::cli::GlobalFlags) -> anyhow::Result<()> {
    let service = global.create_service();

    let mut errors = Vec::new();
    let mut success_count = 0;

    for target in args.targets {
        let worker = service.clone();
        let path = target.clone();
        let result = tokio::task::spawn_blocking(move || worker.detach_disk(&path)).await?;

        match result {
            Ok(()) => {
                println!("{}", target.display());
                success_count += 1;
            }
            Err(e) => {
                eprintln!("Error detaching '{}': {}", target.display(), e);
                errors.push(format!("{}: {}", target.display(), e));
            }
        }
    }

    if !errors.is_empty() {
        let error_summary = if success_count > 0 {
            format!(
                "Failed to detach {} of {} disk(s)",
                errors.len(),
                errors.len() + success_count
            )
        } else {
            format!("Failed to detach all {} disk(s)", errors.len())
        };

        anyhow::bail!("{}\nErrors:\n  {}", error_summary, errors.join("\n  "));
    }
    Ok(())
}
