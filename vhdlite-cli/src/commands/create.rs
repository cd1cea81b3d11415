use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use vhdlite::CreateDiskOptions;
use vhdlite::virtdisk::{CreateVirtualDiskFlags, mb_to_block_bytes};

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Path of the new disk image (.vhd or .vhdx)
    pub path: PathBuf,

    /// Maximum size in GB [default: from options, 10]
    #[arg(long, value_name = "GB")]
    pub size_gb: Option<u32>,

    /// Block allocation size in MB [default: from options, 1]
    #[arg(long, value_name = "MB")]
    pub block_size_mb: Option<u32>,

    /// Create a differencing disk on top of this parent image
    #[arg(long, value_name = "PATH", conflicts_with = "size_gb")]
    pub parent: Option<PathBuf>,

    /// Allocate the full size up front
    #[arg(long)]
    pub full: bool,
}

pub async fn execute(args: CreateArgs, global: &crate::cli::GlobalFlags) -> anyhow::Result<()> {
    let options = global.load_options()?;

    let mut create = match &args.parent {
        Some(parent) => {
            let mut create = CreateDiskOptions::differencing(parent).with_format(options.format);
            if let Some(mb) = args.block_size_mb {
                create.block_size_bytes = mb_to_block_bytes(mb).with_context(|| {
                    format!("block size {}MB exceeds the 32-bit native limit", mb)
                })?;
            }
            create
        }
        None => options.create_options(args.size_gb, args.block_size_mb)?,
    };
    if args.full {
        create.flags |= CreateVirtualDiskFlags::FULL_PHYSICAL_ALLOCATION;
    }

    let service = global.create_service();
    let path = args.path.clone();
    tokio::task::spawn_blocking(move || service.create_disk_with(&path, &create))
        .await?
        .with_context(|| format!("Failed to create {}", args.path.display()))?;

    println!("{}", args.path.display());
    Ok(())
}
