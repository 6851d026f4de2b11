use std::sync::Arc;

use anyhow::Result;
use colored::Colorize;

use crate::config::Config;
use crate::domain::host_probe::ProcfsProbe;
use crate::domain::inventory::Inventory;
use crate::domain::snapshot_builder::SnapshotBuilder;
use crate::domain::sources::DaemonSources;

pub fn run(cfg: Config, format: &str) -> Result<()> {
    let builder = SnapshotBuilder::new(
        Arc::new(cfg),
        Arc::new(ProcfsProbe::default()),
        DaemonSources::from_shared(Arc::new(Inventory::default())),
    );
    let v = builder.version();

    if super::print_structured(&v, format)? {
        return Ok(());
    }

    println!("{}", "diagsnap version".bold());
    println!("  Version:         {}", v.version);
    println!("  API version:     {} (minimum {})", v.api_version, v.min_api_version);
    println!("  Git commit:      {}", v.git_commit);
    if !v.build_time.is_empty() {
        println!("  Built:           {}", v.build_time);
    }
    println!("  OS/Arch:         {}/{}", v.os, v.arch);
    println!("  Kernel:          {}", v.kernel_version);
    if v.experimental {
        println!("  Experimental:    {}", "true".yellow());
    }
    Ok(())
}
