//! `diagsnap info`: collect and display a diagnostic snapshot.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use colored::Colorize;
use tracing::{info, warn};

use crate::config::Config;
use crate::domain::host_probe::ProcfsProbe;
use crate::domain::inventory::Inventory;
use crate::domain::snapshot::{ComponentVersion, Snapshot};
use crate::domain::snapshot_builder::SnapshotBuilder;
use crate::domain::sources::DaemonSources;

pub fn run(cfg: Config, format: &str, inventory: Option<&str>) -> Result<()> {
    let inventory = match inventory.map(Path::new).or(cfg.inventory.as_deref()) {
        Some(path) => {
            let inventory = Inventory::load(path)?;
            if inventory.containers().is_empty() {
                warn!(path = %path.display(), "inventory lists no containers");
            }
            info!(
                path = %path.display(),
                containers = inventory.containers().len(),
                "loaded inventory"
            );
            inventory
        }
        None => Inventory::default(),
    };

    let builder = SnapshotBuilder::new(
        Arc::new(cfg),
        Arc::new(ProcfsProbe::default()),
        DaemonSources::from_shared(Arc::new(inventory)),
    );

    let rt = tokio::runtime::Runtime::new()?;
    let snapshot = rt.block_on(builder.build());

    if !super::print_structured(&snapshot, format)? {
        print_table(&snapshot);
    }
    Ok(())
}

fn fmt_bytes(bytes: u64) -> String {
    if bytes >= 1_099_511_627_776 {
        format!("{:.1} TiB", bytes as f64 / 1_099_511_627_776.0)
    } else if bytes >= 1_073_741_824 {
        format!("{:.1} GiB", bytes as f64 / 1_073_741_824.0)
    } else if bytes >= 1_048_576 {
        format!("{:.1} MiB", bytes as f64 / 1_048_576.0)
    } else if bytes >= 1024 {
        format!("{:.1} KiB", bytes as f64 / 1024.0)
    } else {
        format!("{} B", bytes)
    }
}

fn fmt_list(items: &[String]) -> String {
    if items.is_empty() {
        "-".dimmed().to_string()
    } else {
        items.join(" ")
    }
}

fn fmt_flag(enabled: bool) -> String {
    if enabled {
        "yes".green().to_string()
    } else {
        "no".red().to_string()
    }
}

fn fmt_component(v: &ComponentVersion) -> String {
    if !v.is_available() {
        format!("{} (expected: {})", v.observed.red(), v.expected)
    } else if v.observed == v.expected {
        v.observed.green().to_string()
    } else {
        format!("{} (expected: {})", v.observed.yellow(), v.expected)
    }
}

fn print_table(s: &Snapshot) {
    println!("{}", "═══ Diagnostic Snapshot ═══".cyan().bold());
    println!("  Name:            {}", s.name.bold());
    if !s.id.is_empty() {
        println!("  ID:              {}", s.id);
    }
    println!("  System Time:     {}", s.system_time);
    println!();

    println!("{}", "── Containers ──".yellow());
    println!("  Total:           {}", s.total_containers);
    println!("  Running:         {}", s.containers.running.to_string().green());
    println!("  Paused:          {}", s.containers.paused.to_string().yellow());
    println!("  Stopped:         {}", s.containers.stopped.to_string().red());
    println!("  Images:          {}", s.images);
    println!();

    println!("{}", "── Storage ──".yellow());
    println!("  Driver:          {}", s.driver);
    for (key, value) in &s.driver_status {
        println!("    {}: {}", key, value);
    }
    println!("  Root Dir:        {}", s.root_dir);
    println!("  Logging Driver:  {}", s.logging_driver);
    println!("  Cgroup Driver:   {}", s.cgroup_driver);
    println!();

    println!("{}", "── Plugins ──".yellow());
    println!("  Volume:          {}", fmt_list(&s.plugins.volume));
    println!("  Network:         {}", fmt_list(&s.plugins.network));
    println!("  Authorization:   {}", fmt_list(&s.plugins.authorization));
    println!();

    if let Some(rt) = &s.runtime {
        println!("{}", "── Runtimes ──".yellow());
        for (name, path) in &rt.runtimes {
            println!("  {:<16} {}", format!("{}:", name), path);
        }
        println!("  Default:         {}", rt.default_runtime);
        println!("  Init Binary:     {}", rt.init_binary);
        println!();
    }

    if let Some(c) = &s.components {
        println!("{}", "── Components ──".yellow());
        println!("  containerd:      {}", fmt_component(&c.containerd));
        println!("  runtime:         {}", fmt_component(&c.runtime));
        println!("  init:            {}", fmt_component(&c.init));
        println!();
    }

    println!("{}", "── Security ──".yellow());
    if s.security_options.is_empty() {
        println!("  {}", "no security options".dimmed());
    }
    for opt in &s.security_options {
        if opt.key == "Name" {
            println!("  {}", opt.value);
        } else {
            println!("    {}: {}", opt.key, opt.value);
        }
    }
    println!();

    println!("{}", "── Host ──".yellow());
    println!("  Kernel:          {}", s.host.kernel_version);
    println!("  OS:              {}", s.host.operating_system);
    println!("  OS Type:         {}", s.build.os_type);
    println!("  Architecture:    {}", s.build.architecture);
    println!("  CPUs:            {}", s.ncpu);
    println!("  Total Memory:    {}", fmt_bytes(s.host.memory.mem_total));
    println!("  Swap:            {}", fmt_bytes(s.host.memory.swap_total));
    println!("  Debug:           {}", fmt_flag(s.debug));
    if s.debug {
        println!("    File Descriptors:  {}", s.n_fd);
        println!("    Threads:           {}", s.n_threads);
        println!("    Event Listeners:   {}", s.n_events_listener);
    }
    println!();

    if let Some(limits) = &s.resource_limits {
        println!("{}", "── Limits ──".yellow());
        println!("  Memory Limit:    {}", fmt_flag(limits.memory_limit));
        println!("  Swap Limit:      {}", fmt_flag(limits.swap_limit));
        println!("  Kernel Memory:   {}", fmt_flag(limits.kernel_memory));
        println!("  OOM Kill Off:    {}", fmt_flag(limits.oom_kill_disable));
        println!("  CPU CFS Period:  {}", fmt_flag(limits.cpu_cfs_period));
        println!("  CPU CFS Quota:   {}", fmt_flag(limits.cpu_cfs_quota));
        println!("  CPU Shares:      {}", fmt_flag(limits.cpu_shares));
        println!("  Cpuset:          {}", fmt_flag(limits.cpuset));
        println!();
    }

    println!("{}", "── Network ──".yellow());
    println!("  IPv4 Forwarding: {}", fmt_flag(s.ipv4_forwarding));
    println!("  bridge-nf-iptables:  {}", fmt_flag(s.bridge_nf_iptables));
    println!("  bridge-nf-ip6tables: {}", fmt_flag(s.bridge_nf_ip6tables));
    if !s.proxy.http_proxy.is_empty() {
        println!("  HTTP Proxy:      {}", s.proxy.http_proxy);
    }
    if !s.proxy.https_proxy.is_empty() {
        println!("  HTTPS Proxy:     {}", s.proxy.https_proxy);
    }
    if !s.proxy.no_proxy.is_empty() {
        println!("  No Proxy:        {}", s.proxy.no_proxy);
    }
    println!();

    println!("{}", "── Registry ──".yellow());
    println!("  Index:           {}", s.index_server_address);
    println!("  Mirrors:         {}", fmt_list(&s.registry.mirrors));
    println!("  Insecure:        {}", fmt_list(&s.registry.insecure_registries));
    println!();

    if !s.labels.is_empty() {
        println!("{}", "── Labels ──".yellow());
        for label in &s.labels {
            println!("  {}", label);
        }
        println!();
    }

    if !s.cluster_store.is_empty() {
        println!("  Cluster Store:     {}", s.cluster_store);
    }
    if !s.cluster_advertise.is_empty() {
        println!("  Cluster Advertise: {}", s.cluster_advertise);
    }
    println!(
        "  {} {}  {} {}  {} {}",
        "Version:".dimmed(),
        s.build.version,
        "Experimental:".dimmed(),
        s.experimental_build,
        "Live Restore:".dimmed(),
        s.live_restore_enabled
    );
}
