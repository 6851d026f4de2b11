//! Snapshot: the diagnostic report produced by one call to the builder.
//!
//! Every value here is owned and plain data. Fields that only exist on some
//! platforms are `Option`s: `None` means "not probed here", never "measured
//! zero".

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Placeholder for string facts whose probe failed.
pub const UNKNOWN: &str = "<unknown>";

/// Placeholder for component identifiers that could not be resolved.
pub const NOT_AVAILABLE: &str = "N/A";

/// Complete diagnostic snapshot of the daemon and its host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: String,
    pub name: String,
    pub host: HostFacts,
    /// `containers.running + containers.paused + containers.stopped`.
    pub total_containers: usize,
    pub containers: EntityCounts,
    pub images: usize,
    pub driver: String,
    pub driver_status: Vec<(String, String)>,
    pub plugins: PluginsInfo,
    pub ipv4_forwarding: bool,
    pub bridge_nf_iptables: bool,
    pub bridge_nf_ip6tables: bool,
    pub debug: bool,
    pub n_fd: usize,
    pub n_threads: usize,
    pub system_time: String,
    pub logging_driver: String,
    pub cgroup_driver: String,
    pub n_events_listener: usize,
    pub index_server_address: String,
    pub registry: RegistryInfo,
    pub ncpu: usize,
    pub root_dir: String,
    pub labels: Vec<String>,
    pub experimental_build: bool,
    pub live_restore_enabled: bool,
    pub cluster_store: String,
    pub cluster_advertise: String,
    pub proxy: ProxyInfo,
    pub isolation: String,
    pub build: BuildInfo,
    pub resource_limits: Option<ResourceLimits>,
    pub runtime: Option<RuntimeInfo>,
    pub components: Option<ComponentVersions>,
    pub security_options: Vec<SecurityOption>,
}

// ── Host ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostFacts {
    pub kernel_version: String,
    /// OS name, suffixed with the containerization verdict where it applies.
    pub operating_system: String,
    /// `None` when the check failed or does not apply to this platform.
    pub containerized: Option<bool>,
    pub memory: MemInfo,
    /// Detected security modules in report order.
    pub security_capabilities: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemInfo {
    pub mem_total: u64,
    pub mem_free: u64,
    pub swap_total: u64,
    pub swap_free: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelVersion {
    pub kernel: u32,
    pub major: u32,
    pub minor: u32,
    pub flavor: String,
}

impl fmt::Display for KernelVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}{}",
            self.kernel, self.major, self.minor, self.flavor
        )
    }
}

/// Host kernel features relevant to container isolation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostCapabilities {
    pub apparmor: bool,
    pub seccomp: bool,
    pub selinux: bool,
    pub ipv4_forwarding_disabled: bool,
    pub bridge_nf_call_iptables_disabled: bool,
    pub bridge_nf_call_ip6tables_disabled: bool,
    pub limits: ResourceLimits,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLimits {
    pub memory_limit: bool,
    pub swap_limit: bool,
    pub kernel_memory: bool,
    pub oom_kill_disable: bool,
    pub cpu_cfs_period: bool,
    pub cpu_cfs_quota: bool,
    pub cpu_shares: bool,
    pub cpuset: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessStats {
    pub open_fds: usize,
    pub threads: usize,
}

// ── Containers ─────────────────────────────────────────────

/// Containers by state bucket. `stopped` is the catch-all for every state
/// other than running and paused.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityCounts {
    pub running: usize,
    pub paused: usize,
    pub stopped: usize,
}

impl EntityCounts {
    pub fn total(&self) -> usize {
        self.running + self.paused + self.stopped
    }
}

// ── Components ─────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentVersion {
    /// Identifier this build was made against.
    pub expected: String,
    /// Identifier reported by the running component, or `"N/A"`.
    pub observed: String,
}

impl ComponentVersion {
    pub fn unavailable(expected: impl Into<String>) -> Self {
        Self {
            expected: expected.into(),
            observed: NOT_AVAILABLE.to_string(),
        }
    }

    pub fn is_available(&self) -> bool {
        self.observed != NOT_AVAILABLE
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentVersions {
    pub containerd: ComponentVersion,
    pub runtime: ComponentVersion,
    pub init: ComponentVersion,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeInfo {
    pub runtimes: BTreeMap<String, String>,
    pub default_runtime: String,
    pub init_binary: String,
}

// ── Security ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityOption {
    pub key: String,
    pub value: String,
}

impl SecurityOption {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn name(value: impl Into<String>) -> Self {
        Self::new("Name", value)
    }
}

// ── Daemon side ────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginsInfo {
    pub volume: Vec<String>,
    pub network: Vec<String>,
    pub authorization: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryInfo {
    pub mirrors: Vec<String>,
    pub insecure_registries: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyInfo {
    pub http_proxy: String,
    pub https_proxy: String,
    pub no_proxy: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildInfo {
    pub version: String,
    pub git_commit: String,
    pub api_version: String,
    pub build_time: String,
    pub os_type: String,
    pub architecture: String,
}

/// Lightweight version report; only the kernel is probed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemVersion {
    pub version: String,
    pub git_commit: String,
    pub api_version: String,
    pub min_api_version: String,
    pub os: String,
    pub arch: String,
    pub kernel_version: String,
    pub build_time: String,
    pub experimental: bool,
}
