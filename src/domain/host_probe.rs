//! Host probe backed by procfs and sysfs.
//!
//! Paths are resolved under a configurable root so the probe can be pointed
//! at a captured host tree. Every file format is handled by a pure parser
//! below the probe.

use std::path::{Path, PathBuf};

use tracing::debug;

use super::error::{ProbeError, ProbeResult};
use super::snapshot::{HostCapabilities, KernelVersion, MemInfo, ProcessStats, ResourceLimits};
use super::sources::HostProbe;

const OS_RELEASE: &str = "etc/os-release";
const OS_RELEASE_FALLBACK: &str = "usr/lib/os-release";
const CGROUP_ROOT: &str = "sys/fs/cgroup";

pub struct ProcfsProbe {
    root: PathBuf,
}

impl Default for ProcfsProbe {
    fn default() -> Self {
        Self::new("/")
    }
}

impl ProcfsProbe {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path(&self, rel: &str) -> PathBuf {
        self.root.join(rel.trim_start_matches('/'))
    }

    fn read(&self, rel: &str) -> ProbeResult<String> {
        let path = self.path(rel);
        std::fs::read_to_string(&path).map_err(|e| ProbeError::io(path, e))
    }

    fn exists(&self, rel: &str) -> bool {
        self.path(rel).exists()
    }

    /// A procfs switch that reads `1`. Unreadable counts as off.
    fn proc_bool(&self, rel: &str) -> bool {
        self.read(rel).map(|s| s.trim() == "1").unwrap_or(false)
    }

    fn apparmor_enabled(&self) -> bool {
        self.exists("sys/kernel/security/apparmor")
            && self
                .read("sys/module/apparmor/parameters/enabled")
                .map(|s| s.starts_with('Y'))
                .unwrap_or(false)
    }

    fn resource_limits(&self) -> ResourceLimits {
        if let Ok(controllers) = self.read(&format!("{CGROUP_ROOT}/cgroup.controllers")) {
            return limits_from_controllers(&controllers);
        }

        let v1 = |file: &str| self.exists(&format!("{CGROUP_ROOT}/{file}"));
        let limits = ResourceLimits {
            memory_limit: v1("memory"),
            swap_limit: v1("memory/memory.memsw.limit_in_bytes"),
            kernel_memory: v1("memory/memory.kmem.limit_in_bytes"),
            oom_kill_disable: v1("memory/memory.oom_control"),
            cpu_cfs_period: v1("cpu/cpu.cfs_period_us"),
            cpu_cfs_quota: v1("cpu/cpu.cfs_quota_us"),
            cpu_shares: v1("cpu/cpu.shares"),
            cpuset: v1("cpuset/cpuset.cpus"),
        };
        if !limits.memory_limit {
            debug!("no memory cgroup found; memory limits unsupported");
        }
        limits
    }
}

impl HostProbe for ProcfsProbe {
    fn kernel_version(&self) -> ProbeResult<KernelVersion> {
        parse_kernel_version(&self.read("proc/sys/kernel/osrelease")?)
    }

    fn operating_system(&self) -> ProbeResult<String> {
        let content = self
            .read(OS_RELEASE)
            .or_else(|_| self.read(OS_RELEASE_FALLBACK))?;
        Ok(parse_pretty_name(&content))
    }

    fn is_containerized(&self) -> ProbeResult<bool> {
        Ok(parse_containerized(&self.read("proc/1/cgroup")?))
    }

    fn mem_info(&self) -> ProbeResult<MemInfo> {
        parse_meminfo(&self.read("proc/meminfo")?)
    }

    fn capabilities(&self) -> HostCapabilities {
        HostCapabilities {
            apparmor: self.apparmor_enabled(),
            seccomp: seccomp_supported(),
            selinux: self.exists("sys/fs/selinux/enforce"),
            ipv4_forwarding_disabled: !self.proc_bool("proc/sys/net/ipv4/ip_forward"),
            bridge_nf_call_iptables_disabled: !self
                .proc_bool("proc/sys/net/bridge/bridge-nf-call-iptables"),
            bridge_nf_call_ip6tables_disabled: !self
                .proc_bool("proc/sys/net/bridge/bridge-nf-call-ip6tables"),
            limits: self.resource_limits(),
        }
    }

    fn process_stats(&self) -> ProcessStats {
        let open_fds = count_entries(&self.path("proc/self/fd"));
        let threads = self
            .read("proc/self/status")
            .ok()
            .and_then(|s| parse_status_threads(&s))
            .unwrap_or(0);
        ProcessStats { open_fds, threads }
    }

    fn num_cpu(&self) -> usize {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(0)
    }

    fn hostname(&self) -> ProbeResult<String> {
        hostname::get()
            .map(|h| h.to_string_lossy().to_string())
            .map_err(|e| ProbeError::io("hostname", e))
    }
}

#[cfg(target_os = "linux")]
fn seccomp_supported() -> bool {
    // SAFETY: PR_GET_SECCOMP takes no pointer arguments and only reports the
    // calling thread's mode.
    let rc = unsafe { libc::prctl(libc::PR_GET_SECCOMP, 0, 0, 0, 0) };
    rc != -1 || std::io::Error::last_os_error().raw_os_error() != Some(libc::EINVAL)
}

#[cfg(not(target_os = "linux"))]
fn seccomp_supported() -> bool {
    false
}

fn count_entries(dir: &Path) -> usize {
    match std::fs::read_dir(dir) {
        Ok(entries) => entries.count(),
        Err(e) => {
            debug!(path = %dir.display(), error = %e, "could not count open file descriptors");
            0
        }
    }
}

// ═══════════════════════════════════════════════════════════════
// Parsers
// ═══════════════════════════════════════════════════════════════

/// `K.M[.m]<flavor>`, e.g. `6.8.0-45-generic` or `4.9-rc1`.
pub fn parse_kernel_version(release: &str) -> ProbeResult<KernelVersion> {
    let release = release.trim();
    let err = || ProbeError::parse("kernel version", release);

    let (kernel, rest) = release.split_once('.').ok_or_else(err)?;
    let kernel = kernel.parse().map_err(|_| err())?;

    let (major, rest) = split_leading_number(rest).ok_or_else(err)?;
    let (minor, flavor) = rest
        .strip_prefix('.')
        .and_then(split_leading_number)
        .unwrap_or((0, rest));

    Ok(KernelVersion {
        kernel,
        major,
        minor,
        flavor: flavor.to_string(),
    })
}

fn split_leading_number(s: &str) -> Option<(u32, &str)> {
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let n = s[..end].parse().ok()?;
    Some((n, &s[end..]))
}

pub fn parse_pretty_name(os_release: &str) -> String {
    os_release
        .lines()
        .filter_map(|l| l.trim().strip_prefix("PRETTY_NAME="))
        .last()
        .map(|v| v.trim().trim_matches('"').trim_matches('\'').to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "Linux".into())
}

/// PID 1 sits outside the root cgroup (and outside systemd's init scope)
/// only when it runs inside a container.
pub fn parse_containerized(cgroup: &str) -> bool {
    cgroup
        .lines()
        .map(str::trim_end)
        .filter(|l| !l.is_empty())
        .any(|l| !l.ends_with('/') && !l.ends_with("init.scope"))
}

pub fn parse_meminfo(meminfo: &str) -> ProbeResult<MemInfo> {
    // Missing or unparsable lines are `None`; a kB value too large for bytes
    // is `Some(None)`.
    let field = |name: &str| -> Option<Option<u64>> {
        meminfo.lines().find_map(|l| {
            let (key, value) = l.split_once(':')?;
            if key.trim() != name {
                return None;
            }
            let mut parts = value.split_whitespace();
            let n: u64 = parts.next()?.parse().ok()?;
            Some(match parts.next() {
                Some("kB") => n.checked_mul(1024),
                _ => Some(n),
            })
        })
    };
    let bytes = |name: &'static str, required: bool| -> ProbeResult<u64> {
        match field(name) {
            Some(Some(n)) => Ok(n),
            Some(None) => Err(ProbeError::parse(name, meminfo)),
            None if required => Err(ProbeError::parse(name, meminfo)),
            None => Ok(0),
        }
    };

    Ok(MemInfo {
        mem_total: bytes("MemTotal", true)?,
        mem_free: bytes("MemFree", false)?,
        swap_total: bytes("SwapTotal", false)?,
        swap_free: bytes("SwapFree", false)?,
    })
}

pub fn parse_status_threads(status: &str) -> Option<usize> {
    status
        .lines()
        .find_map(|l| l.strip_prefix("Threads:"))
        .and_then(|v| v.trim().parse().ok())
}

/// cgroup v2: limits follow from the controllers enabled at the root.
pub fn limits_from_controllers(controllers: &str) -> ResourceLimits {
    let has = |name: &str| controllers.split_whitespace().any(|c| c == name);
    let memory = has("memory");
    let cpu = has("cpu");
    ResourceLimits {
        memory_limit: memory,
        swap_limit: memory,
        kernel_memory: false,
        oom_kill_disable: false,
        cpu_cfs_period: cpu,
        cpu_cfs_quota: cpu,
        cpu_shares: cpu,
        cpuset: has("cpuset"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kernel_version_variants() {
        let kv = parse_kernel_version("6.8.0-45-generic\n").unwrap();
        assert_eq!(
            kv,
            KernelVersion {
                kernel: 6,
                major: 8,
                minor: 0,
                flavor: "-45-generic".into()
            }
        );

        let kv = parse_kernel_version("4.9-rc1").unwrap();
        assert_eq!((kv.kernel, kv.major, kv.minor), (4, 9, 0));
        assert_eq!(kv.flavor, "-rc1");

        let kv = parse_kernel_version("3.12.25").unwrap();
        assert_eq!(kv.to_string(), "3.12.25");

        assert!(parse_kernel_version("garbage").is_err());
        assert!(parse_kernel_version("6.x").is_err());
    }

    #[test]
    fn pretty_name_strips_quotes() {
        let content = "NAME=\"Ubuntu\"\nPRETTY_NAME=\"Ubuntu 24.04.1 LTS\"\nID=ubuntu\n";
        assert_eq!(parse_pretty_name(content), "Ubuntu 24.04.1 LTS");
        assert_eq!(parse_pretty_name("PRETTY_NAME='Alpine Linux v3.20'"), "Alpine Linux v3.20");
    }

    #[test]
    fn pretty_name_missing_defaults_to_linux() {
        assert_eq!(parse_pretty_name("NAME=Foo\nID=foo\n"), "Linux");
        assert_eq!(parse_pretty_name("PRETTY_NAME=\"\""), "Linux");
    }

    #[test]
    fn containerized_detection() {
        let host_v1 = "12:memory:/\n11:cpu,cpuacct:/\n1:name=systemd:/init.scope\n";
        assert!(!parse_containerized(host_v1));
        assert!(!parse_containerized("0::/\n"));
        assert!(!parse_containerized("0::/init.scope\n"));

        let container = "12:memory:/docker/3f1a2b\n1:name=systemd:/docker/3f1a2b\n";
        assert!(parse_containerized(container));
        assert!(parse_containerized("0::/kubepods/besteffort/pod1234\n"));
    }

    #[test]
    fn meminfo_converts_kb() {
        let content = "MemTotal:       16303428 kB\nMemFree:         1234567 kB\nMemAvailable:   8000000 kB\nSwapTotal:       2097148 kB\nSwapFree:        2097148 kB\n";
        let mem = parse_meminfo(content).unwrap();
        assert_eq!(mem.mem_total, 16303428 * 1024);
        assert_eq!(mem.mem_free, 1234567 * 1024);
        assert_eq!(mem.swap_total, 2097148 * 1024);
        assert_eq!(mem.swap_free, 2097148 * 1024);
    }

    #[test]
    fn meminfo_requires_total() {
        assert!(parse_meminfo("MemFree: 12 kB\n").is_err());
    }

    #[test]
    fn meminfo_rejects_values_that_overflow_bytes() {
        assert!(parse_meminfo("MemTotal: 18446744073709551 kB\n").is_err());
        assert!(parse_meminfo("MemTotal: 1024 kB\nSwapTotal: 18446744073709551 kB\n").is_err());
        let mem = parse_meminfo("MemTotal: 18446744073709551 B\n").unwrap();
        assert_eq!(mem.mem_total, 18446744073709551);
    }

    #[test]
    fn status_threads() {
        let status = "Name:\tdiagsnap\nState:\tR (running)\nThreads:\t9\n";
        assert_eq!(parse_status_threads(status), Some(9));
        assert_eq!(parse_status_threads("Name: x\n"), None);
    }

    #[test]
    fn cgroup_v2_controllers() {
        let limits = limits_from_controllers("cpuset cpu io memory hugetlb pids rdma misc\n");
        assert!(limits.memory_limit && limits.swap_limit);
        assert!(limits.cpu_shares && limits.cpu_cfs_period && limits.cpu_cfs_quota);
        assert!(limits.cpuset);
        assert!(!limits.kernel_memory && !limits.oom_kill_disable);

        assert_eq!(limits_from_controllers("io pids"), ResourceLimits::default());
    }

    // ── probe over a fake host tree ──

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn probe_reads_fake_host() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "proc/sys/kernel/osrelease", "6.1.0-18-amd64\n");
        write(root, "usr/lib/os-release", "PRETTY_NAME=\"Debian GNU/Linux 12 (bookworm)\"\n");
        write(root, "proc/1/cgroup", "0::/\n");
        write(root, "proc/meminfo", "MemTotal: 1024 kB\n");
        write(root, "proc/sys/net/ipv4/ip_forward", "1\n");
        write(root, "sys/kernel/security/apparmor/profiles", "");
        write(root, "sys/module/apparmor/parameters/enabled", "Y\n");
        write(root, "sys/fs/cgroup/memory/memory.memsw.limit_in_bytes", "");
        write(root, "sys/fs/cgroup/cpu/cpu.shares", "1024\n");

        let probe = ProcfsProbe::new(root);
        assert_eq!(probe.kernel_version().unwrap().to_string(), "6.1.0-18-amd64");
        assert_eq!(
            probe.operating_system().unwrap(),
            "Debian GNU/Linux 12 (bookworm)"
        );
        assert!(!probe.is_containerized().unwrap());
        assert_eq!(probe.mem_info().unwrap().mem_total, 1024 * 1024);

        let caps = probe.capabilities();
        assert!(caps.apparmor);
        assert!(!caps.selinux);
        assert!(!caps.ipv4_forwarding_disabled);
        assert!(caps.bridge_nf_call_iptables_disabled);
        assert!(caps.limits.memory_limit);
        assert!(caps.limits.swap_limit);
        assert!(!caps.limits.kernel_memory);
        assert!(caps.limits.cpu_shares);
        assert!(!caps.limits.cpuset);
    }

    #[test]
    fn probe_on_empty_tree_reports_errors() {
        let dir = tempfile::tempdir().unwrap();
        let probe = ProcfsProbe::new(dir.path());
        assert!(matches!(probe.kernel_version(), Err(ProbeError::Io { .. })));
        assert!(probe.operating_system().is_err());
        assert!(probe.is_containerized().is_err());
        assert!(probe.mem_info().is_err());

        let caps = probe.capabilities();
        assert!(!caps.apparmor);
        assert!(caps.ipv4_forwarding_disabled);
        assert_eq!(caps.limits, ResourceLimits::default());
        assert_eq!(probe.process_stats(), ProcessStats::default());
    }
}
