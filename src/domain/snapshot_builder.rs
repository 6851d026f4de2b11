//! Snapshot builder: merges host probes, the container tally, component
//! versions and daemon settings into one [`Snapshot`].
//!
//! `build` never fails. Each source that errors is logged and replaced by its
//! placeholder; the rest of the snapshot is unaffected.

use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use tracing::{debug, error, warn};

use crate::build_info::{self, ExpectedCommits};
use crate::config::Config;
use crate::platform::{Capabilities, Platform};

use super::snapshot::*;
use super::sources::{
    proxy_env, CommandRunner, ContainerdClient, DaemonSources, EnvLookup, HostProbe, ProcessEnv,
};
use super::tally::tally;
use super::versions::{self, ContainerdCli, ProcessRunner};

const CONTAINERIZED_SUFFIX: &str = " (containerized)";
const CONTAINERIZED_ERROR_SUFFIX: &str = " (error determining if containerized)";
const DEFAULT_SECCOMP_PROFILE: &str = "default";

pub struct SnapshotBuilder {
    config: Arc<Config>,
    platform: Platform,
    host: Arc<dyn HostProbe>,
    daemon: DaemonSources,
    containerd: Arc<dyn ContainerdClient>,
    runner: Arc<dyn CommandRunner>,
    env: Arc<dyn EnvLookup>,
    expected: ExpectedCommits,
}

/// Everything read from the host probe in one pass.
struct HostReadings {
    facts: HostFacts,
    capabilities: HostCapabilities,
    process: ProcessStats,
    ncpu: usize,
    hostname: String,
}

impl SnapshotBuilder {
    /// Builder for the current platform, running component binaries as
    /// subprocesses.
    pub fn new(config: Arc<Config>, host: Arc<dyn HostProbe>, daemon: DaemonSources) -> Self {
        let runner: Arc<dyn CommandRunner> = Arc::new(ProcessRunner);
        let containerd = Arc::new(ContainerdCli::new(
            config.containerd_binary.clone(),
            runner.clone(),
        ));
        Self {
            config,
            platform: Platform::current(),
            host,
            daemon,
            containerd,
            runner,
            env: Arc::new(ProcessEnv),
            expected: ExpectedCommits::default(),
        }
    }

    /// Collect a complete snapshot. Every call re-reads every source.
    pub async fn build(&self) -> Snapshot {
        let caps = self.platform.capabilities;

        let (host, containers, components) = tokio::join!(
            self.collect_host(caps),
            self.tally_containers(),
            self.resolve_components(caps),
        );

        let config = &self.config;
        let daemon = &self.daemon;
        let remap = daemon.identity.remapped_root();

        let snapshot = Snapshot {
            id: config.daemon_id.clone(),
            name: host.hostname,
            total_containers: containers.total(),
            containers,
            images: daemon.images.image_count(),
            driver: daemon.layers.driver_name(),
            driver_status: daemon.layers.driver_status(),
            plugins: PluginsInfo {
                volume: daemon.plugins.volume_drivers(),
                network: daemon.plugins.network_drivers(),
                authorization: config.authorization_plugins.clone(),
            },
            ipv4_forwarding: !host.capabilities.ipv4_forwarding_disabled,
            bridge_nf_iptables: !host.capabilities.bridge_nf_call_iptables_disabled,
            bridge_nf_ip6tables: !host.capabilities.bridge_nf_call_ip6tables_disabled,
            debug: config.debug,
            n_fd: host.process.open_fds,
            n_threads: host.process.threads,
            system_time: Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true),
            logging_driver: config.logging_driver.clone(),
            cgroup_driver: config.cgroup_driver.clone(),
            n_events_listener: daemon.events.subscribers_count(),
            index_server_address: config.index_server_address.clone(),
            registry: RegistryInfo {
                mirrors: config.registry_mirrors.clone(),
                insecure_registries: config.insecure_registries.clone(),
            },
            ncpu: host.ncpu,
            root_dir: config.root_dir.clone(),
            labels: config.labels.clone(),
            experimental_build: config.experimental,
            live_restore_enabled: config.live_restore,
            cluster_store: config.cluster_store.clone(),
            cluster_advertise: config.cluster_advertise.clone(),
            proxy: ProxyInfo {
                http_proxy: proxy_env(self.env.as_ref(), "http_proxy"),
                https_proxy: proxy_env(self.env.as_ref(), "https_proxy"),
                no_proxy: proxy_env(self.env.as_ref(), "no_proxy"),
            },
            isolation: config.isolation.clone(),
            build: self.build_info(),
            resource_limits: caps.resource_limits.then_some(host.capabilities.limits),
            runtime: caps.component_versions.then(|| RuntimeInfo {
                runtimes: config.all_runtimes(),
                default_runtime: config.default_runtime.clone(),
                init_binary: config.init_binary.display().to_string(),
            }),
            components,
            security_options: security_options(&host.capabilities, caps, config, remap),
            host: host.facts,
        };

        debug!(
            containers = snapshot.total_containers,
            images = snapshot.images,
            "snapshot built"
        );
        snapshot
    }

    /// Version report; the kernel is the only thing probed.
    pub fn version(&self) -> SystemVersion {
        SystemVersion {
            version: build_info::VERSION.to_string(),
            git_commit: build_info::GIT_COMMIT.to_string(),
            api_version: build_info::API_VERSION.to_string(),
            min_api_version: build_info::MIN_API_VERSION.to_string(),
            os: self.platform.os_type(),
            arch: self.platform.arch.to_string(),
            kernel_version: kernel_version(self.host.as_ref()),
            build_time: build_info::BUILD_TIME.to_string(),
            experimental: self.config.experimental,
        }
    }

    fn build_info(&self) -> BuildInfo {
        BuildInfo {
            version: build_info::VERSION.to_string(),
            git_commit: build_info::GIT_COMMIT.to_string(),
            api_version: build_info::API_VERSION.to_string(),
            build_time: build_info::BUILD_TIME.to_string(),
            os_type: self.platform.os_type(),
            architecture: self.platform.arch.to_string(),
        }
    }

    async fn collect_host(&self, caps: Capabilities) -> HostReadings {
        let host = Arc::clone(&self.host);
        match tokio::task::spawn_blocking(move || read_host(host.as_ref(), caps)).await {
            Ok(readings) => readings,
            Err(e) => {
                error!(error = %e, "host probe task failed");
                HostReadings {
                    facts: HostFacts {
                        kernel_version: UNKNOWN.into(),
                        operating_system: UNKNOWN.into(),
                        containerized: None,
                        memory: MemInfo::default(),
                        security_capabilities: Vec::new(),
                    },
                    capabilities: HostCapabilities::default(),
                    process: ProcessStats::default(),
                    ncpu: 0,
                    hostname: String::new(),
                }
            }
        }
    }

    async fn tally_containers(&self) -> EntityCounts {
        let store = Arc::clone(&self.daemon.containers);
        match tokio::task::spawn_blocking(move || tally(store.as_ref())).await {
            Ok(counts) => counts,
            Err(e) => {
                error!(error = %e, "container tally failed");
                EntityCounts::default()
            }
        }
    }

    async fn resolve_components(&self, caps: Capabilities) -> Option<ComponentVersions> {
        if !caps.component_versions {
            return None;
        }

        let config = &self.config;
        let (containerd, runtime, init) = tokio::join!(
            versions::resolve_containerd(self.containerd.as_ref(), &self.expected.containerd),
            versions::resolve_runtime(
                self.runner.as_ref(),
                &config.runtime_binary,
                &self.expected.runtime
            ),
            versions::resolve_init(
                self.runner.as_ref(),
                &config.init_binary,
                &self.expected.init
            ),
        );

        Some(ComponentVersions {
            containerd,
            runtime,
            init,
        })
    }
}

#[cfg(test)]
impl SnapshotBuilder {
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn with_runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = runner;
        self
    }

    pub fn with_containerd(mut self, containerd: Arc<dyn ContainerdClient>) -> Self {
        self.containerd = containerd;
        self
    }

    pub fn with_env(mut self, env: Arc<dyn EnvLookup>) -> Self {
        self.env = env;
        self
    }

    pub fn with_expected(mut self, expected: ExpectedCommits) -> Self {
        self.expected = expected;
        self
    }
}

fn kernel_version(host: &dyn HostProbe) -> String {
    match host.kernel_version() {
        Ok(kv) => kv.to_string(),
        Err(e) => {
            warn!(error = %e, "could not get kernel version");
            UNKNOWN.into()
        }
    }
}

fn read_host(host: &dyn HostProbe, caps: Capabilities) -> HostReadings {
    let kernel_version = kernel_version(host);

    let mut operating_system = host.operating_system().unwrap_or_else(|e| {
        warn!(error = %e, "could not get operating system name");
        UNKNOWN.into()
    });

    let containerized = if caps.containerized_check {
        match host.is_containerized() {
            Ok(inside) => {
                if inside {
                    operating_system.push_str(CONTAINERIZED_SUFFIX);
                }
                Some(inside)
            }
            Err(e) => {
                error!(error = %e, "could not determine if daemon is containerized");
                operating_system.push_str(CONTAINERIZED_ERROR_SUFFIX);
                None
            }
        }
    } else {
        None
    };

    let memory = host.mem_info().unwrap_or_else(|e| {
        error!(error = %e, "could not read system memory info");
        MemInfo::default()
    });

    let hostname = host.hostname().unwrap_or_else(|e| {
        warn!(error = %e, "could not get hostname");
        String::new()
    });

    let capabilities = host.capabilities();
    let security_capabilities = [
        ("apparmor", capabilities.apparmor),
        ("seccomp", capabilities.seccomp),
        ("selinux", capabilities.selinux),
    ]
    .into_iter()
    .filter(|(_, detected)| *detected)
    .map(|(name, _)| name.to_string())
    .collect();

    HostReadings {
        facts: HostFacts {
            kernel_version,
            operating_system,
            containerized,
            memory,
            security_capabilities,
        },
        capabilities,
        process: host.process_stats(),
        ncpu: host.num_cpu(),
        hostname,
    }
}

/// Security options in fixed order: apparmor, seccomp (+ profile), selinux,
/// userns.
pub fn security_options(
    host: &HostCapabilities,
    caps: Capabilities,
    config: &Config,
    remap: (u32, u32),
) -> Vec<SecurityOption> {
    let mut options = Vec::new();

    if host.apparmor {
        options.push(SecurityOption::name("apparmor"));
    }
    if host.seccomp && caps.seccomp {
        let profile = if config.seccomp_profile.is_empty() {
            DEFAULT_SECCOMP_PROFILE
        } else {
            config.seccomp_profile.as_str()
        };
        options.push(SecurityOption::name("seccomp"));
        options.push(SecurityOption::new("Profile", profile));
    }
    if host.selinux && config.selinux_enabled {
        options.push(SecurityOption::name("selinux"));
    }
    let (uid, gid) = remap;
    if uid != 0 || gid != 0 {
        options.push(SecurityOption::name("userns"));
    }

    options
}
