//! Collaborators the snapshot builder reads from.
//!
//! Everything here is read-only from the builder's point of view. Host facts
//! come from a [`HostProbe`]; daemon state (containers, images, storage
//! driver, plugins, event subscribers, user-namespace remap) comes from the
//! traits bundled in [`DaemonSources`]; component versions come from a
//! [`ContainerdClient`] and a [`CommandRunner`].

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use super::error::ProbeResult;
use super::snapshot::{HostCapabilities, KernelVersion, MemInfo, ProcessStats};

// ── Host ───────────────────────────────────────────────────

pub trait HostProbe: Send + Sync {
    fn kernel_version(&self) -> ProbeResult<KernelVersion>;

    fn operating_system(&self) -> ProbeResult<String>;

    fn is_containerized(&self) -> ProbeResult<bool>;

    fn mem_info(&self) -> ProbeResult<MemInfo>;

    /// Individual checks that cannot be answered read as "not available".
    fn capabilities(&self) -> HostCapabilities;

    fn process_stats(&self) -> ProcessStats;

    fn num_cpu(&self) -> usize;

    fn hostname(&self) -> ProbeResult<String>;
}

// ── Containers ─────────────────────────────────────────────

pub trait StatefulEntity: Send + Sync {
    /// Lifecycle state as reported to users: "running", "paused", "exited", ...
    fn state(&self) -> &str;
}

pub trait ContainerStore: Send + Sync {
    /// Invoke `f` once for every container. Implementations may fan the
    /// calls out across threads.
    fn apply_all(&self, f: &(dyn Fn(&dyn StatefulEntity) + Sync));
}

// ── Daemon registries ──────────────────────────────────────

pub trait ImageStore: Send + Sync {
    fn image_count(&self) -> usize;
}

pub trait LayerStore: Send + Sync {
    fn driver_name(&self) -> String;

    fn driver_status(&self) -> Vec<(String, String)>;
}

pub trait PluginRegistry: Send + Sync {
    fn volume_drivers(&self) -> Vec<String>;

    fn network_drivers(&self) -> Vec<String>;
}

pub trait EventsService: Send + Sync {
    fn subscribers_count(&self) -> usize;
}

pub trait IdentityMapping: Send + Sync {
    /// Host uid/gid that container root maps to; `(0, 0)` when not remapped.
    fn remapped_root(&self) -> (u32, u32);
}

pub trait EnvLookup: Send + Sync {
    fn var(&self, key: &str) -> Option<String>;
}

/// Reads the real process environment.
pub struct ProcessEnv;

impl EnvLookup for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// Proxy setting from the environment, upper-case name first.
pub fn proxy_env(env: &dyn EnvLookup, key: &str) -> String {
    env.var(&key.to_uppercase())
        .filter(|v| !v.is_empty())
        .or_else(|| env.var(&key.to_lowercase()))
        .unwrap_or_default()
}

// ── Components ─────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerVersion {
    pub version: String,
    pub revision: String,
}

#[async_trait]
pub trait ContainerdClient: Send + Sync {
    async fn server_version(&self) -> ProbeResult<ServerVersion>;
}

#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `program --version` and return its standard output.
    async fn version_output(&self, program: &Path) -> ProbeResult<String>;
}

/// Daemon-side state, one handle per concern.
#[derive(Clone)]
pub struct DaemonSources {
    pub containers: Arc<dyn ContainerStore>,
    pub images: Arc<dyn ImageStore>,
    pub layers: Arc<dyn LayerStore>,
    pub plugins: Arc<dyn PluginRegistry>,
    pub events: Arc<dyn EventsService>,
    pub identity: Arc<dyn IdentityMapping>,
}

impl DaemonSources {
    /// Use one value for every concern.
    pub fn from_shared<T>(state: Arc<T>) -> Self
    where
        T: ContainerStore
            + ImageStore
            + LayerStore
            + PluginRegistry
            + EventsService
            + IdentityMapping
            + 'static,
    {
        Self {
            containers: state.clone(),
            images: state.clone(),
            layers: state.clone(),
            plugins: state.clone(),
            events: state.clone(),
            identity: state,
        }
    }
}
