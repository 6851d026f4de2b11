use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};

pub const ENV_PREFIX: &str = "DIAGSNAP_";
pub const DEFAULT_RUNTIME: &str = "runc";

/// Daemon settings the snapshot reports on. Read-only once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub daemon_id: String,
    pub root_dir: String,
    pub debug: bool,
    pub experimental: bool,
    pub live_restore: bool,
    pub labels: Vec<String>,
    pub log_level: String,
    pub logging_driver: String,
    pub cgroup_driver: String,
    pub isolation: String,
    pub selinux_enabled: bool,
    /// Empty means the built-in profile.
    pub seccomp_profile: String,
    pub authorization_plugins: Vec<String>,
    pub cluster_store: String,
    pub cluster_advertise: String,
    pub index_server_address: String,
    pub registry_mirrors: Vec<String>,
    pub insecure_registries: Vec<String>,
    pub default_runtime: String,
    /// Extra runtimes, name → binary path.
    pub runtimes: BTreeMap<String, String>,
    pub runtime_binary: PathBuf,
    pub init_binary: PathBuf,
    pub containerd_binary: PathBuf,
    pub inventory: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            daemon_id: String::new(),
            root_dir: "/var/lib/docker".into(),
            debug: false,
            experimental: false,
            live_restore: false,
            labels: Vec::new(),
            log_level: "info".into(),
            logging_driver: "json-file".into(),
            cgroup_driver: "cgroupfs".into(),
            isolation: String::new(),
            selinux_enabled: false,
            seccomp_profile: String::new(),
            authorization_plugins: Vec::new(),
            cluster_store: String::new(),
            cluster_advertise: String::new(),
            index_server_address: "https://index.docker.io/v1/".into(),
            registry_mirrors: Vec::new(),
            insecure_registries: vec!["127.0.0.0/8".into()],
            default_runtime: DEFAULT_RUNTIME.into(),
            runtimes: BTreeMap::new(),
            runtime_binary: PathBuf::from("runc"),
            init_binary: PathBuf::from("docker-init"),
            containerd_binary: PathBuf::from("containerd"),
            inventory: None,
        }
    }
}

impl Config {
    pub fn path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("could not determine config directory")?;
        Ok(config_dir.join("diagsnap").join("config.yaml"))
    }

    /// Defaults, then the YAML file, then `DIAGSNAP_*` environment variables.
    pub fn figment(file: &Path) -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Yaml::file(file))
            .merge(Env::prefixed(ENV_PREFIX))
    }

    /// Every configured runtime, with the built-in one always present.
    pub fn all_runtimes(&self) -> BTreeMap<String, String> {
        let mut runtimes = self.runtimes.clone();
        runtimes
            .entry(DEFAULT_RUNTIME.to_string())
            .or_insert_with(|| self.runtime_binary.display().to_string());
        runtimes
    }
}

/// Load from an explicit file (which must exist) or the default location
/// (which may be absent).
pub fn load(explicit: Option<&Path>) -> Result<Config> {
    let path = match explicit {
        Some(p) => {
            if !p.exists() {
                bail!("config file {} does not exist", p.display());
            }
            p.to_path_buf()
        }
        None => Config::path()?,
    };

    Config::figment(&path)
        .extract()
        .with_context(|| format!("loading configuration from {}", path.display()))
}
