//! Inventory: daemon-side state described in a YAML file.
//!
//! Lets the CLI inspect a host without a running daemon: containers, image
//! count, storage driver, plugins, event subscribers and the user-namespace
//! remap come from the file, everything else is probed live.
//!
//! ```yaml
//! containers:
//!   - id: 3f1a2b
//!     state: running
//! images: 12
//! driver: overlay2
//! driver_status:
//!   - ["Backing Filesystem", "extfs"]
//! plugins:
//!   volume: [local]
//!   network: [bridge, host, null]
//! events_listeners: 1
//! userns_remap: { uid: 100000, gid: 100000 }
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::container_store::{Container, MemoryContainerStore};
use super::sources::{
    ContainerStore, EventsService, IdentityMapping, ImageStore, LayerStore, PluginRegistry,
    StatefulEntity,
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InventoryFile {
    pub containers: Vec<Container>,
    pub images: usize,
    pub driver: String,
    pub driver_status: Vec<(String, String)>,
    pub plugins: PluginLists,
    pub events_listeners: usize,
    pub userns_remap: Remap,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginLists {
    pub volume: Vec<String>,
    pub network: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Remap {
    pub uid: u32,
    pub gid: u32,
}

/// Loaded inventory serving every daemon-side collaborator trait.
#[derive(Debug, Default)]
pub struct Inventory {
    containers: MemoryContainerStore,
    images: usize,
    driver: String,
    driver_status: Vec<(String, String)>,
    plugins: PluginLists,
    events_listeners: usize,
    remap: Remap,
}

impl Inventory {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let file: InventoryFile = serde_yaml::from_str(&content)
            .with_context(|| format!("parsing {}", path.display()))?;
        Ok(Self::from(file))
    }

    pub fn containers(&self) -> &MemoryContainerStore {
        &self.containers
    }
}

impl From<InventoryFile> for Inventory {
    fn from(file: InventoryFile) -> Self {
        Self {
            containers: file.containers.into_iter().collect(),
            images: file.images,
            driver: file.driver,
            driver_status: file.driver_status,
            plugins: file.plugins,
            events_listeners: file.events_listeners,
            remap: file.userns_remap,
        }
    }
}

impl ContainerStore for Inventory {
    fn apply_all(&self, f: &(dyn Fn(&dyn StatefulEntity) + Sync)) {
        self.containers.apply_all(f)
    }
}

impl ImageStore for Inventory {
    fn image_count(&self) -> usize {
        self.images
    }
}

impl LayerStore for Inventory {
    fn driver_name(&self) -> String {
        self.driver.clone()
    }

    fn driver_status(&self) -> Vec<(String, String)> {
        self.driver_status.clone()
    }
}

impl PluginRegistry for Inventory {
    fn volume_drivers(&self) -> Vec<String> {
        self.plugins.volume.clone()
    }

    fn network_drivers(&self) -> Vec<String> {
        self.plugins.network.clone()
    }
}

impl EventsService for Inventory {
    fn subscribers_count(&self) -> usize {
        self.events_listeners
    }
}

impl IdentityMapping for Inventory {
    fn remapped_root(&self) -> (u32, u32) {
        (self.remap.uid, self.remap.gid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
containers:
  - id: 3f1a2b
    state: running
    name: web
  - id: 9c8d7e
    state: exited
images: 12
driver: overlay2
driver_status:
  - ["Backing Filesystem", "extfs"]
  - ["Supports d_type", "true"]
plugins:
  volume: [local]
  network: [bridge, host, "null"]
events_listeners: 2
userns_remap:
  uid: 100000
  gid: 100000
"#;

    #[test]
    fn load_sample_inventory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inventory.yaml");
        std::fs::write(&path, SAMPLE).unwrap();

        let inv = Inventory::load(&path).unwrap();
        assert_eq!(inv.containers().len(), 2);
        assert_eq!(inv.image_count(), 12);
        assert_eq!(inv.driver_name(), "overlay2");
        assert_eq!(
            inv.driver_status()[0],
            ("Backing Filesystem".to_string(), "extfs".to_string())
        );
        assert_eq!(inv.volume_drivers(), vec!["local"]);
        assert_eq!(inv.network_drivers(), vec!["bridge", "host", "null"]);
        assert_eq!(inv.subscribers_count(), 2);
        assert_eq!(inv.remapped_root(), (100000, 100000));
    }

    #[test]
    fn missing_sections_default() {
        let file: InventoryFile = serde_yaml::from_str("images: 3\n").unwrap();
        let inv = Inventory::from(file);
        assert!(inv.containers().is_empty());
        assert_eq!(inv.image_count(), 3);
        assert_eq!(inv.driver_name(), "");
        assert_eq!(inv.remapped_root(), (0, 0));
    }

    #[test]
    fn demo_inventory_parses() {
        let file: InventoryFile =
            serde_yaml::from_str(include_str!("../../demos/inventory.yaml")).unwrap();
        let inv = Inventory::from(file);
        assert_eq!(inv.containers().len(), 5);
        assert_eq!(inv.driver_name(), "overlay2");
        assert_eq!(inv.remapped_root(), (0, 0));
    }

    #[test]
    fn load_reports_path_on_error() {
        let err = Inventory::load(Path::new("/nonexistent/inventory.yaml")).unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/inventory.yaml"));
    }
}
