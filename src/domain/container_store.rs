//! In-memory container store.

use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use super::sources::{ContainerStore, StatefulEntity};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Container {
    pub id: String,
    pub state: String,
}

impl Container {
    pub fn new(id: impl Into<String>, state: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            state: state.into(),
        }
    }
}

impl StatefulEntity for Container {
    fn state(&self) -> &str {
        &self.state
    }
}

/// Containers keyed by id. The lock is held only to copy out the current
/// set; callbacks run without it.
#[derive(Debug, Default)]
pub struct MemoryContainerStore {
    containers: RwLock<BTreeMap<String, Arc<Container>>>,
}

impl MemoryContainerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a container by id.
    pub fn insert(&self, container: Container) {
        let mut map = self
            .containers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        map.insert(container.id.clone(), Arc::new(container));
    }

    pub fn len(&self) -> usize {
        self.containers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn list(&self) -> Vec<Arc<Container>> {
        self.containers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .values()
            .cloned()
            .collect()
    }
}

impl FromIterator<Container> for MemoryContainerStore {
    fn from_iter<I: IntoIterator<Item = Container>>(iter: I) -> Self {
        let store = Self::new();
        for container in iter {
            store.insert(container);
        }
        store
    }
}

impl ContainerStore for MemoryContainerStore {
    fn apply_all(&self, f: &(dyn Fn(&dyn StatefulEntity) + Sync)) {
        let containers = self.list();
        if containers.is_empty() {
            return;
        }

        let workers = std::thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1)
            .min(containers.len());
        let chunk_size = containers.len().div_ceil(workers);

        std::thread::scope(|scope| {
            for chunk in containers.chunks(chunk_size) {
                scope.spawn(move || {
                    for container in chunk {
                        f(container.as_ref());
                    }
                });
            }
        });
    }
}
