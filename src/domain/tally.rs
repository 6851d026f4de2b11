//! Container state tally.
//!
//! Counters are atomics shared by whatever threads the store uses to walk its
//! containers; nothing holds a lock across the walk. If the store mutates
//! while it is being walked, the result reflects whichever containers were
//! visited.

use std::sync::atomic::{AtomicUsize, Ordering};

use super::snapshot::EntityCounts;
use super::sources::{ContainerStore, StatefulEntity};

pub const STATE_RUNNING: &str = "running";
pub const STATE_PAUSED: &str = "paused";

#[derive(Default)]
struct Counters {
    running: AtomicUsize,
    paused: AtomicUsize,
    stopped: AtomicUsize,
}

impl Counters {
    fn record(&self, entity: &dyn StatefulEntity) {
        let bucket = match entity.state() {
            STATE_PAUSED => &self.paused,
            STATE_RUNNING => &self.running,
            _ => &self.stopped,
        };
        bucket.fetch_add(1, Ordering::Relaxed);
    }

    fn into_counts(self) -> EntityCounts {
        EntityCounts {
            running: self.running.into_inner(),
            paused: self.paused.into_inner(),
            stopped: self.stopped.into_inner(),
        }
    }
}

/// Classify every container in `store` as running, paused or stopped.
pub fn tally(store: &dyn ContainerStore) -> EntityCounts {
    let counters = Counters::default();
    store.apply_all(&|entity: &dyn StatefulEntity| counters.record(entity));
    counters.into_counts()
}
