//! Per-message serialization of in-flight updates
//!
//! Two updates whose id sets overlap never have their speculative patches
//! in the cache at the same time: the later one waits until the earlier one
//! has committed or rolled back. Updates on disjoint ids run concurrently.
//!
//! A registry only serializes the updates that go through it. Updaters
//! working on the same cache must share one.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;

type Slot = Arc<AsyncMutex<()>>;

#[derive(Debug, Default)]
pub struct InFlight {
    slots: Mutex<HashMap<String, Slot>>,
}

/// Held for the whole life of one update
pub struct InFlightGuard<'a> {
    registry: &'a InFlight,
    guards: Vec<OwnedMutexGuard<()>>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock every id of a request.
    ///
    /// Ids are locked in sorted order so two requests can never each hold
    /// a lock the other is waiting for. Cancelling the returned future
    /// releases whatever it had already locked.
    pub async fn acquire(&self, ids: &[String]) -> InFlightGuard<'_> {
        let mut ids: Vec<&String> = ids.iter().collect();
        ids.sort();
        ids.dedup();

        let mut held = InFlightGuard {
            registry: self,
            guards: Vec::with_capacity(ids.len()),
        };

        for id in ids {
            let slot = self.slot(id);
            if slot.try_lock().is_err() {
                debug!("Message {} has an update in flight, waiting", id);
            }
            held.guards.push(slot.lock_owned().await);
        }

        held
    }

    fn slot(&self, id: &str) -> Slot {
        let mut registry = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        registry.entry(id.to_string()).or_default().clone()
    }

    /// Number of ids with a live lock slot
    pub fn len(&self) -> usize {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.guards.clear();

        // Forget every slot nobody is holding or waiting on, including ones
        // left behind by cancelled acquisitions.
        let mut registry = self
            .registry
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        registry.retain(|_, slot| Arc::strong_count(slot) > 1);
    }
}
