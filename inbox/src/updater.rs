//! Optimistic inbox updates
//!
//! A status change is written to the cached partitions first, then sent to
//! the server. If the server rejects it, every partition write made for that
//! request is undone and the user is notified. There is no partial outcome:
//! all requested messages change together or none do.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::api::{InboxApi, InboxMutation};
use crate::cache::{PartitionStore, PatchSet};
use crate::error::{InboxError, Result};
use crate::in_flight::InFlight;
use crate::message::Message;
use crate::notify::{Notice, Notifier};
use crate::partition::PartitionKey;
use crate::status::InboxStatus;

/// Status change requested by the client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRequest {
    pub project_name: String,
    pub ids: Vec<String>,
    pub status: InboxStatus,
    /// Toggles the cleared state, moving messages between partitions.
    #[serde(default)]
    pub is_active_change: bool,
    /// Partition currently holding the messages.
    pub active: bool,
    #[serde(default)]
    pub important: Option<bool>,
    pub last: u32,
}

impl UpdateRequest {
    /// Partition currently holding the messages
    pub fn partition(&self) -> PartitionKey {
        PartitionKey::new(self.last, self.important, self.active)
    }

    /// Requested ids, duplicates removed, first occurrence order kept
    pub fn unique_ids(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.ids
            .iter()
            .filter(|id| seen.insert(id.as_str()))
            .cloned()
            .collect()
    }

    fn mutation(&self, ids: Vec<String>) -> InboxMutation {
        InboxMutation {
            status: self.status,
            project_name: self.project_name.clone(),
            ids,
        }
    }
}

/// Terminal outcome of an update
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciled {
    /// The server accepted the change; the speculative state stays.
    Committed,
    /// The server rejected the change; the cache was restored.
    RolledBack { notice: Notice },
}

impl Reconciled {
    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Committed)
    }
}

/// Applies status changes to the cache ahead of the server.
///
/// Overlapping requests are serialized through the updater's [`InFlight`]
/// registry. Updaters that share a store should share the registry too, see
/// [`InboxUpdater::with_in_flight`].
pub struct InboxUpdater {
    store: Arc<dyn PartitionStore>,
    api: Arc<dyn InboxApi>,
    notifier: Arc<dyn Notifier>,
    in_flight: Arc<InFlight>,
}

impl InboxUpdater {
    pub fn new(
        store: Arc<dyn PartitionStore>,
        api: Arc<dyn InboxApi>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            api,
            notifier,
            in_flight: Arc::new(InFlight::new()),
        }
    }

    /// Serialize through `in_flight` instead of a registry of our own
    pub fn with_in_flight(mut self, in_flight: Arc<InFlight>) -> Self {
        self.in_flight = in_flight;
        self
    }

    pub fn store(&self) -> &Arc<dyn PartitionStore> {
        &self.store
    }

    pub fn in_flight(&self) -> &Arc<InFlight> {
        &self.in_flight
    }

    /// Update the status of inbox messages.
    ///
    /// Fails only for a request that cannot be served at all, before any
    /// cache write or network call. A server-side failure is not an error
    /// here: it is rolled back, reported through the notifier and returned
    /// as [`Reconciled::RolledBack`].
    ///
    /// Dropping the returned future before it completes rolls the cache
    /// back as well.
    pub async fn update(&self, request: &UpdateRequest) -> Result<Reconciled> {
        let ids = request.unique_ids();
        if ids.is_empty() {
            return Err(InboxError::EmptyRequest);
        }

        // Declared first so it is released after the speculation below.
        let _guard = self.in_flight.acquire(&ids).await;

        let speculation = Speculation {
            store: self.store.as_ref(),
            notifier: self.notifier.as_ref(),
            patches: Some(apply_speculative(self.store.as_ref(), request, &ids)),
        };
        debug!(
            "Applied {} speculative patch(es) for {} message(s)",
            speculation.len(),
            ids.len()
        );

        info!(
            "Updating {} inbox message(s) to {} in project {}",
            ids.len(),
            request.status,
            request.project_name
        );

        match self.api.update_messages(&request.mutation(ids)).await {
            Ok(()) => {
                speculation.commit();
                Ok(Reconciled::Committed)
            }
            Err(err) => {
                warn!("Inbox update failed, rolling back: {}", err);
                speculation.rollback();

                let notice = Notice::from_error(&err);
                self.notifier.notify(notice.clone());
                Ok(Reconciled::RolledBack { notice })
            }
        }
    }
}

/// Speculative patches waiting for the server's answer.
///
/// Reverted on drop unless committed, so an update abandoned mid-flight
/// leaves nothing unconfirmed in the cache.
struct Speculation<'a> {
    store: &'a dyn PartitionStore,
    notifier: &'a dyn Notifier,
    patches: Option<PatchSet>,
}

impl Speculation<'_> {
    fn len(&self) -> usize {
        self.patches.as_ref().map_or(0, PatchSet::len)
    }

    fn commit(mut self) {
        self.patches = None;
    }

    fn rollback(mut self) {
        if let Some(patches) = self.patches.take() {
            patches.revert_all(self.store);
        }
    }
}

impl Drop for Speculation<'_> {
    fn drop(&mut self) {
        if let Some(patches) = self.patches.take() {
            warn!("Inbox update abandoned before the server answered, rolling back");
            patches.revert_all(self.store);
            self.notifier.notify(Notice::warning(CANCELLED));
        }
    }
}

const CANCELLED: &str = "Inbox update was cancelled, changes reverted";

/// Write the requested change into the cache and return every patch made.
pub fn apply_speculative(
    store: &dyn PartitionStore,
    request: &UpdateRequest,
    ids: &[String],
) -> PatchSet {
    if request.is_active_change {
        move_across_partitions(store, request, ids)
    } else {
        patch_in_place(store, request, ids)
    }
}

/// Replace `read`/`active` of the requested messages inside their partition.
fn patch_in_place(store: &dyn PartitionStore, request: &UpdateRequest, ids: &[String]) -> PatchSet {
    let mut patches = PatchSet::new();
    let key = request.partition();

    let fields = request.status.fields();
    let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();

    patches.push(store.update_partition(&key, &mut |current| {
        let messages: Vec<Message> = current
            .iter()
            .map(|m| {
                if wanted.contains(m.reference_id.as_str()) {
                    m.with_status(fields.read, fields.active)
                } else {
                    m.clone()
                }
            })
            .collect();
        Some(messages)
    }));

    if patches.is_empty() {
        debug!("{} is not cached, nothing to patch", key);
    }
    patches
}

/// Move the requested messages out of their partition into the partition
/// matching their new cleared state.
fn move_across_partitions(
    store: &dyn PartitionStore,
    request: &UpdateRequest,
    ids: &[String],
) -> PatchSet {
    let mut patches = PatchSet::new();
    let source = request.partition();

    let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
    let mut moving: Vec<Message> = Vec::new();

    patches.push(store.update_partition(&source, &mut |current| {
        let (taken, staying): (Vec<Message>, Vec<Message>) = current
            .iter()
            .cloned()
            .partition(|m| wanted.contains(m.reference_id.as_str()));
        moving = taken;
        (!moving.is_empty()).then_some(staying)
    }));

    if moving.is_empty() {
        debug!("None of the requested messages are cached in {}", source);
        return patches;
    }

    let read = if source.active {
        true
    } else {
        request.status == InboxStatus::Read
    };

    // One message at a time: un-cleared messages scatter back to the
    // partition of their own importance.
    for message in moving {
        let destination = source.destination_for(&message);

        let mut moved = message.with_status(read, destination.active);
        moved.important = destination.important;
        let id = moved.reference_id.clone();

        let mut moved = Some(moved);
        let patch = store.update_partition(&destination, &mut |existing| {
            let mut messages = Vec::with_capacity(existing.len() + 1);
            messages.extend(moved.take());
            messages.extend(existing.iter().cloned());
            Some(messages)
        });

        match patch {
            Some(patch) => {
                debug!("Moved {} from {} to {}", id, source, destination);
                patches.push(Some(patch));
            }
            None => debug!("{} is not cached, {} leaves the cache", destination, id),
        }
    }

    patches
}
