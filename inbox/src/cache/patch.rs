//! Undo handles for partition writes

use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use super::PartitionStore;
use crate::message::Message;
use crate::partition::PartitionKey;

/// Undo handle for one partition write.
///
/// Holds the list the partition had before the write and the list the
/// write installed. Lists are never mutated in place, so `after` doubles as
/// an identity check: if the partition still holds it, nothing else has
/// written there since.
#[derive(Debug, Clone)]
pub struct Patch {
    key: PartitionKey,
    before: Arc<Vec<Message>>,
    after: Arc<Vec<Message>>,
}

impl Patch {
    pub fn new(key: PartitionKey, before: Arc<Vec<Message>>, after: Arc<Vec<Message>>) -> Self {
        Self { key, before, after }
    }

    pub fn key(&self) -> &PartitionKey {
        &self.key
    }

    /// Compute the list to install when undoing this patch on top of
    /// `current`.
    ///
    /// When the partition is untouched since the write, this is exactly the
    /// prior list. Otherwise only the messages this patch touched are put
    /// back and every other change is kept.
    pub fn undo_onto(&self, current: &Arc<Vec<Message>>) -> Arc<Vec<Message>> {
        if Arc::ptr_eq(current, &self.after) {
            return self.before.clone();
        }

        debug!(
            "{} changed since patch was applied, undoing touched messages only",
            self.key
        );
        Arc::new(rebase(&self.before, &self.after, current))
    }
}

/// Undo the difference between `before` and `after` on top of `current`.
fn rebase(before: &[Message], after: &[Message], current: &[Message]) -> Vec<Message> {
    let prior: HashMap<&str, &Message> = before
        .iter()
        .map(|m| (m.reference_id.as_str(), m))
        .collect();
    let written: HashMap<&str, &Message> = after
        .iter()
        .map(|m| (m.reference_id.as_str(), m))
        .collect();

    let mut result: Vec<Message> = current
        .iter()
        .filter_map(|m| {
            let id = m.reference_id.as_str();
            match (prior.get(id), written.get(id)) {
                // inserted by the patch
                (None, Some(_)) => None,
                // modified by the patch
                (Some(old), Some(new)) if old != new => Some((*old).clone()),
                _ => Some(m.clone()),
            }
        })
        .collect();

    // Put back what the patch removed next to the neighbour it used to
    // have, so messages others added meanwhile keep their place.
    for (index, old) in before.iter().enumerate() {
        let id = old.reference_id.as_str();
        if written.contains_key(id) || position(&result, id).is_some() {
            continue;
        }
        let at = before[..index]
            .iter()
            .rev()
            .find_map(|m| position(&result, &m.reference_id).map(|p| p + 1))
            .or_else(|| {
                before[index + 1..]
                    .iter()
                    .find_map(|m| position(&result, &m.reference_id))
            })
            .unwrap_or_else(|| index.min(result.len()));
        result.insert(at, old.clone());
    }

    result
}

fn position(messages: &[Message], id: &str) -> Option<usize> {
    messages.iter().position(|m| m.reference_id == id)
}

/// Every patch issued while serving one request, in application order
#[derive(Debug, Default)]
pub struct PatchSet {
    patches: Vec<Patch>,
}

impl PatchSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a patch. Writes to uncached partitions yield no patch and are
    /// ignored.
    pub fn push(&mut self, patch: Option<Patch>) {
        if let Some(patch) = patch {
            self.patches.push(patch);
        }
    }

    pub fn len(&self) -> usize {
        self.patches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }

    /// Revert every tracked patch, newest first.
    pub fn revert_all(self, store: &dyn PartitionStore) {
        for patch in self.patches.into_iter().rev() {
            store.revert(patch);
        }
    }
}
