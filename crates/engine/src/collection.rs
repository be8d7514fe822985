//! The ordered, keyed store of pending resource declarations.
//!
//! Resources converge in declaration order, so the collection is a sequence
//! first and a lookup table second. Slots are tombstoned on retraction rather
//! than shifted, which keeps a [`ResourceId`] (the slot index) a stable
//! identity for the whole run. The secondary index maps canonical key strings
//! to the live slots that carry them; it never references a tombstoned slot.
//!
//! Duplicate keys are allowed by design: a recipe may declare, unwind, and
//! redeclare the same logical resource. `lookup` resolves to the newest live
//! match, while `unwind` retracts every instance sharing the key.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ResourceNotFound;
use crate::resource::Resource;

/// Stable identity of a declaration within one run.
///
/// Slot indices are never reused, so an id stays valid (as an identity, not
/// as a live reference) even after the resource is retracted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceId(pub usize);

/// Ordered store of declared resources with retraction by key.
#[derive(Debug, Default)]
pub struct ResourceCollection {
  /// Declaration-ordered slots; `None` marks a retracted resource.
  slots: Vec<Option<Resource>>,
  /// Canonical key -> live slots carrying that key, oldest first.
  index: HashMap<String, Vec<ResourceId>>,
}

impl ResourceCollection {
  pub fn new() -> Self {
    Self::default()
  }

  /// Append a resource at the end of the sequence.
  ///
  /// No uniqueness constraint: redeclaring an existing key appends a second
  /// instance rather than replacing the first.
  pub fn append(&mut self, resource: Resource) -> ResourceId {
    let id = ResourceId(self.slots.len());
    let key = resource.key().to_string();
    debug!(resource = %key, id = id.0, "appending resource");
    self.index.entry(key).or_default().push(id);
    self.slots.push(Some(resource));
    id
  }

  /// Look up the most recently declared live resource with this key.
  pub fn lookup(&self, key: &str) -> Result<&Resource, ResourceNotFound> {
    let id = self.newest(key)?;
    self.get(id).ok_or_else(|| ResourceNotFound::new(key))
  }

  /// Id of the most recently declared live resource with this key.
  pub fn newest(&self, key: &str) -> Result<ResourceId, ResourceNotFound> {
    self
      .index
      .get(key)
      .and_then(|ids| ids.last().copied())
      .ok_or_else(|| ResourceNotFound::new(key))
  }

  pub fn get(&self, id: ResourceId) -> Option<&Resource> {
    self.slots.get(id.0).and_then(|slot| slot.as_ref())
  }

  pub fn get_mut(&mut self, id: ResourceId) -> Option<&mut Resource> {
    self.slots.get_mut(id.0).and_then(|slot| slot.as_mut())
  }

  /// Live resources in declaration order.
  pub fn all_resources(&self) -> impl Iterator<Item = &Resource> {
    self.slots.iter().filter_map(|slot| slot.as_ref())
  }

  /// Live `(id, resource)` pairs in declaration order.
  pub fn iter(&self) -> impl Iterator<Item = (ResourceId, &Resource)> {
    self
      .slots
      .iter()
      .enumerate()
      .filter_map(|(i, slot)| slot.as_ref().map(|r| (ResourceId(i), r)))
  }

  /// Number of live resources.
  pub fn len(&self) -> usize {
    self.index.values().map(Vec::len).sum()
  }

  pub fn is_empty(&self) -> bool {
    self.index.is_empty()
  }

  /// Retract every live resource whose canonical key matches.
  ///
  /// All-or-nothing: if no live resource has the key, the collection is left
  /// untouched and `ResourceNotFound` is returned. On success the removed
  /// resources are handed back, oldest first, so the caller can purge their
  /// notifications from the run's index.
  pub fn unwind(&mut self, key: &str) -> Result<Vec<(ResourceId, Resource)>, ResourceNotFound> {
    let ids = self.index.remove(key).ok_or_else(|| ResourceNotFound::new(key))?;

    let mut removed = Vec::with_capacity(ids.len());
    for id in ids {
      if let Some(resource) = self.slots[id.0].take() {
        removed.push((id, resource));
      }
    }
    debug!(resource = %key, count = removed.len(), "unwound resource");
    Ok(removed)
  }
}
