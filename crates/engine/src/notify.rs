//! Index of delayed notifications pending at end of run.
//!
//! Immediate notifications fire synchronously during their declaring
//! resource's turn and are consumed in place, so they are never indexed here.
//! Delayed notifications accumulate across the whole run and fire once after
//! the last resource, grouped by target and deduplicated by triggered action.
//!
//! Every entry carries the [`ResourceId`] of its declaring resource. When a
//! resource is retracted, `purge` walks that resource's own notification list
//! rather than the whole index, so retraction cost tracks the resource's
//! notification count, not the size of the run.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::collection::ResourceId;
use crate::resource::{Notification, NotifyTiming, Resource};

#[derive(Debug)]
struct IndexEntry {
  declared_by: ResourceId,
  notification: Notification,
}

/// Multimap of target key -> pending delayed notifications.
#[derive(Debug, Default)]
pub struct NotificationIndex {
  pending: HashMap<String, Vec<IndexEntry>>,
  /// Target keys in first-registration order, kept in sync with `pending`.
  target_order: Vec<String>,
}

impl NotificationIndex {
  pub fn new() -> Self {
    Self::default()
  }

  /// Record a notification declared by the given resource.
  ///
  /// Only delayed notifications are indexed; an immediate notification lives
  /// solely on its declaring resource and this call is a no-op for it.
  pub fn register(&mut self, notification: Notification, declared_by: ResourceId) {
    if notification.timing != NotifyTiming::Delayed {
      return;
    }
    let target = notification.target.to_string();
    debug!(
      target = %target,
      action = %notification.action,
      declared_by = declared_by.0,
      "registering delayed notification"
    );
    if !self.pending.contains_key(&target) {
      self.target_order.push(target.clone());
    }
    self.pending.entry(target).or_default().push(IndexEntry {
      declared_by,
      notification,
    });
  }

  /// Drop every entry the given resource declared.
  ///
  /// Called by unwind with the retracted resource; iterates the resource's
  /// own notification list, touching only the buckets it targeted.
  pub fn purge(&mut self, declared_by: ResourceId, resource: &Resource) {
    for notification in &resource.notifications {
      if notification.timing != NotifyTiming::Delayed {
        continue;
      }
      let target = notification.target.to_string();
      if let Some(bucket) = self.pending.get_mut(&target) {
        bucket.retain(|entry| entry.declared_by != declared_by);
        if bucket.is_empty() {
          self.pending.remove(&target);
          self.target_order.retain(|t| t != &target);
        }
      }
    }
    debug!(resource = %resource, "purged notifications");
  }

  /// Remove and return the pending notifications for a target, deduplicated
  /// by triggered action in first-occurrence order.
  pub fn drain_for(&mut self, target_key: &str) -> Vec<Notification> {
    let Some(bucket) = self.pending.remove(target_key) else {
      return Vec::new();
    };
    self.target_order.retain(|t| t != target_key);

    let mut seen = HashSet::new();
    bucket
      .into_iter()
      .filter(|entry| seen.insert(entry.notification.action))
      .map(|entry| entry.notification)
      .collect()
  }

  /// Targets with pending notifications, in first-registration order.
  pub fn target_keys(&self) -> Vec<String> {
    self.target_order.clone()
  }

  /// Number of pending entries for a target.
  pub fn pending_for(&self, target_key: &str) -> usize {
    self.pending.get(target_key).map_or(0, Vec::len)
  }

  pub fn is_empty(&self) -> bool {
    self.pending.is_empty()
  }
}
