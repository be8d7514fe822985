//! Run context: one run's resources and pending notifications.
//!
//! A [`RunContext`] is created per run, populated during recipe evaluation,
//! consumed once by the convergence runner, and discarded. It is exclusively
//! owned by its run; nothing here is shared or locked.
//!
//! This is the layer the recipe front end talks to. `declare` seals a
//! resource into the collection and registers its delayed notifications;
//! `unwind` retracts by key and keeps the notification index consistent;
//! `rewind` reopens the newest declaration for an in-place edit.

use tracing::{debug, warn};

use crate::collection::{ResourceCollection, ResourceId};
use crate::error::ResourceNotFound;
use crate::notify::NotificationIndex;
use crate::resource::Resource;

#[derive(Debug, Default)]
pub struct RunContext {
  pub(crate) resources: ResourceCollection,
  pub(crate) notifications: NotificationIndex,
}

impl RunContext {
  pub fn new() -> Self {
    Self::default()
  }

  /// Seal a declared resource into the run.
  ///
  /// Appends to the collection and registers the resource's delayed
  /// notifications in the index under the new id.
  pub fn declare(&mut self, resource: Resource) -> ResourceId {
    let pending = resource.notifications.clone();
    let id = self.resources.append(resource);
    for notification in pending {
      self.notifications.register(notification, id);
    }
    id
  }

  /// Most recently declared live resource with this key.
  pub fn lookup(&self, key: &str) -> Result<&Resource, ResourceNotFound> {
    self.resources.lookup(key)
  }

  /// Live resources in declaration order.
  pub fn all_resources(&self) -> impl Iterator<Item = &Resource> {
    self.resources.all_resources()
  }

  /// Retract every live resource with this key, along with every
  /// notification those resources declared.
  ///
  /// Fails with [`ResourceNotFound`] before any mutation if no live resource
  /// has the key. Notifications declared by *other* resources that target the
  /// retracted key are left pending; resolving or failing them is the
  /// convergence runner's business.
  pub fn unwind(&mut self, key: &str) -> Result<(), ResourceNotFound> {
    let removed = self.resources.unwind(key)?;
    if removed.len() > 1 {
      warn!(resource = %key, count = removed.len(), "unwound multiple resources sharing a key");
    }
    for (id, resource) in &removed {
      self.notifications.purge(*id, resource);
    }
    Ok(())
  }

  /// Reopen the newest live declaration with this key and edit it in place.
  ///
  /// The edit may change properties and the action, and may push further
  /// notifications; delayed notifications added by the edit are registered
  /// under the original declaration's id. Existing notifications are kept.
  pub fn rewind<F>(&mut self, key: &str, edit: F) -> Result<(), ResourceNotFound>
  where
    F: FnOnce(&mut Resource),
  {
    let id = self.resources.newest(key)?;
    let resource = self
      .resources
      .get_mut(id)
      .ok_or_else(|| ResourceNotFound::new(key))?;

    let sealed = resource.notifications.len();
    edit(resource);
    let added = resource.notifications[sealed..].to_vec();

    debug!(resource = %key, added = added.len(), "rewound resource");
    for notification in added {
      self.notifications.register(notification, id);
    }
    Ok(())
  }

  pub fn resource_collection(&self) -> &ResourceCollection {
    &self.resources
  }

  pub fn notification_index(&self) -> &NotificationIndex {
    &self.notifications
  }
}
