//! Resource types for the rewind engine.
//!
//! A [`Resource`] is a declared unit of desired state: a key, a bag of
//! properties, an action, and the notifications it sends to other resources.
//! Resources are built with the consuming `with_*`/`notifies` methods while a
//! declaration block is open, then sealed into a collection. After sealing,
//! only a `rewind` edit may touch them, through the in-place setters.
//!
//! Keys are `(kind, name)` pairs with the canonical string form `kind[name]`
//! (e.g. `zen_master[foobar]`). The canonical form is the equality key for
//! lookup, duplicate detection, and retraction.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identity of a resource: kind plus name.
///
/// Not unique within a collection. Declaring the same key twice is legal;
/// retraction removes every instance sharing the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceKey {
  kind: String,
  name: String,
}

impl ResourceKey {
  pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
    Self {
      kind: kind.into(),
      name: name.into(),
    }
  }

  pub fn kind(&self) -> &str {
    &self.kind
  }

  pub fn name(&self) -> &str {
    &self.name
  }
}

impl fmt::Display for ResourceKey {
  /// Renders the canonical `kind[name]` form.
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}[{}]", self.kind, self.name)
  }
}

/// The action a resource requests from its provider, or the action a
/// notification triggers on its target.
///
/// `Nothing` is the explicit no-op: the runner performs no provider dispatch
/// for it, but the resource is still declared, retractable, and a valid
/// notification target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
  Nothing,
  Create,
  Change,
  Restart,
  Remove,
}

impl fmt::Display for Action {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Action::Nothing => "nothing",
      Action::Create => "create",
      Action::Change => "change",
      Action::Restart => "restart",
      Action::Remove => "remove",
    };
    f.write_str(name)
  }
}

/// When a notification fires relative to the action that triggered it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifyTiming {
  /// Fires synchronously, right after the declaring resource's action.
  Immediate,
  /// Collected in the notification index and fired once at end of run.
  Delayed,
}

/// An outgoing notification declared by a resource.
///
/// Owned by the declaring resource. Delayed notifications are additionally
/// indexed in the [`NotificationIndex`](crate::notify::NotificationIndex) so
/// retraction can purge them without scanning the whole run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
  /// Action to invoke on the target when this notification fires.
  pub action: Action,
  /// Key of the resource being notified.
  pub target: ResourceKey,
  pub timing: NotifyTiming,
}

/// A declared unit of desired state.
///
/// The key is private: the collection's secondary index is keyed by its
/// canonical form, so it must not change once the resource is sealed.
/// Properties, action, and notifications stay editable for `rewind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
  key: ResourceKey,
  /// Semantic attributes (e.g. `peace: false`), in declaration-independent
  /// sorted order.
  pub properties: BTreeMap<String, Value>,
  pub action: Action,
  /// Outgoing notifications in declaration order.
  pub notifications: Vec<Notification>,
}

impl Resource {
  /// Create a resource with no properties, no notifications, and the no-op
  /// action.
  pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
    Self {
      key: ResourceKey::new(kind, name),
      properties: BTreeMap::new(),
      action: Action::Nothing,
      notifications: Vec::new(),
    }
  }

  pub fn key(&self) -> &ResourceKey {
    &self.key
  }

  /// Set a property, builder style.
  pub fn with_property(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
    self.properties.insert(name.into(), value.into());
    self
  }

  /// Set the action, builder style.
  pub fn with_action(mut self, action: Action) -> Self {
    self.action = action;
    self
  }

  /// Declare an outgoing notification, builder style.
  pub fn notifies(mut self, action: Action, target: ResourceKey, timing: NotifyTiming) -> Self {
    self.notifications.push(Notification {
      action,
      target,
      timing,
    });
    self
  }

  pub fn property(&self, name: &str) -> Option<&Value> {
    self.properties.get(name)
  }

  /// Notifications that fire synchronously during this resource's turn.
  pub fn immediate_notifications(&self) -> impl Iterator<Item = &Notification> {
    self
      .notifications
      .iter()
      .filter(|n| n.timing == NotifyTiming::Immediate)
  }
}

impl fmt::Display for Resource {
  /// A resource prints as its canonical key.
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    self.key.fmt(f)
  }
}
