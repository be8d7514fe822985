//! Convergence runner: drives a provider over the final run state.
//!
//! The runner walks the live resources in declaration order, dispatching each
//! resource's action to the [`Provider`] and firing its immediate
//! notifications synchronously. Delayed notifications fire once after the
//! last resource, grouped by target, with each (target, action) pair invoked
//! at most once. The first error aborts the remainder of the run.
//!
//! Providers are the capability seam between the bookkeeping core and actual
//! side effects; this crate ships no provider implementations.

use thiserror::Error;
use tracing::{debug, info};

use crate::context::RunContext;
use crate::error::ResourceNotFound;
use crate::resource::{Action, Resource};

/// A provider's report that an action could not be performed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ActionFailure {
  pub message: String,
}

impl ActionFailure {
  pub fn new(message: impl Into<String>) -> Self {
    Self {
      message: message.into(),
    }
  }
}

/// Errors that abort a convergence run.
#[derive(Debug, Error)]
pub enum ConvergeError {
  /// A notification targeted a key with no live resource.
  #[error(transparent)]
  NotFound(#[from] ResourceNotFound),

  /// A provider reported failure for an action.
  #[error("action {action} on {key} failed: {source}")]
  ActionFailed {
    key: String,
    action: Action,
    source: ActionFailure,
  },
}

/// Maps actions to behavior for the resources of a run.
pub trait Provider {
  /// Perform `action` against the resource's desired state.
  ///
  /// Called for declared actions and for triggered notification actions
  /// alike. Never called with [`Action::Nothing`] for a declared resource;
  /// the runner skips those.
  fn apply(&mut self, resource: &Resource, action: Action) -> Result<(), ActionFailure>;
}

/// Counts from a completed convergence.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConvergeSummary {
  /// Resources whose declared action was dispatched.
  pub applied: usize,
  /// Resources skipped because their action was the no-op.
  pub skipped: usize,
  /// Notifications fired, immediate and delayed.
  pub notified: usize,
}

/// One-shot runner over a populated [`RunContext`].
pub struct Runner<'a, P: Provider> {
  context: &'a mut RunContext,
  provider: P,
}

impl<'a, P: Provider> Runner<'a, P> {
  pub fn new(context: &'a mut RunContext, provider: P) -> Self {
    Self { context, provider }
  }

  /// Converge the run: execute every live resource in declaration order,
  /// then fire the remaining delayed notifications.
  pub fn converge(&mut self) -> Result<ConvergeSummary, ConvergeError> {
    info!(resources = self.context.resources.len(), "starting convergence");
    let mut summary = ConvergeSummary::default();

    let ids: Vec<_> = self.context.resources.iter().map(|(id, _)| id).collect();
    for id in ids {
      let Some(resource) = self.context.resources.get(id) else {
        continue;
      };

      if resource.action == Action::Nothing {
        debug!(resource = %resource, "skipping no-op resource");
        summary.skipped += 1;
        continue;
      }

      debug!(resource = %resource, action = %resource.action, "applying resource");
      let action = resource.action;
      self
        .provider
        .apply(resource, action)
        .map_err(|source| ConvergeError::ActionFailed {
          key: resource.to_string(),
          action,
          source,
        })?;
      summary.applied += 1;

      let immediates: Vec<_> = resource.immediate_notifications().cloned().collect();
      for notification in immediates {
        let target_key = notification.target.to_string();
        let target = self.context.resources.lookup(&target_key)?;
        debug!(target = %target_key, action = %notification.action, "firing immediate notification");
        self
          .provider
          .apply(target, notification.action)
          .map_err(|source| ConvergeError::ActionFailed {
            key: target_key,
            action: notification.action,
            source,
          })?;
        summary.notified += 1;
      }
    }

    for target_key in self.context.notifications.target_keys() {
      for notification in self.context.notifications.drain_for(&target_key) {
        let target = self.context.resources.lookup(&target_key)?;
        debug!(target = %target_key, action = %notification.action, "firing delayed notification");
        self
          .provider
          .apply(target, notification.action)
          .map_err(|source| ConvergeError::ActionFailed {
            key: target_key.clone(),
            action: notification.action,
            source,
          })?;
        summary.notified += 1;
      }
    }

    info!(
      applied = summary.applied,
      skipped = summary.skipped,
      notified = summary.notified,
      "convergence complete"
    );
    Ok(summary)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::resource::{NotifyTiming, ResourceKey};

  /// Records every dispatch; fails any action listed in `fail_on`.
  #[derive(Default)]
  struct RecordingProvider {
    log: Vec<(String, Action)>,
    fail_on: Vec<(String, Action)>,
  }

  impl Provider for RecordingProvider {
    fn apply(&mut self, resource: &Resource, action: Action) -> Result<(), ActionFailure> {
      let entry = (resource.to_string(), action);
      if self.fail_on.contains(&entry) {
        return Err(ActionFailure::new(format!("{} refused {}", entry.0, action)));
      }
      self.log.push(entry);
      Ok(())
    }
  }

  #[test]
  fn noop_resources_are_not_dispatched() {
    let mut ctx = RunContext::new();
    ctx.declare(Resource::new("zen_master", "foobar"));
    ctx.declare(Resource::new("cat", "blanket").with_action(Action::Create));

    let mut runner = Runner::new(&mut ctx, RecordingProvider::default());
    let summary = runner.converge().unwrap();

    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.applied, 1);
    assert_eq!(runner.provider.log, [("cat[blanket]".to_string(), Action::Create)]);
  }

  #[test]
  fn immediate_notification_fires_right_after_the_declarer() {
    let mut ctx = RunContext::new();
    ctx.declare(
      Resource::new("zen_master", "foobar")
        .with_action(Action::Change)
        .notifies(
          Action::Restart,
          ResourceKey::new("cat", "blanket"),
          NotifyTiming::Immediate,
        ),
    );
    ctx.declare(Resource::new("cat", "blanket").with_action(Action::Create));

    let mut runner = Runner::new(&mut ctx, RecordingProvider::default());
    let summary = runner.converge().unwrap();

    assert_eq!(summary.notified, 1);
    assert_eq!(
      runner.provider.log,
      [
        ("zen_master[foobar]".to_string(), Action::Change),
        ("cat[blanket]".to_string(), Action::Restart),
        ("cat[blanket]".to_string(), Action::Create),
      ]
    );
  }

  #[test]
  fn delayed_notifications_fire_after_the_last_resource() {
    let mut ctx = RunContext::new();
    ctx.declare(
      Resource::new("zen_master", "foobar")
        .with_action(Action::Change)
        .notifies(
          Action::Restart,
          ResourceKey::new("cat", "blanket"),
          NotifyTiming::Delayed,
        ),
    );
    ctx.declare(Resource::new("cat", "blanket").with_action(Action::Create));

    let mut runner = Runner::new(&mut ctx, RecordingProvider::default());
    runner.converge().unwrap();

    assert_eq!(
      runner.provider.log,
      [
        ("zen_master[foobar]".to_string(), Action::Change),
        ("cat[blanket]".to_string(), Action::Create),
        ("cat[blanket]".to_string(), Action::Restart),
      ]
    );
  }

  #[test]
  fn delayed_notifications_dedup_per_target_action() {
    let mut ctx = RunContext::new();
    let target = ResourceKey::new("cat", "blanket");
    ctx.declare(
      Resource::new("zen_master", "foo")
        .with_action(Action::Change)
        .notifies(Action::Restart, target.clone(), NotifyTiming::Delayed)
        .notifies(Action::Restart, target.clone(), NotifyTiming::Delayed),
    );
    ctx.declare(
      Resource::new("zen_master", "bar")
        .with_action(Action::Change)
        .notifies(Action::Restart, target, NotifyTiming::Delayed),
    );
    ctx.declare(Resource::new("cat", "blanket"));

    let mut runner = Runner::new(&mut ctx, RecordingProvider::default());
    let summary = runner.converge().unwrap();

    // three registrations, one restart
    assert_eq!(summary.notified, 1);
    let restarts = runner
      .provider
      .log
      .iter()
      .filter(|(_, action)| *action == Action::Restart)
      .count();
    assert_eq!(restarts, 1);
  }

  #[test]
  fn immediate_notification_to_missing_target_fails() {
    let mut ctx = RunContext::new();
    ctx.declare(
      Resource::new("zen_master", "foobar")
        .with_action(Action::Change)
        .notifies(
          Action::Restart,
          ResourceKey::new("cat", "blanket"),
          NotifyTiming::Immediate,
        ),
    );

    let mut runner = Runner::new(&mut ctx, RecordingProvider::default());
    let err = runner.converge().unwrap_err();

    match err {
      ConvergeError::NotFound(e) => assert_eq!(e.key, "cat[blanket]"),
      other => panic!("expected NotFound, got {other:?}"),
    }
  }

  #[test]
  fn provider_failure_aborts_the_run() {
    let mut ctx = RunContext::new();
    ctx.declare(Resource::new("zen_master", "foo").with_action(Action::Change));
    ctx.declare(Resource::new("cat", "blanket").with_action(Action::Create));
    ctx.declare(Resource::new("zen_master", "bar").with_action(Action::Change));

    let provider = RecordingProvider {
      fail_on: vec![("cat[blanket]".to_string(), Action::Create)],
      ..Default::default()
    };
    let mut runner = Runner::new(&mut ctx, provider);
    let err = runner.converge().unwrap_err();

    match err {
      ConvergeError::ActionFailed { key, action, .. } => {
        assert_eq!(key, "cat[blanket]");
        assert_eq!(action, Action::Create);
      }
      other => panic!("expected ActionFailed, got {other:?}"),
    }
    // fail-fast: the later resource was never dispatched
    assert_eq!(runner.provider.log, [("zen_master[foo]".to_string(), Action::Change)]);
  }
}
