//! Error types for the rewind engine.

use thiserror::Error;

/// A key with no live resource was referenced.
///
/// Raised by `lookup` and `unwind` on the collection, by `rewind` on the run
/// context, and by the convergence runner when a notification targets a key
/// that was unwound and never redeclared.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot find a resource matching {key}")]
pub struct ResourceNotFound {
  /// Canonical `kind[name]` form of the missing key.
  pub key: String,
}

impl ResourceNotFound {
  pub fn new(key: impl Into<String>) -> Self {
    Self { key: key.into() }
  }
}
