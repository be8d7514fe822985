//! rewind-engine: resource bookkeeping for a convergence engine
//!
//! This crate provides the data structures that hold declared resources
//! between recipe evaluation and convergence:
//! - `Resource`: a declared unit of desired state, identified by `kind[name]`
//! - `ResourceCollection`: the ordered, keyed store of pending declarations
//! - `NotificationIndex`: delayed notifications pending at end of run
//! - `RunContext`: one run's collection and index, with unwind and rewind
//! - `converge`: the runner that drives providers over the final state
//!
//! The distinguishing feature is retraction: a recipe may declare a resource,
//! later `unwind` it by key, and redeclare it without stale notifications
//! from the first declaration surviving into convergence.

pub mod collection;
pub mod context;
pub mod converge;
pub mod error;
pub mod notify;
pub mod resource;
