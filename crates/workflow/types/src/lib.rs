//! Approval Workflow Domain Types
//!
//! An approval workflow moves an external object through a set of
//! **states**. The movement is governed by a definition and recorded
//! per object as a graph of concrete transitions and approvals.
//!
//! # Key Concepts
//!
//! - **Workflow**: the immutable definition bound to one
//!   (object-type, field) pair. It names an initial state, the final
//!   states, and owns the transition templates.
//! - **TransitionTemplate**: a (source → destination) edge of the
//!   definition, carrying the approval templates that gate it.
//! - **ApprovalTemplate**: a priority plus an authorization rule
//!   describing who may sign off.
//! - **Transition** / **TransitionApproval**: per-object instances of
//!   the templates, tagged with an iteration number so the same edge
//!   taken again after a cycle is distinguishable.
//! - **Authorization**: users, groups and permissions allowed to decide
//!   an approval. An empty rule is unrestricted.
//!
//! # Design Principles
//!
//! 1. Definitions never change once registered.
//! 2. Per-object records are never deleted; status and iteration are the
//!    only way to tell current from historical.
//! 3. Every decided approval links back to the previous decision, giving
//!    each object one linear audit chain per workflow.

#![deny(unsafe_code)]

mod definition;
mod errors;
mod instance;
mod principal;
mod template;

pub use definition::*;
pub use errors::*;
pub use instance::*;
pub use principal::*;
pub use template::*;
