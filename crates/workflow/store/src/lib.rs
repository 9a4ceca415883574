//! Storage boundary for approval workflows.
//!
//! The engine never touches persistence directly. Every public operation
//! opens one [`StoreTx`], reads and writes the per-object graph through it,
//! and commits at the end. Dropping a transaction without committing rolls
//! it back.
//!
//! A backend must provide:
//! - the per-object state pointer
//! - filtered reads of transitions and approvals
//! - the "minimum pending priority" aggregate
//! - non-blocking row locks held until commit or rollback
//! - atomic commit with first-committer-wins conflict detection
//!
//! [`memory::InMemoryWorkflowStore`] is the deterministic reference backend.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]
#![warn(rust_2018_idioms)]

mod error;
mod filter;
pub mod memory;
mod traits;

pub use error::{StorageError, StorageResult};
pub use filter::{ApprovalFilter, TransitionFilter};
pub use memory::InMemoryWorkflowStore;
pub use traits::{StoreTx, WorkflowStore};
