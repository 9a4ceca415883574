//! Multi-path approval workflow engine
//!
//! The engine moves an object's field through the states of a workflow
//! definition. Each object gets its own graph of concrete transitions and
//! approvals, materialized from the definition on first use. Principals
//! decide approvals one at a time; when the last pending approval of a
//! transition is approved, the object moves to the transition's
//! destination.
//!
//! # Architecture
//!
//! The [`WorkflowEngine`] composes specialized components:
//!
//! - [`DefinitionRegistry`]: stores definitions by id and (type, field) binding
//! - Graph materializer: expands the definition breadth-first into
//!   iteration-tagged transitions
//! - Availability resolver: which approvals a principal may decide now,
//!   gated by priority and [`Authorizer`]
//! - Approval state machine: approve, reject and jump
//! - Cycle handler: re-expands the graph when the object re-enters a
//!   visited state
//! - Branch canceller: retracts the branches a decision made unreachable
//! - [`HookRegistry`]: delivers [`WorkflowEvent`]s after commit
//!
//! # Example
//!
//! ```rust
//! use approval_workflow_engine::{AllowAll, WorkflowEngine};
//! use approval_workflow_types::*;
//! use std::sync::Arc;
//!
//! let mut engine = WorkflowEngine::in_memory(Arc::new(AllowAll));
//!
//! let workflow = Workflow::new("document", "status", "draft")
//!     .with_final_state("published")
//!     .with_transition(
//!         TransitionTemplate::new("draft", "review")
//!             .approved_by(0, Authorization::unrestricted()),
//!     )
//!     .unwrap()
//!     .with_transition(
//!         TransitionTemplate::new("review", "published")
//!             .approved_by(0, Authorization::unrestricted()),
//!     )
//!     .unwrap();
//! engine.register_workflow(workflow).unwrap();
//!
//! let doc = engine.object(ObjectRef::new("document", "42"), "status").unwrap();
//! let editor = PrincipalId::new("editor");
//!
//! doc.approve(&editor, None).unwrap();
//! doc.approve(&editor, None).unwrap();
//!
//! assert_eq!(doc.current_state().unwrap(), State::new("published"));
//! assert!(doc.is_workflow_completed().unwrap());
//! ```

#![deny(unsafe_code)]

mod approval;
pub mod authorization;
mod availability;
mod cancellation;
pub mod config;
mod cycle;
pub mod definition_registry;
mod engine;
mod history;
pub mod hooks;
mod jump;
mod materializer;
mod object;

// Re-export main types
pub use approval::ApprovalOutcome;
pub use authorization::{AllowAll, Authorizer, DirectoryAuthorizer};
pub use config::{init_tracing, EngineConfig, EngineSettings, LoggingConfig};
pub use definition_registry::DefinitionRegistry;
pub use engine::WorkflowEngine;
pub use hooks::{HookRegistry, WorkflowEvent, WorkflowHook};
pub use jump::JumpOutcome;
pub use object::WorkflowObject;

pub use approval_workflow_store as store;
pub use approval_workflow_types as types;
