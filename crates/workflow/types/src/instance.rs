//! Per-object records: the concrete graph a workflow object walks
//!
//! Every object governed by a workflow owns a set of [`Transition`]s and
//! [`TransitionApproval`]s instantiated from the definition's templates.
//! Records are never deleted. Status and iteration are the only way to
//! separate the live frontier from history.

use crate::{
    ApprovalTemplateId, Authorization, PrincipalId, State, TransitionTemplateId, WorkflowId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Object references ────────────────────────────────────────────────

/// Tagged reference to an external object (type tag + opaque id)
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectRef {
    pub object_type: String,
    pub object_id: String,
}

impl ObjectRef {
    pub fn new(object_type: impl Into<String>, object_id: impl Into<String>) -> Self {
        Self {
            object_type: object_type.into(),
            object_id: object_id.into(),
        }
    }
}

impl std::fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.object_type, self.object_id)
    }
}

/// The unit of isolation for per-object records
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceKey {
    pub workflow_id: WorkflowId,
    pub object: ObjectRef,
}

impl InstanceKey {
    pub fn new(workflow_id: WorkflowId, object: ObjectRef) -> Self {
        Self {
            workflow_id,
            object,
        }
    }
}

impl std::fmt::Display for InstanceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.object, self.workflow_id.short())
    }
}

// ── Record identifiers ───────────────────────────────────────────────

/// Store-assigned transition id; increases with creation order
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransitionId(pub u64);

impl std::fmt::Display for TransitionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// Store-assigned approval id; increases with creation order
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ApprovalId(pub u64);

impl std::fmt::Display for ApprovalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "a{}", self.0)
    }
}

// ── Statuses ─────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionStatus {
    Pending,
    Done,
    Cancelled,
    Jumped,
}

impl std::fmt::Display for TransitionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Done => write!(f, "done"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Jumped => write!(f, "jumped"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
    Jumped,
}

impl ApprovalStatus {
    /// Approved or rejected by a principal
    pub fn is_decided(&self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }
}

impl std::fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Approved => write!(f, "approved"),
            Self::Rejected => write!(f, "rejected"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Jumped => write!(f, "jumped"),
        }
    }
}

// ── Transition ───────────────────────────────────────────────────────

/// One concrete edge an object may cross, at a given iteration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub id: TransitionId,
    pub workflow_id: WorkflowId,
    pub object: ObjectRef,
    pub source_state: State,
    pub destination: State,
    pub template_id: TransitionTemplateId,
    pub status: TransitionStatus,
    /// Breadth-first wave number; bumped each time a cycle re-expands
    pub iteration: u32,
    pub created_at: DateTime<Utc>,
}

impl Transition {
    pub fn is_pending(&self) -> bool {
        self.status == TransitionStatus::Pending
    }

    pub fn is_done(&self) -> bool {
        self.status == TransitionStatus::Done
    }

    pub fn key(&self) -> InstanceKey {
        InstanceKey::new(self.workflow_id.clone(), self.object.clone())
    }
}

/// Payload for inserting a transition; the store assigns id and timestamp
#[derive(Clone, Debug)]
pub struct NewTransition {
    pub source_state: State,
    pub destination: State,
    pub template_id: TransitionTemplateId,
    pub iteration: u32,
}

// ── Approval ─────────────────────────────────────────────────────────

/// One sign-off owed on a transition
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionApproval {
    pub id: ApprovalId,
    pub workflow_id: WorkflowId,
    pub object: ObjectRef,
    pub transition_id: TransitionId,
    pub template_id: Option<ApprovalTemplateId>,
    pub priority: u32,
    pub status: ApprovalStatus,
    /// The principal who decided, or who claimed the approval beforehand
    pub approver: Option<PrincipalId>,
    pub decided_at: Option<DateTime<Utc>>,
    pub authorization: Authorization,
    /// The decision made on this object just before this one
    pub previous: Option<ApprovalId>,
    pub created_at: DateTime<Utc>,
}

impl TransitionApproval {
    pub fn is_pending(&self) -> bool {
        self.status == ApprovalStatus::Pending
    }

    /// Claimed by a principal but not yet decided
    pub fn is_claimed(&self) -> bool {
        self.is_pending() && self.approver.is_some()
    }

    /// Record a decision on this approval
    pub fn decide(
        &mut self,
        status: ApprovalStatus,
        approver: PrincipalId,
        previous: Option<ApprovalId>,
    ) {
        self.status = status;
        self.approver = Some(approver);
        self.decided_at = Some(Utc::now());
        self.previous = previous;
    }
}

/// Payload for inserting an approval
#[derive(Clone, Debug)]
pub struct NewApproval {
    pub transition_id: TransitionId,
    pub template_id: Option<ApprovalTemplateId>,
    pub priority: u32,
    pub authorization: Authorization,
}
