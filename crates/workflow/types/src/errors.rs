//! Error types for the approval workflow layer

use crate::{ApprovalId, ObjectRef, State, TransitionTemplateId, WorkflowId};

/// Errors that can occur in approval workflow operations
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("There is no available approval for the principal")]
    NoAvailableApproval,

    #[error("Next state must be given when there are multiple destinations: {}", join_states(.available))]
    AmbiguousNextState { available: Vec<State> },

    #[error("Invalid state is given ({given}). Valid state(s): {}", join_states(.available))]
    InvalidNextState { given: State, available: Vec<State> },

    #[error("State {0} is not available to be jumped in the future of this object")]
    StateNotJumpable(State),

    #[error("Rows are locked by another transaction: {0}")]
    LockContention(String),

    #[error("Concurrent update conflict: {0}")]
    Conflict(String),

    #[error("No workflow bound to {object_type}.{field}")]
    WorkflowNotFound { object_type: String, field: String },

    #[error("Workflow definition not found: {0}")]
    DefinitionNotFound(WorkflowId),

    #[error("A workflow is already bound to {object_type}.{field}")]
    DuplicateBinding { object_type: String, field: String },

    #[error("Duplicate transition template: {source_state} -> {destination}")]
    DuplicateTransition { source_state: State, destination: State },

    #[error("Duplicate transition template id: {0}")]
    DuplicateTemplateId(TransitionTemplateId),

    #[error("Workflow object {0} is not initialized")]
    NotInitialized(ObjectRef),

    #[error("Approval not found: {0}")]
    ApprovalNotFound(ApprovalId),

    #[error("Approval {0} is no longer pending")]
    ApprovalNotPending(ApprovalId),

    #[error("Workflow validation error: {0}")]
    ValidationError(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl WorkflowError {
    /// Transient failures the caller may retry as-is
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::LockContention(_) | Self::Conflict(_))
    }

    /// Valid destination states carried by disambiguation errors
    pub fn available_states(&self) -> &[State] {
        match self {
            Self::AmbiguousNextState { available } | Self::InvalidNextState { available, .. } => {
                available
            }
            _ => &[],
        }
    }
}

fn join_states(states: &[State]) -> String {
    states
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Result type alias for workflow operations
pub type WorkflowResult<T> = Result<T, WorkflowError>;
