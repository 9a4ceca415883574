use crate::{ApprovalFilter, StorageResult, TransitionFilter};
use approval_workflow_types::{
    ApprovalId, InstanceKey, NewApproval, NewTransition, State, Transition, TransitionApproval,
    TransitionId, TransitionStatus,
};

/// A backend able to open transactions over per-object workflow graphs.
pub trait WorkflowStore: Send + Sync {
    /// Open a unit of work. Nothing it writes is visible to others until
    /// [`StoreTx::commit`] succeeds.
    fn begin(&self) -> StorageResult<Box<dyn StoreTx + '_>>;
}

/// One atomic unit of work.
///
/// Reads return the transaction's own view, including its uncommitted
/// writes. Dropping the transaction rolls it back and releases its locks.
pub trait StoreTx {
    /// Current value of the object's state pointer.
    fn object_state(&mut self, key: &InstanceKey) -> StorageResult<Option<State>>;

    fn set_object_state(&mut self, key: &InstanceKey, state: &State) -> StorageResult<()>;

    /// Matching transitions, ordered by (iteration, id).
    fn transitions(
        &mut self,
        key: &InstanceKey,
        filter: &TransitionFilter,
    ) -> StorageResult<Vec<Transition>>;

    fn transition(&mut self, key: &InstanceKey, id: TransitionId) -> StorageResult<Transition>;

    /// Insert a transition. Fails with `UniqueViolation` when the
    /// (template, iteration) pair already exists for the instance.
    fn insert_transition(
        &mut self,
        key: &InstanceKey,
        new: NewTransition,
    ) -> StorageResult<Transition>;

    fn set_transition_status(
        &mut self,
        key: &InstanceKey,
        id: TransitionId,
        status: TransitionStatus,
    ) -> StorageResult<()>;

    /// Matching approvals, ordered by id.
    fn approvals(
        &mut self,
        key: &InstanceKey,
        filter: &ApprovalFilter,
    ) -> StorageResult<Vec<TransitionApproval>>;

    fn approval(&mut self, key: &InstanceKey, id: ApprovalId) -> StorageResult<TransitionApproval>;

    fn insert_approval(
        &mut self,
        key: &InstanceKey,
        new: NewApproval,
    ) -> StorageResult<TransitionApproval>;

    /// Overwrite a stored approval with the given record.
    fn update_approval(
        &mut self,
        key: &InstanceKey,
        approval: &TransitionApproval,
    ) -> StorageResult<()>;

    /// Lowest priority among the transition's pending approvals.
    fn min_pending_priority(
        &mut self,
        key: &InstanceKey,
        transition: TransitionId,
    ) -> StorageResult<Option<u32>>;

    /// Take exclusive row locks without waiting. Fails with
    /// `LockContention` and takes nothing if any row is held elsewhere.
    fn lock_transitions_nowait(&mut self, ids: &[TransitionId]) -> StorageResult<()>;

    /// Make every write durable. Fails with `Conflict` when another
    /// transaction committed to a touched instance first.
    fn commit(self: Box<Self>) -> StorageResult<()>;
}
