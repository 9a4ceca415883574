//! Approval history: the linear chain of decisions made on one object

use approval_workflow_store::{ApprovalFilter, StoreTx};
use approval_workflow_types::{
    ApprovalId, InstanceKey, TransitionApproval, WorkflowError, WorkflowResult,
};
use std::collections::{HashMap, HashSet};

/// The most recently decided approval, if any
pub(crate) fn recent_approval(
    tx: &mut dyn StoreTx,
    key: &InstanceKey,
) -> WorkflowResult<Option<TransitionApproval>> {
    let decided = tx.approvals(key, &ApprovalFilter::new().decided())?;
    Ok(chain_head(decided.iter()).cloned())
}

/// The decision no other decision points back to. Commits on one object
/// are serialized, so there is exactly one; ties fall back to time.
fn chain_head<'a>(
    decided: impl Iterator<Item = &'a TransitionApproval> + Clone,
) -> Option<&'a TransitionApproval> {
    let linked: HashSet<ApprovalId> = decided.clone().filter_map(|a| a.previous).collect();
    decided
        .filter(|a| !linked.contains(&a.id))
        .max_by_key(|a| (a.decided_at, a.id))
}

/// Every decision, newest first, following the `previous` links
pub(crate) fn approval_history(
    tx: &mut dyn StoreTx,
    key: &InstanceKey,
) -> WorkflowResult<Vec<TransitionApproval>> {
    let decided: HashMap<ApprovalId, TransitionApproval> = tx
        .approvals(key, &ApprovalFilter::new().decided())?
        .into_iter()
        .map(|a| (a.id, a))
        .collect();

    let Some(head) = chain_head(decided.values()) else {
        return Ok(Vec::new());
    };

    let mut chain = Vec::with_capacity(decided.len());
    let mut seen = HashSet::new();
    let mut cursor = Some(head.id);
    while let Some(id) = cursor {
        if !seen.insert(id) {
            return Err(WorkflowError::Storage(format!(
                "approval history of {} loops at {}",
                key, id
            )));
        }
        let approval = decided
            .get(&id)
            .ok_or(WorkflowError::ApprovalNotFound(id))?;
        cursor = approval.previous;
        chain.push(approval.clone());
    }
    Ok(chain)
}
