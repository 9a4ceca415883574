//! Forced moves that bypass approval gating

use crate::history::recent_approval;
use crate::hooks::WorkflowEvent;
use crate::object::{state_of, Scope};
use approval_workflow_store::{ApprovalFilter, StoreTx, TransitionFilter};
use approval_workflow_types::{
    ApprovalStatus, State, Transition, TransitionId, TransitionStatus, WorkflowError,
    WorkflowResult,
};

/// Result of a jump
#[derive(Clone, Debug)]
pub struct JumpOutcome {
    /// The pending transition the jump landed through
    pub transition: Transition,
    pub previous_state: State,
    pub new_state: State,
    /// Every transition marked jumped, the landing one included
    pub jumped: Vec<TransitionId>,
    pub events: Vec<WorkflowEvent>,
}

/// Move straight to `target`.
///
/// The target must be the destination of a pending transition at or
/// after the iteration of the latest decision. Any other label, including
/// one the workflow never names, is not jumpable. The earliest such
/// transition wins; it and every pending transition up to its iteration
/// are marked jumped, along with their pending approvals.
pub(crate) fn jump_to(
    tx: &mut dyn StoreTx,
    scope: &Scope<'_>,
    target: &State,
) -> WorkflowResult<JumpOutcome> {
    let current = state_of(tx, scope.key)?;
    let recent_iteration = match recent_approval(tx, scope.key)? {
        Some(approval) => tx.transition(scope.key, approval.transition_id)?.iteration,
        None => 0,
    };

    let landing = tx
        .transitions(
            scope.key,
            &TransitionFilter::new()
                .to(target)
                .pending()
                .min_iteration(recent_iteration),
        )?
        .into_iter()
        .next()
        .ok_or_else(|| WorkflowError::StateNotJumpable(target.clone()))?;

    let skipped = tx.transitions(
        scope.key,
        &TransitionFilter::new()
            .pending()
            .max_iteration(landing.iteration),
    )?;

    let mut jumped = Vec::with_capacity(skipped.len());
    for transition in &skipped {
        let approvals = tx.approvals(
            scope.key,
            &ApprovalFilter::new().of_transition(transition.id).pending(),
        )?;
        for mut approval in approvals {
            approval.status = ApprovalStatus::Jumped;
            tx.update_approval(scope.key, &approval)?;
        }
        tx.set_transition_status(scope.key, transition.id, TransitionStatus::Jumped)?;
        jumped.push(transition.id);
    }
    tx.set_object_state(scope.key, target)?;

    let mut events = vec![WorkflowEvent::Jumped {
        object: scope.key.object.clone(),
        field: scope.field.to_string(),
        previous_state: current.clone(),
        new_state: target.clone(),
    }];
    if scope.workflow.is_final(target) {
        events.push(WorkflowEvent::WorkflowCompleted {
            object: scope.key.object.clone(),
            field: scope.field.to_string(),
            final_state: target.clone(),
        });
    }

    let mut transition = landing;
    transition.status = TransitionStatus::Jumped;
    Ok(JumpOutcome {
        transition,
        previous_state: current,
        new_state: target.clone(),
        jumped,
        events,
    })
}
