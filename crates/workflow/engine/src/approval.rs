//! Approval state machine
//!
//! One call decides one approval. When the decision resolves the last
//! pending peer of a transition, the transition is done, the object's
//! state pointer moves, and the cycle handler gets a chance to re-expand
//! the graph. Everything happens inside the caller's store transaction;
//! events are only returned, never dispatched, from here.

use crate::authorization::Authorizer;
use crate::availability::{available_approvals, destinations, AvailableApproval};
use crate::cancellation::{cancel_impossible_future, cancel_unreachable};
use crate::cycle::{check_cycled, recreate_cycle};
use crate::history::recent_approval;
use crate::hooks::WorkflowEvent;
use crate::object::{state_of, Scope};
use approval_workflow_store::{ApprovalFilter, StoreTx, TransitionFilter};
use approval_workflow_types::{
    ApprovalStatus, PrincipalId, State, Transition, TransitionApproval, TransitionId,
    TransitionStatus, WorkflowError, WorkflowResult,
};

/// Result of an approve or reject call
#[derive(Clone, Debug)]
pub struct ApprovalOutcome {
    /// The decided approval
    pub approval: TransitionApproval,
    /// The transition it belongs to, with its status after the decision
    pub transition: Transition,
    pub previous_state: State,
    pub new_state: State,
    /// Whether the object's state pointer moved
    pub transitioned: bool,
    /// Transitions cancelled as a consequence
    pub cancelled: Vec<TransitionId>,
    /// Transitions created by cycle re-expansion
    pub recreated: Vec<TransitionId>,
    /// Events, in dispatch order
    pub events: Vec<WorkflowEvent>,
}

/// Pick the approval `principal` is deciding
fn select(
    tx: &mut dyn StoreTx,
    scope: &Scope<'_>,
    authorizer: &dyn Authorizer,
    principal: &PrincipalId,
    current: &State,
    next_state: Option<&State>,
) -> WorkflowResult<AvailableApproval> {
    let available = available_approvals(tx, scope.key, authorizer, principal, current, None)?;
    if available.is_empty() {
        return Err(WorkflowError::NoAvailableApproval);
    }

    let states = destinations(&available);
    match next_state {
        Some(next) => available
            .into_iter()
            .find(|a| &a.transition.destination == next)
            .ok_or_else(|| WorkflowError::InvalidNextState {
                given: next.clone(),
                available: states,
            }),
        None if states.len() > 1 => Err(WorkflowError::AmbiguousNextState { available: states }),
        None => available
            .into_iter()
            .next()
            .ok_or(WorkflowError::NoAvailableApproval),
    }
}

pub(crate) fn approve(
    tx: &mut dyn StoreTx,
    scope: &Scope<'_>,
    authorizer: &dyn Authorizer,
    principal: &PrincipalId,
    next_state: Option<&State>,
) -> WorkflowResult<ApprovalOutcome> {
    let current = state_of(tx, scope.key)?;
    let AvailableApproval {
        mut approval,
        mut transition,
    } = select(tx, scope, authorizer, principal, &current, next_state)?;

    let previous = recent_approval(tx, scope.key)?.map(|a| a.id);
    approval.decide(ApprovalStatus::Approved, principal.clone(), previous);
    tx.update_approval(scope.key, &approval)?;

    let cancelled = match next_state {
        Some(_) => cancel_impossible_future(tx, scope.key, &transition)?,
        None => Vec::new(),
    };

    let mut events = vec![WorkflowEvent::Approved {
        object: scope.key.object.clone(),
        field: scope.field.to_string(),
        approval: approval.clone(),
    }];

    let peers_pending = tx.approvals(
        scope.key,
        &ApprovalFilter::new().of_transition(transition.id).pending(),
    )?;
    let transitioned = peers_pending.is_empty();
    let mut recreated = Vec::new();
    let mut new_state = current.clone();

    if transitioned {
        tx.set_transition_status(scope.key, transition.id, TransitionStatus::Done)?;
        transition.status = TransitionStatus::Done;
        new_state = transition.destination.clone();
        tx.set_object_state(scope.key, &new_state)?;

        if check_cycled(tx, scope.key, &transition)? {
            recreated = recreate_cycle(tx, scope.key, &transition)?
                .into_iter()
                .map(|t| t.id)
                .collect();
        }

        events.push(WorkflowEvent::Transitioned {
            object: scope.key.object.clone(),
            field: scope.field.to_string(),
            previous_state: current.clone(),
            new_state: new_state.clone(),
            approval: approval.clone(),
        });
        if scope.workflow.is_final(&new_state) {
            events.push(WorkflowEvent::WorkflowCompleted {
                object: scope.key.object.clone(),
                field: scope.field.to_string(),
                final_state: new_state.clone(),
            });
        }
    }

    Ok(ApprovalOutcome {
        approval,
        transition,
        previous_state: current,
        new_state,
        transitioned,
        cancelled,
        recreated,
        events,
    })
}

/// Reject: the chosen transition is abandoned together with everything
/// only it leads to. The state pointer never moves.
pub(crate) fn reject(
    tx: &mut dyn StoreTx,
    scope: &Scope<'_>,
    authorizer: &dyn Authorizer,
    principal: &PrincipalId,
    next_state: Option<&State>,
) -> WorkflowResult<ApprovalOutcome> {
    let current = state_of(tx, scope.key)?;
    let AvailableApproval {
        mut approval,
        mut transition,
    } = select(tx, scope, authorizer, principal, &current, next_state)?;

    let previous = recent_approval(tx, scope.key)?.map(|a| a.id);
    approval.decide(ApprovalStatus::Rejected, principal.clone(), previous);
    tx.update_approval(scope.key, &approval)?;

    tx.set_transition_status(scope.key, transition.id, TransitionStatus::Cancelled)?;
    transition.status = TransitionStatus::Cancelled;
    let peers = tx.approvals(
        scope.key,
        &ApprovalFilter::new().of_transition(transition.id).pending(),
    )?;
    for mut peer in peers {
        peer.status = ApprovalStatus::Cancelled;
        tx.update_approval(scope.key, &peer)?;
    }

    let retained = tx.transitions(
        scope.key,
        &TransitionFilter::new()
            .from_state(&transition.source_state)
            .at_iteration(transition.iteration)
            .pending(),
    )?;
    let mut cancelled = vec![transition.id];
    cancelled.extend(cancel_unreachable(
        tx,
        scope.key,
        transition.iteration,
        std::slice::from_ref(&transition),
        &retained,
    )?);

    let events = vec![WorkflowEvent::Rejected {
        object: scope.key.object.clone(),
        field: scope.field.to_string(),
        approval: approval.clone(),
    }];

    Ok(ApprovalOutcome {
        approval,
        transition,
        previous_state: current.clone(),
        new_state: current,
        transitioned: false,
        cancelled,
        recreated: Vec::new(),
        events,
    })
}
