//! Branch canceller
//!
//! Picking one destination out of several abandons the sibling branches.
//! Everything reachable forward from the abandoned siblings is a
//! candidate for cancellation, minus whatever the chosen branch can
//! still reach through pending transitions (merge points survive).

use approval_workflow_store::{ApprovalFilter, StoreTx, TransitionFilter};
use approval_workflow_types::{
    ApprovalStatus, InstanceKey, Transition, TransitionId, TransitionStatus, WorkflowResult,
};
use std::collections::{BTreeSet, HashSet};

/// Cancel the branches not taken when `chosen` was picked over its
/// siblings. Returns the ids of the transitions cancelled.
pub(crate) fn cancel_impossible_future(
    tx: &mut dyn StoreTx,
    key: &InstanceKey,
    chosen: &Transition,
) -> WorkflowResult<Vec<TransitionId>> {
    let siblings = tx.transitions(
        key,
        &TransitionFilter::new()
            .from_state(&chosen.source_state)
            .at_iteration(chosen.iteration),
    )?;
    let (retained, abandoned): (Vec<Transition>, Vec<Transition>) = siblings
        .into_iter()
        .partition(|t| t.destination == chosen.destination);

    cancel_unreachable(tx, key, chosen.iteration, &abandoned, &retained)
}

/// Cancel every pending transition reachable from `abandoned` that is not
/// also reachable through pending transitions from `retained`. All roots
/// sit at `iteration`.
///
/// The final set is locked without waiting; contention aborts before
/// anything is written.
pub(crate) fn cancel_unreachable(
    tx: &mut dyn StoreTx,
    key: &InstanceKey,
    iteration: u32,
    abandoned: &[Transition],
    retained: &[Transition],
) -> WorkflowResult<Vec<TransitionId>> {
    if abandoned.is_empty() {
        return Ok(Vec::new());
    }

    let candidates = walk_forward(tx, key, iteration, abandoned, false)?;
    let keep: HashSet<TransitionId> = walk_forward(tx, key, iteration, retained, true)?
        .into_iter()
        .map(|t| t.id)
        .collect();

    let doomed: Vec<Transition> = candidates
        .into_iter()
        .filter(|t| !keep.contains(&t.id))
        .collect();
    let ids: Vec<TransitionId> = doomed.iter().map(|t| t.id).collect();
    tx.lock_transitions_nowait(&ids)?;

    let mut cancelled = Vec::new();
    for transition in doomed.iter().filter(|t| t.is_pending()) {
        tx.set_transition_status(key, transition.id, TransitionStatus::Cancelled)?;
        let approvals = tx.approvals(
            key,
            &ApprovalFilter::new().of_transition(transition.id).pending(),
        )?;
        for mut approval in approvals {
            approval.status = ApprovalStatus::Cancelled;
            tx.update_approval(key, &approval)?;
        }
        cancelled.push(transition.id);
    }

    tracing::debug!(
        object = %key,
        candidates = ids.len(),
        cancelled = cancelled.len(),
        "Impossible future cancelled"
    );
    Ok(cancelled)
}

/// Breadth-first across increasing iterations: wave k+1 holds the
/// transitions whose source is a destination of wave k.
fn walk_forward(
    tx: &mut dyn StoreTx,
    key: &InstanceKey,
    iteration: u32,
    roots: &[Transition],
    pending_only: bool,
) -> WorkflowResult<Vec<Transition>> {
    let mut reached: Vec<Transition> = roots.to_vec();
    let mut seen: HashSet<TransitionId> = roots.iter().map(|t| t.id).collect();
    let mut wave: Vec<Transition> = roots.to_vec();
    let mut iteration = iteration + 1;

    while !wave.is_empty() {
        let sources: BTreeSet<_> = wave.iter().map(|t| t.destination.clone()).collect();
        let mut filter = TransitionFilter::new()
            .from_states(&sources)
            .at_iteration(iteration);
        if pending_only {
            filter = filter.pending();
        }

        wave = tx.transitions(key, &filter)?;
        for t in &wave {
            if seen.insert(t.id) {
                reached.push(t.clone());
            }
        }
        iteration += 1;
    }
    Ok(reached)
}
