//! Graph materializer: instantiates a workflow's templates for one object
//!
//! Expansion is breadth-first from the initial state. Every wave gets
//! its own iteration number. A template is consumed at most once, which
//! is what stops the walk on cyclic definitions; cycles are re-expanded
//! later, on demand, by the cycle handler.

use approval_workflow_store::{ApprovalFilter, StoreTx, TransitionFilter};
use approval_workflow_types::{
    InstanceKey, NewApproval, NewTransition, State, Transition, TransitionTemplate,
    TransitionTemplateId, Workflow, WorkflowResult,
};
use std::collections::HashSet;

/// Materialize the first wave graph for `key`.
///
/// Sets the state pointer to the initial state when unset. Returns the
/// number of transitions created; zero when the object already has
/// transitions under this workflow.
pub(crate) fn materialize(
    tx: &mut dyn StoreTx,
    key: &InstanceKey,
    workflow: &Workflow,
) -> WorkflowResult<usize> {
    if tx.object_state(key)?.is_none() {
        tx.set_object_state(key, &workflow.initial_state)?;
    }

    if !tx.transitions(key, &TransitionFilter::new())?.is_empty() {
        tracing::debug!(object = %key, "Workflow graph already materialized");
        return Ok(0);
    }

    let mut processed: HashSet<&TransitionTemplateId> = HashSet::new();
    let mut frontier: HashSet<State> = HashSet::from([workflow.initial_state.clone()]);
    let mut iteration = 0u32;
    let mut created = 0usize;

    loop {
        let wave: Vec<&TransitionTemplate> = workflow
            .templates_from(&frontier)
            .into_iter()
            .filter(|t| !processed.contains(&t.id))
            .collect();
        if wave.is_empty() {
            break;
        }

        let mut next = HashSet::new();
        for template in wave {
            instantiate(tx, key, template, iteration)?;
            processed.insert(&template.id);
            next.insert(template.destination.clone());
            created += 1;
        }

        frontier = next;
        iteration += 1;
    }

    tracing::debug!(
        object = %key,
        transitions = created,
        waves = iteration,
        "Workflow graph materialized"
    );
    Ok(created)
}

/// Create one pending transition and its approvals from a template
pub(crate) fn instantiate(
    tx: &mut dyn StoreTx,
    key: &InstanceKey,
    template: &TransitionTemplate,
    iteration: u32,
) -> WorkflowResult<Transition> {
    let transition = tx.insert_transition(
        key,
        NewTransition {
            source_state: template.source_state.clone(),
            destination: template.destination.clone(),
            template_id: template.id.clone(),
            iteration,
        },
    )?;

    for approval in &template.approvals {
        tx.insert_approval(
            key,
            NewApproval {
                transition_id: transition.id,
                template_id: Some(approval.id.clone()),
                priority: approval.priority,
                authorization: approval.authorization.clone(),
            },
        )?;
    }
    Ok(transition)
}

/// Clone an existing transition and its approvals into `iteration`.
/// Clones start pending and unclaimed.
pub(crate) fn instantiate_from_image(
    tx: &mut dyn StoreTx,
    key: &InstanceKey,
    image: &Transition,
    iteration: u32,
) -> WorkflowResult<Transition> {
    let transition = tx.insert_transition(
        key,
        NewTransition {
            source_state: image.source_state.clone(),
            destination: image.destination.clone(),
            template_id: image.template_id.clone(),
            iteration,
        },
    )?;

    for approval in tx.approvals(key, &ApprovalFilter::new().of_transition(image.id))? {
        tx.insert_approval(
            key,
            NewApproval {
                transition_id: transition.id,
                template_id: approval.template_id,
                priority: approval.priority,
                authorization: approval.authorization,
            },
        )?;
    }
    Ok(transition)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approval_workflow_store::{InMemoryWorkflowStore, WorkflowStore};
    use approval_workflow_types::{Authorization, ObjectRef};

    fn key(workflow: &Workflow) -> InstanceKey {
        InstanceKey::new(workflow.id.clone(), ObjectRef::new("doc", "1"))
    }

    fn branching_workflow() -> Workflow {
        // a -> b -> d, a -> c -> d, d -> a
        Workflow::new("doc", "status", "a")
            .with_transition(
                TransitionTemplate::new("a", "b")
                    .approved_by(0, Authorization::default().with_group("g1"))
                    .approved_by(1, Authorization::default().with_group("g2")),
            )
            .unwrap()
            .with_transition(TransitionTemplate::new("a", "c").approved_by(0, Authorization::default()))
            .unwrap()
            .with_transition(TransitionTemplate::new("b", "d").approved_by(0, Authorization::default()))
            .unwrap()
            .with_transition(TransitionTemplate::new("c", "d").approved_by(0, Authorization::default()))
            .unwrap()
            .with_transition(TransitionTemplate::new("d", "a").approved_by(0, Authorization::default()))
            .unwrap()
    }

    #[test]
    fn test_waves_get_iteration_numbers() {
        let store = InMemoryWorkflowStore::new();
        let wf = branching_workflow();
        let k = key(&wf);

        let mut tx = store.begin().unwrap();
        assert_eq!(materialize(tx.as_mut(), &k, &wf).unwrap(), 5);

        let all = tx.transitions(&k, &TransitionFilter::new()).unwrap();
        let layout: Vec<(String, u32)> = all
            .iter()
            .map(|t| (t.template_id.to_string(), t.iteration))
            .collect();
        assert_eq!(
            layout,
            vec![
                ("a->b".to_string(), 0),
                ("a->c".to_string(), 0),
                ("b->d".to_string(), 1),
                ("c->d".to_string(), 1),
                ("d->a".to_string(), 2),
            ]
        );
        assert_eq!(tx.object_state(&k).unwrap(), Some(State::new("a")));
    }

    #[test]
    fn test_cyclic_template_consumed_once() {
        let store = InMemoryWorkflowStore::new();
        let wf = branching_workflow();
        let k = key(&wf);

        let mut tx = store.begin().unwrap();
        materialize(tx.as_mut(), &k, &wf).unwrap();
        let back_to_start = tx
            .transitions(&k, &TransitionFilter::new().to(&State::new("a")))
            .unwrap();
        assert_eq!(back_to_start.len(), 1);
    }

    #[test]
    fn test_approvals_copy_priority_and_rule() {
        let store = InMemoryWorkflowStore::new();
        let wf = branching_workflow();
        let k = key(&wf);

        let mut tx = store.begin().unwrap();
        materialize(tx.as_mut(), &k, &wf).unwrap();
        let first = tx
            .transitions(&k, &TransitionFilter::new().to(&State::new("b")))
            .unwrap();
        let approvals = tx
            .approvals(&k, &ApprovalFilter::new().of_transition(first[0].id))
            .unwrap();
        assert_eq!(approvals.len(), 2);
        assert_eq!(approvals[0].priority, 0);
        assert_eq!(approvals[1].priority, 1);
        assert_eq!(
            approvals[1].authorization,
            Authorization::default().with_group("g2")
        );
        assert!(approvals.iter().all(|a| a.is_pending() && a.approver.is_none()));
    }

    #[test]
    fn test_second_run_is_noop() {
        let store = InMemoryWorkflowStore::new();
        let wf = branching_workflow();
        let k = key(&wf);

        let mut tx = store.begin().unwrap();
        materialize(tx.as_mut(), &k, &wf).unwrap();
        tx.commit().unwrap();

        let mut tx = store.begin().unwrap();
        assert_eq!(materialize(tx.as_mut(), &k, &wf).unwrap(), 0);
        assert_eq!(tx.transitions(&k, &TransitionFilter::new()).unwrap().len(), 5);
    }
}
