//! Cycle handler
//!
//! When a transition completes into a state whose departures were all
//! consumed before, the object has looped back into an exhausted region.
//! The most recent image of that region is cloned into a fresh wave so
//! the object can walk it again.

use crate::materializer::instantiate_from_image;
use approval_workflow_store::{StoreTx, TransitionFilter};
use approval_workflow_types::{
    InstanceKey, State, Transition, TransitionStatus, TransitionTemplateId, WorkflowResult,
};
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// True when `done`'s destination has been left before and nothing
/// pending leaves it now.
///
/// The check is per state label, not per iteration.
pub(crate) fn check_cycled(
    tx: &mut dyn StoreTx,
    key: &InstanceKey,
    done: &Transition,
) -> WorkflowResult<bool> {
    let leaving = tx.transitions(key, &TransitionFilter::new().from_state(&done.destination))?;
    let completed = leaving.iter().filter(|t| t.status == TransitionStatus::Done).count();
    let pending = leaving.iter().filter(|t| t.is_pending()).count();
    Ok(completed > 0 && pending == 0)
}

/// Clone the region reachable from `done.destination` into new waves
/// starting at `done.iteration + 1`. Returns the transitions created.
pub(crate) fn recreate_cycle(
    tx: &mut dyn StoreTx,
    key: &InstanceKey,
    done: &Transition,
) -> WorkflowResult<Vec<Transition>> {
    let reentry = &done.destination;
    let mut iteration = done.iteration + 1;
    let mut cloned: HashSet<TransitionTemplateId> = HashSet::new();
    let mut created = Vec::new();

    let mut images = latest_images(tx, key, &BTreeSet::from([reentry.clone()]), None)?;
    while !images.is_empty() {
        let mut destinations = BTreeSet::new();
        for image in images {
            if !cloned.insert(image.template_id.clone()) {
                continue;
            }
            destinations.insert(image.destination.clone());

            let existing = tx.transitions(
                key,
                &TransitionFilter::new()
                    .of_template(&image.template_id)
                    .at_iteration(iteration),
            )?;
            if existing.is_empty() {
                created.push(instantiate_from_image(tx, key, &image, iteration)?);
            }
        }

        images = latest_images(tx, key, &destinations, Some(reentry))?
            .into_iter()
            .filter(|t| !cloned.contains(&t.template_id))
            .collect();
        iteration += 1;
    }

    tracing::debug!(
        object = %key,
        reentry = %reentry,
        transitions = created.len(),
        "Cycle re-expanded"
    );
    Ok(created)
}

/// For each template leaving `sources`, the instance with the highest
/// iteration. Sources equal to `except` are skipped.
fn latest_images(
    tx: &mut dyn StoreTx,
    key: &InstanceKey,
    sources: &BTreeSet<State>,
    except: Option<&State>,
) -> WorkflowResult<Vec<Transition>> {
    if sources.is_empty() {
        return Ok(Vec::new());
    }

    let mut latest: BTreeMap<TransitionTemplateId, Transition> = BTreeMap::new();
    for t in tx.transitions(key, &TransitionFilter::new().from_states(sources))? {
        if except.is_some_and(|s| s == &t.source_state) {
            continue;
        }
        match latest.get(&t.template_id) {
            Some(seen) if seen.iteration >= t.iteration => {}
            _ => {
                latest.insert(t.template_id.clone(), t);
            }
        }
    }

    let mut images: Vec<Transition> = latest.into_values().collect();
    images.sort_by_key(|t| (t.iteration, t.id));
    Ok(images)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::materializer::materialize;
    use approval_workflow_store::{ApprovalFilter, InMemoryWorkflowStore, WorkflowStore};
    use approval_workflow_types::{Authorization, ObjectRef, TransitionTemplate, Workflow};

    fn loop_workflow() -> Workflow {
        // draft -> review -> draft, review -> done
        Workflow::new("doc", "status", "draft")
            .with_final_state("done")
            .with_transition(
                TransitionTemplate::new("draft", "review")
                    .approved_by(0, Authorization::default().with_group("authors")),
            )
            .unwrap()
            .with_transition(
                TransitionTemplate::new("review", "draft")
                    .approved_by(0, Authorization::default().with_group("editors")),
            )
            .unwrap()
            .with_transition(
                TransitionTemplate::new("review", "done")
                    .approved_by(0, Authorization::default().with_group("editors"))
                    .approved_by(1, Authorization::default().with_group("chiefs")),
            )
            .unwrap()
    }

    fn complete(tx: &mut dyn StoreTx, key: &InstanceKey, destination: &str) -> Transition {
        let t = tx
            .transitions(key, &TransitionFilter::new().to(&State::new(destination)).pending())
            .unwrap()
            .remove(0);
        tx.set_transition_status(key, t.id, TransitionStatus::Done).unwrap();
        t
    }

    #[test]
    fn test_first_arrival_is_not_a_cycle() {
        let store = InMemoryWorkflowStore::new();
        let wf = loop_workflow();
        let key = InstanceKey::new(wf.id.clone(), ObjectRef::new("doc", "1"));
        let mut tx = store.begin().unwrap();
        materialize(tx.as_mut(), &key, &wf).unwrap();

        let to_review = complete(tx.as_mut(), &key, "review");
        assert!(!check_cycled(tx.as_mut(), &key, &to_review).unwrap());
    }

    #[test]
    fn test_return_to_exhausted_state_recreates_region() {
        let store = InMemoryWorkflowStore::new();
        let wf = loop_workflow();
        let key = InstanceKey::new(wf.id.clone(), ObjectRef::new("doc", "1"));
        let mut tx = store.begin().unwrap();
        materialize(tx.as_mut(), &key, &wf).unwrap();

        complete(tx.as_mut(), &key, "review");
        let back = complete(tx.as_mut(), &key, "draft");
        // review -> done is still pending but leaves review, not draft
        assert!(check_cycled(tx.as_mut(), &key, &back).unwrap());

        let created = recreate_cycle(tx.as_mut(), &key, &back).unwrap();
        let layout: Vec<(String, u32)> = created
            .iter()
            .map(|t| (t.template_id.to_string(), t.iteration))
            .collect();
        assert_eq!(
            layout,
            vec![
                ("draft->review".to_string(), 2),
                ("review->draft".to_string(), 3),
                ("review->done".to_string(), 3),
            ]
        );
        assert!(created.iter().all(|t| t.is_pending()));
        assert!(!check_cycled(tx.as_mut(), &key, &back).unwrap());
    }

    #[test]
    fn test_clones_copy_priorities_and_rules() {
        let store = InMemoryWorkflowStore::new();
        let wf = loop_workflow();
        let key = InstanceKey::new(wf.id.clone(), ObjectRef::new("doc", "1"));
        let mut tx = store.begin().unwrap();
        materialize(tx.as_mut(), &key, &wf).unwrap();

        complete(tx.as_mut(), &key, "review");
        let back = complete(tx.as_mut(), &key, "draft");
        let created = recreate_cycle(tx.as_mut(), &key, &back).unwrap();

        let clone = &created[0];
        let approvals = tx
            .approvals(&key, &ApprovalFilter::new().of_transition(clone.id))
            .unwrap();
        assert_eq!(approvals.len(), 1);
        assert_eq!(approvals[0].priority, 0);
        assert_eq!(
            approvals[0].authorization,
            Authorization::default().with_group("authors")
        );
        assert!(approvals[0].is_pending());
    }
}
