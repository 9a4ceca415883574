//! Availability resolver
//!
//! An approval is available to a principal when it is pending, its
//! transition leaves the object's current state, no lower-priority
//! approval of the same transition is still pending, and the principal
//! satisfies its rule. A claimed approval is only available to the
//! principal that claimed it.

use crate::authorization::Authorizer;
use approval_workflow_store::{ApprovalFilter, StoreTx, TransitionFilter};
use approval_workflow_types::{
    InstanceKey, PrincipalId, State, Transition, TransitionApproval, WorkflowResult,
};

/// An approval together with the transition it gates
#[derive(Clone, Debug)]
pub struct AvailableApproval {
    pub approval: TransitionApproval,
    pub transition: Transition,
}

/// Approvals `principal` may decide right now, ordered by
/// (iteration, priority, approval id).
pub(crate) fn available_approvals(
    tx: &mut dyn StoreTx,
    key: &InstanceKey,
    authorizer: &dyn Authorizer,
    principal: &PrincipalId,
    current_state: &State,
    destination: Option<&State>,
) -> WorkflowResult<Vec<AvailableApproval>> {
    let mut filter = TransitionFilter::new().from_state(current_state).pending();
    if let Some(destination) = destination {
        filter = filter.to(destination);
    }

    let mut available = Vec::new();
    for transition in tx.transitions(key, &filter)? {
        let Some(gate) = tx.min_pending_priority(key, transition.id)? else {
            continue;
        };
        let approvals = tx.approvals(key, &ApprovalFilter::new().of_transition(transition.id).pending())?;
        for approval in approvals {
            if approval.priority != gate || !may_decide(authorizer, principal, &approval) {
                continue;
            }
            available.push(AvailableApproval {
                approval,
                transition: transition.clone(),
            });
        }
    }

    available.sort_by_key(|a| (a.transition.iteration, a.approval.priority, a.approval.id));
    Ok(available)
}

/// Distinct destination states, in availability order
pub(crate) fn destinations(available: &[AvailableApproval]) -> Vec<State> {
    let mut states: Vec<State> = Vec::new();
    for a in available {
        if !states.contains(&a.transition.destination) {
            states.push(a.transition.destination.clone());
        }
    }
    states
}

pub(crate) fn may_decide(
    authorizer: &dyn Authorizer,
    principal: &PrincipalId,
    approval: &TransitionApproval,
) -> bool {
    if let Some(claimed_by) = &approval.approver {
        if claimed_by != principal {
            return false;
        }
    }
    authorizer.is_authorized(principal, &approval.authorization)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authorization::DirectoryAuthorizer;
    use crate::materializer::materialize;
    use approval_workflow_store::{InMemoryWorkflowStore, WorkflowStore};
    use approval_workflow_types::{Authorization, ObjectRef, TransitionTemplate, Workflow};

    fn setup() -> (Workflow, InstanceKey, DirectoryAuthorizer) {
        let wf = Workflow::new("po", "status", "open")
            .with_transition(
                TransitionTemplate::new("open", "approved")
                    .approved_by(0, Authorization::default().with_group("managers"))
                    .approved_by(1, Authorization::default().with_group("finance")),
            )
            .unwrap()
            .with_transition(
                TransitionTemplate::new("open", "rejected")
                    .approved_by(0, Authorization::default().with_group("managers")),
            )
            .unwrap();
        let key = InstanceKey::new(wf.id.clone(), ObjectRef::new("po", "7"));
        let directory = DirectoryAuthorizer::new()
            .with_member("mia", "managers")
            .with_member("fred", "finance");
        (wf, key, directory)
    }

    #[test]
    fn test_lowest_priority_gates_transition() {
        let store = InMemoryWorkflowStore::new();
        let (wf, key, directory) = setup();
        let mut tx = store.begin().unwrap();
        materialize(tx.as_mut(), &key, &wf).unwrap();
        let open = State::new("open");

        let fred = PrincipalId::new("fred");
        let for_fred =
            available_approvals(tx.as_mut(), &key, &directory, &fred, &open, None).unwrap();
        assert!(for_fred.is_empty());

        let mia = PrincipalId::new("mia");
        let for_mia =
            available_approvals(tx.as_mut(), &key, &directory, &mia, &open, None).unwrap();
        assert_eq!(for_mia.len(), 2);
        assert_eq!(
            destinations(&for_mia),
            vec![State::new("approved"), State::new("rejected")]
        );
    }

    #[test]
    fn test_destination_narrows_result() {
        let store = InMemoryWorkflowStore::new();
        let (wf, key, directory) = setup();
        let mut tx = store.begin().unwrap();
        materialize(tx.as_mut(), &key, &wf).unwrap();

        let mia = PrincipalId::new("mia");
        let rejected = State::new("rejected");
        let only = available_approvals(
            tx.as_mut(),
            &key,
            &directory,
            &mia,
            &State::new("open"),
            Some(&rejected),
        )
        .unwrap();
        assert_eq!(only.len(), 1);
        assert_eq!(only[0].transition.destination, rejected);
    }

    #[test]
    fn test_wrong_state_has_nothing() {
        let store = InMemoryWorkflowStore::new();
        let (wf, key, directory) = setup();
        let mut tx = store.begin().unwrap();
        materialize(tx.as_mut(), &key, &wf).unwrap();

        let mia = PrincipalId::new("mia");
        let none = available_approvals(
            tx.as_mut(),
            &key,
            &directory,
            &mia,
            &State::new("approved"),
            None,
        )
        .unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_claimed_approval_restricted_to_claimant() {
        let directory = DirectoryAuthorizer::new()
            .with_member("mia", "managers")
            .with_member("max", "managers");
        let (wf, key, _) = setup();
        let store = InMemoryWorkflowStore::new();
        let mut tx = store.begin().unwrap();
        materialize(tx.as_mut(), &key, &wf).unwrap();

        let open = State::new("open");
        let mia = PrincipalId::new("mia");
        let max = PrincipalId::new("max");
        let mut claimed = available_approvals(tx.as_mut(), &key, &directory, &mia, &open, None)
            .unwrap()
            .remove(0)
            .approval;
        claimed.approver = Some(max.clone());
        tx.update_approval(&key, &claimed).unwrap();

        let for_mia =
            available_approvals(tx.as_mut(), &key, &directory, &mia, &open, None).unwrap();
        assert_eq!(for_mia.len(), 1);
        assert_ne!(for_mia[0].approval.id, claimed.id);

        let for_max =
            available_approvals(tx.as_mut(), &key, &directory, &max, &open, None).unwrap();
        assert_eq!(for_max.len(), 2);
    }
}
