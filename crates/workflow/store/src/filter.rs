//! Query filters over per-object records.
//!
//! Filters are plain values evaluated by the backend. Unset fields match
//! everything; status lists match any of the listed statuses.

use approval_workflow_types::{
    ApprovalStatus, State, Transition, TransitionApproval, TransitionId, TransitionStatus,
    TransitionTemplateId,
};
use std::collections::BTreeSet;

/// Filter over an instance's transitions.
#[derive(Debug, Clone, Default)]
pub struct TransitionFilter {
    pub ids: Option<BTreeSet<TransitionId>>,
    pub source_states: Option<BTreeSet<State>>,
    pub destination: Option<State>,
    pub exclude_destination: Option<State>,
    pub statuses: Vec<TransitionStatus>,
    pub iteration: Option<u32>,
    pub min_iteration: Option<u32>,
    pub max_iteration: Option<u32>,
    pub template: Option<TransitionTemplateId>,
}

impl TransitionFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ids(mut self, ids: impl IntoIterator<Item = TransitionId>) -> Self {
        self.ids = Some(ids.into_iter().collect());
        self
    }

    pub fn from_state(mut self, state: &State) -> Self {
        self.source_states
            .get_or_insert_with(BTreeSet::new)
            .insert(state.clone());
        self
    }

    pub fn from_states<'a>(mut self, states: impl IntoIterator<Item = &'a State>) -> Self {
        let set = self.source_states.get_or_insert_with(BTreeSet::new);
        set.extend(states.into_iter().cloned());
        self
    }

    pub fn to(mut self, state: &State) -> Self {
        self.destination = Some(state.clone());
        self
    }

    pub fn not_to(mut self, state: &State) -> Self {
        self.exclude_destination = Some(state.clone());
        self
    }

    pub fn with_status(mut self, status: TransitionStatus) -> Self {
        self.statuses.push(status);
        self
    }

    pub fn pending(self) -> Self {
        self.with_status(TransitionStatus::Pending)
    }

    pub fn at_iteration(mut self, iteration: u32) -> Self {
        self.iteration = Some(iteration);
        self
    }

    pub fn min_iteration(mut self, iteration: u32) -> Self {
        self.min_iteration = Some(iteration);
        self
    }

    pub fn max_iteration(mut self, iteration: u32) -> Self {
        self.max_iteration = Some(iteration);
        self
    }

    pub fn of_template(mut self, template: &TransitionTemplateId) -> Self {
        self.template = Some(template.clone());
        self
    }

    pub fn matches(&self, t: &Transition) -> bool {
        if let Some(ids) = &self.ids {
            if !ids.contains(&t.id) {
                return false;
            }
        }
        if let Some(sources) = &self.source_states {
            if !sources.contains(&t.source_state) {
                return false;
            }
        }
        if self.destination.as_ref().is_some_and(|d| d != &t.destination) {
            return false;
        }
        if self
            .exclude_destination
            .as_ref()
            .is_some_and(|d| d == &t.destination)
        {
            return false;
        }
        if !self.statuses.is_empty() && !self.statuses.contains(&t.status) {
            return false;
        }
        if self.iteration.is_some_and(|i| i != t.iteration)
            || self.min_iteration.is_some_and(|i| t.iteration < i)
            || self.max_iteration.is_some_and(|i| t.iteration > i)
        {
            return false;
        }
        if self.template.as_ref().is_some_and(|id| id != &t.template_id) {
            return false;
        }
        true
    }
}

/// Filter over an instance's approvals.
#[derive(Debug, Clone, Default)]
pub struct ApprovalFilter {
    pub transitions: Option<BTreeSet<TransitionId>>,
    pub statuses: Vec<ApprovalStatus>,
}

impl ApprovalFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn of_transition(mut self, id: TransitionId) -> Self {
        self.transitions
            .get_or_insert_with(BTreeSet::new)
            .insert(id);
        self
    }

    pub fn of_transitions(mut self, ids: impl IntoIterator<Item = TransitionId>) -> Self {
        self.transitions
            .get_or_insert_with(BTreeSet::new)
            .extend(ids);
        self
    }

    pub fn with_status(mut self, status: ApprovalStatus) -> Self {
        self.statuses.push(status);
        self
    }

    pub fn pending(self) -> Self {
        self.with_status(ApprovalStatus::Pending)
    }

    /// Approved or rejected
    pub fn decided(self) -> Self {
        self.with_status(ApprovalStatus::Approved)
            .with_status(ApprovalStatus::Rejected)
    }

    pub fn matches(&self, a: &TransitionApproval) -> bool {
        if let Some(ids) = &self.transitions {
            if !ids.contains(&a.transition_id) {
                return false;
            }
        }
        self.statuses.is_empty() || self.statuses.contains(&a.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approval_workflow_types::{ObjectRef, WorkflowId};
    use chrono::Utc;

    fn make_transition(src: &str, dst: &str, iteration: u32, status: TransitionStatus) -> Transition {
        Transition {
            id: TransitionId(1),
            workflow_id: WorkflowId::new("wf"),
            object: ObjectRef::new("ticket", "1"),
            source_state: State::new(src),
            destination: State::new(dst),
            template_id: TransitionTemplateId::new(format!("{}->{}", src, dst)),
            status,
            iteration,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn empty_filter_matches_everything() {
        let t = make_transition("a", "b", 3, TransitionStatus::Cancelled);
        assert!(TransitionFilter::new().matches(&t));
    }

    #[test]
    fn iteration_bounds_are_inclusive() {
        let t = make_transition("a", "b", 3, TransitionStatus::Pending);
        assert!(TransitionFilter::new().min_iteration(3).max_iteration(3).matches(&t));
        assert!(!TransitionFilter::new().min_iteration(4).matches(&t));
        assert!(!TransitionFilter::new().max_iteration(2).matches(&t));
    }

    #[test]
    fn state_and_status_criteria_combine() {
        let t = make_transition("a", "b", 0, TransitionStatus::Done);
        let a = State::new("a");
        let b = State::new("b");
        assert!(TransitionFilter::new().from_state(&a).to(&b).matches(&t));
        assert!(!TransitionFilter::new().from_state(&a).not_to(&b).matches(&t));
        assert!(!TransitionFilter::new().pending().matches(&t));
        assert!(TransitionFilter::new()
            .pending()
            .with_status(TransitionStatus::Done)
            .matches(&t));
    }
}
