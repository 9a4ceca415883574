//! Transition and approval templates
//!
//! A TransitionTemplate is one edge of a workflow definition. Each
//! edge carries the approval templates that must all be resolved
//! before an object may cross it. Templates are copied into concrete
//! per-object records when a workflow object is initialized, and
//! again each time a cycle re-enters an exhausted region.

use crate::{Authorization, State};
use serde::{Deserialize, Serialize};

/// Identifier of a transition template, unique within a workflow
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransitionTemplateId(pub String);

impl TransitionTemplateId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Conventional id derived from the edge it describes
    pub fn for_edge(source: &State, destination: &State) -> Self {
        Self(format!("{}->{}", source, destination))
    }
}

impl std::fmt::Display for TransitionTemplateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of an approval template
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ApprovalTemplateId(pub String);

impl ApprovalTemplateId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for ApprovalTemplateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An edge of the workflow graph: source state → destination state
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransitionTemplate {
    pub id: TransitionTemplateId,
    #[serde(rename = "source")]
    pub source_state: State,
    pub destination: State,
    /// Approvals required to cross this edge, in priority order
    #[serde(default)]
    pub approvals: Vec<ApprovalTemplate>,
}

impl TransitionTemplate {
    pub fn new(source: impl Into<State>, destination: impl Into<State>) -> Self {
        let source_state = source.into();
        let destination = destination.into();
        Self {
            id: TransitionTemplateId::for_edge(&source_state, &destination),
            source_state,
            destination,
            approvals: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = TransitionTemplateId::new(id);
        self
    }

    /// Attach an approval template. Approvals are kept sorted by
    /// priority; insertion order breaks ties.
    pub fn with_approval(mut self, approval: ApprovalTemplate) -> Self {
        let at = self
            .approvals
            .iter()
            .position(|a| a.priority > approval.priority)
            .unwrap_or(self.approvals.len());
        self.approvals.insert(at, approval);
        self
    }

    /// Shorthand for an approval template with the given rule
    pub fn approved_by(self, priority: u32, authorization: Authorization) -> Self {
        let id = format!("{}#{}", self.id, self.approvals.len());
        self.with_approval(ApprovalTemplate::new(id, priority, authorization))
    }
}

/// One sign-off required on a transition
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApprovalTemplate {
    pub id: ApprovalTemplateId,
    /// Lower priorities must be resolved first
    #[serde(default)]
    pub priority: u32,
    #[serde(default)]
    pub authorization: Authorization,
}

impl ApprovalTemplate {
    pub fn new(id: impl Into<String>, priority: u32, authorization: Authorization) -> Self {
        Self {
            id: ApprovalTemplateId::new(id),
            priority,
            authorization,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GroupId;

    #[test]
    fn test_template_id_from_edge() {
        let t = TransitionTemplate::new("draft", "review");
        assert_eq!(t.id, TransitionTemplateId::new("draft->review"));
        assert!(t.approvals.is_empty());
    }

    #[test]
    fn test_approvals_sorted_by_priority() {
        let t = TransitionTemplate::new("draft", "review")
            .approved_by(2, Authorization::default().with_group("legal"))
            .approved_by(0, Authorization::default().with_group("author"))
            .approved_by(2, Authorization::default().with_group("finance"));

        let priorities: Vec<u32> = t.approvals.iter().map(|a| a.priority).collect();
        assert_eq!(priorities, vec![0, 2, 2]);
        assert!(t.approvals[1]
            .authorization
            .groups
            .contains(&GroupId::new("legal")));
        assert!(t.approvals[2]
            .authorization
            .groups
            .contains(&GroupId::new("finance")));
    }

    #[test]
    fn test_template_deserializes_with_defaults() {
        let json = r#"{"id":"a-b","source":"a","destination":"b"}"#;
        let t: TransitionTemplate = serde_json::from_str(json).unwrap();
        assert_eq!(t.source_state, State::new("a"));
        assert!(t.approvals.is_empty());
    }
}
