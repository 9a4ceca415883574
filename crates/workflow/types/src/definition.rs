//! Workflow definitions: the blueprint an object moves through
//!
//! A Workflow is a directed graph where:
//! - Vertices are states (opaque labels)
//! - Edges are transition templates gated by approval templates
//!
//! A definition is bound to one (object-type, field) pair and is
//! immutable once registered. Cycles are allowed; an object may
//! revisit a state any number of times.

use crate::{TransitionTemplate, TransitionTemplateId, WorkflowError, WorkflowResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

// ── Identifiers ──────────────────────────────────────────────────────

/// Unique identifier for a workflow definition
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkflowId(pub String);

impl WorkflowId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// First eight characters, for logs
    pub fn short(&self) -> &str {
        self.0
            .char_indices()
            .nth(8)
            .map_or(&self.0[..], |(end, _)| &self.0[..end])
    }
}

impl std::fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A position in a workflow, e.g. `draft` or `approved`
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct State(pub String);

impl State {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn label(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for State {
    fn from(label: &str) -> Self {
        Self::new(label)
    }
}

impl From<String> for State {
    fn from(label: String) -> Self {
        Self(label)
    }
}

// ── Workflow Definition ──────────────────────────────────────────────

/// A workflow definition bound to one field of one object type
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Workflow {
    /// Unique identifier
    #[serde(default = "WorkflowId::generate")]
    pub id: WorkflowId,
    /// Human-readable name
    #[serde(default)]
    pub name: String,
    /// Type tag of the objects this workflow governs
    pub object_type: String,
    /// Name of the state field on those objects
    pub field: String,
    /// Where every object starts
    pub initial_state: State,
    /// States that complete the workflow
    #[serde(default)]
    pub final_states: BTreeSet<State>,
    /// The edges of the graph
    #[serde(default)]
    pub transitions: Vec<TransitionTemplate>,
    /// When this definition was created
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Workflow {
    /// Create a new workflow definition with no transitions
    pub fn new(
        object_type: impl Into<String>,
        field: impl Into<String>,
        initial_state: impl Into<State>,
    ) -> Self {
        let object_type = object_type.into();
        let field = field.into();
        Self {
            id: WorkflowId::generate(),
            name: format!("{}.{}", object_type, field),
            object_type,
            field,
            initial_state: initial_state.into(),
            final_states: BTreeSet::new(),
            transitions: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = WorkflowId::new(id);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_final_state(mut self, state: impl Into<State>) -> Self {
        self.final_states.insert(state.into());
        self
    }

    /// Add a transition template, rejecting duplicate edges and ids
    pub fn add_transition(&mut self, template: TransitionTemplate) -> WorkflowResult<()> {
        if self.transitions.iter().any(|t| {
            t.source_state == template.source_state && t.destination == template.destination
        }) {
            return Err(WorkflowError::DuplicateTransition {
                source_state: template.source_state,
                destination: template.destination,
            });
        }
        if self.transitions.iter().any(|t| t.id == template.id) {
            return Err(WorkflowError::DuplicateTemplateId(template.id));
        }
        self.transitions.push(template);
        Ok(())
    }

    /// Builder form of [`Workflow::add_transition`]
    pub fn with_transition(mut self, template: TransitionTemplate) -> WorkflowResult<Self> {
        self.add_transition(template)?;
        Ok(self)
    }

    /// Get a template by id
    pub fn template(&self, id: &TransitionTemplateId) -> Option<&TransitionTemplate> {
        self.transitions.iter().find(|t| &t.id == id)
    }

    /// Templates leaving any of the given states
    pub fn templates_from(&self, states: &HashSet<State>) -> Vec<&TransitionTemplate> {
        self.transitions
            .iter()
            .filter(|t| states.contains(&t.source_state))
            .collect()
    }

    /// Every state mentioned by the definition
    pub fn states(&self) -> BTreeSet<State> {
        let mut states = BTreeSet::new();
        states.insert(self.initial_state.clone());
        states.extend(self.final_states.iter().cloned());
        for t in &self.transitions {
            states.insert(t.source_state.clone());
            states.insert(t.destination.clone());
        }
        states
    }

    pub fn is_final(&self, state: &State) -> bool {
        self.final_states.contains(state)
    }

    /// Validate the definition for structural correctness
    pub fn validate(&self) -> WorkflowResult<()> {
        if self.object_type.is_empty() || self.field.is_empty() {
            return Err(WorkflowError::ValidationError(
                "Workflow must name an object type and a field".into(),
            ));
        }

        let mut edges = HashSet::new();
        let mut ids = HashSet::new();
        for t in &self.transitions {
            if !edges.insert((&t.source_state, &t.destination)) {
                return Err(WorkflowError::DuplicateTransition {
                    source_state: t.source_state.clone(),
                    destination: t.destination.clone(),
                });
            }
            if !ids.insert(&t.id) {
                return Err(WorkflowError::DuplicateTemplateId(t.id.clone()));
            }
            if t.source_state == t.destination {
                return Err(WorkflowError::ValidationError(format!(
                    "Transition {} loops onto its own source state",
                    t.id
                )));
            }

            let mut approval_ids = HashSet::new();
            for a in &t.approvals {
                if !approval_ids.insert(&a.id) {
                    return Err(WorkflowError::ValidationError(format!(
                        "Duplicate approval template {} on {}",
                        a.id, t.id
                    )));
                }
            }
        }

        if !self.transitions.is_empty()
            && !self
                .transitions
                .iter()
                .any(|t| t.source_state == self.initial_state)
        {
            return Err(WorkflowError::ValidationError(format!(
                "Initial state {} has no outgoing transition",
                self.initial_state
            )));
        }

        if let Some(t) = self
            .transitions
            .iter()
            .find(|t| self.final_states.contains(&t.source_state))
        {
            return Err(WorkflowError::ValidationError(format!(
                "Final state {} has an outgoing transition {}",
                t.source_state, t.id
            )));
        }

        Ok(())
    }
}
