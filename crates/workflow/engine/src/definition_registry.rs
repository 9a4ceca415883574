//! Definition registry: stores and retrieves workflow definitions
//!
//! Workflow definitions are immutable once registered and shared through
//! `Arc`. Each definition is bound to exactly one (object-type, field)
//! pair; the registry refuses a second definition for the same binding.

use approval_workflow_types::{Workflow, WorkflowError, WorkflowId, WorkflowResult};
use std::collections::HashMap;
use std::sync::Arc;

/// Registry of workflow definitions
#[derive(Clone, Debug, Default)]
pub struct DefinitionRegistry {
    /// All registered definitions, keyed by ID
    definitions: HashMap<WorkflowId, Arc<Workflow>>,
    /// Index by (object type, field)
    by_binding: HashMap<(String, String), WorkflowId>,
}

impl DefinitionRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a workflow definition
    ///
    /// Validates the definition before storing. Returns the definition ID.
    pub fn register(&mut self, workflow: Workflow) -> WorkflowResult<WorkflowId> {
        workflow.validate()?;

        let binding = (workflow.object_type.clone(), workflow.field.clone());
        if self.by_binding.contains_key(&binding) {
            return Err(WorkflowError::DuplicateBinding {
                object_type: binding.0,
                field: binding.1,
            });
        }
        if self.definitions.contains_key(&workflow.id) {
            return Err(WorkflowError::ValidationError(format!(
                "Workflow {} is already registered",
                workflow.id
            )));
        }

        let id = workflow.id.clone();
        tracing::info!(
            workflow_id = %id,
            object_type = %workflow.object_type,
            field = %workflow.field,
            transitions = workflow.transitions.len(),
            "Workflow definition registered"
        );

        self.definitions.insert(id.clone(), Arc::new(workflow));
        self.by_binding.insert(binding, id.clone());
        Ok(id)
    }

    /// Get a definition by ID
    pub fn get(&self, id: &WorkflowId) -> WorkflowResult<Arc<Workflow>> {
        self.definitions
            .get(id)
            .cloned()
            .ok_or_else(|| WorkflowError::DefinitionNotFound(id.clone()))
    }

    /// Get the definition governing a field of an object type
    pub fn for_binding(&self, object_type: &str, field: &str) -> WorkflowResult<Arc<Workflow>> {
        self.by_binding
            .get(&(object_type.to_string(), field.to_string()))
            .and_then(|id| self.definitions.get(id))
            .cloned()
            .ok_or_else(|| WorkflowError::WorkflowNotFound {
                object_type: object_type.to_string(),
                field: field.to_string(),
            })
    }

    /// List all registered definitions
    pub fn list(&self) -> Vec<Arc<Workflow>> {
        self.definitions.values().cloned().collect()
    }

    /// Total number of registered definitions
    pub fn count(&self) -> usize {
        self.definitions.len()
    }

    /// Check if a definition exists
    pub fn contains(&self, id: &WorkflowId) -> bool {
        self.definitions.contains_key(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approval_workflow_types::TransitionTemplate;

    fn make_valid_definition(object_type: &str) -> Workflow {
        Workflow::new(object_type, "status", "open")
            .with_final_state("closed")
            .with_transition(TransitionTemplate::new("open", "closed"))
            .unwrap()
    }

    #[test]
    fn test_register_and_get() {
        let mut registry = DefinitionRegistry::new();
        let id = registry.register(make_valid_definition("ticket")).unwrap();

        let retrieved = registry.get(&id).unwrap();
        assert_eq!(retrieved.object_type, "ticket");
        assert_eq!(registry.count(), 1);
        assert!(registry.contains(&id));
    }

    #[test]
    fn test_register_invalid() {
        let mut registry = DefinitionRegistry::new();
        // Initial state has no outgoing transition
        let def = Workflow::new("ticket", "status", "open")
            .with_transition(TransitionTemplate::new("review", "closed"))
            .unwrap();
        assert!(registry.register(def).is_err());
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn test_lookup_by_binding() {
        let mut registry = DefinitionRegistry::new();
        let id = registry.register(make_valid_definition("ticket")).unwrap();

        assert_eq!(registry.for_binding("ticket", "status").unwrap().id, id);
        assert!(matches!(
            registry.for_binding("ticket", "priority"),
            Err(WorkflowError::WorkflowNotFound { .. })
        ));
    }

    #[test]
    fn test_duplicate_binding() {
        let mut registry = DefinitionRegistry::new();
        registry.register(make_valid_definition("ticket")).unwrap();
        let result = registry.register(make_valid_definition("ticket"));
        assert!(matches!(result, Err(WorkflowError::DuplicateBinding { .. })));
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn test_list() {
        let mut registry = DefinitionRegistry::new();
        registry.register(make_valid_definition("ticket")).unwrap();
        registry.register(make_valid_definition("invoice")).unwrap();
        assert_eq!(registry.list().len(), 2);
    }

    #[test]
    fn test_get_nonexistent() {
        let registry = DefinitionRegistry::new();
        let result = registry.get(&WorkflowId::new("nonexistent"));
        assert!(matches!(result, Err(WorkflowError::DefinitionNotFound(_))));
    }
}
