//! Workflow Engine: the main entry point
//!
//! The engine owns the shared collaborators every object operation needs:
//! 1. The definition registry
//! 2. The store, behind [`WorkflowStore`]
//! 3. The injected [`Authorizer`]
//! 4. The hook registry
//!
//! Per-object work goes through [`WorkflowObject`] handles obtained from
//! [`WorkflowEngine::object`]. The engine is `Send + Sync`; share it with
//! `Arc` when several threads decide approvals.

use crate::authorization::Authorizer;
use crate::config::{EngineConfig, EngineSettings};
use crate::hooks::{HookRegistry, WorkflowHook};
use crate::object::WorkflowObject;
use crate::DefinitionRegistry;
use approval_workflow_store::{InMemoryWorkflowStore, WorkflowStore};
use approval_workflow_types::{InstanceKey, ObjectRef, State, Workflow, WorkflowId, WorkflowResult};
use std::collections::HashSet;
use std::sync::{Arc, RwLock};

/// The approval workflow engine
pub struct WorkflowEngine {
    /// Registered definitions
    definitions: DefinitionRegistry,
    /// Per-object records
    store: Arc<dyn WorkflowStore>,
    /// Decides who may sign an approval
    authorizer: Arc<dyn Authorizer>,
    /// Event listeners
    hooks: HookRegistry,
    settings: EngineSettings,
    /// Instances known to be materialized
    initialized: RwLock<HashSet<InstanceKey>>,
}

impl WorkflowEngine {
    /// Create an engine over an existing store
    pub fn new(store: Arc<dyn WorkflowStore>, authorizer: Arc<dyn Authorizer>) -> Self {
        Self {
            definitions: DefinitionRegistry::new(),
            store,
            authorizer,
            hooks: HookRegistry::new(),
            settings: EngineSettings::default(),
            initialized: RwLock::new(HashSet::new()),
        }
    }

    /// Create an engine backed by a fresh in-memory store
    pub fn in_memory(authorizer: Arc<dyn Authorizer>) -> Self {
        Self::new(Arc::new(InMemoryWorkflowStore::new()), authorizer)
    }

    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Apply the `engine` section of a loaded configuration
    pub fn with_config(self, config: &EngineConfig) -> Self {
        self.with_settings(config.engine.clone())
    }

    // ── Definitions ──────────────────────────────────────────────────

    /// Register a workflow definition
    pub fn register_workflow(&mut self, workflow: Workflow) -> WorkflowResult<WorkflowId> {
        self.definitions.register(workflow)
    }

    pub fn definitions(&self) -> &DefinitionRegistry {
        &self.definitions
    }

    // ── Hooks ────────────────────────────────────────────────────────

    /// Listen to every object of a type on one field
    pub fn register_hook(
        &mut self,
        object_type: impl Into<String>,
        field: impl Into<String>,
        hook: Arc<dyn WorkflowHook>,
    ) {
        self.hooks.register(object_type, field, hook);
    }

    /// Listen to one object on one field
    pub fn register_object_hook(
        &mut self,
        object: &ObjectRef,
        field: impl Into<String>,
        hook: Arc<dyn WorkflowHook>,
    ) {
        self.hooks.register_for_object(object, field, hook);
    }

    /// Register a hook fired only when an object of the type moves
    /// along a matching edge
    pub fn register_transition_hook(
        &mut self,
        object_type: impl Into<String>,
        field: impl Into<String>,
        source: Option<State>,
        destination: Option<State>,
        hook: Arc<dyn WorkflowHook>,
    ) {
        self.hooks
            .register_for_transition(object_type, field, source, destination, hook);
    }

    pub fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }

    // ── Objects ──────────────────────────────────────────────────────

    /// Handle on the workflow governing `field` of `object`
    pub fn object(&self, object: ObjectRef, field: &str) -> WorkflowResult<WorkflowObject<'_>> {
        let workflow = self.definitions.for_binding(&object.object_type, field)?;
        let key = InstanceKey::new(workflow.id.clone(), object);
        Ok(WorkflowObject::new(self, workflow, key, field.to_string()))
    }

    pub fn store(&self) -> &dyn WorkflowStore {
        self.store.as_ref()
    }

    pub fn authorizer(&self) -> &dyn Authorizer {
        self.authorizer.as_ref()
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    // A poisoned cache only costs a storage lookup; materialization is
    // idempotent.
    pub(crate) fn is_initialized(&self, key: &InstanceKey) -> bool {
        self.initialized
            .read()
            .map(|known| known.contains(key))
            .unwrap_or(false)
    }

    pub(crate) fn mark_initialized(&self, key: &InstanceKey) {
        if let Ok(mut known) = self.initialized.write() {
            known.insert(key.clone());
        }
    }
}

impl std::fmt::Debug for WorkflowEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowEngine")
            .field("definitions", &self.definitions.count())
            .field("hooks", &self.hooks)
            .field("settings", &self.settings)
            .finish()
    }
}
