//! Shared workflow fixtures for the engine integration tests.

#![allow(dead_code)]

use approval_workflow_engine::{AllowAll, Authorizer, WorkflowEngine};
use approval_workflow_types::*;
use std::sync::Arc;

pub const TYPE: &str = "document";
pub const FIELD: &str = "status";

pub fn open() -> Authorization {
    Authorization::unrestricted()
}

pub fn edge(source: &str, destination: &str) -> TransitionTemplate {
    TransitionTemplate::new(source, destination).approved_by(0, open())
}

/// Build a workflow from ready-made templates
pub fn workflow(initial: &str, finals: &[&str], templates: Vec<TransitionTemplate>) -> Workflow {
    let mut workflow = Workflow::new(TYPE, FIELD, initial);
    for state in finals {
        workflow = workflow.with_final_state(*state);
    }
    for template in templates {
        workflow.add_transition(template).unwrap();
    }
    workflow
}

/// draft -> review -> published
pub fn linear() -> Workflow {
    workflow(
        "draft",
        &["published"],
        vec![edge("draft", "review"), edge("review", "published")],
    )
}

/// draft forks to legal and finance, both merge into signed, then archived
pub fn diamond() -> Workflow {
    workflow(
        "draft",
        &["archived"],
        vec![
            edge("draft", "legal"),
            edge("draft", "finance"),
            edge("legal", "signed"),
            edge("finance", "signed"),
            edge("signed", "archived"),
        ],
    )
}

/// draft -> review, review loops back to draft or ends in done
pub fn looping() -> Workflow {
    workflow(
        "draft",
        &["done"],
        vec![
            edge("draft", "review"),
            edge("review", "draft"),
            edge("review", "done"),
        ],
    )
}

pub fn engine_with(workflow: Workflow, authorizer: Arc<dyn Authorizer>) -> WorkflowEngine {
    let mut engine = WorkflowEngine::in_memory(authorizer);
    engine.register_workflow(workflow).unwrap();
    engine
}

pub fn engine(workflow: Workflow) -> WorkflowEngine {
    engine_with(workflow, Arc::new(AllowAll))
}

pub fn doc(id: &str) -> ObjectRef {
    ObjectRef::new(TYPE, id)
}

pub fn user(name: &str) -> PrincipalId {
    PrincipalId::new(name)
}

pub fn state(label: &str) -> State {
    State::new(label)
}

/// The single transition for (source, destination) at `iteration`
pub fn find(transitions: &[Transition], source: &str, destination: &str, iteration: u32) -> Transition {
    transitions
        .iter()
        .find(|t| {
            t.source_state.label() == source
                && t.destination.label() == destination
                && t.iteration == iteration
        })
        .cloned()
        .unwrap_or_else(|| panic!("no {}->{}@{}", source, destination, iteration))
}
