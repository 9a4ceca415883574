//! Workflow events and hook dispatch
//!
//! Every successful operation produces a list of [`WorkflowEvent`]s.
//! After the store commits, the engine hands them to the
//! [`HookRegistry`], which calls every hook registered for the object's
//! (type, field) binding, or for that one object. A registration may
//! also be narrowed to a source and/or destination state; it then only
//! sees the events that move the object along a matching edge
//! (`Transitioned` and `Jumped`). Hooks run synchronously, in
//! registration order, one event at a time.

use approval_workflow_types::{ObjectRef, State, TransitionApproval};
use std::sync::Arc;

/// Something observable that happened to a workflow object
#[derive(Clone, Debug)]
pub enum WorkflowEvent {
    Approved {
        object: ObjectRef,
        field: String,
        approval: TransitionApproval,
    },
    Rejected {
        object: ObjectRef,
        field: String,
        approval: TransitionApproval,
    },
    Transitioned {
        object: ObjectRef,
        field: String,
        previous_state: State,
        new_state: State,
        approval: TransitionApproval,
    },
    Jumped {
        object: ObjectRef,
        field: String,
        previous_state: State,
        new_state: State,
    },
    WorkflowCompleted {
        object: ObjectRef,
        field: String,
        final_state: State,
    },
}

impl WorkflowEvent {
    pub fn object(&self) -> &ObjectRef {
        match self {
            Self::Approved { object, .. }
            | Self::Rejected { object, .. }
            | Self::Transitioned { object, .. }
            | Self::Jumped { object, .. }
            | Self::WorkflowCompleted { object, .. } => object,
        }
    }

    pub fn field(&self) -> &str {
        match self {
            Self::Approved { field, .. }
            | Self::Rejected { field, .. }
            | Self::Transitioned { field, .. }
            | Self::Jumped { field, .. }
            | Self::WorkflowCompleted { field, .. } => field,
        }
    }

    /// The (previous, new) states of events that move the object
    pub fn edge(&self) -> Option<(&State, &State)> {
        match self {
            Self::Transitioned {
                previous_state,
                new_state,
                ..
            }
            | Self::Jumped {
                previous_state,
                new_state,
                ..
            } => Some((previous_state, new_state)),
            _ => None,
        }
    }

    /// Short name for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Approved { .. } => "approved",
            Self::Rejected { .. } => "rejected",
            Self::Transitioned { .. } => "transitioned",
            Self::Jumped { .. } => "jumped",
            Self::WorkflowCompleted { .. } => "completed",
        }
    }
}

/// Callbacks for workflow events. Every method defaults to a no-op.
pub trait WorkflowHook: Send + Sync {
    fn on_approved(&self, _object: &ObjectRef, _field: &str, _approval: &TransitionApproval) {}

    fn on_rejected(&self, _object: &ObjectRef, _field: &str, _approval: &TransitionApproval) {}

    fn on_transitioned(
        &self,
        _object: &ObjectRef,
        _field: &str,
        _previous_state: &State,
        _new_state: &State,
        _approval: &TransitionApproval,
    ) {
    }

    fn on_jumped(&self, _object: &ObjectRef, _field: &str, _previous_state: &State, _new_state: &State) {
    }

    fn on_workflow_completed(&self, _object: &ObjectRef, _field: &str) {}
}

struct Registration {
    object_type: String,
    field: String,
    object_id: Option<String>,
    source: Option<State>,
    destination: Option<State>,
    hook: Arc<dyn WorkflowHook>,
}

impl Registration {
    fn narrowed(&self) -> bool {
        self.source.is_some() || self.destination.is_some()
    }

    fn matches(&self, event: &WorkflowEvent) -> bool {
        let object = event.object();
        let bound = self.object_type == object.object_type
            && self.field == event.field()
            && self
                .object_id
                .as_ref()
                .map_or(true, |id| id == &object.object_id);
        if !bound || !self.narrowed() {
            return bound;
        }
        match event.edge() {
            Some((previous, new)) => {
                self.source.as_ref().map_or(true, |s| s == previous)
                    && self.destination.as_ref().map_or(true, |d| d == new)
            }
            None => false,
        }
    }
}

/// Hooks keyed by (object type, field), optionally narrowed to one object
#[derive(Default)]
pub struct HookRegistry {
    registrations: Vec<Registration>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a hook for every object of a type
    pub fn register(
        &mut self,
        object_type: impl Into<String>,
        field: impl Into<String>,
        hook: Arc<dyn WorkflowHook>,
    ) {
        self.registrations.push(Registration {
            object_type: object_type.into(),
            field: field.into(),
            object_id: None,
            source: None,
            destination: None,
            hook,
        });
    }

    /// Register a hook for a single object
    pub fn register_for_object(
        &mut self,
        object: &ObjectRef,
        field: impl Into<String>,
        hook: Arc<dyn WorkflowHook>,
    ) {
        self.registrations.push(Registration {
            object_type: object.object_type.clone(),
            field: field.into(),
            object_id: Some(object.object_id.clone()),
            source: None,
            destination: None,
            hook,
        });
    }

    /// Register a hook for every object of a type, fired only when the
    /// object moves from `source` and/or into `destination`. `None` on
    /// either side matches any state.
    pub fn register_for_transition(
        &mut self,
        object_type: impl Into<String>,
        field: impl Into<String>,
        source: Option<State>,
        destination: Option<State>,
        hook: Arc<dyn WorkflowHook>,
    ) {
        self.registrations.push(Registration {
            object_type: object_type.into(),
            field: field.into(),
            object_id: None,
            source,
            destination,
            hook,
        });
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// Deliver events in order to every matching hook
    pub fn dispatch(&self, events: &[WorkflowEvent]) {
        for event in events {
            let hooks = self
                .registrations
                .iter()
                .filter(|r| r.matches(event));
            for registration in hooks {
                tracing::trace!(object = %event.object(), event = event.kind(), "Dispatching hook");
                deliver(registration.hook.as_ref(), event);
            }
        }
    }
}

impl std::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookRegistry")
            .field("registrations", &self.registrations.len())
            .finish()
    }
}

fn deliver(hook: &dyn WorkflowHook, event: &WorkflowEvent) {
    match event {
        WorkflowEvent::Approved {
            object,
            field,
            approval,
        } => hook.on_approved(object, field, approval),
        WorkflowEvent::Rejected {
            object,
            field,
            approval,
        } => hook.on_rejected(object, field, approval),
        WorkflowEvent::Transitioned {
            object,
            field,
            previous_state,
            new_state,
            approval,
        } => hook.on_transitioned(object, field, previous_state, new_state, approval),
        WorkflowEvent::Jumped {
            object,
            field,
            previous_state,
            new_state,
        } => hook.on_jumped(object, field, previous_state, new_state),
        WorkflowEvent::WorkflowCompleted { object, field, .. } => {
            hook.on_workflow_completed(object, field)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<String>>,
    }

    impl WorkflowHook for Recorder {
        fn on_jumped(&self, object: &ObjectRef, _field: &str, _previous: &State, new: &State) {
            self.seen
                .lock()
                .unwrap()
                .push(format!("jumped {} {}", object, new));
        }

        fn on_workflow_completed(&self, object: &ObjectRef, _field: &str) {
            self.seen.lock().unwrap().push(format!("completed {}", object));
        }
    }

    fn jumped(object: &ObjectRef) -> WorkflowEvent {
        jumped_from(object, "a")
    }

    fn jumped_from(object: &ObjectRef, previous: &str) -> WorkflowEvent {
        WorkflowEvent::Jumped {
            object: object.clone(),
            field: "status".into(),
            previous_state: State::new(previous),
            new_state: State::new("z"),
        }
    }

    #[test]
    fn test_dispatch_by_binding_and_object() {
        let all = Arc::new(Recorder::default());
        let one = Arc::new(Recorder::default());
        let first = ObjectRef::new("doc", "1");
        let second = ObjectRef::new("doc", "2");

        let mut registry = HookRegistry::new();
        registry.register("doc", "status", all.clone());
        registry.register_for_object(&first, "status", one.clone());
        registry.register("doc", "owner", one.clone());
        assert_eq!(registry.len(), 3);

        registry.dispatch(&[jumped(&first), jumped(&second)]);

        assert_eq!(
            *all.seen.lock().unwrap(),
            vec!["jumped doc:1 z", "jumped doc:2 z"]
        );
        assert_eq!(*one.seen.lock().unwrap(), vec!["jumped doc:1 z"]);
    }

    #[test]
    fn test_events_delivered_in_order() {
        let hook = Arc::new(Recorder::default());
        let object = ObjectRef::new("doc", "1");
        let mut registry = HookRegistry::new();
        registry.register("doc", "status", hook.clone());

        registry.dispatch(&[
            jumped(&object),
            WorkflowEvent::WorkflowCompleted {
                object: object.clone(),
                field: "status".into(),
                final_state: State::new("z"),
            },
        ]);
        assert_eq!(
            *hook.seen.lock().unwrap(),
            vec!["jumped doc:1 z", "completed doc:1"]
        );
    }

    #[test]
    fn test_dispatch_narrowed_by_edge() {
        let from_a = Arc::new(Recorder::default());
        let into_z = Arc::new(Recorder::default());
        let b_to_y = Arc::new(Recorder::default());
        let object = ObjectRef::new("doc", "1");

        let mut registry = HookRegistry::new();
        registry.register_for_transition("doc", "status", Some(State::new("a")), None, from_a.clone());
        registry.register_for_transition("doc", "status", None, Some(State::new("z")), into_z.clone());
        registry.register_for_transition(
            "doc",
            "status",
            Some(State::new("b")),
            Some(State::new("y")),
            b_to_y.clone(),
        );

        registry.dispatch(&[
            jumped_from(&object, "a"),
            jumped_from(&object, "b"),
            WorkflowEvent::WorkflowCompleted {
                object: object.clone(),
                field: "status".into(),
                final_state: State::new("z"),
            },
        ]);

        assert_eq!(*from_a.seen.lock().unwrap(), vec!["jumped doc:1 z"]);
        assert_eq!(
            *into_z.seen.lock().unwrap(),
            vec!["jumped doc:1 z", "jumped doc:1 z"]
        );
        assert!(b_to_y.seen.lock().unwrap().is_empty());
    }
}
