//! In-memory reference implementation of the workflow store.
//!
//! Each instance graph is versioned. A transaction copies a graph the
//! first time it touches it and validates the version on commit, so the
//! first committer wins and later ones fail with `Conflict`. Row locks
//! live in a separate table keyed by transition id.

use crate::traits::{StoreTx, WorkflowStore};
use crate::{ApprovalFilter, StorageError, StorageResult, TransitionFilter};
use approval_workflow_types::{
    ApprovalId, ApprovalStatus, InstanceKey, NewApproval, NewTransition, State, Transition,
    TransitionApproval, TransitionId, TransitionStatus,
};
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, RwLock};

#[derive(Clone, Debug, Default)]
struct ObjectGraph {
    version: u64,
    state: Option<State>,
    transitions: BTreeMap<TransitionId, Transition>,
    approvals: BTreeMap<ApprovalId, TransitionApproval>,
}

/// In-memory workflow store.
#[derive(Default)]
pub struct InMemoryWorkflowStore {
    graphs: RwLock<HashMap<InstanceKey, ObjectGraph>>,
    row_locks: Mutex<HashMap<TransitionId, u64>>,
    next_tx: AtomicU64,
    next_transition: AtomicU64,
    next_approval: AtomicU64,
}

impl InMemoryWorkflowStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of instances with committed records
    pub fn instance_count(&self) -> StorageResult<usize> {
        let guard = self
            .graphs
            .read()
            .map_err(|_| StorageError::Backend("graphs lock poisoned".to_string()))?;
        Ok(guard.len())
    }
}

impl WorkflowStore for InMemoryWorkflowStore {
    fn begin(&self) -> StorageResult<Box<dyn StoreTx + '_>> {
        let tx_id = self.next_tx.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Box::new(MemoryTx {
            store: self,
            tx_id,
            staged: HashMap::new(),
            held: Vec::new(),
        }))
    }
}

struct Staged {
    base_version: u64,
    graph: ObjectGraph,
    dirty: bool,
}

struct MemoryTx<'a> {
    store: &'a InMemoryWorkflowStore,
    tx_id: u64,
    staged: HashMap<InstanceKey, Staged>,
    held: Vec<TransitionId>,
}

impl MemoryTx<'_> {
    fn stage(&mut self, key: &InstanceKey) -> StorageResult<&mut Staged> {
        if !self.staged.contains_key(key) {
            let guard = self
                .store
                .graphs
                .read()
                .map_err(|_| StorageError::Backend("graphs lock poisoned".to_string()))?;
            let graph = guard.get(key).cloned().unwrap_or_default();
            self.staged.insert(
                key.clone(),
                Staged {
                    base_version: graph.version,
                    graph,
                    dirty: false,
                },
            );
        }
        self.staged
            .get_mut(key)
            .ok_or_else(|| StorageError::Backend(format!("instance {} not staged", key)))
    }

    fn graph(&mut self, key: &InstanceKey) -> StorageResult<&ObjectGraph> {
        Ok(&self.stage(key)?.graph)
    }

    fn graph_mut(&mut self, key: &InstanceKey) -> StorageResult<&mut ObjectGraph> {
        let staged = self.stage(key)?;
        staged.dirty = true;
        Ok(&mut staged.graph)
    }

    fn release_locks(&mut self) {
        if self.held.is_empty() {
            return;
        }
        if let Ok(mut locks) = self.store.row_locks.lock() {
            for id in self.held.drain(..) {
                if locks.get(&id) == Some(&self.tx_id) {
                    locks.remove(&id);
                }
            }
        }
    }
}

impl StoreTx for MemoryTx<'_> {
    fn object_state(&mut self, key: &InstanceKey) -> StorageResult<Option<State>> {
        Ok(self.graph(key)?.state.clone())
    }

    fn set_object_state(&mut self, key: &InstanceKey, state: &State) -> StorageResult<()> {
        self.graph_mut(key)?.state = Some(state.clone());
        Ok(())
    }

    fn transitions(
        &mut self,
        key: &InstanceKey,
        filter: &TransitionFilter,
    ) -> StorageResult<Vec<Transition>> {
        let mut values = self
            .graph(key)?
            .transitions
            .values()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect::<Vec<_>>();
        values.sort_by_key(|t| (t.iteration, t.id));
        Ok(values)
    }

    fn transition(&mut self, key: &InstanceKey, id: TransitionId) -> StorageResult<Transition> {
        self.graph(key)?
            .transitions
            .get(&id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("transition {} of {}", id, key)))
    }

    fn insert_transition(
        &mut self,
        key: &InstanceKey,
        new: NewTransition,
    ) -> StorageResult<Transition> {
        let graph = self.graph_mut(key)?;
        if graph
            .transitions
            .values()
            .any(|t| t.template_id == new.template_id && t.iteration == new.iteration)
        {
            return Err(StorageError::UniqueViolation(format!(
                "transition {} at iteration {} already exists for {}",
                new.template_id, new.iteration, key
            )));
        }

        let id = TransitionId(self.store.next_transition.fetch_add(1, Ordering::SeqCst) + 1);
        let transition = Transition {
            id,
            workflow_id: key.workflow_id.clone(),
            object: key.object.clone(),
            source_state: new.source_state,
            destination: new.destination,
            template_id: new.template_id,
            status: TransitionStatus::Pending,
            iteration: new.iteration,
            created_at: Utc::now(),
        };
        self.graph_mut(key)?
            .transitions
            .insert(id, transition.clone());
        Ok(transition)
    }

    fn set_transition_status(
        &mut self,
        key: &InstanceKey,
        id: TransitionId,
        status: TransitionStatus,
    ) -> StorageResult<()> {
        let transition = self
            .graph_mut(key)?
            .transitions
            .get_mut(&id)
            .ok_or_else(|| StorageError::NotFound(format!("transition {} of {}", id, key)))?;
        transition.status = status;
        Ok(())
    }

    fn approvals(
        &mut self,
        key: &InstanceKey,
        filter: &ApprovalFilter,
    ) -> StorageResult<Vec<TransitionApproval>> {
        Ok(self
            .graph(key)?
            .approvals
            .values()
            .filter(|a| filter.matches(a))
            .cloned()
            .collect())
    }

    fn approval(&mut self, key: &InstanceKey, id: ApprovalId) -> StorageResult<TransitionApproval> {
        self.graph(key)?
            .approvals
            .get(&id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("approval {} of {}", id, key)))
    }

    fn insert_approval(
        &mut self,
        key: &InstanceKey,
        new: NewApproval,
    ) -> StorageResult<TransitionApproval> {
        if !self.graph(key)?.transitions.contains_key(&new.transition_id) {
            return Err(StorageError::NotFound(format!(
                "transition {} of {}",
                new.transition_id, key
            )));
        }

        let id = ApprovalId(self.store.next_approval.fetch_add(1, Ordering::SeqCst) + 1);
        let approval = TransitionApproval {
            id,
            workflow_id: key.workflow_id.clone(),
            object: key.object.clone(),
            transition_id: new.transition_id,
            template_id: new.template_id,
            priority: new.priority,
            status: ApprovalStatus::Pending,
            approver: None,
            decided_at: None,
            authorization: new.authorization,
            previous: None,
            created_at: Utc::now(),
        };
        self.graph_mut(key)?.approvals.insert(id, approval.clone());
        Ok(approval)
    }

    fn update_approval(
        &mut self,
        key: &InstanceKey,
        approval: &TransitionApproval,
    ) -> StorageResult<()> {
        let slot = self
            .graph_mut(key)?
            .approvals
            .get_mut(&approval.id)
            .ok_or_else(|| StorageError::NotFound(format!("approval {} of {}", approval.id, key)))?;
        *slot = approval.clone();
        Ok(())
    }

    fn min_pending_priority(
        &mut self,
        key: &InstanceKey,
        transition: TransitionId,
    ) -> StorageResult<Option<u32>> {
        Ok(self
            .graph(key)?
            .approvals
            .values()
            .filter(|a| a.transition_id == transition && a.is_pending())
            .map(|a| a.priority)
            .min())
    }

    fn lock_transitions_nowait(&mut self, ids: &[TransitionId]) -> StorageResult<()> {
        let mut locks = self
            .store
            .row_locks
            .lock()
            .map_err(|_| StorageError::Backend("row lock table poisoned".to_string()))?;

        let busy = ids
            .iter()
            .filter(|id| locks.get(id).is_some_and(|owner| *owner != self.tx_id))
            .map(|id| id.to_string())
            .collect::<Vec<_>>();
        if !busy.is_empty() {
            tracing::warn!(tx = self.tx_id, rows = %busy.join(","), "Row lock contention");
            return Err(StorageError::LockContention(busy.join(",")));
        }

        for id in ids {
            if locks.insert(*id, self.tx_id).is_none() {
                self.held.push(*id);
            }
        }
        Ok(())
    }

    fn commit(mut self: Box<Self>) -> StorageResult<()> {
        let staged = std::mem::take(&mut self.staged);
        {
            let mut guard = self
                .store
                .graphs
                .write()
                .map_err(|_| StorageError::Backend("graphs lock poisoned".to_string()))?;

            for (key, entry) in staged.iter().filter(|(_, s)| s.dirty) {
                let current = guard.get(key).map(|g| g.version).unwrap_or(0);
                if current != entry.base_version {
                    tracing::warn!(
                        tx = self.tx_id,
                        instance = %key,
                        expected = entry.base_version,
                        found = current,
                        "Commit lost to a concurrent writer"
                    );
                    return Err(StorageError::Conflict(format!(
                        "{} was modified by another transaction",
                        key
                    )));
                }
            }

            for (key, entry) in staged.into_iter().filter(|(_, s)| s.dirty) {
                let mut graph = entry.graph;
                graph.version = entry.base_version + 1;
                guard.insert(key, graph);
            }
        }
        self.release_locks();
        Ok(())
    }
}

impl Drop for MemoryTx<'_> {
    fn drop(&mut self) {
        self.release_locks();
    }
}
