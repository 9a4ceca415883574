//! Per-object handle: the public surface for one governed field
//!
//! A [`WorkflowObject`] binds an engine, a definition and one object.
//! Every method opens its own store transaction. Mutating methods commit
//! before their events are dispatched to hooks, so a failed commit never
//! produces a notification.

use crate::approval::{self, ApprovalOutcome};
use crate::availability::{self, destinations, may_decide};
use crate::history;
use crate::jump::{self, JumpOutcome};
use crate::materializer::materialize;
use crate::WorkflowEngine;
use approval_workflow_store::{ApprovalFilter, StoreTx, TransitionFilter};
use approval_workflow_types::{
    ApprovalId, InstanceKey, PrincipalId, State, Transition, TransitionApproval, Workflow,
    WorkflowError, WorkflowResult,
};
use std::sync::Arc;

/// What an operation needs to know about the object it works on
pub(crate) struct Scope<'a> {
    pub key: &'a InstanceKey,
    pub workflow: &'a Workflow,
    pub field: &'a str,
}

/// The object's state pointer; absent until initialized
pub(crate) fn state_of(tx: &mut dyn StoreTx, key: &InstanceKey) -> WorkflowResult<State> {
    tx.object_state(key)?
        .ok_or_else(|| WorkflowError::NotInitialized(key.object.clone()))
}

/// Handle on one object's workflow field
pub struct WorkflowObject<'e> {
    engine: &'e WorkflowEngine,
    workflow: Arc<Workflow>,
    key: InstanceKey,
    field: String,
}

impl<'e> WorkflowObject<'e> {
    pub(crate) fn new(
        engine: &'e WorkflowEngine,
        workflow: Arc<Workflow>,
        key: InstanceKey,
        field: String,
    ) -> Self {
        Self {
            engine,
            workflow,
            key,
            field,
        }
    }

    pub fn key(&self) -> &InstanceKey {
        &self.key
    }

    pub fn workflow(&self) -> &Workflow {
        &self.workflow
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    fn scope(&self) -> Scope<'_> {
        Scope {
            key: &self.key,
            workflow: &self.workflow,
            field: &self.field,
        }
    }

    // ── Initialization ───────────────────────────────────────────────

    /// Materialize the object's transition graph. Returns `false` when
    /// it already existed.
    pub fn initialize(&self) -> WorkflowResult<bool> {
        if self.engine.is_initialized(&self.key) {
            return Ok(false);
        }

        let mut tx = self.engine.store().begin()?;
        let created = materialize(tx.as_mut(), &self.key, &self.workflow)?;
        tx.commit()?;
        self.engine.mark_initialized(&self.key);

        if created > 0 {
            tracing::info!(
                object = %self.key,
                initial_state = %self.workflow.initial_state,
                transitions = created,
                "Workflow object initialized"
            );
        }
        Ok(created > 0)
    }

    fn ensure_initialized(&self) -> WorkflowResult<()> {
        if self.engine.settings().auto_initialize {
            self.initialize()?;
        }
        Ok(())
    }

    /// Run `f` in a transaction that is discarded afterwards
    fn read<T>(&self, f: impl FnOnce(&mut dyn StoreTx) -> WorkflowResult<T>) -> WorkflowResult<T> {
        self.ensure_initialized()?;
        let mut tx = self.engine.store().begin()?;
        f(tx.as_mut())
    }

    /// Run `f` in a transaction and commit it
    fn write<T>(&self, f: impl FnOnce(&mut dyn StoreTx) -> WorkflowResult<T>) -> WorkflowResult<T> {
        self.ensure_initialized()?;
        let mut tx = self.engine.store().begin()?;
        let value = f(tx.as_mut())?;
        tx.commit()?;
        Ok(value)
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn current_state(&self) -> WorkflowResult<State> {
        self.read(|tx| state_of(tx, &self.key))
    }

    pub fn on_initial_state(&self) -> WorkflowResult<bool> {
        Ok(self.current_state()? == self.workflow.initial_state)
    }

    pub fn on_final_state(&self) -> WorkflowResult<bool> {
        Ok(self.workflow.is_final(&self.current_state()?))
    }

    /// The object sits in one of the workflow's final states
    pub fn is_workflow_completed(&self) -> WorkflowResult<bool> {
        self.on_final_state()
    }

    /// Approvals `principal` may decide now, optionally only those
    /// leading to `destination`
    pub fn available_approvals(
        &self,
        principal: &PrincipalId,
        destination: Option<&State>,
    ) -> WorkflowResult<Vec<TransitionApproval>> {
        self.read(|tx| {
            let current = state_of(tx, &self.key)?;
            let available = availability::available_approvals(
                tx,
                &self.key,
                self.engine.authorizer(),
                principal,
                &current,
                destination,
            )?;
            Ok(available.into_iter().map(|a| a.approval).collect())
        })
    }

    /// Destination states `principal` can move the object to now
    pub fn available_states(&self, principal: &PrincipalId) -> WorkflowResult<Vec<State>> {
        self.read(|tx| {
            let current = state_of(tx, &self.key)?;
            let available = availability::available_approvals(
                tx,
                &self.key,
                self.engine.authorizer(),
                principal,
                &current,
                None,
            )?;
            Ok(destinations(&available))
        })
    }

    /// Every approval on transitions leaving the current state
    pub fn next_approvals(&self) -> WorkflowResult<Vec<TransitionApproval>> {
        self.read(|tx| {
            let current = state_of(tx, &self.key)?;
            let leaving = tx.transitions(&self.key, &TransitionFilter::new().from_state(&current))?;
            let approvals = tx.approvals(
                &self.key,
                &ApprovalFilter::new().of_transitions(leaving.iter().map(|t| t.id)),
            )?;
            Ok(approvals)
        })
    }

    pub fn recent_approval(&self) -> WorkflowResult<Option<TransitionApproval>> {
        self.read(|tx| history::recent_approval(tx, &self.key))
    }

    /// Decisions newest first
    pub fn approval_history(&self) -> WorkflowResult<Vec<TransitionApproval>> {
        self.read(|tx| history::approval_history(tx, &self.key))
    }

    /// Every transition ever created for the object, by (iteration, id)
    pub fn transitions(&self) -> WorkflowResult<Vec<Transition>> {
        self.read(|tx| Ok(tx.transitions(&self.key, &TransitionFilter::new())?))
    }

    /// Every approval ever created for the object, by id
    pub fn approvals(&self) -> WorkflowResult<Vec<TransitionApproval>> {
        self.read(|tx| Ok(tx.approvals(&self.key, &ApprovalFilter::new())?))
    }

    // ── Decisions ────────────────────────────────────────────────────

    /// Approve on behalf of `principal`. `next_state` is required when
    /// the available approvals lead to more than one state; giving it
    /// also cancels the branches not taken.
    pub fn approve(
        &self,
        principal: &PrincipalId,
        next_state: Option<&State>,
    ) -> WorkflowResult<ApprovalOutcome> {
        let scope = self.scope();
        let outcome = self
            .write(|tx| approval::approve(tx, &scope, self.engine.authorizer(), principal, next_state))
            .map_err(|e| self.log_failure("approve", e))?;

        tracing::info!(
            object = %self.key,
            principal = %principal,
            approval = %outcome.approval.id,
            transition = %outcome.transition.id,
            "Approval recorded"
        );
        if outcome.transitioned {
            tracing::info!(
                object = %self.key,
                from = %outcome.previous_state,
                to = %outcome.new_state,
                cancelled = outcome.cancelled.len(),
                recreated = outcome.recreated.len(),
                "Object transitioned"
            );
        }

        self.engine.hooks().dispatch(&outcome.events);
        Ok(outcome)
    }

    /// Reject on behalf of `principal`
    pub fn reject(
        &self,
        principal: &PrincipalId,
        next_state: Option<&State>,
    ) -> WorkflowResult<ApprovalOutcome> {
        let scope = self.scope();
        let outcome = self
            .write(|tx| approval::reject(tx, &scope, self.engine.authorizer(), principal, next_state))
            .map_err(|e| self.log_failure("reject", e))?;

        tracing::info!(
            object = %self.key,
            principal = %principal,
            approval = %outcome.approval.id,
            cancelled = outcome.cancelled.len(),
            "Rejection recorded"
        );

        self.engine.hooks().dispatch(&outcome.events);
        Ok(outcome)
    }

    /// Force the object into `target` without collecting approvals
    pub fn jump_to(&self, target: &State) -> WorkflowResult<JumpOutcome> {
        let scope = self.scope();
        let outcome = self
            .write(|tx| jump::jump_to(tx, &scope, target))
            .map_err(|e| self.log_failure("jump", e))?;

        tracing::info!(
            object = %self.key,
            from = %outcome.previous_state,
            to = %outcome.new_state,
            jumped = outcome.jumped.len(),
            "Object jumped"
        );

        self.engine.hooks().dispatch(&outcome.events);
        Ok(outcome)
    }

    /// Reserve a pending approval for one principal. The principal must
    /// satisfy the approval's rule.
    pub fn assign_approver(
        &self,
        approval_id: ApprovalId,
        principal: &PrincipalId,
    ) -> WorkflowResult<TransitionApproval> {
        let assigned = self.write(|tx| {
            let mut approval = tx
                .approval(&self.key, approval_id)
                .map_err(|_| WorkflowError::ApprovalNotFound(approval_id))?;
            if !approval.is_pending() {
                return Err(WorkflowError::ApprovalNotPending(approval_id));
            }

            approval.approver = None;
            if !may_decide(self.engine.authorizer(), principal, &approval) {
                return Err(WorkflowError::ValidationError(format!(
                    "{} may not decide approval {}",
                    principal, approval_id
                )));
            }

            approval.approver = Some(principal.clone());
            tx.update_approval(&self.key, &approval)?;
            Ok(approval)
        })?;

        tracing::info!(
            object = %self.key,
            approval = %approval_id,
            principal = %principal,
            "Approver assigned"
        );
        Ok(assigned)
    }

    fn log_failure(&self, operation: &str, err: WorkflowError) -> WorkflowError {
        if err.is_transient() {
            tracing::warn!(object = %self.key, operation, error = %err, "Operation must be retried");
        } else {
            tracing::debug!(object = %self.key, operation, error = %err, "Operation refused");
        }
        err
    }
}
