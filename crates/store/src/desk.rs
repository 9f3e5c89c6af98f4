use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, warn};

use pdesk_core::audit::{AuditContext, AuditSink, InMemoryAuditSink};
use pdesk_core::clock::{Clock, SystemClock};
use pdesk_core::config::{AppConfig, WorkflowConfig};
use pdesk_core::domain::approval::{
    Actor, Approval, ApprovalStatus, ApprovalWorkflow, PdId, PdType, WorkflowStatus,
};
use pdesk_core::errors::{ApplicationError, WorkflowError};
use pdesk_core::notify::{ChangeSink, NoopChangeSink};
use pdesk_core::workflow::{plan_approvals, WorkflowChange, WorkflowEngine};

use crate::repositories::WorkflowRepository;

type SharedChangeSink = Arc<dyn ChangeSink<WorkflowChange>>;
type DeskEngine<C> = WorkflowEngine<SharedChangeSink, C>;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DeskStats {
    pub total: usize,
    pub pending: usize,
    pub approved: usize,
    pub rejected: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PendingApproval {
    pub pd_id: PdId,
    pub pd_title: String,
    pub approval: Approval,
}

/// Registry of approval workflows. Every decision loads the workflow, runs it through a
/// [`WorkflowEngine`] and stores the resulting snapshot.
pub struct ApprovalDesk<R, A = InMemoryAuditSink, C = SystemClock> {
    repository: R,
    settings: WorkflowConfig,
    directory: BTreeMap<String, String>,
    audit: A,
    changes: SharedChangeSink,
    clock: C,
    writes: Mutex<()>,
}

impl<R> ApprovalDesk<R>
where
    R: WorkflowRepository,
{
    pub fn new(repository: R, config: &AppConfig) -> Self {
        Self::with_parts(
            repository,
            config,
            InMemoryAuditSink::default(),
            Arc::new(NoopChangeSink),
            SystemClock,
        )
    }
}

impl<R, A, C> ApprovalDesk<R, A, C>
where
    R: WorkflowRepository,
    A: AuditSink,
    C: Clock + Clone,
{
    pub fn with_parts(
        repository: R,
        config: &AppConfig,
        audit: A,
        changes: SharedChangeSink,
        clock: C,
    ) -> Self {
        Self {
            repository,
            settings: config.workflow.clone(),
            directory: config.directory.clone(),
            audit,
            changes,
            clock,
            writes: Mutex::new(()),
        }
    }

    pub fn audit_sink(&self) -> &A {
        &self.audit
    }

    /// Registers a new workflow with pending steps planned from the configured directory.
    pub async fn open_workflow(
        &self,
        pd_id: PdId,
        pd_title: impl Into<String>,
        pd_type: PdType,
        submitted_by: impl Into<String>,
        available_supervisors: Option<Vec<String>>,
    ) -> Result<ApprovalWorkflow, ApplicationError> {
        let _guard = self.writes.lock().await;
        if self.repository.find_by_id(&pd_id).await?.is_some() {
            return Err(WorkflowError::Validation {
                field: "pd_id",
                message: format!("workflow `{pd_id}` already exists"),
            }
            .into());
        }

        let approvals = plan_approvals(pd_type, &self.directory)?;
        let engine = DeskEngine::with_parts(
            ApprovalWorkflow {
                pd_id,
                pd_title: pd_title.into(),
                pd_type,
                status: ApprovalStatus::Pending,
                approvals,
                submitted_by: submitted_by.into(),
                submitted_date: self.clock.now(),
                available_supervisors,
            },
            self.settings.clone(),
            Arc::clone(&self.changes),
            self.clock.clone(),
        );
        let workflow = engine.into_workflow();

        self.repository.save(workflow.clone()).await?;
        info!(
            event_name = "desk.workflow_opened",
            pd_id = %workflow.pd_id,
            pd_type = workflow.pd_type.label(),
            steps = workflow.approvals.len(),
            "workflow opened"
        );
        Ok(workflow)
    }

    pub async fn workflows(&self) -> Result<Vec<ApprovalWorkflow>, ApplicationError> {
        Ok(self.repository.list().await?)
    }

    pub async fn workflow(&self, pd_id: &PdId) -> Result<ApprovalWorkflow, ApplicationError> {
        self.repository
            .find_by_id(pd_id)
            .await?
            .ok_or_else(|| WorkflowError::UnknownWorkflow(pd_id.clone()).into())
    }

    pub async fn submit_approval(
        &self,
        pd_id: &PdId,
        actor: &Actor,
        role: &str,
        comments: Option<&str>,
    ) -> Result<Approval, ApplicationError> {
        self.decide(pd_id, actor, "submit_approval", |engine| {
            engine.submit_approval(actor, role, comments)
        })
        .await
    }

    pub async fn submit_rejection(
        &self,
        pd_id: &PdId,
        actor: &Actor,
        role: &str,
        comments: &str,
    ) -> Result<Approval, ApplicationError> {
        self.decide(pd_id, actor, "submit_rejection", |engine| {
            engine.submit_rejection(actor, role, comments)
        })
        .await
    }

    pub async fn select_supervisor(
        &self,
        pd_id: &PdId,
        actor: &Actor,
        role: &str,
        supervisor_name: &str,
        comments: Option<&str>,
    ) -> Result<Approval, ApplicationError> {
        self.decide(pd_id, actor, "select_supervisor", |engine| {
            engine.select_supervisor(actor, role, supervisor_name, comments)
        })
        .await
    }

    pub async fn workflows_by_status(
        &self,
        status: WorkflowStatus,
    ) -> Result<Vec<ApprovalWorkflow>, ApplicationError> {
        let mut workflows = self.workflows().await?;
        workflows.retain(|workflow| workflow.status == status);
        Ok(workflows)
    }

    pub async fn workflows_by_type(
        &self,
        pd_type: PdType,
    ) -> Result<Vec<ApprovalWorkflow>, ApplicationError> {
        let mut workflows = self.workflows().await?;
        workflows.retain(|workflow| workflow.pd_type == pd_type);
        Ok(workflows)
    }

    /// Pending steps assigned to `approver_name` across every workflow.
    pub async fn pending_approvals_for(
        &self,
        approver_name: &str,
    ) -> Result<Vec<PendingApproval>, ApplicationError> {
        let wanted = approver_name.trim();
        let pending = self
            .workflows()
            .await?
            .into_iter()
            .flat_map(|workflow| {
                let ApprovalWorkflow { pd_id, pd_title, approvals, .. } = workflow;
                approvals
                    .into_iter()
                    .filter(|approval| {
                        approval.is_pending()
                            && approval.approver_name.trim().eq_ignore_ascii_case(wanted)
                    })
                    .map(move |approval| PendingApproval {
                        pd_id: pd_id.clone(),
                        pd_title: pd_title.clone(),
                        approval,
                    })
                    .collect::<Vec<_>>()
            })
            .collect();
        Ok(pending)
    }

    pub async fn stats(&self) -> Result<DeskStats, ApplicationError> {
        let workflows = self.workflows().await?;
        let count = |status: WorkflowStatus| {
            workflows.iter().filter(|workflow| workflow.status == status).count()
        };
        Ok(DeskStats {
            total: workflows.len(),
            pending: count(ApprovalStatus::Pending),
            approved: count(ApprovalStatus::Approved),
            rejected: count(ApprovalStatus::Rejected),
        })
    }

    async fn decide<F>(
        &self,
        pd_id: &PdId,
        actor: &Actor,
        operation: &'static str,
        apply: F,
    ) -> Result<Approval, ApplicationError>
    where
        F: FnOnce(&mut DeskEngine<C>) -> Result<Approval, WorkflowError>,
    {
        let _guard = self.writes.lock().await;
        let workflow = self.workflow(pd_id).await?;
        let mut engine = DeskEngine::with_parts(
            workflow,
            self.settings.clone(),
            Arc::clone(&self.changes),
            self.clock.clone(),
        );
        let context = AuditContext::workflow(pd_id.clone(), actor.name.clone());

        let approval = match engine.audited(&self.audit, &context, operation, apply) {
            Ok(approval) => approval,
            Err(error) => {
                warn!(
                    event_name = "desk.decision_refused",
                    pd_id = %pd_id,
                    correlation_id = %context.correlation_id,
                    operation,
                    error = %error,
                    "decision refused"
                );
                return Err(error.into());
            }
        };

        let workflow = engine.into_workflow();
        let status = workflow.status;
        self.repository.save(workflow).await?;
        info!(
            event_name = "desk.decision_saved",
            pd_id = %pd_id,
            correlation_id = %context.correlation_id,
            operation,
            workflow_status = status.as_str(),
            "decision saved"
        );
        Ok(approval)
    }
}
