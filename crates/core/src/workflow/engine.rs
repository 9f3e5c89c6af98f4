use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::audit::{AuditContext, AuditOutcome, AuditSink};
use crate::clock::{Clock, SystemClock};
use crate::config::WorkflowConfig;
use crate::domain::approval::{
    Actor, Approval, ApprovalAction, ApprovalEvent, ApprovalStatus, ApprovalWorkflow,
    WorkflowStatus,
};
use crate::errors::WorkflowError;
use crate::notify::{ChangeSink, NoopChangeSink};
use crate::workflow::status;

const SUPERVISOR_STEP_COMMENT: &str = "Pre-approved through manager selection process";

/// Published after every successful decision and every explicit status recalculation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowChange {
    pub event: Option<ApprovalEvent>,
    pub status: WorkflowStatus,
    pub snapshot: ApprovalWorkflow,
}

/// Sole owner of one approval workflow.
///
/// Every mutation validates first and writes second, so a failed call leaves the
/// workflow exactly as it was. Callers only ever see clones.
pub struct WorkflowEngine<S = NoopChangeSink, C = SystemClock> {
    workflow: ApprovalWorkflow,
    settings: WorkflowConfig,
    sink: S,
    clock: C,
}

impl WorkflowEngine {
    pub fn new(workflow: ApprovalWorkflow) -> Self {
        Self::with_parts(workflow, WorkflowConfig::default(), NoopChangeSink, SystemClock)
    }
}

impl<S, C> WorkflowEngine<S, C>
where
    S: ChangeSink<WorkflowChange>,
    C: Clock,
{
    pub fn with_parts(
        mut workflow: ApprovalWorkflow,
        settings: WorkflowConfig,
        sink: S,
        clock: C,
    ) -> Self {
        workflow.status = status::derive_status(&workflow.approvals);
        Self { workflow, settings, sink, clock }
    }

    pub fn snapshot(&self) -> ApprovalWorkflow {
        self.workflow.clone()
    }

    pub fn into_workflow(self) -> ApprovalWorkflow {
        self.workflow
    }

    pub fn status(&self) -> WorkflowStatus {
        self.workflow.status
    }

    pub fn settings(&self) -> &WorkflowConfig {
        &self.settings
    }

    pub fn submit_approval(
        &mut self,
        actor: &Actor,
        role: &str,
        comments: Option<&str>,
    ) -> Result<Approval, WorkflowError> {
        let index = self
            .locate_actionable(actor, role)
            .map_err(|error| self.refused("submit_approval", error))?;

        if self.workflow.approvals[index].needs_supervisor_selection {
            return Err(self.refused(
                "submit_approval",
                WorkflowError::NotEligible {
                    role: role.to_string(),
                    actor: actor.name.clone(),
                    reason: "this step is completed by selecting a supervisor".to_string(),
                },
            ));
        }

        let now = self.clock.now();
        let comments = normalize_comment(comments);
        let step = &mut self.workflow.approvals[index];
        step.status = ApprovalStatus::Approved;
        step.timestamp = Some(now);
        step.comments = comments.clone();
        let approval = step.clone();

        info!(
            event_name = "workflow.approval_submitted",
            pd_id = %self.workflow.pd_id,
            role = %approval.approver_role,
            approver = %approval.approver_name,
            "approval recorded"
        );

        self.refresh(Some(ApprovalEvent {
            pd_id: self.workflow.pd_id.clone(),
            approver_role: approval.approver_role.clone(),
            action: ApprovalAction::Approve,
            comments,
            selected_supervisor: None,
            timestamp: now,
        }));

        Ok(approval)
    }

    pub fn submit_rejection(
        &mut self,
        actor: &Actor,
        role: &str,
        comments: &str,
    ) -> Result<Approval, WorkflowError> {
        let index = self
            .locate_actionable(actor, role)
            .map_err(|error| self.refused("submit_rejection", error))?;

        let reason = comments.trim();
        if reason.is_empty() {
            return Err(self.refused(
                "submit_rejection",
                WorkflowError::Validation {
                    field: "comments",
                    message: "Rejection reason is required".to_string(),
                },
            ));
        }
        let min_len = self.settings.min_rejection_comment_len;
        if reason.chars().count() < min_len {
            return Err(self.refused(
                "submit_rejection",
                WorkflowError::Validation {
                    field: "comments",
                    message: format!(
                        "Please provide at least {min_len} characters explaining the rejection"
                    ),
                },
            ));
        }

        let now = self.clock.now();
        let step = &mut self.workflow.approvals[index];
        step.status = ApprovalStatus::Rejected;
        step.timestamp = Some(now);
        step.comments = Some(reason.to_string());
        let approval = step.clone();

        info!(
            event_name = "workflow.rejection_submitted",
            pd_id = %self.workflow.pd_id,
            role = %approval.approver_role,
            approver = %approval.approver_name,
            "rejection recorded"
        );

        self.refresh(Some(ApprovalEvent {
            pd_id: self.workflow.pd_id.clone(),
            approver_role: approval.approver_role.clone(),
            action: ApprovalAction::Reject,
            comments: approval.comments.clone(),
            selected_supervisor: None,
            timestamp: now,
        }));

        Ok(approval)
    }

    /// Completes a supervisor-selection step and appends the nominated supervisor as an
    /// already-approved required step.
    pub fn select_supervisor(
        &mut self,
        actor: &Actor,
        role: &str,
        supervisor_name: &str,
        comments: Option<&str>,
    ) -> Result<Approval, WorkflowError> {
        let index = self
            .locate_actionable(actor, role)
            .map_err(|error| self.refused("select_supervisor", error))?;

        if !self.workflow.approvals[index].needs_supervisor_selection {
            return Err(self.refused(
                "select_supervisor",
                WorkflowError::NotEligible {
                    role: role.to_string(),
                    actor: actor.name.clone(),
                    reason: "this step does not take a supervisor selection".to_string(),
                },
            ));
        }

        let supervisor = supervisor_name.trim();
        if supervisor.is_empty() {
            return Err(self.refused(
                "select_supervisor",
                WorkflowError::Validation {
                    field: "supervisor_name",
                    message: "a supervisor must be selected".to_string(),
                },
            ));
        }
        if let Some(candidates) = &self.workflow.available_supervisors {
            if !candidates.iter().any(|candidate| candidate.trim() == supervisor) {
                return Err(self.refused(
                    "select_supervisor",
                    WorkflowError::Validation {
                        field: "supervisor_name",
                        message: format!("`{supervisor}` is not an available supervisor"),
                    },
                ));
            }
        }

        let now = self.clock.now();
        let comments = normalize_comment(comments)
            .unwrap_or_else(|| format!("Pre-approved by selected supervisor: {supervisor}"));
        let step = &mut self.workflow.approvals[index];
        step.selected_supervisor = Some(supervisor.to_string());
        step.status = ApprovalStatus::Approved;
        step.timestamp = Some(now);
        step.comments = Some(comments.clone());
        let approval = step.clone();

        self.workflow.approvals.push(Approval {
            approver_role: self.settings.supervisor_role.clone(),
            approver_name: supervisor.to_string(),
            status: ApprovalStatus::Approved,
            timestamp: Some(now),
            comments: Some(SUPERVISOR_STEP_COMMENT.to_string()),
            is_required: true,
            needs_supervisor_selection: false,
            selected_supervisor: None,
        });

        info!(
            event_name = "workflow.supervisor_selected",
            pd_id = %self.workflow.pd_id,
            role = %approval.approver_role,
            supervisor = %supervisor,
            approvals = self.workflow.approvals.len(),
            "supervisor selected and pre-approved"
        );

        self.refresh(Some(ApprovalEvent {
            pd_id: self.workflow.pd_id.clone(),
            approver_role: approval.approver_role.clone(),
            action: ApprovalAction::SelectSupervisor,
            comments: Some(comments),
            selected_supervisor: Some(supervisor.to_string()),
            timestamp: now,
        }));

        Ok(approval)
    }

    /// Re-derives the workflow status from its steps and publishes it.
    pub fn calculate_workflow_status(&mut self) -> WorkflowStatus {
        self.refresh(None)
    }

    pub fn required_approvals(&self) -> Vec<Approval> {
        status::required_approvals(&self.workflow.approvals)
    }

    pub fn optional_approvals(&self) -> Vec<Approval> {
        status::optional_approvals(&self.workflow.approvals)
    }

    pub fn completed_required(&self) -> usize {
        status::completed_required(&self.workflow.approvals)
    }

    pub fn total_required(&self) -> usize {
        status::total_required(&self.workflow.approvals)
    }

    pub fn progress_percentage(&self) -> f64 {
        status::progress_percentage(&self.workflow.approvals)
    }

    pub fn describe_rule(&self) -> &'static str {
        self.workflow.pd_type.description()
    }

    pub fn can_act(&self, actor: &Actor, approval: &Approval) -> bool {
        !self.settings.read_only && approval.is_pending() && same_key(&approval.approver_name, &actor.name)
    }

    pub fn needs_supervisor_selection(&self, actor: &Actor, approval: &Approval) -> bool {
        approval.needs_supervisor_selection && self.can_act(actor, approval)
    }

    /// Runs `apply` and records its outcome on `sink`, stamped by the engine's clock.
    pub fn audited<A, F>(
        &mut self,
        sink: &A,
        audit: &AuditContext,
        operation: &'static str,
        apply: F,
    ) -> Result<Approval, WorkflowError>
    where
        A: AuditSink,
        F: FnOnce(&mut Self) -> Result<Approval, WorkflowError>,
    {
        let result = apply(self);
        let occurred_at = self.clock.now();
        match &result {
            Ok(approval) => sink.emit(
                audit
                    .record(operation, AuditOutcome::Applied, occurred_at)
                    .detail("role", approval.approver_role.clone())
                    .detail("step_status", approval.status.as_str())
                    .detail("workflow_status", self.workflow.status.as_str()),
            ),
            Err(error) => sink.emit(
                audit
                    .record(operation, AuditOutcome::Refused, occurred_at)
                    .detail("error", error.to_string()),
            ),
        }
        result
    }

    fn refresh(&mut self, event: Option<ApprovalEvent>) -> WorkflowStatus {
        let previous = self.workflow.status;
        let derived = status::derive_status(&self.workflow.approvals);
        self.workflow.status = derived;

        debug!(
            event_name = "workflow.status_derived",
            pd_id = %self.workflow.pd_id,
            from = previous.as_str(),
            to = derived.as_str(),
            "workflow status derived"
        );

        self.sink.publish(WorkflowChange {
            event,
            status: derived,
            snapshot: self.workflow.clone(),
        });
        derived
    }

    /// Finds the pending step for `role` that `actor` is designated to decide.
    fn locate_actionable(&self, actor: &Actor, role: &str) -> Result<usize, WorkflowError> {
        let not_eligible = |reason: String| WorkflowError::NotEligible {
            role: role.to_string(),
            actor: actor.name.clone(),
            reason,
        };

        if self.settings.read_only {
            return Err(not_eligible("the workflow is read-only".to_string()));
        }

        let matching: Vec<usize> = self
            .workflow
            .approvals
            .iter()
            .enumerate()
            .filter(|(_, approval)| same_key(&approval.approver_role, role))
            .map(|(index, _)| index)
            .collect();

        let Some(&last) = matching.last() else {
            return Err(WorkflowError::NotFound {
                pd_id: self.workflow.pd_id.clone(),
                role: role.to_string(),
            });
        };

        let pending: Vec<usize> = matching
            .iter()
            .copied()
            .filter(|index| self.workflow.approvals[*index].is_pending())
            .collect();
        if pending.is_empty() {
            let decided = self.workflow.approvals[last].status;
            return Err(not_eligible(format!("the step is already {}", decided.as_str())));
        }

        pending
            .iter()
            .copied()
            .find(|index| same_key(&self.workflow.approvals[*index].approver_name, &actor.name))
            .ok_or_else(|| {
                let designated = &self.workflow.approvals[pending[0]].approver_name;
                not_eligible(format!("the designated approver is `{designated}`"))
            })
    }

    fn refused(&self, operation: &'static str, error: WorkflowError) -> WorkflowError {
        debug!(
            event_name = "workflow.operation_refused",
            pd_id = %self.workflow.pd_id,
            operation,
            error = %error,
            "workflow operation refused"
        );
        error
    }
}

fn normalize_comment(comments: Option<&str>) -> Option<String> {
    comments.map(str::trim).filter(|value| !value.is_empty()).map(str::to_string)
}

fn same_key(left: &str, right: &str) -> bool {
    left.trim().eq_ignore_ascii_case(right.trim())
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeZone, Utc};

    use crate::audit::{AuditContext, AuditOutcome, InMemoryAuditSink};
    use crate::clock::FixedClock;
    use crate::config::WorkflowConfig;
    use crate::domain::approval::{
        Actor, Approval, ApprovalAction, ApprovalStatus, ApprovalWorkflow, PdId, PdType,
    };
    use crate::errors::WorkflowError;
    use crate::notify::InMemoryChangeSink;

    use super::{WorkflowChange, WorkflowEngine};

    type TestEngine = WorkflowEngine<InMemoryChangeSink<WorkflowChange>, FixedClock>;

    fn decided_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 8, 1, 12, 0, 0).single().expect("valid timestamp")
    }

    fn reviewed_workflow() -> ApprovalWorkflow {
        let mut reviewer = Approval::pending("Reviewer", "John Doe", false);
        reviewer.status = ApprovalStatus::Approved;
        reviewer.timestamp = Some(decided_at());
        reviewer.comments = Some("Looks complete.".to_string());

        ApprovalWorkflow {
            pd_id: PdId("PD-TEST-001".to_string()),
            pd_title: "Staff Engineer".to_string(),
            pd_type: PdType::Custom,
            status: ApprovalStatus::Pending,
            approvals: vec![
                reviewer,
                Approval::pending("Manager", "Bob Wilson", true),
                Approval::pending("Director", "Dana Director", true),
            ],
            submitted_by: "HR Department".to_string(),
            submitted_date: decided_at(),
            available_supervisors: None,
        }
    }

    fn expert_workflow() -> ApprovalWorkflow {
        let mut workflow = reviewed_workflow();
        workflow.pd_type = PdType::ExpertAndConsultant;
        workflow.approvals = vec![
            workflow.approvals[0].clone(),
            Approval::pending("Manager", "Bob Wilson", true).with_supervisor_selection(),
        ];
        workflow.available_supervisors = Some(vec![
            "Alice Johnson".to_string(),
            "Michael Brown".to_string(),
            "Sarah Davis".to_string(),
            "Robert Wilson".to_string(),
        ]);
        workflow
    }

    fn engine(workflow: ApprovalWorkflow) -> (TestEngine, InMemoryChangeSink<WorkflowChange>) {
        let sink = InMemoryChangeSink::default();
        let engine = WorkflowEngine::with_parts(
            workflow,
            WorkflowConfig::default(),
            sink.clone(),
            FixedClock(decided_at()),
        );
        (engine, sink)
    }

    fn manager() -> Actor {
        Actor::new("Manager", "Bob Wilson")
    }

    fn director() -> Actor {
        Actor::new("Director", "Dana Director")
    }

    #[test]
    fn required_approvals_progress_to_approved() {
        let (mut engine, _) = engine(reviewed_workflow());
        assert_eq!(engine.status(), ApprovalStatus::Pending);
        assert_eq!(engine.progress_percentage(), 0.0);

        engine.submit_approval(&manager(), "Manager", None).expect("manager approves");
        assert_eq!(engine.status(), ApprovalStatus::Pending);
        assert_eq!(engine.progress_percentage(), 50.0);

        engine
            .submit_approval(&director(), "Director", Some("Budget confirmed."))
            .expect("director approves");
        assert_eq!(engine.status(), ApprovalStatus::Approved);
        assert_eq!(engine.progress_percentage(), 100.0);
        assert_eq!(engine.completed_required(), 2);
        assert_eq!(engine.total_required(), 2);
    }

    #[test]
    fn approval_records_timestamp_and_blank_comments_as_none() {
        let (mut engine, _) = engine(reviewed_workflow());

        let approval =
            engine.submit_approval(&manager(), "manager", Some("   ")).expect("approve");

        assert_eq!(approval.status, ApprovalStatus::Approved);
        assert_eq!(approval.timestamp, Some(decided_at()));
        assert_eq!(approval.comments, None);
    }

    #[test]
    fn short_rejection_is_a_validation_error_without_state_change() {
        let (mut engine, sink) = engine(reviewed_workflow());
        let before = engine.snapshot();

        let error = engine
            .submit_rejection(&manager(), "Manager", "short")
            .expect_err("short comment should fail");

        assert!(matches!(error, WorkflowError::Validation { field: "comments", .. }));
        assert_eq!(engine.snapshot(), before);
        assert!(sink.events().is_empty());
    }

    #[test]
    fn rejection_length_ignores_surrounding_whitespace() {
        let (mut engine, _) = engine(reviewed_workflow());

        let error = engine
            .submit_rejection(&manager(), "Manager", "   too few   ")
            .expect_err("padding does not count");
        assert!(matches!(error, WorkflowError::Validation { field: "comments", .. }));

        let approval = engine
            .submit_rejection(&manager(), "Manager", "  exactly10!  ")
            .expect("ten characters after trimming");
        assert_eq!(approval.comments.as_deref(), Some("exactly10!"));
    }

    #[test]
    fn single_rejection_forces_rejected_status() {
        let (mut engine, sink) = engine(reviewed_workflow());

        let approval = engine
            .submit_rejection(&manager(), "Manager", "Insufficient qualifications listed")
            .expect("valid rejection");

        assert_eq!(approval.status, ApprovalStatus::Rejected);
        assert_eq!(engine.status(), ApprovalStatus::Rejected);
        let director_step = engine
            .snapshot()
            .approvals
            .into_iter()
            .find(|a| a.approver_role == "Director")
            .expect("director step");
        assert!(director_step.is_pending());

        let change = sink.last().expect("change published");
        assert_eq!(change.status, ApprovalStatus::Rejected);
        assert_eq!(change.event.map(|event| event.action), Some(ApprovalAction::Reject));
    }

    #[test]
    fn unknown_role_is_not_found() {
        let (mut engine, _) = engine(reviewed_workflow());

        let error = engine
            .submit_approval(&manager(), "Chief of Staff", None)
            .expect_err("no such role");

        assert!(matches!(error, WorkflowError::NotFound { ref role, .. } if role == "Chief of Staff"));
    }

    #[test]
    fn wrong_actor_is_not_eligible() {
        let (mut engine, _) = engine(reviewed_workflow());

        let error = engine
            .submit_approval(&Actor::new("Manager", "John Doe"), "Manager", None)
            .expect_err("john is not the manager approver");

        assert!(matches!(error, WorkflowError::NotEligible { .. }));
    }

    #[test]
    fn decided_steps_cannot_be_overwritten() {
        let (mut engine, _) = engine(reviewed_workflow());
        engine.submit_approval(&manager(), "Manager", None).expect("approve once");

        let error = engine
            .submit_rejection(&manager(), "Manager", "Changed my mind about this one")
            .expect_err("terminal step");

        assert!(matches!(error, WorkflowError::NotEligible { ref reason, .. } if reason.contains("approved")));
        assert_eq!(engine.status(), ApprovalStatus::Pending);
    }

    #[test]
    fn read_only_engine_refuses_decisions() {
        let workflow = reviewed_workflow();
        let mut engine = WorkflowEngine::with_parts(
            workflow,
            WorkflowConfig { read_only: true, ..WorkflowConfig::default() },
            InMemoryChangeSink::<WorkflowChange>::default(),
            FixedClock(decided_at()),
        );

        let error = engine.submit_approval(&manager(), "Manager", None).expect_err("read-only");
        assert!(matches!(error, WorkflowError::NotEligible { .. }));
        assert!(!engine.can_act(&manager(), &engine.snapshot().approvals[1]));
    }

    #[test]
    fn supervisor_selection_appends_required_supervisor_step() {
        let (mut engine, sink) = engine(expert_workflow());
        let before = engine.snapshot().approvals.len();

        let approval = engine
            .select_supervisor(&manager(), "Manager", "Alice Johnson", None)
            .expect("select supervisor");

        assert_eq!(approval.status, ApprovalStatus::Approved);
        assert_eq!(approval.selected_supervisor.as_deref(), Some("Alice Johnson"));
        assert_eq!(
            approval.comments.as_deref(),
            Some("Pre-approved by selected supervisor: Alice Johnson")
        );

        let snapshot = engine.snapshot();
        assert_eq!(snapshot.approvals.len(), before + 1);
        let appended = snapshot.approvals.last().expect("appended step");
        assert_eq!(appended.approver_role, "Supervisor");
        assert_eq!(appended.approver_name, "Alice Johnson");
        assert_eq!(appended.status, ApprovalStatus::Approved);
        assert!(appended.is_required);
        assert_eq!(appended.timestamp, Some(decided_at()));
        assert_eq!(engine.status(), ApprovalStatus::Approved);

        let event = sink.last().and_then(|change| change.event).expect("event published");
        assert_eq!(event.action, ApprovalAction::SelectSupervisor);
        assert_eq!(event.selected_supervisor.as_deref(), Some("Alice Johnson"));
    }

    #[test]
    fn supervisor_outside_candidate_list_is_rejected() {
        let (mut engine, _) = engine(expert_workflow());
        let before = engine.snapshot();

        let error = engine
            .select_supervisor(&manager(), "Manager", "Mallory", None)
            .expect_err("not a candidate");
        assert!(matches!(error, WorkflowError::Validation { field: "supervisor_name", .. }));

        let error = engine
            .select_supervisor(&manager(), "Manager", "  ", None)
            .expect_err("blank supervisor");
        assert!(matches!(error, WorkflowError::Validation { field: "supervisor_name", .. }));
        assert_eq!(engine.snapshot(), before);
    }

    #[test]
    fn supervisor_selection_steps_require_the_selection_flow() {
        let (mut engine, _) = engine(expert_workflow());
        let manager_step = engine.snapshot().approvals[1].clone();
        assert!(engine.needs_supervisor_selection(&manager(), &manager_step));

        let error = engine
            .submit_approval(&manager(), "Manager", None)
            .expect_err("plain approval bypasses selection");
        assert!(matches!(error, WorkflowError::NotEligible { .. }));

        let (mut plain, _) = engine_for_plain();
        let error = plain
            .select_supervisor(&manager(), "Manager", "Alice Johnson", None)
            .expect_err("manager step has no selection");
        assert!(matches!(error, WorkflowError::NotEligible { .. }));
    }

    fn engine_for_plain() -> (TestEngine, InMemoryChangeSink<WorkflowChange>) {
        engine(reviewed_workflow())
    }

    #[test]
    fn status_recalculation_is_idempotent_and_overrides_stale_status() {
        let mut workflow = reviewed_workflow();
        workflow.status = ApprovalStatus::Approved;
        let (mut engine, sink) = engine(workflow);

        assert_eq!(engine.status(), ApprovalStatus::Pending);
        let first = engine.calculate_workflow_status();
        let second = engine.calculate_workflow_status();

        assert_eq!(first, second);
        assert_eq!(sink.events().len(), 2);
        assert!(sink.events().iter().all(|change| change.event.is_none()));
    }

    #[test]
    fn audited_operations_emit_success_and_rejection_events() {
        let (mut engine, _) = engine(reviewed_workflow());
        let audit_sink = InMemoryAuditSink::default();
        let context = AuditContext::workflow(PdId("PD-TEST-001".to_string()), "Bob Wilson")
            .with_correlation_id("req-7");

        engine
            .audited(&audit_sink, &context, "submit_approval", |engine| {
                engine.submit_approval(&manager(), "Manager", None)
            })
            .expect("approve");
        let _ = engine.audited(&audit_sink, &context, "submit_rejection", |engine| {
            engine.submit_rejection(&director(), "Director", "no")
        });

        let events = audit_sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, "workflow.submit_approval_applied");
        assert_eq!(events[0].details.get("step_status").map(String::as_str), Some("approved"));
        assert_eq!(events[0].occurred_at, decided_at());
        assert_eq!(events[1].event_type, "workflow.submit_rejection_refused");
        assert_eq!(events[1].outcome, AuditOutcome::Refused);
        assert!(events.iter().all(|event| event.correlation_id == "req-7"));
    }
}
