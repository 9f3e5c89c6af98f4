use clap::ValueEnum;
use pdesk_core::config::{AppConfig, LoadOptions};
use pdesk_core::domain::approval::{Actor, PdId};
use pdesk_core::errors::ApplicationError;
use pdesk_core::workflow::WorkflowEngine;
use pdesk_store::{ApprovalDesk, InMemoryWorkflowRepository, SampleDataset};
use serde_json::json;

use crate::commands::{current_thread_runtime, CommandResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ReviewAction {
    Approve,
    Reject,
    SelectSupervisor,
}

#[derive(Clone, Debug)]
pub struct ReviewRequest {
    pub pd_id: String,
    pub role: String,
    pub action: ReviewAction,
    /// Acting person; resolved from the configured directory when absent.
    pub actor: Option<String>,
    pub comments: Option<String>,
    pub supervisor: Option<String>,
}

/// Applies one decision to the sample dataset and reports the resulting workflow.
pub fn run(request: ReviewRequest) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "review",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let actor = match &request.actor {
        Some(name) => Actor::new(request.role.clone(), name.clone()),
        None => match config.actor_for_role(&request.role) {
            Some(actor) => actor,
            None => {
                return CommandResult::failure(
                    "review",
                    "validation",
                    format!("no directory entry for role `{}`; pass --as <name>", request.role),
                    4,
                );
            }
        },
    };

    let runtime = match current_thread_runtime() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "review",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let pd_id = PdId(request.pd_id.trim().to_string());
    let result = runtime.block_on(async {
        let repository = InMemoryWorkflowRepository::default();
        SampleDataset::load_workflows(&repository).await.map_err(ApplicationError::from)?;
        let desk = ApprovalDesk::new(repository, &config);

        let comments = request.comments.as_deref();
        let approval = match request.action {
            ReviewAction::Approve => {
                desk.submit_approval(&pd_id, &actor, &request.role, comments).await?
            }
            ReviewAction::Reject => {
                desk.submit_rejection(&pd_id, &actor, &request.role, comments.unwrap_or_default())
                    .await?
            }
            ReviewAction::SelectSupervisor => {
                let supervisor = request.supervisor.as_deref().unwrap_or_default();
                desk.select_supervisor(&pd_id, &actor, &request.role, supervisor, comments).await?
            }
        };
        let workflow = desk.workflow(&pd_id).await?;
        Ok::<_, ApplicationError>((approval, workflow))
    });

    match result {
        Ok((approval, workflow)) => {
            let progress = WorkflowEngine::new(workflow.clone()).progress_percentage();
            let message = format!(
                "{} {} step {} by {}; workflow {} ({progress:.0}% of required approvals)",
                workflow.pd_id,
                approval.approver_role,
                approval.status.as_str(),
                actor.name,
                workflow.status.as_str(),
            );
            let data = json!({ "approval": approval, "workflow": workflow, "progress": progress });
            CommandResult::success_with_data("review", message, Some(data))
        }
        Err(error) => {
            let error = error.into_interface(format!("review:{pd_id}"));
            CommandResult::from_interface_error("review", &error)
        }
    }
}
