use pdesk_core::domain::approval::{ApprovalRule, PdType};
use serde::Serialize;

use crate::commands::CommandResult;

#[derive(Debug, Serialize)]
struct RuleView {
    pd_type: &'static str,
    description: &'static str,
    #[serde(flatten)]
    rule: ApprovalRule,
}

/// Prints the approval rule of one PD type, or of every type when `pd_type` is `None`.
pub fn run(pd_type: Option<&str>) -> CommandResult {
    let selected = match pd_type {
        None => PdType::ALL.to_vec(),
        Some(raw) => match raw.parse::<PdType>() {
            Ok(pd_type) => vec![pd_type],
            Err(error) => return CommandResult::failure("rules", "validation", error, 4),
        },
    };

    let views: Vec<RuleView> = selected
        .into_iter()
        .map(|pd_type| RuleView {
            pd_type: pd_type.label(),
            description: pd_type.description(),
            rule: pd_type.rule(),
        })
        .collect();
    let message = views
        .iter()
        .map(|view| format!("{}: {}", view.pd_type, view.description))
        .collect::<Vec<_>>()
        .join("\n");

    CommandResult::success_with_data("rules", message, serde_json::to_value(&views).ok())
}
