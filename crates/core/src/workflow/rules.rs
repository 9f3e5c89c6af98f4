use std::collections::BTreeMap;

use crate::domain::approval::{Approval, ApprovalRule, PdType};
use crate::errors::WorkflowError;

pub const ROLE_MANAGER: &str = "Manager";
pub const ROLE_REVIEWER: &str = "Reviewer";
pub const ROLE_SUPERVISOR: &str = "Supervisor";

impl PdType {
    pub fn rule(self) -> ApprovalRule {
        match self {
            Self::Custom => ApprovalRule {
                required_approvers: vec![ROLE_SUPERVISOR.to_string(), ROLE_MANAGER.to_string()],
                optional_approvers: vec![ROLE_REVIEWER.to_string()],
                manager_selects_supervisor: false,
            },
            Self::Standard => ApprovalRule {
                required_approvers: vec![ROLE_MANAGER.to_string()],
                optional_approvers: Vec::new(),
                manager_selects_supervisor: false,
            },
            Self::ExpertAndConsultant => ApprovalRule {
                required_approvers: vec![ROLE_MANAGER.to_string()],
                optional_approvers: vec![ROLE_REVIEWER.to_string()],
                manager_selects_supervisor: true,
            },
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Custom => "Requires approval from Supervisor and Manager",
            Self::Standard => "Requires approval from Manager only",
            Self::ExpertAndConsultant => {
                "Requires Manager to select and get pre-approval from Supervisor"
            }
        }
    }
}

/// Rule text for a PD type label. Unknown labels have no rule and yield `""`.
pub fn describe_rule(pd_type: &str) -> &'static str {
    pd_type.parse::<PdType>().map(PdType::description).unwrap_or("")
}

/// Builds the initial pending steps for `pd_type`, assigning each role from `directory`.
///
/// Optional roles without an assignee are skipped; a required role without one is an error.
pub fn plan_approvals(
    pd_type: PdType,
    directory: &BTreeMap<String, String>,
) -> Result<Vec<Approval>, WorkflowError> {
    let rule = pd_type.rule();
    let mut approvals = Vec::new();

    for role in &rule.optional_approvers {
        if let Some(name) = lookup(directory, role) {
            approvals.push(Approval::pending(role.clone(), name, false));
        }
    }

    for role in &rule.required_approvers {
        let name = lookup(directory, role).ok_or_else(|| WorkflowError::Validation {
            field: "directory",
            message: format!("no approver is assigned to required role `{role}`"),
        })?;
        let step = Approval::pending(role.clone(), name, true);
        let step = if rule.manager_selects_supervisor && role == ROLE_MANAGER {
            step.with_supervisor_selection()
        } else {
            step
        };
        approvals.push(step);
    }

    Ok(approvals)
}

fn lookup(directory: &BTreeMap<String, String>, role: &str) -> Option<String> {
    let wanted = role.trim().to_ascii_lowercase();
    directory
        .iter()
        .find(|(candidate, name)| {
            candidate.trim().to_ascii_lowercase() == wanted && !name.trim().is_empty()
        })
        .map(|(_, name)| name.trim().to_string())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use crate::domain::approval::PdType;
    use crate::errors::WorkflowError;

    use super::{describe_rule, plan_approvals};

    fn directory() -> BTreeMap<String, String> {
        BTreeMap::from([
            ("Supervisor".to_string(), "Jane Smith".to_string()),
            ("Manager".to_string(), "Bob Wilson".to_string()),
            ("Reviewer".to_string(), "John Doe".to_string()),
        ])
    }

    #[test]
    fn describes_each_known_pd_type() {
        assert_eq!(describe_rule("Custom PD"), "Requires approval from Supervisor and Manager");
        assert_eq!(describe_rule("Standard PD"), "Requires approval from Manager only");
        assert_eq!(
            describe_rule("Expert and Consultant"),
            "Requires Manager to select and get pre-approval from Supervisor"
        );
        assert_eq!(describe_rule("Temporary PD"), "");
    }

    #[test]
    fn custom_pd_plans_supervisor_and_manager_as_required() {
        let approvals = plan_approvals(PdType::Custom, &directory()).expect("plan custom");

        let required: Vec<_> = approvals
            .iter()
            .filter(|a| a.is_required)
            .map(|a| (a.approver_role.as_str(), a.approver_name.as_str()))
            .collect();
        assert_eq!(required, vec![("Supervisor", "Jane Smith"), ("Manager", "Bob Wilson")]);
        assert!(approvals.iter().all(|a| !a.needs_supervisor_selection));
    }

    #[test]
    fn expert_plan_flags_manager_for_supervisor_selection() {
        let approvals =
            plan_approvals(PdType::ExpertAndConsultant, &directory()).expect("plan expert");

        let manager = approvals
            .iter()
            .find(|a| a.approver_role == "Manager")
            .expect("manager step should be planned");
        assert!(manager.is_required);
        assert!(manager.needs_supervisor_selection);
        assert!(approvals.iter().all(|a| a.approver_role != "Supervisor"));
    }

    #[test]
    fn missing_required_assignee_is_a_validation_error() {
        let mut directory = directory();
        directory.remove("Manager");

        let error = plan_approvals(PdType::Standard, &directory).expect_err("manager missing");
        assert!(matches!(error, WorkflowError::Validation { field: "directory", .. }));
    }
}
