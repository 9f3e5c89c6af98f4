use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PdId(pub String);

impl std::fmt::Display for PdId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    pub fn is_decided(self) -> bool {
        !matches!(self, Self::Pending)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

/// Overall workflow outcome. Shares the step vocabulary but is only ever derived.
pub type WorkflowStatus = ApprovalStatus;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PdType {
    #[serde(rename = "Custom PD")]
    Custom,
    #[serde(rename = "Standard PD")]
    Standard,
    #[serde(rename = "Expert and Consultant")]
    ExpertAndConsultant,
}

impl PdType {
    pub const ALL: [PdType; 3] = [Self::Custom, Self::Standard, Self::ExpertAndConsultant];

    pub fn label(self) -> &'static str {
        match self {
            Self::Custom => "Custom PD",
            Self::Standard => "Standard PD",
            Self::ExpertAndConsultant => "Expert and Consultant",
        }
    }
}

impl std::str::FromStr for PdType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let key = value.trim().to_ascii_lowercase();
        match key.as_str() {
            "custom pd" | "custom" => Ok(Self::Custom),
            "standard pd" | "standard" => Ok(Self::Standard),
            "expert and consultant" | "expert_and_consultant" | "expert" => {
                Ok(Self::ExpertAndConsultant)
            }
            _ => Err(format!("unknown PD type `{}`", value.trim())),
        }
    }
}

impl std::fmt::Display for PdType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Approval {
    pub approver_role: String,
    pub approver_name: String,
    pub status: ApprovalStatus,
    pub timestamp: Option<DateTime<Utc>>,
    pub comments: Option<String>,
    pub is_required: bool,
    #[serde(default)]
    pub needs_supervisor_selection: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_supervisor: Option<String>,
}

impl Approval {
    pub fn pending(
        approver_role: impl Into<String>,
        approver_name: impl Into<String>,
        is_required: bool,
    ) -> Self {
        Self {
            approver_role: approver_role.into(),
            approver_name: approver_name.into(),
            status: ApprovalStatus::Pending,
            timestamp: None,
            comments: None,
            is_required,
            needs_supervisor_selection: false,
            selected_supervisor: None,
        }
    }

    pub fn with_supervisor_selection(mut self) -> Self {
        self.needs_supervisor_selection = true;
        self
    }

    pub fn is_pending(&self) -> bool {
        self.status == ApprovalStatus::Pending
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalWorkflow {
    pub pd_id: PdId,
    pub pd_title: String,
    pub pd_type: PdType,
    pub status: WorkflowStatus,
    pub approvals: Vec<Approval>,
    pub submitted_by: String,
    pub submitted_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available_supervisors: Option<Vec<String>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ApprovalAction {
    Approve,
    Reject,
    SelectSupervisor,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalEvent {
    pub pd_id: PdId,
    pub approver_role: String,
    pub action: ApprovalAction,
    pub comments: Option<String>,
    pub selected_supervisor: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRule {
    pub required_approvers: Vec<String>,
    pub optional_approvers: Vec<String>,
    pub manager_selects_supervisor: bool,
}

/// The person acting on a workflow. Supplied by the host on every call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub role: String,
    pub name: String,
}

impl Actor {
    pub fn new(role: impl Into<String>, name: impl Into<String>) -> Self {
        Self { role: role.into(), name: name.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::{ApprovalAction, ApprovalStatus, PdType};

    #[test]
    fn pd_type_serializes_with_display_labels() {
        let json = serde_json::to_string(&PdType::ExpertAndConsultant).expect("serialize");
        assert_eq!(json, "\"Expert and Consultant\"");

        let parsed: PdType = serde_json::from_str("\"Standard PD\"").expect("deserialize");
        assert_eq!(parsed, PdType::Standard);
    }

    #[test]
    fn pd_type_parses_loose_labels() {
        assert_eq!(" custom pd ".parse::<PdType>(), Ok(PdType::Custom));
        assert_eq!("expert".parse::<PdType>(), Ok(PdType::ExpertAndConsultant));
        assert!("temporary".parse::<PdType>().is_err());
    }

    #[test]
    fn action_uses_kebab_case_on_the_wire() {
        let json = serde_json::to_string(&ApprovalAction::SelectSupervisor).expect("serialize");
        assert_eq!(json, "\"select-supervisor\"");
        assert!(ApprovalStatus::Rejected.is_decided());
        assert!(!ApprovalStatus::Pending.is_decided());
    }
}
