pub mod engine;
pub mod rules;
pub mod status;

pub use engine::{WorkflowChange, WorkflowEngine};
pub use rules::{describe_rule, plan_approvals, ROLE_MANAGER, ROLE_REVIEWER, ROLE_SUPERVISOR};
