use crate::domain::approval::{Approval, ApprovalStatus, WorkflowStatus};

/// Rejected if any step was rejected, approved once every required step is approved
/// (vacuously when nothing is required), pending otherwise.
pub fn derive_status(approvals: &[Approval]) -> WorkflowStatus {
    if approvals.iter().any(|approval| approval.status == ApprovalStatus::Rejected) {
        return ApprovalStatus::Rejected;
    }

    let all_required_approved = approvals
        .iter()
        .filter(|approval| approval.is_required)
        .all(|approval| approval.status == ApprovalStatus::Approved);

    if all_required_approved {
        ApprovalStatus::Approved
    } else {
        ApprovalStatus::Pending
    }
}

pub fn required_approvals(approvals: &[Approval]) -> Vec<Approval> {
    approvals.iter().filter(|approval| approval.is_required).cloned().collect()
}

pub fn optional_approvals(approvals: &[Approval]) -> Vec<Approval> {
    approvals.iter().filter(|approval| !approval.is_required).cloned().collect()
}

pub fn completed_required(approvals: &[Approval]) -> usize {
    approvals
        .iter()
        .filter(|approval| approval.is_required && approval.status == ApprovalStatus::Approved)
        .count()
}

pub fn total_required(approvals: &[Approval]) -> usize {
    approvals.iter().filter(|approval| approval.is_required).count()
}

pub fn progress_percentage(approvals: &[Approval]) -> f64 {
    let total = total_required(approvals);
    if total == 0 {
        return 0.0;
    }
    completed_required(approvals) as f64 / total as f64 * 100.0
}
