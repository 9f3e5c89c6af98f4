use chrono::{DateTime, Utc};
use serde::Serialize;

use pdesk_core::domain::address::{Address, AddressId, AddressType};
use pdesk_core::domain::approval::{Approval, ApprovalStatus, ApprovalWorkflow, PdId, PdType};

use crate::repositories::{AddressBookRepository, RepositoryError, WorkflowRepository};

/// Owner key the sample address book is stored under.
pub const SAMPLE_OWNER: &str = "current-user";

const EXPERT_PD_ID: &str = "PD-2025-001";
const STANDARD_PD_ID: &str = "PD-2025-002";
const SAMPLE_SUPERVISORS: &[&str] =
    &["Alice Johnson", "Michael Brown", "Sarah Davis", "Robert Wilson"];

/// Canonical demo data: one Expert and Consultant workflow awaiting the manager's
/// supervisor selection, one approved Standard PD, and a two-entry address book.
pub struct SampleDataset;

impl SampleDataset {
    pub fn workflows() -> Result<Vec<ApprovalWorkflow>, RepositoryError> {
        Ok(vec![
            ApprovalWorkflow {
                pd_id: PdId(EXPERT_PD_ID.to_string()),
                pd_title: "Senior Software Engineer - Frontend Development".to_string(),
                pd_type: PdType::ExpertAndConsultant,
                status: ApprovalStatus::Pending,
                approvals: vec![
                    Approval {
                        status: ApprovalStatus::Approved,
                        timestamp: Some(at("2025-07-31T10:00:00Z")?),
                        comments: Some(
                            "Position requirements are well defined and align with team needs."
                                .to_string(),
                        ),
                        ..Approval::pending("Reviewer", "John Doe", false)
                    },
                    Approval::pending("Manager", "Bob Wilson", true).with_supervisor_selection(),
                ],
                submitted_by: "HR Department".to_string(),
                submitted_date: at("2025-07-30T09:00:00Z")?,
                available_supervisors: Some(
                    SAMPLE_SUPERVISORS.iter().map(|name| (*name).to_string()).collect(),
                ),
            },
            ApprovalWorkflow {
                pd_id: PdId(STANDARD_PD_ID.to_string()),
                pd_title: "Marketing Specialist - Digital Campaigns".to_string(),
                pd_type: PdType::Standard,
                status: ApprovalStatus::Approved,
                approvals: vec![Approval {
                    status: ApprovalStatus::Approved,
                    timestamp: Some(at("2025-07-29T11:15:00Z")?),
                    comments: Some("Approved for immediate hiring.".to_string()),
                    ..Approval::pending("Manager", "Sarah Davis", true)
                }],
                submitted_by: "Marketing Department".to_string(),
                submitted_date: at("2025-07-28T14:30:00Z")?,
                available_supervisors: None,
            },
        ])
    }

    pub fn addresses() -> Vec<Address> {
        vec![
            Address {
                id: AddressId("1".to_string()),
                address_type: AddressType::Home,
                street: "123 Main St".to_string(),
                city: "Anytown".to_string(),
                state: "CA".to_string(),
                zip_code: "12345".to_string(),
                country: "US".to_string(),
                is_default: true,
            },
            Address {
                id: AddressId("2".to_string()),
                address_type: AddressType::Work,
                street: "456 Business Ave".to_string(),
                city: "Corporate City".to_string(),
                state: "NY".to_string(),
                zip_code: "67890".to_string(),
                country: "US".to_string(),
                is_default: false,
            },
        ]
    }

    /// Stores both sample data sets.
    pub async fn load<W, A>(workflows: &W, addresses: &A) -> Result<SeedResult, RepositoryError>
    where
        W: WorkflowRepository + ?Sized,
        A: AddressBookRepository + ?Sized,
    {
        let workflows_seeded = Self::load_workflows(workflows).await?;
        let addresses_seeded = Self::load_addresses(addresses).await?;
        Ok(SeedResult { workflows_seeded, address_owner: SAMPLE_OWNER, addresses_seeded })
    }

    pub async fn load_workflows<W>(repository: &W) -> Result<Vec<PdId>, RepositoryError>
    where
        W: WorkflowRepository + ?Sized,
    {
        let mut seeded = Vec::new();
        for workflow in Self::workflows()? {
            seeded.push(workflow.pd_id.clone());
            repository.save(workflow).await?;
        }
        Ok(seeded)
    }

    pub async fn load_addresses<A>(repository: &A) -> Result<usize, RepositoryError>
    where
        A: AddressBookRepository + ?Sized,
    {
        let addresses = Self::addresses();
        let count = addresses.len();
        repository.save(SAMPLE_OWNER, addresses).await?;
        Ok(count)
    }

    /// Checks that the seeded records are present and still carry their seeded state.
    pub async fn verify<W, A>(
        workflows: &W,
        addresses: &A,
    ) -> Result<VerificationResult, RepositoryError>
    where
        W: WorkflowRepository + ?Sized,
        A: AddressBookRepository + ?Sized,
    {
        let mut checks = Vec::new();

        for expected in Self::workflows()? {
            let found = workflows.find_by_id(&expected.pd_id).await?;
            let name = if expected.pd_id.0 == EXPERT_PD_ID {
                "workflow-expert-and-consultant"
            } else {
                "workflow-standard"
            };
            checks.push((name, found.as_ref() == Some(&expected)));
        }

        let book = addresses.load(SAMPLE_OWNER).await?;
        checks.push(("address-count", book.len() == Self::addresses().len()));
        let defaults = book.iter().filter(|address| address.is_default).count();
        checks.push(("address-single-default", defaults == 1));

        let all_present = checks.iter().all(|(_, ok)| *ok);
        Ok(VerificationResult { all_present, checks })
    }
}

fn at(raw: &str) -> Result<DateTime<Utc>, RepositoryError> {
    raw.parse::<DateTime<Utc>>()
        .map_err(|error| RepositoryError::Decode(format!("fixture timestamp `{raw}`: {error}")))
}

#[derive(Debug, Serialize)]
pub struct SeedResult {
    pub workflows_seeded: Vec<PdId>,
    pub address_owner: &'static str,
    pub addresses_seeded: usize,
}

#[derive(Debug, Serialize)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}

#[cfg(test)]
mod tests {
    use pdesk_core::domain::approval::{ApprovalStatus, PdType};
    use pdesk_core::workflow::status::derive_status;

    use crate::repositories::{InMemoryAddressBookRepository, InMemoryWorkflowRepository};

    use super::SampleDataset;

    #[test]
    fn sample_statuses_match_their_steps() {
        let workflows = SampleDataset::workflows().expect("fixture workflows");

        assert_eq!(workflows.len(), 2);
        for workflow in &workflows {
            assert_eq!(derive_status(&workflow.approvals), workflow.status);
        }
        assert_eq!(workflows[0].pd_type, PdType::ExpertAndConsultant);
        assert!(workflows[0].approvals[1].needs_supervisor_selection);
        assert_eq!(workflows[1].status, ApprovalStatus::Approved);
    }

    #[test]
    fn sample_addresses_have_one_default() {
        let addresses = SampleDataset::addresses();

        assert_eq!(addresses.iter().filter(|a| a.is_default).count(), 1);
        assert!(addresses.iter().all(|a| a.validate_fields().is_ok()));
    }

    #[tokio::test]
    async fn seeded_dataset_verifies() {
        let workflows = InMemoryWorkflowRepository::default();
        let addresses = InMemoryAddressBookRepository::default();

        let seeded = SampleDataset::load(&workflows, &addresses).await.expect("seed");
        assert_eq!(seeded.workflows_seeded.len(), 2);
        assert_eq!(seeded.addresses_seeded, 2);

        let verification = SampleDataset::verify(&workflows, &addresses).await.expect("verify");
        assert!(verification.all_present, "{:?}", verification.checks);
    }

    #[tokio::test]
    async fn empty_repositories_fail_verification() {
        let workflows = InMemoryWorkflowRepository::default();
        let addresses = InMemoryAddressBookRepository::default();

        let verification = SampleDataset::verify(&workflows, &addresses).await.expect("verify");

        assert!(!verification.all_present);
        assert!(verification.checks.iter().any(|(name, ok)| *name == "address-count" && !ok));
    }
}
