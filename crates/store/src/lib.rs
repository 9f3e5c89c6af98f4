pub mod addresses;
pub mod desk;
pub mod fixtures;
pub mod repositories;

pub use addresses::AddressDesk;
pub use desk::{ApprovalDesk, DeskStats, PendingApproval};
pub use fixtures::{SampleDataset, SAMPLE_OWNER, SeedResult, VerificationResult};
pub use repositories::{
    AddressBookRepository, InMemoryAddressBookRepository, InMemoryWorkflowRepository,
    RepositoryError, WorkflowRepository,
};
