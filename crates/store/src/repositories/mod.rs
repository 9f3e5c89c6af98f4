use async_trait::async_trait;
use thiserror::Error;

use pdesk_core::domain::address::Address;
use pdesk_core::domain::approval::{ApprovalWorkflow, PdId};
use pdesk_core::errors::ApplicationError;

pub mod memory;

pub use memory::{InMemoryAddressBookRepository, InMemoryWorkflowRepository};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<RepositoryError> for ApplicationError {
    fn from(value: RepositoryError) -> Self {
        ApplicationError::Persistence(value.to_string())
    }
}

#[async_trait]
pub trait WorkflowRepository: Send + Sync {
    async fn find_by_id(&self, id: &PdId) -> Result<Option<ApprovalWorkflow>, RepositoryError>;
    async fn save(&self, workflow: ApprovalWorkflow) -> Result<(), RepositoryError>;
    /// All stored workflows ordered by pd id.
    async fn list(&self) -> Result<Vec<ApprovalWorkflow>, RepositoryError>;
}

#[async_trait]
pub trait AddressBookRepository: Send + Sync {
    /// Addresses for `owner` in storage order; empty when nothing was saved yet.
    async fn load(&self, owner: &str) -> Result<Vec<Address>, RepositoryError>;
    async fn save(&self, owner: &str, addresses: Vec<Address>) -> Result<(), RepositoryError>;
}
