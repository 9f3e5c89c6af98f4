use std::collections::{BTreeMap, HashMap};

use tokio::sync::RwLock;

use pdesk_core::domain::address::Address;
use pdesk_core::domain::approval::{ApprovalWorkflow, PdId};

use super::{AddressBookRepository, RepositoryError, WorkflowRepository};

#[derive(Default)]
pub struct InMemoryWorkflowRepository {
    workflows: RwLock<BTreeMap<String, ApprovalWorkflow>>,
}

#[async_trait::async_trait]
impl WorkflowRepository for InMemoryWorkflowRepository {
    async fn find_by_id(&self, id: &PdId) -> Result<Option<ApprovalWorkflow>, RepositoryError> {
        let workflows = self.workflows.read().await;
        Ok(workflows.get(&id.0).cloned())
    }

    async fn save(&self, workflow: ApprovalWorkflow) -> Result<(), RepositoryError> {
        let mut workflows = self.workflows.write().await;
        workflows.insert(workflow.pd_id.0.clone(), workflow);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<ApprovalWorkflow>, RepositoryError> {
        let workflows = self.workflows.read().await;
        Ok(workflows.values().cloned().collect())
    }
}

#[derive(Default)]
pub struct InMemoryAddressBookRepository {
    books: RwLock<HashMap<String, Vec<Address>>>,
}

#[async_trait::async_trait]
impl AddressBookRepository for InMemoryAddressBookRepository {
    async fn load(&self, owner: &str) -> Result<Vec<Address>, RepositoryError> {
        let books = self.books.read().await;
        Ok(books.get(owner).cloned().unwrap_or_default())
    }

    async fn save(&self, owner: &str, addresses: Vec<Address>) -> Result<(), RepositoryError> {
        let mut books = self.books.write().await;
        books.insert(owner.to_string(), addresses);
        Ok(())
    }
}
