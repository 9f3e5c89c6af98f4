use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::warn;

use pdesk_core::address_book::{AddressBook, AddressBookChange};
use pdesk_core::audit::{AuditContext, AuditOutcome, AuditSink, InMemoryAuditSink};
use pdesk_core::clock::{Clock, SystemClock};
use pdesk_core::config::DefaultTieBreak;
use pdesk_core::domain::address::{Address, AddressDraft, AddressId, AddressPatch, AddressType};
use pdesk_core::errors::{AddressError, ApplicationError};
use pdesk_core::notify::{ChangeSink, NoopChangeSink};

use crate::repositories::AddressBookRepository;

type SharedChangeSink = Arc<dyn ChangeSink<AddressBookChange>>;

/// Per-owner address books backed by a repository. Every mutation is audited under the
/// owner's name.
pub struct AddressDesk<R, A = InMemoryAuditSink, C = SystemClock> {
    repository: R,
    tie_break: DefaultTieBreak,
    audit: A,
    changes: SharedChangeSink,
    clock: C,
    writes: Mutex<()>,
}

impl<R> AddressDesk<R>
where
    R: AddressBookRepository,
{
    pub fn new(repository: R, tie_break: DefaultTieBreak) -> Self {
        Self::with_parts(
            repository,
            tie_break,
            InMemoryAuditSink::default(),
            Arc::new(NoopChangeSink),
            SystemClock,
        )
    }
}

impl<R, A, C> AddressDesk<R, A, C>
where
    R: AddressBookRepository,
    A: AuditSink,
    C: Clock,
{
    pub fn with_parts(
        repository: R,
        tie_break: DefaultTieBreak,
        audit: A,
        changes: SharedChangeSink,
        clock: C,
    ) -> Self {
        Self { repository, tie_break, audit, changes, clock, writes: Mutex::new(()) }
    }

    pub fn audit_sink(&self) -> &A {
        &self.audit
    }

    pub async fn addresses(&self, owner: &str) -> Result<Vec<Address>, ApplicationError> {
        Ok(self.book(owner).await?.all())
    }

    pub async fn address(
        &self,
        owner: &str,
        id: &AddressId,
    ) -> Result<Option<Address>, ApplicationError> {
        Ok(self.book(owner).await?.get(id))
    }

    pub async fn default_address(&self, owner: &str) -> Result<Option<Address>, ApplicationError> {
        Ok(self.book(owner).await?.default_address())
    }

    pub async fn addresses_by_type(
        &self,
        owner: &str,
        address_type: AddressType,
    ) -> Result<Vec<Address>, ApplicationError> {
        Ok(self.book(owner).await?.by_type(address_type))
    }

    pub async fn add(&self, owner: &str, draft: AddressDraft) -> Result<Address, ApplicationError> {
        self.mutate(owner, "add", |book| book.add(draft)).await
    }

    pub async fn update(
        &self,
        owner: &str,
        id: &AddressId,
        patch: AddressPatch,
    ) -> Result<Address, ApplicationError> {
        self.mutate(owner, "update", |book| book.update(id, patch)).await
    }

    pub async fn remove(&self, owner: &str, id: &AddressId) -> Result<bool, ApplicationError> {
        self.mutate(owner, "remove", |book| Ok(book.remove(id))).await
    }

    pub async fn set_default(&self, owner: &str, id: &AddressId) -> Result<(), ApplicationError> {
        self.mutate(owner, "set_default", |book| book.set_default(id)).await
    }

    /// Swaps the owner's whole book. A rejected batch leaves the stored book as it was.
    pub async fn replace_all(
        &self,
        owner: &str,
        addresses: Vec<Address>,
    ) -> Result<Vec<Address>, ApplicationError> {
        self.mutate(owner, "replace_all", |book| {
            book.replace_all(addresses)?;
            Ok(book.all())
        })
        .await
    }

    async fn book(
        &self,
        owner: &str,
    ) -> Result<AddressBook<SharedChangeSink>, ApplicationError> {
        let addresses = self.repository.load(owner).await?;
        Ok(AddressBook::restore(addresses, self.tie_break, Arc::clone(&self.changes))?)
    }

    async fn mutate<T, F>(
        &self,
        owner: &str,
        operation: &'static str,
        apply: F,
    ) -> Result<T, ApplicationError>
    where
        F: FnOnce(&mut AddressBook<SharedChangeSink>) -> Result<T, AddressError>,
    {
        let _guard = self.writes.lock().await;
        let context = AuditContext::address_book(owner);
        let mut book = self.book(owner).await?;

        let value = match apply(&mut book) {
            Ok(value) => value,
            Err(error) => {
                warn!(
                    event_name = "address.mutation_refused",
                    owner,
                    correlation_id = %context.correlation_id,
                    operation,
                    error = %error,
                    "address change refused"
                );
                self.audit.emit(
                    context
                        .record(operation, AuditOutcome::Refused, self.clock.now())
                        .detail("error", error.to_string()),
                );
                return Err(error.into());
            }
        };

        let count = book.len();
        self.repository.save(owner, book.into_addresses()).await?;
        self.audit.emit(
            context
                .record(operation, AuditOutcome::Applied, self.clock.now())
                .detail("address_count", count.to_string()),
        );
        Ok(value)
    }
}
