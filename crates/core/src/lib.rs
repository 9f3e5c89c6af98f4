pub mod address_book;
pub mod audit;
pub mod clock;
pub mod config;
pub mod domain;
pub mod errors;
pub mod notify;
pub mod workflow;

pub use address_book::{AddressBook, AddressBookChange, AddressChangeKind};
pub use audit::{
    AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink, AuditSubject,
    InMemoryAuditSink,
};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{AppConfig, DefaultTieBreak};
pub use domain::address::{Address, AddressDraft, AddressId, AddressPatch, AddressType};
pub use domain::approval::{
    Actor, Approval, ApprovalAction, ApprovalEvent, ApprovalRule, ApprovalStatus, ApprovalWorkflow,
    PdId, PdType, WorkflowStatus,
};
pub use errors::{AddressError, ApplicationError, DomainError, InterfaceError, WorkflowError};
pub use notify::{ChangeSink, InMemoryChangeSink, NoopChangeSink};
pub use workflow::{WorkflowChange, WorkflowEngine};
