use thiserror::Error;

use crate::domain::address::AddressId;
use crate::domain::approval::PdId;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("no approval step for role `{role}` in workflow `{pd_id}`")]
    NotFound { pd_id: PdId, role: String },
    #[error("`{actor}` cannot act on the `{role}` step: {reason}")]
    NotEligible { role: String, actor: String, reason: String },
    #[error("invalid {field}: {message}")]
    Validation { field: &'static str, message: String },
    #[error("unknown workflow `{0}`")]
    UnknownWorkflow(PdId),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("address `{0}` was not found")]
    NotFound(AddressId),
    #[error("address id `{0}` appears more than once")]
    DuplicateId(AddressId),
    #[error("invalid {field}: {message}")]
    Validation { field: &'static str, message: String },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
    #[error(transparent)]
    Address(#[from] AddressError),
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("persistence failure: {0}")]
    Persistence(String),
}

impl From<WorkflowError> for ApplicationError {
    fn from(value: WorkflowError) -> Self {
        Self::Domain(DomainError::Workflow(value))
    }
}

impl From<AddressError> for ApplicationError {
    fn from(value: AddressError) -> Self {
        Self::Domain(DomainError::Address(value))
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("not found: {message}")]
    NotFound { message: String, correlation_id: String },
    #[error("forbidden: {message}")]
    Forbidden { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => "Please correct the highlighted fields.",
            Self::NotFound { .. } => "The requested resource was not found.",
            Self::Forbidden { .. } => "You are not authorized to perform this action.",
            Self::Internal { .. } => "An unexpected error occurred. Please try again.",
        }
    }

    pub fn error_class(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => "validation",
            Self::NotFound { .. } => "not_found",
            Self::Forbidden { .. } => "not_eligible",
            Self::Internal { .. } => "internal",
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::NotFound { correlation_id: id, .. }
            | InterfaceError::Forbidden { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let message = value.to_string();
        let correlation_id = "unassigned".to_owned();
        match value {
            ApplicationError::Domain(DomainError::Workflow(WorkflowError::NotFound { .. }))
            | ApplicationError::Domain(DomainError::Workflow(WorkflowError::UnknownWorkflow(_)))
            | ApplicationError::Domain(DomainError::Address(AddressError::NotFound(_))) => {
                Self::NotFound { message, correlation_id }
            }
            ApplicationError::Domain(DomainError::Workflow(WorkflowError::NotEligible {
                ..
            })) => Self::Forbidden { message, correlation_id },
            ApplicationError::Domain(DomainError::Workflow(WorkflowError::Validation { .. }))
            | ApplicationError::Domain(DomainError::Address(AddressError::Validation { .. }))
            | ApplicationError::Domain(DomainError::Address(AddressError::DuplicateId(_)))
            | ApplicationError::Domain(DomainError::InvariantViolation(_)) => {
                Self::BadRequest { message, correlation_id }
            }
            ApplicationError::Persistence(_) => {
                Self::Internal { message, correlation_id }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::address::AddressId;
    use crate::domain::approval::PdId;
    use crate::errors::{AddressError, ApplicationError, InterfaceError, WorkflowError};

    #[test]
    fn validation_error_maps_to_bad_request_interface_error() {
        let interface = ApplicationError::from(WorkflowError::Validation {
            field: "comments",
            message: "too short".to_owned(),
        })
        .into_interface("req-1");

        assert!(matches!(
            interface,
            InterfaceError::BadRequest {
                ref correlation_id,
                ..
            } if correlation_id == "req-1"
        ));
        assert_eq!(interface.user_message(), "Please correct the highlighted fields.");
    }

    #[test]
    fn not_eligible_maps_to_forbidden() {
        let interface = ApplicationError::from(WorkflowError::NotEligible {
            role: "Manager".to_owned(),
            actor: "John Doe".to_owned(),
            reason: "not the designated approver".to_owned(),
        })
        .into_interface("req-2");

        assert!(matches!(interface, InterfaceError::Forbidden { .. }));
        assert_eq!(interface.error_class(), "not_eligible");
    }

    #[test]
    fn missing_records_map_to_not_found() {
        let workflow = ApplicationError::from(WorkflowError::UnknownWorkflow(PdId(
            "PD-404".to_owned(),
        )))
        .into_interface("req-3");
        let address =
            ApplicationError::from(AddressError::NotFound(AddressId("a-404".to_owned())))
                .into_interface("req-4");

        assert!(matches!(workflow, InterfaceError::NotFound { .. }));
        assert!(matches!(address, InterfaceError::NotFound { .. }));
        assert_eq!(address.user_message(), "The requested resource was not found.");
    }

    #[test]
    fn persistence_and_duplicate_ids_map_to_internal_and_bad_request() {
        let persistence =
            ApplicationError::Persistence("decode error".to_owned()).into_interface("req-5");
        let duplicate =
            ApplicationError::from(AddressError::DuplicateId(AddressId("1".to_owned())))
                .into_interface("req-6");

        assert!(matches!(persistence, InterfaceError::Internal { .. }));
        assert_eq!(persistence.user_message(), "An unexpected error occurred. Please try again.");
        assert_eq!(duplicate.error_class(), "validation");
    }
}
