use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::approval::PdId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditCategory {
    Workflow,
    Address,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Applied,
    Refused,
}

impl AuditOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::Refused => "refused",
        }
    }
}

/// The record an audited operation touched.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuditSubject {
    Workflow { pd_id: PdId },
    AddressBook { owner: String },
}

impl AuditSubject {
    pub fn category(&self) -> AuditCategory {
        match self {
            Self::Workflow { .. } => AuditCategory::Workflow,
            Self::AddressBook { .. } => AuditCategory::Address,
        }
    }
}

/// Who acted on what, shared by every event one request produces.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditContext {
    pub subject: AuditSubject,
    pub correlation_id: String,
    pub actor: String,
}

impl AuditContext {
    pub fn workflow(pd_id: PdId, actor: impl Into<String>) -> Self {
        Self::new(AuditSubject::Workflow { pd_id }, actor)
    }

    pub fn address_book(owner: impl Into<String>) -> Self {
        let owner = owner.into();
        Self::new(AuditSubject::AddressBook { owner: owner.clone() }, owner)
    }

    /// Fresh context with a generated correlation id.
    pub fn new(subject: AuditSubject, actor: impl Into<String>) -> Self {
        Self { subject, correlation_id: Uuid::new_v4().to_string(), actor: actor.into() }
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = correlation_id.into();
        self
    }

    /// Starts an event named `{category}.{operation}_{outcome}` stamped at `occurred_at`.
    pub fn record(
        &self,
        operation: &str,
        outcome: AuditOutcome,
        occurred_at: DateTime<Utc>,
    ) -> AuditEvent {
        let category = self.subject.category();
        let prefix = match category {
            AuditCategory::Workflow => "workflow",
            AuditCategory::Address => "address",
        };
        AuditEvent {
            event_id: Uuid::new_v4().to_string(),
            event_type: format!("{prefix}.{operation}_{}", outcome.as_str()),
            category,
            subject: self.subject.clone(),
            correlation_id: self.correlation_id.clone(),
            actor: self.actor.clone(),
            outcome,
            details: BTreeMap::new(),
            occurred_at,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: String,
    pub event_type: String,
    pub category: AuditCategory,
    pub subject: AuditSubject,
    pub correlation_id: String,
    pub actor: String,
    pub outcome: AuditOutcome,
    pub details: BTreeMap<String, String>,
    pub occurred_at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn detail(mut self, key: &str, value: impl Into<String>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }
}

pub trait AuditSink: Send + Sync {
    fn emit(&self, event: AuditEvent);
}

/// Keeps every event in memory; clones share one log.
#[derive(Clone, Default)]
pub struct InMemoryAuditSink {
    log: Arc<Mutex<Vec<AuditEvent>>>,
}

impl InMemoryAuditSink {
    pub fn events(&self) -> Vec<AuditEvent> {
        self.log.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).clone()
    }

    pub fn events_in(&self, category: AuditCategory) -> Vec<AuditEvent> {
        self.events().into_iter().filter(|event| event.category == category).collect()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn emit(&self, event: AuditEvent) {
        self.log.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).push(event);
    }
}
