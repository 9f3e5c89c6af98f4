use std::time::Instant;

use pdesk_core::config::{AppConfig, LoadOptions};
use pdesk_core::domain::approval::{Actor, ApprovalStatus, PdId};
use pdesk_core::errors::{ApplicationError, DomainError};
use pdesk_core::workflow::ROLE_MANAGER;
use pdesk_store::{
    AddressDesk, ApprovalDesk, InMemoryAddressBookRepository, InMemoryWorkflowRepository,
    RepositoryError, SampleDataset, SAMPLE_OWNER,
};
use serde::Serialize;

use crate::commands::{current_thread_runtime, CommandResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum SmokeStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct SmokeCheck {
    name: &'static str,
    status: SmokeStatus,
    elapsed_ms: u64,
    message: String,
}

#[derive(Debug, Serialize)]
struct SmokeReport {
    command: &'static str,
    status: SmokeStatus,
    summary: String,
    total_elapsed_ms: u64,
    checks: Vec<SmokeCheck>,
}

const CHECKS_AFTER_CONFIG: [&str; 3] = ["sample_dataset", "workflow_decision", "address_invariant"];

pub fn run() -> CommandResult {
    let started = Instant::now();
    let mut checks = Vec::new();

    let config = match timed_check(|| AppConfig::load(LoadOptions::default())) {
        Ok((elapsed_ms, config)) => {
            checks.push(SmokeCheck {
                name: "config_validation",
                status: SmokeStatus::Pass,
                elapsed_ms,
                message: "configuration loaded and validated".to_string(),
            });
            config
        }
        Err((elapsed_ms, error)) => {
            checks.push(SmokeCheck {
                name: "config_validation",
                status: SmokeStatus::Fail,
                elapsed_ms,
                message: error.to_string(),
            });
            checks.extend(CHECKS_AFTER_CONFIG.into_iter().map(skipped));
            return finalize_report(checks, elapsed_since(started));
        }
    };

    let runtime = match current_thread_runtime() {
        Ok(runtime) => runtime,
        Err(error) => {
            checks.push(SmokeCheck {
                name: "sample_dataset",
                status: SmokeStatus::Fail,
                elapsed_ms: 0,
                message: format!("failed to initialize async runtime: {error}"),
            });
            checks.extend(CHECKS_AFTER_CONFIG[1..].iter().copied().map(skipped));
            return finalize_report(checks, elapsed_since(started));
        }
    };

    let workflows = InMemoryWorkflowRepository::default();
    let addresses = InMemoryAddressBookRepository::default();
    let seeded = timed_check(|| {
        runtime.block_on(async {
            SampleDataset::load(&workflows, &addresses).await?;
            let verification = SampleDataset::verify(&workflows, &addresses).await?;
            Ok::<_, RepositoryError>(verification.all_present)
        })
    });
    match seeded {
        Ok((elapsed_ms, true)) => checks.push(SmokeCheck {
            name: "sample_dataset",
            status: SmokeStatus::Pass,
            elapsed_ms,
            message: "sample workflows and addresses loaded and verified".to_string(),
        }),
        Ok((elapsed_ms, false)) => {
            checks.push(SmokeCheck {
                name: "sample_dataset",
                status: SmokeStatus::Fail,
                elapsed_ms,
                message: "sample dataset failed verification".to_string(),
            });
            checks.extend(CHECKS_AFTER_CONFIG[1..].iter().copied().map(skipped));
            return finalize_report(checks, elapsed_since(started));
        }
        Err((elapsed_ms, error)) => {
            checks.push(SmokeCheck {
                name: "sample_dataset",
                status: SmokeStatus::Fail,
                elapsed_ms,
                message: format!("failed to load sample dataset: {error}"),
            });
            checks.extend(CHECKS_AFTER_CONFIG[1..].iter().copied().map(skipped));
            return finalize_report(checks, elapsed_since(started));
        }
    }

    let desk = ApprovalDesk::new(workflows, &config);
    let decision = timed_check(|| {
        runtime.block_on(async {
            let pd_id = PdId("PD-2025-001".to_string());
            let manager = desk
                .workflow(&pd_id)
                .await?
                .approvals
                .into_iter()
                .find(|approval| approval.approver_role == ROLE_MANAGER)
                .map(|approval| Actor::new(ROLE_MANAGER, approval.approver_name))
                .ok_or_else(|| {
                    DomainError::InvariantViolation("sample workflow has no manager step".to_string())
                })?;
            desk.select_supervisor(&pd_id, &manager, ROLE_MANAGER, "Sarah Davis", None).await?;
            Ok::<_, ApplicationError>(desk.workflow(&pd_id).await?.status)
        })
    });
    checks.push(match decision {
        Ok((elapsed_ms, ApprovalStatus::Approved)) => SmokeCheck {
            name: "workflow_decision",
            status: SmokeStatus::Pass,
            elapsed_ms,
            message: "supervisor selection approved the sample workflow".to_string(),
        },
        Ok((elapsed_ms, status)) => SmokeCheck {
            name: "workflow_decision",
            status: SmokeStatus::Fail,
            elapsed_ms,
            message: format!("expected an approved workflow, found `{}`", status.as_str()),
        },
        Err((elapsed_ms, error)) => SmokeCheck {
            name: "workflow_decision",
            status: SmokeStatus::Fail,
            elapsed_ms,
            message: format!("decision failed: {error}"),
        },
    });

    let address_desk = AddressDesk::new(addresses, config.address.default_tie_break);
    let invariant = timed_check(|| {
        runtime.block_on(async {
            let default = address_desk.default_address(SAMPLE_OWNER).await?;
            if let Some(default) = default {
                address_desk.remove(SAMPLE_OWNER, &default.id).await?;
            }
            let remaining = address_desk.addresses(SAMPLE_OWNER).await?;
            let defaults = remaining.iter().filter(|address| address.is_default).count();
            Ok::<_, ApplicationError>((remaining.len(), defaults))
        })
    });
    checks.push(match invariant {
        Ok((elapsed_ms, (remaining, 1))) if remaining > 0 => SmokeCheck {
            name: "address_invariant",
            status: SmokeStatus::Pass,
            elapsed_ms,
            message: "removing the default promoted the remaining address".to_string(),
        },
        Ok((elapsed_ms, (remaining, defaults))) => SmokeCheck {
            name: "address_invariant",
            status: SmokeStatus::Fail,
            elapsed_ms,
            message: format!("{remaining} addresses left with {defaults} defaults"),
        },
        Err((elapsed_ms, error)) => SmokeCheck {
            name: "address_invariant",
            status: SmokeStatus::Fail,
            elapsed_ms,
            message: format!("address check failed: {error}"),
        },
    });

    finalize_report(checks, elapsed_since(started))
}

fn timed_check<T, E>(check: impl FnOnce() -> Result<T, E>) -> Result<(u64, T), (u64, E)> {
    let started = Instant::now();
    match check() {
        Ok(value) => Ok((elapsed_since(started), value)),
        Err(error) => Err((elapsed_since(started), error)),
    }
}

fn elapsed_since(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

fn skipped(name: &'static str) -> SmokeCheck {
    SmokeCheck {
        name,
        status: SmokeStatus::Skipped,
        elapsed_ms: 0,
        message: "skipped due previous failure".to_string(),
    }
}

fn finalize_report(checks: Vec<SmokeCheck>, total_elapsed_ms: u64) -> CommandResult {
    let passed = checks.iter().filter(|check| check.status == SmokeStatus::Pass).count();
    let total = checks.len();
    let failed = checks.iter().any(|check| check.status == SmokeStatus::Fail);

    let report = SmokeReport {
        command: "smoke",
        status: if failed { SmokeStatus::Fail } else { SmokeStatus::Pass },
        summary: format!("smoke: {passed}/{total} checks passed in {total_elapsed_ms}ms"),
        total_elapsed_ms,
        checks,
    };

    let human = report.summary.clone();
    let machine = serde_json::to_string(&report).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"smoke\",\"status\":\"fail\",\"summary\":\"serialization failed\",\"error\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    });

    CommandResult { exit_code: if failed { 6 } else { 0 }, output: format!("{human}\n{machine}") }
}
