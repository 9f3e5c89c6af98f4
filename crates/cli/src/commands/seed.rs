use pdesk_core::config::{AppConfig, LoadOptions};
use pdesk_store::{
    AddressDesk, ApprovalDesk, InMemoryAddressBookRepository, InMemoryWorkflowRepository,
    SampleDataset, SAMPLE_OWNER,
};
use serde_json::{json, Value};

use crate::commands::{current_thread_runtime, CommandResult};

type SeedFailure = (&'static str, String, u8);

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "seed",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let runtime = match current_thread_runtime() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "seed",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let result = runtime.block_on(async {
        let workflows = InMemoryWorkflowRepository::default();
        let addresses = InMemoryAddressBookRepository::default();

        let seeded = SampleDataset::load(&workflows, &addresses)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;
        let verification = SampleDataset::verify(&workflows, &addresses)
            .await
            .map_err(|error| ("seed_verification", error.to_string(), 6u8))?;
        if !verification.all_present {
            return Err(("seed_verification", verification_message(&verification.checks), 6u8));
        }

        let desk = ApprovalDesk::new(workflows, &config);
        let address_desk = AddressDesk::new(addresses, config.address.default_tie_break);
        let listed = desk.workflows().await.map_err(|error| ("internal", error.to_string(), 1u8))?;
        let stats = desk.stats().await.map_err(|error| ("internal", error.to_string(), 1u8))?;
        let book = address_desk
            .addresses(SAMPLE_OWNER)
            .await
            .map_err(|error| ("internal", error.to_string(), 1u8))?;

        let lines: Vec<String> = listed
            .iter()
            .map(|workflow| {
                format!(
                    "  - {}: {} ({}, {})",
                    workflow.pd_id,
                    workflow.pd_title,
                    workflow.pd_type,
                    workflow.status.as_str()
                )
            })
            .collect();
        let message = format!(
            "sample dataset loaded: {} workflows, {} addresses for `{}`\n{}",
            seeded.workflows_seeded.len(),
            seeded.addresses_seeded,
            seeded.address_owner,
            lines.join("\n")
        );
        let data = json!({ "stats": stats, "workflows": listed, "addresses": book });
        let outcome: Result<(String, Value), SeedFailure> = Ok((message, data));
        outcome
    });

    match result {
        Ok((message, data)) => CommandResult::success_with_data("seed", message, Some(data)),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}

fn verification_message(checks: &[(&'static str, bool)]) -> String {
    let failed_checks =
        checks.iter().filter_map(|(check, passed)| (!passed).then_some(*check)).collect::<Vec<_>>();
    if failed_checks.is_empty() {
        "Some seed data failed to load".to_string()
    } else {
        format!("Seed verification failed for checks: {}", failed_checks.join(", "))
    }
}
