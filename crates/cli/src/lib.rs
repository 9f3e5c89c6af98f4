pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

use commands::review::{ReviewAction, ReviewRequest};

#[derive(Debug, Parser)]
#[command(
    name = "pdesk",
    about = "Position description approval desk",
    long_about = "Inspect configuration and approval rules, seed the sample dataset, apply approval decisions, and run smoke validation.",
    after_help = "Examples:\n  pdesk rules --pd-type \"Expert and Consultant\"\n  pdesk review PD-2025-001 --role Manager --action select-supervisor --supervisor \"Sarah Davis\"\n  pdesk smoke"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "Show the approval rule for each PD type")]
    Rules {
        #[arg(long, help = "Only show the rule for this PD type")]
        pd_type: Option<String>,
    },
    #[command(about = "Load and verify the sample workflows and address book")]
    Seed,
    #[command(about = "Apply one approval decision to the sample dataset")]
    Review {
        #[arg(help = "Workflow identifier, e.g. PD-2025-001")]
        pd_id: String,
        #[arg(long, help = "Approval step role to act on")]
        role: String,
        #[arg(long, value_enum)]
        action: ReviewAction,
        #[arg(long = "as", help = "Acting person; defaults to the directory entry for the role")]
        actor: Option<String>,
        #[arg(long)]
        comments: Option<String>,
        #[arg(long, help = "Supervisor to pre-approve (select-supervisor only)")]
        supervisor: Option<String>,
    },
    #[command(about = "Run end-to-end checks with per-check timing details")]
    Smoke,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Config => commands::config::run(),
        Command::Rules { pd_type } => commands::rules::run(pd_type.as_deref()),
        Command::Seed => commands::seed::run(),
        Command::Review { pd_id, role, action, actor, comments, supervisor } => {
            commands::review::run(ReviewRequest { pd_id, role, action, actor, comments, supervisor })
        }
        Command::Smoke => commands::smoke::run(),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
