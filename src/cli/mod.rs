pub mod args;
pub mod commands;

pub use args::{ExecuteAllArgs, ExecuteArgs, LogsArgs, ServeArgs};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{name} {version}\n\
{about-with-newline}\n\
USAGE:\n    {usage}\n\
\nOPTIONS:\n{options}\n\
COMMANDS:\n{subcommands}\n";

#[derive(Parser)]
#[command(name = "cadence")]
#[command(version = crate::VERSION)]
#[command(about = "Workflow rule engine that turns CRM renewal triggers into follow-up tasks")]
#[command(help_template = HELP_TEMPLATE)]
#[command(
    after_long_help = "Typical flow: migrate the database, serve the API, then execute rules manually or from a scheduler."
)]
pub struct Args {
    /// Path to the config file (default: cadence.toml, env: CADENCE_CONFIG)
    #[arg(long, global = true, value_name = "FILE", env = "CADENCE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    #[command(
        about = "Run the HTTP API server",
        long_about = "Serve applies pending migrations and exposes the workflow-rule CRUD, execution, and log endpoints.",
        after_help = "Example:\n    cadence serve --bind 127.0.0.1:8474"
    )]
    Serve(ServeArgs),
    #[command(
        about = "Apply pending database migrations",
        after_help = "Example:\n    cadence migrate"
    )]
    Migrate,
    #[command(
        about = "Execute one workflow rule",
        long_about = "Execute runs the engine once for the given rule and prints the execution summary as JSON.",
        after_help = "Example:\n    cadence execute --rule 3e9c... --organization 9f1b..."
    )]
    Execute(ExecuteArgs),
    #[command(
        about = "Execute every enabled rule for an organization",
        after_help = "Example:\n    cadence execute-all --organization 9f1b... --source scheduled"
    )]
    ExecuteAll(ExecuteAllArgs),
    #[command(
        about = "Show recent execution log entries for a rule",
        after_help = "Example:\n    cadence logs --rule 3e9c... --organization 9f1b... --limit 10"
    )]
    Logs(LogsArgs),
}

pub use commands::run;
