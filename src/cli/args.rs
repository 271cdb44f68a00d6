use clap::Args;
use uuid::Uuid;

#[derive(Args)]
pub struct ServeArgs {
    /// Override the bind address from the config file
    #[arg(long, value_name = "ADDR")]
    pub bind: Option<String>,
}

#[derive(Args)]
pub struct ExecuteArgs {
    /// Rule to execute
    #[arg(long, value_name = "UUID")]
    pub rule: Uuid,

    /// Organization the rule belongs to
    #[arg(long, value_name = "UUID")]
    pub organization: Uuid,

    /// User recorded as the run's trigger (optional)
    #[arg(long, value_name = "UUID")]
    pub user: Option<Uuid>,

    /// Trigger source recorded in the log: manual or scheduled
    #[arg(long, default_value = "manual", value_name = "SOURCE")]
    pub source: String,
}

#[derive(Args)]
pub struct ExecuteAllArgs {
    /// Organization whose enabled rules should run
    #[arg(long, value_name = "UUID")]
    pub organization: Uuid,

    /// User recorded as the run's trigger (optional)
    #[arg(long, value_name = "UUID")]
    pub user: Option<Uuid>,

    /// Trigger source recorded in the log: manual or scheduled
    #[arg(long, default_value = "manual", value_name = "SOURCE")]
    pub source: String,
}

#[derive(Args)]
pub struct LogsArgs {
    /// Rule whose history to show
    #[arg(long, value_name = "UUID")]
    pub rule: Uuid,

    /// Organization the rule belongs to
    #[arg(long, value_name = "UUID")]
    pub organization: Uuid,

    /// Maximum number of entries, most recent first
    #[arg(long, default_value = "20")]
    pub limit: i64,
}
