use anyhow::{anyhow, Context};

use cadence_backend::Database;
use cadence_types::TriggerSource;

use crate::cli::{Args, Command};
use crate::core::config::CadenceConfig;
use crate::core::engine::WorkflowEngine;
use crate::logging;

/// Dispatch the parsed CLI invocation.
pub async fn run(args: Args) -> crate::Result<()> {
    let mut config = CadenceConfig::load(args.config.as_deref())?;
    let _logging_guard = logging::init(&config.logging)?;

    match args.command {
        Command::Serve(serve_args) => {
            if let Some(bind) = serve_args.bind {
                config.server.bind = bind;
            }
            let db = connect(&config).await?;
            db.migrate().await.context("failed to apply migrations")?;
            crate::server::serve(config, db).await?;
            Ok(())
        }
        Command::Migrate => {
            let db = connect(&config).await?;
            db.migrate().await.context("failed to apply migrations")?;
            println!("migrations applied to {}", config.database.url);
            Ok(())
        }
        Command::Execute(execute_args) => {
            let source = parse_source(&execute_args.source)?;
            let db = connect(&config).await?;
            db.migrate().await.context("failed to apply migrations")?;
            let engine = WorkflowEngine::new(&db, &config.execution);
            let summary = engine
                .execute(
                    execute_args.organization,
                    execute_args.rule,
                    execute_args.user,
                    source,
                )
                .await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }
        Command::ExecuteAll(execute_args) => {
            let source = parse_source(&execute_args.source)?;
            let db = connect(&config).await?;
            db.migrate().await.context("failed to apply migrations")?;
            let engine = WorkflowEngine::new(&db, &config.execution);
            let summary = engine
                .execute_all(execute_args.organization, execute_args.user, source)
                .await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }
        Command::Logs(logs_args) => {
            let db = connect(&config).await?;
            db.migrate().await.context("failed to apply migrations")?;
            let engine = WorkflowEngine::new(&db, &config.execution);
            let entries = engine
                .list_logs(logs_args.organization, logs_args.rule, logs_args.limit)
                .await?;
            println!("{}", serde_json::to_string_pretty(&entries)?);
            Ok(())
        }
    }
}

async fn connect(config: &CadenceConfig) -> crate::Result<Database> {
    Database::connect(&config.database.url)
        .await
        .with_context(|| format!("failed to open database {}", config.database.url))
}

fn parse_source(raw: &str) -> crate::Result<TriggerSource> {
    TriggerSource::parse(raw)
        .ok_or_else(|| anyhow!("invalid trigger source '{}': expected manual or scheduled", raw))
}
