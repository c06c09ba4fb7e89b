//! `crm-automation` CLI entry-point.
//!
//! Available sub-commands:
//! - `migrate`:  run pending database migrations.
//! - `validate`: validate a workflow graph JSON file.
//! - `dispatch`: emit a trigger event for a record and wait for the runs.
//! - `execute`:  run one automation against one record.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use uuid::Uuid;

use db::models::TriggerType;
use db::PgStore;
use engine::{AutomationEngine, ExecutorConfig, RunOutcome, TriggerEvent, WorkflowGraph};

#[derive(Parser)]
#[command(name = "crm-automation", about = "Workflow automation engine for CRM records", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct Database {
    #[arg(long, env = "DATABASE_URL")]
    database_url: String,
    #[arg(long, default_value_t = 5)]
    max_connections: u32,
    /// Let runs on the same record interleave instead of queueing them.
    #[arg(long)]
    no_record_lock: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Run pending database migrations.
    Migrate {
        #[arg(long, env = "DATABASE_URL")]
        database_url: String,
    },
    /// Validate a workflow graph JSON file.
    Validate {
        /// Path to the workflow JSON file.
        path: PathBuf,
    },
    /// Emit a trigger event and run every matching automation.
    Dispatch {
        #[command(flatten)]
        database: Database,
        #[arg(long)]
        tenant: Uuid,
        #[arg(long)]
        record: Uuid,
        /// Trigger type, e.g. `status_changed`.
        #[arg(long)]
        event: TriggerType,
    },
    /// Run a single automation against a record.
    Execute {
        #[command(flatten)]
        database: Database,
        #[arg(long)]
        tenant: Uuid,
        #[arg(long)]
        automation: Uuid,
        #[arg(long)]
        record: Uuid,
        #[arg(long, default_value = "record_created")]
        event: TriggerType,
    },
}

impl Database {
    async fn engine(&self) -> Result<AutomationEngine> {
        let pool = db::pool::create_pool(&self.database_url, self.max_connections)
            .await
            .context("failed to connect to database")?;
        let config = ExecutorConfig { serialize_record_runs: !self.no_record_lock };
        Ok(AutomationEngine::new(Arc::new(PgStore::new(pool)), config))
    }
}

fn report(outcome: &RunOutcome) {
    match &outcome.error {
        Some(error) => println!("{} {}: {error}", outcome.log_id, outcome.status.as_str()),
        None => println!("{} {}", outcome.log_id, outcome.status.as_str()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Command::Migrate { database_url } => {
            let pool = db::pool::create_pool(&database_url, 2)
                .await
                .context("failed to connect to database")?;
            db::pool::run_migrations(&pool).await.context("migration failed")?;
            info!("Migrations applied successfully");
        }
        Command::Validate { path } => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("cannot read file {}", path.display()))?;
            let graph: WorkflowGraph = serde_json::from_str(&content).context("invalid workflow JSON")?;

            match engine::validate_workflow(&graph) {
                Ok(order) => println!("Workflow is valid. Topological order: {order:?}"),
                Err(e) => bail!("validation failed: {e}"),
            }
        }
        Command::Dispatch { database, tenant, record, event } => {
            let engine = database.engine().await?;
            let handles = engine
                .dispatch(TriggerEvent { tenant_id: tenant, record_id: record, trigger_type: event })
                .await;
            info!(runs = handles.len(), "waiting for automation runs");

            for handle in handles {
                match handle.await.context("automation run panicked")? {
                    Some(outcome) => report(&outcome),
                    None => warn!("run was not recorded"),
                }
            }
        }
        Command::Execute { database, tenant, automation, record, event } => {
            let engine = database.engine().await?;
            match engine.execute(tenant, automation, record, event).await {
                Some(outcome) => report(&outcome),
                None => println!("nothing to run"),
            }
        }
    }

    Ok(())
}
