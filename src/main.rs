use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use loomflow_core::config::AppConfig;
use loomflow_core::execution::{Execution, ExecutionStatus};
use loomflow_core::traits::{ExecutionStore, WorkflowStore};
use loomflow_core::workflow::Workflow;
use loomflow_engine::{ScheduledResumePoller, WaitOutcome, WorkflowEngine};
use loomflow_handlers::HandlerRegistry;
use loomflow_store::SqliteStore;

#[derive(Parser)]
#[command(name = "loomflow", version, about = "Graph-based workflow execution engine")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "loomflow.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a workflow once and wait for its outcome
    Run {
        /// Path to a workflow definition (JSON)
        workflow: PathBuf,
        /// Trigger input as inline JSON
        #[arg(long)]
        input: Option<String>,
    },
    /// Resume a suspended node with replacement input
    Resume {
        /// Execution ID
        execution: String,
        /// Node ID to resume
        node: String,
        /// Replacement input as inline JSON
        #[arg(long)]
        input: Option<String>,
    },
    /// Show an execution's status and per-node results
    Status {
        /// Execution ID
        execution: String,
    },
    /// Run the scheduled-resume poller until Ctrl-C
    Poll,
    /// List registered node handlers
    Handlers,
    /// Show current configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("loomflow=info,warn")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load(&cli.config)?;

    if let Commands::Config = cli.command {
        println!("{}", toml::to_string_pretty(&config)?);
        return Ok(());
    }

    let registry = Arc::new(HandlerRegistry::with_builtins());

    if let Commands::Handlers = cli.command {
        let mut handlers = registry.list();
        handlers.sort_by(|a, b| (&a.0, &a.2).cmp(&(&b.0, &b.2)));
        for (app_id, kind, key) in &handlers {
            println!("  {}/{} ({})", app_id, key, kind);
        }
        return Ok(());
    }

    let store = Arc::new(SqliteStore::open(&config.db_path)?);
    let engine = Arc::new(WorkflowEngine::new(
        store.clone(),
        store.clone(),
        store.clone(),
        registry,
        config.engine.clone(),
    ));

    match cli.command {
        Commands::Run { workflow, input } => {
            let raw = std::fs::read_to_string(&workflow)?;
            let workflow: Workflow = serde_json::from_str(&raw)?;
            let input = parse_input(input)?;

            store.put_workflow(&workflow).await?;
            let execution = Execution::new(&workflow);
            let execution_id = execution.id.clone();
            store.put_execution(&execution).await?;

            info!(
                workflow_id = %workflow.id,
                execution_id = %execution_id,
                "Run enqueued"
            );
            engine
                .enqueue_run(&workflow.workspace_id, &execution_id, input)
                .await?;

            match engine.wait_for_outcome(&execution_id).await? {
                WaitOutcome::Finished(status) => {
                    print_execution(&store, &execution_id).await?;
                    if status == ExecutionStatus::Failed {
                        std::process::exit(1);
                    }
                }
                WaitOutcome::TimedOut => {
                    println!(
                        "Execution {} still running; check back with `loomflow status`",
                        execution_id
                    );
                }
            }
        }
        Commands::Resume {
            execution,
            node,
            input,
        } => {
            let input = parse_input(input)?;
            let status = engine.resume_node(&execution, &node, input).await?;
            println!("Execution {}: {}", execution, status);
        }
        Commands::Status { execution } => {
            print_execution(&store, &execution).await?;
        }
        Commands::Poll => {
            let cancel = tokio_util::sync::CancellationToken::new();
            let cancel_clone = cancel.clone();
            tokio::spawn(async move {
                tokio::signal::ctrl_c().await.ok();
                info!("Shutting down poller...");
                cancel_clone.cancel();
            });

            let poller = ScheduledResumePoller::new(
                engine,
                std::time::Duration::from_secs(config.engine.poller_interval_secs),
                cancel,
            );
            poller.run().await;
        }
        Commands::Config | Commands::Handlers => unreachable!("handled before store setup"),
    }

    Ok(())
}

fn parse_input(input: Option<String>) -> anyhow::Result<Option<serde_json::Value>> {
    input
        .map(|raw| serde_json::from_str(&raw))
        .transpose()
        .map_err(|e| anyhow::anyhow!("Invalid input JSON: {}", e))
}

async fn print_execution(store: &SqliteStore, execution_id: &str) -> anyhow::Result<()> {
    let execution = store
        .get_execution(execution_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Execution not found: {}", execution_id))?;

    println!("Execution: {}", execution.id);
    println!("Workflow:  {}", execution.workflow_id);
    println!("Status:    {}", execution.status);
    if let Some(ref message) = execution.status_message {
        println!("Message:   {}", message);
    }
    if let Some(continue_at) = execution.continue_at {
        println!("Continue:  {}", continue_at.to_rfc3339());
    }
    println!("Nodes:");
    for node in &execution.nodes {
        let detail = node
            .status_message
            .as_deref()
            .map(|m| format!(" ({})", m))
            .unwrap_or_default();
        println!("  {:<24} {}{}", node.node.id, node.status, detail);
    }
    Ok(())
}
