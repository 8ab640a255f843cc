//! # Loomflow
//!
//! Schedule-trigger engine for Loomflow production automation flows.
//!
//! Usage:
//!   loomflow run                                  # Start the driver loop
//!   loomflow tick                                 # Evaluate one tick and exit
//!   loomflow add --name NAME --cron "0 6 * * *"   # Add a scheduled flow
//!   loomflow list                                 # Show flows and last runs
//!   loomflow upcoming --hours 24                  # Preview upcoming fires
//!   loomflow check "*/15 9-17 * * 1-5"            # Preview an expression

use std::sync::Arc;

use anyhow::{Result, bail};
use chrono::Local;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use loomflow_core::config::LoomflowConfig;
use loomflow_core::traits::{FlowExecutor, FlowStore};
use loomflow_core::types::{Flow, FlowFilter, FlowStatus};
use loomflow_cron::{next_match, parse_cron_parts};
use loomflow_scheduler::{LogExecutor, ScheduleDriver, SqliteFlowStore, WebhookExecutor, run_driver};

#[derive(Parser)]
#[command(
    name = "loomflow",
    version,
    about = "🧵 Loomflow — schedule-trigger engine for automation flows"
)]
struct Cli {
    /// Config file path
    #[arg(long, default_value = "~/.loomflow/config.toml")]
    config: String,

    /// Flow database path (overrides config)
    #[arg(long)]
    db: Option<String>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the schedule driver loop
    Run,
    /// Evaluate a single tick and exit
    Tick,
    /// Add a schedule-triggered flow
    Add {
        /// Flow name
        #[arg(long)]
        name: String,
        /// Cron expression (5 fields: MIN HOUR DOM MON DOW)
        #[arg(long)]
        cron: String,
    },
    /// List flows with their last run state
    List,
    /// Activate a flow
    Enable { id: String },
    /// Pause a flow
    Disable { id: String },
    /// Remove a flow
    Remove { id: String },
    /// Preview upcoming fire times for active flows
    Upcoming {
        /// Look-ahead window in hours
        #[arg(long, default_value = "24")]
        hours: i64,
    },
    /// Preview upcoming matches for a cron expression
    Check {
        expr: String,
        /// Number of matches to show
        #[arg(long, default_value = "5")]
        count: usize,
    },
}

fn expand_path(p: &str) -> String {
    shellexpand::tilde(p).to_string()
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    // `check` needs no config or store
    if let Command::Check { expr, count } = &cli.command {
        return check_expression(expr, *count);
    }

    let config_path = expand_path(&cli.config);
    let config = if std::path::Path::new(&config_path).exists() {
        LoomflowConfig::load_from(std::path::Path::new(&config_path))?
    } else {
        LoomflowConfig::default()
    };

    let db_path = expand_path(cli.db.as_deref().unwrap_or(&config.db_path));
    let store: Arc<SqliteFlowStore> =
        Arc::new(SqliteFlowStore::open(std::path::Path::new(&db_path))?);

    let executor: Arc<dyn FlowExecutor> = match WebhookExecutor::from_config(&config.executor) {
        Some(webhook) => Arc::new(webhook),
        None => {
            tracing::info!("No executor endpoint configured; triggered flows will be logged");
            Arc::new(LogExecutor)
        }
    };

    match cli.command {
        Command::Run => {
            let driver = Arc::new(ScheduleDriver::new(store, executor));
            run_driver(driver, config.scheduler.tick_secs).await;
        }
        Command::Tick => {
            let driver = ScheduleDriver::new(store, executor);
            let report = driver.tick().await;
            println!(
                "Tick {}: {} evaluated, {} fired, {} failed, {} skipped",
                report.minute_key, report.evaluated, report.fired, report.failed, report.skipped
            );
        }
        Command::Add { name, cron } => {
            if parse_cron_parts(&cron).is_none() {
                bail!("Invalid cron expression '{cron}' (need 5 fields: MIN HOUR DOM MON DOW)");
            }
            let flow = Flow::scheduled(&name, &cron);
            store.insert_flow(&flow).await?;
            println!("✅ Flow added: {} ({})", flow.name, flow.id);
            match next_match(&cron, Local::now()) {
                Some(next) => println!("   Next fire: {}", next.format("%Y-%m-%d %H:%M")),
                None => println!("   ⚠️  Expression never matches, flow will not fire"),
            }
        }
        Command::List => {
            let flows = store.list_flows(&FlowFilter::default()).await?;
            if flows.is_empty() {
                println!("No flows.");
            }
            for flow in flows {
                let state = flow.schedule_state();
                let last = match (&state.last_run_minute_key, &state.last_status) {
                    (Some(key), Some(status)) => format!("last {key} ({status:?})"),
                    _ => "never fired".to_string(),
                };
                println!(
                    "{}  [{}]  '{}'  cron={}  {}",
                    flow.id,
                    flow.status,
                    flow.name,
                    flow.cron().unwrap_or("-"),
                    last
                );
                if let Some(error) = &state.last_error {
                    println!("    ⚠️  {error}");
                }
            }
        }
        Command::Enable { id } => {
            if !store.set_status(&id, FlowStatus::Active).await? {
                bail!("Flow '{id}' not found");
            }
            println!("✅ Flow '{id}' activated");
        }
        Command::Disable { id } => {
            if !store.set_status(&id, FlowStatus::Paused).await? {
                bail!("Flow '{id}' not found");
            }
            println!("⏸️  Flow '{id}' paused");
        }
        Command::Remove { id } => {
            if !store.delete_flow(&id).await? {
                bail!("Flow '{id}' not found");
            }
            println!("🗑️  Flow '{id}' removed");
        }
        Command::Upcoming { hours } => {
            let flows = store.list_flows(&FlowFilter::scheduled_active()).await?;
            let now = Local::now();
            let end = now + chrono::Duration::hours(hours);
            let mut preview = Vec::new();
            for flow in &flows {
                let Some(cron) = flow.cron() else { continue };
                if let Some(next) = next_match(cron, now)
                    && next <= end
                {
                    preview.push((next, flow.name.clone()));
                }
            }
            preview.sort();
            if preview.is_empty() {
                println!("Nothing scheduled in the next {hours}h.");
            }
            for (at, name) in preview {
                println!("{}  {}", at.format("%Y-%m-%d %H:%M"), name);
            }
        }
        Command::Check { .. } => unreachable!("handled above"),
    }

    Ok(())
}

fn check_expression(expr: &str, count: usize) -> Result<()> {
    if parse_cron_parts(expr).is_none() {
        bail!("Invalid cron expression '{expr}' (need 5 fields: MIN HOUR DOM MON DOW)");
    }
    let mut after = Local::now();
    for _ in 0..count {
        match next_match(expr, after) {
            Some(next) => {
                println!("{}", next.format("%Y-%m-%d %H:%M"));
                after = next;
            }
            None => {
                println!("⚠️  No match within the next year.");
                break;
            }
        }
    }
    Ok(())
}
