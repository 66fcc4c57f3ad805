//! # HemoScan CLI Tool
//!
//! Command-line interface for driving the blood smear workflow: inspect the
//! action a document offers, run it, approve reports and inspect configuration.

use anyhow::{bail, Context};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use hemoscan_core::client::FrappeClient;
use hemoscan_core::config::{ClassificationMode, ConfigManager};
use hemoscan_core::error::WorkflowError;
use hemoscan_core::events::{ClassificationWatcher, EventPublisher};
use hemoscan_core::logging::init_structured_logging;
use hemoscan_core::orchestration::{
    ActionInvoker, ApprovalOutcome, ConsolePresenter, OutcomeDetail, Resolution, SessionContext,
    StageResolver,
};
use hemoscan_core::state_machine::ActionKind;

#[derive(Parser, Debug)]
#[command(name = "hemoscan")]
#[command(about = "Command-line interface for the blood smear analysis workflow")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Configuration file path (default: ./hemoscan.toml or ./config/hemoscan.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose output level (use multiple times for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Output format (text, json)
    #[arg(long, default_value = "text")]
    format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Show the action a blood smear image currently offers
    Next {
        /// Blood Smear Image name
        #[arg(value_name = "BLOOD_SMEAR")]
        blood_smear: String,
    },
    /// Resolve and run the action a blood smear image currently offers
    Run {
        /// Blood Smear Image name
        #[arg(value_name = "BLOOD_SMEAR")]
        blood_smear: String,
        /// Acting user
        #[arg(short, long, env = "HEMOSCAN_USER", default_value = "Administrator")]
        user: String,
    },
    /// Approve an RBC Morphology Analysis report
    Approve {
        /// Report name
        #[arg(value_name = "REPORT")]
        report: String,
        /// Approving user
        #[arg(short, long, env = "HEMOSCAN_USER")]
        user: String,
        /// Approval date (YYYY-MM-DD, default: today)
        #[arg(short, long)]
        date: Option<NaiveDate>,
    },
    /// Configuration management
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Show the effective configuration with credentials masked
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let manager = ConfigManager::load_from_file(cli.config.as_deref())
        .context("failed to load configuration")?;

    let mut logging = manager.config().logging.clone();
    match cli.verbose {
        0 => {}
        1 => logging.level = Some("info".to_string()),
        2 => logging.level = Some("debug".to_string()),
        _ => logging.level = Some("trace".to_string()),
    }
    init_structured_logging(&logging);

    info!(
        environment = %manager.environment(),
        base_url = %manager.config().backend.base_url,
        "HemoScan CLI starting"
    );

    match cli.command {
        Commands::Next { blood_smear } => next(&manager, &blood_smear, &cli.format).await,
        Commands::Run { blood_smear, user } => run(&manager, &blood_smear, &user, &cli.format).await,
        Commands::Approve { report, user, date } => {
            let session = match date {
                Some(date) => SessionContext::new(user, date),
                None => SessionContext::today_for(user),
            };
            approve(&manager, &report, &session, &cli.format).await
        }
        Commands::Config(ConfigCommands::Show) => {
            println!("environment: {}", manager.environment());
            if let Some(path) = manager.config_file() {
                println!("config file: {}", path.display());
            }
            println!("{}", serde_json::to_string_pretty(&manager.debug_config())?);
            Ok(())
        }
    }
}

async fn next(manager: &ConfigManager, blood_smear: &str, format: &str) -> anyhow::Result<()> {
    let client = Arc::new(FrappeClient::new(manager.config().backend.clone())?);
    let resolution = resolve(client, blood_smear).await?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&resolution)?);
        return Ok(());
    }

    let actions = resolution.actions();
    if actions.is_empty() {
        println!("{blood_smear}: no action available");
    }
    for action in actions {
        println!(
            "{}: {} ({})",
            blood_smear,
            action.label(),
            resolution.target_of(action).unwrap_or("-")
        );
    }
    Ok(())
}

async fn run(
    manager: &ConfigManager,
    blood_smear: &str,
    user: &str,
    format: &str,
) -> anyhow::Result<()> {
    let config = manager.config();
    let client = Arc::new(FrappeClient::new(config.backend.clone())?);
    let resolution = resolve(client.clone(), blood_smear).await?;

    let action = resolution.next_action();
    let Some(target) = resolution.target_of(action).map(str::to_string) else {
        bail!("{blood_smear}: no action available");
    };

    let session = SessionContext::today_for(user);
    if action == ActionKind::Approve {
        return approve(manager, &target, &session, format).await;
    }

    let publisher = EventPublisher::default();
    let invoker = ActionInvoker::new(
        client.clone(),
        client.clone(),
        Arc::new(ConsolePresenter),
        config,
    )
    .with_event_publisher(publisher.clone());

    // The CLI has no realtime socket; poll the store for classification completion
    let watcher = (action == ActionKind::Classify
        && config.classification.mode == ClassificationMode::Queued)
        .then(|| {
            ClassificationWatcher::new(client.clone(), publisher, config.classification.poll_interval())
                .spawn(target.clone())
        });

    let result = invoker.invoke(action, &target, &session).await;
    if let Some(watcher) = watcher {
        watcher.abort();
    }

    let outcome = result.map_err(user_facing)?;
    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    }
    Ok(())
}

async fn approve(
    manager: &ConfigManager,
    report: &str,
    session: &SessionContext,
    format: &str,
) -> anyhow::Result<()> {
    let config = manager.config();
    let client = Arc::new(FrappeClient::new(config.backend.clone())?);
    let invoker = ActionInvoker::new(
        client.clone(),
        client.clone(),
        Arc::new(ConsolePresenter),
        config,
    );

    let outcome = invoker
        .invoke(ActionKind::Approve, report, session)
        .await
        .map_err(user_facing)?;
    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    }

    match &outcome.detail {
        OutcomeDetail::Approval(ApprovalOutcome::PartiallyApproved {
            transition_error, ..
        })
        | OutcomeDetail::Approval(ApprovalOutcome::Reverted {
            transition_error, ..
        }) => bail!("{report}: approval incomplete: {transition_error}"),
        OutcomeDetail::Approval(ApprovalOutcome::AlreadyApproved { report: stored }) => {
            println!(
                "{report}: already approved by {}",
                stored.approved_by.as_deref().unwrap_or("-")
            );
            Ok(())
        }
        _ => Ok(()),
    }
}

async fn resolve(client: Arc<FrappeClient>, blood_smear: &str) -> anyhow::Result<Resolution> {
    StageResolver::new(client)
        .resolve(blood_smear)
        .await
        .map_err(user_facing)
}

/// Lead with the user-facing text, keep the full error chain for `{:#}`
fn user_facing(error: WorkflowError) -> anyhow::Error {
    let message = error.user_message();
    anyhow::Error::new(error).context(message)
}
