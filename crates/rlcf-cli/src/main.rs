//! RLCF CLI - Command-line interface for the aggregation engine

mod dataset;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use rlcf_authority::AuthorityCalculator;
use rlcf_core::{
    reconcile_task, AggregationError, AggregationResult, AggregationSettings, Aggregator,
    HandlerRegistry, ReconcileError, RlcfConfig,
};
use rlcf_store::{CredentialLevel, FeedbackStore, Storage, TaskStatus};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rlcf")]
#[command(about = "RLCF - Authority-weighted aggregation of community feedback")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Database path, overriding the configuration
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import users, tasks, responses and feedback from a JSON dataset
    Import {
        /// Dataset file
        file: PathBuf,
    },
    /// Aggregate the feedback of one or more tasks
    Aggregate {
        /// Task ids
        #[arg(required = true)]
        task_ids: Vec<u64>,

        /// Move successfully aggregated tasks to AGGREGATED
        #[arg(long)]
        mark_aggregated: bool,

        /// Per-task timeout in seconds
        #[arg(long, default_value_t = 30)]
        timeout_secs: u64,
    },
    /// Inspect or update evaluator authority
    Authority {
        #[command(subcommand)]
        command: AuthorityCommands,
    },
    /// Validate the configuration and print it
    Check,
    /// Show record counts
    Status,
}

#[derive(Subcommand)]
enum AuthorityCommands {
    /// Show a user's authority, optionally scoped to a domain or level
    Show {
        user_id: u64,
        #[arg(long)]
        domain: Option<String>,
        #[arg(long)]
        level: Option<CredentialLevel>,
    },
    /// Record one evaluated contribution
    Update {
        user_id: u64,
        #[arg(long)]
        quality: f64,
        #[arg(long)]
        agreement: f64,
    },
    /// Update every evaluator of a task from peer agreement
    Reconcile { task_id: u64 },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = match &cli.config {
        Some(path) => RlcfConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => RlcfConfig::default(),
    };
    if let Some(db) = cli.db {
        config.storage.db_path = db;
    }

    if let Commands::Check = cli.command {
        config.validate()?;
        print!("{}", toml::to_string_pretty(&config)?);
        return Ok(());
    }

    let storage = Storage::open(&config.storage.db_path)
        .with_context(|| format!("opening database {}", config.storage.db_path.display()))?;

    match cli.command {
        Commands::Check => {}
        Commands::Status => {
            println!("{}", serde_json::to_string_pretty(&storage.stats())?);
        }
        Commands::Import { file } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("reading dataset {}", file.display()))?;
            let parsed: dataset::Dataset = serde_json::from_str(&text)
                .with_context(|| format!("parsing dataset {}", file.display()))?;
            let calculator = AuthorityCalculator::new(
                &storage,
                config.authority_weights()?,
                config.track_record()?,
            );
            let report = dataset::import(&storage, &calculator, parsed)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Aggregate {
            task_ids,
            mark_aggregated,
            timeout_secs,
        } => {
            aggregate(
                &storage,
                &config,
                task_ids,
                mark_aggregated,
                Duration::from_secs(timeout_secs),
            )
            .await?;
        }
        Commands::Authority { command } => {
            let calculator = AuthorityCalculator::new(
                storage.clone(),
                config.authority_weights()?,
                config.track_record()?,
            );
            match command {
                AuthorityCommands::Show {
                    user_id,
                    domain,
                    level,
                } => {
                    let authority = calculator.get_authority(user_id, level, domain.as_deref())?;
                    println!(
                        "{}",
                        serde_json::json!({ "user_id": user_id, "authority": authority })
                    );
                }
                AuthorityCommands::Update {
                    user_id,
                    quality,
                    agreement,
                } => {
                    let updated = calculator.update_authority(user_id, quality, agreement)?;
                    println!("{}", serde_json::to_string_pretty(&updated)?);
                }
                AuthorityCommands::Reconcile { task_id } => {
                    match reconcile_task(&storage, &calculator, task_id) {
                        Ok(updates) => println!("{}", serde_json::to_string_pretty(&updates)?),
                        Err(ReconcileError::Aggregation(err)) => bail!(describe(&err)),
                        Err(err) => return Err(err.into()),
                    }
                }
            }
        }
    }

    storage.flush()?;
    Ok(())
}

/// Aggregates tasks in parallel, printing one JSON result per line in
/// argument order.
async fn aggregate(
    storage: &Storage,
    config: &RlcfConfig,
    task_ids: Vec<u64>,
    mark_aggregated: bool,
    timeout: Duration,
) -> anyhow::Result<()> {
    let aggregator = Aggregator::new(
        storage.clone(),
        Arc::new(HandlerRegistry::default_registry()),
        AggregationSettings::from(config),
    );

    let jobs: Vec<_> = task_ids
        .into_iter()
        .map(|task_id| {
            let aggregator = aggregator.clone();
            let job = tokio::task::spawn_blocking(move || aggregator.aggregate(task_id));
            (task_id, tokio::time::timeout(timeout, job))
        })
        .collect();

    for (task_id, job) in jobs {
        let outcome = job
            .await
            .with_context(|| format!("task {} timed out after {:?}", task_id, timeout))?
            .context("aggregation task failed")?;

        match &outcome {
            Ok(_) if mark_aggregated => mark(storage, task_id)?,
            Err(err) => warn!(task_id, "{}", describe(err)),
            Ok(_) => {}
        }
        println!("{}", serde_json::to_string(&AggregationResult::from(outcome))?);
    }
    Ok(())
}

fn mark(storage: &Storage, task_id: u64) -> anyhow::Result<()> {
    let current = storage
        .get_task(task_id)?
        .with_context(|| format!("task {} disappeared", task_id))?;
    if current.status == TaskStatus::Aggregated {
        return Ok(());
    }
    storage
        .set_task_status(task_id, TaskStatus::Aggregated)
        .with_context(|| format!("marking task {} aggregated", task_id))?;
    info!(task_id, "task marked aggregated");
    Ok(())
}

/// Actionable message for aggregation failures.
fn describe(err: &AggregationError) -> String {
    match err {
        AggregationError::NotFound(id) => {
            format!("task {} does not exist; check the id or run `rlcf import` first", id)
        }
        AggregationError::NoFeedback(id) => format!(
            "task {} has no feedback yet; collect evaluations before aggregating",
            id
        ),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_aggregate() {
        let cli = Cli::try_parse_from([
            "rlcf",
            "--db",
            "/tmp/x",
            "aggregate",
            "1",
            "2",
            "--mark-aggregated",
        ])
        .unwrap();
        assert_eq!(cli.db, Some(PathBuf::from("/tmp/x")));
        match cli.command {
            Commands::Aggregate {
                task_ids,
                mark_aggregated,
                timeout_secs,
            } => {
                assert_eq!(task_ids, vec![1, 2]);
                assert!(mark_aggregated);
                assert_eq!(timeout_secs, 30);
            }
            _ => panic!("expected aggregate"),
        }
    }

    #[test]
    fn test_cli_parses_authority_show() {
        let cli =
            Cli::try_parse_from(["rlcf", "authority", "show", "7", "--level", "expert"]).unwrap();
        match cli.command {
            Commands::Authority {
                command:
                    AuthorityCommands::Show {
                        user_id,
                        level,
                        domain,
                    },
            } => {
                assert_eq!(user_id, 7);
                assert_eq!(level, Some(CredentialLevel::Expert));
                assert!(domain.is_none());
            }
            _ => panic!("expected authority show"),
        }
    }

    #[test]
    fn test_aggregate_requires_ids() {
        assert!(Cli::try_parse_from(["rlcf", "aggregate"]).is_err());
    }

    #[test]
    fn test_describe_is_actionable() {
        assert!(describe(&AggregationError::NotFound(3)).contains("rlcf import"));
        assert!(describe(&AggregationError::NoFeedback(3)).contains("no feedback"));
    }

    #[tokio::test]
    async fn test_aggregate_marks_tasks() {
        use rlcf_store::{NewFeedback, NewUser, TaskType};
        use serde_json::json;

        let storage = Storage::temporary().unwrap();
        let user = storage.create_user(NewUser::new("ada").with_authority(0.9)).unwrap();
        let task = storage.create_task(TaskType::Nli, Default::default()).unwrap();
        let response = storage.create_response(task.id, Default::default(), "m").unwrap();
        storage
            .submit_feedback(NewFeedback::new(
                response.id,
                user.id,
                json!({ "chosen_label": "entailment" }).as_object().cloned().unwrap(),
            ))
            .unwrap();
        storage.set_task_status(task.id, TaskStatus::BlindEvaluation).unwrap();

        aggregate(
            &storage,
            &RlcfConfig::default(),
            vec![task.id, 999],
            true,
            Duration::from_secs(5),
        )
        .await
        .unwrap();

        let stored = storage.get_task(task.id).unwrap().unwrap();
        assert_eq!(stored.status, TaskStatus::Aggregated);
    }
}
