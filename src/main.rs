// SPDX-License-Identifier: MIT

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

use kinetic_replay::replay::console::{
    ConsoleApprovalDesk, ConsoleReportSink, ConsoleSurface, FileStatusSource,
};
use kinetic_replay::replay::form::FormState;
use kinetic_replay::replay::formula::{FieldValues, Formula};
use kinetic_replay::replay::graph::GraphIndex;
use kinetic_replay::replay::loader::DocumentLoader;
use kinetic_replay::replay::trace::{ErrorSanitizer, TraceSynthesizer};
use kinetic_replay::replay::tracker::{ExecutionMonitor, TrackerEvent, WatchOutcome};
use kinetic_replay::runtime::ReplayConfig;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    /// YAML config file; environment variables are used otherwise
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Evaluate a formula against field values
    Eval {
        /// The formula, e.g. "daysBetween(start, end)"
        #[arg(short, long)]
        expr: String,

        /// JSON/YAML file with field values
        #[arg(long)]
        values: Option<PathBuf>,

        /// Field value override, as id=value (repeatable)
        #[arg(long = "set", value_parser = parse_assignment)]
        set: Vec<(String, Value)>,
    },
    /// Print the trace of an execution as JSON
    Trace {
        /// Process graph definition
        #[arg(short, long)]
        graph: PathBuf,

        /// Execution snapshot
        #[arg(short, long)]
        snapshot: PathBuf,

        /// Fine-grained step log, preferred over the snapshot
        #[arg(long)]
        steps: Option<PathBuf>,
    },
    /// Recompute derived and prefilled form fields
    Form {
        /// Form definition or list of field definitions
        #[arg(short, long)]
        fields: PathBuf,

        /// Values entered by the user
        #[arg(long)]
        values: Option<PathBuf>,

        /// Profile document used for prefill
        #[arg(long)]
        profile: Option<PathBuf>,
    },
    /// Poll a snapshot file and replay each milestone
    Watch {
        /// Process graph definition
        #[arg(short, long)]
        graph: PathBuf,

        /// Snapshot file, re-read on every poll
        #[arg(short, long)]
        snapshot: PathBuf,

        /// Step log file, re-read on every milestone
        #[arg(long)]
        steps: Option<PathBuf>,

        /// List of pending approval records
        #[arg(long)]
        approvals: Option<PathBuf>,

        /// Execution id
        #[arg(short, long)]
        execution: String,

        /// Poll interval override in milliseconds
        #[arg(long)]
        poll_interval_ms: Option<u64>,
    },
}

/// `id=value`; the value is read as JSON when it parses, as a string otherwise
fn parse_assignment(raw: &str) -> Result<(String, Value), String> {
    let (id, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected id=value, got '{}'", raw))?;
    let id = id.trim();
    if id.is_empty() {
        return Err(format!("missing field id in '{}'", raw));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((id.to_string(), value))
}

fn load_config(path: Option<&PathBuf>) -> Result<ReplayConfig> {
    let config = match path {
        Some(path) => ReplayConfig::from_yaml_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ReplayConfig::from_env().context("Invalid environment configuration")?,
    };
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let args = Args::parse();

    let mut logger = env_logger::Builder::from_default_env();
    if args.verbose {
        logger.filter_level(log::LevelFilter::Debug);
    }
    logger.init();

    let mut config = load_config(args.config.as_ref())?;
    let loader = DocumentLoader::new();

    match args.command {
        Commands::Eval { expr, values, set } => {
            let mut field_values: FieldValues = match values {
                Some(path) => loader
                    .load_values(&path)
                    .with_context(|| format!("Failed to load values {}", path.display()))?,
                None => FieldValues::new(),
            };
            field_values.extend(set);

            let formula = Formula::compile(&expr)
                .with_context(|| format!("Invalid formula '{}'", expr))?;
            println!("{}", formula.evaluate(&field_values));
        }
        Commands::Trace {
            graph,
            snapshot,
            steps,
        } => {
            let definition = loader
                .load_definition(&graph)
                .with_context(|| format!("Failed to load graph {}", graph.display()))?;
            let snapshot = loader
                .load_snapshot(&snapshot)
                .with_context(|| format!("Failed to load snapshot {}", snapshot.display()))?;
            let steps = match steps {
                Some(path) => Some(
                    loader
                        .load_steps(&path)
                        .with_context(|| format!("Failed to load steps {}", path.display()))?,
                ),
                None => None,
            };

            let index = GraphIndex::build(&definition);
            let sanitizer = ErrorSanitizer::from_config(&config);
            let trace =
                TraceSynthesizer::new(&index, &sanitizer).synthesize(&snapshot, steps.as_deref());

            log::info!("{}", trace.subtitle(snapshot.status));
            println!("{}", serde_json::to_string_pretty(&trace)?);
        }
        Commands::Form {
            fields,
            values,
            profile,
        } => {
            let form = loader
                .load_form(&fields)
                .with_context(|| format!("Failed to load fields {}", fields.display()))?;
            let mut state = FormState::new(form.fields)?;

            if let Some(path) = values {
                state.seed(&loader.load_values(&path)?);
            }
            if let Some(path) = profile {
                let filled = state.apply_prefill(&loader.load_profile(&path)?);
                log::info!("Prefilled {} field(s)", filled.len());
            }

            for id in state.missing_required() {
                eprintln!("warning: required field '{}' is empty", id);
            }
            let sorted: BTreeMap<_, _> = state.values().iter().collect();
            println!("{}", serde_json::to_string_pretty(&sorted)?);
        }
        Commands::Watch {
            graph,
            snapshot,
            steps,
            approvals,
            execution,
            poll_interval_ms,
        } => {
            if let Some(ms) = poll_interval_ms {
                config.poll_interval_ms = ms;
                config.validate()?;
            }

            let definition = loader
                .load_definition(&graph)
                .with_context(|| format!("Failed to load graph {}", graph.display()))?;
            let index = Arc::new(GraphIndex::build(&definition));

            let mut source = FileStatusSource::new(snapshot);
            if let Some(path) = steps {
                source = source.with_steps(path);
            }

            let (tx, mut rx) = mpsc::channel(32);
            let monitor = Arc::new(
                ExecutionMonitor::new(
                    Arc::new(source),
                    Arc::new(ConsoleSurface::new(config.replay_step_delay())),
                    index,
                    config.clone(),
                )
                .with_approvals(Arc::new(ConsoleApprovalDesk::new(approvals)))
                .with_reports(Arc::new(ConsoleReportSink))
                .with_events(tx),
            );

            tokio::spawn(async move {
                while let Some(event) = rx.recv().await {
                    match event {
                        TrackerEvent::StatusChanged { label, .. } => println!("Status: {}", label),
                        TrackerEvent::PollFailed { reason, .. } => {
                            log::debug!("Poll skipped: {}", reason)
                        }
                        other => log::debug!("{:?}", other),
                    }
                }
            });

            let closer = monitor.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    closer.close().await;
                }
            });

            match monitor.watch(&execution).await {
                WatchOutcome::Finished(status) => println!("Execution {} {}", execution, status),
                WatchOutcome::Cancelled => println!("Stopped watching {}", execution),
                WatchOutcome::SessionExpired => {
                    bail!("Session expired while watching {}", execution)
                }
            }
        }
    }

    Ok(())
}
