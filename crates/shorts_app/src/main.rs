//! Daily shorts pipeline CLI.
//!
//! Invoked once per trigger (cron, CI): resolves the topic, runs the
//! pipeline, and maps the outcome to an exit code. Credentials come from
//! the environment; everything else from the TOML config.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;

use shorts_core::config::ConfigManager;
use shorts_core::models::Topic;
use shorts_core::notify::{Notifier, WebhookNotifier};
use shorts_core::orchestrator::PipelineError;
use shorts_core::runner::{default_run_id, PipelineRunner, RunOutcome};
use shorts_core::schedule;

#[derive(Parser, Debug)]
#[command(name = "shorts", version, about = "Produce and publish one short video")]
struct Args {
    /// Path to the TOML config file (created with defaults if absent).
    #[arg(long, default_value = "shorts.toml")]
    config: PathBuf,

    /// Override the topic text instead of using the schedule.
    #[arg(long)]
    topic: Option<String>,

    /// Category for an overridden topic.
    #[arg(long, default_value = "General")]
    category: String,

    /// Use the trending feed instead of the rotation schedule.
    #[arg(long)]
    trending: bool,

    /// Override the run id (default: one per calendar day).
    #[arg(long)]
    run_id: Option<String>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match run(Args::parse()) {
        Ok(outcome) => match outcome {
            RunOutcome::Done { publish, report } => {
                println!("Published: {}", publish.url);
                if !report.fully_clean() {
                    println!("Degraded stages: {}", report.stages_degraded.join(", "));
                }
                ExitCode::SUCCESS
            }
            RunOutcome::Failed {
                failed_stage,
                errors,
            } => {
                eprintln!("Run failed at stage '{}':", failed_stage);
                for error in errors {
                    eprintln!("  [{}] {}: {}", error.stage, error.provider_id, error.message);
                }
                ExitCode::FAILURE
            }
        },
        Err(e) => {
            // Duplicate runs are a refusal, not a production failure:
            // the daily trigger may fire twice.
            if let Some(PipelineError::DuplicateRun { run_id, stage }) =
                e.downcast_ref::<PipelineError>()
            {
                eprintln!("Run '{}' already exists (stage: {}), nothing to do", run_id, stage);
                return ExitCode::SUCCESS;
            }
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> anyhow::Result<RunOutcome> {
    let mut manager = ConfigManager::new(&args.config);
    manager
        .load_or_create()
        .with_context(|| format!("loading config from {}", args.config.display()))?;
    manager.ensure_dirs_exist().context("creating directories")?;

    let settings = manager.settings().clone();
    let today = chrono::Local::now().date_naive();

    let topic = resolve_topic(&args, &settings)?;
    let run_id = args
        .run_id
        .clone()
        .unwrap_or_else(|| default_run_id(today));

    tracing::info!(%run_id, topic = %topic.text, category = %topic.category, "trigger");

    let notifier: Option<Box<dyn Notifier>> = settings.notify.webhook_url.as_ref().map(|url| {
        Box::new(WebhookNotifier::new(
            url,
            Duration::from_secs(settings.notify.timeout_secs),
        )) as Box<dyn Notifier>
    });

    let runner = PipelineRunner::new(settings);
    let outcome = runner.run(&run_id, topic, notifier.as_deref(), None)?;
    Ok(outcome)
}

/// Resolve the run's topic: override > trending > weekday rotation.
fn resolve_topic(args: &Args, settings: &shorts_core::config::Settings) -> anyhow::Result<Topic> {
    if let Some(ref text) = args.topic {
        if text.trim().is_empty() {
            bail!("--topic must not be empty");
        }
        return Ok(Topic::override_topic(text, &args.category));
    }

    if args.trending {
        let topic = schedule::trending_topic(&settings.schedule, Duration::from_secs(30))
            .context("fetching trending topics")?;
        return Ok(topic);
    }

    let today = chrono::Local::now().date_naive();
    schedule::scheduled_topic(&settings.schedule.rotation, today)
        .context("picking the scheduled topic")
}
