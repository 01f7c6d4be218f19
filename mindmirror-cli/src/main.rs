//! mindmirror - journal insights from the command line
//!
//! Every command reads JSON or plain text from a file (or stdin) and prints
//! its result as JSON.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mindmirror_core::analysis::generate_reflection;
use mindmirror_core::anomaly::aggregate_daily;
use mindmirror_core::clustering::parse_cluster_count;
use mindmirror_core::{
    AnomalyDetector, ClusterManager, Config, DailyMetric, JournalAnalysisAssembler,
    JournalEntrySample, MilestoneInsightsAssembler, MilestoneRequest, RateLimitedGate,
    ResilientApiInvoker,
};
use serde::Serialize;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "mindmirror")]
#[command(about = "Insights for your journal: analysis, anomalies and themes")]
#[command(version)]
struct Args {
    /// Config file (default: platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze one journal entry (plain text)
    Analyze {
        /// Entry file, or `-` for stdin
        #[arg(default_value = "-")]
        input: String,
    },
    /// Free-form reflection for a prompt
    Reflect {
        prompt: String,
    },
    /// Detect unusual days in a JSON array of daily metrics
    Anomalies {
        #[arg(default_value = "-")]
        input: String,

        /// Input is a JSON array of entries ({date, text, moodScore}) to aggregate per day
        #[arg(long)]
        entries: bool,
    },
    /// Group a JSON array of entry texts into themes
    Cluster {
        /// Owner of the stored model
        #[arg(long)]
        user: String,

        /// Requested number of themes (default from config)
        #[arg(long)]
        k: Option<String>,

        #[arg(default_value = "-")]
        input: String,
    },
    /// Progress insights for a milestone (JSON object)
    Milestone {
        #[arg(default_value = "-")]
        input: String,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("failed to load configuration")?;
    config.validate().context("invalid configuration")?;
    let _log_guard = mindmirror_core::logging::init(&config.logging).ok();
    tracing::debug!(command = ?args.command, "Starting");

    match &args.command {
        Command::Analyze { input } => {
            let text = read_input(input)?;
            if text.trim().is_empty() {
                anyhow::bail!("Journal text is required");
            }
            let record = JournalAnalysisAssembler::new(invoker(&config)?).analyze(&text);
            print_json(&record, args.pretty)
        }
        Command::Reflect { prompt } => {
            let invoker = invoker(&config)?;
            let reflection = generate_reflection(&invoker, prompt)
                .context("failed to generate a reflection")?;
            print_json(&serde_json::json!({ "reflection": reflection }), args.pretty)
        }
        Command::Anomalies { input, entries } => {
            let raw = read_input(input)?;
            let metrics: Vec<DailyMetric> = if *entries {
                let samples: Vec<JournalEntrySample> =
                    serde_json::from_str(&raw).context("invalid entries JSON")?;
                aggregate_daily(&samples)
            } else {
                serde_json::from_str(&raw).context("invalid daily metrics JSON")?
            };
            let report = AnomalyDetector::new(&config.anomaly).detect(&metrics);
            print_json(&report, args.pretty)
        }
        Command::Cluster {
            user,
            k,
            input,
        } => {
            let raw = read_input(input)?;
            let texts: Vec<String> =
                serde_json::from_str(&raw).context("expected a JSON array of entry texts")?;
            let texts: Vec<&str> = texts.iter().map(String::as_str).collect();

            let requested = k.clone().map(serde_json::Value::String);
            let requested_k =
                parse_cluster_count(requested.as_ref(), config.clustering.default_clusters);

            let manager = ClusterManager::from_config(&config)?;
            let report = manager
                .cluster_entries(user, &texts, requested_k)
                .context("clustering failed")?;
            print_json(&report, args.pretty)
        }
        Command::Milestone { input } => {
            let raw = read_input(input)?;
            let request: MilestoneRequest =
                serde_json::from_str(&raw).context("invalid milestone JSON")?;
            let insights = MilestoneInsightsAssembler::new(invoker(&config)?).insights(&request);
            print_json(&insights, args.pretty)
        }
    }
}

fn invoker(config: &Config) -> Result<Arc<ResilientApiInvoker>> {
    let gate = Arc::new(RateLimitedGate::from_config(&config.rate_limit));
    let invoker = ResilientApiInvoker::from_config(config, gate)
        .context("failed to create generative service client")?;
    Ok(Arc::new(invoker))
}

fn read_input(input: &str) -> Result<String> {
    if input == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read stdin")?;
        Ok(buf)
    } else {
        std::fs::read_to_string(input).with_context(|| format!("failed to read {input}"))
    }
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{json}");
    Ok(())
}
