use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use policylens_core::AnalyzeOptions;
use policylens_host::{AnalysisClient, PoolConfig};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "policylens", version, about = "Local privacy-policy pre-analysis")]
struct Cli {
    /// Per-task timeout in milliseconds (overrides the config file).
    #[arg(long, env = "POLICYLENS_TIMEOUT_MS", global = true)]
    timeout_ms: Option<u64>,

    /// JSON pool configuration file.
    #[arg(long, env = "POLICYLENS_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Pretty-print JSON output.
    #[arg(long, global = true)]
    pretty: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Word count, readability, key terms, data-collection patterns, risk indicators.
    Analyze {
        #[command(flatten)]
        input: Input,
        /// Skip the readability score.
        #[arg(long)]
        no_readability: bool,
        /// Skip key-term extraction.
        #[arg(long)]
        no_key_terms: bool,
    },
    /// Extract risk-bearing clauses.
    Clauses {
        #[command(flatten)]
        input: Input,
    },
    /// Extract clauses and score them.
    Risk {
        #[command(flatten)]
        input: Input,
    },
    /// Analysis, clauses and risk score in one document.
    Report {
        #[command(flatten)]
        input: Input,
    },
}

#[derive(Args)]
struct Input {
    /// Policy text file; reads stdin when omitted.
    path: Option<PathBuf>,
}

impl Input {
    fn read(&self) -> anyhow::Result<String> {
        match &self.path {
            Some(path) => std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display())),
            None => {
                let mut text = String::new();
                std::io::stdin()
                    .read_to_string(&mut text)
                    .context("reading policy text from stdin")?;
                Ok(text)
            }
        }
    }
}

fn load_config(path: Option<&Path>, timeout_ms: Option<u64>) -> anyhow::Result<PoolConfig> {
    let mut config = match path {
        Some(path) => PoolConfig::load(path)?,
        None => PoolConfig::default(),
    };
    if let Some(ms) = timeout_ms {
        config.default_timeout_ms = ms;
    }
    Ok(config)
}

fn emit<T: Serialize>(value: &T, pretty: bool) -> anyhow::Result<()> {
    let out = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{out}");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref(), cli.timeout_ms)?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        timeout_ms = config.default_timeout_ms,
        "policylens starting"
    );

    let client = AnalysisClient::with_config(config);
    let result = run(&client, cli.command, cli.pretty).await;
    client.pool().shutdown();
    result
}

async fn run(client: &AnalysisClient, command: Command, pretty: bool) -> anyhow::Result<()> {
    match command {
        Command::Analyze {
            input,
            no_readability,
            no_key_terms,
        } => {
            let text = input.read()?;
            let options = AnalyzeOptions {
                include_readability: !no_readability,
                extract_key_terms: !no_key_terms,
            };
            let analysis = client
                .analyze_policy_text(&text, Some(options))
                .await
                .context("analyzing policy text")?;
            emit(&analysis, pretty)
        }
        Command::Clauses { input } => {
            let text = input.read()?;
            let clauses = client
                .extract_clauses(&text)
                .await
                .context("extracting clauses")?;
            emit(&clauses, pretty)
        }
        Command::Risk { input } => {
            let text = input.read()?;
            let clauses = client
                .extract_clauses(&text)
                .await
                .context("extracting clauses")?;
            let risk = client
                .calculate_risk_score(&clauses, None)
                .await
                .context("scoring clauses")?;
            emit(&risk, pretty)
        }
        Command::Report { input } => {
            let text = input.read()?;
            let (analysis, clauses) = tokio::try_join!(
                client.analyze_policy_text(&text, None),
                client.extract_clauses(&text),
            )
            .context("analyzing policy text")?;
            let risk = client
                .calculate_risk_score(&clauses, None)
                .await
                .context("scoring clauses")?;
            emit(
                &serde_json::json!({
                    "analysis": analysis,
                    "clauses": clauses,
                    "risk": risk,
                }),
                pretty,
            )
        }
    }
}
