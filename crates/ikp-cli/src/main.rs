//! `ikp`: check and run IKP documents from the command line.
//!
//! ```text
//! ikp check story.ikp [--json]
//! ikp run story.ikp [--start Scene] [--script steps.yaml]
//! ```
//!
//! Exit status: 0 on success, 1 when the document is invalid, 2 when a file
//! cannot be read or parsed.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use ikp_cli::{load_tree, parse_script, run_script, CheckReport, CliConfig};
use ikp_runtime::Session;
use ikp_validator::{fingerprint, validate_tree};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "ikp")]
#[command(about = "Validate and run IKP interactive documents", version)]
struct Cli {
    /// TOML config with [validator] and [session] sections
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate a document and report diagnostics
    Check {
        /// Path to a .ikp (YAML) or .json document
        file: PathBuf,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Start a session and print the rendered scene after each step
    Run {
        /// Path to a .ikp (YAML) or .json document
        file: PathBuf,
        /// Start at this scene instead of the document's start
        #[arg(long)]
        start: Option<String>,
        /// Interaction script (list of set/click/goto/back steps)
        #[arg(long)]
        script: Option<PathBuf>,
    },
}

/// Failures that map to exit status 1 rather than 2.
#[derive(Debug, thiserror::Error)]
#[error("{0} is not a valid IKP document")]
struct InvalidDocument(String);

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ikp=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let result = CliConfig::load(cli.config.as_deref()).and_then(|config| match cli.command {
        Command::Check { file, json } => check(&file, json, &config),
        Command::Run {
            file,
            start,
            script,
        } => run(&file, start, script.as_deref(), config),
    });

    match result {
        Ok(code) => code,
        Err(err) if err.is::<InvalidDocument>() => {
            error!("{err:#}");
            ExitCode::from(1)
        }
        Err(err) => {
            error!("{err:#}");
            ExitCode::from(2)
        }
    }
}

fn load(file: &Path) -> anyhow::Result<serde_json::Value> {
    load_tree(file).with_context(|| format!("failed to load {}", file.display()))
}

fn check(file: &Path, json: bool, config: &CliConfig) -> anyhow::Result<ExitCode> {
    let tree = load(file)?;
    let outcome = validate_tree(&tree, &config.validator);
    let report = CheckReport::new(file.display().to_string(), fingerprint(&tree), outcome);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report.to_text());
    }
    Ok(if report.valid {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

fn run(
    file: &Path,
    start: Option<String>,
    script: Option<&Path>,
    mut config: CliConfig,
) -> anyhow::Result<ExitCode> {
    let tree = load(file)?;
    let outcome = validate_tree(&tree, &config.validator);
    if !outcome.is_valid() {
        let report = CheckReport::new(file.display().to_string(), fingerprint(&tree), outcome);
        eprint!("{}", report.to_text());
        return Err(InvalidDocument(file.display().to_string()).into());
    }
    let Some(document) = outcome.document else {
        return Err(InvalidDocument(file.display().to_string()).into());
    };
    info!(file = %file.display(), fingerprint = %fingerprint(&tree), "document loaded");

    if start.is_some() {
        config.session.start = start;
    }
    let mut session = Session::new(Arc::new(document), config.session)?;

    let steps = match script {
        Some(path) => {
            let tree = load_tree(path)
                .with_context(|| format!("failed to load script {}", path.display()))?;
            parse_script(tree).with_context(|| format!("invalid script {}", path.display()))?
        }
        None => Vec::new(),
    };

    println!("{}", serde_json::to_string(&session.render()?)?);
    for report in run_script(&mut session, &steps)? {
        println!("{}", serde_json::to_string(&report)?);
    }
    session.terminate();
    Ok(ExitCode::SUCCESS)
}
