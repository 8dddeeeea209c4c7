//! qrflow - drive the generation orchestrator from an edit script

mod output;
mod script;

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result};
use clap::Parser;
use libqrflow::adapters::{
    Generator, HttpGenerator, HttpValidator, MockGenerator, MockValidator, Validator,
};
use libqrflow::logging::LoggingConfig;
use libqrflow::{Config, Orchestrator, QrflowError};
use tokio::sync::broadcast::error::RecvError;

use crate::output::{render_notification, render_snapshot, OutputFormat};
use crate::script::{parse_script, Command};

#[derive(Parser, Debug)]
#[command(name = "qrflow")]
#[command(version, about = "Drive the QR/barcode generation orchestrator from an edit script")]
#[command(long_about = r#"Feed a script of editor actions to the generation orchestrator and
print every state transition it makes.

SCRIPT COMMANDS (one per line, # starts a comment):
    form <field> <value...>    Edit a form field
    options <json>             Merge rendering options, e.g. {"size": 400}
    type <kind>                Switch artifact family (qrcode, code128, ean13, ...)
    generate                   Generate now
    anyway                     Generate despite a negative validation
    reset                      Back to the seeded defaults
    intent on|off [duration]   Report editing intent, optionally a new debounce
    wait <duration>            Pause the script, e.g. 850ms or 2s
    state                      Print the current snapshot

EXAMPLES:
    # Offline run against mock adapters
    printf 'form url https://example.com\n' | qrflow --mock

    # Against a local rendering backend, JSON lines for jq
    qrflow --script edits.txt --backend http://localhost:3004 --format json

EXIT CODES:
    0 - Script ran to completion
    1 - Configuration or runtime error
    3 - Invalid script
"#)]
struct Cli {
    /// Script file (reads from stdin if not provided)
    #[arg(short, long, value_name = "FILE")]
    script: Option<PathBuf>,

    /// Configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Use mock adapters instead of the HTTP backend
    #[arg(long)]
    mock: bool,

    /// Rendering backend base URL (overrides the config file)
    #[arg(long, value_name = "URL")]
    backend: Option<String>,

    /// Output format
    #[arg(short, long, default_value = "text", value_name = "FORMAT")]
    #[arg(value_parser = ["text", "json"])]
    format: String,

    /// How long to wait for pending effects after the script ends
    #[arg(long, default_value = "30s", value_name = "DURATION")]
    #[arg(value_parser = humantime::parse_duration)]
    grace: Duration,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut logging = LoggingConfig::from_env();
    logging.verbose = cli.verbose;
    logging.init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        let code = e
            .downcast_ref::<QrflowError>()
            .map_or(1, QrflowError::exit_code);
        std::process::exit(code);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let format: OutputFormat = cli.format.parse().map_err(QrflowError::InvalidInput)?;

    let mut config = match &cli.config {
        Some(path) => Config::load_from_path(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => Config::load_or_default().context("Failed to load configuration")?,
    };
    if let Some(url) = cli.backend {
        config.backend.base_url = url;
    }

    // Parse up front so a bad script never starts the orchestrator
    let source = read_script(cli.script.as_ref())?;
    let commands = parse_script(&source)?;
    tracing::debug!(commands = commands.len(), "Script parsed");

    let (validator, generator): (Arc<dyn Validator>, Arc<dyn Generator>) = if cli.mock {
        (
            Arc::new(MockValidator::valid()),
            Arc::new(MockGenerator::success()),
        )
    } else {
        tracing::info!(backend = %config.backend.base_url, "Using HTTP backend");
        (
            Arc::new(HttpValidator::new(&config.backend)),
            Arc::new(HttpGenerator::new(&config.backend)),
        )
    };

    let orchestrator = Orchestrator::from_config(&config, validator, generator).await;

    let mut notifications = orchestrator.subscribe();
    let printer = tokio::spawn(async move {
        loop {
            match notifications.recv().await {
                Ok(notification) => {
                    println!(
                        "{}",
                        render_notification(format, &notification, chrono::Local::now())
                    );
                }
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "Output fell behind, notifications skipped");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    for command in commands {
        execute(&orchestrator, command, format).await?;
    }

    if tokio::time::timeout(cli.grace, orchestrator.settled())
        .await
        .is_err()
    {
        tracing::warn!(grace = ?cli.grace, "Orchestrator still busy, shutting down anyway");
    }

    let snapshot = orchestrator.snapshot();
    orchestrator.shutdown().await;
    if let Err(e) = printer.await {
        tracing::warn!(error = %e, "Output task ended abnormally");
    }

    println!("{}", render_snapshot(format, &snapshot, chrono::Local::now()));
    Ok(())
}

fn read_script(path: Option<&PathBuf>) -> Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read script {}", path.display())),
        None => {
            let mut source = String::new();
            std::io::stdin()
                .read_to_string(&mut source)
                .context("Failed to read script from stdin")?;
            Ok(source)
        }
    }
}

async fn execute(orchestrator: &Orchestrator, command: Command, format: OutputFormat) -> Result<()> {
    tracing::debug!(?command, "Executing");

    match command {
        Command::Form { field, value } => orchestrator.update_form(field, value)?,
        Command::Options(patch) => orchestrator.update_options(patch)?,
        Command::Type(kind) => orchestrator.change_type(kind)?,
        Command::Generate => orchestrator.generate_now()?,
        Command::Anyway => orchestrator.generate_anyway()?,
        Command::Reset => orchestrator.reset()?,
        Command::Intent { editing, debounce } => {
            let debounce_ms = debounce.map(|d| d.as_millis() as u64);
            orchestrator.set_editing_intent(editing, debounce_ms)?
        }
        Command::Wait(duration) => tokio::time::sleep(duration).await,
        Command::State => {
            println!(
                "{}",
                render_snapshot(format, &orchestrator.snapshot(), chrono::Local::now())
            );
        }
    }

    Ok(())
}
