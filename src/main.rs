#![forbid(unsafe_code)]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;
use tracing::{info, warn, Level as TraceLevel};
use tracing_subscriber::FmtSubscriber;

use declutter::config::merge::{get_path, leaf_paths};
use declutter::config::FileStorage;
use declutter::watcher::Trigger;
use declutter::{stylesheet, version, Document, Orchestrator, SemanticTarget};

#[derive(Parser)]
#[command(name = "declutter", version, about = "Hide and restyle regions of a web UI without stable markup")]
struct App {
    /// Settings directory (defaults to the platform config dir)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one pass over a document snapshot
    Apply {
        /// JSON snapshot of the rendered page
        #[arg(long)]
        tree: PathBuf,
        /// Write the resulting snapshot here
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print the style fragment for the current settings
    Stylesheet,
    /// View or modify settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// List semantic targets and their strategies
    Targets,
    /// Print the version
    Version,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the full settings tree
    Show {
        /// One `path = value` line per leaf
        #[arg(long)]
        flat: bool,
    },
    /// Print one value by dot path (e.g. liveUI.showGifts)
    Get { path: String },
    /// Set one leaf; the value is JSON, bare words are taken as strings
    Set { path: String, value: String },
    /// Restore defaults
    Reset,
    /// Print the settings as importable text
    Export,
    /// Replace the settings with an exported file
    Import { file: PathBuf },
}

fn main() -> Result<()> {
    // Parse log level from environment variable
    let log_level = match std::env::var("LOG_LEVEL")
        .unwrap_or_else(|_| "info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => TraceLevel::TRACE,
        "debug" => TraceLevel::DEBUG,
        "warn" => TraceLevel::WARN,
        "error" => TraceLevel::ERROR,
        _ => TraceLevel::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to install log subscriber")?;

    let app = App::parse();
    let storage = match app.config_dir {
        Some(dir) => FileStorage::new(dir),
        None => FileStorage::default_location(),
    };
    info!(dir = %storage.dir().display(), "Using settings directory");
    let mut orchestrator = Orchestrator::new(storage)?;

    let result = run(app.command, &mut orchestrator);
    for notice in orchestrator.take_notices() {
        warn!(level = ?notice.level, "{}", notice.message);
    }
    result
}

fn run(command: Commands, orchestrator: &mut Orchestrator<FileStorage>) -> Result<()> {
    match command {
        Commands::Apply { tree, output } => {
            let contents = std::fs::read_to_string(&tree)
                .with_context(|| format!("Failed to read snapshot {}", tree.display()))?;
            let mut doc = Document::from_json(&contents)?;
            let report = orchestrator.run_pass(&mut doc, Trigger::Initial);
            println!("{}", serde_json::to_string_pretty(&report).context("Failed to serialize report")?);
            if let Some(output) = output {
                std::fs::write(&output, doc.to_json_pretty()?)
                    .with_context(|| format!("Failed to write snapshot {}", output.display()))?;
                info!(path = %output.display(), "Wrote updated snapshot");
            }
        }
        Commands::Stylesheet => print!("{}", stylesheet::render(orchestrator.settings())),
        Commands::Config { action } => config_command(action, orchestrator)?,
        Commands::Targets => {
            for target in SemanticTarget::ALL {
                println!("{target} ({:?}) -> {}", target.surface(), target.config_path());
                for strategy in orchestrator.catalog().strategies(target) {
                    println!(
                        "    {:<22} {:?} priority={} combine={:?}",
                        strategy.name,
                        strategy.kind(),
                        strategy.priority,
                        strategy.combine()
                    );
                }
            }
        }
        Commands::Version => println!("declutter {}", version::CURRENT),
    }
    Ok(())
}

fn config_command(action: ConfigAction, orchestrator: &mut Orchestrator<FileStorage>) -> Result<()> {
    match action {
        ConfigAction::Show { flat: false } => {
            println!("{}", serde_json::to_string_pretty(orchestrator.get_config())?);
        }
        ConfigAction::Show { flat: true } => {
            let tree = orchestrator.get_config();
            for path in leaf_paths(tree) {
                if let Some(value) = get_path(tree, &path) {
                    println!("{path} = {value}");
                }
            }
        }
        ConfigAction::Get { path } => {
            let value = get_path(orchestrator.get_config(), &path)
                .with_context(|| format!("No settings value at '{path}'"))?;
            println!("{value}");
        }
        ConfigAction::Set { path, value } => {
            let value = serde_json::from_str(&value).unwrap_or(Value::String(value));
            orchestrator.set_leaf(&path, value)?;
            info!(path = %path, "Setting updated");
        }
        ConfigAction::Reset => orchestrator.reset_to_defaults(),
        ConfigAction::Export => println!("{}", orchestrator.export_as_text()?),
        ConfigAction::Import { file } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            orchestrator.import_from_text(&text)?;
        }
    }
    Ok(())
}
