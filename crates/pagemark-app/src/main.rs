// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pagemark — split scanned PDFs at hand-drawn highlighter marks.
//
// Entry point. Initialises logging, parses the command line, and either runs
// the folder watchers until interrupted or performs a one-shot command.

mod services;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use pagemark_core::error::{PagemarkError, Result};
use pagemark_core::{DEFAULT_PATTERN_ID, WatcherConfig};
use pagemark_document::SplitOutcome;

use services::app_services::{AppServices, parse_motif};
use services::data_dir;

/// Watch folders and split scanned PDFs at highlighter marks
#[derive(Parser)]
#[command(name = "pagemark", version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Directory holding config.json and patterns.json
    #[arg(long, global = true, env = data_dir::DATA_DIR_ENV)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start every auto-mode watcher and run until Ctrl-C
    Run,

    /// Split one PDF at its marked pages
    Split {
        /// The PDF to split
        input: PathBuf,

        /// Output folder (defaults to the input's folder)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Id of the stored pattern to match against
        #[arg(short, long, default_value = DEFAULT_PATTERN_ID)]
        pattern: String,

        /// Delete the input after a successful split
        #[arg(long)]
        delete_source: bool,
    },

    /// Process every PDF currently in a watcher's input folder
    Process {
        /// Watcher id
        id: String,
    },

    /// Register a watched folder pair
    Add {
        /// Input folder to watch
        input: PathBuf,

        /// Folder receiving the split documents
        output: PathBuf,

        /// Watcher id (a random UUID when omitted)
        #[arg(long)]
        id: Option<String>,

        /// Start this watcher with `pagemark run`
        #[arg(long)]
        auto: bool,

        /// Delete each source after a successful split
        #[arg(long)]
        delete_source: bool,
    },

    /// Remove a watcher and its stored settings
    Remove {
        /// Watcher id
        id: String,
    },

    /// List registered watchers
    List,

    /// Store the reference motif of a watcher (or DEFAULT)
    SetPattern {
        /// Watcher id, or DEFAULT
        id: String,

        /// JSON array of [x, y] pairs, e.g. '[[0,0],[10,10]]'
        #[arg(long, conflicts_with = "file", required_unless_present = "file")]
        json: Option<String>,

        /// File holding the JSON array
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("Pagemark starting");

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "pagemark failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let dir = data_dir::data_dir(cli.data_dir.as_deref());
    let services = AppServices::init(dir)?;

    match cli.command {
        Commands::Run => {
            services
                .run_until(async {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        tracing::error!(error = %e, "cannot listen for Ctrl-C");
                    }
                })
                .await;
        }

        Commands::Split {
            input,
            output,
            pattern,
            delete_source,
        } => {
            let output = output
                .or_else(|| input.parent().map(PathBuf::from))
                .unwrap_or_else(|| PathBuf::from("."));
            let worker = services.clone();
            let delete = delete_source.then_some(true);
            let outcome = tokio::task::spawn_blocking(move || {
                worker.split_file(&input, &output, &pattern, delete)
            })
            .await
            .map_err(|e| PagemarkError::Io(std::io::Error::other(e)))??;

            match outcome {
                SplitOutcome::Untouched => println!("no marker found; nothing written"),
                SplitOutcome::Split {
                    outputs,
                    source_deleted,
                } => {
                    for path in &outputs {
                        println!("{}", path.display());
                    }
                    if source_deleted {
                        println!("source deleted");
                    }
                }
            }
        }

        Commands::Process { id } => {
            let report = services.process_now(&id).await?;
            println!(
                "{} split, {} untouched, {} failed, {} documents written",
                report.split.len(),
                report.untouched.len(),
                report.failed.len(),
                report.outputs
            );
            for (path, reason) in &report.failed {
                println!("failed: {}: {reason}", path.display());
            }
        }

        Commands::Add {
            input,
            output,
            id,
            auto,
            delete_source,
        } => {
            let id = id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
            services.add_watcher(WatcherConfig::new(id.clone(), input, output, auto), delete_source)?;
            println!("{id}");
        }

        Commands::Remove { id } => {
            if !services.remove_watcher(&id).await? {
                return Err(PagemarkError::WatcherNotFound(id));
            }
        }

        Commands::List => {
            for (config, status) in services.watchers() {
                println!(
                    "{}\t{}\t{} -> {}\tauto={}",
                    config.id,
                    status.state,
                    config.input_dir.display(),
                    config.output_dir.display(),
                    config.auto_mode
                );
            }
        }

        Commands::SetPattern { id, json, file } => {
            let json = match (json, file) {
                (Some(json), _) => json,
                (None, Some(file)) => std::fs::read_to_string(file)?,
                (None, None) => {
                    return Err(PagemarkError::Config("a motif is required".into()));
                }
            };
            let points = services.set_pattern(&id, parse_motif(&json)?)?;
            println!("{id}: {points} points");
        }

        Commands::Config => {
            println!("data dir: {}", services.data_dir().display());
            println!("{}", serde_json::to_string_pretty(services.config())?);
        }
    }

    Ok(())
}
