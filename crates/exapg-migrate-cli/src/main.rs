//! exapg-migrate CLI - Parallel Exasol to PostgreSQL migration.

use clap::{Parser, Subcommand};
use exapg_migrate::{Config, MigrateError, Orchestrator};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{info, Level};

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

#[derive(Parser)]
#[command(name = "exapg-migrate")]
#[command(about = "Parallel Exasol to PostgreSQL migration")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a migration
    Run {
        /// Restrict the migration to one source schema
        #[arg(long)]
        schema: Option<String>,

        /// Only migrate these tables (comma-separated)
        #[arg(long, value_delimiter = ',')]
        tables: Vec<String>,

        /// Skip these tables (comma-separated)
        #[arg(long, value_delimiter = ',')]
        exclude_tables: Vec<String>,

        /// Override number of workers
        #[arg(long)]
        workers: Option<usize>,

        /// Override batch size in rows (0 disables batching)
        #[arg(long)]
        batch_size: Option<i64>,

        /// Do not empty target tables before loading
        #[arg(long)]
        no_truncate: bool,
    },

    /// Test database connections
    HealthCheck,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<bool, MigrateError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format);

    let mut config = Config::load(&cli.config)?.with_auto_tuning();
    info!("Loaded configuration from {:?}", cli.config);

    // SIGINT/SIGTERM cancel the run at the next task boundary.
    let cancel_token = setup_signal_handler();

    match cli.command {
        Commands::Run {
            schema,
            tables,
            exclude_tables,
            workers,
            batch_size,
            no_truncate,
        } => {
            if schema.is_some() {
                config.migration.schema = schema;
            }
            if !tables.is_empty() {
                config.migration.include_tables = tables;
            }
            if !exclude_tables.is_empty() {
                config.migration.exclude_tables = exclude_tables;
            }
            if let Some(w) = workers {
                config.migration.workers = Some(w);
            }
            if let Some(b) = batch_size {
                config.migration.batch_size = b;
            }
            if no_truncate {
                config.migration.truncate = false;
            }
            config.validate()?;

            let orchestrator = Orchestrator::connect(config).await?;
            let result = orchestrator.run(cancel_token).await?;

            if cli.output_json {
                println!("{}", result.to_json()?);
            } else {
                println!("\nMigration {}", result.status);
                println!("  Run ID: {}", result.run_id);
                println!("  Duration: {:.2}s", result.duration_seconds);
                println!("  Tables: {}", result.tables_total);
                println!(
                    "  Tasks: {} ok / {} warnings / {} errors of {}",
                    result.success, result.warnings, result.errors, result.tasks_total
                );
                println!(
                    "  Rows: {} estimated, {} exported, {} imported",
                    result.rows_estimated, result.rows_exported, result.rows_imported
                );
            }

            Ok(result.is_success())
        }

        Commands::HealthCheck => {
            let orchestrator = Orchestrator::new(config);
            let report = orchestrator.health_check().await;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("Health Check Results:");
                println!(
                    "  Source (Exasol): {} ({}ms)",
                    if report.source.ok { "OK" } else { "FAILED" },
                    report.source.latency_ms
                );
                if let Some(ref err) = report.source.error {
                    println!("    Error: {}", err);
                }
                println!(
                    "  Target (PostgreSQL): {} ({}ms)",
                    if report.target.ok { "OK" } else { "FAILED" },
                    report.target.latency_ms
                );
                if let Some(ref err) = report.target.error {
                    println!("    Error: {}", err);
                }
                println!(
                    "\n  Overall: {}",
                    if report.healthy() { "HEALTHY" } else { "UNHEALTHY" }
                );
            }

            Ok(report.healthy())
        }
    }
}

fn setup_logging(verbosity: &str, format: &str) {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

/// Handles both SIGINT (Ctrl-C) and SIGTERM (scheduler shutdown). Returns a
/// CancellationToken that is cancelled when a signal arrives.
#[cfg(unix)]
fn setup_signal_handler() -> CancellationToken {
    let cancel_token = CancellationToken::new();

    let token_int = cancel_token.clone();
    let token_term = cancel_token.clone();

    tokio::spawn(async move {
        let mut sigint = signal(SignalKind::interrupt()).expect("Failed to setup SIGINT handler");
        sigint.recv().await;
        eprintln!("\nReceived SIGINT. Finishing in-flight tasks...");
        token_int.cancel();
    });

    tokio::spawn(async move {
        let mut sigterm = signal(SignalKind::terminate()).expect("Failed to setup SIGTERM handler");
        sigterm.recv().await;
        eprintln!("\nReceived SIGTERM. Finishing in-flight tasks...");
        token_term.cancel();
    });

    cancel_token
}

/// Signal handler for Windows (only SIGINT/Ctrl-C).
#[cfg(not(unix))]
fn setup_signal_handler() -> CancellationToken {
    let cancel_token = CancellationToken::new();
    let token = cancel_token.clone();

    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to setup Ctrl-C handler");
        eprintln!("\nReceived Ctrl-C. Finishing in-flight tasks...");
        token.cancel();
    });

    cancel_token
}
