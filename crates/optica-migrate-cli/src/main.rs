//! optica-migrate CLI - Dependency-ordered MySQL to MongoDB migration.

use clap::{Parser, Subcommand};
use optica_migrate::{Config, MigrateError, Orchestrator};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;

#[derive(Parser)]
#[command(name = "optica-migrate")]
#[command(about = "Dependency-ordered MySQL to MongoDB migration for the Optica schema")]
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
    /// Clear the destination and migrate every entity
    Run {
        /// Override insert batch size
        #[arg(long)]
        batch_size: Option<usize>,

        /// Dry run: transform into memory without writing the destination
        #[arg(long)]
        dry_run: bool,
    },

    /// Compare source row counts with destination document counts
    Validate,

    /// Test database connections
    HealthCheck,

    /// Print the entity load order without connecting
    Plan,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), MigrateError> {
    let cli = Cli::parse();

    // Plan is static; no config or connection needed
    if let Commands::Plan = cli.command {
        let plan = Orchestrator::plan()?;
        if cli.output_json {
            println!("{}", serde_json::to_string_pretty(&plan)?);
        } else {
            println!("Load order:");
            for step in &plan {
                let deps = if step.depends_on.is_empty() {
                    "-".to_string()
                } else {
                    step.depends_on.join(", ")
                };
                println!(
                    "  {:>2}. {} -> {} (depends on: {})",
                    step.position, step.entity, step.collection, deps
                );
            }
        }
        return Ok(());
    }

    setup_logging(&cli.verbosity, &cli.log_format)
        .map_err(|e| MigrateError::Config(e.to_string()))?;

    let mut config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    match cli.command {
        Commands::Plan => unreachable!(), // Handled above
        Commands::Run {
            batch_size,
            dry_run,
        } => {
            if let Some(size) = batch_size {
                config.migration.insert_batch_size = Some(size);
                config.validate()?;
            }

            let orchestrator = Orchestrator::connect(config).await?;
            let result = if dry_run {
                orchestrator.dry_run().await?
            } else {
                orchestrator.run().await?
            };

            if cli.output_json {
                println!("{}", result.to_json()?);
            } else {
                let status_msg = if dry_run {
                    "Dry run completed!"
                } else {
                    "Migration completed!"
                };
                println!("\n{}", status_msg);
                println!("  Run ID: {}", result.run_id);
                println!("  Status: {}", result.status);
                println!("  Duration: {:.2}s", result.duration_seconds);
                for c in &result.collections {
                    println!(
                        "  {}: {} documents ({} skipped)",
                        c.collection, c.final_count, c.skipped
                    );
                }
                println!("  Documents: {}", result.documents_inserted);
                if !result.skipped_rows.is_empty() {
                    println!("  Skipped rows: {}", result.skipped_rows.len());
                    for row in &result.skipped_rows {
                        let key = row
                            .key
                            .map(|k| k.to_string())
                            .unwrap_or_else(|| "?".to_string());
                        println!("    {} {}: {}", row.entity, key, row.reason);
                    }
                }
            }
        }

        Commands::Validate => {
            let orchestrator = Orchestrator::connect(config).await?;
            let entries = orchestrator.validate().await?;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                println!("Validation Results:");
                for entry in &entries {
                    println!(
                        "  {} {}: source={} documents={}",
                        if entry.matches { "OK  " } else { "DIFF" },
                        entry.collection,
                        entry.source_rows,
                        entry.documents
                    );
                }
            }

            let mismatched = entries.iter().filter(|e| !e.matches).count();
            if mismatched > 0 {
                return Err(MigrateError::Config(format!(
                    "Validation failed: {} collections differ",
                    mismatched
                )));
            }
            println!("Validation completed successfully");
        }

        Commands::HealthCheck => {
            let result = Orchestrator::check_endpoints(&config).await;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("Health Check Results:");
                println!(
                    "  Source (MySQL): {} ({}ms)",
                    if result.source_connected { "OK" } else { "FAILED" },
                    result.source_latency_ms
                );
                if let Some(ref err) = result.source_error {
                    println!("    Error: {}", err);
                }
                println!(
                    "  Target (MongoDB): {} ({}ms)",
                    if result.target_connected { "OK" } else { "FAILED" },
                    result.target_latency_ms
                );
                if let Some(ref err) = result.target_error {
                    println!("    Error: {}", err);
                }
                println!(
                    "\n  Overall: {}",
                    if result.healthy { "HEALTHY" } else { "UNHEALTHY" }
                );
            }

            if !result.healthy {
                return Err(MigrateError::Config("Health check failed".to_string()));
            }
        }
    }

    Ok(())
}

fn setup_logging(verbosity: &str, format: &str) -> Result<(), String> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    Ok(())
}
