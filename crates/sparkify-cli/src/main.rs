use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use sparkify_catalog::{PostgresWarehouse, Warehouse};
use sparkify_core::{CommitPolicy, Config, RunReport, StepStatus};
use sparkify_engine::{load, reset_schema, run_all, table_counts, LoadPipeline, RunOptions, SchemaReset};
use sparkify_sql::StatementCatalog;

const DEFAULT_CONFIG: &str = "dwh.toml";

/// Sparkify - build the Sparkify star schema on Amazon Redshift
#[derive(Parser, Debug)]
#[command(name = "sparkify")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: dwh.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Drop and recreate all tables
    CreateTables {
        #[command(flatten)]
        run: RunArgs,
    },

    /// Copy staging data and load the star schema
    Etl {
        #[command(flatten)]
        run: RunArgs,
    },

    /// Recreate all tables, then load them
    Run {
        #[command(flatten)]
        run: RunArgs,
    },

    /// Print the statements a run would execute, without connecting
    Plan {
        /// Which phase to print
        #[arg(long, value_enum, default_value_t = PhaseSelection::All)]
        phase: PhaseSelection,

        /// Plan the load with staging truncation
        #[arg(long)]
        truncate_staging: bool,
    },

    /// Connect to the cluster and run `SELECT 1`
    CheckConnection,

    /// Show row counts of the warehouse tables
    Status,
}

#[derive(clap::Args, Debug, Default)]
struct RunArgs {
    /// Write a JSON run report to this file
    #[arg(short, long)]
    report: Option<PathBuf>,

    /// Run each phase as one transaction instead of committing per statement
    #[arg(long)]
    single_transaction: bool,

    /// Empty the staging tables before copying
    #[arg(long)]
    truncate_staging: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum PhaseSelection {
    Reset,
    Load,
    All,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // .env first so RUST_LOG from it reaches the filter
    dotenvy::dotenv().ok();
    init_tracing(cli.verbose);

    let config_path = cli.config.clone().unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));
    let config = load_config(&config_path)?;

    if cli.verbose {
        eprintln!("{} {}", "Using config:".cyan(), config_path.display());
    }

    match cli.command {
        Commands::CreateTables { run } => {
            phases_command(&config, PhaseSelection::Reset, &run).await
        }
        Commands::Etl { run } => {
            phases_command(&config, PhaseSelection::Load, &run).await
        }
        Commands::Run { run } => {
            phases_command(&config, PhaseSelection::All, &run).await
        }
        Commands::Plan { phase, truncate_staging } => {
            plan_command(&config, phase, truncate_staging || config.etl.truncate_staging, cli.verbose)
        }
        Commands::CheckConnection => check_connection_command(&config).await,
        Commands::Status => status_command(&config).await,
    }
}

/// Log to stderr; `RUST_LOG` overrides the level chosen by `--verbose`
fn init_tracing(verbose: bool) {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(env_filter(verbose))
        .init();
}

/// `RUST_LOG` when set, otherwise info (debug with `--verbose`)
fn env_filter(verbose: bool) -> EnvFilter {
    let default_level = if verbose { "debug" } else { "info" };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Read, override from the environment, and validate
fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Err(anyhow::anyhow!(
            "Config file not found at {}. Copy dwh.toml.example and fill in your cluster settings.",
            path.display()
        ));
    }

    let mut config = Config::from_file(path)?;
    config.apply_env_overrides();
    config.validate()?;
    Ok(config)
}

fn run_options(config: &Config, args: &RunArgs) -> RunOptions {
    let mut options = RunOptions::from(&config.etl);
    if args.single_transaction {
        options.policy = CommitPolicy::SingleTransaction;
    }
    if args.truncate_staging {
        options.truncate_staging = true;
    }
    options
}

async fn connect(config: &Config) -> Result<PostgresWarehouse> {
    tracing::debug!(tls = config.etl.tls, "Opening warehouse connection");

    let warehouse = PostgresWarehouse::open(&config.cluster, config.etl.tls)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Could not connect to the cluster");
            e
        })
        .with_context(|| format!("Failed to connect to {}", config.cluster.endpoint()))?;

    Ok(warehouse)
}

/// Close the connection, logging rather than failing
async fn disconnect(warehouse: &mut PostgresWarehouse) {
    if let Err(e) = warehouse.close().await {
        tracing::warn!(error = %e, "Failed to close connection");
    }
}

/// create-tables, etl and run
async fn phases_command(config: &Config, selection: PhaseSelection, args: &RunArgs) -> Result<()> {
    let catalog = StatementCatalog::from_config(config);
    let options = run_options(config, args);
    let mut report = RunReport::new();

    let mut warehouse = connect(config).await?;

    let result = match selection {
        PhaseSelection::Reset => reset_schema(&mut warehouse, &catalog, options, &mut report).await,
        PhaseSelection::Load => load(&mut warehouse, &catalog, options, &mut report).await,
        PhaseSelection::All => run_all(&mut warehouse, &catalog, options, &mut report).await,
    };

    // Released on every path, including failure
    disconnect(&mut warehouse).await;
    report.finish();

    if let Some(path) = &args.report {
        report
            .save_to_file(path)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        eprintln!("{} {}", "Report saved to:".green(), path.display());
    }

    print_run_summary(&report);

    result?;
    Ok(())
}

fn plan_command(config: &Config, selection: PhaseSelection, truncate_staging: bool, verbose: bool) -> Result<()> {
    let catalog = StatementCatalog::from_config(config);

    if selection != PhaseSelection::Load {
        let statements = SchemaReset::new(&catalog).statements();
        print_header(&format!("Schema reset ({} statements)", statements.len()));
        for (i, statement) in statements.iter().enumerate() {
            println!("  {:>2}. {}", i + 1, statement.name);
            if verbose {
                println!("{}\n", indent(&statement.sql));
            }
        }

        println!();
        println!("{}", "Migrations:".bold());
        for migration in catalog.migrations() {
            println!("  {:<32} {}", migration.name, migration.checksum()[..16].dimmed());
        }
    }

    if selection != PhaseSelection::Reset {
        let plan = LoadPipeline::new(&catalog)
            .truncate_staging(truncate_staging)
            .plan()?;
        let graph = catalog.load_graph()?;

        print_header(&format!("Load pipeline ({} statements)", plan.len()));
        for (i, statement) in plan.statements().enumerate() {
            let parents = graph.parents(&statement.name);
            if parents.is_empty() {
                println!("  {:>2}. {}", i + 1, statement.name);
            } else {
                println!(
                    "  {:>2}. {} {}",
                    i + 1,
                    statement.name,
                    format!("(after {})", parents.join(", ")).dimmed()
                );
            }
            if verbose {
                println!("{}\n", indent(&statement.sql));
            }
        }
    }

    Ok(())
}

async fn check_connection_command(config: &Config) -> Result<()> {
    let mut warehouse = connect(config).await?;
    let result = warehouse.test_connection().await;
    disconnect(&mut warehouse).await;

    result.with_context(|| format!("Connection check against {} failed", config.cluster.endpoint()))?;
    println!(
        "{} {} ({})",
        "✓ Connected to".green(),
        config.cluster.endpoint(),
        warehouse.name()
    );
    Ok(())
}

async fn status_command(config: &Config) -> Result<()> {
    let catalog = StatementCatalog::from_config(config);
    let mut warehouse = connect(config).await?;
    let result = table_counts(&mut warehouse, &catalog).await;
    disconnect(&mut warehouse).await;

    let statuses = result.context("Failed to count rows")?;

    print_header(&format!("Tables on {}", config.cluster.endpoint()));
    for status in statuses {
        let rows = match status.rows {
            Some(rows) => rows.to_string().normal(),
            None => "missing".yellow(),
        };
        println!("  {:<16} {:<10} {}", status.table, status.role.to_string().dimmed(), rows);
    }
    println!();

    Ok(())
}

fn print_header(title: &str) {
    println!("\n{}", "=".repeat(60).bright_blue());
    println!("{}", title.bold().bright_blue());
    println!("{}", "=".repeat(60).bright_blue());
    println!();
}

fn print_run_summary(report: &RunReport) {
    print_header("Sparkify Run Report");

    for step in &report.steps {
        let marker = match step.status {
            StepStatus::Committed => "✓".green(),
            StepStatus::RolledBack => "↺".yellow(),
            StepStatus::Failed => "✗".red(),
        };
        let rows = step
            .rows_affected
            .map(|r| format!(" {} rows", r))
            .unwrap_or_default();
        println!("  {} {:<24} {:>6} ms{}", marker, step.step, step.duration_ms, rows);
        if let Some(error) = &step.error {
            println!("      {}", error.red());
        }
    }

    println!();
    println!("{}", "Summary:".bold());
    println!("  Statements:  {}", report.summary.total);
    println!("  Committed:   {}", format!("{}", report.summary.committed).green());
    if report.summary.rolled_back > 0 {
        println!("  Rolled back: {}", format!("{}", report.summary.rolled_back).yellow());
    }
    if report.summary.failed > 0 {
        println!("  Failed:      {}", format!("{}", report.summary.failed).red().bold());
    }
    println!("  Rows loaded: {}", report.summary.rows_affected);
    println!();

    if report.has_failures() {
        println!("{}", "✗ Run failed".red().bold());
    } else {
        println!("{}", "✓ Run completed".green().bold());
    }
}

fn indent(sql: &str) -> String {
    sql.lines()
        .map(|line| format!("        {}", line))
        .collect::<Vec<_>>()
        .join("\n")
}
