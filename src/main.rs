//! MQL CLI
//!
//! Command-line interface for MQL statements:
//! - Run a statement against KairosDB
//! - Explain the compiled plan
//! - Check a statement without running it
//! - Generate a default config file

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use std::fmt::Write as _;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use mql::config::{generate_default_config, Config};
use mql::kairos::KairosDbClient;
use mql::query::{
    AggregatorRegistry, CompiledStatement, Compiler, MqlError, PlanDescription, QueryExecutor,
    TimeSeriesResult,
};
use mql::parse_statement;

#[derive(Parser)]
#[command(name = "mql")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Metrics Query Language for KairosDB")]
#[command(long_about = "Compile and run MQL statements against a KairosDB server.\nPass '-' as the query to read it from stdin.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: search the standard locations)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// KairosDB URL, overrides the config file
    #[arg(long, global = true)]
    pub kairos_url: Option<String>,

    /// Statement deadline in seconds, overrides the config file
    #[arg(long, global = true)]
    pub timeout_secs: Option<u64>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = Format::Table, global = true)]
    pub format: Format,

    /// Log at the configured level instead of warnings only
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Execute a statement
    Run {
        /// MQL statement
        query: String,
    },

    /// Show the compiled plan without executing it
    Explain {
        /// MQL statement
        query: String,
    },

    /// Parse and compile a statement, reporting every problem
    Check {
        /// MQL statement
        query: String,
    },

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Table,
    Json,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_with_env(path)
            .with_context(|| format!("loading config from {:?}", path))?,
        None => Config::load_default(),
    };
    if let Some(url) = &cli.kairos_url {
        config.kairosdb.url = url.clone();
    }
    if let Some(secs) = cli.timeout_secs {
        config.query.statement_timeout_secs = secs;
    }
    config.validate()?;
    if !cli.verbose {
        config.logging.level = "warn".to_string();
    }
    mql::logging::init_tracing(&config.logging)?;

    match cli.command {
        Commands::Run { query } => {
            let text = read_query(query)?;
            let client = KairosDbClient::new(config.kairosdb.client_config())
                .context("building KairosDB client")?;
            let executor = QueryExecutor::new(Arc::new(client))
                .with_statement_timeout(config.query.statement_timeout());

            match executor.execute_str(&text).await {
                Ok(result) => {
                    for warning in result.warnings() {
                        eprintln!("warning: {}", warning);
                    }
                    match cli.format {
                        Format::Json => println!("{}", serde_json::to_string_pretty(&result)?),
                        Format::Table => print!("{}", render_result(&result)?),
                    }
                }
                Err(e) => report_and_exit(&e),
            }
        }

        Commands::Explain { query } => {
            let text = read_query(query)?;
            match compile_statement(&text) {
                Ok(compiled) => {
                    let plan = compiled.explain();
                    match cli.format {
                        Format::Json => println!("{}", serde_json::to_string_pretty(&plan)?),
                        Format::Table => print!("{}", render_plan(&plan)?),
                    }
                }
                Err(e) => report_and_exit(&e),
            }
        }

        Commands::Check { query } => {
            let text = read_query(query)?;
            match compile_statement(&text) {
                Ok(compiled) => {
                    for warning in compiled.warnings() {
                        eprintln!("warning: {}", warning);
                    }
                    println!("OK ({} stages)", compiled.explain().stages.len());
                }
                Err(e) => report_and_exit(&e),
            }
        }

        Commands::Config { output } => {
            let content = generate_default_config();

            match output {
                Some(path) => {
                    if let Some(parent) = path.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(&path, &content)?;
                    println!("Config written to {:?}", path);
                }
                None => {
                    print!("{}", content);
                }
            }
        }
    }

    Ok(())
}

/// `-` reads the statement from stdin
fn read_query(query: String) -> anyhow::Result<String> {
    if query != "-" {
        return Ok(query);
    }

    let mut text = String::new();
    std::io::stdin()
        .read_to_string(&mut text)
        .context("reading statement from stdin")?;
    if text.trim().is_empty() {
        bail!("no statement on stdin");
    }
    Ok(text)
}

/// Compile without a backend connection
fn compile_statement(text: &str) -> Result<CompiledStatement, MqlError> {
    let registry = AggregatorRegistry::default();
    let statement = parse_statement(text)?;
    Ok(Compiler::new(&registry).compile(&statement)?)
}

fn report_and_exit(error: &MqlError) -> ! {
    for problem in error.problems() {
        eprintln!("error: {}", problem);
    }
    std::process::exit(1);
}

fn render_result(result: &TimeSeriesResult) -> anyhow::Result<String> {
    let mut out = String::new();
    let queries = &result.response().queries;

    if queries.is_empty() {
        out.push_str("No data\n");
    }

    for (i, query) in queries.iter().enumerate() {
        for series in &query.results {
            writeln!(out, "== {} ==", series.name().unwrap_or(&format!("query {}", i)))?;
            if series.values.is_empty() {
                out.push_str("(no datapoints)\n");
            }
            for point in &series.values {
                writeln!(
                    out,
                    "{:<25} {}",
                    point.time.format("%Y-%m-%d %H:%M:%S%.3f"),
                    point.value
                )?;
            }
        }
    }

    if !result.alerts().is_empty() {
        writeln!(out, "\nAlerts:")?;
        for alert in result.alerts() {
            writeln!(
                out,
                "{:<25} {}",
                alert.time.format("%Y-%m-%d %H:%M:%S%.3f"),
                alert.value
            )?;
        }
    }

    for error in result.errors() {
        writeln!(out, "error: {}", error)?;
    }

    Ok(out)
}

fn render_plan(plan: &PlanDescription) -> anyhow::Result<String> {
    let mut out = String::new();

    writeln!(out, "{:<6} {:<12} {:<10} {}", "Id", "Name", "Kind", "Depends on")?;
    writeln!(out, "{}", "-".repeat(50))?;

    for stage in &plan.stages {
        let dependencies: Vec<String> = stage.dependencies.iter().map(ToString::to_string).collect();
        writeln!(
            out,
            "{:<6} {:<12} {:<10} {}",
            stage.id.to_string(),
            stage.name.as_deref().unwrap_or("-"),
            stage.kind,
            dependencies.join(", ")
        )?;
        if let Some(query) = &stage.query {
            writeln!(out, "       {}", serde_json::to_string(query)?)?;
        }
    }

    writeln!(out, "\nTerminal: {}", plan.terminal)?;
    for warning in &plan.warnings {
        writeln!(out, "warning: {}", warning)?;
    }

    Ok(out)
}
