//! `sales-report` - command line front end for the sales analysis pipeline.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sales_report_builder::{
    format_brl, write_category_table, write_cleaned_csv, PipelineConfig, SalesMetrics,
    SalesReportProcessor,
};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser)]
#[command(name = "sales-report")]
#[command(about = "Sales transaction cleaning, KPI statistics and HTML reporting", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Full pipeline: clean, analyze, chart and write the HTML report
    Run(RunArgs),
    /// Infer a category reference file from the product names
    Categories(CategoriesArgs),
    /// Print the metrics map of an already cleaned CSV as JSON
    Stats(StatsArgs),
    /// Write the cleaned dataset as CSV
    Clean(CleanArgs),
    /// Print the JSON Schema of the metrics map
    Schema,
}

#[derive(Parser)]
struct RunArgs {
    #[arg(long, default_value = "dados/dados_vendas.csv")]
    input: PathBuf,
    /// JSON pipeline configuration
    #[arg(long, env = "SALES_REPORT_CONFIG")]
    config: Option<PathBuf>,
    /// Overrides the configured output directory
    #[arg(long)]
    output: Option<PathBuf>,
    /// Overrides the configured category reference file
    #[arg(long)]
    categories: Option<PathBuf>,
}

#[derive(Parser)]
struct CategoriesArgs {
    #[arg(long, default_value = "dados/dados_vendas.csv")]
    input: PathBuf,
    #[arg(long, default_value = "dados/categorias_produtos.csv")]
    output: PathBuf,
    #[arg(long, env = "SALES_REPORT_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Parser)]
struct StatsArgs {
    #[arg(long)]
    input: PathBuf,
    #[arg(long, env = "SALES_REPORT_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Parser)]
struct CleanArgs {
    #[arg(long, default_value = "dados/dados_vendas.csv")]
    input: PathBuf,
    #[arg(long, default_value = "output/dados_limpos.csv")]
    output: PathBuf,
    #[arg(long, env = "SALES_REPORT_CONFIG")]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Starting sales-report v{}", env!("CARGO_PKG_VERSION"));

    let cli = Cli::parse();
    match cli.command {
        Command::Run(args) => run(args),
        Command::Categories(args) => categories(args),
        Command::Stats(args) => stats(args),
        Command::Clean(args) => clean(args),
        Command::Schema => {
            println!("{}", SalesMetrics::schema_as_json()?);
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::from_json_file(path)
            .with_context(|| format!("failed to load configuration from {}", path.display())),
        None => Ok(PipelineConfig::default()),
    }
}

fn run(args: RunArgs) -> Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(output) = args.output {
        config.output_dir = output;
    }
    if let Some(categories) = args.categories {
        config.category_file = categories;
    }

    let outcome = SalesReportProcessor::run(&args.input, &config)
        .with_context(|| format!("analysis of {} failed", args.input.display()))?;

    let report = &outcome.cleaning_report;
    info!(
        "Cleaning kept {} of {} records ({:.2}%)",
        report.records_final, report.records_initial, report.utilization_rate
    );
    info!(
        "GMV {} | estimated profit {} | {} insights | {} charts",
        format_brl(outcome.metrics.gmv),
        format_brl(outcome.metrics.estimated_profit),
        outcome.insights.len(),
        outcome.charts.len()
    );
    info!("Report: {}", outcome.report_path.display());
    Ok(())
}

fn categories(args: CategoriesArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let entries = SalesReportProcessor::generate_categories(&args.input, &config)
        .with_context(|| format!("failed to infer categories from {}", args.input.display()))?;
    write_category_table(&args.output, &entries)
        .with_context(|| format!("failed to write {}", args.output.display()))?;
    info!(
        "Wrote {} products to {}; review it before the next run",
        entries.len(),
        args.output.display()
    );
    Ok(())
}

fn stats(args: StatsArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let metrics = SalesReportProcessor::statistics_from_csv(&args.input, &config)
        .with_context(|| format!("failed to analyze {}", args.input.display()))?;
    println!("{}", metrics.to_json()?);
    Ok(())
}

fn clean(args: CleanArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let cleaned = SalesReportProcessor::clean_file(&args.input, &config)
        .with_context(|| format!("failed to clean {}", args.input.display()))?;
    write_cleaned_csv(&args.output, cleaned.records())
        .with_context(|| format!("failed to write {}", args.output.display()))?;
    info!(
        "Cleaned dataset with {} records written to {}",
        cleaned.len(),
        args.output.display()
    );
    Ok(())
}
