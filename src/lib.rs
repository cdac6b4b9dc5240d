//! # Sales Report Builder
//!
//! A library for turning a raw CSV of sales transactions into a cleaned
//! dataset, a flat map of KPI metrics and a static HTML report.
//!
//! ## Pipeline
//!
//! - **Loading**: the transaction CSV is read as untyped text rows
//! - **Cleaning**: duplicates, unparseable values, non-positive prices or
//!   quantities and price outliers are removed; every surviving row gets its
//!   calendar features, category, margin and estimated profit
//! - **Statistics**: GMV, profit, ticket, product and ABC rankings,
//!   weekday/monthly seasonality, growth and temporal density
//! - **Insights**: short Portuguese sentences derived from the metrics
//! - **Output**: SVG charts, `metrics.json`, `cleaning_report.json` and
//!   `relatorio_vendas.html`
//!
//! ## Example
//!
//! ```rust,ignore
//! use sales_report_builder::*;
//! use std::path::Path;
//!
//! let config = PipelineConfig {
//!     output_dir: "output".into(),
//!     ..PipelineConfig::default()
//! };
//!
//! let outcome = SalesReportProcessor::run(Path::new("dados/dados_vendas.csv"), &config)?;
//! println!("GMV: {}", format_brl(outcome.metrics.gmv));
//! ```

pub mod category;
pub mod charts;
pub mod cleaning;
pub mod config;
pub mod engine;
pub mod error;
pub mod ingestion;
pub mod insights;
pub mod report;
pub mod schema;
pub mod seasonality;
pub mod utils;

pub use category::{
    build_resolver, generate_reference_table, CategoryAssignment, CategoryReferenceTable,
    CategoryResolver, FixedCategory, KeywordCategorizer, MarginTable, FALLBACK_CATEGORY,
};
pub use charts::{ChartRenderer, CHART_DIR};
pub use cleaning::RecordCleaner;
pub use config::*;
pub use engine::{StatisticsEngine, REQUIRED_COLUMNS};
pub use error::{Result, SalesReportError};
pub use ingestion::*;
pub use insights::{Insight, InsightGenerator, InsightKind, InsightThresholds};
pub use report::{HtmlReport, ReportContext, REPORT_FILE};
pub use schema::*;
pub use utils::*;

use chrono::Local;
use log::{debug, info};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const METRICS_FILE: &str = "metrics.json";
pub const CLEANING_REPORT_FILE: &str = "cleaning_report.json";

/// Everything one pipeline run produced, in memory and on disk.
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub records: Vec<CleanRecord>,
    pub cleaning_report: CleaningReport,
    pub metrics: SalesMetrics,
    pub insights: Vec<Insight>,
    /// Chart name → path relative to the output directory
    pub charts: BTreeMap<String, PathBuf>,
    pub metrics_path: PathBuf,
    pub cleaning_report_path: PathBuf,
    pub report_path: PathBuf,
}

pub struct SalesReportProcessor;

impl SalesReportProcessor {
    /// Runs the full pipeline for `input` and writes every artifact into
    /// `config.output_dir`.
    pub fn run(input: &Path, config: &PipelineConfig) -> Result<AnalysisOutcome> {
        config.validate()?;
        info!("Running sales analysis for {}", input.display());

        let cleaned = Self::clean_file(input, config)?;
        let (records, cleaning_report) = cleaned.into_parts();

        let metrics = StatisticsEngine::from_config(config).calculate(&records)?;
        let insights = InsightGenerator::default().generate(&metrics);
        debug!("Generated {} insights", insights.len());

        let output_dir = config.output_dir.as_path();
        std::fs::create_dir_all(output_dir)?;

        let charts = ChartRenderer::default().render_all(&records, output_dir)?;
        let metrics_path = write_json(&output_dir.join(METRICS_FILE), &metrics)?;
        let cleaning_report_path =
            write_json(&output_dir.join(CLEANING_REPORT_FILE), &cleaning_report)?;

        let context = ReportContext {
            metrics: &metrics,
            insights: &insights,
            charts: &charts,
            cleaning: Some(&cleaning_report),
            generated_at: Local::now().naive_local(),
        };
        let report_path = HtmlReport::default().write(&context, output_dir)?;

        info!(
            "Analysis complete: {} records, GMV {}",
            records.len(),
            format_brl(metrics.gmv)
        );

        Ok(AnalysisOutcome {
            records,
            cleaning_report,
            metrics,
            insights,
            charts,
            metrics_path,
            cleaning_report_path,
            report_path,
        })
    }

    /// Loads and cleans `input`, resolving categories the way `config` asks.
    pub fn clean_file(input: &Path, config: &PipelineConfig) -> Result<CleanedDataset> {
        let raw = load_transactions(input)?;
        let reference = Self::load_reference(config)?;
        RecordCleaner::from_config(config, reference)?.clean(&raw)
    }

    /// The category reference table, when the strategy uses one and the file
    /// exists. A missing file is not an error.
    pub fn load_reference(config: &PipelineConfig) -> Result<Option<Vec<CategoryEntry>>> {
        if config.cleaning.category_strategy != CategoryStrategy::ReferenceFile {
            return Ok(None);
        }

        load_category_table(&config.category_file)
    }

    /// Computes the metrics map from a cleaned dataset previously exported
    /// as CSV.
    pub fn statistics_from_csv(path: &Path, config: &PipelineConfig) -> Result<SalesMetrics> {
        config.validate()?;
        let table = read_csv_file(path)?;
        StatisticsEngine::from_config(config).calculate_table(&table)
    }

    /// Builds the category reference table for every product that survives
    /// cleaning, in first-seen chronological order.
    pub fn generate_categories(input: &Path, config: &PipelineConfig) -> Result<Vec<CategoryEntry>> {
        config.validate()?;
        let cleaned = Self::clean_file(input, config)?;

        let categorizer = KeywordCategorizer::from_config(config)?;
        let entries = generate_reference_table(
            cleaned.records().iter().map(|record| record.product.as_str()),
            &categorizer,
        );

        info!(
            "Inferred categories for {} distinct products from {} clean records",
            entries.len(),
            cleaned.len()
        );
        Ok(entries)
    }
}

pub fn run_pipeline(input: &Path, config: &PipelineConfig) -> Result<AnalysisOutcome> {
    SalesReportProcessor::run(input, config)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<PathBuf> {
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json)?;
    debug!("Wrote {}", path.display());
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn config_in(dir: &Path) -> PipelineConfig {
        PipelineConfig {
            output_dir: dir.join("output"),
            category_file: dir.join("categorias_produtos.csv"),
            ..PipelineConfig::default()
        }
    }

    fn write_input(dir: &Path, content: &str) -> PathBuf {
        let path = dir.join("vendas.csv");
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_end_to_end_processing() {
        let dir = tempdir().unwrap();
        let input = write_input(
            dir.path(),
            "date,product,unit_price,quantity\n\
             2024-01-02,Notebook Dell,3000,1\n\
             2024-01-02,Notebook Dell,3000,1\n\
             2024-01-03,Mouse Logitech,50,2\n\
             2024-02-05,Monitor LG,900,1\n",
        );
        let config = config_in(dir.path());

        let outcome = run_pipeline(&input, &config).unwrap();

        assert_eq!(outcome.cleaning_report.records_initial, 4);
        assert_eq!(outcome.cleaning_report.duplicates_removed, 1);
        assert_eq!(outcome.records.len(), 3);
        assert_eq!(outcome.metrics.gmv, 4000.0);
        assert_eq!(outcome.charts.len(), 5);

        assert!(outcome.report_path.ends_with(REPORT_FILE));
        assert!(outcome.report_path.exists());

        let metrics: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&outcome.metrics_path).unwrap())
                .unwrap();
        assert_eq!(metrics["gmv"], serde_json::json!(4000.0));

        let cleaning: CleaningReport = serde_json::from_str(
            &std::fs::read_to_string(&outcome.cleaning_report_path).unwrap(),
        )
        .unwrap();
        assert_eq!(cleaning, outcome.cleaning_report);
    }

    #[test]
    fn test_missing_reference_file_uses_fallback_category() {
        let dir = tempdir().unwrap();
        let input = write_input(
            dir.path(),
            "date,product,unit_price,quantity\n2024-01-02,Notebook Dell,3000,1\n",
        );
        let config = config_in(dir.path());

        let cleaned = SalesReportProcessor::clean_file(&input, &config).unwrap();
        assert_eq!(cleaned.records()[0].category, "Outros");
        assert_eq!(cleaned.cleaning_report().products_without_category, 1);
    }

    #[test]
    fn test_reference_file_is_applied() {
        let dir = tempdir().unwrap();
        let input = write_input(
            dir.path(),
            "date,product,unit_price,quantity\n2024-01-02,Notebook Dell,3000,1\n",
        );
        let config = config_in(dir.path());
        std::fs::write(
            &config.category_file,
            "product,suggested_category,suggested_margin\nNotebook Dell,Computadores,0.12\n",
        )
        .unwrap();

        let cleaned = SalesReportProcessor::clean_file(&input, &config).unwrap();
        let record = &cleaned.records()[0];
        assert_eq!(record.category, "Computadores");
        assert_eq!(record.margin, 0.12);
        assert_eq!(cleaned.cleaning_report().products_without_category, 0);
    }

    #[test]
    fn test_generate_categories_deduplicates_products() {
        let dir = tempdir().unwrap();
        let input = write_input(
            dir.path(),
            "date,product,unit_price,quantity\n\
             2024-01-02,Mouse Gamer,100,1\n\
             2024-01-03,Mouse Gamer,100,1\n\
             2024-01-04,Cadeira Office,800,1\n",
        );

        let entries =
            SalesReportProcessor::generate_categories(&input, &config_in(dir.path())).unwrap();
        let products: Vec<&str> = entries.iter().map(|e| e.product.as_str()).collect();
        assert_eq!(products, vec!["Mouse Gamer", "Cadeira Office"]);
    }

    #[test]
    fn test_generate_categories_skips_rejected_rows() {
        let dir = tempdir().unwrap();
        let input = write_input(
            dir.path(),
            "date,product,unit_price,quantity
             2024-01-02,Mouse Gamer,100,1
             not-a-date,Produto Fantasma,-5,0
             2024-01-03,Teclado Sem Preco,,1
",
        );

        let entries =
            SalesReportProcessor::generate_categories(&input, &config_in(dir.path())).unwrap();
        let products: Vec<&str> = entries.iter().map(|e| e.product.as_str()).collect();
        assert_eq!(products, vec!["Mouse Gamer"]);
    }

    #[test]
    fn test_generate_categories_requires_transaction_columns() {
        let dir = tempdir().unwrap();
        let input = write_input(dir.path(), "date,product
2024-01-02,Mouse Gamer
");

        let result = SalesReportProcessor::generate_categories(&input, &config_in(dir.path()));
        assert!(matches!(result, Err(SalesReportError::Schema { .. })));
    }

    #[test]
    fn test_invalid_config_is_rejected_before_loading() {
        let dir = tempdir().unwrap();
        let mut config = config_in(dir.path());
        config.default_margin = 1.5;

        let result = run_pipeline(&dir.path().join("missing.csv"), &config);
        assert!(matches!(result, Err(SalesReportError::InvalidConfig(_))));
    }
}
