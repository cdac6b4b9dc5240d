use crate::category::{build_resolver, CategoryResolver};
use crate::config::{ColumnNames, PipelineConfig};
use crate::error::{Result, SalesReportError};
use crate::schema::{
    cell_text, CategoryEntry, CleanRecord, CleanedDataset, CleaningReport, RawDataset,
};
use crate::utils::{iso_week, parse_date, parse_number, quantile, round2};
use chrono::{Datelike, NaiveDate};
use log::{debug, info, warn};
use std::collections::HashSet;

/// Column positions of the required fields in a raw table.
#[derive(Debug, Clone, Copy)]
struct ColumnIndices {
    date: usize,
    product: usize,
    unit_price: usize,
    quantity: usize,
}

/// A row after type coercion; `None` marks a missing or unparseable value.
#[derive(Debug, Clone)]
struct CoercedRow {
    date: Option<NaiveDate>,
    product: Option<String>,
    unit_price: Option<f64>,
    quantity: Option<f64>,
}

#[derive(Debug, Clone)]
struct ValidRow {
    date: NaiveDate,
    product: String,
    unit_price: f64,
    quantity: u64,
}

/// Turns raw transaction rows into the canonical cleaned dataset.
///
/// Stages run in a fixed order, each relying on what the previous one
/// guarantees: deduplication, type coercion, invalid-record rejection,
/// price outlier rejection, derived features, category enrichment and
/// chronological ordering.
pub struct RecordCleaner {
    columns: ColumnNames,
    iqr_multiplier: Option<f64>,
    resolver: Box<dyn CategoryResolver>,
}

impl RecordCleaner {
    pub fn new(
        columns: ColumnNames,
        iqr_multiplier: Option<f64>,
        resolver: Box<dyn CategoryResolver>,
    ) -> Self {
        Self {
            columns,
            iqr_multiplier,
            resolver,
        }
    }

    pub fn from_config(
        config: &PipelineConfig,
        reference: Option<Vec<CategoryEntry>>,
    ) -> Result<Self> {
        Ok(Self::new(
            config.columns.clone(),
            config.cleaning.iqr_multiplier,
            build_resolver(config, reference)?,
        ))
    }

    pub fn validate_columns(&self, raw: &RawDataset) -> Result<()> {
        self.column_indices(raw).map(|_| ())
    }

    pub fn clean(&self, raw: &RawDataset) -> Result<CleanedDataset> {
        info!("Cleaning {} raw records", raw.len());
        let indices = self.column_indices(raw)?;
        let records_initial = raw.len();

        let (rows, duplicates_removed) = remove_duplicates(raw, indices);
        if duplicates_removed > 0 {
            debug!("Removed {} duplicate rows", duplicates_removed);
        }

        let (rows, invalid_values_converted) = coerce_types(&rows, indices);
        if invalid_values_converted > 0 {
            warn!(
                "{} values could not be parsed and were treated as missing",
                invalid_values_converted
            );
        }

        let (rows, invalid_records_removed) = remove_invalid_records(rows);
        if invalid_records_removed > 0 {
            debug!("Removed {} invalid records", invalid_records_removed);
        }

        let (rows, outliers_removed) = match self.iqr_multiplier {
            Some(k) => remove_price_outliers(rows, k),
            None => (rows, 0),
        };
        if outliers_removed > 0 {
            debug!("Removed {} extreme unit price outliers", outliers_removed);
        }

        let (mut records, products_without_category) =
            enrich(rows, self.resolver.as_ref());
        if products_without_category > 0 {
            warn!(
                "{} records have no category, fallback category applied",
                products_without_category
            );
        }

        sort_chronologically(&mut records);

        let records_final = records.len();
        let report = CleaningReport {
            records_initial,
            duplicates_removed,
            invalid_values_converted,
            invalid_records_removed,
            outliers_removed,
            products_without_category,
            records_final,
            utilization_rate: utilization_rate(records_initial, records_final),
        };

        info!(
            "Cleaning finished: {} records kept, {} removed ({}% utilization)",
            report.records_final,
            report.records_removed(),
            report.utilization_rate
        );

        Ok(CleanedDataset::new(records, report))
    }

    fn column_indices(&self, raw: &RawDataset) -> Result<ColumnIndices> {
        let missing = raw.missing_columns(self.columns.required());
        if !missing.is_empty() {
            return Err(SalesReportError::schema(missing, &raw.columns));
        }

        let index = |name: &str| raw.column_index(name).unwrap_or_default();
        Ok(ColumnIndices {
            date: index(&self.columns.date),
            product: index(&self.columns.product),
            unit_price: index(&self.columns.unit_price),
            quantity: index(&self.columns.quantity),
        })
    }
}

/// Keeps the first occurrence of every row. Rows are compared by their
/// normalized cells, so `10`, `10.0` and ` 10 ` are the same value.
fn remove_duplicates(raw: &RawDataset, indices: ColumnIndices) -> (Vec<&Vec<String>>, usize) {
    let width = raw.columns.len();
    let mut seen = HashSet::with_capacity(raw.len());
    let unique: Vec<&Vec<String>> = raw
        .rows
        .iter()
        .filter(|row| seen.insert(dedup_key(row, width, indices)))
        .collect();
    let removed = raw.len() - unique.len();
    (unique, removed)
}

fn dedup_key(row: &[String], width: usize, indices: ColumnIndices) -> Vec<String> {
    (0..width.max(row.len()))
        .map(|i| {
            let cell = cell_text(row, i).trim();
            if i == indices.date {
                normalize_date(cell)
            } else {
                normalize_number(cell)
            }
        })
        .collect()
}

/// Timestamps stay as written so same-day sales at different times are kept.
fn normalize_date(cell: &str) -> String {
    match parse_date(cell) {
        Some(date) if !cell.contains(':') => date.to_string(),
        _ => cell.to_string(),
    }
}

fn normalize_number(cell: &str) -> String {
    match parse_number(cell) {
        // -0 and 0 compare equal
        Some(number) => (number + 0.0).to_string(),
        None => cell.to_string(),
    }
}

/// Blank cells are already missing and are not counted as failed conversions.
fn coerce_types(rows: &[&Vec<String>], indices: ColumnIndices) -> (Vec<CoercedRow>, usize) {
    let mut failures = 0;
    let mut coerced = Vec::with_capacity(rows.len());

    for row in rows {
        let raw_date = cell_text(row, indices.date);
        let raw_price = cell_text(row, indices.unit_price);
        let raw_quantity = cell_text(row, indices.quantity);

        let date = parse_date(raw_date);
        let unit_price = parse_number(raw_price);
        let quantity = parse_number(raw_quantity);

        failures += [
            (date.is_none(), raw_date),
            (unit_price.is_none(), raw_price),
            (quantity.is_none(), raw_quantity),
        ]
        .iter()
        .filter(|(failed, raw)| *failed && !raw.trim().is_empty())
        .count();

        let product = Some(cell_text(row, indices.product).trim())
            .filter(|p| !p.is_empty())
            .map(str::to_string);

        coerced.push(CoercedRow {
            date,
            product,
            unit_price,
            quantity,
        });
    }

    (coerced, failures)
}

/// Drops rows with a missing field or a non-positive price or quantity.
/// Quantities are truncated to whole units; one that truncates to zero is
/// rejected as well.
fn remove_invalid_records(rows: Vec<CoercedRow>) -> (Vec<ValidRow>, usize) {
    let before = rows.len();

    let valid: Vec<ValidRow> = rows
        .into_iter()
        .filter_map(|row| {
            let (date, product, unit_price, quantity) =
                (row.date?, row.product?, row.unit_price?, row.quantity?);
            if unit_price <= 0.0 || quantity <= 0.0 {
                return None;
            }
            let quantity = quantity.trunc() as u64;
            if quantity == 0 {
                return None;
            }
            Some(ValidRow {
                date,
                product,
                unit_price,
                quantity,
            })
        })
        .collect();

    let removed = before - valid.len();
    (valid, removed)
}

/// Keeps prices inside [Q1 - k*IQR, Q3 + k*IQR], bounds inclusive.
fn remove_price_outliers(rows: Vec<ValidRow>, k: f64) -> (Vec<ValidRow>, usize) {
    let prices: Vec<f64> = rows.iter().map(|r| r.unit_price).collect();
    let (Some(q1), Some(q3)) = (quantile(&prices, 0.25), quantile(&prices, 0.75)) else {
        return (rows, 0);
    };

    let iqr = q3 - q1;
    let lower = q1 - k * iqr;
    let upper = q3 + k * iqr;
    debug!(
        "Unit price bounds: [{:.2}, {:.2}] (Q1 {:.2}, Q3 {:.2}, k {})",
        lower, upper, q1, q3, k
    );

    let before = rows.len();
    let kept: Vec<ValidRow> = rows
        .into_iter()
        .filter(|r| r.unit_price >= lower && r.unit_price <= upper)
        .collect();
    let removed = before - kept.len();
    (kept, removed)
}

/// Adds calendar features, revenue, category, margin and profit.
/// Returns the records and how many of them fell back to the default category.
fn enrich(rows: Vec<ValidRow>, resolver: &dyn CategoryResolver) -> (Vec<CleanRecord>, usize) {
    let mut without_category = 0;

    let records = rows
        .into_iter()
        .map(|row| {
            let revenue = row.unit_price * row.quantity as f64;
            let assignment = resolver.resolve(&row.product);
            if !assignment.matched {
                without_category += 1;
            }

            CleanRecord {
                row_index: 0,
                date: row.date,
                year: row.date.year(),
                month: row.date.month(),
                weekday: row.date.weekday().num_days_from_monday(),
                day: row.date.day(),
                iso_week: iso_week(row.date),
                product: row.product,
                unit_price: row.unit_price,
                quantity: row.quantity,
                revenue,
                profit: round2(revenue * assignment.margin),
                category: assignment.category,
                margin: assignment.margin,
            }
        })
        .collect();

    (records, without_category)
}

/// Stable sort by date, then a dense 0-based index.
fn sort_chronologically(records: &mut [CleanRecord]) {
    records.sort_by_key(|r| r.date);
    for (i, record) in records.iter_mut().enumerate() {
        record.row_index = i;
    }
}

fn utilization_rate(initial: usize, final_count: usize) -> f64 {
    if initial == 0 {
        return 0.0;
    }
    round2(final_count as f64 / initial as f64 * 100.0)
}
