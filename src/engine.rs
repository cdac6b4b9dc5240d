use crate::category::MarginTable;
use crate::config::PipelineConfig;
use crate::error::{Result, SalesReportError};
use crate::schema::{
    cell_text, AbcClass, AbcEntry, CleanRecord, DayRevenue, ProductRevenue, RawDataset,
    SalesMetrics, WeekdayRevenue,
};
use crate::seasonality::{
    daily_totals, first_max_index, first_min_index, growth_percent, monthly_totals,
    sum_by_key, weekday_totals,
};
use crate::utils::{
    days_in_period, format_date_br, month_key, parse_date, parse_number, round2, weekday_label,
    WEEKDAY_LABELS,
};
use chrono::NaiveDate;
use log::{debug, info, warn};

/// Columns a cleaned table must carry to be analyzed.
pub const REQUIRED_COLUMNS: [&str; 8] = [
    "date",
    "product",
    "unit_price",
    "quantity",
    "revenue",
    "year",
    "month",
    "weekday",
];

/// Length of the product, ABC and day rankings.
pub const TOP_N: usize = 10;

/// The fields of a cleaned transaction the statistics read.
#[derive(Debug, Clone, PartialEq)]
pub struct SaleLine {
    pub date: NaiveDate,
    pub product: String,
    pub unit_price: f64,
    pub quantity: u64,
    pub revenue: f64,
    pub year: i32,
    pub month: u32,
    pub weekday: u32,
}

impl From<&CleanRecord> for SaleLine {
    fn from(record: &CleanRecord) -> Self {
        Self {
            date: record.date,
            product: record.product.clone(),
            unit_price: record.unit_price,
            quantity: record.quantity,
            revenue: record.revenue,
            year: record.year,
            month: record.month,
            weekday: record.weekday,
        }
    }
}

/// Computes the metrics map from a cleaned dataset. Holds only the margin
/// table, so repeated calls on the same input give identical results.
#[derive(Debug, Clone, Default)]
pub struct StatisticsEngine {
    margins: MarginTable,
}

impl StatisticsEngine {
    pub fn new(margins: MarginTable) -> Self {
        Self { margins }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(MarginTable::from_config(config))
    }

    pub fn calculate(&self, records: &[CleanRecord]) -> Result<SalesMetrics> {
        if records.is_empty() {
            return Err(SalesReportError::EmptyDataset(
                "no records to calculate statistics from".to_string(),
            ));
        }
        let lines: Vec<SaleLine> = records.iter().map(SaleLine::from).collect();
        self.calculate_lines(&lines)
    }

    /// Same as `calculate`, for a cleaned dataset in tabular form. Rows whose
    /// date does not parse are dropped silently; rows with unparseable
    /// numeric fields are dropped with a warning.
    pub fn calculate_table(&self, table: &RawDataset) -> Result<SalesMetrics> {
        if table.is_empty() {
            return Err(SalesReportError::EmptyDataset(
                "cleaned table has no rows".to_string(),
            ));
        }

        let missing = table.missing_columns(REQUIRED_COLUMNS);
        if !missing.is_empty() {
            return Err(SalesReportError::schema(missing, &table.columns));
        }

        let idx: Vec<usize> = REQUIRED_COLUMNS
            .iter()
            .map(|name| table.column_index(name).unwrap_or_default())
            .collect();

        let mut lines = Vec::with_capacity(table.len());
        let mut bad_dates = 0;
        let mut bad_numbers = 0;

        for row in &table.rows {
            let Some(date) = parse_date(cell_text(row, idx[0])) else {
                bad_dates += 1;
                continue;
            };

            match parse_line_numbers(row, &idx) {
                Some((unit_price, quantity, revenue, year, month, weekday)) => {
                    lines.push(SaleLine {
                        date,
                        product: cell_text(row, idx[1]).trim().to_string(),
                        unit_price,
                        quantity,
                        revenue,
                        year,
                        month,
                        weekday,
                    });
                }
                None => bad_numbers += 1,
            }
        }

        if bad_dates > 0 {
            debug!("Dropped {} rows with unparseable dates", bad_dates);
        }
        if bad_numbers > 0 {
            warn!("Dropped {} rows with unparseable numeric fields", bad_numbers);
        }

        self.calculate_lines(&lines)
    }

    pub fn calculate_lines(&self, lines: &[SaleLine]) -> Result<SalesMetrics> {
        let (Some(start), Some(end)) = (
            lines.iter().map(|l| l.date).min(),
            lines.iter().map(|l| l.date).max(),
        ) else {
            return Err(SalesReportError::EmptyDataset(
                "no rows with a valid date".to_string(),
            ));
        };

        // Financial
        let gmv: f64 = lines.iter().map(|l| l.revenue).sum();
        let estimated_profit: f64 = lines
            .iter()
            .map(|l| l.revenue * self.margins.margin_for(&l.product))
            .sum();
        let average_margin = if gmv > 0.0 {
            estimated_profit / gmv * 100.0
        } else {
            0.0
        };
        let total_transactions = lines.len();
        let total_units: u64 = lines.iter().map(|l| l.quantity).sum();
        let average_ticket = gmv / total_transactions as f64;

        let daily = daily_totals(lines.iter().map(|l| (l.date, l.revenue)));
        let average_daily_revenue = daily.values().sum::<f64>() / daily.len() as f64;
        let days_analyzed = days_in_period(start, end);

        // Products
        let ranked = rank_products(lines);
        let top_products = ranked
            .iter()
            .take(TOP_N)
            .map(|(product, revenue)| ProductRevenue {
                product: product.clone(),
                revenue: round2(*revenue),
            })
            .collect();
        let abc_curve = abc_curve(&ranked, gmv).into_iter().take(TOP_N).collect();

        // Seasonality
        let weekdays = weekday_totals(lines.iter().map(|l| (l.weekday, l.revenue)));
        let best_weekday = weekday_label(first_max_index(&weekdays).unwrap_or(0) as u32);
        let revenue_by_weekday = WEEKDAY_LABELS
            .iter()
            .zip(weekdays.iter())
            .map(|(label, revenue)| WeekdayRevenue {
                weekday: label.to_string(),
                revenue: round2(*revenue),
            })
            .collect();

        let monthly = monthly_totals(lines.iter().map(|l| ((l.year, l.month), l.revenue)));
        let month_keys: Vec<String> = monthly.keys().map(|(y, m)| month_key(*y, *m)).collect();
        let month_values: Vec<f64> = monthly.values().copied().collect();
        let best_month = first_max_index(&month_values).map(|i| month_keys[i].clone());
        let worst_month = first_min_index(&month_values).map(|i| month_keys[i].clone());
        let growth = growth_percent(&monthly);
        let monthly_revenue = month_keys
            .iter()
            .cloned()
            .zip(month_values.iter().map(|v| round2(*v)))
            .collect();

        let top_days = rank_days(&daily)
            .into_iter()
            .take(TOP_N)
            .map(|(date, revenue)| DayRevenue {
                date: format_date_br(date),
                revenue: round2(revenue),
            })
            .collect();

        // Temporal quality
        let days_with_sales = daily.len();
        let temporal_density = days_with_sales as f64 / days_analyzed as f64 * 100.0;

        info!(
            "Calculated statistics for {} transactions between {} and {}",
            total_transactions, start, end
        );

        Ok(SalesMetrics {
            gmv: round2(gmv),
            estimated_profit: round2(estimated_profit),
            average_margin_percent: round2(average_margin),
            total_transactions,
            total_units,
            average_ticket: round2(average_ticket),
            average_daily_revenue: round2(average_daily_revenue),
            start_date: format_date_br(start),
            end_date: format_date_br(end),
            days_analyzed,
            top_products,
            abc_curve,
            revenue_by_weekday,
            best_weekday: best_weekday.to_string(),
            monthly_revenue,
            growth_percent: round2(growth),
            best_month,
            worst_month,
            top_days,
            days_with_sales,
            period_days: days_analyzed,
            temporal_density_percent: round2(temporal_density),
        })
    }
}

/// Products by total revenue, descending. Ties keep alphabetical order.
pub fn rank_products(lines: &[SaleLine]) -> Vec<(String, f64)> {
    let mut ranked: Vec<(String, f64)> =
        sum_by_key(lines.iter().map(|l| (l.product.clone(), l.revenue)))
            .into_iter()
            .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    ranked
}

/// Classifies ranked products by their cumulative share of `total`.
pub fn abc_curve(ranked: &[(String, f64)], total: f64) -> Vec<AbcEntry> {
    let mut cumulative = 0.0;
    ranked
        .iter()
        .map(|(product, revenue)| {
            let share = if total > 0.0 {
                revenue / total * 100.0
            } else {
                0.0
            };
            cumulative += share;
            AbcEntry {
                product: product.clone(),
                revenue: round2(*revenue),
                class: AbcClass::from_cumulative_share(cumulative),
            }
        })
        .collect()
}

/// Days by total revenue, descending. Ties keep chronological order.
fn rank_days(daily: &std::collections::BTreeMap<NaiveDate, f64>) -> Vec<(NaiveDate, f64)> {
    let mut ranked: Vec<(NaiveDate, f64)> = daily.iter().map(|(d, v)| (*d, *v)).collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    ranked
}

type LineNumbers = (f64, u64, f64, i32, u32, u32);

fn parse_line_numbers(row: &[String], idx: &[usize]) -> Option<LineNumbers> {
    let unit_price = parse_number(cell_text(row, idx[2]))?;
    let quantity = parse_number(cell_text(row, idx[3])).filter(|q| *q >= 0.0)?.trunc() as u64;
    let revenue = parse_number(cell_text(row, idx[4]))?;
    let year = cell_text(row, idx[5]).trim().parse::<i32>().ok()?;
    let month = cell_text(row, idx[6]).trim().parse::<u32>().ok().filter(|m| (1..=12).contains(m))?;
    let weekday = cell_text(row, idx[7]).trim().parse::<u32>().ok().filter(|w| *w < 7)?;
    Some((unit_price, quantity, revenue, year, month, weekday))
}
