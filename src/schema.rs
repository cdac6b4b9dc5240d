use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Untyped table as read from a CSV file. Blank cells mean "missing".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawDataset {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawDataset {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { columns, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Required column names absent from this table, in the order given.
    pub fn missing_columns<'a, I>(&self, required: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        required
            .into_iter()
            .filter(|name| self.column_index(name).is_none())
            .map(str::to_string)
            .collect()
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&str> {
        self.rows.get(row).map(|r| cell_text(r, column))
    }
}

/// Text of one cell. Cells past the end of a short row read as blank, which
/// downstream stages treat as missing.
pub fn cell_text(row: &[String], index: usize) -> &str {
    row.get(index).map(String::as_str).unwrap_or("")
}

/// A transaction that survived cleaning, with every derived field filled in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CleanRecord {
    /// Dense position after chronological ordering
    pub row_index: usize,
    pub date: NaiveDate,
    pub product: String,
    pub unit_price: f64,
    pub quantity: u64,
    /// unit_price * quantity, unrounded
    pub revenue: f64,
    pub year: i32,
    pub month: u32,
    /// 0 = Monday .. 6 = Sunday
    pub weekday: u32,
    pub day: u32,
    pub iso_week: u32,
    pub category: String,
    pub margin: f64,
    /// revenue * margin, rounded to cents
    pub profit: f64,
}

/// Counters accumulated by one cleaning run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CleaningReport {
    pub records_initial: usize,
    pub duplicates_removed: usize,
    pub invalid_values_converted: usize,
    pub invalid_records_removed: usize,
    pub outliers_removed: usize,
    pub products_without_category: usize,
    pub records_final: usize,
    pub utilization_rate: f64,
}

impl CleaningReport {
    pub fn records_removed(&self) -> usize {
        self.records_initial.saturating_sub(self.records_final)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CleanedDataset {
    records: Vec<CleanRecord>,
    report: CleaningReport,
}

impl CleanedDataset {
    pub(crate) fn new(records: Vec<CleanRecord>, report: CleaningReport) -> Self {
        Self { records, report }
    }

    pub fn records(&self) -> &[CleanRecord] {
        &self.records
    }

    pub fn cleaning_report(&self) -> &CleaningReport {
        &self.report
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_parts(self) -> (Vec<CleanRecord>, CleaningReport) {
        (self.records, self.report)
    }
}

/// One row of the category reference file. Either suggestion may be blank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CategoryEntry {
    pub product: String,
    pub suggested_category: Option<String>,
    pub suggested_margin: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ProductRevenue {
    pub product: String,
    pub revenue: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum AbcClass {
    #[schemars(description = "Cumulative revenue share up to 80%")]
    A,
    #[schemars(description = "Cumulative revenue share above 80% and up to 95%")]
    B,
    #[schemars(description = "Cumulative revenue share above 95%")]
    C,
}

impl AbcClass {
    pub fn from_cumulative_share(cumulative_percent: f64) -> Self {
        if cumulative_percent <= 80.0 {
            AbcClass::A
        } else if cumulative_percent <= 95.0 {
            AbcClass::B
        } else {
            AbcClass::C
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AbcClass::A => "A",
            AbcClass::B => "B",
            AbcClass::C => "C",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AbcEntry {
    pub product: String,
    pub revenue: f64,
    pub class: AbcClass,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct WeekdayRevenue {
    /// Three-letter label, e.g. "Seg"
    pub weekday: String,
    pub revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DayRevenue {
    /// DD/MM/YYYY
    pub date: String,
    pub revenue: f64,
}

/// Everything the statistics engine derives from one cleaned dataset.
/// Serialized keys are the stable contract read by the report layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SalesMetrics {
    #[schemars(description = "Gross merchandise value: total revenue")]
    pub gmv: f64,

    #[serde(rename = "lucro_estimado")]
    #[schemars(description = "Revenue weighted by the keyword margin table")]
    pub estimated_profit: f64,

    #[serde(rename = "margem_media_percent")]
    pub average_margin_percent: f64,

    #[serde(rename = "total_transacoes")]
    pub total_transactions: usize,

    #[serde(rename = "total_unidades")]
    pub total_units: u64,

    #[serde(rename = "ticket_medio")]
    pub average_ticket: f64,

    #[serde(rename = "receita_media_diaria")]
    #[schemars(description = "Mean revenue over the days that had sales")]
    pub average_daily_revenue: f64,

    #[serde(rename = "data_inicio")]
    pub start_date: String,

    #[serde(rename = "data_fim")]
    pub end_date: String,

    #[serde(rename = "dias_analisados")]
    pub days_analyzed: i64,

    #[serde(rename = "top_produtos")]
    pub top_products: Vec<ProductRevenue>,

    #[serde(rename = "curva_abc")]
    pub abc_curve: Vec<AbcEntry>,

    #[serde(rename = "receita_dia_semana")]
    #[schemars(description = "Always seven entries, Monday first")]
    pub revenue_by_weekday: Vec<WeekdayRevenue>,

    #[serde(rename = "melhor_dia_semana")]
    pub best_weekday: String,

    #[serde(rename = "receita_mensal")]
    #[schemars(description = "Revenue per YYYY-MM key")]
    pub monthly_revenue: BTreeMap<String, f64>,

    #[serde(rename = "crescimento_percentual")]
    #[schemars(description = "Last month's revenue against the first month's")]
    pub growth_percent: f64,

    #[serde(rename = "melhor_mes")]
    pub best_month: Option<String>,

    #[serde(rename = "pior_mes")]
    pub worst_month: Option<String>,

    #[serde(rename = "top_dias")]
    pub top_days: Vec<DayRevenue>,

    #[serde(rename = "dias_com_venda")]
    pub days_with_sales: usize,

    #[serde(rename = "dias_periodo")]
    pub period_days: i64,

    #[serde(rename = "densidade_temporal_percent")]
    #[schemars(description = "Share of calendar days in the period that had at least one sale")]
    pub temporal_density_percent: f64,
}

impl SalesMetrics {
    pub fn weekday_revenue(&self, label: &str) -> Option<f64> {
        self.revenue_by_weekday
            .iter()
            .find(|w| w.weekday == label)
            .map(|w| w.revenue)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn schema_as_json() -> Result<String, serde_json::Error> {
        let schema = schemars::schema_for!(SalesMetrics);
        serde_json::to_string_pretty(&schema)
    }
}
