use crate::error::{Result, SalesReportError};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Names of the four input columns every transaction file must carry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(default)]
pub struct ColumnNames {
    #[schemars(description = "Column holding the sale date")]
    pub date: String,
    #[schemars(description = "Column holding the product name")]
    pub product: String,
    #[schemars(description = "Column holding the unit price")]
    pub unit_price: String,
    #[schemars(description = "Column holding the quantity sold")]
    pub quantity: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            date: "date".to_string(),
            product: "product".to_string(),
            unit_price: "unit_price".to_string(),
            quantity: "quantity".to_string(),
        }
    }
}

impl ColumnNames {
    /// Required columns in the order they are reported when missing.
    pub fn required(&self) -> [&str; 4] {
        [
            self.date.as_str(),
            self.product.as_str(),
            self.unit_price.as_str(),
            self.quantity.as_str(),
        ]
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum CategoryStrategy {
    #[schemars(
        description = "Use the curated category reference file when it exists; otherwise assign the fallback category and margin to every row."
    )]
    #[default]
    ReferenceFile,

    #[schemars(description = "Infer categories from product names with the keyword rules.")]
    Keywords,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(default)]
pub struct CleaningConfig {
    #[schemars(
        description = "Prices outside [Q1 - k*IQR, Q3 + k*IQR] are rejected. Null disables outlier rejection."
    )]
    pub iqr_multiplier: Option<f64>,

    pub category_strategy: CategoryStrategy,

    #[schemars(description = "Category assigned when no reference entry matches")]
    pub fallback_category: String,

    #[schemars(description = "Margin fraction assigned when no reference entry matches")]
    pub fallback_margin: f64,
}

impl Default for CleaningConfig {
    fn default() -> Self {
        Self {
            iqr_multiplier: Some(3.0),
            category_strategy: CategoryStrategy::ReferenceFile,
            fallback_category: "Outros".to_string(),
            fallback_margin: 0.20,
        }
    }
}

/// A case-insensitive regular expression mapped to a category.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct KeywordRule {
    pub pattern: String,
    pub category: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct CategoryMargin {
    pub category: String,
    pub margin: f64,
}

/// A lowercase substring of the product name mapped to a margin fraction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct MarginRule {
    pub keyword: String,
    pub margin: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(default)]
pub struct PipelineConfig {
    pub columns: ColumnNames,

    pub cleaning: CleaningConfig,

    #[schemars(
        description = "Ordered keyword rules for category inference. The first match wins, so specific patterns must come before general ones."
    )]
    pub category_rules: Vec<KeywordRule>,

    #[schemars(description = "Margin fraction suggested for each inferred category")]
    pub category_margins: Vec<CategoryMargin>,

    #[schemars(description = "Margin for categories missing from category_margins")]
    pub category_default_margin: f64,

    #[schemars(
        description = "Ordered substring rules used for the estimated profit KPI. The first keyword contained in the lowercased product name wins."
    )]
    pub margin_rules: Vec<MarginRule>,

    #[schemars(description = "Margin used when no margin rule matches")]
    pub default_margin: f64,

    #[schemars(description = "Optional curated category reference CSV")]
    pub category_file: PathBuf,

    #[schemars(description = "Directory receiving the report, charts and JSON artifacts")]
    pub output_dir: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            columns: ColumnNames::default(),
            cleaning: CleaningConfig::default(),
            category_rules: default_category_rules(),
            category_margins: default_category_margins(),
            category_default_margin: 0.22,
            margin_rules: default_margin_rules(),
            default_margin: 0.25,
            category_file: PathBuf::from("dados/categorias_produtos.csv"),
            output_dir: PathBuf::from("output"),
        }
    }
}

impl PipelineConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(k) = self.cleaning.iqr_multiplier {
            if !k.is_finite() || k < 0.0 {
                return Err(SalesReportError::InvalidConfig(format!(
                    "iqr_multiplier must be a non-negative number, got {}",
                    k
                )));
            }
        }

        check_margin("cleaning.fallback_margin", self.cleaning.fallback_margin)?;
        check_margin("category_default_margin", self.category_default_margin)?;
        check_margin("default_margin", self.default_margin)?;

        for entry in &self.category_margins {
            check_margin(&format!("category_margins[{}]", entry.category), entry.margin)?;
        }
        for rule in &self.margin_rules {
            check_margin(&format!("margin_rules[{}]", rule.keyword), rule.margin)?;
        }

        let columns = self.columns.required();
        for (i, name) in columns.iter().enumerate() {
            if name.trim().is_empty() {
                return Err(SalesReportError::InvalidConfig(
                    "column names must not be blank".to_string(),
                ));
            }
            if columns[..i].contains(name) {
                return Err(SalesReportError::InvalidConfig(format!(
                    "column '{}' is mapped more than once",
                    name
                )));
            }
        }

        Ok(())
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = schemars::schema_for!(PipelineConfig);
        serde_json::to_string_pretty(&schema)
    }
}

fn check_margin(field: &str, margin: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&margin) {
        return Err(SalesReportError::InvalidConfig(format!(
            "{} must be a fraction between 0 and 1, got {}",
            field, margin
        )));
    }
    Ok(())
}

// Order matters: "mousepad" before "mouse", webcam before the isolated "hd".
pub fn default_category_rules() -> Vec<KeywordRule> {
    [
        ("notebook", "Notebook"),
        ("monitor", "Monitor"),
        ("teclado", "Teclado"),
        ("headset", "Headset"),
        ("fone|earphone", "Headset"),
        ("mousepad", "Mousepad"),
        ("mouse", "Mouse"),
        ("webcam|camera", "Webcam"),
        ("ssd", "Armazenamento"),
        (r"\bhd\b", "Armazenamento"),
        ("memória|ram|ddr", "Memória RAM"),
    ]
    .into_iter()
    .map(|(pattern, category)| KeywordRule {
        pattern: pattern.to_string(),
        category: category.to_string(),
    })
    .collect()
}

pub fn default_category_margins() -> Vec<CategoryMargin> {
    [
        ("Notebook", 0.20),
        ("Monitor", 0.20),
        ("Memória RAM", 0.25),
        ("Mouse", 0.35),
        ("Teclado", 0.35),
        ("Headset", 0.30),
        ("Armazenamento", 0.25),
        ("Webcam", 0.30),
        ("Mousepad", 0.40),
        ("Outros", 0.22),
    ]
    .into_iter()
    .map(|(category, margin)| CategoryMargin {
        category: category.to_string(),
        margin,
    })
    .collect()
}

// Plain substring matching in this order: "mousepad" hits "mouse" first and
// "webcam hd" hits "hd" first. Both are part of the reference figures.
pub fn default_margin_rules() -> Vec<MarginRule> {
    [
        ("notebook", 0.10),
        ("monitor", 0.15),
        ("ssd", 0.25),
        ("hd", 0.20),
        ("memória", 0.30),
        ("memoria", 0.30),
        ("ram", 0.30),
        ("mouse", 0.50),
        ("teclado", 0.45),
        ("headset", 0.40),
        ("fone", 0.40),
        ("webcam", 0.35),
        ("cadeira", 0.30),
        ("mousepad", 0.60),
    ]
    .into_iter()
    .map(|(keyword, margin)| MarginRule {
        keyword: keyword.to_string(),
        margin,
    })
    .collect()
}
