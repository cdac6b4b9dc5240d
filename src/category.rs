use crate::config::{CategoryMargin, CategoryStrategy, KeywordRule, MarginRule, PipelineConfig};
use crate::error::{Result, SalesReportError};
use crate::schema::CategoryEntry;
use log::debug;
use regex::{Regex, RegexBuilder};
use std::collections::{HashMap, HashSet};

pub const FALLBACK_CATEGORY: &str = "Outros";

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryAssignment {
    pub category: String,
    pub margin: f64,
    /// False when the fallback category was applied
    pub matched: bool,
}

/// Maps a product name to a category and a margin fraction.
pub trait CategoryResolver {
    fn resolve(&self, product: &str) -> CategoryAssignment;
}

/// Ordered keyword heuristic. Patterns are case-insensitive regular
/// expressions and the first one that matches decides the category.
#[derive(Debug, Clone)]
pub struct KeywordCategorizer {
    rules: Vec<(Regex, String)>,
    margins: HashMap<String, f64>,
    default_margin: f64,
}

impl KeywordCategorizer {
    pub fn new(
        rules: &[KeywordRule],
        margins: &[CategoryMargin],
        default_margin: f64,
    ) -> Result<Self> {
        let compiled = rules
            .iter()
            .map(|rule| {
                RegexBuilder::new(&rule.pattern)
                    .case_insensitive(true)
                    .build()
                    .map(|re| (re, rule.category.clone()))
                    .map_err(|e| SalesReportError::InvalidRule {
                        pattern: rule.pattern.clone(),
                        details: e.to_string(),
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            rules: compiled,
            margins: margins
                .iter()
                .map(|m| (m.category.clone(), m.margin))
                .collect(),
            default_margin,
        })
    }

    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        Self::new(
            &config.category_rules,
            &config.category_margins,
            config.category_default_margin,
        )
    }

    pub fn infer_category(&self, product: &str) -> Option<&str> {
        let lowered = product.to_lowercase();
        self.rules
            .iter()
            .find(|(pattern, _)| pattern.is_match(&lowered))
            .map(|(_, category)| category.as_str())
    }

    pub fn margin_for(&self, category: &str) -> f64 {
        self.margins
            .get(category)
            .copied()
            .unwrap_or(self.default_margin)
    }
}

impl CategoryResolver for KeywordCategorizer {
    fn resolve(&self, product: &str) -> CategoryAssignment {
        match self.infer_category(product) {
            Some(category) => CategoryAssignment {
                category: category.to_string(),
                margin: self.margin_for(category),
                matched: true,
            },
            None => CategoryAssignment {
                category: FALLBACK_CATEGORY.to_string(),
                margin: self.margin_for(FALLBACK_CATEGORY),
                matched: false,
            },
        }
    }
}

/// Curated per-product categories loaded from the reference file.
#[derive(Debug, Clone)]
pub struct CategoryReferenceTable {
    entries: HashMap<String, CategoryEntry>,
    fallback: FixedCategory,
}

impl CategoryReferenceTable {
    pub fn new(entries: Vec<CategoryEntry>, fallback: FixedCategory) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|entry| (entry.product.clone(), entry))
                .collect(),
            fallback,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl CategoryResolver for CategoryReferenceTable {
    // Category and margin fall back independently; only a missing category
    // counts as unmatched.
    fn resolve(&self, product: &str) -> CategoryAssignment {
        let Some(entry) = self.entries.get(product.trim()) else {
            return self.fallback.resolve(product);
        };

        CategoryAssignment {
            category: entry
                .suggested_category
                .clone()
                .unwrap_or_else(|| self.fallback.category.clone()),
            margin: entry.suggested_margin.unwrap_or(self.fallback.margin),
            matched: entry.suggested_category.is_some(),
        }
    }
}

/// Assigns the same category and margin to every product.
#[derive(Debug, Clone, PartialEq)]
pub struct FixedCategory {
    pub category: String,
    pub margin: f64,
}

impl FixedCategory {
    pub fn new(category: impl Into<String>, margin: f64) -> Self {
        Self {
            category: category.into(),
            margin,
        }
    }
}

impl CategoryResolver for FixedCategory {
    fn resolve(&self, _product: &str) -> CategoryAssignment {
        CategoryAssignment {
            category: self.category.clone(),
            margin: self.margin,
            matched: false,
        }
    }
}

/// Substring → margin table behind the estimated profit KPI. Independent of
/// the category assigned during cleaning.
#[derive(Debug, Clone, PartialEq)]
pub struct MarginTable {
    rules: Vec<MarginRule>,
    default_margin: f64,
}

impl MarginTable {
    pub fn new(rules: &[MarginRule], default_margin: f64) -> Self {
        Self {
            rules: rules
                .iter()
                .map(|rule| MarginRule {
                    keyword: rule.keyword.to_lowercase(),
                    margin: rule.margin,
                })
                .collect(),
            default_margin,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(&config.margin_rules, config.default_margin)
    }

    pub fn margin_for(&self, product: &str) -> f64 {
        let lowered = product.to_lowercase();
        self.rules
            .iter()
            .find(|rule| lowered.contains(&rule.keyword))
            .map(|rule| rule.margin)
            .unwrap_or(self.default_margin)
    }
}

impl Default for MarginTable {
    fn default() -> Self {
        Self::from_config(&PipelineConfig::default())
    }
}

/// Picks the resolver used during cleaning. With the reference strategy and
/// no reference file every row receives the fallback category.
pub fn build_resolver(
    config: &PipelineConfig,
    reference: Option<Vec<CategoryEntry>>,
) -> Result<Box<dyn CategoryResolver>> {
    let fallback = FixedCategory::new(
        config.cleaning.fallback_category.clone(),
        config.cleaning.fallback_margin,
    );

    let resolver: Box<dyn CategoryResolver> = match config.cleaning.category_strategy {
        CategoryStrategy::Keywords => Box::new(KeywordCategorizer::from_config(config)?),
        CategoryStrategy::ReferenceFile => match reference {
            Some(entries) => {
                debug!("Resolving categories from {} reference entries", entries.len());
                Box::new(CategoryReferenceTable::new(entries, fallback))
            }
            None => Box::new(fallback),
        },
    };

    Ok(resolver)
}

/// Infers one reference entry per distinct product, in first-seen order.
/// The output is meant to be reviewed by hand and fed back as the
/// category reference file.
pub fn generate_reference_table<'a, I>(
    products: I,
    categorizer: &KeywordCategorizer,
) -> Vec<CategoryEntry>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = HashSet::new();
    let mut entries = Vec::new();

    for product in products {
        if !seen.insert(product) {
            continue;
        }
        let assignment = categorizer.resolve(product);
        entries.push(CategoryEntry {
            product: product.to_string(),
            suggested_category: Some(assignment.category),
            suggested_margin: Some(assignment.margin),
        });
    }

    entries
}
