use crate::schema::{AbcClass, SalesMetrics};
use crate::utils::{format_brl, month_label};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightKind {
    ChampionProduct,
    BestWeekday,
    BestMonth,
    Growth,
    Decline,
    Stability,
    Concentration,
    QualityExcellent,
    QualityGood,
    QualityMedium,
    QualityLow,
    PeakDay,
    TicketHigh,
    TicketHealthy,
    TicketLow,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub kind: InsightKind,
    /// Plain text; `**` marks the highlighted figures.
    pub message: String,
}

impl Insight {
    fn new(kind: InsightKind, message: String) -> Self {
        Self { kind, message }
    }
}

/// Thresholds behind the automatic insights.
#[derive(Debug, Clone, PartialEq)]
pub struct InsightThresholds {
    /// Growth above this (in %) is positive, below its negation a decline
    pub growth: f64,
    pub density_excellent: f64,
    pub density_good: f64,
    pub density_medium: f64,
    pub ticket_high: f64,
    pub ticket_healthy: f64,
}

impl Default for InsightThresholds {
    fn default() -> Self {
        Self {
            growth: 5.0,
            density_excellent: 95.0,
            density_good: 80.0,
            density_medium: 60.0,
            ticket_high: 500.0,
            ticket_healthy: 200.0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct InsightGenerator {
    thresholds: InsightThresholds,
}

impl InsightGenerator {
    pub fn new(thresholds: InsightThresholds) -> Self {
        Self { thresholds }
    }

    /// Builds the insights in display order. Anything whose source metric is
    /// absent is skipped rather than reported with a placeholder.
    pub fn generate(&self, metrics: &SalesMetrics) -> Vec<Insight> {
        let mut insights = Vec::new();
        let t = &self.thresholds;

        if let Some(top) = metrics.top_products.first() {
            let message = if metrics.gmv > 0.0 {
                format!(
                    "**{}** é o produto campeão, gerando **{}** ({:.1}% do faturamento total).",
                    top.product,
                    format_brl(top.revenue),
                    top.revenue / metrics.gmv * 100.0
                )
            } else {
                format!(
                    "**{}** é o produto campeão, gerando **{}**.",
                    top.product,
                    format_brl(top.revenue)
                )
            };
            insights.push(Insight::new(InsightKind::ChampionProduct, message));
        }

        if let Some(revenue) = metrics.weekday_revenue(&metrics.best_weekday) {
            insights.push(Insight::new(
                InsightKind::BestWeekday,
                format!(
                    "**{}** é o melhor dia para vendas, com **{}** em receita acumulada.",
                    metrics.best_weekday,
                    format_brl(revenue)
                ),
            ));
        }

        if let Some(month) = &metrics.best_month {
            if let (Some(revenue), Some(label)) =
                (metrics.monthly_revenue.get(month), month_label(month))
            {
                insights.push(Insight::new(
                    InsightKind::BestMonth,
                    format!(
                        "O melhor mês foi **{}**, com **{}** em faturamento.",
                        label,
                        format_brl(*revenue)
                    ),
                ));
            }
        }

        let growth = metrics.growth_percent;
        insights.push(if growth > t.growth {
            Insight::new(
                InsightKind::Growth,
                format!("Crescimento positivo de **{:.1}%** no período analisado!", growth),
            )
        } else if growth < -t.growth {
            Insight::new(
                InsightKind::Decline,
                format!(
                    "Atenção: queda de **{:.1}%** no período. Recomenda-se análise detalhada.",
                    growth.abs()
                ),
            )
        } else {
            Insight::new(
                InsightKind::Stability,
                format!("Vendas estáveis, com variação de **{:.1}%**.", growth),
            )
        });

        if !metrics.abc_curve.is_empty() && metrics.gmv > 0.0 {
            let class_a: Vec<f64> = metrics
                .abc_curve
                .iter()
                .filter(|e| e.class == AbcClass::A)
                .map(|e| e.revenue)
                .collect();
            let concentration = class_a.iter().sum::<f64>() / metrics.gmv * 100.0;
            insights.push(Insight::new(
                InsightKind::Concentration,
                format!(
                    "**{} produtos** da classe A representam **{:.1}%** da receita total.",
                    class_a.len(),
                    concentration
                ),
            ));
        }

        let density = metrics.temporal_density_percent;
        insights.push(if density > t.density_excellent {
            Insight::new(
                InsightKind::QualityExcellent,
                format!(
                    "Excelente densidade de dados (**{:.1}%**), cobrindo praticamente todo o período analisado.",
                    density
                ),
            )
        } else if density > t.density_good {
            Insight::new(
                InsightKind::QualityGood,
                format!(
                    "Boa presença de dados ao longo do período (**{:.1}%** de cobertura).",
                    density
                ),
            )
        } else if density > t.density_medium {
            Insight::new(
                InsightKind::QualityMedium,
                format!(
                    "Cobertura mediana de dados (**{:.1}%**). Algumas lacunas podem afetar análises de tendência.",
                    density
                ),
            )
        } else {
            Insight::new(
                InsightKind::QualityLow,
                format!(
                    "Baixa densidade de dados (**{:.1}%**). Existem lacunas significativas que podem distorcer conclusões.",
                    density
                ),
            )
        });

        if let Some(peak) = metrics.top_days.first() {
            insights.push(Insight::new(
                InsightKind::PeakDay,
                format!(
                    "Dia com maior receita: **{}**, com **{}** em faturamento.",
                    peak.date,
                    format_brl(peak.revenue)
                ),
            ));
        }

        let ticket = metrics.average_ticket;
        if ticket > 0.0 {
            insights.push(if ticket > t.ticket_high {
                Insight::new(
                    InsightKind::TicketHigh,
                    format!(
                        "Ticket médio alto de **{}** indica vendas de produtos premium.",
                        format_brl(ticket)
                    ),
                )
            } else if ticket > t.ticket_healthy {
                Insight::new(
                    InsightKind::TicketHealthy,
                    format!(
                        "Ticket médio de **{}** está em patamar saudável.",
                        format_brl(ticket)
                    ),
                )
            } else {
                Insight::new(
                    InsightKind::TicketLow,
                    format!(
                        "Ticket médio de **{}**. Considere estratégias de upsell.",
                        format_brl(ticket)
                    ),
                )
            });
        }

        insights
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{AbcEntry, DayRevenue, ProductRevenue, WeekdayRevenue};
    use crate::utils::WEEKDAY_LABELS;
    use std::collections::BTreeMap;

    fn sample_metrics() -> SalesMetrics {
        let mut monthly_revenue = BTreeMap::new();
        monthly_revenue.insert("2024-06".to_string(), 35000.0);
        monthly_revenue.insert("2024-07".to_string(), 30000.0);

        SalesMetrics {
            gmv: 100000.0,
            estimated_profit: 20000.0,
            average_margin_percent: 20.0,
            total_transactions: 300,
            total_units: 420,
            average_ticket: 325.5,
            average_daily_revenue: 1500.0,
            start_date: "01/06/2024".to_string(),
            end_date: "31/07/2024".to_string(),
            days_analyzed: 61,
            top_products: vec![
                ProductRevenue {
                    product: "Notebook Dell".to_string(),
                    revenue: 45000.0,
                },
                ProductRevenue {
                    product: "Monitor LG".to_string(),
                    revenue: 25000.0,
                },
            ],
            abc_curve: vec![
                AbcEntry {
                    product: "Notebook Dell".to_string(),
                    revenue: 45000.0,
                    class: AbcClass::A,
                },
                AbcEntry {
                    product: "Monitor LG".to_string(),
                    revenue: 25000.0,
                    class: AbcClass::A,
                },
                AbcEntry {
                    product: "Mouse".to_string(),
                    revenue: 5000.0,
                    class: AbcClass::B,
                },
            ],
            revenue_by_weekday: WEEKDAY_LABELS
                .iter()
                .map(|label| WeekdayRevenue {
                    weekday: label.to_string(),
                    revenue: if *label == "Sex" { 25000.0 } else { 0.0 },
                })
                .collect(),
            best_weekday: "Sex".to_string(),
            monthly_revenue,
            growth_percent: 15.5,
            best_month: Some("2024-06".to_string()),
            worst_month: Some("2024-07".to_string()),
            top_days: vec![DayRevenue {
                date: "15/06/2024".to_string(),
                revenue: 8500.0,
            }],
            days_with_sales: 53,
            period_days: 61,
            temporal_density_percent: 87.3,
        }
    }

    fn kinds(insights: &[Insight]) -> Vec<InsightKind> {
        insights.iter().map(|i| i.kind).collect()
    }

    #[test]
    fn test_full_insight_set() {
        let insights = InsightGenerator::default().generate(&sample_metrics());
        assert_eq!(
            kinds(&insights),
            vec![
                InsightKind::ChampionProduct,
                InsightKind::BestWeekday,
                InsightKind::BestMonth,
                InsightKind::Growth,
                InsightKind::Concentration,
                InsightKind::QualityGood,
                InsightKind::PeakDay,
                InsightKind::TicketHealthy,
            ]
        );
        assert!(insights[0].message.contains("45.0%"));
        assert!(insights[2].message.contains("Jun/2024"));
        assert!(insights[4].message.contains("**2 produtos**"));
        assert!(insights[4].message.contains("70.0%"));
    }

    #[test]
    fn test_growth_buckets() {
        let generator = InsightGenerator::default();
        let mut metrics = sample_metrics();

        metrics.growth_percent = 30.0;
        assert!(kinds(&generator.generate(&metrics)).contains(&InsightKind::Growth));

        metrics.growth_percent = -12.0;
        let insights = generator.generate(&metrics);
        let decline = insights.iter().find(|i| i.kind == InsightKind::Decline).unwrap();
        assert!(decline.message.contains("12.0%"));

        metrics.growth_percent = 5.0;
        assert!(kinds(&generator.generate(&metrics)).contains(&InsightKind::Stability));
    }

    #[test]
    fn test_density_buckets() {
        let generator = InsightGenerator::default();
        let mut metrics = sample_metrics();

        for (density, kind) in [
            (99.0, InsightKind::QualityExcellent),
            (95.0, InsightKind::QualityGood),
            (70.0, InsightKind::QualityMedium),
            (60.0, InsightKind::QualityLow),
        ] {
            metrics.temporal_density_percent = density;
            assert!(kinds(&generator.generate(&metrics)).contains(&kind));
        }
    }

    #[test]
    fn test_ticket_buckets_and_omission() {
        let generator = InsightGenerator::default();
        let mut metrics = sample_metrics();

        metrics.average_ticket = 800.0;
        assert!(kinds(&generator.generate(&metrics)).contains(&InsightKind::TicketHigh));

        metrics.average_ticket = 150.0;
        assert!(kinds(&generator.generate(&metrics)).contains(&InsightKind::TicketLow));

        metrics.average_ticket = 0.0;
        let found = kinds(&generator.generate(&metrics));
        assert!(!found.contains(&InsightKind::TicketLow));
        assert!(!found.contains(&InsightKind::TicketHigh));
        assert!(!found.contains(&InsightKind::TicketHealthy));
    }

    #[test]
    fn test_missing_sources_are_omitted() {
        let mut metrics = sample_metrics();
        metrics.top_products.clear();
        metrics.abc_curve.clear();
        metrics.top_days.clear();
        metrics.best_month = None;

        let found = kinds(&InsightGenerator::default().generate(&metrics));
        assert!(!found.contains(&InsightKind::ChampionProduct));
        assert!(!found.contains(&InsightKind::Concentration));
        assert!(!found.contains(&InsightKind::PeakDay));
        assert!(!found.contains(&InsightKind::BestMonth));
    }
}
