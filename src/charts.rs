//! Standalone SVG charts over the cleaned dataset.
//!
//! Every chart is a self-contained `<svg>` document written under
//! `<output>/graficos`, so the HTML report can reference it by a relative
//! path without any rendering backend.

use crate::engine::{rank_products, SaleLine};
use crate::error::Result;
use crate::schema::CleanRecord;
use crate::seasonality::{daily_totals, monthly_totals, weekday_totals};
use crate::utils::{escape_html, format_date_br, month_key, WEEKDAY_LABELS};
use log::{debug, info};
use std::collections::BTreeMap;
use std::fmt::Write;
use std::path::{Path, PathBuf};

/// Sub-directory of the output directory that receives the chart files.
pub const CHART_DIR: &str = "graficos";

const MARGIN_TOP: f64 = 50.0;
const MARGIN_RIGHT: f64 = 30.0;
const MARGIN_BOTTOM: f64 = 80.0;
const MARGIN_LEFT: f64 = 90.0;
const LABEL_MARGIN_LEFT: f64 = 220.0;
const GRID_LINES: usize = 5;
const MAX_X_LABELS: usize = 12;
const MAX_LABEL_CHARS: usize = 28;
const BAR_COLOR: &str = "#2563eb";
const LINE_COLOR: &str = "#16a34a";

/// One bucket of the transaction-value histogram. `upper` is inclusive for
/// the last bucket only.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartRenderer {
    pub width: f64,
    pub height: f64,
    pub top_products: usize,
    pub histogram_bins: usize,
}

impl Default for ChartRenderer {
    fn default() -> Self {
        Self {
            width: 960.0,
            height: 480.0,
            top_products: 10,
            histogram_bins: 30,
        }
    }
}

impl ChartRenderer {
    /// Writes every chart into `output_dir/graficos` and returns the chart
    /// name → path map, paths relative to `output_dir`. Nothing is written
    /// for an empty dataset.
    pub fn render_all(
        &self,
        records: &[CleanRecord],
        output_dir: &Path,
    ) -> Result<BTreeMap<String, PathBuf>> {
        let mut paths = BTreeMap::new();
        if records.is_empty() {
            info!("No records to chart, skipping chart rendering");
            return Ok(paths);
        }

        let chart_dir = output_dir.join(CHART_DIR);
        std::fs::create_dir_all(&chart_dir)?;

        let charts = [
            ("receita_diaria", self.daily_revenue(records)),
            ("receita_mensal", self.monthly_revenue(records)),
            ("receita_dia_semana", self.weekday_revenue(records)),
            ("top_produtos", self.top_products_chart(records)),
            ("distribuicao_ticket", self.ticket_distribution(records)),
        ];

        for (name, svg) in charts {
            let file_name = format!("{}.svg", name);
            let path = chart_dir.join(&file_name);
            std::fs::write(&path, svg)?;
            debug!("Wrote chart {}", path.display());
            paths.insert(name.to_string(), Path::new(CHART_DIR).join(file_name));
        }

        info!("Rendered {} charts into {}", paths.len(), chart_dir.display());
        Ok(paths)
    }

    pub fn daily_revenue(&self, records: &[CleanRecord]) -> String {
        let points: Vec<(String, f64)> = daily_totals(records.iter().map(|r| (r.date, r.revenue)))
            .into_iter()
            .map(|(date, revenue)| (format_date_br(date), revenue))
            .collect();
        self.line_chart("Evolução da Receita Diária", "Receita (R$)", &points)
    }

    pub fn monthly_revenue(&self, records: &[CleanRecord]) -> String {
        let bars: Vec<(String, f64)> =
            monthly_totals(records.iter().map(|r| ((r.year, r.month), r.revenue)))
                .into_iter()
                .map(|((year, month), revenue)| (month_key(year, month), revenue))
                .collect();
        self.column_chart("Receita Mensal", "Receita (R$)", &bars)
    }

    pub fn weekday_revenue(&self, records: &[CleanRecord]) -> String {
        let totals = weekday_totals(records.iter().map(|r| (r.weekday, r.revenue)));
        let bars: Vec<(String, f64)> = WEEKDAY_LABELS
            .iter()
            .zip(totals.iter())
            .map(|(label, revenue)| (label.to_string(), *revenue))
            .collect();
        self.column_chart("Receita por Dia da Semana", "Receita (R$)", &bars)
    }

    pub fn top_products_chart(&self, records: &[CleanRecord]) -> String {
        let lines: Vec<SaleLine> = records.iter().map(SaleLine::from).collect();
        let top: Vec<(String, f64)> = rank_products(&lines)
            .into_iter()
            .take(self.top_products)
            .collect();
        let title = format!("Top {} Produtos por Receita", self.top_products);
        self.horizontal_bar_chart(&title, &top)
    }

    pub fn ticket_distribution(&self, records: &[CleanRecord]) -> String {
        let revenues: Vec<f64> = records.iter().map(|r| r.revenue).collect();
        let bars: Vec<(String, f64)> = histogram(&revenues, self.histogram_bins)
            .into_iter()
            .map(|bin| (format!("{:.0}", bin.lower), bin.count as f64))
            .collect();
        self.column_chart(
            "Distribuição da Receita por Transação",
            "Transações",
            &bars,
        )
    }

    fn plot_width(&self, left: f64) -> f64 {
        (self.width - left - MARGIN_RIGHT).max(1.0)
    }

    fn plot_height(&self) -> f64 {
        (self.height - MARGIN_TOP - MARGIN_BOTTOM).max(1.0)
    }

    fn y_position(&self, value: f64, max: f64) -> f64 {
        MARGIN_TOP + self.plot_height() * (1.0 - value / max)
    }

    fn open_document(&self, title: &str) -> String {
        let mut svg = String::new();
        let _ = writeln!(
            svg,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}" font-family="sans-serif">"#,
            w = self.width,
            h = self.height
        );
        let _ = writeln!(
            svg,
            r##"<rect width="100%" height="100%" fill="#ffffff"/>"##
        );
        let _ = writeln!(
            svg,
            r##"<text x="{}" y="30" font-size="18" font-weight="bold" text-anchor="middle" fill="#111827">{}</text>"##,
            self.width / 2.0,
            escape_html(title)
        );
        svg
    }

    /// Horizontal grid lines with their value labels, plus the y-axis title.
    fn value_axis(&self, svg: &mut String, left: f64, max: f64, axis_title: &str) {
        let right = left + self.plot_width(left);
        for step in 0..=GRID_LINES {
            let value = max * step as f64 / GRID_LINES as f64;
            let y = self.y_position(value, max);
            let _ = writeln!(
                svg,
                r##"<line x1="{left}" y1="{y:.1}" x2="{right}" y2="{y:.1}" stroke="#e5e7eb"/>"##
            );
            let _ = writeln!(
                svg,
                r##"<text x="{:.1}" y="{:.1}" font-size="11" text-anchor="end" fill="#4b5563">{}</text>"##,
                left - 6.0,
                y + 4.0,
                axis_value(value)
            );
        }
        let _ = writeln!(
            svg,
            r##"<text x="16" y="{:.1}" font-size="12" text-anchor="middle" fill="#374151" transform="rotate(-90 16 {:.1})">{}</text>"##,
            MARGIN_TOP + self.plot_height() / 2.0,
            MARGIN_TOP + self.plot_height() / 2.0,
            escape_html(axis_title)
        );
    }

    fn category_label(&self, svg: &mut String, x: f64, text: &str) {
        let y = MARGIN_TOP + self.plot_height() + 16.0;
        let _ = writeln!(
            svg,
            r##"<text x="{x:.1}" y="{y:.1}" font-size="11" text-anchor="end" fill="#4b5563" transform="rotate(-45 {x:.1} {y:.1})">{}</text>"##,
            escape_html(&truncate_label(text))
        );
    }

    fn line_chart(&self, title: &str, axis_title: &str, points: &[(String, f64)]) -> String {
        let mut svg = self.open_document(title);
        let max = scale_max(points.iter().map(|(_, v)| *v));
        self.value_axis(&mut svg, MARGIN_LEFT, max, axis_title);

        let width = self.plot_width(MARGIN_LEFT);
        let x_at = |i: usize| {
            if points.len() > 1 {
                MARGIN_LEFT + width * i as f64 / (points.len() - 1) as f64
            } else {
                MARGIN_LEFT + width / 2.0
            }
        };

        let coordinates: Vec<String> = points
            .iter()
            .enumerate()
            .map(|(i, (_, value))| format!("{:.1},{:.1}", x_at(i), self.y_position(*value, max)))
            .collect();
        let _ = writeln!(
            svg,
            r#"<polyline fill="none" stroke="{}" stroke-width="2" points="{}"/>"#,
            LINE_COLOR,
            coordinates.join(" ")
        );

        let label_step = points.len().div_ceil(MAX_X_LABELS).max(1);
        for (i, (label, _)) in points.iter().enumerate().step_by(label_step) {
            self.category_label(&mut svg, x_at(i), label);
        }

        svg.push_str("</svg>\n");
        svg
    }

    fn column_chart(&self, title: &str, axis_title: &str, bars: &[(String, f64)]) -> String {
        let mut svg = self.open_document(title);
        let max = scale_max(bars.iter().map(|(_, v)| *v));
        self.value_axis(&mut svg, MARGIN_LEFT, max, axis_title);

        let slot = self.plot_width(MARGIN_LEFT) / bars.len().max(1) as f64;
        let bar_width = slot * 0.7;
        let baseline = MARGIN_TOP + self.plot_height();
        let label_step = bars.len().div_ceil(MAX_X_LABELS).max(1);

        for (i, (label, value)) in bars.iter().enumerate() {
            let x = MARGIN_LEFT + slot * i as f64 + (slot - bar_width) / 2.0;
            let y = self.y_position(value.max(0.0), max);
            let _ = writeln!(
                svg,
                r#"<rect x="{:.1}" y="{:.1}" width="{:.1}" height="{:.1}" fill="{}"><title>{}</title></rect>"#,
                x,
                y,
                bar_width,
                baseline - y,
                BAR_COLOR,
                escape_html(label)
            );
            if i % label_step == 0 {
                self.category_label(&mut svg, x + bar_width / 2.0, label);
            }
        }

        svg.push_str("</svg>\n");
        svg
    }

    /// Largest bar on top, labels on the left.
    fn horizontal_bar_chart(&self, title: &str, bars: &[(String, f64)]) -> String {
        let mut svg = self.open_document(title);
        let max = scale_max(bars.iter().map(|(_, v)| *v));
        let width = self.plot_width(LABEL_MARGIN_LEFT);
        let slot = self.plot_height() / bars.len().max(1) as f64;
        let bar_height = slot * 0.7;

        for (i, (label, value)) in bars.iter().enumerate() {
            let y = MARGIN_TOP + slot * i as f64 + (slot - bar_height) / 2.0;
            let length = width * value.max(0.0) / max;
            let _ = writeln!(
                svg,
                r#"<rect x="{}" y="{:.1}" width="{:.1}" height="{:.1}" fill="{}"/>"#,
                LABEL_MARGIN_LEFT, y, length, bar_height, BAR_COLOR
            );
            let _ = writeln!(
                svg,
                r##"<text x="{:.1}" y="{:.1}" font-size="11" text-anchor="end" fill="#374151">{}</text>"##,
                LABEL_MARGIN_LEFT - 6.0,
                y + bar_height / 2.0 + 4.0,
                escape_html(&truncate_label(label))
            );
            let _ = writeln!(
                svg,
                r##"<text x="{:.1}" y="{:.1}" font-size="11" fill="#111827">{}</text>"##,
                LABEL_MARGIN_LEFT + length + 4.0,
                y + bar_height / 2.0 + 4.0,
                axis_value(*value)
            );
        }

        svg.push_str("</svg>\n");
        svg
    }
}

/// Equal-width buckets between the minimum and maximum value. A constant
/// series collapses into one bucket.
pub fn histogram(values: &[f64], bins: usize) -> Vec<HistogramBin> {
    let (Some(min), Some(max)) = (
        values.iter().copied().reduce(f64::min),
        values.iter().copied().reduce(f64::max),
    ) else {
        return Vec::new();
    };

    if bins == 0 || max <= min {
        return vec![HistogramBin {
            lower: min,
            upper: max,
            count: values.len(),
        }];
    }

    let width = (max - min) / bins as f64;
    let mut result: Vec<HistogramBin> = (0..bins)
        .map(|i| HistogramBin {
            lower: min + width * i as f64,
            upper: min + width * (i + 1) as f64,
            count: 0,
        })
        .collect();

    for value in values {
        let index = (((value - min) / width) as usize).min(bins - 1);
        result[index].count += 1;
    }

    result
}

fn scale_max<I: Iterator<Item = f64>>(values: I) -> f64 {
    let max = values.fold(0.0_f64, f64::max);
    if max > 0.0 {
        max
    } else {
        1.0
    }
}

fn axis_value(value: f64) -> String {
    if value >= 1_000_000.0 {
        format!("{:.1}M", value / 1_000_000.0)
    } else if value >= 1_000.0 {
        format!("{:.1}k", value / 1_000.0)
    } else {
        format!("{:.0}", value)
    }
}

fn truncate_label(label: &str) -> String {
    if label.chars().count() > MAX_LABEL_CHARS {
        let mut short: String = label.chars().take(MAX_LABEL_CHARS - 1).collect();
        short.push('…');
        short
    } else {
        label.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, NaiveDate};
    use tempfile::tempdir;

    fn record(date: &str, product: &str, unit_price: f64, quantity: u64) -> CleanRecord {
        let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap();
        let revenue = unit_price * quantity as f64;
        CleanRecord {
            row_index: 0,
            date,
            product: product.to_string(),
            unit_price,
            quantity,
            revenue,
            year: date.year(),
            month: date.month(),
            weekday: date.weekday().num_days_from_monday(),
            day: date.day(),
            iso_week: date.iso_week().week(),
            category: "Outros".to_string(),
            margin: 0.2,
            profit: revenue * 0.2,
        }
    }

    fn sample() -> Vec<CleanRecord> {
        vec![
            record("2024-01-01", "Notebook", 3000.0, 1),
            record("2024-01-05", "Mouse", 50.0, 2),
            record("2024-02-10", "Monitor", 900.0, 1),
            record("2024-02-10", "Mouse", 50.0, 1),
        ]
    }

    #[test]
    fn test_render_all_writes_every_chart() {
        let dir = tempdir().unwrap();
        let paths = ChartRenderer::default()
            .render_all(&sample(), dir.path())
            .unwrap();

        let names: Vec<&str> = paths.keys().map(|k| k.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "distribuicao_ticket",
                "receita_dia_semana",
                "receita_diaria",
                "receita_mensal",
                "top_produtos",
            ]
        );

        for relative in paths.values() {
            assert!(relative.starts_with(CHART_DIR));
            let content = std::fs::read_to_string(dir.path().join(relative)).unwrap();
            assert!(content.starts_with("<svg"));
            assert!(content.trim_end().ends_with("</svg>"));
        }
    }

    #[test]
    fn test_empty_dataset_renders_nothing() {
        let dir = tempdir().unwrap();
        let paths = ChartRenderer::default().render_all(&[], dir.path()).unwrap();
        assert!(paths.is_empty());
        assert!(!dir.path().join(CHART_DIR).exists());
    }

    #[test]
    fn test_weekday_chart_lists_all_days() {
        let svg = ChartRenderer::default().weekday_revenue(&sample());
        for label in WEEKDAY_LABELS {
            assert!(svg.contains(label), "missing {}", label);
        }
    }

    #[test]
    fn test_labels_are_escaped() {
        let records = vec![record("2024-03-01", "Cabo <HDMI> & Adaptador", 20.0, 1)];
        let svg = ChartRenderer::default().top_products_chart(&records);
        assert!(svg.contains("Cabo &lt;HDMI&gt; &amp; Adaptador"));
        assert!(!svg.contains("<HDMI>"));
    }

    #[test]
    fn test_histogram_counts_every_value() {
        let values = [10.0, 20.0, 30.0, 40.0, 100.0];
        let bins = histogram(&values, 3);
        assert_eq!(bins.len(), 3);
        assert_eq!(bins.iter().map(|b| b.count).sum::<usize>(), values.len());
        assert_eq!(bins[0].count, 3);
        assert_eq!(bins[2].count, 1);

        let constant = histogram(&[5.0, 5.0], 10);
        assert_eq!(constant.len(), 1);
        assert_eq!(constant[0].count, 2);

        assert!(histogram(&[], 10).is_empty());
    }

    #[test]
    fn test_truncate_label() {
        assert_eq!(truncate_label("Mouse"), "Mouse");
        let long = "x".repeat(40);
        assert_eq!(truncate_label(&long).chars().count(), MAX_LABEL_CHARS);
    }
}
