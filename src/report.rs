//! Static HTML report over the metrics map, the insights and the charts.

use crate::error::Result;
use crate::insights::Insight;
use crate::schema::{CleaningReport, SalesMetrics};
use crate::utils::{escape_html, format_brl};
use chrono::NaiveDateTime;
use log::info;
use std::collections::BTreeMap;
use std::fmt::Write;
use std::path::{Path, PathBuf};

pub const REPORT_FILE: &str = "relatorio_vendas.html";

/// Rows shown in each ranking table.
const TABLE_ROWS: usize = 5;

/// Chart keys in display order, with their section titles.
const CHART_SECTIONS: [(&str, &str); 5] = [
    ("receita_diaria", "Receita Diária"),
    ("receita_mensal", "Receita Mensal"),
    ("receita_dia_semana", "Receita por Dia da Semana"),
    ("top_produtos", "Top Produtos"),
    ("distribuicao_ticket", "Distribuição do Ticket"),
];

const STYLE: &str = r#"
    * { box-sizing: border-box; margin: 0; padding: 0; }
    body { font-family: -apple-system, "Segoe UI", sans-serif; background: #0f172a; color: #e5e7eb; padding: 30px; line-height: 1.6; }
    .container { max-width: 1200px; margin: 0 auto; background: #020617; border-radius: 18px; padding: 40px; border: 1px solid #1f2937; }
    header { border-bottom: 1px solid #1f2937; padding-bottom: 20px; margin-bottom: 30px; }
    h1 { font-size: 2.2rem; margin-bottom: 10px; }
    .subtitle { color: #9ca3af; font-size: 0.95rem; }
    .badge { display: inline-block; background: #16a34a; color: #022c22; padding: 4px 12px; border-radius: 999px; font-size: 0.8rem; font-weight: 600; margin-left: 8px; }
    .grid { display: grid; gap: 20px; margin: 30px 0; }
    .grid-3 { grid-template-columns: repeat(auto-fit, minmax(240px, 1fr)); }
    .grid-2 { grid-template-columns: repeat(auto-fit, minmax(300px, 1fr)); }
    .card { border-radius: 14px; padding: 20px; border: 1px solid #1f2937; }
    .card h2 { font-size: 0.95rem; color: #9ca3af; margin-bottom: 8px; font-weight: 500; }
    .card .valor { font-size: 1.8rem; font-weight: 600; margin-bottom: 4px; }
    .card small { color: #6b7280; font-size: 0.85rem; }
    section { margin-top: 40px; }
    section h2.title { font-size: 1.5rem; margin-bottom: 20px; font-weight: 600; }
    img.grafico { width: 100%; border-radius: 12px; margin-top: 12px; background: #ffffff; }
    ul { list-style: disc; padding-left: 24px; }
    li { margin-bottom: 10px; color: #d1d5db; }
    table { width: 100%; border-collapse: collapse; margin-top: 12px; }
    th, td { border-bottom: 1px solid #1f2937; padding: 10px 8px; font-size: 0.9rem; text-align: left; }
    th { color: #9ca3af; font-weight: 600; }
    td.num, th.num { text-align: right; }
    .muted { color: #6b7280; margin-top: 12px; }
    .tag { display: inline-block; padding: 3px 10px; border-radius: 999px; font-size: 0.75rem; font-weight: 600; }
    .tag-a { background: #22c55e33; color: #22c55e; }
    .tag-b { background: #facc1533; color: #facc15; }
    .tag-c { background: #fb923c33; color: #fb923c; }
    footer { margin-top: 40px; padding-top: 20px; border-top: 1px solid #1f2937; color: #6b7280; font-size: 0.9rem; text-align: center; }
"#;

/// Everything the report shows. Chart paths are relative to the directory
/// the report is written into.
#[derive(Debug, Clone)]
pub struct ReportContext<'a> {
    pub metrics: &'a SalesMetrics,
    pub insights: &'a [Insight],
    pub charts: &'a BTreeMap<String, PathBuf>,
    pub cleaning: Option<&'a CleaningReport>,
    pub generated_at: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct HtmlReport {
    pub title: String,
}

impl Default for HtmlReport {
    fn default() -> Self {
        Self {
            title: "Relatório de Vendas".to_string(),
        }
    }
}

impl HtmlReport {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
        }
    }

    /// Renders the report and writes it as `relatorio_vendas.html` inside
    /// `output_dir`, returning the written path.
    pub fn write(&self, context: &ReportContext<'_>, output_dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(output_dir)?;
        let path = output_dir.join(REPORT_FILE);
        std::fs::write(&path, self.render(context))?;
        info!("HTML report written to {}", path.display());
        Ok(path)
    }

    pub fn render(&self, context: &ReportContext<'_>) -> String {
        let m = context.metrics;
        let title = escape_html(&self.title);
        let start = escape_html(&m.start_date);
        let end = escape_html(&m.end_date);

        format!(
            r#"<!DOCTYPE html>
<html lang="pt-BR">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>{title} - {start} a {end}</title>
<style>{style}</style>
</head>
<body>
<div class="container">
<header>
<h1>{title}</h1>
<p class="subtitle">Período: <strong>{start}</strong> até <strong>{end}</strong> <span class="badge">{days} dias</span></p>
<p class="subtitle">Gerado em {generated}</p>
</header>
{financial}
{quality}
{rankings}
{charts}
{insights}
{cleaning}
<footer><p>Relatório gerado automaticamente pelo {package} v{version}</p></footer>
</div>
</body>
</html>
"#,
            style = STYLE,
            days = m.days_analyzed,
            generated = context.generated_at.format("%d/%m/%Y às %H:%M"),
            financial = financial_section(m),
            quality = quality_section(m),
            rankings = rankings_section(m),
            charts = charts_section(context.charts),
            insights = insights_section(context.insights),
            cleaning = context.cleaning.map(cleaning_section).unwrap_or_default(),
            package = env!("CARGO_PKG_NAME"),
            version = env!("CARGO_PKG_VERSION"),
        )
    }
}

fn card(title: &str, value: &str, note: &str) -> String {
    format!(
        r#"<div class="card"><h2>{}</h2><div class="valor">{}</div><small>{}</small></div>"#,
        title,
        value,
        escape_html(note)
    )
}

fn financial_section(m: &SalesMetrics) -> String {
    let cards = [
        card("GMV (Faturamento Bruto)", &format_brl(m.gmv), "Receita total no período"),
        card("Lucro Estimado", &format_brl(m.estimated_profit), "Baseado em margens por produto"),
        card("Margem Média", &format!("{:.1}%", m.average_margin_percent), "Lucro / GMV"),
        card("Ticket Médio", &format_brl(m.average_ticket), "Receita média por transação"),
        card(
            "Receita Média Diária",
            &format_brl(m.average_daily_revenue),
            &format!("Média em {} dias com vendas", m.days_analyzed),
        ),
        card(
            "Volume",
            &format_count(m.total_transactions as u64),
            &format!("{} unidades vendidas", format_count(m.total_units)),
        ),
    ];
    format!(
        r#"<section><h2 class="title">Visão Geral Financeira</h2><div class="grid grid-3">{}</div></section>"#,
        cards.join("\n")
    )
}

fn quality_section(m: &SalesMetrics) -> String {
    let cards = [
        card("Dias com Vendas", &m.days_with_sales.to_string(), "Dias com pelo menos 1 transação"),
        card("Dias no Período", &m.period_days.to_string(), "Do primeiro ao último dia"),
        card(
            "Densidade Temporal",
            &format!("{:.1}%", m.temporal_density_percent),
            "Quanto mais próximo de 100%, melhor",
        ),
    ];
    format!(
        r#"<section><h2 class="title">Qualidade dos Dados</h2><div class="grid grid-3">{}</div></section>"#,
        cards.join("\n")
    )
}

fn rankings_section(m: &SalesMetrics) -> String {
    let products: Vec<String> = m
        .top_products
        .iter()
        .take(TABLE_ROWS)
        .map(|p| {
            format!(
                r#"<tr><td>{}</td><td class="num">{}</td></tr>"#,
                escape_html(&p.product),
                format_brl(p.revenue)
            )
        })
        .collect();

    let abc: Vec<String> = m
        .abc_curve
        .iter()
        .take(TABLE_ROWS)
        .map(|e| {
            format!(
                r#"<tr><td>{}</td><td class="num">{}</td><td><span class="tag tag-{}">{}</span></td></tr>"#,
                escape_html(&e.product),
                format_brl(e.revenue),
                e.class.as_str().to_lowercase(),
                e.class.as_str()
            )
        })
        .collect();

    let days: Vec<String> = m
        .top_days
        .iter()
        .take(TABLE_ROWS)
        .map(|d| {
            format!(
                r#"<tr><td>{}</td><td class="num">{}</td></tr>"#,
                escape_html(&d.date),
                format_brl(d.revenue)
            )
        })
        .collect();

    format!(
        r#"<section><h2 class="title">Produtos em Destaque</h2><div class="grid grid-2">
<div class="card"><h2>Top {n} Produtos por Receita</h2><table><thead><tr><th>Produto</th><th class="num">Receita</th></tr></thead><tbody>{products}</tbody></table></div>
<div class="card"><h2>Curva ABC (Top {n})</h2><table><thead><tr><th>Produto</th><th class="num">Receita</th><th>Classe</th></tr></thead><tbody>{abc}</tbody></table></div>
</div>
<div class="card"><h2>Top {n} Dias de Maior Receita</h2><table><thead><tr><th>Data</th><th class="num">Receita</th></tr></thead><tbody>{days}</tbody></table></div>
</section>"#,
        n = TABLE_ROWS,
        products = table_body(&products, 2),
        abc = table_body(&abc, 3),
        days = table_body(&days, 2),
    )
}

fn table_body(rows: &[String], columns: usize) -> String {
    if rows.is_empty() {
        format!(r#"<tr><td colspan="{}">Sem dados</td></tr>"#, columns)
    } else {
        rows.join("")
    }
}

fn charts_section(charts: &BTreeMap<String, PathBuf>) -> String {
    let mut html = String::from(
        r#"<section><h2 class="title">Sazonalidade e Tendências</h2><div class="grid grid-2">"#,
    );
    for (key, title) in CHART_SECTIONS {
        let body = match charts.get(key) {
            Some(path) => format!(
                r#"<img src="{}" class="grafico" alt="{}">"#,
                escape_html(&relative_url(path)),
                title
            ),
            None => r#"<p class="muted">Gráfico não disponível</p>"#.to_string(),
        };
        let _ = write!(html, r#"<div class="card"><h2>{}</h2>{}</div>"#, title, body);
    }
    html.push_str("</div></section>");
    html
}

fn insights_section(insights: &[Insight]) -> String {
    let items = if insights.is_empty() {
        "<li>Nenhum insight calculado.</li>".to_string()
    } else {
        insights
            .iter()
            .map(|i| format!("<li>{}</li>", highlight(&i.message)))
            .collect::<Vec<_>>()
            .join("\n")
    };
    format!(
        r#"<section><h2 class="title">Insights Automáticos</h2><div class="card"><ul>{}</ul></div></section>"#,
        items
    )
}

fn cleaning_section(report: &CleaningReport) -> String {
    let rows = [
        ("Registros iniciais", report.records_initial.to_string()),
        ("Duplicatas removidas", report.duplicates_removed.to_string()),
        ("Valores inválidos convertidos", report.invalid_values_converted.to_string()),
        ("Registros inválidos removidos", report.invalid_records_removed.to_string()),
        ("Outliers removidos", report.outliers_removed.to_string()),
        ("Produtos sem categoria", report.products_without_category.to_string()),
        ("Registros finais", report.records_final.to_string()),
        ("Taxa de aproveitamento", format!("{:.2}%", report.utilization_rate)),
    ];
    let body: String = rows
        .iter()
        .map(|(label, value)| format!(r#"<tr><td>{}</td><td class="num">{}</td></tr>"#, label, value))
        .collect();
    format!(
        r#"<section><h2 class="title">Limpeza dos Dados</h2><div class="card"><table><tbody>{}</tbody></table></div></section>"#,
        body
    )
}

/// Escapes the message and turns `**text**` spans into `<strong>` elements.
fn highlight(message: &str) -> String {
    escape_html(message)
        .split("**")
        .enumerate()
        .map(|(i, part)| {
            if i % 2 == 1 {
                format!("<strong>{}</strong>", part)
            } else {
                part.to_string()
            }
        })
        .collect()
}

fn relative_url(path: &Path) -> String {
    path.iter()
        .map(|part| part.to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Thousands separated by dots, as in `12.345`.
fn format_count(value: u64) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, digit) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(digit);
    }
    grouped
}
