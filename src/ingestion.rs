use crate::error::{Result, SalesReportError};
use crate::schema::{cell_text, CategoryEntry, CleanRecord, RawDataset};
use crate::utils::parse_number;
use log::{debug, info, warn};
use std::collections::HashSet;
use std::path::Path;

pub const CATEGORY_COLUMNS: [&str; 3] = ["product", "suggested_category", "suggested_margin"];

/// Loads a transaction CSV into an untyped table.
///
/// The file must exist and contain at least one data row. Text is decoded as
/// UTF-8 and falls back to Latin-1 when that fails. A non-`.csv` extension is
/// only a warning.
pub fn load_transactions(path: &Path) -> Result<RawDataset> {
    if !path.exists() {
        return Err(SalesReportError::InvalidInputPath(format!(
            "{} does not exist",
            path.display()
        )));
    }
    if !path.is_file() {
        return Err(SalesReportError::InvalidInputPath(format!(
            "{} is not a file",
            path.display()
        )));
    }

    let is_csv = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("csv"))
        .unwrap_or(false);
    if !is_csv {
        warn!(
            "{} does not have a .csv extension, attempting to load it anyway",
            path.display()
        );
    }

    let dataset = read_csv_file(path)?;
    if dataset.columns.is_empty() || dataset.is_empty() {
        return Err(SalesReportError::EmptyInput(format!(
            "{} has no data rows",
            path.display()
        )));
    }

    info!(
        "Loaded {} records from {} (columns: {:?})",
        dataset.len(),
        path.display(),
        dataset.columns
    );
    Ok(dataset)
}

/// Loads the optional category reference file. A missing file is not an
/// error and yields `Ok(None)`.
pub fn load_category_table(path: &Path) -> Result<Option<Vec<CategoryEntry>>> {
    if !path.is_file() {
        warn!(
            "Category reference file {} not found, using fallback category",
            path.display()
        );
        return Ok(None);
    }

    let dataset = read_csv_file(path)?;
    let entries = parse_category_table(&dataset)?;
    info!(
        "Loaded {} category reference entries from {}",
        entries.len(),
        path.display()
    );
    Ok(Some(entries))
}

pub fn parse_category_table(dataset: &RawDataset) -> Result<Vec<CategoryEntry>> {
    let missing = dataset.missing_columns(CATEGORY_COLUMNS);
    if !missing.is_empty() {
        return Err(SalesReportError::schema(missing, &dataset.columns));
    }

    let product_idx = dataset.column_index("product").unwrap_or_default();
    let category_idx = dataset
        .column_index("suggested_category")
        .unwrap_or_default();
    let margin_idx = dataset.column_index("suggested_margin").unwrap_or_default();

    let mut seen = HashSet::new();
    let mut entries = Vec::new();

    for (row, values) in dataset.rows.iter().enumerate() {
        let product = cell_text(values, product_idx).trim();
        if product.is_empty() {
            continue;
        }
        if !seen.insert(product.to_string()) {
            warn!(
                "Duplicate category entry for '{}' on line {}, keeping the first one",
                product,
                row + 2
            );
            continue;
        }

        let suggested_category = Some(cell_text(values, category_idx).trim())
            .filter(|c| !c.is_empty())
            .map(str::to_string);

        let raw_margin = cell_text(values, margin_idx).trim();
        let suggested_margin = match parse_number(raw_margin) {
            Some(m) if (0.0..=1.0).contains(&m) => Some(m),
            Some(m) => {
                warn!(
                    "Ignoring margin {} for '{}': must be a fraction between 0 and 1",
                    m, product
                );
                None
            }
            None => {
                if !raw_margin.is_empty() {
                    warn!("Ignoring unparseable margin '{}' for '{}'", raw_margin, product);
                }
                None
            }
        };

        entries.push(CategoryEntry {
            product: product.to_string(),
            suggested_category,
            suggested_margin,
        });
    }

    Ok(entries)
}

pub fn write_category_table(path: &Path, entries: &[CategoryEntry]) -> Result<()> {
    ensure_parent_dir(path)?;
    let mut writer = csv::Writer::from_path(path)?;
    for entry in entries {
        writer.serialize(entry)?;
    }
    writer.flush()?;
    info!("Wrote {} category entries to {}", entries.len(), path.display());
    Ok(())
}

/// Writes the cleaned dataset with one column per `CleanRecord` field, which
/// is also the layout `StatisticsEngine::calculate_table` reads back.
pub fn write_cleaned_csv(path: &Path, records: &[CleanRecord]) -> Result<()> {
    ensure_parent_dir(path)?;
    let mut writer = csv::Writer::from_path(path)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    info!("Wrote {} cleaned records to {}", records.len(), path.display());
    Ok(())
}

pub fn read_csv_file(path: &Path) -> Result<RawDataset> {
    let bytes = std::fs::read(path)?;
    let text = decode_text(bytes);
    parse_csv_text(&text)
}

/// Parses CSV text. Headers are trimmed, short rows are padded with blanks.
pub fn parse_csv_text(text: &str) -> Result<RawDataset> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(text.as_bytes());

    let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    if columns.len() == 1 && columns[0].is_empty() {
        return Ok(RawDataset::default());
    }

    let mut rows = Vec::new();
    for (line, result) in reader.records().enumerate() {
        let record = result?;
        if record.len() > columns.len() {
            return Err(SalesReportError::MalformedInput(format!(
                "line {} has {} fields but the header has {}",
                line + 2,
                record.len(),
                columns.len()
            )));
        }
        let mut row: Vec<String> = record.iter().map(str::to_string).collect();
        row.resize(columns.len(), String::new());
        rows.push(row);
    }

    Ok(RawDataset::new(columns, rows))
}

fn decode_text(bytes: Vec<u8>) -> String {
    let text = match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => {
            warn!("Input is not valid UTF-8, decoding as Latin-1");
            // Latin-1 maps every byte to the code point of the same value.
            err.into_bytes().iter().map(|&b| b as char).collect()
        }
    };

    match text.strip_prefix('\u{feff}') {
        Some(stripped) => {
            debug!("Stripped UTF-8 byte order mark");
            stripped.to_string()
        }
        None => text,
    }
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE_CSV: &str = "\
date,product,unit_price,quantity
2024-01-02,Mouse Gamer,99.90,2
2024-01-03,Monitor LG,899.00,1
2024-01-03,Teclado,,3
";

    #[test]
    fn test_parse_csv_text() {
        let dataset = parse_csv_text(SAMPLE_CSV).unwrap();
        assert_eq!(dataset.columns, vec!["date", "product", "unit_price", "quantity"]);
        assert_eq!(dataset.len(), 3);
        assert_eq!(dataset.cell(2, 2), Some(""));
        assert_eq!(dataset.cell(1, 1), Some("Monitor LG"));
    }

    #[test]
    fn test_short_rows_are_padded_and_headers_trimmed() {
        let dataset = parse_csv_text(" date , product,unit_price,quantity\n2024-01-02,Mouse\n").unwrap();
        assert_eq!(dataset.columns[0], "date");
        assert_eq!(dataset.columns[1], "product");
        assert_eq!(dataset.rows[0], vec!["2024-01-02", "Mouse", "", ""]);
    }

    #[test]
    fn test_long_rows_are_rejected() {
        let result = parse_csv_text("a,b\n1,2,3\n");
        assert!(matches!(result, Err(SalesReportError::MalformedInput(_))));
    }

    #[test]
    fn test_latin1_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vendas.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        // "Memória" encoded as Latin-1
        file.write_all(b"date,product,unit_price,quantity\n2024-01-02,Mem\xf3ria DDR4,150,1\n")
            .unwrap();

        let dataset = load_transactions(&path).unwrap();
        assert_eq!(dataset.cell(0, 1), Some("Memória DDR4"));
    }

    #[test]
    fn test_bom_is_stripped() {
        let text = decode_text("\u{feff}date,product\n".as_bytes().to_vec());
        assert!(text.starts_with("date"));
    }

    #[test]
    fn test_missing_input_file() {
        let result = load_transactions(Path::new("/definitely/not/here.csv"));
        assert!(matches!(result, Err(SalesReportError::InvalidInputPath(_))));
    }

    #[test]
    fn test_header_only_file_is_empty_input() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        std::fs::write(&path, "date,product,unit_price,quantity\n").unwrap();
        assert!(matches!(
            load_transactions(&path),
            Err(SalesReportError::EmptyInput(_))
        ));

        let blank = dir.path().join("blank.csv");
        std::fs::write(&blank, "").unwrap();
        assert!(matches!(
            load_transactions(&blank),
            Err(SalesReportError::EmptyInput(_))
        ));
    }

    #[test]
    fn test_missing_category_file_is_none() {
        let result = load_category_table(Path::new("/definitely/not/categorias.csv")).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_parse_category_table() {
        let dataset = parse_csv_text(
            "product,suggested_category,suggested_margin\n\
             Mouse Gamer,Mouse,0.35\n\
             Cabo HDMI,,0.10\n\
             Monitor LG,Monitor,\n\
             Mouse Gamer,Outros,0.9\n\
             SSD 1TB,Armazenamento,1.7\n",
        )
        .unwrap();
        let entries = parse_category_table(&dataset).unwrap();

        assert_eq!(entries.len(), 4);
        assert_eq!(entries[0].suggested_category.as_deref(), Some("Mouse"));
        assert_eq!(entries[0].suggested_margin, Some(0.35));
        assert_eq!(entries[1].suggested_category, None);
        assert_eq!(entries[2].suggested_margin, None);
        assert_eq!(entries[3].product, "SSD 1TB");
        assert_eq!(entries[3].suggested_margin, None);
    }

    #[test]
    fn test_category_table_requires_columns() {
        let dataset = parse_csv_text("product,category\nMouse,Mouse\n").unwrap();
        match parse_category_table(&dataset) {
            Err(SalesReportError::Schema { missing, available }) => {
                assert_eq!(missing, vec!["suggested_category", "suggested_margin"]);
                assert_eq!(available, vec!["product", "category"]);
            }
            other => panic!("expected schema error, got {:?}", other),
        }
    }

    #[test]
    fn test_category_table_tolerates_short_rows() {
        let dataset = RawDataset::new(
            vec![
                "product".to_string(),
                "suggested_category".to_string(),
                "suggested_margin".to_string(),
            ],
            vec![
                vec!["Mouse Gamer".to_string(), "Mouse".to_string()],
                vec!["Cabo HDMI".to_string()],
                vec![],
            ],
        );
        let entries = parse_category_table(&dataset).unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].suggested_category.as_deref(), Some("Mouse"));
        assert_eq!(entries[0].suggested_margin, None);
        assert_eq!(entries[1].product, "Cabo HDMI");
        assert_eq!(entries[1].suggested_category, None);
    }

    #[test]
    fn test_category_table_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dados").join("categorias.csv");
        let entries = vec![
            CategoryEntry {
                product: "Webcam HD".to_string(),
                suggested_category: Some("Webcam".to_string()),
                suggested_margin: Some(0.3),
            },
            CategoryEntry {
                product: "Cabo USB".to_string(),
                suggested_category: None,
                suggested_margin: None,
            },
        ];

        write_category_table(&path, &entries).unwrap();
        let loaded = load_category_table(&path).unwrap().unwrap();
        assert_eq!(loaded, entries);
    }
}
