use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use arrow::array::{Array, AsArray};
use arrow::datatypes::{DataType, Float32Type, Float64Type, Int32Type, Int64Type};
use log::debug;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use super::model::{CellValue, ColumnKind, PlanetRow, PlanetTable};

/// Tokens read as a missing value.
const MISSING_TOKENS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND",
    "1.#QNAN", "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load a catalog table from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv`     – header row plus one planet per line
/// * `.parquet` – flat scalar columns (strings, ints, floats, bools)
pub fn load_file(path: &Path) -> Result<PlanetTable> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let table = match ext.as_str() {
        "csv" => {
            let file = std::fs::File::open(path)
                .with_context(|| format!("opening CSV {}", path.display()))?;
            read_csv(file)?
        }
        "parquet" | "pq" => load_parquet(path)?,
        other => bail!("Unsupported file extension: .{other}"),
    };
    debug!(
        "loaded {} rows x {} columns from {}",
        table.len(),
        table.columns.len(),
        path.display()
    );
    Ok(table)
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// Read a CSV catalog: header row with column names, one planet per record.
///
/// A leading index column (`Unnamed: 0` or an empty header) is dropped and
/// duplicate header names are disambiguated with `.1`, `.2`, … suffixes.
/// Records shorter than the header are padded with missing cells; longer
/// ones are an error. A column that resolves to text keeps every cell's raw
/// text, so `007` stays `007`.
pub fn read_csv<R: Read>(input: R) -> Result<PlanetTable> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(input);
    let raw_headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.to_string())
        .collect();

    if raw_headers.is_empty() {
        bail!("CSV has no columns");
    }
    let skip_first = raw_headers[0].is_empty() || raw_headers[0] == "Unnamed: 0";
    let headers = dedupe_headers(&raw_headers);

    let mut records = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        if record.len() > headers.len() {
            bail!(
                "CSV row {row_no}: expected {} fields, saw {}",
                headers.len(),
                record.len()
            );
        }
        records.push(record);
    }

    let mut rows = vec![PlanetRow::default(); records.len()];
    for (col_idx, col_name) in headers.iter().enumerate() {
        if skip_first && col_idx == 0 {
            continue;
        }
        let raw = |record: &csv::StringRecord| record.get(col_idx).unwrap_or("").to_string();
        let mut cells: Vec<CellValue> = records.iter().map(|r| guess_cell_type(&raw(r))).collect();
        if ColumnKind::infer(&cells) == ColumnKind::Text {
            cells = records.iter().map(|r| text_cell(&raw(r))).collect();
        }
        for (row, cell) in rows.iter_mut().zip(cells) {
            row.values.insert(col_name.clone(), cell);
        }
    }

    let columns = headers.into_iter().skip(usize::from(skip_first)).collect();
    Ok(PlanetTable::from_rows(columns, rows))
}

fn dedupe_headers(raw: &[String]) -> Vec<String> {
    let mut seen: BTreeMap<String, usize> = BTreeMap::new();
    raw.iter()
        .map(|h| {
            let count = seen.entry(h.clone()).or_insert(0);
            let name = if *count == 0 {
                h.clone()
            } else {
                format!("{h}.{count}")
            };
            *count += 1;
            name
        })
        .collect()
}

fn text_cell(s: &str) -> CellValue {
    if MISSING_TOKENS.contains(&s) {
        CellValue::Null
    } else {
        CellValue::Text(s.to_string())
    }
}

fn guess_cell_type(s: &str) -> CellValue {
    if MISSING_TOKENS.contains(&s) {
        return CellValue::Null;
    }
    let trimmed = s.trim();
    if let Ok(i) = trimmed.parse::<i64>() {
        return CellValue::Integer(i);
    }
    if let Ok(f) = trimmed.parse::<f64>() {
        return CellValue::Float(f);
    }
    match trimmed {
        "True" | "true" | "TRUE" => CellValue::Bool(true),
        "False" | "false" | "FALSE" => CellValue::Bool(false),
        _ => CellValue::Text(s.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file of flat scalar columns, one planet per row.
///
/// Works with files written by both **Pandas** (`df.to_parquet()`) and
/// **Polars** (`df.write_parquet()`); a `__index_level_0__` column is dropped.
fn load_parquet(path: &Path) -> Result<PlanetTable> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .context("reading parquet metadata")?;
    let columns: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .filter(|name| name != "__index_level_0__")
        .collect();
    let reader = builder.build().context("building parquet reader")?;

    let mut rows = Vec::new();

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let schema = batch.schema();

        let cols: Vec<(String, &Arc<dyn Array>)> = columns
            .iter()
            .filter_map(|name| {
                let idx = schema.index_of(name).ok()?;
                Some((name.clone(), batch.column(idx)))
            })
            .collect();

        for row in 0..batch.num_rows() {
            let mut values = BTreeMap::new();
            for (name, array) in &cols {
                values.insert(name.clone(), extract_cell_value(array, row));
            }
            rows.push(PlanetRow { values });
        }
    }

    Ok(PlanetTable::from_rows(columns, rows))
}

/// Extract a single cell from an Arrow column at a given row.
fn extract_cell_value(col: &Arc<dyn Array>, row: usize) -> CellValue {
    if col.is_null(row) {
        return CellValue::Null;
    }
    match col.data_type() {
        DataType::Utf8 => CellValue::Text(col.as_string::<i32>().value(row).to_string()),
        DataType::LargeUtf8 => CellValue::Text(col.as_string::<i64>().value(row).to_string()),
        DataType::Int32 => CellValue::Integer(col.as_primitive::<Int32Type>().value(row) as i64),
        DataType::Int64 => CellValue::Integer(col.as_primitive::<Int64Type>().value(row)),
        DataType::Float32 => CellValue::Float(col.as_primitive::<Float32Type>().value(row) as f64),
        DataType::Float64 => CellValue::Float(col.as_primitive::<Float64Type>().value(row)),
        DataType::Boolean => CellValue::Bool(col.as_boolean().value(row)),
        other => CellValue::Text(format!("{other:?}")),
    }
}
