//! README generation for an artifact directory.
//!
//! For every known product present on disk the generator reads the schema
//! and the first rows, then renders a schema table
//! (`Column | Type | Units | Description`) and a preview table whose first
//! row carries the units. Products missing from disk are skipped.

use crate::constants::{DOCUMENTED_PRODUCTS, INTERCHANGE_VERSION, README_FILENAME};
use crate::error::Result;
use crate::schema::{field_description, field_units, schema_version};

use arrow::array::{Array, ArrayRef, AsArray};
use arrow::datatypes::{DataType, Float32Type, Float64Type, Int32Type, Int64Type, SchemaRef};
use arrow::record_batch::RecordBatch;
use arrow::util::display::array_value_to_string;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use std::fmt::Write as _;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Rows shown in each preview table
pub const PREVIEW_ROWS: usize = 3;

const SIGNIFICANT_DIGITS: i32 = 6;

/// Schema and leading rows of one artifact
#[derive(Debug, Clone)]
pub struct ArtifactPreview {
    pub schema: SchemaRef,
    pub total_rows: i64,
    pub rows: Vec<Vec<String>>,
}

/// Format a float the way C's `%g` does; NaN renders empty
pub fn format_g(value: f64) -> String {
    if value.is_nan() {
        return String::new();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if value == 0.0 {
        return "0".to_string();
    }

    let scientific = format!("{:.*e}", (SIGNIFICANT_DIGITS - 1) as usize, value);
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return scientific;
    };
    let exponent: i32 = exponent.parse().unwrap_or(0);

    if exponent < -4 || exponent >= SIGNIFICANT_DIGITS {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", trim_fraction(mantissa), sign, exponent.abs())
    } else {
        let decimals = (SIGNIFICANT_DIGITS - 1 - exponent).max(0) as usize;
        trim_fraction(&format!("{:.*}", decimals, value)).to_string()
    }
}

fn trim_fraction(text: &str) -> &str {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.')
    } else {
        text
    }
}

/// Markdown text of one cell; nulls render empty
pub fn format_cell(column: &ArrayRef, row: usize) -> String {
    if column.is_null(row) {
        return String::new();
    }
    match column.data_type() {
        DataType::Int32 => column.as_primitive::<Int32Type>().value(row).to_string(),
        DataType::Int64 => column.as_primitive::<Int64Type>().value(row).to_string(),
        DataType::Float64 => format_g(column.as_primitive::<Float64Type>().value(row)),
        DataType::Float32 => format_g(column.as_primitive::<Float32Type>().value(row) as f64),
        DataType::Utf8 => column.as_string::<i32>().value(row).to_string(),
        _ => array_value_to_string(column, row).unwrap_or_default(),
    }
}

fn batch_rows(batch: &RecordBatch) -> Vec<Vec<String>> {
    (0..batch.num_rows())
        .map(|row| batch.columns().iter().map(|column| format_cell(column, row)).collect())
        .collect()
}

/// Read the schema and the first [`PREVIEW_ROWS`] rows of an artifact
pub fn preview_artifact(path: &Path) -> Result<ArtifactPreview> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(File::open(path)?)?;
    let total_rows = builder.metadata().file_metadata().num_rows();
    let schema = builder.schema().clone();
    let reader = builder
        .with_batch_size(PREVIEW_ROWS)
        .with_limit(PREVIEW_ROWS)
        .build()?;

    let mut rows = Vec::with_capacity(PREVIEW_ROWS);
    for batch in reader {
        rows.extend(batch_rows(&batch?));
    }
    rows.truncate(PREVIEW_ROWS);

    Ok(ArtifactPreview {
        schema,
        total_rows,
        rows,
    })
}

fn escape(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

fn table_row<'a>(cells: impl IntoIterator<Item = &'a str>) -> String {
    let cells: Vec<String> = cells.into_iter().map(escape).collect();
    format!("| {} |\n", cells.join(" | "))
}

fn render_product(out: &mut String, name: &str, description: &str, preview: &ArtifactPreview) {
    let _ = writeln!(out, "## {}\n", name);
    let _ = writeln!(out, "{}\n", description);
    if let Some(version) = schema_version(&preview.schema) {
        let _ = writeln!(out, "Schema version `{}`, {} rows.\n", version, preview.total_rows);
    }

    out.push_str("| Column | Type | Units | Description |\n| --- | --- | --- | --- |\n");
    for field in preview.schema.fields() {
        let data_type = field.data_type().to_string();
        out.push_str(&table_row([
            field.name().as_str(),
            data_type.as_str(),
            field_units(field).unwrap_or(""),
            field_description(field).unwrap_or(""),
        ]));
    }

    out.push_str("\nPreview:\n\n");
    out.push_str(&table_row(preview.schema.fields().iter().map(|f| f.name().as_str())));
    out.push_str(&table_row(preview.schema.fields().iter().map(|_| "---")));
    out.push_str(&table_row(
        preview.schema.fields().iter().map(|f| field_units(f).unwrap_or("")),
    ));
    for row in &preview.rows {
        out.push_str(&table_row(row.iter().map(String::as_str)));
    }
    out.push('\n');
}

/// Render the README for the products of `products` found in `dir`
pub fn render_readme_for(dir: &Path, title: &str, products: &[(&str, &str)]) -> Result<String> {
    let mut out = String::new();
    let _ = writeln!(out, "# {}\n", title);
    let _ = writeln!(
        out,
        "Columnar artifacts (Parquet) produced by interchange version `{}`. \
         Units and descriptions are stored as field metadata in each file.\n",
        INTERCHANGE_VERSION
    );

    for (name, description) in products {
        let path = dir.join(name);
        if !path.is_file() {
            debug!("Skipping {} in README: not on disk", name);
            continue;
        }
        let preview = preview_artifact(&path)?;
        render_product(&mut out, name, description, &preview);
    }
    Ok(out)
}

/// Write `README.md` into `dir` via a temp file and rename
pub fn write_readme_for(dir: &Path, title: &str, products: &[(&str, &str)]) -> Result<PathBuf> {
    let body = render_readme_for(dir, title, products)?;
    let target = dir.join(README_FILENAME);

    let mut temp = tempfile::NamedTempFile::new_in(dir)?;
    temp.write_all(body.as_bytes())?;
    temp.persist(&target).map_err(|e| e.error)?;

    info!("Wrote {}", target.display());
    Ok(target)
}

/// README for the interchange products in `dir`
pub fn render_readme(dir: &Path) -> Result<String> {
    render_readme_for(dir, "WEPP Interchange", DOCUMENTED_PRODUCTS)
}

pub fn write_readme(dir: &Path) -> Result<PathBuf> {
    write_readme_for(dir, "WEPP Interchange", DOCUMENTED_PRODUCTS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InterchangeConfig;
    use crate::constants::{EBE_PW0_PARQUET, H_LOSS_PARQUET};
    use crate::models::Value;
    use crate::parsers::watershed::ebe_pw0;
    use crate::pipeline::write_rows;
    use crate::schema::rows_to_batch;
    use tempfile::TempDir;

    #[test]
    fn test_format_g() {
        assert_eq!(format_g(0.0), "0");
        assert_eq!(format_g(1.5), "1.5");
        assert_eq!(format_g(100000.0), "100000");
        assert_eq!(format_g(1234567.0), "1.23457e+06");
        assert_eq!(format_g(0.0001), "0.0001");
        assert_eq!(format_g(0.00001), "1e-05");
        assert_eq!(format_g(-0.125), "-0.125");
        assert_eq!(format_g(f64::NAN), "");
    }

    #[test]
    fn test_cells_render_nulls_empty() {
        let schema = ebe_pw0::schema();
        let mut row: Vec<Value> = vec![Value::Int(2000); 7];
        row.extend([
            Value::Float(25.4),
            Value::Null,
            Value::Float(f64::NAN),
            Value::Float(35.2),
            Value::Float(0.01),
            Value::Float(0.02),
            Value::Float(0.03),
            Value::Int(4),
        ]);
        let batch = rows_to_batch(&schema, "ebe_pw0", vec![row]).unwrap();
        let cells = &batch_rows(&batch)[0];
        assert_eq!(cells[0], "2000");
        assert_eq!(cells[7], "25.4");
        assert_eq!(cells[8], "");
        assert_eq!(cells[9], "");
        assert_eq!(cells[14], "4");
    }

    #[test]
    fn test_readme_lists_present_products_only() {
        let temp_dir = TempDir::new().unwrap();
        let schema = ebe_pw0::schema();
        let rows: Vec<Vec<Value>> = (1..=5)
            .map(|day| {
                let mut row = vec![
                    Value::Int(2000),
                    Value::Int(1),
                    Value::Int(day),
                    Value::Int(day),
                    Value::Int(day),
                    Value::Int(2000),
                    Value::Int(1),
                ];
                row.extend((0..7).map(|_| Value::Float(1.0)));
                row.push(Value::Int(4));
                row
            })
            .collect();
        write_rows(
            &temp_dir.path().join(EBE_PW0_PARQUET),
            &schema,
            rows,
            1,
            &InterchangeConfig::default(),
        )
        .unwrap();

        let path = write_readme(temp_dir.path()).unwrap();
        let readme = std::fs::read_to_string(path).unwrap();

        assert!(readme.contains("## ebe_pw0.parquet"));
        assert!(!readme.contains(H_LOSS_PARQUET));
        assert!(readme.contains("| Runoff Volume (m^3) | Float64 | m^3 |"));
        assert!(readme.contains("5 rows"));

        let preview = preview_artifact(&temp_dir.path().join(EBE_PW0_PARQUET)).unwrap();
        assert_eq!(preview.rows.len(), PREVIEW_ROWS);
        assert_eq!(preview.total_rows, 5);
        assert_eq!(preview.rows[2][2], "3");
    }
}
