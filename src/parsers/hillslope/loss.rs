//! `H<id>.loss.dat`: particle class composition of sediment leaving the hillslope.
//!
//! Only the class table is extracted. It is introduced by a line starting
//! with `Class`, opens after a separator, and holds one row per particle
//! class.

use crate::config::SentinelSet;
use crate::constants::PARTICLE_CLASSES;
use crate::error::{InterchangeError, Result};
use crate::header::{read_block, read_source};
use crate::models::{Row, Value};
use crate::parsers::hillslope_id;
use crate::schema::SchemaBuilder;

use arrow::datatypes::SchemaRef;
use std::path::Path;
use std::sync::LazyLock;
use tracing::warn;

/// `Class Diameter SpecificGravity Sand Silt Clay OM SedimentFraction InFlowExiting`
pub(crate) const CLASS_COLUMNS: usize = 9;

static SCHEMA: LazyLock<SchemaRef> = LazyLock::new(|| {
    SchemaBuilder::new()
        .int("wepp_id", "Hillslope id from the source filename")
        .int("Class", "Particle class (1-5)")
        .measure("Diameter (mm)", "mm", "Particle diameter")
        .measure("Specific Gravity", "", "Particle specific gravity")
        .measure("Sand (%)", "%", "Sand fraction of the class")
        .measure("Silt (%)", "%", "Silt fraction of the class")
        .measure("Clay (%)", "%", "Clay fraction of the class")
        .measure("O.M. (%)", "%", "Organic matter fraction of the class")
        .measure("Sediment Fraction", "", "Fraction of detached sediment in the class")
        .measure("In Flow Exiting", "", "Fraction of the class in flow leaving the hillslope")
        .build()
});

pub fn schema() -> SchemaRef {
    SCHEMA.clone()
}

pub(crate) fn is_class_header(line: &str) -> bool {
    line.trim_start().starts_with("Class")
}

pub fn parse_file(path: &Path, sentinels: &SentinelSet) -> Result<Vec<Row>> {
    let wepp_id = hillslope_id(path)?;
    let text = read_source(path)?;
    if text.trim().is_empty() {
        warn!("Empty input file: {}", path.display());
        return Ok(Vec::new());
    }

    let lines: Vec<&str> = text.lines().collect();
    let header = lines
        .iter()
        .position(|line| is_class_header(line))
        .ok_or_else(|| {
            InterchangeError::malformed(path, lines.len(), "no particle class table found")
        })?;

    let (rows, _) = read_block(path, &lines, header + 1, CLASS_COLUMNS, sentinels)?;
    if rows.len() != PARTICLE_CLASSES {
        return Err(InterchangeError::malformed(
            path,
            header + 1,
            format!("expected {} particle classes, found {}", PARTICLE_CLASSES, rows.len()),
        ));
    }

    let mut out = Vec::with_capacity(rows.len());
    for line in rows {
        let class = line.int(0, path)?;
        let mut row: Row = Vec::with_capacity(CLASS_COLUMNS + 1);
        row.push(Value::from(wepp_id));
        row.push(Value::from(class));
        row.extend(line.values_from(1, CLASS_COLUMNS - 1));
        out.push(row);
    }
    out.sort_by_key(|row| match row[1] {
        Value::Int(class) => class,
        _ => i64::MAX,
    });
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE: &str = "\
 ANNUAL AVERAGE SEDIMENT LEAVING PROFILE
     0.512 kg/m

  Sediment particle information leaving profile:

  Class  Diameter  Specific  ---- % of Particle Size ----  Fraction  In Flow
          (mm)     Gravity    Sand   Silt   Clay   O.M.    Detached  Exiting
  ---------------------------------------------------------------------------
    1     0.002     2.60       0.0    0.0  100.0   25.0     0.010    0.000
    2     0.010     2.65       0.0  100.0    0.0    0.0     0.150    0.050
    3     0.030     1.80       0.0   80.0   20.0   10.0     0.300    0.100
    4     0.300     1.60      50.0   30.0   20.0    5.0     0.240    0.000
    5     0.200     2.65     100.0    0.0    0.0    0.0     0.300    0.850

  Particle composition of detached sediment
";

    fn parse(body: &str) -> Result<Vec<Row>> {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("H9.loss.dat");
        std::fs::write(&path, body).unwrap();
        parse_file(&path, &SentinelSet::default())
    }

    #[test]
    fn test_five_classes() {
        let rows = parse(SAMPLE).unwrap();
        let schema = schema();
        let diameter = schema.index_of("Diameter (mm)").unwrap();
        let fraction = schema.index_of("Sediment Fraction").unwrap();
        let exiting = schema.index_of("In Flow Exiting").unwrap();

        assert_eq!(rows.len(), 5);
        assert!(rows.iter().all(|r| r[0] == Value::Int(9)));
        assert_eq!(rows[0][1], Value::Int(1));
        assert_eq!(rows[0][diameter], Value::Float(0.002));
        assert_eq!(rows[0][fraction], Value::Float(0.010));
        assert_eq!(rows[0][exiting], Value::Float(0.0));
    }

    #[test]
    fn test_missing_class_is_malformed() {
        let body = SAMPLE.replace(
            "    5     0.200     2.65     100.0    0.0    0.0    0.0     0.300    0.850\n",
            "",
        );
        assert!(matches!(parse(&body), Err(InterchangeError::MalformedInput { .. })));
    }

    #[test]
    fn test_no_table_is_malformed_but_empty_file_is_not() {
        assert!(parse(" nothing here\n").is_err());
        assert!(parse("").unwrap().is_empty());
    }
}
