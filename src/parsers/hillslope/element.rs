//! `H<id>.element.dat`: daily hydrology, plant and erodibility state per OFE.

use super::sort_daily;
use crate::config::SentinelSet;
use crate::error::Result;
use crate::header::{TableLayout, read_source, read_table};
use crate::models::{Row, Value};
use crate::parsers::{calendar_year, date_from_month_day, hillslope_id};
use crate::schema::SchemaBuilder;

use arrow::datatypes::SchemaRef;
use std::path::Path;
use std::sync::LazyLock;

const LAYOUT: TableLayout = TableLayout::new(24, 2);

/// Measurement columns after `OFE DD MM YYYY`
const MEASURES: [(&str, &str, &str); 20] = [
    ("Precip (mm)", "mm", "Precipitation"),
    ("Runoff (mm)", "mm", "Runoff depth"),
    ("EffInt (mm/h)", "mm/h", "Effective rainfall intensity"),
    ("PeakRO (mm/h)", "mm/h", "Peak runoff rate"),
    ("EffDur (h)", "h", "Effective runoff duration"),
    ("Enrich (Ratio)", "", "Sediment enrichment ratio"),
    ("Keff (mm/h)", "mm/h", "Effective hydraulic conductivity"),
    ("Sm (mm)", "mm", "Soil water content"),
    ("LeafArea (Index)", "", "Leaf area index"),
    ("CanHgt (m)", "m", "Canopy height"),
    ("Cancov (%)", "%", "Canopy cover"),
    ("IntCov (%)", "%", "Interrill cover"),
    ("RilCov (%)", "%", "Rill cover"),
    ("LivBio (kg/m^2)", "kg/m^2", "Live biomass"),
    ("DeadBio (kg/m^2)", "kg/m^2", "Dead biomass"),
    ("Ki", "kg s/m^4", "Adjusted interrill erodibility"),
    ("Kr", "s/m", "Adjusted rill erodibility"),
    ("Tcrit (Pa)", "Pa", "Adjusted critical shear stress"),
    ("RilWid (m)", "m", "Rill width"),
    ("SedLeave (kg/m)", "kg/m", "Sediment leaving the OFE per unit width"),
];

static SCHEMA: LazyLock<SchemaRef> = LazyLock::new(|| {
    MEASURES
        .iter()
        .fold(
            SchemaBuilder::new()
                .int("wepp_id", "Hillslope id from the source filename")
                .int("ofe_id", "Overland flow element")
                .date_columns(),
            |builder, (name, units, description)| builder.measure(name, units, description),
        )
        .build()
});

pub fn schema() -> SchemaRef {
    SCHEMA.clone()
}

pub fn parse_file(
    path: &Path,
    sentinels: &SentinelSet,
    start_year: Option<i32>,
) -> Result<Vec<Row>> {
    let wepp_id = hillslope_id(path)?;
    let text = read_source(path)?;
    let (_, lines) = read_table(path, &text, LAYOUT, sentinels)?;

    let mut keyed = Vec::with_capacity(lines.len());
    for line in lines {
        let ofe = line.int(0, path)?;
        let year = calendar_year(line.int(3, path)?, start_year);
        let date = date_from_month_day(path, &line, year, 2, 1)?;

        let mut row: Row = Vec::with_capacity(8 + MEASURES.len());
        row.push(Value::from(wepp_id));
        row.push(Value::from(ofe));
        row.extend(date.cells());
        row.extend(line.values_from(4, MEASURES.len()));
        keyed.push((date, ofe, row));
    }
    Ok(sort_daily(keyed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::field_units;
    use tempfile::TempDir;

    const SAMPLE: &str = "\
 Element output for hillslope 1
 OFE  DD MM YYYY  Precip  Runoff  EffInt  PeakRO  EffDur  Enrich  Keff  Sm  LeafArea  CanHgt  Cancov  IntCov  RilCov  LivBio  DeadBio  Ki  Kr  Tcrit  RilWid  SedLeave
       mm  mm  mm/h  mm/h  h  Ratio  mm/h  mm  Index  m  %  %  %  kg/m^2  kg/m^2  adjsmt  adjsmt  adjsmt  m  kg/m
----------------------------------------------------------------
  1   2  1 2000   5.0   0.3  2.1  1.0  0.5  1.2  3.5  120.0  0.1  0.2  10.0  80.0  80.0  0.2  0.3  1.0e6  0.01  3.5  0.1  0.0
  2   1  1 2000   0.0   0.0  0.0  0.0  0.0  0.0  3.5  110.0  0.1  0.2  10.0  80.0  80.0  0.2  0.3  1.0e6  0.01  3.5  0.1  0.0
  1   1  1 2000   0.0 ****** 0.0  0.0  0.0  0.0  3.5  100.0  0.1  0.2  10.0  80.0  80.0  0.2  0.3  1.0e6  0.01  3.5  0.1  0.0
";

    fn write_sample(dir: &TempDir, name: &str, body: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_parse_orders_and_nulls_missing_runoff() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_sample(&temp_dir, "H1.element.dat", SAMPLE);
        let rows = parse_file(&path, &SentinelSet::default(), None).unwrap();

        assert_eq!(rows.len(), 3);
        let schema = schema();
        let runoff = schema.index_of("Runoff (mm)").unwrap();
        let precip = schema.index_of("Precip (mm)").unwrap();
        let julian = schema.index_of("julian").unwrap();

        // (julian 1, ofe 1) sorts first
        assert_eq!(rows[0][0], Value::Int(1));
        assert_eq!(rows[0][1], Value::Int(1));
        assert_eq!(rows[0][julian], Value::Int(1));
        assert_eq!(rows[0][runoff], Value::Null);
        assert_eq!(rows[0][precip], Value::Float(0.0));

        assert_eq!(rows[1][1], Value::Int(2));
        assert_eq!(rows[2][julian], Value::Int(2));
        assert_eq!(rows[2][runoff], Value::Float(0.3));
        assert!(rows.iter().all(|r| r.len() == schema.fields().len()));
    }

    #[test]
    fn test_invalid_date_is_malformed() {
        let temp_dir = TempDir::new().unwrap();
        let body = SAMPLE.replace("  1   2  1 2000", "  1  30  2 2001");
        let path = write_sample(&temp_dir, "H1.element.dat", &body);
        let err = parse_file(&path, &SentinelSet::default(), None).unwrap_err();
        assert!(err.to_string().contains("line 5"), "{}", err);
    }

    #[test]
    fn test_units_metadata() {
        let schema = schema();
        let field = schema.field_with_name("Runoff (mm)").unwrap();
        assert_eq!(field_units(field), Some("mm"));
        assert_eq!(field_units(schema.field_with_name("Enrich (Ratio)").unwrap()), None);
    }
}
