//! Watershed (`pw0` and channel) parsers.
//!
//! Raw watershed years may be simulation years; every dated watershed
//! product carries both the calendar `year` and the raw `simulation_year`.

pub mod chan_out;
pub mod chanwb;
pub mod chnwb;
pub mod ebe_pw0;
pub mod loss_pw0;
pub mod pass_pw0;
pub mod soil_pw0;

use crate::config::SentinelSet;
use crate::constants::{
    CHAN_OUT_FILENAME, CHAN_OUT_PARQUET, CHANWB_FILENAME, CHANWB_PARQUET, CHNWB_FILENAME,
    CHNWB_PARQUET, EBE_PW0_FILENAME, EBE_PW0_PARQUET, LOSS_PW0_FILENAME, PASS_PW0_FILENAME,
    SOIL_PW0_FILENAME, SOIL_PW0_PARQUET,
};
use crate::error::Result;
use crate::models::Row;
use crate::schema::SchemaBuilder;

use arrow::datatypes::SchemaRef;
use std::path::Path;

pub type WatershedParseFn = fn(&Path, &SentinelSet, Option<i32>) -> Result<Vec<Row>>;

/// `(artifact, schema, rows)` for each table a report produces
pub type TableSet = Vec<(&'static str, SchemaRef, Vec<Row>)>;

pub type ReportParseFn = fn(&Path, &SentinelSet, Option<i32>) -> Result<TableSet>;

/// A single-table watershed product
#[derive(Clone, Copy)]
pub struct WatershedTable {
    pub kind: &'static str,
    pub source: &'static str,
    pub artifact: &'static str,
    pub schema: fn() -> SchemaRef,
    pub parse: WatershedParseFn,
}

pub const WATERSHED_TABLES: [WatershedTable; 5] = [
    WatershedTable {
        kind: "chan_out",
        source: CHAN_OUT_FILENAME,
        artifact: CHAN_OUT_PARQUET,
        schema: chan_out::schema,
        parse: chan_out::parse_file,
    },
    WatershedTable {
        kind: "chanwb",
        source: CHANWB_FILENAME,
        artifact: CHANWB_PARQUET,
        schema: chanwb::schema,
        parse: chanwb::parse_file,
    },
    WatershedTable {
        kind: "chnwb",
        source: CHNWB_FILENAME,
        artifact: CHNWB_PARQUET,
        schema: chnwb::schema,
        parse: chnwb::parse_file,
    },
    WatershedTable {
        kind: "ebe_pw0",
        source: EBE_PW0_FILENAME,
        artifact: EBE_PW0_PARQUET,
        schema: ebe_pw0::schema,
        parse: ebe_pw0::parse_file,
    },
    WatershedTable {
        kind: "soil_pw0",
        source: SOIL_PW0_FILENAME,
        artifact: SOIL_PW0_PARQUET,
        schema: soil_pw0::schema,
        parse: soil_pw0::parse_file,
    },
];

pub fn watershed_table(kind: &str) -> Option<WatershedTable> {
    WATERSHED_TABLES.iter().copied().find(|t| t.kind == kind)
}

/// A watershed report split into several artifacts
#[derive(Clone, Copy)]
pub struct WatershedReport {
    pub kind: &'static str,
    pub source: &'static str,
    pub parse: ReportParseFn,
    pub empty: fn() -> TableSet,
}

pub const WATERSHED_REPORTS: [WatershedReport; 2] = [
    WatershedReport {
        kind: "loss_pw0",
        source: LOSS_PW0_FILENAME,
        parse: loss_pw0::parse_artifacts,
        empty: loss_pw0::empty_artifacts,
    },
    WatershedReport {
        kind: "pass_pw0",
        source: PASS_PW0_FILENAME,
        parse: pass_pw0::parse_artifacts,
        empty: pass_pw0::empty_artifacts,
    },
];

pub fn watershed_report(kind: &str) -> Option<WatershedReport> {
    WATERSHED_REPORTS.iter().copied().find(|r| r.kind == kind)
}

/// Calendar columns followed by `simulation_year`
pub(crate) fn watershed_date_columns(builder: SchemaBuilder) -> SchemaBuilder {
    builder
        .date_columns()
        .int("simulation_year", "Year as written by the simulator")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::schema_version;

    #[test]
    fn test_tables_are_versioned_and_unique() {
        let mut artifacts: Vec<&str> = WATERSHED_TABLES.iter().map(|t| t.artifact).collect();
        artifacts.sort();
        artifacts.dedup();
        assert_eq!(artifacts.len(), WATERSHED_TABLES.len());
        for table in WATERSHED_TABLES {
            let schema = (table.schema)();
            assert!(schema_version(&schema).is_some(), "{}", table.kind);
            assert!(schema.index_of("simulation_year").is_ok(), "{}", table.kind);
        }
        assert!(watershed_table("ebe_pw0").is_some());
        assert!(watershed_table("loss_pw0").is_none());
    }

    #[test]
    fn test_reports_declare_every_artifact() {
        let artifacts: Vec<&str> = WATERSHED_REPORTS
            .iter()
            .flat_map(|r| (r.empty)())
            .map(|(artifact, _, rows)| {
                assert!(rows.is_empty());
                artifact
            })
            .collect();
        assert_eq!(artifacts.len(), 10);
        assert!(artifacts.contains(&"loss_pw0.all_years.class_data.parquet"));
        assert!(artifacts.contains(&"pass_pw0.metadata.parquet"));
        assert_eq!(watershed_report("pass_pw0").map(|r| r.source), Some("pass_pw0.txt"));
    }
}
