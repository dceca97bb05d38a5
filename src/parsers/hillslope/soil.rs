//! `H<id>.soil.dat`: daily soil state per OFE.

use super::sort_daily;
use crate::config::SentinelSet;
use crate::error::Result;
use crate::header::{TableLayout, read_source, read_table};
use crate::models::{Row, Value};
use crate::parsers::{SimDayIndex, calendar_year, date_from_julian, hillslope_id};
use crate::schema::SchemaBuilder;

use arrow::datatypes::SchemaRef;
use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

pub(crate) const LAYOUT: TableLayout = TableLayout::new(14, 2);

/// Measurement columns after `OFE Day Y`
pub(crate) const SOIL_MEASURES: [(&str, &str, &str); 11] = [
    ("Poros (%)", "%", "Porosity"),
    ("Keff (mm/hr)", "mm/hr", "Effective hydraulic conductivity"),
    ("Suct (mm)", "mm", "Suction across the wetting front"),
    ("FC (mm/mm)", "mm/mm", "Field capacity"),
    ("WP (mm/mm)", "mm/mm", "Wilting point"),
    ("Rough (mm)", "mm", "Random roughness"),
    ("Ki (adjsmt)", "", "Interrill erodibility adjustment"),
    ("Kr (adjsmt)", "", "Rill erodibility adjustment"),
    ("Tauc (adjsmt)", "", "Critical shear adjustment"),
    ("Saturation (frac)", "", "Soil saturation fraction"),
    ("TSW (mm)", "mm", "Total soil water"),
];

pub(crate) fn soil_measures(builder: SchemaBuilder) -> SchemaBuilder {
    SOIL_MEASURES
        .iter()
        .fold(builder, |builder, (name, units, description)| {
            builder.measure(name, units, description)
        })
}

pub(crate) const SIM_DAY_INDEX_DESCRIPTION: &str =
    "Days since January 1 of the first simulated year, starting at 1";

static SCHEMA: LazyLock<SchemaRef> = LazyLock::new(|| {
    soil_measures(
        SchemaBuilder::new()
            .int("wepp_id", "Hillslope id from the source filename")
            .int("ofe_id", "Overland flow element")
            .date_columns()
            .int("sim_day_index", SIM_DAY_INDEX_DESCRIPTION),
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

    // one counter per OFE so OFE-major files do not look like resets
    let mut day_index: HashMap<i32, SimDayIndex> = HashMap::new();
    let mut keyed = Vec::with_capacity(lines.len());
    for line in lines {
        let ofe = line.int(0, path)?;
        let year = calendar_year(line.int(2, path)?, start_year);
        let date = date_from_julian(path, &line, year, 1)?;
        let sim_day = day_index.entry(ofe).or_default().next(path, date);

        let mut row: Row = Vec::with_capacity(9 + SOIL_MEASURES.len());
        row.push(Value::from(wepp_id));
        row.push(Value::from(ofe));
        row.extend(date.cells());
        row.push(Value::Int(sim_day));
        row.extend(line.values_from(3, SOIL_MEASURES.len()));
        keyed.push((date, ofe, row));
    }
    Ok(sort_daily(keyed))
}
