//! `soil_pw0.txt`: daily soil state for channel OFEs.

use super::watershed_date_columns;
use crate::config::SentinelSet;
use crate::error::Result;
use crate::header::{read_source, read_table};
use crate::models::{Row, Value};
use crate::parsers::hillslope::soil::{
    LAYOUT, SIM_DAY_INDEX_DESCRIPTION, SOIL_MEASURES, soil_measures,
};
use crate::parsers::{SimDayIndex, calendar_year, date_from_julian};
use crate::schema::SchemaBuilder;

use arrow::datatypes::SchemaRef;
use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

static SCHEMA: LazyLock<SchemaRef> = LazyLock::new(|| {
    soil_measures(
        watershed_date_columns(SchemaBuilder::new().int("ofe_id", "Channel overland flow element"))
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
    let text = read_source(path)?;
    let (_, lines) = read_table(path, &text, LAYOUT, sentinels)?;

    let mut day_index: HashMap<i32, SimDayIndex> = HashMap::new();
    let mut keyed = Vec::with_capacity(lines.len());
    for line in &lines {
        let ofe = line.int(0, path)?;
        let raw_year = line.int(2, path)?;
        let date = date_from_julian(path, line, calendar_year(raw_year, start_year), 1)?;
        let sim_day = day_index.entry(ofe).or_default().next(path, date);

        let mut row: Row = Vec::with_capacity(SCHEMA.fields().len());
        row.push(Value::from(ofe));
        row.extend(date.cells());
        row.push(Value::from(raw_year));
        row.push(Value::Int(sim_day));
        row.extend(line.values_from(3, SOIL_MEASURES.len()));
        keyed.push(((date.year, date.julian, ofe), row));
    }
    keyed.sort_by_key(|(key, _)| *key);
    Ok(keyed.into_iter().map(|(_, row)| row).collect())
}
