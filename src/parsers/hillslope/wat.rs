//! `H<id>.wat.dat`: daily water balance per OFE.
//!
//! The watershed channel balance (`chnwb.txt`) shares this column layout,
//! so the measurement list is public.

use super::sort_daily;
use crate::config::SentinelSet;
use crate::error::Result;
use crate::header::{TableLayout, read_source, read_table};
use crate::models::{Row, Value};
use crate::parsers::{calendar_year, date_from_julian, hillslope_id};
use crate::schema::SchemaBuilder;

use arrow::datatypes::SchemaRef;
use std::path::Path;
use std::sync::LazyLock;

pub(crate) const LAYOUT: TableLayout = TableLayout::new(20, 2);

/// Measurement columns after `OFE J Y`
pub(crate) const WATER_BALANCE_MEASURES: [(&str, &str, &str); 17] = [
    ("P (mm)", "mm", "Precipitation"),
    ("RM (mm)", "mm", "Rainfall plus snowmelt"),
    ("Q (mm)", "mm", "Surface runoff"),
    ("Ep (mm)", "mm", "Plant transpiration"),
    ("Es (mm)", "mm", "Soil evaporation"),
    ("Er (mm)", "mm", "Residue evaporation"),
    ("Dp (mm)", "mm", "Deep percolation"),
    ("UpStrmQ (mm)", "mm", "Runon added to the OFE"),
    ("SubRIn (mm)", "mm", "Subsurface runon added to the OFE"),
    ("latqcc (mm)", "mm", "Lateral subsurface flow"),
    ("Total-Soil Water (mm)", "mm", "Unfrozen soil water"),
    ("frozwt (mm)", "mm", "Frozen soil water"),
    ("Snow-Water (mm)", "mm", "Water in surface snow"),
    ("QOFE (mm)", "mm", "Runoff leaving the OFE"),
    ("Tile (mm)", "mm", "Tile drainage"),
    ("Irr (mm)", "mm", "Irrigation"),
    ("Area (m^2)", "m^2", "OFE area"),
];

pub(crate) fn water_balance_measures(builder: SchemaBuilder) -> SchemaBuilder {
    WATER_BALANCE_MEASURES
        .iter()
        .fold(builder, |builder, (name, units, description)| {
            builder.measure(name, units, description)
        })
}

static SCHEMA: LazyLock<SchemaRef> = LazyLock::new(|| {
    water_balance_measures(
        SchemaBuilder::new()
            .int("wepp_id", "Hillslope id from the source filename")
            .int("ofe_id", "Overland flow element")
            .date_columns(),
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
        let year = calendar_year(line.int(2, path)?, start_year);
        let date = date_from_julian(path, &line, year, 1)?;

        let mut row: Row = Vec::with_capacity(8 + WATER_BALANCE_MEASURES.len());
        row.push(Value::from(wepp_id));
        row.push(Value::from(ofe));
        row.extend(date.cells());
        row.extend(line.values_from(3, WATER_BALANCE_MEASURES.len()));
        keyed.push((date, ofe, row));
    }
    Ok(sort_daily(keyed))
}
