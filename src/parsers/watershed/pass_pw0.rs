//! `pass_pw0.txt`: the watershed PASS file.
//!
//! A labelled preamble (hillslope count, years, areas, particle diameters,
//! concentration coefficients) followed by the PASS record stream, where
//! each record carries its hillslope id after `year day`.

use super::{TableSet, watershed_date_columns};
use crate::config::SentinelSet;
use crate::constants::{PARTICLE_CLASSES, PASS_PW0_EVENTS_PARQUET, PASS_PW0_METADATA_PARQUET};
use crate::error::{InterchangeError, Result};
use crate::header::{as_int, parse_number, read_source};
use crate::models::{Row, Value};
use crate::parsers::calendar_year;
use crate::parsers::hillslope::pass::record_date;
use crate::parsers::pass_record::{pass_measure_columns, read_pass_records, starts_record};
use crate::schema::SchemaBuilder;

use arrow::datatypes::SchemaRef;
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, warn};

const SQUARE_METRES_PER_HECTARE: f64 = 10_000.0;

/// Preamble labels and the number of values each carries
const PREAMBLE_LABELS: [(&str, usize); 10] = [
    ("NUMBER OF HILLSLOPES", 1),
    ("BEGIN YEAR", 1),
    ("NUMBER OF YEARS", 1),
    ("WATERSHED AREA", 1),
    ("SURFACE AREA", 1),
    ("SUBSURFACE AREA", 1),
    ("BASEFLOW AREA", 1),
    ("CHANNEL AREA", 1),
    ("PARTICLE DIAMETERS", PARTICLE_CLASSES),
    ("SEDIMENT CONCENTRATION COEFFICIENTS", PARTICLE_CLASSES),
];

/// Values read from the preamble; areas are in m^2
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PassPw0Preamble {
    pub hillslopes: Option<i32>,
    pub begin_year: Option<i32>,
    pub years: Option<i32>,
    pub watershed_area: Option<f64>,
    pub surface_area: Option<f64>,
    pub subsurface_area: Option<f64>,
    pub baseflow_area: Option<f64>,
    pub channel_area: Option<f64>,
    pub particle_diameters: [Option<f64>; PARTICLE_CLASSES],
    pub concentration_coefficients: [Option<f64>; PARTICLE_CLASSES],
}

impl PassPw0Preamble {
    fn apply(&mut self, label: &str, values: &[Option<f64>]) {
        let first = values.first().copied().flatten();
        let int = first.and_then(as_int);
        match label {
            "NUMBER OF HILLSLOPES" => self.hillslopes = int,
            "BEGIN YEAR" => self.begin_year = int,
            "NUMBER OF YEARS" => self.years = int,
            "WATERSHED AREA" => self.watershed_area = first,
            "SURFACE AREA" => self.surface_area = first,
            "SUBSURFACE AREA" => self.subsurface_area = first,
            "BASEFLOW AREA" => self.baseflow_area = first,
            "CHANNEL AREA" => self.channel_area = first,
            "PARTICLE DIAMETERS" => self.particle_diameters.copy_from_slice(values),
            "SEDIMENT CONCENTRATION COEFFICIENTS" => {
                self.concentration_coefficients.copy_from_slice(values)
            }
            _ => {}
        }
    }

    pub fn watershed_area_ha(&self) -> Option<f64> {
        self.watershed_area.map(|area| area / SQUARE_METRES_PER_HECTARE)
    }

    fn metadata_row(&self) -> Row {
        let int = |value: Option<i32>| value.map_or(Value::Null, Value::from);
        let mut row: Row = vec![
            int(self.hillslopes),
            int(self.begin_year),
            int(self.years),
            Value::from(self.watershed_area),
            Value::from(self.surface_area),
            Value::from(self.subsurface_area),
            Value::from(self.baseflow_area),
            Value::from(self.channel_area),
        ];
        row.extend(self.particle_diameters.iter().copied().map(Value::from));
        row.extend(self.concentration_coefficients.iter().copied().map(Value::from));
        row
    }
}

static EVENTS: LazyLock<SchemaRef> = LazyLock::new(|| {
    pass_measure_columns(watershed_date_columns(
        SchemaBuilder::new()
            .int("wepp_id", "Hillslope id carried by the record")
            .text("event", "Record kind: EVENT, SUBEVENT or NO EVENT"),
    ))
    .measure("watershed_area_ha", "ha", "Watershed area from the file preamble")
    .build()
});

static METADATA: LazyLock<SchemaRef> = LazyLock::new(|| {
    let mut builder = SchemaBuilder::new()
        .nullable_int("number_of_hillslopes", None, "Hillslopes feeding the watershed")
        .nullable_int("begin_year", None, "First simulated calendar year")
        .nullable_int("number_of_years", None, "Simulated years")
        .measure("watershed_area", "m^2", "Total watershed area")
        .measure("surface_area", "m^2", "Area contributing surface runoff")
        .measure("subsurface_area", "m^2", "Area contributing subsurface flow")
        .measure("baseflow_area", "m^2", "Area contributing baseflow")
        .measure("channel_area", "m^2", "Channel area");
    for class in 1..=PARTICLE_CLASSES {
        builder = builder.measure(
            &format!("particle_diameter_{}", class),
            "m",
            &format!("Diameter of particle class {}", class),
        );
    }
    for class in 1..=PARTICLE_CLASSES {
        builder = builder.measure(
            &format!("sediment_concentration_coefficient_{}", class),
            "",
            &format!("Sediment concentration coefficient of particle class {}", class),
        );
    }
    builder.build()
});

pub fn events_schema() -> SchemaRef {
    EVENTS.clone()
}

pub fn metadata_schema() -> SchemaRef {
    METADATA.clone()
}

/// Events and the single-row preamble table
#[derive(Debug, Default)]
pub struct PassPw0Tables {
    pub events: Vec<Row>,
    pub metadata: Vec<Row>,
}

impl PassPw0Tables {
    pub fn into_artifacts(self) -> TableSet {
        vec![
            (PASS_PW0_EVENTS_PARQUET, EVENTS.clone(), self.events),
            (PASS_PW0_METADATA_PARQUET, METADATA.clone(), self.metadata),
        ]
    }
}

/// Zero-row tables for a missing file
pub fn empty_artifacts() -> TableSet {
    PassPw0Tables::default().into_artifacts()
}

pub fn parse_artifacts(
    path: &Path,
    sentinels: &SentinelSet,
    start_year: Option<i32>,
) -> Result<TableSet> {
    parse_file(path, sentinels, start_year).map(PassPw0Tables::into_artifacts)
}

pub(crate) fn parse_preamble(
    path: &Path,
    lines: &[&str],
    sentinels: &SentinelSet,
) -> Result<PassPw0Preamble> {
    let mut preamble = PassPw0Preamble::default();
    for (idx, line) in lines.iter().enumerate() {
        let trimmed = line.trim();
        let upper = trimmed.to_ascii_uppercase();
        let Some((label, count)) = PREAMBLE_LABELS
            .iter()
            .copied()
            .find(|(label, _)| upper.starts_with(label))
        else {
            continue;
        };

        let rest = trimmed[label.len()..]
            .trim_start_matches(|c: char| c.is_whitespace() || c == '=' || c == ':');
        let values: Vec<Option<f64>> = rest
            .split_whitespace()
            .map_while(|token| parse_number(token, sentinels).ok())
            .collect();
        if values.len() < count {
            return Err(InterchangeError::malformed(
                path,
                idx + 1,
                format!("{} expects {} values, found {}", label, count, values.len()),
            ));
        }
        preamble.apply(label, &values[..count]);
    }
    Ok(preamble)
}

/// Parse the preamble and every record
///
/// Without `start_year` the preamble's `BEGIN YEAR` maps simulation years
/// to calendar years.
pub fn parse_file(
    path: &Path,
    sentinels: &SentinelSet,
    start_year: Option<i32>,
) -> Result<PassPw0Tables> {
    let text = read_source(path)?;
    let lines: Vec<&str> = text.lines().collect();
    let first_record = lines.iter().position(|line| starts_record(line)).unwrap_or(lines.len());

    let preamble = parse_preamble(path, &lines[..first_record], sentinels)?;
    let start = start_year.or(preamble.begin_year);
    if start.is_none() {
        warn!("{}: no start year given and no BEGIN YEAR in the preamble", path.display());
    }
    let area_ha = Value::from(preamble.watershed_area_ha());

    let records = read_pass_records(path, &lines, first_record, true, sentinels)?;
    debug!("{}: {} PASS records", path.display(), records.len());

    let events = records
        .into_iter()
        .map(|record| {
            let date = record_date(path, &record, calendar_year(record.year, start))?;
            let hillslope = record.hillslope.ok_or_else(|| {
                InterchangeError::malformed(path, record.line_no, "record has no hillslope id")
            })?;

            let mut row: Row = Vec::with_capacity(EVENTS.fields().len());
            row.push(Value::from(hillslope));
            row.push(Value::from(record.kind().label()));
            row.extend(date.cells());
            row.push(Value::from(record.year));
            row.extend(record.measure_cells());
            row.push(area_ha.clone());
            Ok(row)
        })
        .collect::<Result<Vec<Row>>>()?;

    Ok(PassPw0Tables {
        events,
        metadata: vec![preamble.metadata_row()],
    })
}
