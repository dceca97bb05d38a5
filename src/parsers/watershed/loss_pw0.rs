//! `loss_pw0.txt`: the multi-year watershed loss report.
//!
//! The report holds one block per simulated year followed by an average
//! annual block. Each block may contain four sections (hillslopes,
//! channels, outlet, sediment classes). The parser walks the lines with an
//! explicit state machine:
//!
//! ```text
//! Header ──year──▶ YearBlock(n) ──year──▶ YearBlock(m)
//!    │                  │
//!    └────averages──────┴──▶ AvgHill ▶ AvgChn ▶ AvgOut ▶ AvgClass ▶ Done
//! ```
//!
//! Average sections must appear in that order (any may be absent). Yearly
//! sections land in the `all_years` tables with `year` and
//! `simulation_year` columns.

use super::TableSet;
use crate::config::SentinelSet;
use crate::constants::{
    LOSS_PW0_ALL_YEARS_CHN_PARQUET, LOSS_PW0_ALL_YEARS_CLASS_PARQUET,
    LOSS_PW0_ALL_YEARS_HILL_PARQUET, LOSS_PW0_ALL_YEARS_OUT_PARQUET, LOSS_PW0_CHN_PARQUET,
    LOSS_PW0_CLASS_PARQUET, LOSS_PW0_HILL_PARQUET, LOSS_PW0_OUT_PARQUET,
};
use crate::error::{InterchangeError, Result};
use crate::header::{NumericLine, is_separator, parse_number, read_block, read_source};
use crate::models::{Row, Value};
use crate::parsers::calendar_year;
use crate::schema::SchemaBuilder;

use arrow::datatypes::SchemaRef;
use std::path::Path;
use std::sync::LazyLock;
use tracing::debug;

const YEAR_HEADER: &str = "ANNUAL SUMMARY FOR WATERSHED IN YEAR";
const AVERAGE_HEADERS: [&str; 2] = ["AVERAGE ANNUAL SUMMARY", "ANNUAL AVERAGE SUMMARY"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Section {
    Hill,
    Chn,
    Out,
    Class,
}

impl Section {
    fn from_title(line: &str) -> Option<Self> {
        let title = line.trim().trim_end_matches(':').trim_end();
        [
            ("Hillslopes", Section::Hill),
            ("Channels and Impoundments", Section::Chn),
            ("Outlet", Section::Out),
            ("Sediment particle information leaving channel", Section::Class),
        ]
        .into_iter()
        .find(|(name, _)| title.eq_ignore_ascii_case(name))
        .map(|(_, section)| section)
    }

    /// Data columns of a numeric section
    fn columns(self) -> usize {
        match self {
            Section::Hill | Section::Class => 8,
            Section::Chn => 6,
            Section::Out => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LossState {
    Header,
    YearBlock(i32),
    AvgHill,
    AvgChn,
    AvgOut,
    AvgClass,
    Done,
}

impl LossState {
    /// Next average section this state accepts
    fn expected(self) -> Option<Section> {
        match self {
            LossState::AvgHill => Some(Section::Hill),
            LossState::AvgChn => Some(Section::Chn),
            LossState::AvgOut => Some(Section::Out),
            LossState::AvgClass => Some(Section::Class),
            _ => None,
        }
    }

    fn after(section: Section) -> Self {
        match section {
            Section::Hill => LossState::AvgChn,
            Section::Chn => LossState::AvgOut,
            Section::Out => LossState::AvgClass,
            Section::Class => LossState::Done,
        }
    }
}

fn hill_columns(builder: SchemaBuilder) -> SchemaBuilder {
    builder
        .int("Hillslopes", "Hillslope id")
        .measure("Runoff Volume (m^3)", "m^3", "Surface runoff volume")
        .measure("Subrunoff Volume (m^3)", "m^3", "Subsurface runoff volume")
        .measure("Baseflow Volume (m^3)", "m^3", "Baseflow volume")
        .measure("Soil Loss (kg)", "kg", "Soil loss")
        .measure("Sediment Deposition (kg)", "kg", "Sediment deposition")
        .measure("Sediment Yield (kg)", "kg", "Sediment yield")
        .measure("Hillslope Area (ha)", "ha", "Hillslope area")
}

fn chn_columns(builder: SchemaBuilder) -> SchemaBuilder {
    builder
        .int("Channels and Impoundments", "Channel or impoundment id")
        .measure("Discharge Volume (m^3)", "m^3", "Water discharged")
        .measure("Sediment Yield (tonne)", "tonne", "Sediment yield")
        .measure("Upland Charge (m^3)", "m^3", "Runoff contributed by upland hillslopes")
        .measure("Subsurface Flow Volume (m^3)", "m^3", "Subsurface flow volume")
        .measure("Contributing Area (ha)", "ha", "Area contributing to the channel")
}

fn out_columns(builder: SchemaBuilder) -> SchemaBuilder {
    builder
        .text("key", "Outlet quantity as labelled in the report")
        .measure("value", "", "Reported value, in the units given by the units column")
        .text("units", "Units of value; empty when the report gives none")
}

fn class_columns(builder: SchemaBuilder) -> SchemaBuilder {
    builder
        .int("Class", "Particle class (1-5)")
        .measure("Diameter (mm)", "mm", "Particle diameter")
        .measure("Specific Gravity", "", "Particle specific gravity")
        .measure("Sand (%)", "%", "Sand fraction of the class")
        .measure("Silt (%)", "%", "Silt fraction of the class")
        .measure("Clay (%)", "%", "Clay fraction of the class")
        .measure("O.M. (%)", "%", "Organic matter fraction of the class")
        .measure(
            "Fraction In Flow Exiting",
            "",
            "Fraction of sediment leaving the channel in the class",
        )
}

fn yearly(columns: fn(SchemaBuilder) -> SchemaBuilder) -> SchemaRef {
    columns(
        SchemaBuilder::new()
            .int("year", "Calendar year")
            .int("simulation_year", "Year as written in the report"),
    )
    .build()
}

static HILL: LazyLock<SchemaRef> = LazyLock::new(|| hill_columns(SchemaBuilder::new()).build());
static CHN: LazyLock<SchemaRef> = LazyLock::new(|| chn_columns(SchemaBuilder::new()).build());
static OUT: LazyLock<SchemaRef> = LazyLock::new(|| out_columns(SchemaBuilder::new()).build());
static CLASS: LazyLock<SchemaRef> = LazyLock::new(|| class_columns(SchemaBuilder::new()).build());
static ALL_YEARS_HILL: LazyLock<SchemaRef> = LazyLock::new(|| yearly(hill_columns));
static ALL_YEARS_CHN: LazyLock<SchemaRef> = LazyLock::new(|| yearly(chn_columns));
static ALL_YEARS_OUT: LazyLock<SchemaRef> = LazyLock::new(|| yearly(out_columns));
static ALL_YEARS_CLASS: LazyLock<SchemaRef> = LazyLock::new(|| yearly(class_columns));

/// The eight tables of one report
#[derive(Debug, Default)]
pub struct LossPw0Tables {
    pub hill: Vec<Row>,
    pub chn: Vec<Row>,
    pub out: Vec<Row>,
    pub class_data: Vec<Row>,
    pub all_years_hill: Vec<Row>,
    pub all_years_chn: Vec<Row>,
    pub all_years_out: Vec<Row>,
    pub all_years_class_data: Vec<Row>,
}

impl LossPw0Tables {
    /// `(artifact, schema, rows)` for each table, in write order
    pub fn into_artifacts(self) -> TableSet {
        vec![
            (LOSS_PW0_HILL_PARQUET, HILL.clone(), self.hill),
            (LOSS_PW0_CHN_PARQUET, CHN.clone(), self.chn),
            (LOSS_PW0_OUT_PARQUET, OUT.clone(), self.out),
            (LOSS_PW0_CLASS_PARQUET, CLASS.clone(), self.class_data),
            (LOSS_PW0_ALL_YEARS_HILL_PARQUET, ALL_YEARS_HILL.clone(), self.all_years_hill),
            (LOSS_PW0_ALL_YEARS_CHN_PARQUET, ALL_YEARS_CHN.clone(), self.all_years_chn),
            (LOSS_PW0_ALL_YEARS_OUT_PARQUET, ALL_YEARS_OUT.clone(), self.all_years_out),
            (LOSS_PW0_ALL_YEARS_CLASS_PARQUET, ALL_YEARS_CLASS.clone(), self.all_years_class_data),
        ]
    }

    fn table_mut(&mut self, section: Section, yearly: bool) -> &mut Vec<Row> {
        match (section, yearly) {
            (Section::Hill, false) => &mut self.hill,
            (Section::Chn, false) => &mut self.chn,
            (Section::Out, false) => &mut self.out,
            (Section::Class, false) => &mut self.class_data,
            (Section::Hill, true) => &mut self.all_years_hill,
            (Section::Chn, true) => &mut self.all_years_chn,
            (Section::Out, true) => &mut self.all_years_out,
            (Section::Class, true) => &mut self.all_years_class_data,
        }
    }
}

/// Year number from a yearly block header, `None` for other lines
fn year_header(path: &Path, line_no: usize, line: &str) -> Result<Option<i32>> {
    let upper = line.trim().to_ascii_uppercase();
    let Some(rest) = upper.strip_prefix(YEAR_HEADER) else {
        return Ok(None);
    };
    rest.trim()
        .parse::<i32>()
        .map(Some)
        .map_err(|_| {
            InterchangeError::malformed(
                path,
                line_no,
                format!("malformed year header '{}'", line.trim()),
            )
        })
}

fn is_average_header(line: &str) -> bool {
    let upper = line.trim().to_ascii_uppercase();
    AVERAGE_HEADERS.iter().any(|header| upper.starts_with(header))
}

fn numeric_rows(path: &Path, rows: Vec<NumericLine>, columns: usize) -> Result<Vec<Row>> {
    rows.into_iter()
        .map(|line| {
            let mut row: Row = Vec::with_capacity(columns);
            row.push(Value::from(line.int(0, path)?));
            row.extend(line.values_from(1, columns - 1));
            Ok(row)
        })
        .collect()
}

/// `label = value [units]` lines after a separator, up to a blank line
fn read_outlet(
    path: &Path,
    lines: &[&str],
    from: usize,
    sentinels: &SentinelSet,
) -> Result<(Vec<Row>, usize)> {
    let separator = (from..lines.len())
        .find(|&idx| is_separator(lines[idx]))
        .ok_or_else(|| {
            InterchangeError::malformed(path, from + 1, "outlet section has no separator line")
        })?;

    let mut rows = Vec::new();
    let mut idx = separator + 1;
    while idx < lines.len() && !lines[idx].trim().is_empty() {
        let line = lines[idx];
        if !is_separator(line) {
            let (label, rest) = line
                .split_once('=')
                .ok_or_else(|| {
                    InterchangeError::malformed(
                        path,
                        idx + 1,
                        "expected '<label> = <value> [units]'",
                    )
                })?;
            let mut tokens = rest.split_whitespace();
            let value = match tokens.next() {
                Some(token) => parse_number(token, sentinels).map_err(|_| {
                    InterchangeError::malformed(
                        path,
                        idx + 1,
                        format!("outlet value '{}' is not a number", token),
                    )
                })?,
                None => None,
            };
            let units = tokens.collect::<Vec<_>>().join(" ");
            rows.push(vec![Value::from(label.trim()), Value::from(value), Value::from(units)]);
        }
        idx += 1;
    }
    Ok((rows, idx))
}

/// Parse the report into its eight tables
///
/// `start_year` maps simulation years to calendar years; without it the
/// first yearly block's number is taken as the start.
pub fn parse_file(
    path: &Path,
    sentinels: &SentinelSet,
    start_year: Option<i32>,
) -> Result<LossPw0Tables> {
    let text = read_source(path)?;
    let lines: Vec<&str> = text.lines().collect();

    let mut tables = LossPw0Tables::default();
    // yearly rows keyed by raw year until the start year is known
    let mut yearly: Vec<(Section, i32, Row)> = Vec::new();
    let mut first_year = None;
    let mut state = LossState::Header;

    let mut idx = 0;
    while idx < lines.len() {
        let line = lines[idx];
        let line_no = idx + 1;

        if let Some(year) = year_header(path, line_no, line)? {
            state = match state {
                LossState::Header | LossState::YearBlock(_) => LossState::YearBlock(year),
                _ => {
                    return Err(InterchangeError::malformed(
                        path,
                        line_no,
                        "yearly summary after the average annual summary",
                    ));
                }
            };
            first_year.get_or_insert(year);
            idx += 1;
            continue;
        }

        if is_average_header(line) {
            state = match state {
                LossState::Header | LossState::YearBlock(_) => LossState::AvgHill,
                _ => {
                    return Err(InterchangeError::malformed(
                        path,
                        line_no,
                        "second average annual summary",
                    ));
                }
            };
            idx += 1;
            continue;
        }

        let Some(section) = Section::from_title(line) else {
            idx += 1;
            continue;
        };

        let year = match state {
            LossState::YearBlock(year) => Some(year),
            LossState::Header | LossState::Done => {
                return Err(InterchangeError::malformed(
                    path,
                    line_no,
                    format!("'{}' section outside a yearly or average summary", line.trim()),
                ));
            }
            avg => match avg.expected() {
                Some(expected) if section >= expected => None,
                _ => {
                    return Err(InterchangeError::malformed(
                        path,
                        line_no,
                        format!(
                            "'{}' section out of order in the average annual summary",
                            line.trim()
                        ),
                    ));
                }
            },
        };

        let (rows, next) = match section {
            Section::Out => read_outlet(path, &lines, idx + 1, sentinels)?,
            _ => {
                let (rows, next) = read_block(path, &lines, idx + 1, section.columns(), sentinels)?;
                (numeric_rows(path, rows, section.columns())?, next)
            }
        };
        debug!(
            "{}: {:?} section at line {} with {} rows",
            path.display(),
            section,
            line_no,
            rows.len()
        );

        match year {
            Some(year) => yearly.extend(rows.into_iter().map(|row| (section, year, row))),
            None => {
                tables.table_mut(section, false).extend(rows);
                state = LossState::after(section);
            }
        }
        idx = next;
    }

    let start = start_year.or(first_year);
    for (section, raw_year, row) in yearly {
        let mut full: Row = Vec::with_capacity(row.len() + 2);
        full.push(Value::from(calendar_year(raw_year, start)));
        full.push(Value::from(raw_year));
        full.extend(row);
        tables.table_mut(section, true).push(full);
    }
    Ok(tables)
}

/// Zero-row tables for a missing report
pub fn empty_artifacts() -> TableSet {
    LossPw0Tables::default().into_artifacts()
}

pub fn parse_artifacts(
    path: &Path,
    sentinels: &SentinelSet,
    start_year: Option<i32>,
) -> Result<TableSet> {
    parse_file(path, sentinels, start_year).map(LossPw0Tables::into_artifacts)
}
