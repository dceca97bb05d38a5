//! PASS record stream shared by the hillslope and watershed PASS parsers.
//!
//! A PASS file is a stream of records that may wrap across lines:
//!
//! ```text
//! EVENT    year day [hill] dur tcs oalpha runoff runvol sbrunf sbrunv drainq drrunv
//!          peakro tdet tdep sedcon(1..5) frcflw(1..5) gwbfv gwdsv
//! SUBEVENT year day [hill] sbrunf sbrunv drainq drrunv sedcon(1..5) frcflw(1..5) gwbfv gwdsv
//! NO EVENT year day [hill] gwbfv gwdsv
//! ```
//!
//! Records are read into [`PassRecord`] and projected to one flat row shape
//! where fields a record kind does not report are zero.

use crate::config::SentinelSet;
use crate::constants::PARTICLE_CLASSES;
use crate::error::{InterchangeError, Result};
use crate::header::{as_int, parse_number, split_tokens};
use crate::models::Value;
use crate::schema::SchemaBuilder;

use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassEventKind {
    Event,
    SubEvent,
    NoEvent,
}

impl PassEventKind {
    pub fn label(self) -> &'static str {
        match self {
            PassEventKind::Event => "EVENT",
            PassEventKind::SubEvent => "SUBEVENT",
            PassEventKind::NoEvent => "NO EVENT",
        }
    }
}

/// Surface runoff event
#[derive(Debug, Clone, PartialEq)]
pub struct EventData {
    pub dur: Option<f64>,
    pub tcs: Option<f64>,
    pub oalpha: Option<f64>,
    pub runoff: Option<f64>,
    pub runvol: Option<f64>,
    pub peakro: Option<f64>,
    pub tdet: Option<f64>,
    pub tdep: Option<f64>,
    pub flow: SubsurfaceFlow,
}

/// Subsurface and drainage flow reported by events and subevents
#[derive(Debug, Clone, PartialEq)]
pub struct SubsurfaceFlow {
    pub sbrunf: Option<f64>,
    pub sbrunv: Option<f64>,
    pub drainq: Option<f64>,
    pub drrunv: Option<f64>,
    pub sedcon: [Option<f64>; PARTICLE_CLASSES],
    pub frcflw: [Option<f64>; PARTICLE_CLASSES],
}

#[derive(Debug, Clone, PartialEq)]
pub enum PassPayload {
    Event(EventData),
    SubEvent(SubsurfaceFlow),
    NoEvent,
}

/// One PASS record
#[derive(Debug, Clone, PartialEq)]
pub struct PassRecord {
    pub line_no: usize,
    pub year: i32,
    pub julian: i32,
    /// Hillslope id; only present in the watershed stream
    pub hillslope: Option<i32>,
    pub payload: PassPayload,
    pub gwbfv: Option<f64>,
    pub gwdsv: Option<f64>,
}

impl PassRecord {
    pub fn kind(&self) -> PassEventKind {
        match self.payload {
            PassPayload::Event(_) => PassEventKind::Event,
            PassPayload::SubEvent(_) => PassEventKind::SubEvent,
            PassPayload::NoEvent => PassEventKind::NoEvent,
        }
    }

    /// Flat measurement cells in the order of [`pass_measure_columns`]
    pub fn measure_cells(&self) -> Vec<Value> {
        let zero = Some(0.0);
        let no_flow = SubsurfaceFlow {
            sbrunf: zero,
            sbrunv: zero,
            drainq: zero,
            drrunv: zero,
            sedcon: [zero; PARTICLE_CLASSES],
            frcflw: [zero; PARTICLE_CLASSES],
        };
        let (event, flow) = match &self.payload {
            PassPayload::Event(event) => (Some(event), &event.flow),
            PassPayload::SubEvent(flow) => (None, flow),
            PassPayload::NoEvent => (None, &no_flow),
        };
        let event_field = |f: fn(&EventData) -> Option<f64>| event.map_or(zero, f);

        let mut cells = Vec::with_capacity(16 + 2 * PARTICLE_CLASSES);
        cells.push(event_field(|e| e.dur).into());
        cells.push(event_field(|e| e.tcs).into());
        cells.push(event_field(|e| e.oalpha).into());
        cells.push(event_field(|e| e.runoff).into());
        cells.push(event_field(|e| e.runvol).into());
        cells.push(flow.sbrunf.into());
        cells.push(flow.sbrunv.into());
        cells.push(flow.drainq.into());
        cells.push(flow.drrunv.into());
        cells.push(event_field(|e| e.peakro).into());
        cells.push(event_field(|e| e.tdet).into());
        cells.push(event_field(|e| e.tdep).into());
        cells.extend(flow.sedcon.iter().map(|&v| Value::from(v)));
        cells.extend(flow.frcflw.iter().map(|&v| Value::from(v)));
        cells.push(self.gwbfv.into());
        cells.push(self.gwdsv.into());
        cells
    }
}

/// Append the flat PASS measurement columns
pub fn pass_measure_columns(builder: SchemaBuilder) -> SchemaBuilder {
    let mut builder = builder
        .measure("dur", "s", "Storm duration")
        .measure("tcs", "h", "Overland flow time of concentration")
        .measure("oalpha", "", "Overland flow alpha parameter")
        .measure("runoff", "m", "Runoff depth")
        .measure("runvol", "m^3", "Runoff volume")
        .measure("sbrunf", "m", "Subsurface runoff depth")
        .measure("sbrunv", "m^3", "Subsurface runoff volume")
        .measure("drainq", "m/day", "Drainage flux")
        .measure("drrunv", "m^3", "Drainage runoff volume")
        .measure("peakro", "m^3/s", "Peak runoff rate")
        .measure("tdet", "kg", "Total detachment")
        .measure("tdep", "kg", "Total deposition");
    for class in 1..=PARTICLE_CLASSES {
        builder = builder.measure(
            &format!("sedcon_{}", class),
            "kg/m^3",
            &format!("Sediment concentration, particle class {}", class),
        );
    }
    for class in 1..=PARTICLE_CLASSES {
        builder = builder.measure(
            &format!("frcflw_{}", class),
            "",
            &format!("Fraction of flow carrying particle class {}", class),
        );
    }
    builder
        .measure("gwbfv", "m^3", "Groundwater baseflow volume")
        .measure("gwdsv", "m^3", "Groundwater deep seepage volume")
}

/// True when `line` opens a PASS record
pub fn starts_record(line: &str) -> bool {
    let mut tokens = line.split_whitespace();
    match tokens.next() {
        Some("EVENT") | Some("SUBEVENT") => true,
        Some("NO") => tokens.next() == Some("EVENT"),
        _ => false,
    }
}

struct TokenCursor<'a> {
    path: &'a Path,
    sentinels: &'a SentinelSet,
    tokens: Vec<(&'a str, usize)>,
    pos: usize,
}

impl<'a> TokenCursor<'a> {
    fn peek(&self) -> Option<(&'a str, usize)> {
        self.tokens.get(self.pos).copied()
    }

    fn last_line(&self) -> usize {
        self.tokens.last().map_or(0, |(_, line)| *line)
    }

    fn next_token(&mut self) -> Result<(&'a str, usize)> {
        let token = self.peek().ok_or_else(|| {
            InterchangeError::malformed(
                self.path,
                self.last_line(),
                "record truncated at end of file",
            )
        })?;
        self.pos += 1;
        Ok(token)
    }

    fn number(&mut self) -> Result<Option<f64>> {
        let (token, line) = self.next_token()?;
        parse_number(token, self.sentinels).map_err(|_| {
            InterchangeError::malformed(
                self.path,
                line,
                format!("expected a number, found '{}'", token),
            )
        })
    }

    fn int(&mut self) -> Result<i32> {
        let (token, line) = self.next_token()?;
        parse_number(token, self.sentinels)
            .ok()
            .flatten()
            .and_then(as_int)
            .ok_or_else(|| {
                InterchangeError::malformed(
                    self.path,
                    line,
                    format!("expected an integer, found '{}'", token),
                )
            })
    }

    fn numbers<const N: usize>(&mut self) -> Result<[Option<f64>; N]> {
        let mut values = [None; N];
        for value in values.iter_mut() {
            *value = self.number()?;
        }
        Ok(values)
    }

    fn flow(&mut self) -> Result<SubsurfaceFlow> {
        let [sbrunf, sbrunv, drainq, drrunv] = self.numbers::<4>()?;
        Ok(SubsurfaceFlow {
            sbrunf,
            sbrunv,
            drainq,
            drrunv,
            sedcon: self.numbers::<PARTICLE_CLASSES>()?,
            frcflw: self.numbers::<PARTICLE_CLASSES>()?,
        })
    }

    fn record(&mut self, with_hillslope: bool) -> Result<PassRecord> {
        let (keyword, line_no) = self.next_token()?;
        let kind = match keyword {
            "EVENT" => PassEventKind::Event,
            "SUBEVENT" => PassEventKind::SubEvent,
            "NO" => match self.next_token()? {
                ("EVENT", _) => PassEventKind::NoEvent,
                (other, line) => {
                    return Err(InterchangeError::malformed(
                        self.path,
                        line,
                        format!("expected 'NO EVENT', found 'NO {}'", other),
                    ));
                }
            },
            other => {
                return Err(InterchangeError::malformed(
                    self.path,
                    line_no,
                    format!("unknown PASS record '{}'", other),
                ));
            }
        };

        let year = self.int()?;
        let julian = self.int()?;
        let hillslope = if with_hillslope { Some(self.int()?) } else { None };

        let payload = match kind {
            PassEventKind::Event => {
                let [dur, tcs, oalpha, runoff, runvol] = self.numbers::<5>()?;
                let [sbrunf, sbrunv, drainq, drrunv] = self.numbers::<4>()?;
                let [peakro, tdet, tdep] = self.numbers::<3>()?;
                PassPayload::Event(EventData {
                    dur,
                    tcs,
                    oalpha,
                    runoff,
                    runvol,
                    peakro,
                    tdet,
                    tdep,
                    flow: SubsurfaceFlow {
                        sbrunf,
                        sbrunv,
                        drainq,
                        drrunv,
                        sedcon: self.numbers::<PARTICLE_CLASSES>()?,
                        frcflw: self.numbers::<PARTICLE_CLASSES>()?,
                    },
                })
            }
            PassEventKind::SubEvent => PassPayload::SubEvent(self.flow()?),
            PassEventKind::NoEvent => PassPayload::NoEvent,
        };
        let [gwbfv, gwdsv] = self.numbers::<2>()?;

        Ok(PassRecord {
            line_no,
            year,
            julian,
            hillslope,
            payload,
            gwbfv,
            gwdsv,
        })
    }
}

/// Read every record from `lines[from..]`
pub fn read_pass_records(
    path: &Path,
    lines: &[&str],
    from: usize,
    with_hillslope: bool,
    sentinels: &SentinelSet,
) -> Result<Vec<PassRecord>> {
    let tokens = lines
        .iter()
        .enumerate()
        .skip(from)
        .flat_map(|(idx, &line)| split_tokens(line).into_iter().map(move |t| (t, idx + 1)))
        .collect();
    let mut cursor = TokenCursor {
        path,
        sentinels,
        tokens,
        pos: 0,
    };

    let mut records = Vec::new();
    while cursor.peek().is_some() {
        records.push(cursor.record(with_hillslope)?);
    }
    Ok(records)
}
