//! Ash transport post-processing.
//!
//! Consumes per-hillslope `H<id>_ash.parquet` daily transport rates
//! (tonne/ha) together with a hillslope attribute table (area, burn class)
//! and writes five summary artifacts into `<ash_dir>/post/`, each with
//! declared schemas, units metadata and a README built with the shared
//! renderer. An optional inclusive date range restricts the daily input.

mod aggregate;
pub mod schemas;

use self::aggregate::{ASH, ASH_PER_HA, Cell, WATER, WIND, frame_rows};
use self::schemas::*;

use crate::config::InterchangeConfig;
use crate::constants::INTERCHANGE_VERSION;
use crate::date_filter::{DateBound, DateColumns, filter_by_date_range};
use crate::docs::write_readme_for;
use crate::error::{InterchangeError, Result};
use crate::models::{ArtifactStats, DateParts, RunSummary};
use crate::pipeline::write_rows;
use crate::versioning::write_version_manifest;

use arrow::datatypes::SchemaRef;
use polars::prelude::*;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

pub const ASH_POST_DIR_NAME: &str = "post";

/// Input rate columns of `H<id>_ash.parquet`
pub const WIND_RATE_COLUMN: &str = "wind_transport (tonne/ha)";
pub const WATER_RATE_COLUMN: &str = "water_transport (tonne/ha)";
pub const ASH_RATE_COLUMN: &str = "ash_transport (tonne/ha)";

/// Area and burn severity of one hillslope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HillslopeAttributes {
    pub wepp_id: u32,
    pub area_ha: f64,
    pub burn_class: String,
}

/// Read a JSON array of [`HillslopeAttributes`]
pub fn load_hillslope_attributes(path: &Path) -> Result<Vec<HillslopeAttributes>> {
    let bytes = std::fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// `H<id>_ash.parquet` files in `ash_dir`, sorted by id
pub fn discover_ash_files(ash_dir: &Path) -> Result<Vec<(u32, PathBuf)>> {
    let pattern = Regex::new(r"^H(\d+)_ash\.parquet$").map_err(|e| InterchangeError::Configuration {
        message: e.to_string(),
    })?;

    let mut files = Vec::new();
    if !ash_dir.is_dir() {
        return Ok(files);
    }
    for entry in std::fs::read_dir(ash_dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(captures) = name.to_str().and_then(|n| pattern.captures(n)) else {
            continue;
        };
        if let Ok(wepp_id) = captures[1].parse::<u32>() {
            files.push((wepp_id, entry.path()));
        }
    }
    files.sort_by_key(|(id, _)| *id);
    Ok(files)
}

/// Ash post-processing over one ash output directory
#[derive(Debug, Clone)]
pub struct AshPost {
    ash_dir: PathBuf,
    attributes: HashMap<u32, HillslopeAttributes>,
    start: Option<DateBound>,
    end: Option<DateBound>,
    config: InterchangeConfig,
}

impl AshPost {
    pub fn new(ash_dir: impl Into<PathBuf>, attributes: Vec<HillslopeAttributes>) -> Self {
        Self {
            ash_dir: ash_dir.into(),
            attributes: attributes.into_iter().map(|a| (a.wepp_id, a)).collect(),
            start: None,
            end: None,
            config: InterchangeConfig::default(),
        }
    }

    /// Keep only days within `start..=end`; either end may be open
    pub fn with_date_range(mut self, start: Option<DateBound>, end: Option<DateBound>) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    pub fn with_config(mut self, config: InterchangeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn post_dir(&self) -> PathBuf {
        self.ash_dir.join(ASH_POST_DIR_NAME)
    }

    /// Daily per-hillslope transport in tonnes for one input file
    fn load_hillslope(&self, path: &Path, attributes: &HillslopeAttributes) -> Result<DataFrame> {
        let mut df = ParquetReader::new(File::open(path)?).finish()?;

        let years: Vec<Option<i32>> = df
            .column("year")?
            .cast(&DataType::Int32)?
            .i32()?
            .into_iter()
            .collect();
        let julians: Vec<Option<i32>> = df
            .column("julian")?
            .cast(&DataType::Int32)?
            .i32()?
            .into_iter()
            .collect();
        let mut months = Vec::with_capacity(years.len());
        let mut days = Vec::with_capacity(years.len());
        for (idx, (year, julian)) in years.into_iter().zip(julians).enumerate() {
            let date = year
                .zip(julian)
                .and_then(|(y, j)| {
                    u32::try_from(j).ok().and_then(|j| DateParts::from_year_julian(y, j))
                })
                .ok_or_else(|| {
                    InterchangeError::malformed(path, idx + 1, "row has no valid year / julian")
                })?;
            months.push(date.month as i32);
            days.push(date.day_of_month as i32);
        }
        df.with_column(Series::new("month".into(), months))?;
        df.with_column(Series::new("day_of_month".into(), days))?;

        let area = attributes.area_ha;
        Ok(df
            .lazy()
            .select([
                lit(attributes.wepp_id as i32).alias("wepp_id"),
                col("year").cast(DataType::Int32),
                col("julian").cast(DataType::Int32),
                col("month"),
                col("day_of_month"),
                lit(area).alias("area_ha"),
                lit(attributes.burn_class.clone()).alias("burn_class"),
                (col(WIND_RATE_COLUMN).cast(DataType::Float64) * lit(area)).alias(WIND),
                (col(WATER_RATE_COLUMN).cast(DataType::Float64) * lit(area)).alias(WATER),
                (col(ASH_RATE_COLUMN).cast(DataType::Float64) * lit(area)).alias(ASH),
            ])
            .collect()?)
    }

    /// Combined daily frame of every hillslope with attributes, date-filtered
    fn load_daily(&self) -> Result<(Option<DataFrame>, usize)> {
        let files = discover_ash_files(&self.ash_dir)?;
        let mut frames = Vec::with_capacity(files.len());
        for (wepp_id, path) in &files {
            let Some(attributes) = self.attributes.get(wepp_id) else {
                warn!("Skipping {}: no attributes for hillslope {}", path.display(), wepp_id);
                continue;
            };
            frames.push(self.load_hillslope(path, attributes)?.lazy());
        }
        let files_processed = frames.len();
        debug!("Loaded {} of {} ash files", files_processed, files.len());

        if frames.is_empty() {
            return Ok((None, 0));
        }
        let combined = concat(frames, UnionArgs::default())?.collect()?;
        let filtered =
            filter_by_date_range(&combined, self.start, self.end, &DateColumns::default())?
                .into_owned();
        Ok((Some(filtered), files_processed))
    }

    fn contributing_area(&self, daily: &DataFrame) -> Result<f64> {
        let ids: Vec<i32> = daily
            .column("wepp_id")?
            .i32()?
            .unique()?
            .into_iter()
            .flatten()
            .collect();
        Ok(ids
            .into_iter()
            .filter_map(|id| u32::try_from(id).ok())
            .filter_map(|id| self.attributes.get(&id))
            .map(|a| a.area_ha)
            .sum())
    }

    /// Write the five summaries, the manifest and the README
    pub fn run(&self) -> Result<RunSummary> {
        let start = Instant::now();
        let post_dir = self.post_dir();
        std::fs::create_dir_all(&post_dir)?;

        let (daily, files_processed) = self.load_daily()?;
        let totals = [
            Cell::Float(WIND),
            Cell::Float(WATER),
            Cell::Float(ASH),
            Cell::Float(ASH_PER_HA),
        ];

        let outputs: Vec<(&str, SchemaRef, Vec<_>)> = match daily.filter(|df| df.height() > 0) {
            None => {
                info!("No ash transport rows in {}", self.ash_dir.display());
                [
                    (HILLSLOPE_ANNUALS_PARQUET, hillslope_annuals_schema()),
                    (WATERSHED_DAILY_PARQUET, watershed_daily_schema()),
                    (WATERSHED_ANNUALS_PARQUET, watershed_annuals_schema()),
                    (WATERSHED_CUMULATIVES_PARQUET, watershed_cumulatives_schema()),
                    (WATERSHED_DAILY_BY_BURN_CLASS_PARQUET, watershed_daily_by_burn_class_schema()),
                ]
                .into_iter()
                .map(|(name, schema)| (name, schema, Vec::new()))
                .collect()
            }
            Some(frame) => {
                let area = self.contributing_area(&frame)?;
                let daily = aggregate::watershed_daily(&frame, area)?;

                let mut hill_cells = vec![
                    Cell::Int("wepp_id"),
                    Cell::Int("year"),
                    Cell::Text("burn_class"),
                    Cell::Float("area_ha"),
                ];
                hill_cells.extend(totals);
                let mut year_cells = vec![Cell::Int("year")];
                year_cells.extend(totals);
                let mut date_cells = vec![Cell::Date];
                date_cells.extend(totals);
                let mut class_cells =
                    vec![Cell::Date, Cell::Text("burn_class"), Cell::Float("area_ha")];
                class_cells.extend(totals);

                vec![
                    (
                        HILLSLOPE_ANNUALS_PARQUET,
                        hillslope_annuals_schema(),
                        frame_rows(
                            &aggregate::hillslope_annuals(&frame)?,
                            HILLSLOPE_ANNUALS_PARQUET,
                            &hill_cells,
                        )?,
                    ),
                    (
                        WATERSHED_DAILY_PARQUET,
                        watershed_daily_schema(),
                        frame_rows(&daily, WATERSHED_DAILY_PARQUET, &date_cells)?,
                    ),
                    (
                        WATERSHED_ANNUALS_PARQUET,
                        watershed_annuals_schema(),
                        frame_rows(
                            &aggregate::watershed_annuals(&frame, area)?,
                            WATERSHED_ANNUALS_PARQUET,
                            &year_cells,
                        )?,
                    ),
                    (
                        WATERSHED_CUMULATIVES_PARQUET,
                        watershed_cumulatives_schema(),
                        frame_rows(
                            &aggregate::watershed_cumulatives(&daily)?,
                            WATERSHED_CUMULATIVES_PARQUET,
                            &date_cells,
                        )?,
                    ),
                    (
                        WATERSHED_DAILY_BY_BURN_CLASS_PARQUET,
                        watershed_daily_by_burn_class_schema(),
                        frame_rows(
                            &aggregate::watershed_daily_by_burn_class(&frame)?,
                            WATERSHED_DAILY_BY_BURN_CLASS_PARQUET,
                            &class_cells,
                        )?,
                    ),
                ]
            }
        };

        let mut summary = RunSummary {
            interchange_dir: post_dir.clone(),
            ..RunSummary::default()
        };
        for (name, schema, rows) in outputs {
            let stats: ArtifactStats = write_rows(
                &post_dir.join(name),
                &schema,
                rows,
                files_processed,
                &self.config,
            )?;
            summary.artifacts.push(stats);
        }

        write_version_manifest(&post_dir, INTERCHANGE_VERSION)?;
        if self.config.write_docs {
            write_readme_for(&post_dir, "WEPP Ash Transport Summaries", ASH_POST_PRODUCTS)?;
        }
        summary.processing_time_ms = start.elapsed().as_millis();
        info!(
            "Ash post-processing wrote {} artifacts ({} rows) to {}",
            summary.artifacts.len(),
            summary.total_rows(),
            post_dir.display()
        );
        Ok(summary)
    }
}
