//! Polars aggregations behind the ash post-processing products.
//!
//! Every function takes the combined per-hillslope daily frame with columns
//! `wepp_id year julian month day_of_month area_ha burn_class` and the
//! transport totals in tonnes, and returns a sorted frame.

use crate::error::{InterchangeError, Result};
use crate::models::{DateParts, Row, Value};

use polars::prelude::*;

pub(crate) const WIND: &str = "wind_transport";
pub(crate) const WATER: &str = "water_transport";
pub(crate) const ASH: &str = "ash_transport";
pub(crate) const ASH_PER_HA: &str = "ash_transport_per_ha";

fn transport_sums() -> [Expr; 3] {
    [col(WIND).sum(), col(WATER).sum(), col(ASH).sum()]
}

pub(crate) fn hillslope_annuals(frame: &DataFrame) -> Result<DataFrame> {
    let mut aggs = vec![col("burn_class").first(), col("area_ha").first()];
    aggs.extend(transport_sums());
    Ok(frame
        .clone()
        .lazy()
        .group_by([col("wepp_id"), col("year")])
        .agg(aggs)
        .with_column((col(ASH) / col("area_ha")).alias(ASH_PER_HA))
        .sort(["wepp_id", "year"], SortMultipleOptions::default())
        .collect()?)
}

pub(crate) fn watershed_daily(frame: &DataFrame, total_area_ha: f64) -> Result<DataFrame> {
    Ok(frame
        .clone()
        .lazy()
        .group_by([col("year"), col("julian")])
        .agg(transport_sums())
        .with_column((col(ASH) / lit(total_area_ha)).alias(ASH_PER_HA))
        .sort(["year", "julian"], SortMultipleOptions::default())
        .collect()?)
}

pub(crate) fn watershed_annuals(frame: &DataFrame, total_area_ha: f64) -> Result<DataFrame> {
    Ok(frame
        .clone()
        .lazy()
        .group_by([col("year")])
        .agg(transport_sums())
        .with_column((col(ASH) / lit(total_area_ha)).alias(ASH_PER_HA))
        .sort(["year"], SortMultipleOptions::default())
        .collect()?)
}

/// Running totals over an already sorted daily frame
pub(crate) fn watershed_cumulatives(daily: &DataFrame) -> Result<DataFrame> {
    Ok(daily
        .clone()
        .lazy()
        .select([
            col("year"),
            col("julian"),
            col(WIND).cum_sum(false),
            col(WATER).cum_sum(false),
            col(ASH).cum_sum(false),
            col(ASH_PER_HA).cum_sum(false),
        ])
        .collect()?)
}

pub(crate) fn watershed_daily_by_burn_class(frame: &DataFrame) -> Result<DataFrame> {
    let mut aggs = vec![col("area_ha").sum()];
    aggs.extend(transport_sums());
    Ok(frame
        .clone()
        .lazy()
        .group_by([col("year"), col("julian"), col("burn_class")])
        .agg(aggs)
        .with_column((col(ASH) / col("area_ha")).alias(ASH_PER_HA))
        .sort(["year", "julian", "burn_class"], SortMultipleOptions::default())
        .collect()?)
}

/// How a frame column lands in an output row
#[derive(Debug, Clone, Copy)]
pub(crate) enum Cell {
    /// The six calendar cells, derived from `year` and `julian`
    Date,
    Int(&'static str),
    Float(&'static str),
    Text(&'static str),
}

fn ints(frame: &DataFrame, name: &str) -> Result<Vec<Option<i32>>> {
    Ok(frame.column(name)?.cast(&DataType::Int32)?.i32()?.into_iter().collect())
}

fn floats(frame: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    Ok(frame.column(name)?.cast(&DataType::Float64)?.f64()?.into_iter().collect())
}

fn texts(frame: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    Ok(frame
        .column(name)?
        .str()?
        .into_iter()
        .map(|value| value.map(str::to_string))
        .collect())
}

/// Project `frame` to rows in the order given by `cells`
pub(crate) fn frame_rows(frame: &DataFrame, product: &str, cells: &[Cell]) -> Result<Vec<Row>> {
    let mut rows: Vec<Row> = vec![Vec::new(); frame.height()];
    for cell in cells {
        match *cell {
            Cell::Date => {
                let years = ints(frame, "year")?;
                let julians = ints(frame, "julian")?;
                for (row, (year, julian)) in rows.iter_mut().zip(years.into_iter().zip(julians)) {
                    let date = year
                        .zip(julian)
                        .and_then(|(y, j)| {
                            u32::try_from(j).ok().and_then(|j| DateParts::from_year_julian(y, j))
                        })
                        .ok_or_else(|| {
                            InterchangeError::schema_drift(
                                product,
                                format!(
                                    "year {:?} / julian {:?} is not a calendar day",
                                    year, julian
                                ),
                            )
                        })?;
                    row.extend(date.cells());
                }
            }
            Cell::Int(name) => {
                for (row, value) in rows.iter_mut().zip(ints(frame, name)?) {
                    row.push(value.map_or(Value::Null, Value::from));
                }
            }
            Cell::Float(name) => {
                for (row, value) in rows.iter_mut().zip(floats(frame, name)?) {
                    row.push(Value::from(value));
                }
            }
            Cell::Text(name) => {
                for (row, value) in rows.iter_mut().zip(texts(frame, name)?) {
                    row.push(value.map_or(Value::Null, Value::from));
                }
            }
        }
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> DataFrame {
        df!(
            "wepp_id" => [1i32, 1, 2, 2, 1],
            "year" => [2000i32, 2000, 2000, 2000, 2001],
            "julian" => [1i32, 2, 1, 2, 1],
            "month" => [1i32, 1, 1, 1, 1],
            "day_of_month" => [1i32, 2, 1, 2, 1],
            "area_ha" => [2.0, 2.0, 3.0, 3.0, 2.0],
            "burn_class" => ["high", "high", "low", "low", "high"],
            WIND => [1.0, 0.0, 0.5, 0.5, 2.0],
            WATER => [0.0, 1.0, 0.5, 0.5, 0.0],
            ASH => [1.0, 1.0, 1.0, 1.0, 2.0],
        )
        .unwrap()
    }

    #[test]
    fn test_hillslope_annuals() {
        let annuals = hillslope_annuals(&frame()).unwrap();
        assert_eq!(annuals.height(), 3);
        let ash = floats(&annuals, ASH).unwrap();
        assert_eq!(ash, vec![Some(2.0), Some(2.0), Some(2.0)]);
        let per_ha = floats(&annuals, ASH_PER_HA).unwrap();
        assert_eq!(per_ha[0], Some(1.0));
        let ids = ints(&annuals, "wepp_id").unwrap();
        assert_eq!(ids, vec![Some(1), Some(1), Some(2)]);
    }

    #[test]
    fn test_daily_and_cumulatives() {
        let daily = watershed_daily(&frame(), 5.0).unwrap();
        assert_eq!(daily.height(), 3);
        assert_eq!(floats(&daily, ASH).unwrap(), vec![Some(2.0), Some(2.0), Some(2.0)]);
        assert_eq!(floats(&daily, ASH_PER_HA).unwrap()[0], Some(0.4));

        let cumulative = watershed_cumulatives(&daily).unwrap();
        assert_eq!(floats(&cumulative, ASH).unwrap(), vec![Some(2.0), Some(4.0), Some(6.0)]);
    }

    #[test]
    fn test_by_burn_class_and_rows() {
        let by_class = watershed_daily_by_burn_class(&frame()).unwrap();
        assert_eq!(by_class.height(), 5);
        assert_eq!(
            texts(&by_class, "burn_class").unwrap()[..2],
            [Some("high".to_string()), Some("low".to_string())]
        );

        let rows =
            frame_rows(&by_class, "by_class", &[Cell::Date, Cell::Text("burn_class")]).unwrap();
        assert_eq!(rows[0].len(), 7);
        assert_eq!(rows[0][3], Value::Int(1));
        assert_eq!(rows[4][0], Value::Int(2001));
    }
}
