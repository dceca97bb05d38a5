//! Per-hillslope parsers, one per `H<id>.<kind>.dat` file kind.

pub mod ebe;
pub mod element;
pub mod loss;
pub mod pass;
pub mod soil;
pub mod wat;

use crate::config::SentinelSet;
use crate::constants::{
    H_EBE_PARQUET, H_ELEMENT_PARQUET, H_LOSS_PARQUET, H_PASS_PARQUET, H_SOIL_PARQUET,
    H_WAT_PARQUET,
};
use crate::error::Result;
use crate::models::{DateParts, Row};

use arrow::datatypes::SchemaRef;
use std::path::Path;

/// `(path, sentinels, start_year)`; raw years below `start_year` are simulation years
pub type HillslopeParseFn = fn(&Path, &SentinelSet, Option<i32>) -> Result<Vec<Row>>;

/// A hillslope file kind and the artifact it feeds
#[derive(Clone, Copy)]
pub struct HillslopeProduct {
    pub kind: &'static str,
    pub artifact: &'static str,
    pub schema: fn() -> SchemaRef,
    pub parse: HillslopeParseFn,
}

/// Hillslope products in run order
pub const HILLSLOPE_PRODUCTS: [HillslopeProduct; 6] = [
    HillslopeProduct {
        kind: "element",
        artifact: H_ELEMENT_PARQUET,
        schema: element::schema,
        parse: element::parse_file,
    },
    HillslopeProduct {
        kind: "wat",
        artifact: H_WAT_PARQUET,
        schema: wat::schema,
        parse: wat::parse_file,
    },
    HillslopeProduct {
        kind: "pass",
        artifact: H_PASS_PARQUET,
        schema: pass::schema,
        parse: pass::parse_file,
    },
    HillslopeProduct {
        kind: "loss",
        artifact: H_LOSS_PARQUET,
        schema: loss::schema,
        parse: |path, sentinels, _| loss::parse_file(path, sentinels),
    },
    HillslopeProduct {
        kind: "soil",
        artifact: H_SOIL_PARQUET,
        schema: soil::schema,
        parse: soil::parse_file,
    },
    HillslopeProduct {
        kind: "ebe",
        artifact: H_EBE_PARQUET,
        schema: ebe::schema,
        parse: ebe::parse_file,
    },
];

pub fn hillslope_product(kind: &str) -> Option<HillslopeProduct> {
    HILLSLOPE_PRODUCTS.iter().copied().find(|p| p.kind == kind)
}

/// Order daily OFE rows by (year, julian, ofe_id), keeping file order for ties
pub(crate) fn sort_daily(mut keyed: Vec<(DateParts, i32, Row)>) -> Vec<Row> {
    keyed.sort_by_key(|(date, ofe, _)| (date.year, date.julian, *ofe));
    keyed.into_iter().map(|(_, _, row)| row).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::HILLSLOPE_KINDS;
    use crate::schema::schema_version;

    #[test]
    fn test_products_cover_every_kind() {
        let kinds: Vec<&str> = HILLSLOPE_PRODUCTS.iter().map(|p| p.kind).collect();
        assert_eq!(kinds, HILLSLOPE_KINDS);
        assert!(hillslope_product("loss").is_some());
        assert!(hillslope_product("pw0").is_none());
    }

    #[test]
    fn test_every_schema_leads_with_wepp_id_and_is_versioned() {
        for product in HILLSLOPE_PRODUCTS {
            let schema = (product.schema)();
            assert_eq!(schema.field(0).name(), "wepp_id", "{}", product.kind);
            assert!(schema_version(&schema).is_some(), "{}", product.kind);
        }
    }

    #[test]
    fn test_sort_daily_is_stable() {
        let d1 = DateParts::from_year_julian(2000, 1).unwrap();
        let d2 = DateParts::from_year_julian(2000, 2).unwrap();
        let rows = sort_daily(vec![
            (d2, 1, vec![crate::models::Value::Int(3)]),
            (d1, 2, vec![crate::models::Value::Int(2)]),
            (d1, 1, vec![crate::models::Value::Int(0)]),
            (d1, 1, vec![crate::models::Value::Int(1)]),
        ]);
        let order: Vec<_> = rows.into_iter().map(|r| r[0].clone()).collect();
        assert_eq!(order, (0..4).map(crate::models::Value::Int).collect::<Vec<_>>());
    }
}
