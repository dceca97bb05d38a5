//! Output schemas of the ash transport post-processing products.

use crate::schema::SchemaBuilder;

use arrow::datatypes::SchemaRef;
use std::sync::LazyLock;

pub const HILLSLOPE_ANNUALS_PARQUET: &str = "hillslope_annuals.parquet";
pub const WATERSHED_DAILY_PARQUET: &str = "watershed_daily.parquet";
pub const WATERSHED_ANNUALS_PARQUET: &str = "watershed_annuals.parquet";
pub const WATERSHED_CUMULATIVES_PARQUET: &str = "watershed_cumulatives.parquet";
pub const WATERSHED_DAILY_BY_BURN_CLASS_PARQUET: &str = "watershed_daily_by_burn_class.parquet";

/// Post-processing products in README order
pub const ASH_POST_PRODUCTS: &[(&str, &str)] = &[
    (HILLSLOPE_ANNUALS_PARQUET, "Annual ash, wind and water transport per hillslope."),
    (WATERSHED_DAILY_PARQUET, "Daily transport summed over every hillslope."),
    (WATERSHED_ANNUALS_PARQUET, "Annual transport summed over every hillslope."),
    (WATERSHED_CUMULATIVES_PARQUET, "Running totals of daily watershed transport."),
    (WATERSHED_DAILY_BY_BURN_CLASS_PARQUET, "Daily transport summed per burn severity class."),
];

fn transport_totals(builder: SchemaBuilder, prefix: &str, what: &str) -> SchemaBuilder {
    builder
        .measure(
            &format!("{}wind_transport (tonne)", prefix),
            "tonne",
            &format!("{} ash moved by wind", what),
        )
        .measure(
            &format!("{}water_transport (tonne)", prefix),
            "tonne",
            &format!("{} ash moved by water", what),
        )
        .measure(
            &format!("{}ash_transport (tonne)", prefix),
            "tonne",
            &format!("{} ash moved by wind and water", what),
        )
        .measure(
            &format!("{}ash_transport (tonne/ha)", prefix),
            "tonne/ha",
            &format!("{} ash transport per hectare of contributing area", what),
        )
}

static HILLSLOPE_ANNUALS: LazyLock<SchemaRef> = LazyLock::new(|| {
    transport_totals(
        SchemaBuilder::new()
            .int("wepp_id", "Hillslope id")
            .int("year", "Calendar year")
            .text("burn_class", "Burn severity class of the hillslope")
            .measure("area_ha", "ha", "Hillslope area"),
        "",
        "Annual",
    )
    .build()
});

static WATERSHED_DAILY: LazyLock<SchemaRef> =
    LazyLock::new(|| transport_totals(SchemaBuilder::new().date_columns(), "", "Daily").build());

static WATERSHED_ANNUALS: LazyLock<SchemaRef> = LazyLock::new(|| {
    transport_totals(SchemaBuilder::new().int("year", "Calendar year"), "", "Annual").build()
});

static WATERSHED_CUMULATIVES: LazyLock<SchemaRef> = LazyLock::new(|| {
    transport_totals(SchemaBuilder::new().date_columns(), "cumulative_", "Cumulative").build()
});

static WATERSHED_DAILY_BY_BURN_CLASS: LazyLock<SchemaRef> = LazyLock::new(|| {
    transport_totals(
        SchemaBuilder::new()
            .date_columns()
            .text("burn_class", "Burn severity class")
            .measure("area_ha", "ha", "Area of the hillslopes in the class"),
        "",
        "Daily",
    )
    .build()
});

pub fn hillslope_annuals_schema() -> SchemaRef {
    HILLSLOPE_ANNUALS.clone()
}

pub fn watershed_daily_schema() -> SchemaRef {
    WATERSHED_DAILY.clone()
}

pub fn watershed_annuals_schema() -> SchemaRef {
    WATERSHED_ANNUALS.clone()
}

pub fn watershed_cumulatives_schema() -> SchemaRef {
    WATERSHED_CUMULATIVES.clone()
}

pub fn watershed_daily_by_burn_class_schema() -> SchemaRef {
    WATERSHED_DAILY_BY_BURN_CLASS.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::field_units;

    #[test]
    fn test_transport_units() {
        let schema = watershed_cumulatives_schema();
        let field = schema.field_with_name("cumulative_ash_transport (tonne/ha)").unwrap();
        assert_eq!(field_units(field), Some("tonne/ha"));
        assert_eq!(hillslope_annuals_schema().fields().len(), 8);
        assert_eq!(watershed_daily_schema().fields().len(), 10);
    }
}
