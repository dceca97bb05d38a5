//! Schema definitions and row-to-batch conversion.
//!
//! Schemas are first-class values: each product declares its schema once
//! (field order, types, per-field `units`/`description` metadata), stamps
//! it with the dataset version, and every row a parser emits is checked
//! against it while being converted to an Arrow batch.

use crate::constants::{
    INTERCHANGE_VERSION, META_DATASET_VERSION, META_DATASET_VERSION_MAJOR,
    META_DATASET_VERSION_MINOR, META_DESCRIPTION, META_UNITS,
};
use crate::error::{InterchangeError, Result};
use crate::models::{Row, Value};
use crate::versioning::Version;

use arrow::array::{ArrayRef, Float64Builder, Int32Builder, StringBuilder};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use std::collections::HashMap;
use std::sync::Arc;

/// Return `schema` with the running dataset version stamped into its metadata
pub fn schema_with_version(schema: &Schema) -> Schema {
    schema_with_version_of(schema, INTERCHANGE_VERSION)
}

/// Stamp an explicit version; only the three reserved keys are overwritten
pub fn schema_with_version_of(schema: &Schema, version: Version) -> Schema {
    let mut metadata = schema.metadata().clone();
    metadata.insert(META_DATASET_VERSION.to_string(), version.to_string());
    metadata.insert(META_DATASET_VERSION_MAJOR.to_string(), version.major.to_string());
    metadata.insert(META_DATASET_VERSION_MINOR.to_string(), version.minor.to_string());
    Schema::new_with_metadata(schema.fields().clone(), metadata)
}

/// Version embedded in a schema, if all reserved keys are present and agree
pub fn schema_version(schema: &Schema) -> Option<Version> {
    let metadata = schema.metadata();
    let version = Version::parse(metadata.get(META_DATASET_VERSION)?)?;
    let major: u32 = metadata.get(META_DATASET_VERSION_MAJOR)?.parse().ok()?;
    let minor: u32 = metadata.get(META_DATASET_VERSION_MINOR)?.parse().ok()?;
    (version == Version::new(major, minor)).then_some(version)
}

pub fn field_units(field: &Field) -> Option<&str> {
    field.metadata().get(META_UNITS).map(String::as_str)
}

pub fn field_description(field: &Field) -> Option<&str> {
    field.metadata().get(META_DESCRIPTION).map(String::as_str)
}

/// Incremental schema declaration
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    fields: Vec<Field>,
    metadata: HashMap<String, String>,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Non-null 32-bit integer key or index column
    pub fn int(self, name: &str, description: &str) -> Self {
        self.push(Field::new(name, DataType::Int32, false), None, Some(description))
    }

    /// Nullable integer measurement
    pub fn nullable_int(self, name: &str, units: Option<&str>, description: &str) -> Self {
        self.push(Field::new(name, DataType::Int32, true), units, Some(description))
    }

    /// Nullable float measurement with units
    pub fn measure(self, name: &str, units: &str, description: &str) -> Self {
        let units = (!units.is_empty()).then_some(units);
        self.push(Field::new(name, DataType::Float64, true), units, Some(description))
    }

    /// Non-null categorical text column
    pub fn text(self, name: &str, description: &str) -> Self {
        self.push(Field::new(name, DataType::Utf8, false), None, Some(description))
    }

    /// The shared calendar columns: year, month, day_of_month, julian, day, water_year
    pub fn date_columns(self) -> Self {
        self.int("year", "Calendar year")
            .int("month", "Calendar month (1-12)")
            .int("day_of_month", "Day of month (1-31)")
            .int("julian", "Day of year (1-366)")
            .int("day", "Alias of julian")
            .int("water_year", "Water year (October starts the next year)")
    }

    pub fn with_metadata(mut self, key: &str, value: &str) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }

    fn push(mut self, field: Field, units: Option<&str>, description: Option<&str>) -> Self {
        let mut metadata = HashMap::new();
        if let Some(units) = units {
            metadata.insert(META_UNITS.to_string(), units.to_string());
        }
        if let Some(description) = description {
            metadata.insert(META_DESCRIPTION.to_string(), description.to_string());
        }
        self.fields.push(field.with_metadata(metadata));
        self
    }

    /// Finish with the running version stamped in
    pub fn build(self) -> SchemaRef {
        let schema = Schema::new_with_metadata(self.fields, self.metadata);
        Arc::new(schema_with_version(&schema))
    }
}

enum ColumnBuilder {
    Int32(Int32Builder),
    Float64(Float64Builder),
    Utf8(StringBuilder),
}

impl ColumnBuilder {
    fn finish(self) -> ArrayRef {
        match self {
            ColumnBuilder::Int32(mut b) => Arc::new(b.finish()),
            ColumnBuilder::Float64(mut b) => Arc::new(b.finish()),
            ColumnBuilder::Utf8(mut b) => Arc::new(b.finish()),
        }
    }
}

/// Accumulates rows for one product and converts them into a [`RecordBatch`]
pub struct BatchBuilder {
    schema: SchemaRef,
    product: String,
    columns: Vec<ColumnBuilder>,
    rows: usize,
}

impl BatchBuilder {
    pub fn new(schema: SchemaRef, product: &str) -> Result<Self> {
        let columns = schema
            .fields()
            .iter()
            .map(|field| match field.data_type() {
                DataType::Int32 => Ok(ColumnBuilder::Int32(Int32Builder::new())),
                DataType::Float64 => Ok(ColumnBuilder::Float64(Float64Builder::new())),
                DataType::Utf8 => Ok(ColumnBuilder::Utf8(StringBuilder::new())),
                other => Err(InterchangeError::schema_drift(
                    product,
                    format!("unsupported column type {} for '{}'", other, field.name()),
                )),
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            schema,
            product: product.to_string(),
            columns,
            rows: 0,
        })
    }

    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Append one row; any mismatch with the declared schema is an error
    pub fn push(&mut self, row: Row) -> Result<()> {
        let fields = self.schema.fields();
        if row.len() != fields.len() {
            return Err(InterchangeError::schema_drift(
                &self.product,
                format!("row has {} cells, schema has {} fields", row.len(), fields.len()),
            ));
        }

        // check every cell before touching the builders so columns stay aligned
        for (field, value) in fields.iter().zip(&row) {
            let ok = match (field.data_type(), value) {
                (_, Value::Null) => field.is_nullable(),
                (DataType::Int32, Value::Int(v)) => i32::try_from(*v).is_ok(),
                (DataType::Float64, Value::Int(_) | Value::Float(_)) => true,
                (DataType::Utf8, Value::Text(_)) => true,
                _ => false,
            };
            if !ok {
                return Err(InterchangeError::schema_drift(
                    &self.product,
                    format!(
                        "value {:?} does not fit column '{}' ({})",
                        value,
                        field.name(),
                        field.data_type()
                    ),
                ));
            }
        }

        for (builder, value) in self.columns.iter_mut().zip(row) {
            match (builder, value) {
                (ColumnBuilder::Int32(b), Value::Int(v)) => b.append_value(v as i32),
                (ColumnBuilder::Int32(b), _) => b.append_null(),
                (ColumnBuilder::Float64(b), Value::Float(v)) => b.append_value(v),
                (ColumnBuilder::Float64(b), Value::Int(v)) => b.append_value(v as f64),
                (ColumnBuilder::Float64(b), _) => b.append_null(),
                (ColumnBuilder::Utf8(b), Value::Text(v)) => b.append_value(v),
                (ColumnBuilder::Utf8(b), _) => b.append_null(),
            }
        }
        self.rows += 1;
        Ok(())
    }

    pub fn extend(&mut self, rows: impl IntoIterator<Item = Row>) -> Result<()> {
        for row in rows {
            self.push(row)?;
        }
        Ok(())
    }

    pub fn finish(self) -> Result<RecordBatch> {
        let arrays: Vec<ArrayRef> = self.columns.into_iter().map(ColumnBuilder::finish).collect();
        Ok(RecordBatch::try_new(self.schema, arrays)?)
    }
}

/// Convert a full set of rows in one call
pub fn rows_to_batch(schema: &SchemaRef, product: &str, rows: Vec<Row>) -> Result<RecordBatch> {
    let mut builder = BatchBuilder::new(schema.clone(), product)?;
    builder.extend(rows)?;
    builder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Array, AsArray};
    use arrow::datatypes::{Float64Type, Int32Type};

    fn sample_schema() -> SchemaRef {
        SchemaBuilder::new()
            .int("wepp_id", "Hillslope id")
            .measure("Runoff (mm)", "mm", "Runoff depth")
            .text("event", "Record kind")
            .with_metadata("source", "test")
            .build()
    }

    #[test]
    fn test_version_stamp_preserves_caller_metadata() {
        let schema = sample_schema();
        let metadata = schema.metadata();
        assert_eq!(metadata.get("source").map(String::as_str), Some("test"));
        assert_eq!(
            metadata.get(META_DATASET_VERSION).map(String::as_str),
            Some(INTERCHANGE_VERSION.to_string().as_str())
        );
        assert_eq!(schema_version(&schema), Some(INTERCHANGE_VERSION));
    }

    #[test]
    fn test_version_stamp_is_idempotent() {
        let schema = sample_schema();
        let restamped = schema_with_version(&schema);
        assert_eq!(&restamped, schema.as_ref());

        let other = schema_with_version_of(&schema, Version::new(9, 1));
        assert_eq!(schema_version(&other), Some(Version::new(9, 1)));
        assert_eq!(other.metadata().len(), schema.metadata().len());
    }

    #[test]
    fn test_field_metadata() {
        let schema = sample_schema();
        let runoff = schema.field_with_name("Runoff (mm)").unwrap();
        assert_eq!(field_units(runoff), Some("mm"));
        assert_eq!(field_description(runoff), Some("Runoff depth"));
        assert_eq!(field_units(schema.field(0)), None);
    }

    #[test]
    fn test_batch_builder_converts_rows() {
        let schema = sample_schema();
        let rows = vec![
            vec![Value::Int(1), Value::Float(1.5), Value::from("EVENT")],
            vec![Value::Int(2), Value::Null, Value::from("NO EVENT")],
            vec![Value::Int(3), Value::Int(4), Value::from("SUBEVENT")],
        ];
        let batch = rows_to_batch(&schema, "test", rows).unwrap();

        assert_eq!(batch.num_rows(), 3);
        let ids = batch.column(0).as_primitive::<Int32Type>();
        assert_eq!(ids.value(2), 3);
        let runoff = batch.column(1).as_primitive::<Float64Type>();
        assert!(runoff.is_null(1));
        assert_eq!(runoff.value(2), 4.0);
        assert_eq!(batch.column(2).as_string::<i32>().value(1), "NO EVENT");
    }

    #[test]
    fn test_schema_drift_is_rejected() {
        let schema = sample_schema();

        let short = rows_to_batch(&schema, "test", vec![vec![Value::Int(1)]]);
        assert!(matches!(short, Err(InterchangeError::SchemaDrift { .. })));

        let null_key = rows_to_batch(
            &schema,
            "test",
            vec![vec![Value::Null, Value::Float(0.0), Value::from("EVENT")]],
        );
        assert!(matches!(null_key, Err(InterchangeError::SchemaDrift { .. })));

        let float_key = rows_to_batch(
            &schema,
            "test",
            vec![vec![Value::Float(1.0), Value::Float(0.0), Value::from("EVENT")]],
        );
        assert!(matches!(float_key, Err(InterchangeError::SchemaDrift { .. })));
    }

    #[test]
    fn test_empty_batch_keeps_schema() {
        let schema = sample_schema();
        let batch = rows_to_batch(&schema, "test", Vec::new()).unwrap();
        assert_eq!(batch.num_rows(), 0);
        assert_eq!(batch.schema(), schema);
    }
}
