//! Archival writer for trajectory datasets
//!
//! The converter talks to storage through [`DatasetWriter`]: one call writes
//! dimensions, variables and values, and a later call amends attributes once
//! statistics over the written data are known. [`ParquetTrajectoryWriter`]
//! implements it on Arrow/Parquet. The `obs` dimension is the row count,
//! variable attributes live in Arrow field metadata and global attributes in
//! the schema metadata.

use crate::constants::{
    CONVENTIONS, FEATURE_TYPE, FRESHNESS_VARIABLE, OBS_DIMENSION, TIME_VARIABLE,
    TRAJECTORY_VARIABLE,
};
use crate::error::{Result, TagError};
use crate::models::GlobalAttribute;
use crate::trajectory::{TrajectoryDataset, VariableAttributes, VariableValues};

use arrow::array::{Array, ArrayRef, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Values of one variable read back from a written file
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValues {
    Int(Vec<Option<i64>>),
    Float(Vec<Option<f64>>),
    Text(Vec<Option<String>>),
}

impl ColumnValues {
    pub fn len(&self) -> usize {
        match self {
            ColumnValues::Int(values) => values.len(),
            ColumnValues::Float(values) => values.len(),
            ColumnValues::Text(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Attribute changes applied in the second write pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeAmendment {
    /// Per-variable attributes merged over the existing ones
    pub variables: BTreeMap<String, VariableAttributes>,
    /// Global attributes merged over the existing ones
    pub global: BTreeMap<String, String>,
}

impl AttributeAmendment {
    pub fn set_variable(&mut self, variable: &str, name: &str, value: impl Into<String>) {
        self.variables
            .entry(variable.to_string())
            .or_default()
            .insert(name.to_string(), value.into());
    }

    pub fn set_global(&mut self, name: &str, value: impl Into<String>) {
        self.global.insert(name.to_string(), value.into());
    }

    pub fn variable(&self, variable: &str, name: &str) -> Option<&str> {
        self.variables
            .get(variable)
            .and_then(|attributes| attributes.get(name))
            .map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty() && self.global.is_empty()
    }
}

/// What the first write pass produced
#[derive(Debug, Clone, PartialEq)]
pub struct WriteReport {
    pub output_path: PathBuf,
    pub rows_written: usize,
    pub variables_written: usize,
    pub bytes_written: u64,
}

/// Storage backend for trajectory datasets
pub trait DatasetWriter {
    /// First pass: create dimensions and variables, write every value array
    fn write(&mut self, dataset: &TrajectoryDataset) -> Result<WriteReport>;

    /// Reopen the written file read-only and return one variable
    fn read_variable(&self, name: &str) -> Result<ColumnValues>;

    /// Second pass: attach attributes without touching any values
    fn amend_attributes(&mut self, amendment: &AttributeAmendment) -> Result<()>;

    fn output_path(&self) -> &Path;
}

/// Parquet writer settings
#[derive(Debug, Clone)]
pub struct WriterOptions {
    pub compression: Compression,
    pub row_group_size: usize,
    /// Hierarchical attribute groups are available (`group/name` keys)
    pub grouped: bool,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            compression: Compression::SNAPPY,
            row_group_size: 100_000,
            grouped: true,
        }
    }
}

impl WriterOptions {
    pub fn with_grouped(mut self, grouped: bool) -> Self {
        self.grouped = grouped;
        self
    }

    fn properties(&self) -> WriterProperties {
        WriterProperties::builder()
            .set_compression(self.compression)
            .set_max_row_group_size(self.row_group_size)
            .build()
    }
}

/// [`DatasetWriter`] backed by a single Parquet file
#[derive(Debug)]
pub struct ParquetTrajectoryWriter {
    output_path: PathBuf,
    options: WriterOptions,
}

impl ParquetTrajectoryWriter {
    pub fn new(output_path: &Path, options: WriterOptions) -> Self {
        Self {
            output_path: output_path.to_path_buf(),
            options,
        }
    }

    /// Arrow schema for a dataset, attributes attached as metadata
    pub fn build_schema(&self, dataset: &TrajectoryDataset) -> SchemaRef {
        let mut fields = Vec::with_capacity(dataset.variables.len() + 3);

        fields.push(
            Field::new(TIME_VARIABLE, DataType::Int64, false)
                .with_metadata(field_metadata(&dataset.time_attributes)),
        );
        for variable in dataset.variables.iter().filter(|v| v.coordinate.is_some()) {
            fields.push(value_field(&variable.name, &variable.values, &variable.attributes));
        }
        fields.push(
            Field::new(TRAJECTORY_VARIABLE, DataType::Utf8, false)
                .with_metadata(field_metadata(&dataset.trajectory_attributes)),
        );
        for variable in dataset.variables.iter().filter(|v| v.coordinate.is_none()) {
            fields.push(value_field(&variable.name, &variable.values, &variable.attributes));
        }
        if dataset.freshness.is_some() {
            fields.push(
                Field::new(FRESHNESS_VARIABLE, DataType::Int64, true)
                    .with_metadata(field_metadata(&dataset.freshness_attributes)),
            );
        }

        let metadata = global_metadata(&dataset.global_attributes, self.options.grouped);
        Arc::new(Schema::new_with_metadata(fields, metadata))
    }

    fn build_batch(&self, schema: SchemaRef, dataset: &TrajectoryDataset) -> Result<RecordBatch> {
        let n = dataset.len();
        let mut columns: Vec<ArrayRef> = Vec::with_capacity(schema.fields().len());

        columns.push(Arc::new(Int64Array::from(dataset.time.clone())));
        for variable in dataset.variables.iter().filter(|v| v.coordinate.is_some()) {
            columns.push(value_array(&variable.values));
        }
        columns.push(Arc::new(StringArray::from(vec![
            dataset.trajectory_id.as_str();
            n
        ])));
        for variable in dataset.variables.iter().filter(|v| v.coordinate.is_none()) {
            columns.push(value_array(&variable.values));
        }
        if let Some(freshness) = &dataset.freshness {
            columns.push(Arc::new(Int64Array::from(freshness.clone())));
        }

        Ok(RecordBatch::try_new(schema, columns)?)
    }

    fn read_all(&self) -> Result<(SchemaRef, Vec<RecordBatch>)> {
        let file = File::open(&self.output_path)?;
        let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
        let schema = builder.schema().clone();
        let batches = builder
            .build()?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok((schema, batches))
    }

    fn write_batches(&self, path: &Path, schema: SchemaRef, batches: &[RecordBatch]) -> Result<u64> {
        let file = File::create(path)?;
        let mut writer = ArrowWriter::try_new(file, schema, Some(self.options.properties()))?;
        for batch in batches {
            writer.write(batch)?;
        }
        writer.close()?;
        Ok(std::fs::metadata(path)?.len())
    }
}

impl DatasetWriter for ParquetTrajectoryWriter {
    fn write(&mut self, dataset: &TrajectoryDataset) -> Result<WriteReport> {
        info!(
            "Writing {} samples x {} variables to {}",
            dataset.len(),
            dataset.variables.len() + 2,
            self.output_path.display()
        );
        if !dataset.is_aligned() {
            return Err(TagError::writer(
                &self.output_path,
                "variable arrays do not match the time axis length",
            ));
        }

        if let Some(parent) = self.output_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let schema = self.build_schema(dataset);
        let batch = self.build_batch(schema.clone(), dataset)?;
        debug!(
            "Dimension '{}' = {}, {} columns",
            OBS_DIMENSION,
            batch.num_rows(),
            batch.num_columns()
        );

        let bytes_written = self
            .write_batches(&self.output_path, schema.clone(), &[batch])
            .map_err(|e| TagError::writer(&self.output_path, e))?;

        Ok(WriteReport {
            output_path: self.output_path.clone(),
            rows_written: dataset.len(),
            variables_written: schema.fields().len(),
            bytes_written,
        })
    }

    fn read_variable(&self, name: &str) -> Result<ColumnValues> {
        let (_, batches) = self
            .read_all()
            .map_err(|e| TagError::writer(&self.output_path, e))?;

        let mut values: Option<ColumnValues> = None;
        for batch in &batches {
            let column = batch.column_by_name(name).ok_or_else(|| {
                TagError::writer(&self.output_path, format!("no variable named '{}'", name))
            })?;
            let chunk = column_values(column.as_ref()).ok_or_else(|| {
                TagError::writer(
                    &self.output_path,
                    format!("variable '{}' has unsupported type {}", name, column.data_type()),
                )
            })?;
            values = Some(match (values, chunk) {
                (None, chunk) => chunk,
                (Some(ColumnValues::Int(mut a)), ColumnValues::Int(b)) => {
                    a.extend(b);
                    ColumnValues::Int(a)
                }
                (Some(ColumnValues::Float(mut a)), ColumnValues::Float(b)) => {
                    a.extend(b);
                    ColumnValues::Float(a)
                }
                (Some(ColumnValues::Text(mut a)), ColumnValues::Text(b)) => {
                    a.extend(b);
                    ColumnValues::Text(a)
                }
                _ => {
                    return Err(TagError::writer(
                        &self.output_path,
                        format!("variable '{}' changes type between batches", name),
                    ));
                }
            });
        }

        values.ok_or_else(|| {
            TagError::writer(&self.output_path, format!("variable '{}' has no data", name))
        })
    }

    fn amend_attributes(&mut self, amendment: &AttributeAmendment) -> Result<()> {
        if !self.output_path.exists() {
            return Err(TagError::writer(
                &self.output_path,
                "attributes amended before the dataset was written",
            ));
        }
        if amendment.is_empty() {
            return Ok(());
        }

        let (schema, batches) = self
            .read_all()
            .map_err(|e| TagError::writer(&self.output_path, e))?;

        let fields: Vec<Field> = schema
            .fields()
            .iter()
            .map(|field| match amendment.variables.get(field.name()) {
                Some(extra) => {
                    let mut metadata = field.metadata().clone();
                    metadata.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
                    field.as_ref().clone().with_metadata(metadata)
                }
                None => field.as_ref().clone(),
            })
            .collect();

        for variable in amendment.variables.keys() {
            if schema.field_with_name(variable).is_err() {
                warn!("Amendment names unknown variable '{}'", variable);
            }
        }

        let mut metadata = schema.metadata().clone();
        metadata.extend(amendment.global.iter().map(|(k, v)| (k.clone(), v.clone())));
        let amended: SchemaRef = Arc::new(Schema::new_with_metadata(fields, metadata));

        let batches = batches
            .into_iter()
            .map(|batch| RecordBatch::try_new(amended.clone(), batch.columns().to_vec()))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let temp_path = self.output_path.with_extension("amend.tmp");
        self.write_batches(&temp_path, amended, &batches)
            .map_err(|e| TagError::writer(&temp_path, e))?;
        std::fs::rename(&temp_path, &self.output_path)
            .map_err(|e| TagError::writer(&self.output_path, e))?;

        info!(
            "Amended attributes of {} variables in {}",
            amendment.variables.len(),
            self.output_path.display()
        );
        Ok(())
    }

    fn output_path(&self) -> &Path {
        &self.output_path
    }
}

fn field_metadata(attributes: &VariableAttributes) -> HashMap<String, String> {
    attributes
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

fn value_field(name: &str, values: &VariableValues, attributes: &VariableAttributes) -> Field {
    let data_type = match values {
        VariableValues::Float(_) => DataType::Float64,
        VariableValues::Text(_) => DataType::Utf8,
    };
    Field::new(name, data_type, true).with_metadata(field_metadata(attributes))
}

fn value_array(values: &VariableValues) -> ArrayRef {
    match values {
        VariableValues::Float(values) => Arc::new(Float64Array::from(values.clone())),
        VariableValues::Text(values) => Arc::new(StringArray::from(values.clone())),
    }
}

fn column_values(column: &dyn Array) -> Option<ColumnValues> {
    let any = column.as_any();
    if let Some(array) = any.downcast_ref::<Int64Array>() {
        Some(ColumnValues::Int(array.iter().collect()))
    } else if let Some(array) = any.downcast_ref::<Float64Array>() {
        Some(ColumnValues::Float(array.iter().collect()))
    } else {
        any.downcast_ref::<StringArray>().map(|array| {
            ColumnValues::Text(array.iter().map(|v| v.map(str::to_string)).collect())
        })
    }
}

/// Schema metadata for global attributes
///
/// Grouped output keys non-root attributes as `group/name`; flat output uses
/// the bare name and later duplicates overwrite earlier ones.
pub fn global_metadata(attributes: &[GlobalAttribute], grouped: bool) -> HashMap<String, String> {
    let mut metadata = HashMap::new();
    metadata.insert("featureType".to_string(), FEATURE_TYPE.to_string());
    metadata.insert("Conventions".to_string(), CONVENTIONS.to_string());

    for attribute in attributes {
        let key = attribute.storage_key(grouped);
        if let Some(previous) = metadata.insert(key.clone(), attribute.value.clone()) {
            if previous != attribute.value {
                warn!(
                    "Global attribute '{}' overwritten: '{}' -> '{}'",
                    key, previous, attribute.value
                );
            }
        }
    }

    metadata
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MatchupMode;
    use crate::matchup::MatchupStats;
    use crate::store::CoordinateKind;
    use crate::trajectory::DataVariable;
    use tempfile::TempDir;

    fn dataset() -> TrajectoryDataset {
        let mut temperature_attributes = VariableAttributes::new();
        temperature_attributes.insert("units".to_string(), "Celsius".to_string());

        TrajectoryDataset {
            trajectory_id: "05A0001".to_string(),
            mode: MatchupMode::OneLocationOneObservation,
            time: vec![0, 60, 120],
            time_attributes: VariableAttributes::new(),
            trajectory_attributes: VariableAttributes::new(),
            variables: vec![
                DataVariable {
                    name: "latitude".to_string(),
                    coordinate: Some(CoordinateKind::Latitude),
                    values: VariableValues::Float(vec![Some(36.5), Some(36.6), None]),
                    attributes: VariableAttributes::new(),
                },
                DataVariable {
                    name: "temperature".to_string(),
                    coordinate: None,
                    values: VariableValues::Float(vec![Some(15.1), Some(15.2), Some(15.3)]),
                    attributes: temperature_attributes,
                },
                DataVariable {
                    name: "status".to_string(),
                    coordinate: None,
                    values: VariableValues::Text(vec![Some("ok".to_string()), None, None]),
                    attributes: VariableAttributes::new(),
                },
            ],
            freshness: None,
            freshness_attributes: VariableAttributes::new(),
            global_attributes: vec![
                GlobalAttribute::new("serial_number", "05A0001"),
                GlobalAttribute::new("ptt", "57441").with_group("tag"),
            ],
            dropped_variables: Vec::new(),
            matchup: MatchupStats::default(),
        }
    }

    #[test]
    fn test_write_and_read_back() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("out").join("tag.parquet");
        let mut writer = ParquetTrajectoryWriter::new(&path, WriterOptions::default());

        let report = writer.write(&dataset()).unwrap();
        assert_eq!(report.rows_written, 3);
        assert_eq!(report.variables_written, 5);
        assert!(path.exists());

        assert_eq!(
            writer.read_variable("time").unwrap(),
            ColumnValues::Int(vec![Some(0), Some(60), Some(120)])
        );
        assert_eq!(
            writer.read_variable("latitude").unwrap(),
            ColumnValues::Float(vec![Some(36.5), Some(36.6), None])
        );
        assert_eq!(
            writer.read_variable("trajectory").unwrap(),
            ColumnValues::Text(vec![Some("05A0001".to_string()); 3])
        );
        assert!(writer.read_variable("salinity").is_err());
    }

    #[test]
    fn test_schema_layout_and_metadata() {
        let writer = ParquetTrajectoryWriter::new(Path::new("unused.parquet"), WriterOptions::default());
        let schema = writer.build_schema(&dataset());

        let names: Vec<&str> = schema.fields().iter().map(|f| f.name().as_str()).collect();
        assert_eq!(names, vec!["time", "latitude", "trajectory", "temperature", "status"]);
        assert_eq!(schema.field(4).data_type(), &DataType::Utf8);
        assert_eq!(schema.field(3).metadata()["units"], "Celsius");
        assert_eq!(schema.metadata()["tag/ptt"], "57441");
        assert_eq!(schema.metadata()["featureType"], "trajectory");
    }

    #[test]
    fn test_flat_metadata_uses_bare_names() {
        let attributes = vec![
            GlobalAttribute::new("ptt", "1").with_group("tag"),
            GlobalAttribute::new("ptt", "2").with_group("deployment"),
        ];
        let metadata = global_metadata(&attributes, false);
        assert_eq!(metadata["ptt"], "2");
        assert!(!metadata.contains_key("tag/ptt"));
    }

    #[test]
    fn test_amend_keeps_values() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("tag.parquet");
        let mut writer = ParquetTrajectoryWriter::new(&path, WriterOptions::default());
        writer.write(&dataset()).unwrap();
        let before = writer.read_variable("temperature").unwrap();

        let mut amendment = AttributeAmendment::default();
        amendment.set_variable("time", "valid_min", "0");
        amendment.set_global("time_coverage_start", "1970-01-01T00:00:00Z");
        writer.amend_attributes(&amendment).unwrap();

        assert_eq!(writer.read_variable("temperature").unwrap(), before);
        let (schema, _) = writer.read_all().unwrap();
        assert_eq!(schema.field_with_name("time").unwrap().metadata()["valid_min"], "0");
        assert_eq!(schema.metadata()["time_coverage_start"], "1970-01-01T00:00:00Z");
        assert_eq!(schema.metadata()["serial_number"], "05A0001");
        assert!(!path.with_extension("amend.tmp").exists());
    }

    #[test]
    fn test_amend_before_write_fails() {
        let mut writer = ParquetTrajectoryWriter::new(Path::new("never.parquet"), WriterOptions::default());
        let mut amendment = AttributeAmendment::default();
        amendment.set_global("a", "b");
        assert!(matches!(
            writer.amend_attributes(&amendment),
            Err(TagError::WriterFailed { .. })
        ));
    }
}
