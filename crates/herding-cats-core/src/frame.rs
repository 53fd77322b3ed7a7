//! In-memory tables.
//!
//! Two frame flavours are supported: Arrow [`RecordBatch`]es for callers
//! living in the Arrow/DataFusion ecosystem, and polars [`DataFrame`]s. Both
//! can be built from JSON records, which is how explorer output becomes a
//! table.

use std::fmt;
use std::io::Cursor;
use std::str::FromStr;
use std::sync::Arc;

use arrow::compute::concat_batches;
use arrow::datatypes::Schema;
use arrow::json::ReaderBuilder;
use arrow::json::reader::infer_json_schema_from_iterator;
use arrow::record_batch::RecordBatch;
use arrow::util::pretty::pretty_format_batches;
use bytes::Bytes;
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::{ArrowReaderOptions, ParquetRecordBatchReaderBuilder};
use polars::prelude::{DataFrame, JsonFormat, JsonReader, ParquetReader, ParquetWriter, SerReader};
use serde::Serialize;
use serde_json::Value;

use crate::error::AppError;
use crate::formats::writer_properties;

/// Which frame library a caller wants back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameKind {
    #[default]
    Arrow,
    Polars,
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Arrow => write!(f, "arrow"),
            Self::Polars => write!(f, "polars"),
        }
    }
}

impl FromStr for FrameKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "arrow" | "pandas" => Ok(Self::Arrow),
            "polars" => Ok(Self::Polars),
            _ => Err(AppError::InvalidInput(format!(
                "Unknown frame type: '{}'. Valid options: arrow, polars",
                s
            ))),
        }
    }
}

/// A loaded table in one of the supported libraries.
#[derive(Debug, Clone)]
pub enum Frame {
    Arrow(RecordBatch),
    Polars(DataFrame),
}

impl Frame {
    pub fn kind(&self) -> FrameKind {
        match self {
            Self::Arrow(_) => FrameKind::Arrow,
            Self::Polars(_) => FrameKind::Polars,
        }
    }

    pub fn num_rows(&self) -> usize {
        match self {
            Self::Arrow(batch) => batch.num_rows(),
            Self::Polars(df) => df.height(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.num_rows() == 0
    }

    pub fn column_names(&self) -> Vec<String> {
        match self {
            Self::Arrow(batch) => batch
                .schema()
                .fields()
                .iter()
                .map(|f| f.name().clone())
                .collect(),
            Self::Polars(df) => df
                .get_column_names()
                .into_iter()
                .map(|n| n.to_string())
                .collect(),
        }
    }

    /// Returns the Arrow batch, converting from polars when needed.
    pub fn into_arrow(self) -> Result<RecordBatch, AppError> {
        match self {
            Self::Arrow(batch) => Ok(batch),
            Self::Polars(df) => polars_to_arrow(&df),
        }
    }

    /// Returns the polars frame, converting from Arrow when needed.
    pub fn into_polars(self) -> Result<DataFrame, AppError> {
        match self {
            Self::Arrow(batch) => arrow_to_polars(&batch),
            Self::Polars(df) => Ok(df),
        }
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Arrow(batch) => match pretty_format_batches(std::slice::from_ref(batch)) {
                Ok(table) => write!(f, "{}", table),
                Err(_) => write!(f, "<{} rows>", batch.num_rows()),
            },
            Self::Polars(df) => write!(f, "{}", df),
        }
    }
}

/// Builds a frame from anything that serializes to a list of JSON objects.
pub fn records_to_frame<T: Serialize>(records: &[T], kind: FrameKind) -> Result<Frame, AppError> {
    let values = records
        .iter()
        .map(serde_json::to_value)
        .collect::<Result<Vec<Value>, _>>()?;
    values_to_frame(&values, kind)
}

/// Builds a frame from JSON objects.
pub fn values_to_frame(values: &[Value], kind: FrameKind) -> Result<Frame, AppError> {
    match kind {
        FrameKind::Arrow => values_to_arrow(values).map(Frame::Arrow),
        FrameKind::Polars => values_to_polars(values).map(Frame::Polars),
    }
}

/// Builds an Arrow batch from JSON objects, inferring the schema.
///
/// Nested objects and arrays keep their structure as struct and list columns.
pub fn values_to_arrow(values: &[Value]) -> Result<RecordBatch, AppError> {
    if values.is_empty() {
        return Ok(RecordBatch::new_empty(Arc::new(Schema::empty())));
    }

    let schema = Arc::new(infer_json_schema_from_iterator(values.iter().map(Ok))?);
    let mut decoder = ReaderBuilder::new(schema.clone())
        .with_coerce_primitive(true)
        .build_decoder()?;
    decoder.serialize(values)?;

    match decoder.flush()? {
        Some(batch) => Ok(batch),
        None => Ok(RecordBatch::new_empty(schema)),
    }
}

/// Builds a polars frame from JSON objects.
pub fn values_to_polars(values: &[Value]) -> Result<DataFrame, AppError> {
    if values.is_empty() {
        return Ok(DataFrame::empty());
    }

    let bytes = serde_json::to_vec(values)?;
    let df = JsonReader::new(Cursor::new(bytes))
        .with_json_format(JsonFormat::Json)
        .finish()?;
    Ok(df)
}

/// Converts an Arrow batch to polars by round-tripping through parquet.
pub fn arrow_to_polars(batch: &RecordBatch) -> Result<DataFrame, AppError> {
    if batch.num_columns() == 0 {
        return Ok(DataFrame::empty());
    }

    let mut buffer = Vec::new();
    let mut writer = ArrowWriter::try_new(&mut buffer, batch.schema(), Some(writer_properties()))?;
    writer.write(batch)?;
    writer.close()?;

    let df = ParquetReader::new(Cursor::new(buffer)).finish()?;
    Ok(df)
}

/// Converts a polars frame to Arrow through parquet.
///
/// The embedded Arrow schema is skipped so strings come back as plain `Utf8`
/// rather than polars' view types.
pub fn polars_to_arrow(df: &DataFrame) -> Result<RecordBatch, AppError> {
    if df.width() == 0 {
        return Ok(RecordBatch::new_empty(Arc::new(Schema::empty())));
    }

    let mut buffer = Vec::new();
    ParquetWriter::new(&mut buffer).finish(&mut df.clone())?;

    let options = ArrowReaderOptions::new().with_skip_arrow_metadata(true);
    let builder = ParquetRecordBatchReaderBuilder::try_new_with_options(Bytes::from(buffer), options)?;
    let schema = builder.schema().clone();
    let batches = builder.build()?.collect::<Result<Vec<_>, _>>()?;
    Ok(concat_batches(&schema, &batches)?)
}
