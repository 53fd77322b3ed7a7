//! Turning downloaded resource bytes into frames.
//!
//! Dispatch is on the lowercased resource format. Spreadsheets are read with
//! calamine into JSON records first, so they go through the same schema
//! inference as explorer output. Date cells are then cast back to temporal
//! columns.

use std::io::Cursor;
use std::sync::Arc;

use arrow::compute::{cast, concat_batches};
use arrow::csv::reader::Format;
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use calamine::{Data, Reader, open_workbook_auto_from_rs};
use chrono::NaiveTime;
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::basic::{Compression, ZstdLevel};
use parquet::file::properties::WriterProperties;
use polars::prelude::{CsvReadOptions, DataFrame, ParquetReader, SerReader};
use serde_json::{Map, Value};

use crate::error::AppError;
use crate::frame::{Frame, FrameKind, arrow_to_polars, values_to_arrow, values_to_polars};

/// Number of CSV records sampled for schema inference.
const CSV_INFER_RECORDS: usize = 1000;

/// Options for spreadsheet resources. Ignored by other formats.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Sheet to read. The first sheet is used when unset.
    pub sheet_name: Option<String>,
    /// Rows to skip above the header row.
    pub skip_rows: usize,
}

impl LoadOptions {
    pub fn sheet(mut self, name: impl Into<String>) -> Self {
        self.sheet_name = Some(name.into());
        self
    }

    pub fn skip_rows(mut self, rows: usize) -> Self {
        self.skip_rows = rows;
        self
    }
}

/// Parquet writer settings shared by every parquet this crate produces.
pub fn writer_properties() -> WriterProperties {
    WriterProperties::builder()
        .set_compression(Compression::ZSTD(ZstdLevel::try_new(3).unwrap_or_default()))
        .build()
}

/// Lowercases a format name and strips a leading dot (`.CSV` → `csv`).
pub fn normalise_format(format: &str) -> String {
    format.trim().trim_start_matches('.').to_lowercase()
}

fn is_spreadsheet(format: &str) -> bool {
    matches!(format, "xls" | "xlsx" | "spreadsheet")
}

fn unsupported(format: &str) -> AppError {
    match format {
        "geopackage" | "gpkg" => AppError::UnsupportedFormat(
            "Geopackage format requires a geospatial loader and cannot be read as a plain table"
                .to_string(),
        ),
        other => AppError::UnsupportedFormat(format!(
            "{}. Supported formats: parquet, csv, json, xls, xlsx",
            other
        )),
    }
}

/// Reads resource bytes into the requested frame flavour.
pub fn create_dataframe(
    bytes: &Bytes,
    format: &str,
    kind: FrameKind,
    opts: &LoadOptions,
) -> Result<Frame, AppError> {
    match kind {
        FrameKind::Arrow => read_arrow(bytes, format, opts).map(Frame::Arrow),
        FrameKind::Polars => read_polars(bytes, format, opts).map(Frame::Polars),
    }
}

/// Reads resource bytes into a single Arrow batch.
pub fn read_arrow(bytes: &Bytes, format: &str, opts: &LoadOptions) -> Result<RecordBatch, AppError> {
    let format = normalise_format(format);
    match format.as_str() {
        "parquet" => parquet_to_arrow(bytes),
        "csv" => csv_to_arrow(bytes),
        "json" => values_to_arrow(&json_records(bytes)?),
        f if is_spreadsheet(f) => spreadsheet_to_arrow(bytes, opts),
        other => Err(unsupported(other)),
    }
}

/// Reads resource bytes into a polars frame.
pub fn read_polars(bytes: &Bytes, format: &str, opts: &LoadOptions) -> Result<DataFrame, AppError> {
    let format = normalise_format(format);
    match format.as_str() {
        "parquet" => Ok(ParquetReader::new(Cursor::new(bytes.to_vec())).finish()?),
        "csv" => Ok(CsvReadOptions::default()
            .with_has_header(true)
            .into_reader_with_file_handle(Cursor::new(bytes.to_vec()))
            .finish()?),
        "json" => values_to_polars(&json_records(bytes)?),
        f if is_spreadsheet(f) => arrow_to_polars(&spreadsheet_to_arrow(bytes, opts)?),
        other => Err(unsupported(other)),
    }
}

fn parquet_to_arrow(bytes: &Bytes) -> Result<RecordBatch, AppError> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(bytes.clone())?;
    let schema = builder.schema().clone();
    let batches = builder.build()?.collect::<Result<Vec<_>, _>>()?;
    Ok(concat_batches(&schema, &batches)?)
}

fn csv_to_arrow(bytes: &Bytes) -> Result<RecordBatch, AppError> {
    let (schema, _) = Format::default()
        .with_header(true)
        .infer_schema(Cursor::new(bytes.as_ref()), Some(CSV_INFER_RECORDS))?;
    let schema = Arc::new(schema);

    let reader = arrow::csv::ReaderBuilder::new(schema.clone())
        .with_header(true)
        .build(Cursor::new(bytes.as_ref()))?;
    let batches = reader.collect::<Result<Vec<_>, _>>()?;
    Ok(concat_batches(&schema, &batches)?)
}

/// Parses a JSON array of records, a single record, or newline-delimited records.
fn json_records(bytes: &Bytes) -> Result<Vec<Value>, AppError> {
    let records = match serde_json::from_slice::<Value>(bytes) {
        Ok(Value::Array(items)) => items,
        Ok(obj @ Value::Object(_)) => vec![obj],
        Ok(_) => {
            return Err(AppError::DataFrameError(
                "JSON resource is neither a record nor a list of records".to_string(),
            ));
        }
        Err(_) => String::from_utf8_lossy(bytes)
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(serde_json::from_str::<Value>)
            .collect::<Result<Vec<_>, _>>()?,
    };

    if records.iter().any(|r| !r.is_object()) {
        return Err(AppError::DataFrameError(
            "JSON resource contains entries that are not records".to_string(),
        ));
    }
    Ok(records)
}

/// How a spreadsheet cell contributes to its column's type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellKind {
    Blank,
    Date,
    DateTime,
    Other,
}

impl CellKind {
    fn of(cell: &Data) -> Self {
        match cell {
            Data::Empty => Self::Blank,
            Data::DateTime(dt) if dt.is_datetime() => match dt.as_datetime() {
                Some(when) if when.time() == NaiveTime::MIN => Self::Date,
                Some(_) => Self::DateTime,
                None => Self::Other,
            },
            _ => Self::Other,
        }
    }

    fn merge(self, other: Self) -> Self {
        match (self, other) {
            (Self::Blank, kind) | (kind, Self::Blank) => kind,
            (Self::Date, Self::Date) => Self::Date,
            (Self::Date | Self::DateTime, Self::Date | Self::DateTime) => Self::DateTime,
            _ => Self::Other,
        }
    }

    /// Arrow type for a column whose filled cells are all dates.
    fn temporal_type(self) -> Option<DataType> {
        match self {
            Self::Date => Some(DataType::Date32),
            Self::DateTime => Some(DataType::Timestamp(TimeUnit::Millisecond, None)),
            _ => None,
        }
    }
}

fn cell_to_value(cell: &Data) -> Value {
    match cell {
        Data::Int(i) => Value::from(*i),
        Data::Float(f) => serde_json::Number::from_f64(*f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        Data::String(s) => Value::String(s.clone()),
        Data::Bool(b) => Value::Bool(*b),
        Data::DateTime(dt) if dt.is_datetime() => match dt.as_datetime() {
            Some(when) if when.time() == NaiveTime::MIN => {
                Value::String(when.format("%Y-%m-%d").to_string())
            }
            Some(when) => Value::String(when.format("%Y-%m-%dT%H:%M:%S").to_string()),
            None => Value::from(dt.as_f64()),
        },
        Data::DateTime(dt) => Value::from(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Value::String(s.clone()),
        Data::Empty | Data::Error(_) => Value::Null,
    }
}

fn header_names(row: &[Data]) -> Vec<String> {
    let mut names: Vec<String> = Vec::with_capacity(row.len());
    for (i, cell) in row.iter().enumerate() {
        let raw = cell.to_string();
        let mut name = if raw.trim().is_empty() {
            format!("column_{}", i)
        } else {
            raw.trim().to_string()
        };
        if names.contains(&name) {
            name = format!("{}_{}", name, i);
        }
        names.push(name);
    }
    names
}

fn open_workbook(
    bytes: &Bytes,
) -> Result<calamine::Sheets<Cursor<Vec<u8>>>, calamine::Error> {
    open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
}

/// One worksheet as JSON records keyed by the header row.
#[derive(Debug, Default)]
struct SheetRecords {
    headers: Vec<String>,
    kinds: Vec<CellKind>,
    records: Vec<Value>,
}

fn spreadsheet_records(bytes: &Bytes, opts: &LoadOptions) -> Result<SheetRecords, AppError> {
    let mut workbook = open_workbook(bytes)
        .map_err(|e| AppError::DataFrameError(format!("Could not open spreadsheet: {}", e)))?;

    let sheet = match &opts.sheet_name {
        Some(name) => name.clone(),
        None => workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| AppError::DataFrameError("Spreadsheet has no sheets".to_string()))?,
    };

    let range = workbook
        .worksheet_range(&sheet)
        .map_err(|e| AppError::DataFrameError(format!("Could not read sheet '{}': {}", sheet, e)))?;

    let mut rows = range.rows().skip(opts.skip_rows);
    let Some(header) = rows.next() else {
        return Ok(SheetRecords::default());
    };
    let headers = header_names(header);
    let mut kinds = vec![CellKind::Blank; headers.len()];

    let mut records = Vec::new();
    for row in rows.filter(|row| row.iter().any(|c| !matches!(c, Data::Empty))) {
        let mut record = Map::new();
        for (i, name) in headers.iter().enumerate() {
            let (kind, value) = match row.get(i) {
                Some(cell) => (CellKind::of(cell), cell_to_value(cell)),
                None => (CellKind::Blank, Value::Null),
            };
            kinds[i] = kinds[i].merge(kind);
            record.insert(name.clone(), value);
        }
        records.push(Value::Object(record));
    }

    Ok(SheetRecords {
        headers,
        kinds,
        records,
    })
}

/// Reads one worksheet into an Arrow batch.
///
/// Columns holding only dates become `Date32`, or millisecond timestamps when
/// any cell has a time part. A sheet with a header row and no data keeps its
/// columns as empty strings.
fn spreadsheet_to_arrow(bytes: &Bytes, opts: &LoadOptions) -> Result<RecordBatch, AppError> {
    let sheet = spreadsheet_records(bytes, opts)?;

    if sheet.records.is_empty() {
        let fields: Vec<Field> = sheet
            .headers
            .iter()
            .map(|name| Field::new(name, DataType::Utf8, true))
            .collect();
        return Ok(RecordBatch::new_empty(Arc::new(Schema::new(fields))));
    }

    let batch = values_to_arrow(&sheet.records)?;
    let temporal: Vec<(&String, DataType)> = sheet
        .headers
        .iter()
        .zip(&sheet.kinds)
        .filter_map(|(name, kind)| kind.temporal_type().map(|t| (name, t)))
        .collect();
    if temporal.is_empty() {
        return Ok(batch);
    }

    let schema = batch.schema();
    let mut fields: Vec<Field> = schema.fields().iter().map(|f| f.as_ref().clone()).collect();
    let mut columns = batch.columns().to_vec();
    for (name, data_type) in temporal {
        let Ok(index) = schema.index_of(name) else {
            continue;
        };
        columns[index] = cast(&columns[index], &data_type)?;
        fields[index] = Field::new(name, data_type, true);
    }

    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?)
}

/// Lists the worksheet names of an Excel file.
pub fn get_sheet_names(bytes: &Bytes) -> Result<Vec<String>, AppError> {
    let workbook = open_workbook(bytes).map_err(|_| {
        AppError::InvalidInput("Could not read sheet names. Is this a valid Excel file?".to_string())
    })?;
    Ok(workbook.sheet_names())
}

/// Serializes an Arrow batch to ZSTD-compressed parquet bytes.
pub fn write_parquet(batch: &RecordBatch) -> Result<Bytes, AppError> {
    let mut buffer = Vec::new();
    let mut writer = ArrowWriter::try_new(&mut buffer, batch.schema(), Some(writer_properties()))?;
    writer.write(batch)?;
    writer.close()?;
    Ok(Bytes::from(buffer))
}

/// Converts a spreadsheet, CSV or JSON resource into parquet bytes.
pub fn to_parquet(bytes: &Bytes, format: &str) -> Result<Bytes, AppError> {
    let format = normalise_format(format);
    if !(is_spreadsheet(&format) || format == "csv" || format == "json") {
        return Err(AppError::UnsupportedFormat(format!(
            "{} cannot be converted to Parquet. Supported formats: xls, xlsx, csv, json",
            format
        )));
    }

    let batch = read_arrow(bytes, &format, &LoadOptions::default())?;
    if batch.num_rows() == 0 {
        return Err(AppError::DataFrameError(
            "No data was loaded from the source file".to_string(),
        ));
    }

    write_parquet(&batch)
}
