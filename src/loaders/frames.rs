//! Polars data frames as sheets.

use std::io::Cursor;

use chrono::{DateTime, NaiveDateTime};
use color_eyre::Result;
use polars::prelude::{AnyValue, DataFrame, DataType, IpcReader, ParquetReader, SerReader, TimeUnit};
use sheetstack_cli::FileFormat;

use crate::column::Column;
use crate::row::Row;
use crate::sheet::{Sheet, SheetSource};
use crate::value::{Value, ValueType};

fn from_epoch(secs: i64, nanos: u32) -> Option<NaiveDateTime> {
    DateTime::from_timestamp(secs, nanos).map(|d| d.naive_utc())
}

fn datetime_value(v: i64, unit: TimeUnit) -> Value {
    let (per_sec, nanos_per_unit) = match unit {
        TimeUnit::Nanoseconds => (1_000_000_000, 1),
        TimeUnit::Microseconds => (1_000_000, 1_000),
        TimeUnit::Milliseconds => (1_000, 1_000_000),
    };
    let secs = v.div_euclid(per_sec);
    let nanos = (v.rem_euclid(per_sec) * nanos_per_unit) as u32;
    from_epoch(secs, nanos).map(Value::Date).unwrap_or(Value::Int(v))
}

/// One polars cell as a sheet value.
pub fn any_value(av: AnyValue) -> Value {
    match av {
        AnyValue::Null => Value::None,
        AnyValue::String(s) => Value::Str(s.to_string()),
        AnyValue::StringOwned(s) => Value::Str(s.to_string()),
        AnyValue::Boolean(b) => Value::Str(b.to_string()),
        AnyValue::Int8(i) => Value::Int(i.into()),
        AnyValue::Int16(i) => Value::Int(i.into()),
        AnyValue::Int32(i) => Value::Int(i.into()),
        AnyValue::Int64(i) => Value::Int(i),
        AnyValue::UInt8(i) => Value::Int(i.into()),
        AnyValue::UInt16(i) => Value::Int(i.into()),
        AnyValue::UInt32(i) => Value::Int(i.into()),
        AnyValue::UInt64(i) => i64::try_from(i).map(Value::Int).unwrap_or(Value::Real(i as f64)),
        AnyValue::Float32(f) => Value::Real(f.into()),
        AnyValue::Float64(f) => Value::Real(f),
        AnyValue::Date(days) => from_epoch(i64::from(days) * 86_400, 0)
            .map(Value::Date)
            .unwrap_or(Value::Int(days.into())),
        AnyValue::Datetime(v, unit, _) => datetime_value(v, unit),
        other => Value::Str(other.to_string()),
    }
}

pub fn dtype_value_type(dtype: &DataType) -> ValueType {
    match dtype {
        DataType::Date | DataType::Datetime(_, _) => ValueType::Date,
        d if d.is_integer() => ValueType::Int,
        d if d.is_float() => ValueType::Real,
        _ => ValueType::Any,
    }
}

/// Copies a frame into field rows. Column types follow the dtypes; the
/// first column is the key.
pub fn frame_sheet(df: &DataFrame, name: impl Into<String>, source: SheetSource) -> Result<Sheet> {
    let frame_columns = df.get_columns();
    let mut rows = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let mut fields = Vec::with_capacity(frame_columns.len());
        for c in frame_columns {
            fields.push(any_value(c.get(i)?));
        }
        rows.push(Row::fields(fields));
    }
    let columns: Vec<Column> = frame_columns
        .iter()
        .enumerate()
        .map(|(i, c)| Column::field(c.name().as_str(), i).with_type(dtype_value_type(c.dtype())))
        .collect();
    let n_keys = usize::from(!columns.is_empty());
    Ok(Sheet::new(name, source)
        .with_rows(rows)
        .with_columns(columns)
        .with_keys(n_keys))
}

/// Parquet or Arrow IPC bytes as a sheet.
pub fn open_columnar(bytes: &[u8], format: FileFormat, name: String, source: SheetSource) -> Result<Sheet> {
    let cursor = Cursor::new(bytes.to_vec());
    let df = match format {
        FileFormat::Parquet => ParquetReader::new(cursor).finish()?,
        _ => IpcReader::new(cursor).finish()?,
    };
    frame_sheet(&df, name, source)
}
