//! Writing a sheet back out. Only visible columns are saved, as displayed.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use polars::prelude::{CsvWriter, DataFrame, IntoColumn, NamedFrom, SerWriter, Series};
use serde_json::{Map, Value as Json};
use tracing::info;

use crate::config::AppConfig;
use crate::error::SheetError;
use crate::loaders::json::to_json;
use crate::sheet::Sheet;
use crate::value::CellValue;

/// Header row and display strings of the visible columns.
fn visible_table(sheet: &Sheet, config: &AppConfig) -> (Vec<String>, Vec<Vec<String>>) {
    let columns = sheet.visible_columns();
    let header = columns.iter().map(|c| c.name()).collect();
    let rows = sheet
        .rows
        .iter()
        .map(|r| {
            columns
                .iter()
                .map(|c| c.get_display_value(r, &config.display))
                .collect()
        })
        .collect();
    (header, rows)
}

fn has_header(header: &[String]) -> bool {
    header.iter().any(|h| !h.trim().is_empty())
}

/// Tab-separated; the header is skipped when every column name is blank.
pub fn write_tsv(sheet: &Sheet, out: &mut impl Write, config: &AppConfig) -> Result<()> {
    let (header, rows) = visible_table(sheet, config);
    if has_header(&header) {
        writeln!(out, "{}", header.join("\t"))?;
    }
    for row in rows {
        writeln!(out, "{}", row.join("\t"))?;
    }
    Ok(())
}

/// Names made distinct by suffixing repeats: `val`, `val_2`, `val_3`.
pub fn distinct_names(header: &[String]) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::with_capacity(header.len());
    header
        .iter()
        .map(|name| {
            let mut candidate = name.clone();
            let mut n = 1;
            while !seen.insert(candidate.clone()) {
                n += 1;
                candidate = format!("{name}_{n}");
            }
            candidate
        })
        .collect()
}

/// Sheet column names may repeat or be blank, so the frame gets positional
/// names and the header goes out as its first row.
pub fn write_csv(sheet: &Sheet, out: &mut impl Write, config: &AppConfig) -> Result<()> {
    let (header, rows) = visible_table(sheet, config);
    let skip = usize::from(!has_header(&header));
    let mut series = Vec::with_capacity(header.len());
    for (i, name) in header.iter().enumerate() {
        let values: Vec<&str> = std::iter::once(name.as_str())
            .chain(rows.iter().map(|r| r[i].as_str()))
            .skip(skip)
            .collect();
        series.push(Series::new(format!("column_{i}").into(), values).into_column());
    }
    let mut df = DataFrame::new(series)?;
    CsvWriter::new(out)
        .include_header(false)
        .with_separator(u8::try_from(config.loading.delimiter).unwrap_or(b','))
        .with_quote_char(u8::try_from(config.loading.quote_char).unwrap_or(b'"'))
        .finish(&mut df)?;
    Ok(())
}

/// An array of objects holding typed values. Keys are the column names,
/// with repeats suffixed so no column is lost.
pub fn write_json(sheet: &Sheet, out: &mut impl Write) -> Result<()> {
    let columns = sheet.visible_columns();
    let header: Vec<String> = columns.iter().map(|c| c.name()).collect();
    let keys = distinct_names(&header);
    let items: Vec<Json> = sheet
        .rows
        .iter()
        .map(|r| {
            let obj: Map<String, Json> = columns
                .iter()
                .zip(&keys)
                .map(|(c, key)| {
                    let value = match c.get_value(r) {
                        CellValue::Ok(v) => to_json(&v),
                        other => Json::String(other.to_string()),
                    };
                    (key.clone(), value)
                })
                .collect();
            Json::Object(obj)
        })
        .collect();
    serde_json::to_writer_pretty(&mut *out, &items)?;
    writeln!(out)?;
    Ok(())
}

/// Saves `sheet` to `path`, choosing the writer by extension.
pub fn save_sheet(sheet: &Sheet, path: &Path, config: &AppConfig) -> Result<()> {
    if config.behavior.readonly {
        return Err(SheetError::readonly_mode().into());
    }
    let file = File::create(path).wrap_err_with(|| format!("creating {}", path.display()))?;
    let mut out = BufWriter::new(file);
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "csv" => write_csv(sheet, &mut out, config)?,
        "json" => write_json(sheet, &mut out)?,
        _ => write_tsv(sheet, &mut out, config)?,
    }
    out.flush()?;
    info!(sheet = %sheet.name, path = %path.display(), rows = sheet.n_rows(), "saved sheet");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::Column;
    use crate::row::Row;
    use crate::sheet::SheetSource;
    use crate::value::Value;

    fn sheet(names: [&str; 2]) -> Sheet {
        Sheet::new("s", SheetSource::None)
            .with_rows(vec![Row::fields(vec![Value::from("1"), Value::from("a")])])
            .with_columns(vec![Column::field(names[0], 0), Column::field(names[1], 1)])
    }

    #[test]
    fn test_tsv_header_rules() {
        let config = AppConfig::default();
        let mut out = Vec::new();
        write_tsv(&sheet(["id", "val"]), &mut out, &config).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "id\tval\n1\ta\n");
        let mut out = Vec::new();
        write_tsv(&sheet(["", " "]), &mut out, &config).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "1\ta\n");
    }

    #[test]
    fn test_hidden_columns_not_saved() {
        let config = AppConfig::default();
        let s = sheet(["id", "val"]);
        s.columns[1].set_width(Some(0));
        let mut out = Vec::new();
        write_tsv(&s, &mut out, &config).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "id\n1\n");
    }

    #[test]
    fn test_readonly_refuses() {
        let mut config = AppConfig::default();
        config.behavior.readonly = true;
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("x.tsv");
        let err = save_sheet(&sheet(["a", "b"]), &path, &config).unwrap_err();
        assert_eq!(err.downcast_ref::<SheetError>(), Some(&SheetError::readonly_mode()));
        assert!(!path.exists());
    }

    #[test]
    fn test_distinct_names() {
        let header: Vec<String> = ["val", "id", "val", "val_2", "val"].map(String::from).to_vec();
        assert_eq!(distinct_names(&header), ["val", "id", "val_2", "val_2_2", "val_3"]);
    }

    #[test]
    fn test_csv_writer_handles_repeated_and_blank_names() {
        let config = AppConfig::default();
        let mut out = Vec::new();
        write_csv(&sheet(["val", "val"]), &mut out, &config).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "val,val\n1,a\n");
        let mut out = Vec::new();
        write_csv(&sheet(["", ""]), &mut out, &config).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "1,a\n");
    }

    #[test]
    fn test_json_writer_keeps_repeated_columns() {
        let mut out = Vec::new();
        write_json(&sheet(["val", "val"]), &mut out).unwrap();
        let parsed: Json = serde_json::from_slice(&out).unwrap();
        assert_eq!(parsed, serde_json::json!([{"val": "1", "val_2": "a"}]));
    }

    #[test]
    fn test_json_writer() {
        let mut out = Vec::new();
        write_json(&sheet(["id", "val"]), &mut out).unwrap();
        let parsed: Json = serde_json::from_slice(&out).unwrap();
        assert_eq!(parsed, serde_json::json!([{"id": "1", "val": "a"}]));
    }
}
