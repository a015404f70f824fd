//! Spreadsheet workbooks via calamine.

use std::path::Path;

use calamine::{open_workbook_auto, Data, DataType, Reader};
use color_eyre::eyre::eyre;
use color_eyre::Result;
use crossterm::event::KeyCode;
use sheetstack_cli::FileFormat;

use crate::column::Column;
use crate::commands::{Command, CommandTable};
use crate::config::LoadingConfig;
use crate::keys::Keystroke;
use crate::loaders::sheet_name;
use crate::row::Row;
use crate::sheet::{Sheet, SheetSource};
use crate::value::{Value, ValueType};

fn cell_value(cell: &Data) -> Value {
    match cell {
        Data::Empty => Value::None,
        Data::Int(i) => Value::Int(*i),
        Data::Float(f) => Value::Real(*f),
        Data::String(s) => Value::Str(s.clone()),
        Data::Bool(b) => Value::Str(b.to_string()),
        Data::DateTime(_) => cell
            .as_datetime()
            .map(Value::Date)
            .unwrap_or_else(|| Value::Str(cell.to_string())),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Value::Str(s.clone()),
        Data::Error(e) => Value::Str(format!("#{e:?}")),
    }
}

pub fn workbook_commands() -> Result<CommandTable> {
    CommandTable::new()
        .command(Keystroke::code(KeyCode::Enter), Command::Dive, "open this worksheet")
        .build()
}

/// Lists the worksheets of a workbook.
pub fn open_workbook(path: &Path) -> Result<Sheet> {
    let mut workbook = open_workbook_auto(path).map_err(|e| eyre!("Excel: {}", e))?;
    let mut rows = Vec::new();
    for name in workbook.sheet_names().to_vec() {
        let (n_rows, n_cols) = workbook
            .worksheet_range(&name)
            .map(|r| r.get_size())
            .unwrap_or((0, 0));
        rows.push(Row::fields(vec![
            Value::Str(name),
            Value::Int(n_rows as i64),
            Value::Int(n_cols as i64),
        ]));
    }
    let columns = vec![
        Column::field("name", 0),
        Column::field("nRows", 1).with_type(ValueType::Int),
        Column::field("nCols", 2).with_type(ValueType::Int),
    ];
    Ok(Sheet::new(
        sheet_name(path),
        SheetSource::Path {
            path: path.to_path_buf(),
            format: Some(FileFormat::Excel),
        },
    )
    .with_rows(rows)
    .with_columns(columns)
    .with_keys(1)
    .with_commands(workbook_commands()?))
}

/// One worksheet as field rows; the first row names the columns when
/// `[loading] header` is on.
pub fn open_worksheet(path: &Path, worksheet: &str, config: &LoadingConfig) -> Result<Sheet> {
    let mut workbook = open_workbook_auto(path).map_err(|e| eyre!("Excel: {}", e))?;
    let range = workbook
        .worksheet_range(worksheet)
        .map_err(|e| eyre!("Excel: {}", e))?;
    let mut cells = range.rows();
    let width = range.width();
    let headers: Vec<String> = match (config.header, range.height() > 0) {
        (true, true) => cells
            .next()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .unwrap_or_default(),
        _ => Vec::new(),
    };
    let rows: Vec<Row> = cells
        .map(|r| Row::fields(r.iter().map(cell_value).collect()))
        .collect();
    let columns = (0..width)
        .map(|i| {
            let name = headers
                .get(i)
                .filter(|h| !h.is_empty())
                .cloned()
                .unwrap_or_else(|| format!("column_{}", i + 1));
            Column::field(name, i)
        })
        .collect::<Vec<_>>();
    let n_keys = usize::from(!columns.is_empty());
    Ok(Sheet::new(
        format!("{}{}{}", sheet_name(path), config.subsheet_sep, worksheet),
        SheetSource::Worksheet {
            path: path.to_path_buf(),
            name: worksheet.to_string(),
        },
    )
    .with_rows(rows)
    .with_columns(columns)
    .with_keys(n_keys))
}
