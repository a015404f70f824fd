//! Sheets describing the session: key bindings, the stack, a sheet's
//! columns, options, errors and statuses.

use color_eyre::eyre::eyre;
use color_eyre::Result;
use crossterm::event::KeyCode;

use crate::column::Column;
use crate::commands::{Command, ColumnOp, CommandTable, GLOBAL_PREFIX};
use crate::config::{AppConfig, DisplayConfig};
use crate::error::SheetError;
use crate::join::JoinKind;
use crate::keys::{keyname, Keystroke};
use crate::loaders::delimited::lines_sheet;
use crate::row::Row;
use crate::sheet::{Derivation, Sheet, SheetRef, SheetSource};
use crate::status::{ErrorRecord, StatusLog};
use crate::value::{detect_type, Value, ValueType};

// help

/// Every binding reachable from `source`: its own first, then the global
/// ones it does not shadow.
pub fn help_sheet(source: &SheetRef, global: &CommandTable) -> Sheet {
    let src = source.borrow();
    let local = &src.commands;
    let global_help = |key: &Keystroke| {
        local
            .lookup(&GLOBAL_PREFIX.to_string(), key)
            .or_else(|| global.lookup(&GLOBAL_PREFIX.to_string(), key))
            .map(|b| b.help)
            .unwrap_or("-")
    };
    let mut rows = Vec::new();
    for (prefix, key, binding) in local.entries() {
        rows.push((prefix, key, binding.help));
    }
    for (prefix, key, binding) in global.entries() {
        if local.lookup(&prefix, &key).is_none() {
            rows.push((prefix, key, binding.help));
        }
    }
    let rows = rows
        .into_iter()
        .map(|(prefix, key, help)| {
            Row::fields(vec![
                Value::Str(format!("{}{}", prefix, keyname(&key))),
                Value::from(help),
                Value::from(global_help(&key)),
            ])
        })
        .collect();
    Sheet::new(
        format!("{}_help", src.name),
        SheetSource::Derived(Derivation::Help(source.clone())),
    )
    .with_rows(rows)
    .with_columns(vec![
        Column::field("key", 0).with_type(ValueType::Str),
        Column::field("action", 1).with_type(ValueType::Str),
        Column::field("global_action", 2).with_type(ValueType::Str),
    ])
    .with_keys(1)
}

// sheet stack

fn listed_sheet(row: &Row) -> Result<std::cell::Ref<'_, Sheet>> {
    row.get::<SheetRef>()?
        .try_borrow()
        .map_err(|_| eyre!("sheet is busy"))
}

fn stack_column(name: &str, f: impl Fn(&Sheet) -> Value + 'static) -> Column {
    Column::new(name, move |row| Ok(f(&listed_sheet(row)?)))
}

pub fn stack_commands() -> Result<CommandTable> {
    let mut table = CommandTable::new().command(
        Keystroke::code(KeyCode::Enter),
        Command::JumpToSheet,
        "go to this sheet",
    );
    for (kind, help) in [
        (JoinKind::Inner, "open inner join of selected sheets"),
        (JoinKind::LeftOuter, "open outer join of selected sheets"),
        (JoinKind::Full, "open full join of selected sheets"),
        (JoinKind::Anti, "open diff join of selected sheets"),
    ] {
        let symbol = kind.symbol().chars().next().unwrap_or('&');
        table = table.command(Keystroke::key(symbol), Command::JoinSelected(kind), help);
    }
    table.build()
}

/// Lists `sheets`, most recent first.
pub fn stack_sheet(sheets: &[SheetRef], display: &DisplayConfig) -> Result<Sheet> {
    let rows = sheets.iter().map(|s| Row::new(s.clone())).collect();
    let cursor_display = display.clone();
    let key_sep = display.key_sep.clone();
    let columns = vec![
        stack_column("name", |s| Value::Str(s.name.clone())),
        stack_column("nRows", |s| Value::Int(s.n_rows() as i64)).with_type(ValueType::Int),
        stack_column("nCols", |s| Value::Int(s.columns.len() as i64)).with_type(ValueType::Int),
        stack_column("cursorValue", move |s| {
            let text = match (s.cursor_column(), s.cursor_row()) {
                (Some(col), Some(row)) => col.get_display_value(row, &cursor_display),
                _ => String::new(),
            };
            Value::Str(text)
        }),
        stack_column("keyColNames", move |s| {
            Value::Str(
                s.key_columns()
                    .iter()
                    .map(Column::name)
                    .collect::<Vec<_>>()
                    .join(&key_sep),
            )
        }),
        stack_column("source", |s| Value::Str(s.source.describe())),
    ];
    Ok(Sheet::new("sheets", SheetSource::Derived(Derivation::SheetStack))
        .with_rows(rows)
        .with_columns(columns)
        .with_keys(1)
        .with_commands(stack_commands()?))
}

/// The sheet listed on `row` of the sheets sheet.
pub fn listed(row: &Row) -> Result<SheetRef> {
    Ok(row.get::<SheetRef>()?.clone())
}

// columns

fn column_of(row: &Row) -> Result<&Column> {
    row.get::<Column>()
}

pub fn column_commands() -> Result<CommandTable> {
    use ColumnOp as Op;
    let key = Keystroke::key;
    CommandTable::new()
        .command(key('@'), Command::SourceColumn(Op::SetType(ValueType::Date)), "set source column type to datetime")
        .command(key('#'), Command::SourceColumn(Op::SetType(ValueType::Int)), "set source column type to integer")
        .command(key('$'), Command::SourceColumn(Op::SetType(ValueType::Str)), "set source column type to string")
        .command(key('%'), Command::SourceColumn(Op::SetType(ValueType::Real)), "set source column type to decimal numeric type")
        .command(key('~'), Command::SourceColumn(Op::DetectType), "autodetect type of source column using its data")
        .command(key('!'), Command::SourceColumn(Op::ToggleKey), "toggle key column on source sheet")
        .command(key('-'), Command::SourceColumn(Op::Hide), "hide column on source sheet")
        .command(key('_'), Command::SourceColumn(Op::Fit), "set source column width to max width of its rows")
        .build()
}

/// One row per column of `source`. Name, width, type and format are
/// writable and change the source column itself.
pub fn columns_sheet(source: &SheetRef) -> Result<Sheet> {
    let src = source.borrow();
    let rows = src.columns.iter().cloned().map(Row::new).collect();
    let value_source = source.clone();
    let columns = vec![
        Column::new("name", |row| Ok(Value::Str(column_of(row)?.name())))
            .with_setter(|row, value| {
                column_of(row)?.set_name(value.to_string());
                Ok(())
            }),
        Column::new("width", |row| {
            Ok(column_of(row)?
                .width()
                .map(|w| Value::Int(w as i64))
                .unwrap_or(Value::None))
        })
        .with_type(ValueType::Int)
        .with_setter(|row, value| {
            let width = match value {
                Value::None => None,
                Value::Int(w) if w >= 0 => Some(w as usize),
                other => return Err(eyre!("invalid width {}", other)),
            };
            column_of(row)?.set_width(width);
            Ok(())
        }),
        Column::new("type", |row| Ok(Value::from(column_of(row)?.value_type().name())))
            .with_setter(|row, value| {
                let ty = ValueType::from_name(&value.to_string()).ok_or_else(|| SheetError::TypeCoercion {
                    raw: value.to_string(),
                    type_name: "type",
                })?;
                column_of(row)?.set_type(ty);
                Ok(())
            }),
        Column::new("fmtstr", |row| {
            Ok(column_of(row)?.fmt().map(Value::Str).unwrap_or(Value::None))
        })
        .with_setter(|row, value| {
            column_of(row)?.set_fmt(Some(value.to_string()));
            Ok(())
        }),
        Column::new("expr", |row| {
            Ok(column_of(row)?.expr().map(Value::Str).unwrap_or(Value::None))
        }),
        Column::new("value", move |row| {
            let col = column_of(row)?;
            let src = value_source
                .try_borrow()
                .map_err(|_| eyre!("source sheet is busy"))?;
            match src.cursor_row() {
                Some(r) => col.get_typed(r).map_err(Into::into),
                None => Ok(Value::None),
            }
        }),
    ];
    Ok(Sheet::new(
        format!("{}_columns", src.name),
        SheetSource::Derived(Derivation::Columns(source.clone())),
    )
    .with_rows(rows)
    .with_columns(columns)
    .with_keys(1)
    .with_commands(column_commands()?))
}

/// Applies `op` to the source column under the cursor of a columns sheet.
pub fn apply_column_op(sheet: &mut Sheet, op: ColumnOp, display: &DisplayConfig) -> Result<()> {
    let SheetSource::Derived(Derivation::Columns(source)) = &sheet.source else {
        return Err(eyre!("not a columns sheet"));
    };
    let source = source.clone();
    let row = sheet.cursor_row().ok_or_else(|| eyre!("no column here"))?;
    let col = column_of(row)?.clone();
    match op {
        ColumnOp::SetType(ty) => {
            col.set_type(ty);
            sheet.cursor_down(1);
        }
        ColumnOp::DetectType => {
            let src = source.borrow();
            let raw = match src.cursor_row() {
                Some(r) => col.get_raw(r)?.to_string(),
                None => String::new(),
            };
            col.set_type(detect_type(&raw));
            drop(src);
            sheet.cursor_down(1);
        }
        ColumnOp::ToggleKey => {
            let mut src = source.borrow_mut();
            let abs = src
                .columns
                .iter()
                .position(|c| c.ptr_eq(&col))
                .ok_or_else(|| eyre!("column is no longer on {}", src.name))?;
            src.toggle_key_column(abs);
            sheet.rows = src.columns.iter().cloned().map(Row::new).collect();
            if let Some(i) = src.columns.iter().position(|c| c.ptr_eq(&col)) {
                sheet.cursor_row_index = i;
            }
        }
        ColumnOp::Hide => col.set_width(Some(0)),
        ColumnOp::Fit => {
            let src = source.borrow();
            col.set_width(Some(col.get_max_width(&src.rows, display).max(1)));
        }
    }
    Ok(())
}

// options, errors, statuses

/// The effective configuration, flattened. Read-only.
pub fn options_sheet(config: &AppConfig) -> Sheet {
    let rows = config
        .flatten()
        .into_iter()
        .map(|(k, v)| Row::fields(vec![Value::Str(k), Value::Str(v)]))
        .collect();
    let read_only = |name: &'static str, i: usize| {
        let field = Column::field(name, i);
        Column::from_getter(name, field.getter()).with_type(ValueType::Str)
    };
    Sheet::new("options", SheetSource::Derived(Derivation::Options))
        .with_rows(rows)
        .with_columns(vec![read_only("option", 0), read_only("value", 1)])
        .with_keys(1)
}

fn record_text(record: &ErrorRecord) -> String {
    let mut lines = vec![format!("{}: {}", record.keys, record.summary)];
    lines.extend(record.chain.iter().cloned());
    lines.join("\n")
}

pub fn last_error_sheet(status: &StatusLog) -> Result<Sheet> {
    let record = status
        .last_error()
        .ok_or_else(|| SheetError::NotFound("no error".into()))?;
    Ok(lines_sheet(
        &record_text(record),
        "last_error",
        SheetSource::Derived(Derivation::LastError),
    ))
}

/// The retained errors, oldest first, separated by blank lines.
pub fn errors_sheet(status: &StatusLog) -> Sheet {
    let text = status
        .errors()
        .map(record_text)
        .collect::<Vec<_>>()
        .join("\n\n");
    lines_sheet(&text, "errors", SheetSource::Derived(Derivation::Errors))
}

/// Status history, most recent first.
pub fn status_sheet(status: &StatusLog) -> Sheet {
    let mut history: Vec<&String> = status.history().collect();
    history.reverse();
    let rows = history
        .into_iter()
        .map(|s| Row::fields(vec![Value::Str(s.clone())]))
        .collect();
    Sheet::new("statuses", SheetSource::Derived(Derivation::StatusHistory))
        .with_rows(rows)
        .with_columns(vec![Column::field("status", 0)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::base_commands;

    fn data() -> SheetRef {
        Sheet::new("data", SheetSource::None)
            .with_rows(vec![
                Row::fields(vec![Value::from("1"), Value::from("2.5")]),
                Row::fields(vec![Value::from("2"), Value::from("x")]),
            ])
            .with_columns(vec![Column::field("id", 0), Column::field("val", 1)])
            .with_keys(1)
            .into_ref()
    }

    #[test]
    fn test_help_lists_global_variant() {
        let global = base_commands().unwrap();
        let help = help_sheet(&data(), &global);
        assert_eq!(help.name, "data_help");
        let display = DisplayConfig::default();
        let q = help
            .rows
            .iter()
            .find(|r| help.columns[0].get_display_value(r, &display) == "q")
            .unwrap();
        assert_eq!(help.columns[1].get_display_value(q, &display), "drop this sheet");
        assert_eq!(
            help.columns[2].get_display_value(q, &display),
            "drop all sheets (clean exit)"
        );
    }

    #[test]
    fn test_columns_sheet_edits_forward() {
        let source = data();
        let cols = columns_sheet(&source).unwrap();
        assert_eq!(cols.name, "data_columns");
        cols.columns[0]
            .set_value(&cols.rows[1], Value::from("amount"), false)
            .unwrap();
        cols.columns[2]
            .set_value(&cols.rows[1], Value::from("float"), false)
            .unwrap();
        let src = source.borrow();
        assert_eq!(src.columns[1].name(), "amount");
        assert_eq!(src.columns[1].value_type(), ValueType::Real);
        let display = DisplayConfig::default();
        drop(src);
        assert_eq!(cols.columns[5].get_display_value(&cols.rows[1], &display), "2.5");
    }

    #[test]
    fn test_column_ops() {
        let source = data();
        let mut cols = columns_sheet(&source).unwrap();
        let display = DisplayConfig::default();
        apply_column_op(&mut cols, ColumnOp::SetType(ValueType::Int), &display).unwrap();
        assert_eq!(cols.cursor_row_index, 1);
        assert_eq!(source.borrow().columns[0].value_type(), ValueType::Int);
        apply_column_op(&mut cols, ColumnOp::DetectType, &display).unwrap();
        assert_eq!(source.borrow().columns[1].value_type(), ValueType::Real);

        cols.cursor_row_index = 1;
        apply_column_op(&mut cols, ColumnOp::ToggleKey, &display).unwrap();
        assert_eq!(source.borrow().n_key_columns, 2);
        apply_column_op(&mut cols, ColumnOp::Hide, &display).unwrap();
        assert!(source.borrow().columns[1].is_hidden());
        apply_column_op(&mut cols, ColumnOp::Fit, &display).unwrap();
        assert_eq!(source.borrow().columns[1].width(), Some(3));
    }

    #[test]
    fn test_stack_sheet_lists_sheets() {
        let display = DisplayConfig::default();
        let sheet = stack_sheet(&[data()], &display).unwrap();
        assert_eq!(sheet.n_rows(), 1);
        assert_eq!(sheet.columns[0].get_display_value(&sheet.rows[0], &display), "data");
        assert_eq!(sheet.columns[4].get_display_value(&sheet.rows[0], &display), "id");
        assert!(sheet
            .commands
            .lookup("", &Keystroke::key('~'))
            .is_some_and(|b| b.command == Command::JoinSelected(JoinKind::Anti)));
    }

    #[test]
    fn test_options_are_read_only() {
        let sheet = options_sheet(&AppConfig::default());
        assert!(sheet.n_rows() > 10);
        assert!(!sheet.columns[1].has_setter());
    }

    #[test]
    fn test_error_sheets() {
        let mut status = StatusLog::new();
        assert!(last_error_sheet(&status).is_err());
        status.error(ErrorRecord {
            keys: "^R".into(),
            summary: "no such file".into(),
            chain: vec!["reading x.csv".into(), "no such file".into()],
        });
        let sheet = last_error_sheet(&status).unwrap();
        assert_eq!(sheet.n_rows(), 3);
        status.status("one");
        status.status("two");
        let statuses = status_sheet(&status);
        let display = DisplayConfig::default();
        assert_eq!(statuses.columns[0].get_display_value(&statuses.rows[0], &display), "two");
    }
}
