//! Frequency tables: a source sheet's rows grouped by one column's value.

use std::collections::HashMap;

use color_eyre::Result;
use crossterm::event::KeyCode;
use tracing::info;

use crate::column::Column;
use crate::commands::{Command, CommandTable, SelectOp};
use crate::config::DisplayConfig;
use crate::keys::Keystroke;
use crate::row::Row;
use crate::sheet::{Derivation, Sheet, SheetRef, SheetSource};
use crate::value::{CellValue, Value, ValueType};

/// One distinct value and the source rows holding it.
#[derive(Debug, Clone)]
pub struct FreqBucket {
    pub value: Value,
    pub text: String,
    pub rows: Vec<Row>,
}

impl FreqBucket {
    pub fn count(&self) -> usize {
        self.rows.len()
    }
}

/// Groups `rows` by the text of `column`'s value. Buckets come out by count,
/// largest first; equal counts keep first-seen order.
pub fn buckets(rows: &[Row], column: &Column) -> Vec<FreqBucket> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut out: Vec<FreqBucket> = Vec::new();
    for row in rows {
        let cell = column.get_value(row);
        let text = cell.to_string();
        let at = *index.entry(text.clone()).or_insert_with(|| {
            let value = match &cell {
                CellValue::Ok(v) => v.clone(),
                _ => Value::Str(text.clone()),
            };
            out.push(FreqBucket {
                value,
                text,
                rows: Vec::new(),
            });
            out.len() - 1
        });
        out[at].rows.push(row.clone());
    }
    out.sort_by(|a, b| b.count().cmp(&a.count()));
    out
}

pub fn freq_commands() -> Result<CommandTable> {
    CommandTable::new()
        .command(Keystroke::key(' '), Command::BucketSelection(SelectOp::Toggle), "toggle these entries in source sheet")
        .command(Keystroke::key('s'), Command::BucketSelection(SelectOp::Select), "select these entries in source sheet")
        .command(Keystroke::key('u'), Command::BucketSelection(SelectOp::Unselect), "unselect these entries in source sheet")
        .command(Keystroke::code(KeyCode::Enter), Command::DrillBucket, "open sheet of source rows with this value")
        .build()
}

fn bucket_column(name: impl Into<String>, f: impl Fn(&FreqBucket) -> Value + 'static) -> Column {
    Column::new(name, move |row| Ok(f(row.get::<FreqBucket>()?)))
}

/// The frequency sheet of `column` over `source`'s rows.
pub fn frequency_sheet(source: &SheetRef, column: &Column, display: &DisplayConfig) -> Result<Sheet> {
    let src = source.borrow();
    let total = src.n_rows();
    let groups = buckets(&src.rows, column);
    let largest = groups.first().map(FreqBucket::count).unwrap_or(0).max(1);
    let glyph = display.histogram.clone();
    let width = display.histogram_width;

    let columns = vec![
        bucket_column(column.name(), |b| b.value.clone())
            .with_type(column.value_type())
            .with_fmt(column.fmt()),
        bucket_column("num", |b| Value::Int(b.count() as i64)).with_type(ValueType::Int),
        bucket_column("percent", move |b| {
            Value::Real(if total == 0 {
                0.0
            } else {
                b.count() as f64 * 100.0 / total as f64
            })
        })
        .with_type(ValueType::Real)
        .with_fmt(Some("%.2f".into())),
        bucket_column("histogram", move |b| {
            Value::Str(glyph.repeat(b.count() * width / largest))
        })
        .with_type(ValueType::Str),
    ];

    info!(sheet = %src.name, column = %column.name(), buckets = groups.len(), "built frequency table");
    let name = format!("{}_{}_freq", src.name, column.name());
    let derivation = Derivation::Frequency {
        source: source.clone(),
        column: column.clone(),
    };
    drop(src);
    Ok(Sheet::new(name, SheetSource::Derived(derivation))
        .with_rows(groups.into_iter().map(Row::new).collect())
        .with_columns(columns)
        .with_keys(1)
        .with_commands(freq_commands()?))
}

/// A copy of `source` limited to one bucket's rows.
pub fn drill_down(source: &SheetRef, bucket: &FreqBucket) -> Sheet {
    let src = source.borrow();
    let name = format!("{}_{}", src.name, bucket.text);
    let mut sheet = src.copy_as(name, SheetSource::Derived(Derivation::Subset(source.clone())));
    sheet.rows = bucket.rows.clone();
    sheet
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(vals: &[&str]) -> Vec<Row> {
        vals.iter().map(|v| Row::fields(vec![Value::from(*v)])).collect()
    }

    #[test]
    fn test_buckets_sorted_stable() {
        let rows = rows(&["b", "a", "c", "a", "b", "d"]);
        let groups = buckets(&rows, &Column::field("x", 0));
        let texts: Vec<_> = groups.iter().map(|g| (g.text.as_str(), g.count())).collect();
        assert_eq!(texts, [("b", 2), ("a", 2), ("c", 1), ("d", 1)]);
    }

    #[test]
    fn test_bucket_rows_are_shared() {
        let rows = rows(&["a", "a"]);
        let groups = buckets(&rows, &Column::field("x", 0));
        assert!(groups[0].rows[1].ptr_eq(&rows[1]));
    }
}
