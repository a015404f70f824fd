//! Keyed joins across sheets.
//!
//! Each source contributes a map from key to row. When a source has several
//! rows with the same key, the last one is used. The output has one row per
//! distinct key, in the order keys were first seen walking the sources in
//! order, filtered by the join kind.

use std::collections::HashMap;

use color_eyre::eyre::eyre;
use color_eyre::Result;
use tracing::info;

use crate::column::Column;
use crate::row::Row;
use crate::sheet::{Derivation, Sheet, SheetRef, SheetSource};
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoinKind {
    /// `&`: every source has the key.
    Inner,
    /// `+`: the first source has the key.
    LeftOuter,
    /// `*`: any source has the key.
    Full,
    /// `~`: some source lacks the key.
    Anti,
}

impl JoinKind {
    pub const ALL: [JoinKind; 4] = [JoinKind::Inner, JoinKind::LeftOuter, JoinKind::Full, JoinKind::Anti];

    pub fn symbol(&self) -> &'static str {
        match self {
            JoinKind::Inner => "&",
            JoinKind::LeftOuter => "+",
            JoinKind::Full => "*",
            JoinKind::Anti => "~",
        }
    }

    pub fn from_symbol(c: char) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.symbol().starts_with(c))
    }

    fn keeps(&self, slots: &[Option<Row>]) -> bool {
        match self {
            JoinKind::Inner => slots.iter().all(Option::is_some),
            JoinKind::LeftOuter => slots.first().is_some_and(Option::is_some),
            JoinKind::Full => true,
            JoinKind::Anti => !slots.iter().all(Option::is_some),
        }
    }
}

/// One output row: the key, then each source's row for that key.
#[derive(Debug, Clone)]
pub struct CombinedRow {
    pub key: Vec<Value>,
    pub slots: Vec<Option<Row>>,
}

impl CombinedRow {
    pub fn slot(&self, index: usize) -> Option<&Row> {
        self.slots.get(index).and_then(Option::as_ref)
    }
}

/// Canonical text of a key. Keys from different sources match when their
/// cells print the same.
fn key_text(row: &Row, key_columns: &[Column]) -> (String, Vec<Value>) {
    let mut text = String::new();
    let mut values = Vec::with_capacity(key_columns.len());
    for (i, col) in key_columns.iter().enumerate() {
        let cell = col.get_value(row);
        if i > 0 {
            text.push('\u{1f}');
        }
        text.push_str(&cell.to_string());
        values.push(cell.value().cloned().unwrap_or_else(|| Value::Str(cell.to_string())));
    }
    (text, values)
}

/// Combined rows for every key seen in any source, unfiltered.
pub fn combine(sources: &[SheetRef]) -> Result<Vec<CombinedRow>> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut combined: Vec<CombinedRow> = Vec::new();
    for (s, source) in sources.iter().enumerate() {
        let sheet = source.borrow();
        if sheet.n_key_columns == 0 {
            return Err(eyre!("sheet {} has no key columns", sheet.name));
        }
        let keys = sheet.key_columns();
        for row in &sheet.rows {
            let (text, values) = key_text(row, keys);
            let at = *index.entry(text).or_insert_with(|| {
                combined.push(CombinedRow {
                    key: values,
                    slots: vec![None; sources.len()],
                });
                combined.len() - 1
            });
            combined[at].slots[s] = Some(row.clone());
        }
    }
    Ok(combined)
}

/// Key column `i` of the joined sheet.
fn key_column(source: &Column, i: usize) -> Column {
    Column::new(source.name(), move |row| {
        let combined = row.get::<CombinedRow>()?;
        Ok(combined.key.get(i).cloned().unwrap_or(Value::None))
    })
    .with_type(source.value_type())
    .with_width(source.width())
    .with_fmt(source.fmt())
}

/// A non-key column of source `slot`, reading through to that source's row.
fn slot_column(source: &Column, slot: usize, sheet_name: &str) -> Column {
    let getter = source.getter();
    let col = Column::new(source.name(), move |row| {
        let combined = row.get::<CombinedRow>()?;
        match combined.slot(slot) {
            Some(r) => getter(r),
            None => Ok(Value::None),
        }
    })
    .with_type(source.value_type())
    .with_width(source.width())
    .with_fmt(source.fmt());
    if !source.has_setter() {
        return col;
    }
    let target = source.clone();
    let sheet_name = sheet_name.to_string();
    col.with_setter(move |row, value| {
        let combined = row.get::<CombinedRow>()?;
        let r = combined
            .slot(slot)
            .ok_or_else(|| eyre!("{} has no row for this key", sheet_name))?;
        target.set_value(r, value, false)
    })
}

/// Builds the joined sheet. Needs at least two sources, each with at
/// least one key column.
pub fn join_sheets(sources: &[SheetRef], kind: JoinKind) -> Result<Sheet> {
    if sources.len() < 2 {
        return Err(eyre!("join requires at least two sheets"));
    }
    let combined = combine(sources)?;
    let n_keys = combined.len();

    let first = sources[0].borrow();
    let mut columns: Vec<Column> = first
        .key_columns()
        .iter()
        .enumerate()
        .map(|(i, c)| key_column(c, i))
        .collect();
    let n_key_columns = columns.len();
    drop(first);

    let mut names = Vec::with_capacity(sources.len());
    for (slot, source) in sources.iter().enumerate() {
        let sheet = source.borrow();
        names.push(sheet.name.clone());
        columns.extend(
            sheet.columns[sheet.n_key_columns..]
                .iter()
                .map(|c| slot_column(c, slot, &sheet.name)),
        );
    }

    let rows: Vec<Row> = combined
        .into_iter()
        .filter(|c| kind.keeps(&c.slots))
        .map(Row::new)
        .collect();
    info!(kind = kind.symbol(), sources = sources.len(), keys = n_keys, rows = rows.len(), "joined sheets");

    let source = SheetSource::Derived(Derivation::Join {
        sources: sources.to_vec(),
        kind,
    });
    Ok(Sheet::new(names.join(kind.symbol()), source)
        .with_rows(rows)
        .with_columns(columns)
        .with_keys(n_key_columns))
}
