//! Sheets: rows, typed columns, a cursor, a selection and local key bindings.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use sheetstack_cli::FileFormat;

use crate::column::Column;
use crate::commands::CommandTable;
use crate::config::DisplayConfig;
use crate::join::JoinKind;
use crate::loaders::json::JsonNode;
use crate::row::{Row, RowId};
use crate::value::CellValue;

pub type SheetRef = Rc<RefCell<Sheet>>;

/// Stable identity of a sheet for caches keyed by sheet.
pub type SheetId = u64;

static NEXT_SHEET_ID: AtomicU64 = AtomicU64::new(1);

/// Where a sheet's rows come from, and so how `reload` rebuilds them.
#[derive(Clone, Default)]
pub enum SheetSource {
    /// Rows were supplied directly and cannot be rebuilt.
    #[default]
    None,
    /// A file or directory, opened by a loader.
    Path {
        path: PathBuf,
        format: Option<FileFormat>,
    },
    /// A node inside a parsed JSON document.
    Json(JsonNode),
    /// One worksheet of a workbook file.
    Worksheet { path: PathBuf, name: String },
    /// Computed from other sheets.
    Derived(Derivation),
}

#[derive(Clone)]
pub enum Derivation {
    Join {
        sources: Vec<SheetRef>,
        kind: JoinKind,
    },
    Frequency {
        source: SheetRef,
        column: Column,
    },
    /// The rows of one frequency bucket, or any other fixed row subset.
    Subset(SheetRef),
    Columns(SheetRef),
    Help(SheetRef),
    SheetStack,
    LastError,
    Errors,
    StatusHistory,
    Options,
}

impl SheetSource {
    pub fn describe(&self) -> String {
        match self {
            SheetSource::None => String::new(),
            SheetSource::Path { path, .. } => path.display().to_string(),
            SheetSource::Json(node) => node.pointer.clone(),
            SheetSource::Worksheet { path, name } => format!("{}:{}", path.display(), name),
            SheetSource::Derived(d) => match d {
                Derivation::Join { sources, kind } => sources
                    .iter()
                    .map(|s| s.borrow().name.clone())
                    .collect::<Vec<_>>()
                    .join(kind.symbol()),
                Derivation::Frequency { source, .. }
                | Derivation::Subset(source)
                | Derivation::Columns(source)
                | Derivation::Help(source) => source.borrow().name.clone(),
                Derivation::SheetStack => "sheets".into(),
                Derivation::LastError => "last error".into(),
                Derivation::Errors => "errors".into(),
                Derivation::StatusHistory => "status".into(),
                Derivation::Options => "options".into(),
            },
        }
    }
}

pub struct Sheet {
    id: SheetId,
    pub name: String,
    pub source: SheetSource,
    pub rows: Vec<Row>,
    pub columns: Vec<Column>,
    /// `columns[..n_key_columns]` form the row key.
    pub n_key_columns: usize,
    pub cursor_row_index: usize,
    /// Index into the visible columns, not into `columns`.
    pub cursor_col_index: usize,
    pub top_row_index: usize,
    /// Index into the visible columns of the leftmost drawn column.
    pub left_col_index: usize,
    selected: HashMap<RowId, Row>,
    /// Bindings consulted before the global table.
    pub commands: CommandTable,
}

impl Sheet {
    pub fn new(name: impl Into<String>, source: SheetSource) -> Self {
        Self {
            id: NEXT_SHEET_ID.fetch_add(1, AtomicOrdering::Relaxed),
            name: name.into(),
            source,
            rows: Vec::new(),
            columns: Vec::new(),
            n_key_columns: 0,
            cursor_row_index: 0,
            cursor_col_index: 0,
            top_row_index: 0,
            left_col_index: 0,
            selected: HashMap::new(),
            commands: CommandTable::default(),
        }
    }

    pub fn with_rows(mut self, rows: Vec<Row>) -> Self {
        self.rows = rows;
        self
    }

    pub fn with_columns(mut self, columns: Vec<Column>) -> Self {
        self.columns = columns;
        self.n_key_columns = self.n_key_columns.min(self.columns.len());
        self
    }

    pub fn with_keys(mut self, n_key_columns: usize) -> Self {
        self.n_key_columns = n_key_columns.min(self.columns.len());
        self
    }

    pub fn with_commands(mut self, commands: CommandTable) -> Self {
        self.commands = commands;
        self
    }

    pub fn into_ref(self) -> SheetRef {
        Rc::new(RefCell::new(self))
    }

    pub fn id(&self) -> SheetId {
        self.id
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    /// A sheet with the same rows, columns and bindings but its own cursor
    /// and selection.
    pub fn copy_as(&self, name: impl Into<String>, source: SheetSource) -> Sheet {
        Sheet::new(name, source)
            .with_rows(self.rows.clone())
            .with_columns(self.columns.clone())
            .with_keys(self.n_key_columns)
            .with_commands(self.commands.clone())
    }

    /// Takes the rows, columns, key count and bindings of a rebuilt copy.
    /// Identity, name, source and cursor stay; the selection is dropped
    /// since none of the new rows can be in it.
    pub fn replace_contents(&mut self, rebuilt: Sheet) {
        self.rows = rebuilt.rows;
        self.columns = rebuilt.columns;
        self.n_key_columns = rebuilt.n_key_columns;
        if !rebuilt.commands.is_empty() {
            self.commands = rebuilt.commands;
        }
        self.selected.clear();
        self.check_cursor();
    }

    // columns

    /// Absolute indices of the columns that are not hidden.
    pub fn visible_indices(&self) -> Vec<usize> {
        self.columns
            .iter()
            .enumerate()
            .filter(|(_, c)| !c.is_hidden())
            .map(|(i, _)| i)
            .collect()
    }

    pub fn visible_columns(&self) -> Vec<Column> {
        self.columns
            .iter()
            .filter(|c| !c.is_hidden())
            .cloned()
            .collect()
    }

    pub fn n_visible(&self) -> usize {
        self.columns.iter().filter(|c| !c.is_hidden()).count()
    }

    pub fn key_columns(&self) -> &[Column] {
        &self.columns[..self.n_key_columns]
    }

    pub fn is_key(&self, abs_index: usize) -> bool {
        abs_index < self.n_key_columns
    }

    /// Absolute index of the column under the cursor.
    pub fn cursor_col_abs(&self) -> Option<usize> {
        self.visible_indices().get(self.cursor_col_index).copied()
    }

    pub fn cursor_column(&self) -> Option<Column> {
        self.cursor_col_abs().map(|i| self.columns[i].clone())
    }

    pub fn column_by_name(&self, name: &str) -> Option<(usize, Column)> {
        self.columns
            .iter()
            .enumerate()
            .find(|(_, c)| c.name() == name)
            .map(|(i, c)| (i, c.clone()))
    }

    /// Inserts after the cursor column and moves the cursor onto it.
    pub fn add_column_after_cursor(&mut self, column: Column) {
        let at = self.cursor_col_abs().map(|i| i + 1).unwrap_or(self.columns.len());
        let at = at.max(self.n_key_columns);
        self.columns.insert(at, column);
        if let Some(vis) = self.visible_indices().iter().position(|&i| i == at) {
            self.cursor_col_index = vis;
        }
    }

    pub fn hide_cursor_column(&mut self) {
        if let Some(col) = self.cursor_column() {
            col.set_width(Some(0));
        }
        self.check_cursor();
    }

    /// Moves a column across the key boundary, keeping the cursor on it.
    pub fn toggle_key_column(&mut self, abs_index: usize) {
        if abs_index >= self.columns.len() {
            return;
        }
        let to = if abs_index < self.n_key_columns {
            self.n_key_columns -= 1;
            self.n_key_columns
        } else {
            self.n_key_columns += 1;
            self.n_key_columns - 1
        };
        let col = self.columns.remove(abs_index);
        self.columns.insert(to, col);
        if let Some(vis) = self.visible_indices().iter().position(|&i| i == to) {
            self.cursor_col_index = vis;
        }
    }

    /// Relocates a visible column to another visible position; the cursor
    /// follows the moved column.
    pub fn move_visible_col(&mut self, from_vis: usize, to_vis: usize) {
        let vis = self.visible_indices();
        let (Some(&from), Some(&to)) = (vis.get(from_vis), vis.get(to_vis.min(vis.len().saturating_sub(1)))) else {
            return;
        };
        let col = self.columns.remove(from);
        self.columns.insert(to, col);
        if let Some(v) = self.visible_indices().iter().position(|&i| i == to) {
            self.cursor_col_index = v;
        }
    }

    // rows

    pub fn cursor_row(&self) -> Option<&Row> {
        self.rows.get(self.cursor_row_index)
    }

    pub fn cursor_down(&mut self, delta: isize) {
        let max = self.rows.len().saturating_sub(1) as isize;
        self.cursor_row_index = (self.cursor_row_index as isize + delta).clamp(0, max) as usize;
    }

    pub fn cursor_right(&mut self, delta: isize) {
        let max = self.n_visible().saturating_sub(1) as isize;
        self.cursor_col_index = (self.cursor_col_index as isize + delta).clamp(0, max) as usize;
    }

    /// Relocates a row; the cursor follows it.
    pub fn move_row(&mut self, from: usize, to: usize) {
        if from >= self.rows.len() {
            return;
        }
        let to = to.min(self.rows.len() - 1);
        let row = self.rows.remove(from);
        self.rows.insert(to, row);
        self.cursor_row_index = to;
    }

    pub fn delete_row(&mut self, index: usize) -> Option<Row> {
        if index >= self.rows.len() {
            return None;
        }
        let row = self.rows.remove(index);
        self.selected.remove(&row.id());
        self.check_cursor();
        Some(row)
    }

    /// Removes every selected row; returns how many were deleted.
    pub fn delete_selected(&mut self) -> usize {
        let before = self.rows.len();
        let selected = std::mem::take(&mut self.selected);
        self.rows.retain(|r| !selected.contains_key(&r.id()));
        self.check_cursor();
        before - self.rows.len()
    }

    /// Clamps both cursors into range after a structural change.
    pub fn check_cursor(&mut self) {
        self.cursor_row_index = self.cursor_row_index.min(self.rows.len().saturating_sub(1));
        self.cursor_col_index = self.cursor_col_index.min(self.n_visible().saturating_sub(1));
        self.left_col_index = self.left_col_index.min(self.cursor_col_index);
    }

    /// Adjusts the top row so the cursor row is within `body_rows`.
    pub fn scroll_to_cursor(&mut self, body_rows: usize) {
        let body_rows = body_rows.max(1);
        if self.cursor_row_index < self.top_row_index {
            self.top_row_index = self.cursor_row_index;
        } else if self.cursor_row_index >= self.top_row_index + body_rows {
            self.top_row_index = self.cursor_row_index + 1 - body_rows;
        }
        self.top_row_index = self.top_row_index.min(self.rows.len().saturating_sub(1));
    }

    /// Stable sort by a column. Valued cells come first in the requested
    /// order; empty, wrong-type and failed cells stay at the end.
    pub fn sort_by_column(&mut self, abs_index: usize, descending: bool) {
        let Some(col) = self.columns.get(abs_index).cloned() else {
            return;
        };
        let cursor_row = self.cursor_row().map(Row::id);
        let mut keyed: Vec<(CellValue, Row)> = self
            .rows
            .drain(..)
            .map(|r| (col.get_value(&r), r))
            .collect();
        keyed.sort_by(|(a, _), (b, _)| {
            a.rank().cmp(&b.rank()).then_with(|| match (a, b) {
                (CellValue::Ok(x), CellValue::Ok(y)) => {
                    let ord = x.compare(y);
                    if descending {
                        ord.reverse()
                    } else {
                        ord
                    }
                }
                _ => Ordering::Equal,
            })
        });
        self.rows = keyed.into_iter().map(|(_, r)| r).collect();
        if let Some(id) = cursor_row {
            if let Some(i) = self.rows.iter().position(|r| r.id() == id) {
                self.cursor_row_index = i;
            }
        }
    }

    /// Index of the nearest row, in direction `step`, whose display value in
    /// the cursor column differs from the cursor row's.
    pub fn skip_to_different(&self, step: isize, display: &DisplayConfig) -> Option<usize> {
        let col = self.cursor_column()?;
        let current = col.get_display_value(self.cursor_row()?, display);
        let mut i = self.cursor_row_index as isize + step;
        while i >= 0 && (i as usize) < self.rows.len() {
            if col.get_display_value(&self.rows[i as usize], display) != current {
                return Some(i as usize);
            }
            i += step;
        }
        None
    }

    // selection

    pub fn is_selected(&self, row: &Row) -> bool {
        self.selected.contains_key(&row.id())
    }

    pub fn n_selected(&self) -> usize {
        self.selected.len()
    }

    pub fn select<'a>(&mut self, rows: impl IntoIterator<Item = &'a Row>) {
        for r in rows {
            self.selected.insert(r.id(), r.clone());
        }
    }

    pub fn unselect<'a>(&mut self, rows: impl IntoIterator<Item = &'a Row>) {
        for r in rows {
            self.selected.remove(&r.id());
        }
    }

    pub fn toggle<'a>(&mut self, rows: impl IntoIterator<Item = &'a Row>) {
        for r in rows {
            if self.selected.remove(&r.id()).is_none() {
                self.selected.insert(r.id(), r.clone());
            }
        }
    }

    pub fn unselect_all(&mut self) {
        self.selected.clear();
    }

    /// Selected rows still on this sheet, in sheet order.
    pub fn selected_rows(&self) -> Vec<Row> {
        self.rows
            .iter()
            .filter(|r| self.selected.contains_key(&r.id()))
            .cloned()
            .collect()
    }

    pub fn all_rows(&self) -> Vec<Row> {
        self.rows.clone()
    }
}
