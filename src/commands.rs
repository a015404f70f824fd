//! Key bindings.
//!
//! Every binding maps `(prefix, keystroke)` to a [`Command`], a closed set of
//! operations whose arguments are checked when the table is built.
//! Sheets carry their own table which is consulted before the global one.

use std::collections::HashMap;

use color_eyre::eyre::eyre;
use color_eyre::Result;
use crossterm::event::KeyCode;

use crate::join::JoinKind;
use crate::keys::{keyname, Keystroke};
use crate::value::ValueType;

/// The only prefix key.
pub const GLOBAL_PREFIX: char = 'g';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectOp {
    Toggle,
    Select,
    Unselect,
}

/// Which rows a selection command applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowScope {
    Cursor,
    All,
}

/// Which columns a search looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnScope {
    Cursor,
    Visible,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollTarget {
    Top,
    Middle,
    Bottom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    First,
    Last,
}

/// Operations on the source sheet's column under the columns-sheet cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnOp {
    SetType(ValueType),
    DetectType,
    ToggleKey,
    Hide,
    Fit,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Prefix(char),

    // sheet stack
    OpenHelp,
    PopSheet,
    ClearSheets,
    SwapSheets,
    CycleSheets(isize),
    OpenSheetStack,
    OpenColumns,
    OpenOptions,
    OpenLastError,
    OpenAllErrors,
    OpenStatusHistory,

    // status
    ShowSheetInfo,
    ShowPreviousStatus,
    ShowVersion,
    ToggleDebug,
    AbortWithLastError,

    // cursor
    CursorDown(isize),
    CursorRight(isize),
    Page(isize),
    GotoRow(Edge),
    GotoColumn(Edge),
    ScrollCursor(ScrollTarget),
    SkipToDifferent(isize),
    PromptGotoRow,
    PromptGotoColumn,

    // reordering
    MoveRow(isize),
    MoveRowTo(Edge),
    MoveColumn(isize),
    MoveColumnTo(Edge),

    // columns
    FitColumn { all: bool },
    HideColumn,
    RenameFromCell { all: bool },
    ToggleKeyColumn,
    SetType(ValueType),
    DetectType { all: bool },
    Sort { descending: bool },
    PromptExprColumn,
    PromptRegexColumn,
    FrequencyTable,

    // rows
    DeleteRow,
    DeleteSelected,
    DuplicateRow,
    EditCell,
    Selection(SelectOp, RowScope),
    PromptSelectByRegex { op: SelectOp, scope: ColumnScope },

    // search
    PromptSearch { backward: bool, scope: ColumnScope },
    SearchNext { backward: bool },
    SearchExtreme(Edge),

    // sources
    Reload,
    PromptSave,
    PromptOpen,
    PromptSourceType,

    // sheet-local
    Dive,
    JumpToSheet,
    JoinSelected(JoinKind),
    SourceColumn(ColumnOp),
    BucketSelection(SelectOp),
    DrillBucket,
}

impl Command {
    /// Rejects arguments that can never do anything.
    pub fn validate(&self) -> Result<()> {
        match self {
            Command::CursorDown(0)
            | Command::CursorRight(0)
            | Command::Page(0)
            | Command::CycleSheets(0)
            | Command::MoveRow(0)
            | Command::MoveColumn(0)
            | Command::SkipToDifferent(0) => Err(eyre!("{:?} moves nowhere", self)),
            Command::Prefix(c) if *c != GLOBAL_PREFIX => {
                Err(eyre!("unsupported prefix {:?}", c))
            }
            Command::PromptSelectByRegex {
                op: SelectOp::Toggle,
                ..
            } => Err(eyre!("regex selection cannot toggle")),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Binding {
    pub command: Command,
    pub help: &'static str,
}

#[derive(Debug, Clone, Default)]
pub struct CommandTable {
    bindings: HashMap<(String, Keystroke), Binding>,
    invalid: Vec<String>,
}

impl CommandTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn bind(mut self, prefix: &str, key: Keystroke, command: Command, help: &'static str) -> Self {
        if let Err(e) = command.validate() {
            self.invalid.push(format!("{}{}: {}", prefix, keyname(&key), e));
        }
        self.bindings
            .insert((prefix.to_string(), key), Binding { command, help });
        self
    }

    pub fn command(self, key: Keystroke, command: Command, help: &'static str) -> Self {
        self.bind("", key, command, help)
    }

    pub fn global_command(self, key: Keystroke, command: Command, help: &'static str) -> Self {
        self.bind(&GLOBAL_PREFIX.to_string(), key, command, help)
    }

    /// Fails on the first binding whose arguments did not validate.
    pub fn build(self) -> Result<Self> {
        match self.invalid.first() {
            Some(msg) => Err(eyre!("invalid key binding {}", msg)),
            None => Ok(self),
        }
    }

    pub fn lookup(&self, prefix: &str, key: &Keystroke) -> Option<&Binding> {
        self.bindings.get(&(prefix.to_string(), *key))
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Bindings sorted by key name, prefix-free ones first.
    pub fn entries(&self) -> Vec<(String, Keystroke, &Binding)> {
        let mut out: Vec<_> = self
            .bindings
            .iter()
            .map(|((prefix, key), b)| (prefix.clone(), *key, b))
            .collect();
        out.sort_by(|a, b| (&a.0, keyname(&a.1)).cmp(&(&b.0, keyname(&b.1))));
        out
    }
}

/// Bindings available on every sheet.
pub fn base_commands() -> Result<CommandTable> {
    use Command as C;
    let key = Keystroke::key;
    let ctrl = Keystroke::ctrl;
    let code = Keystroke::code;

    CommandTable::new()
        .command(code(KeyCode::F(1)), C::OpenHelp, "open help sheet")
        .command(key('q'), C::PopSheet, "drop this sheet")
        .command(code(KeyCode::Left), C::CursorRight(-1), "go one column left")
        .command(code(KeyCode::Down), C::CursorDown(1), "go one row down")
        .command(code(KeyCode::Up), C::CursorDown(-1), "go one row up")
        .command(code(KeyCode::Right), C::CursorRight(1), "go one column right")
        .command(code(KeyCode::PageDown), C::Page(1), "scroll one page down")
        .command(code(KeyCode::PageUp), C::Page(-1), "scroll one page up")
        .command(code(KeyCode::Home), C::GotoRow(Edge::First), "go to top row")
        .command(code(KeyCode::End), C::GotoRow(Edge::Last), "go to last row")
        .command(key('h'), C::CursorRight(-1), "go one column left")
        .command(key('j'), C::CursorDown(1), "go one row down")
        .command(key('k'), C::CursorDown(-1), "go one row up")
        .command(key('l'), C::CursorRight(1), "go one column right")
        .command(key('H'), C::MoveColumn(-1), "move this column one left")
        .command(key('J'), C::MoveRow(1), "move this row one down")
        .command(key('K'), C::MoveRow(-1), "move this row one up")
        .command(key('L'), C::MoveColumn(1), "move this column one right")
        .command(ctrl('g'), C::ShowSheetInfo, "show this sheet info")
        .command(ctrl('p'), C::ShowPreviousStatus, "show previous status line again")
        .command(ctrl('v'), C::ShowVersion, "show version information")
        .command(key('t'), C::ScrollCursor(ScrollTarget::Top), "scroll cursor row to top of screen")
        .command(key('m'), C::ScrollCursor(ScrollTarget::Middle), "scroll cursor row to middle of screen")
        .command(key('b'), C::ScrollCursor(ScrollTarget::Bottom), "scroll cursor row to bottom of screen")
        .command(key('<'), C::SkipToDifferent(-1), "skip up this column to previous value")
        .command(key('>'), C::SkipToDifferent(1), "skip down this column to next value")
        .command(key('_'), C::FitColumn { all: false }, "set this column width to fit visible cells")
        .command(key('-'), C::HideColumn, "hide this column")
        .command(key('^'), C::RenameFromCell { all: false }, "set this column header to this cell value")
        .command(key('!'), C::ToggleKeyColumn, "toggle this column as a key column")
        .command(key('@'), C::SetType(ValueType::Date), "set column type to ISO8601 datetime")
        .command(key('#'), C::SetType(ValueType::Int), "set column type to integer")
        .command(key('$'), C::SetType(ValueType::Str), "set column type to string")
        .command(key('%'), C::SetType(ValueType::Real), "set column type to float")
        .command(key('~'), C::DetectType { all: false }, "autodetect type of column by its data")
        .command(key('['), C::Sort { descending: false }, "sort by this column ascending")
        .command(key(']'), C::Sort { descending: true }, "sort by this column descending")
        .command(ctrl('e'), C::AbortWithLastError, "abort and print last error to terminal")
        .command(ctrl('d'), C::ToggleDebug, "toggle debug mode")
        .command(key('E'), C::OpenLastError, "open stack trace for most recent error")
        .command(key('F'), C::FrequencyTable, "open frequency table from values in this column")
        .command(key('d'), C::DeleteRow, "delete this row")
        .command(key(GLOBAL_PREFIX), C::Prefix(GLOBAL_PREFIX), "add global prefix")
        .command(key('S'), C::OpenSheetStack, "open Sheet stack")
        .command(key('C'), C::OpenColumns, "open Columns for this sheet")
        .command(key('O'), C::OpenOptions, "open Options")
        .command(key('/'), C::PromptSearch { backward: false, scope: ColumnScope::Cursor }, "search this column forward for regex")
        .command(key('?'), C::PromptSearch { backward: true, scope: ColumnScope::Cursor }, "search this column backward for regex")
        .command(key('n'), C::SearchNext { backward: false }, "go to next match")
        .command(key('p'), C::SearchNext { backward: true }, "go to previous match")
        .command(key(' '), C::Selection(SelectOp::Toggle, RowScope::Cursor), "toggle select of this row")
        .command(key('s'), C::Selection(SelectOp::Select, RowScope::Cursor), "select this row")
        .command(key('u'), C::Selection(SelectOp::Unselect, RowScope::Cursor), "unselect this row")
        .command(key('|'), C::PromptSelectByRegex { op: SelectOp::Select, scope: ColumnScope::Cursor }, "select rows by regex in this column")
        .command(key('\\'), C::PromptSelectByRegex { op: SelectOp::Unselect, scope: ColumnScope::Cursor }, "unselect rows by regex in this column")
        .command(key('R'), C::PromptSourceType, "set source type of this sheet")
        .command(ctrl('r'), C::Reload, "reload sheet from source")
        .command(ctrl('s'), C::PromptSave, "save this sheet to new file")
        .command(key('o'), C::PromptOpen, "open local file or directory")
        .command(key('e'), C::EditCell, "edit this cell")
        .command(key('c'), C::PromptGotoColumn, "goto visible column by name")
        .command(key('r'), C::PromptGotoRow, "goto row number")
        .command(key('='), C::PromptExprColumn, "add column by expr")
        .command(key(':'), C::PromptRegexColumn, "add column by regex")
        .command(ctrl('^'), C::SwapSheets, "jump to previous sheet")
        .command(code(KeyCode::Tab), C::CycleSheets(1), "cycle through sheet stack")
        .command(code(KeyCode::BackTab), C::CycleSheets(-1), "reverse cycle through sheet stack")
        .command(key('"'), C::DuplicateRow, "insert duplicate of this row")
        .global_command(key('q'), C::ClearSheets, "drop all sheets (clean exit)")
        .global_command(key('h'), C::GotoColumn(Edge::First), "go to leftmost column")
        .global_command(key('k'), C::GotoRow(Edge::First), "go to top row")
        .global_command(key('j'), C::GotoRow(Edge::Last), "go to bottom row")
        .global_command(key('l'), C::GotoColumn(Edge::Last), "go to rightmost column")
        .global_command(code(KeyCode::Left), C::GotoColumn(Edge::First), "go to leftmost column")
        .global_command(code(KeyCode::Up), C::GotoRow(Edge::First), "go to top row")
        .global_command(code(KeyCode::Down), C::GotoRow(Edge::Last), "go to bottom row")
        .global_command(code(KeyCode::Right), C::GotoColumn(Edge::Last), "go to rightmost column")
        .global_command(key('H'), C::MoveColumnTo(Edge::First), "move this column all the way to the left")
        .global_command(key('J'), C::MoveRowTo(Edge::Last), "move this row all the way to the bottom")
        .global_command(key('K'), C::MoveRowTo(Edge::First), "move this row all the way to the top")
        .global_command(key('L'), C::MoveColumnTo(Edge::Last), "move this column all the way to the right")
        .global_command(key('_'), C::FitColumn { all: true }, "set width of all columns to fit visible cells")
        .global_command(key('^'), C::RenameFromCell { all: true }, "set names of all visible columns to this row")
        .global_command(key('~'), C::DetectType { all: true }, "autodetect types of all visible columns by their data")
        .global_command(key('E'), C::OpenAllErrors, "open last 10 errors")
        .global_command(key('/'), C::PromptSearch { backward: false, scope: ColumnScope::Visible }, "search regex forward in all visible columns")
        .global_command(key('?'), C::PromptSearch { backward: true, scope: ColumnScope::Visible }, "search regex backward in all visible columns")
        .global_command(key('n'), C::SearchExtreme(Edge::First), "go to first match")
        .global_command(key('p'), C::SearchExtreme(Edge::Last), "go to last match")
        .global_command(key(' '), C::Selection(SelectOp::Toggle, RowScope::All), "toggle select of all rows")
        .global_command(key('s'), C::Selection(SelectOp::Select, RowScope::All), "select all rows")
        .global_command(key('u'), C::Selection(SelectOp::Unselect, RowScope::All), "unselect all rows")
        .global_command(key('|'), C::PromptSelectByRegex { op: SelectOp::Select, scope: ColumnScope::Visible }, "select rows by regex in all visible columns")
        .global_command(key('\\'), C::PromptSelectByRegex { op: SelectOp::Unselect, scope: ColumnScope::Visible }, "unselect rows by regex in all visible columns")
        .global_command(key('d'), C::DeleteSelected, "delete all selected rows")
        .global_command(ctrl('p'), C::OpenStatusHistory, "open last 100 statuses")
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_commands_build() {
        let table = base_commands().unwrap();
        let q = table.lookup("", &Keystroke::key('q')).unwrap();
        assert_eq!(q.command, Command::PopSheet);
        let gq = table.lookup("g", &Keystroke::key('q')).unwrap();
        assert_eq!(gq.command, Command::ClearSheets);
        assert!(table.lookup("g", &Keystroke::key('z')).is_none());
    }

    #[test]
    fn test_invalid_arguments_rejected_at_build() {
        let err = CommandTable::new()
            .command(Keystroke::key('x'), Command::CursorDown(0), "nothing")
            .build();
        assert!(err.is_err());
        let err = CommandTable::new()
            .command(Keystroke::key('x'), Command::Prefix('z'), "two-level prefix")
            .build();
        assert!(err.is_err());
    }

    #[test]
    fn test_entries_sorted_prefix_free_first() {
        let table = base_commands().unwrap();
        let entries = table.entries();
        assert_eq!(entries.len(), table.len());
        let first_global = entries.iter().position(|(p, _, _)| p == "g").unwrap();
        assert!(entries[..first_global].iter().all(|(p, _, _)| p.is_empty()));
    }
}
