//! sheetstack: a stack of navigable sheets for tabular data in the terminal.
//!
//! [`App`] owns the sheet stack, the configuration and every cache. The
//! binary feeds it [`AppEvent`]s one at a time and draws it after each one.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::{Report, Result};
use crossterm::event::{KeyEvent, KeyEventKind, MouseButton, MouseEvent, MouseEventKind};
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    widgets::Widget,
};
use tracing::{debug, info, warn};

use sheetstack_cli::{Args, FileFormat};

pub mod cache;
pub mod column;
pub mod commands;
pub mod config;
pub mod error;
pub mod error_display;
pub mod expr;
pub mod frequency;
pub mod join;
pub mod keys;
pub mod loaders;
pub mod logging;
pub mod meta;
pub mod row;
pub mod savers;
pub mod search;
pub mod sheet;
pub mod stack;
pub mod status;
pub mod value;
pub mod viewport;
pub mod widgets;

pub use cache::CacheManager;
pub use column::Column;
pub use config::{AppConfig, ConfigManager, Theme};
pub use error::SheetError;
pub use row::Row;
pub use sheet::{Sheet, SheetRef, SheetSource};
pub use stack::SheetStack;
pub use value::{Value, ValueType};

use commands::{Binding, Command, ColumnScope, CommandTable, Edge, RowScope, ScrollTarget, SelectOp};
use frequency::FreqBucket;
use keys::{keyname, Keystroke};
use loaders::{LoadContext, SourceCache};
use search::LastSearch;
use sheet::{Derivation, SheetId};
use status::{ErrorRecord, StatusLog};
use viewport::Viewport;
use widgets::debug::DebugState;
use widgets::prompt::{Prompt, PromptEvent};
use widgets::sheet_view::{SheetView, StatusBar};

pub const APP_NAME: &str = "sheetstack";

#[derive(Debug, Clone)]
pub enum AppEvent {
    Key(KeyEvent),
    Mouse(MouseEvent),
    Resize(u16, u16), // resized (width, height)
    Exit,
    /// A failure escaped while debug mode was on; carries the full report.
    Crash(String),
}

/// How a command ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Done,
    /// The key was a prefix; keep it and wait for the next one.
    Prefix(char),
}

/// What a submitted prompt does with its text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PromptAction {
    Search { backward: bool, scope: ColumnScope },
    SelectByRegex { op: SelectOp, scope: ColumnScope },
    EditCell,
    GotoColumn,
    GotoRow,
    ExprColumn,
    RegexColumn,
    Open,
    Save,
    SourceType,
}

struct PendingPrompt {
    prompt: Prompt,
    action: PromptAction,
    /// Keys of the command that opened the prompt, for error reports.
    keys: String,
    help: &'static str,
}

/// Applies command-line overrides on top of the loaded configuration.
pub fn apply_args(config: &mut AppConfig, args: &Args) {
    if let Some(delimiter) = args.delimiter {
        config.loading.delimiter = delimiter;
    }
    if let Some(quote_char) = args.quote_char {
        config.loading.quote_char = quote_char;
    }
    if args.no_header {
        config.loading.header = false;
    }
    if let Some(encoding) = &args.encoding {
        config.loading.encoding = encoding.clone();
    }
    if args.readonly {
        config.behavior.readonly = true;
    }
    if args.debug {
        config.debug.enabled = true;
    }
}

fn no_row() -> Report {
    SheetError::NotFound("no row under the cursor".into()).into()
}

fn no_column() -> Report {
    SheetError::NotFound("no visible column".into()).into()
}

fn edge_index(edge: Edge, len: usize) -> usize {
    match edge {
        Edge::First => 0,
        Edge::Last => len.saturating_sub(1),
    }
}

/// `from + delta`, kept inside `0..len`.
fn offset(from: usize, delta: isize, len: usize) -> usize {
    let max = len.saturating_sub(1) as isize;
    (from as isize + delta).clamp(0, max) as usize
}

fn search_columns(sheet: &Sheet, scope: ColumnScope) -> Vec<Column> {
    match scope {
        ColumnScope::Cursor => sheet.cursor_column().into_iter().collect(),
        ColumnScope::Visible => sheet.visible_columns(),
    }
}

/// The source sheet and cursor bucket of a frequency table.
fn freq_cursor(sheet: &Sheet) -> Result<(SheetRef, FreqBucket)> {
    let SheetSource::Derived(Derivation::Frequency { source, .. }) = &sheet.source else {
        return Err(eyre!("{} is not a frequency table", sheet.name));
    };
    let bucket = sheet.cursor_row().ok_or_else(no_row)?.get::<FreqBucket>()?.clone();
    Ok((source.clone(), bucket))
}

pub struct App {
    config: AppConfig,
    theme: Theme,
    cache: CacheManager,
    sources: SourceCache,
    stack: SheetStack,
    status: StatusLog,
    global: CommandTable,
    help_sheets: HashMap<SheetId, SheetRef>,
    last_search: Option<LastSearch>,
    pending: Option<PendingPrompt>,
    prefix: String,
    last_keys: String,
    screen: (u16, u16),
    pub debug: DebugState,
}

impl App {
    pub fn new(config: AppConfig, cache: CacheManager) -> Result<Self> {
        let theme = Theme::from_config(&config.theme)?;
        let global = commands::base_commands()?;
        let debug = DebugState {
            enabled: config.debug.enabled,
            ..Default::default()
        };
        Ok(Self {
            config,
            theme,
            cache,
            sources: SourceCache::new(),
            stack: SheetStack::new(),
            status: StatusLog::new(),
            global,
            help_sheets: HashMap::new(),
            last_search: None,
            pending: None,
            prefix: String::new(),
            last_keys: String::new(),
            screen: (80, 24),
            debug,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn stack(&self) -> &SheetStack {
        &self.stack
    }

    pub fn status_log(&self) -> &StatusLog {
        &self.status
    }

    pub fn head(&self) -> Option<SheetRef> {
        self.stack.head()
    }

    /// The prompt waiting for input, if any.
    pub fn prompt(&self) -> Option<&Prompt> {
        self.pending.as_ref().map(|p| &p.prompt)
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn push_sheet(&mut self, sheet: Sheet) -> SheetRef {
        let sheet = sheet.into_ref();
        self.stack.push(sheet.clone());
        sheet
    }

    /// Opens `path` and makes it the active sheet.
    pub fn open(&mut self, path: &Path, format: Option<FileFormat>) -> Result<SheetRef> {
        let sheet = loaders::open_source(path, format, &mut self.load_context())?;
        Ok(self.push_sheet(sheet))
    }

    fn load_context(&mut self) -> LoadContext<'_> {
        LoadContext {
            config: &self.config.loading,
            cache: &mut self.sources,
        }
    }

    fn set_debug(&mut self, enabled: bool) {
        self.config.debug.enabled = enabled;
        self.debug.enabled = enabled;
    }

    /// Screen lines available to the sheet and the status line.
    fn sheet_height(&self) -> usize {
        let debug_rows = usize::from(self.config.debug.enabled);
        (self.screen.1 as usize).saturating_sub(debug_rows)
    }

    fn body_rows(&self) -> usize {
        viewport::body_rows(self.sheet_height())
    }

    fn visible_rows(&self, sheet: &Sheet) -> Vec<Row> {
        let window = viewport::row_window(sheet.top_row_index, self.body_rows(), sheet.n_rows());
        sheet.rows[window].to_vec()
    }

    fn clamp_head(&mut self) {
        let Some(head) = self.stack.head() else {
            return;
        };
        let width = self.screen.0 as usize;
        let height = self.sheet_height();
        if let Ok(mut sheet) = head.try_borrow_mut() {
            viewport::clamp(&mut sheet, width, height, &self.config.display);
        };
    }

    pub fn event(&mut self, event: &AppEvent) -> Option<AppEvent> {
        self.debug.num_events += 1;
        let next = match event {
            AppEvent::Key(key) if key.kind != KeyEventKind::Release => self.key(key),
            AppEvent::Key(_) => None,
            AppEvent::Mouse(mouse) => {
                self.mouse(mouse);
                None
            }
            AppEvent::Resize(width, height) => {
                self.screen = (*width, *height);
                None
            }
            AppEvent::Exit | AppEvent::Crash(_) => None,
        };
        if next.is_some() {
            return next;
        }
        if self.stack.is_empty() {
            return Some(AppEvent::Exit);
        }
        self.clamp_head();
        None
    }

    fn key(&mut self, event: &KeyEvent) -> Option<AppEvent> {
        let stroke = Keystroke::from(event);
        self.debug.on_key(&stroke);
        if self.pending.is_some() {
            return self.prompt_key(event);
        }
        self.last_keys = format!("{}{}", self.prefix, keyname(&stroke));
        let Some(head) = self.stack.head() else {
            return Some(AppEvent::Exit);
        };

        let local = head.borrow().commands.lookup(&self.prefix, &stroke).cloned();
        let Some(binding) = local.or_else(|| self.global.lookup(&self.prefix, &stroke).cloned()) else {
            let err = SheetError::CommandLookup {
                key: keyname(&stroke),
                prefix: std::mem::take(&mut self.prefix),
            };
            debug!(%err);
            self.status.status(err.to_string());
            return None;
        };

        self.debug.last_command = format!("{:?}", binding.command);
        let keys = self.last_keys.clone();
        match self.execute(&head, &binding) {
            Ok(Outcome::Prefix(c)) => {
                self.prefix.push(c);
                None
            }
            Ok(Outcome::Done) => {
                self.prefix.clear();
                None
            }
            Err(report) => {
                self.prefix.clear();
                self.fail(&keys, binding.help, report)
            }
        }
    }

    /// Contains a command failure: typed misses become a status message,
    /// everything else also goes to the error history. In debug mode the
    /// failure ends the session instead.
    fn fail(&mut self, keys: &str, help: &str, report: Report) -> Option<AppEvent> {
        let typed = report.chain().find_map(|c| c.downcast_ref::<SheetError>());
        if let Some(SheetError::Cancelled(_) | SheetError::NotFound(_) | SheetError::ReadOnly(_)) = typed {
            self.status.status(error_display::status_line(&report));
            return None;
        }
        if self.config.debug.enabled {
            return Some(AppEvent::Crash(format!("{report:?}")));
        }
        let summary = error_display::status_line(&report);
        warn!(keys, error = %summary, "command failed");
        self.status.error(ErrorRecord {
            keys: keys.to_string(),
            summary: summary.clone(),
            chain: error_display::full_chain(&report),
        });
        self.status.status(format!("{help}: {summary}"));
        None
    }

    fn mouse(&mut self, mouse: &MouseEvent) {
        let result = match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => self.click_row(mouse.row),
            MouseEventKind::ScrollDown => self.with_head(|s| s.cursor_down(1)),
            MouseEventKind::ScrollUp => self.with_head(|s| s.cursor_down(-1)),
            _ => Ok(()),
        };
        if let Err(report) = result {
            let summary = error_display::status_line(&report);
            debug!(error = %summary, "pointer event failed");
            self.status.error(ErrorRecord {
                keys: "click".into(),
                summary,
                chain: error_display::full_chain(&report),
            });
        }
    }

    fn with_head(&mut self, f: impl FnOnce(&mut Sheet)) -> Result<()> {
        let head = self.stack.head().ok_or_else(|| eyre!("no sheet"))?;
        let mut sheet = head.try_borrow_mut().map_err(|_| eyre!("sheet is busy"))?;
        f(&mut sheet);
        Ok(())
    }

    /// Moves the cursor to the row drawn on screen line `y`.
    fn click_row(&mut self, y: u16) -> Result<()> {
        if y == 0 {
            return Ok(());
        }
        let line = (y - 1) as usize;
        let body = self.body_rows();
        let head = self.stack.head().ok_or_else(|| eyre!("no sheet"))?;
        let mut sheet = head.try_borrow_mut().map_err(|_| eyre!("sheet is busy"))?;
        let index = sheet.top_row_index + line;
        if line >= body || index >= sheet.n_rows() {
            return Err(SheetError::NotFound(format!("no row on screen line {y}")).into());
        }
        sheet.cursor_row_index = index;
        Ok(())
    }

    fn execute(&mut self, head: &SheetRef, binding: &Binding) -> Result<Outcome> {
        use Command as C;
        match &binding.command {
            C::Prefix(c) => return Ok(Outcome::Prefix(*c)),

            C::OpenHelp => {
                let id = head.borrow().id();
                let help = match self.help_sheets.get(&id) {
                    Some(sheet) => sheet.clone(),
                    None => {
                        let sheet = meta::help_sheet(head, &self.global).into_ref();
                        self.help_sheets.insert(id, sheet.clone());
                        sheet
                    }
                };
                self.stack.push(help);
            }
            C::PopSheet => {
                self.stack.pop();
            }
            C::ClearSheets => self.stack.clear(),
            C::SwapSheets => self.stack.swap(),
            C::CycleSheets(n) => self.stack.cycle(*n),
            C::OpenSheetStack => {
                let sheets: Vec<SheetRef> = self.stack.iter().cloned().collect();
                let sheet = meta::stack_sheet(&sheets, &self.config.display)?;
                self.push_sheet(sheet);
            }
            C::OpenColumns => {
                let sheet = meta::columns_sheet(head)?;
                self.push_sheet(sheet);
            }
            C::OpenOptions => {
                let sheet = meta::options_sheet(&self.config);
                self.push_sheet(sheet);
            }
            C::OpenLastError => {
                let sheet = meta::last_error_sheet(&self.status)?;
                self.push_sheet(sheet);
            }
            C::OpenAllErrors => {
                let sheet = meta::errors_sheet(&self.status);
                self.push_sheet(sheet);
            }
            C::OpenStatusHistory => {
                let sheet = meta::status_sheet(&self.status);
                self.push_sheet(sheet);
            }

            C::ShowSheetInfo => {
                let info = {
                    let sheet = head.borrow();
                    format!(
                        "{}: {} rows, {} columns, {} selected, source {}",
                        sheet.name,
                        sheet.n_rows(),
                        sheet.columns.len(),
                        sheet.n_selected(),
                        sheet.source.describe(),
                    )
                };
                self.status.status(info);
            }
            C::ShowPreviousStatus => {
                let previous = self
                    .status
                    .previous()
                    .cloned()
                    .ok_or_else(|| SheetError::NotFound("no previous status".into()))?;
                self.status.status(previous);
            }
            C::ShowVersion => {
                self.status.status(format!("{} {}", APP_NAME, env!("CARGO_PKG_VERSION")));
            }
            C::ToggleDebug => {
                let enabled = !self.config.debug.enabled;
                self.set_debug(enabled);
                self.status.status(format!("debug {}", if enabled { "ON" } else { "OFF" }));
            }
            C::AbortWithLastError => {
                let record = self
                    .status
                    .last_error()
                    .cloned()
                    .ok_or_else(|| SheetError::NotFound("no error".into()))?;
                self.set_debug(true);
                return Err(eyre!(
                    "{}: {}\n{}",
                    record.keys,
                    record.summary,
                    record.chain.join("\n")
                ));
            }

            C::PromptGotoRow => self.open_prompt(binding, PromptAction::GotoRow, "goto row number: ", Some("goto"), None),
            C::PromptGotoColumn => {
                self.open_prompt(binding, PromptAction::GotoColumn, "goto column name: ", Some("goto"), None)
            }
            C::PromptExprColumn => {
                self.open_prompt(binding, PromptAction::ExprColumn, "new column expr=", Some("expr"), None)
            }
            C::PromptRegexColumn => {
                self.open_prompt(binding, PromptAction::RegexColumn, "new column regex:", Some("regex_column"), None)
            }
            C::PromptSearch { backward, scope } => {
                let label = if *backward { "?" } else { "/" };
                let action = PromptAction::Search {
                    backward: *backward,
                    scope: *scope,
                };
                self.open_prompt(binding, action, label, Some("search"), None)
            }
            C::PromptSelectByRegex { op, scope } => {
                let label = if *op == SelectOp::Unselect { "\\" } else { "|" };
                let action = PromptAction::SelectByRegex { op: *op, scope: *scope };
                self.open_prompt(binding, action, label, Some("regex_select"), None)
            }
            C::PromptOpen => self.open_prompt(binding, PromptAction::Open, "open: ", Some("open"), None),
            C::PromptSave => {
                let suggested = format!("{}.tsv", head.borrow().name);
                self.open_prompt(binding, PromptAction::Save, "save to: ", Some("save"), Some(suggested))
            }
            C::PromptSourceType => {
                let current = match &head.borrow().source {
                    SheetSource::Path { format, .. } => format.map(|f| f.extension()).unwrap_or_default(),
                    _ => return Err(eyre!("only sheets opened from a file have a source type")),
                };
                self.open_prompt(binding, PromptAction::SourceType, "change type to: ", None, Some(current.to_string()))
            }
            C::EditCell => {
                let (label, current) = {
                    let sheet = head.borrow();
                    let row = sheet.cursor_row().ok_or_else(no_row)?;
                    let col = sheet.cursor_column().ok_or_else(no_column)?;
                    if self.config.behavior.readonly {
                        return Err(SheetError::readonly_mode().into());
                    }
                    if !col.has_setter() {
                        return Err(SheetError::no_setter().into());
                    }
                    let current = col.get_raw(row).map(|v| v.to_string()).unwrap_or_default();
                    (format!("{}: ", col.name()), current)
                };
                self.open_prompt(binding, PromptAction::EditCell, &label, None, Some(current))
            }

            C::FrequencyTable => {
                let column = head.borrow().cursor_column().ok_or_else(no_column)?;
                let sheet = frequency::frequency_sheet(head, &column, &self.config.display)?;
                self.push_sheet(sheet);
            }
            C::Reload => self.reload(head)?,
            C::Dive => {
                let child = {
                    let sheet = head.borrow();
                    let mut ctx = LoadContext {
                        config: &self.config.loading,
                        cache: &mut self.sources,
                    };
                    loaders::dive(&sheet, &mut ctx)?
                };
                self.push_sheet(child);
            }
            C::JumpToSheet => {
                let target = meta::listed(head.borrow().cursor_row().ok_or_else(no_row)?)?;
                self.stack.pop();
                self.stack.push(target);
            }
            C::JoinSelected(kind) => {
                let sources = head
                    .borrow()
                    .selected_rows()
                    .iter()
                    .map(meta::listed)
                    .collect::<Result<Vec<_>>>()?;
                if sources.len() < 2 {
                    return Err(eyre!("select at least two sheets to join"));
                }
                let joined = join::join_sheets(&sources, *kind)?;
                self.stack.replace_head(joined.into_ref());
            }
            C::DrillBucket => {
                let (source, bucket) = freq_cursor(&head.borrow())?;
                let sheet = frequency::drill_down(&source, &bucket);
                self.push_sheet(sheet);
            }

            other => {
                let message = {
                    let mut sheet = head.try_borrow_mut().map_err(|_| eyre!("sheet is busy"))?;
                    self.sheet_command(&mut sheet, other)?
                };
                if let Some(message) = message {
                    self.status.status(message);
                }
            }
        }
        Ok(Outcome::Done)
    }

    /// Commands that only touch the active sheet. May return a status
    /// message.
    fn sheet_command(&self, sheet: &mut Sheet, command: &Command) -> Result<Option<String>> {
        use Command as C;
        let display = &self.config.display;
        match command {
            C::CursorDown(n) => sheet.cursor_down(*n),
            C::CursorRight(n) => sheet.cursor_right(*n),
            C::Page(n) => {
                let step = n * self.body_rows() as isize;
                sheet.cursor_down(step);
                sheet.top_row_index = (sheet.top_row_index as isize + step).max(0) as usize;
            }
            C::GotoRow(edge) => sheet.cursor_row_index = edge_index(*edge, sheet.n_rows()),
            C::GotoColumn(edge) => {
                sheet.cursor_col_index = edge_index(*edge, sheet.n_visible());
                if *edge == Edge::First {
                    sheet.left_col_index = 0;
                }
            }
            C::ScrollCursor(target) => {
                let body = self.body_rows();
                let cursor = sheet.cursor_row_index;
                sheet.top_row_index = match target {
                    ScrollTarget::Top => cursor,
                    ScrollTarget::Middle => cursor.saturating_sub(body / 2),
                    ScrollTarget::Bottom => (cursor + 1).saturating_sub(body),
                };
            }
            C::SkipToDifferent(step) => {
                sheet.cursor_row_index = sheet
                    .skip_to_different(*step, display)
                    .ok_or_else(|| SheetError::NotFound("no different value in this column".into()))?;
            }

            C::MoveRow(delta) => {
                let from = sheet.cursor_row_index;
                sheet.move_row(from, offset(from, *delta, sheet.n_rows()));
            }
            C::MoveRowTo(edge) => {
                let from = sheet.cursor_row_index;
                sheet.move_row(from, edge_index(*edge, sheet.n_rows()));
            }
            C::MoveColumn(delta) => {
                let from = sheet.cursor_col_index;
                sheet.move_visible_col(from, offset(from, *delta, sheet.n_visible()));
            }
            C::MoveColumnTo(edge) => {
                let from = sheet.cursor_col_index;
                sheet.move_visible_col(from, edge_index(*edge, sheet.n_visible()));
            }

            C::FitColumn { all } => {
                let rows = self.visible_rows(sheet);
                let columns = if *all {
                    sheet.visible_columns()
                } else {
                    vec![sheet.cursor_column().ok_or_else(no_column)?]
                };
                for col in columns {
                    col.set_width(Some(col.get_max_width(&rows, display).max(1)));
                }
            }
            C::HideColumn => sheet.hide_cursor_column(),
            C::RenameFromCell { all } => {
                let row = sheet.cursor_row().cloned().ok_or_else(no_row)?;
                let columns = if *all {
                    sheet.visible_columns()
                } else {
                    vec![sheet.cursor_column().ok_or_else(no_column)?]
                };
                for col in columns {
                    col.set_name(col.get_display_value(&row, display));
                }
            }
            C::ToggleKeyColumn => {
                let abs = sheet.cursor_col_abs().ok_or_else(no_column)?;
                sheet.toggle_key_column(abs);
            }
            C::SetType(value_type) => sheet.cursor_column().ok_or_else(no_column)?.set_type(*value_type),
            C::DetectType { all } => {
                let row = sheet.cursor_row().cloned().ok_or_else(no_row)?;
                let columns = if *all {
                    sheet.visible_columns()
                } else {
                    vec![sheet.cursor_column().ok_or_else(no_column)?]
                };
                for col in columns {
                    let raw = col.get_raw(&row).map(|v| v.to_string()).unwrap_or_default();
                    col.set_type(value::detect_type(&raw));
                }
            }
            C::Sort { descending } => {
                let abs = sheet.cursor_col_abs().ok_or_else(no_column)?;
                sheet.sort_by_column(abs, *descending);
            }

            C::DeleteRow => {
                let index = sheet.cursor_row_index;
                sheet.delete_row(index).ok_or_else(no_row)?;
            }
            C::DeleteSelected => {
                let n = sheet.delete_selected();
                return Ok(Some(format!("deleted {n} rows")));
            }
            C::DuplicateRow => {
                let row = sheet.cursor_row().ok_or_else(no_row)?;
                let fields = row
                    .as_fields()
                    .ok_or_else(|| eyre!("only rows of plain fields can be duplicated"))?
                    .borrow()
                    .clone();
                let index = sheet.cursor_row_index;
                sheet.rows.insert(index, Row::fields(fields));
            }
            C::Selection(op, scope) => {
                let rows = match scope {
                    RowScope::Cursor => sheet.cursor_row().cloned().into_iter().collect(),
                    RowScope::All => sheet.all_rows(),
                };
                match (op, scope) {
                    (SelectOp::Unselect, RowScope::All) => sheet.unselect_all(),
                    (SelectOp::Toggle, _) => sheet.toggle(&rows),
                    (SelectOp::Select, _) => sheet.select(&rows),
                    (SelectOp::Unselect, _) => sheet.unselect(&rows),
                }
                if *scope == RowScope::Cursor {
                    sheet.cursor_down(1);
                }
            }

            C::SearchNext { backward } => self.search_next(sheet, *backward)?,
            C::SearchExtreme(edge) => {
                let last = self.last_search()?;
                let columns = search_columns(sheet, last.scope);
                let hits = search::find_all(&sheet.rows, &columns, &last.regex, display);
                let hit = match edge {
                    Edge::First => hits.first(),
                    Edge::Last => hits.last(),
                };
                sheet.cursor_row_index = *hit.ok_or_else(|| SheetError::NotFound(format!("no match for /{}/", last.regex)))?;
            }

            C::SourceColumn(op) => meta::apply_column_op(sheet, *op, display)?,
            C::BucketSelection(op) => {
                let (source, bucket) = freq_cursor(sheet)?;
                {
                    let mut source = source.try_borrow_mut().map_err(|_| eyre!("source sheet is busy"))?;
                    match op {
                        SelectOp::Toggle => source.toggle(&bucket.rows),
                        SelectOp::Select => source.select(&bucket.rows),
                        SelectOp::Unselect => source.unselect(&bucket.rows),
                    }
                }
                sheet.cursor_down(1);
            }

            other => return Err(eyre!("{:?} cannot run on a single sheet", other)),
        }
        Ok(None)
    }

    fn last_search(&self) -> Result<&LastSearch> {
        self.last_search
            .as_ref()
            .ok_or_else(|| SheetError::NotFound("no previous search".into()).into())
    }

    /// Repeats the last search; `reverse` flips its direction.
    fn search_next(&self, sheet: &mut Sheet, reverse: bool) -> Result<()> {
        let last = self.last_search()?;
        let columns = search_columns(sheet, last.scope);
        let backward = last.backward != reverse;
        let found = search::find_next(
            &sheet.rows,
            &columns,
            &last.regex,
            sheet.cursor_row_index,
            backward,
            &self.config.display,
        );
        sheet.cursor_row_index = found.ok_or_else(|| SheetError::NotFound(format!("no match for /{}/", last.regex)))?;
        Ok(())
    }

    fn open_prompt(
        &mut self,
        binding: &Binding,
        action: PromptAction,
        label: &str,
        history: Option<&'static str>,
        value: Option<String>,
    ) {
        let mut prompt = Prompt::new(label);
        if let Some(history_id) = history {
            prompt = prompt.with_history(history_id, &self.cache);
        }
        if let Some(value) = value {
            prompt = prompt.with_value(value);
        }
        self.pending = Some(PendingPrompt {
            prompt,
            action,
            keys: self.last_keys.clone(),
            help: binding.help,
        });
    }

    fn prompt_key(&mut self, event: &KeyEvent) -> Option<AppEvent> {
        let pending = self.pending.as_mut()?;
        match pending.prompt.handle_key(event, &self.cache) {
            PromptEvent::None => None,
            PromptEvent::Cancel(key) => {
                let pending = self.pending.take()?;
                let cancelled = SheetError::Cancelled(format!("cancelled by {key}"));
                self.fail(&pending.keys, pending.help, cancelled.into())
            }
            PromptEvent::Submit(text) => {
                let pending = self.pending.take()?;
                match self.submit(pending.action, &text) {
                    Ok(()) => None,
                    Err(report) => self.fail(&pending.keys, pending.help, report),
                }
            }
        }
    }

    fn submit(&mut self, action: PromptAction, text: &str) -> Result<()> {
        let head = self.stack.head().ok_or_else(|| eyre!("no sheet"))?;
        match action {
            PromptAction::Search { backward, scope } => {
                let regex = search::compile(text)?;
                self.last_search = Some(LastSearch { regex, scope, backward });
                let mut sheet = head.borrow_mut();
                self.search_next(&mut sheet, false)?;
            }
            PromptAction::SelectByRegex { op, scope } => {
                let regex = search::compile(text)?;
                let n = {
                    let mut sheet = head.borrow_mut();
                    let columns = search_columns(&sheet, scope);
                    let rows: Vec<Row> = search::find_all(&sheet.rows, &columns, &regex, &self.config.display)
                        .into_iter()
                        .map(|i| sheet.rows[i].clone())
                        .collect();
                    match op {
                        SelectOp::Unselect => sheet.unselect(&rows),
                        _ => sheet.select(&rows),
                    }
                    rows.len()
                };
                let verb = if op == SelectOp::Unselect { "unselected" } else { "selected" };
                self.status.status(format!("{verb} {n} rows"));
            }
            PromptAction::EditCell => {
                let (row, col) = {
                    let sheet = head.borrow();
                    let row = sheet.cursor_row().cloned().ok_or_else(no_row)?;
                    (row, sheet.cursor_column().ok_or_else(no_column)?)
                };
                col.set_value(&row, Value::from(text), self.config.behavior.readonly)?;
            }
            PromptAction::GotoColumn => {
                let mut sheet = head.borrow_mut();
                sheet.cursor_col_index = sheet
                    .visible_columns()
                    .iter()
                    .position(|c| c.name() == text)
                    .ok_or_else(|| SheetError::NotFound(format!("no column named {text:?}")))?;
            }
            PromptAction::GotoRow => {
                let n: usize = text
                    .trim()
                    .parse()
                    .wrap_err_with(|| format!("not a row number: {text:?}"))?;
                let mut sheet = head.borrow_mut();
                if n >= sheet.n_rows() {
                    return Err(SheetError::NotFound(format!("no row {n}")).into());
                }
                sheet.cursor_row_index = n;
            }
            PromptAction::ExprColumn => {
                let mut sheet = head.borrow_mut();
                let column = expr::expr_column(text, &sheet.columns)?;
                sheet.add_column_after_cursor(column);
            }
            PromptAction::RegexColumn => {
                let regex = search::compile(text)?;
                let mut sheet = head.borrow_mut();
                let source = sheet.cursor_column().ok_or_else(no_column)?;
                sheet.add_column_after_cursor(expr::regex_column(&source, regex, &self.config.display));
            }
            PromptAction::Open => {
                let text = text.trim();
                if text.is_empty() {
                    return Err(SheetError::Cancelled("nothing to open".into()).into());
                }
                self.open(&PathBuf::from(text), None)?;
            }
            PromptAction::Save => {
                let path = PathBuf::from(text.trim());
                savers::save_sheet(&head.borrow(), &path, &self.config)?;
                self.status.status(format!("saved to {}", path.display()));
            }
            PromptAction::SourceType => {
                let format = FileFormat::from_extension(text.trim())
                    .ok_or_else(|| eyre!("unknown source type {:?}", text.trim()))?;
                if let SheetSource::Path { format: current, .. } = &mut head.borrow_mut().source {
                    *current = Some(format);
                }
                self.reload(&head)?;
            }
        }
        Ok(())
    }

    /// Recomputes `head` from its source and swaps the result in, keeping
    /// the sheet's identity and name.
    fn reload(&mut self, head: &SheetRef) -> Result<()> {
        let (name, source) = {
            let sheet = head.borrow();
            (sheet.name.clone(), sheet.source.clone())
        };
        let rebuilt = match &source {
            SheetSource::Derived(derivation) => self.rebuild(head, derivation)?,
            other => loaders::reload_source(other, &mut self.load_context())?
                .ok_or_else(|| eyre!("{name} has no source to reload"))?,
        };
        head.borrow_mut().replace_contents(rebuilt);
        info!(sheet = %name, source = %source.describe(), "reloaded sheet");
        self.status.status(format!("reloaded {name}"));
        Ok(())
    }

    fn rebuild(&self, head: &SheetRef, derivation: &Derivation) -> Result<Sheet> {
        let display = &self.config.display;
        Ok(match derivation {
            Derivation::Join { sources, kind } => join::join_sheets(sources, *kind)?,
            Derivation::Frequency { source, column } => frequency::frequency_sheet(source, column, display)?,
            Derivation::Columns(source) => meta::columns_sheet(source)?,
            Derivation::Help(source) => meta::help_sheet(source, &self.global),
            Derivation::SheetStack => {
                let others: Vec<SheetRef> = self
                    .stack
                    .iter()
                    .filter(|s| !Rc::ptr_eq(s, head))
                    .cloned()
                    .collect();
                meta::stack_sheet(&others, display)?
            }
            Derivation::LastError => meta::last_error_sheet(&self.status)?,
            Derivation::Errors => meta::errors_sheet(&self.status),
            Derivation::StatusHistory => meta::status_sheet(&self.status),
            Derivation::Options => meta::options_sheet(&self.config),
            Derivation::Subset(_) => {
                return Err(eyre!("{} is a fixed set of rows and cannot be reloaded", head.borrow().name));
            }
        })
    }
}

impl Widget for &mut App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        self.debug.num_frames += 1;
        self.screen = (area.width, area.height);

        let debug_rows = u16::from(self.config.debug.enabled);
        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Fill(1),
                Constraint::Length(debug_rows),
                Constraint::Length(1),
            ])
            .split(area);
        let (sheet_area, debug_area, status_area) = (layout[0], layout[1], layout[2]);

        let mut name = String::new();
        if let Some(head) = self.stack.head() {
            match head.try_borrow_mut() {
                Ok(mut sheet) => {
                    // the viewport height counts the status line
                    let width = sheet_area.width as usize;
                    let height = sheet_area.height as usize + 1;
                    viewport::clamp(&mut sheet, width, height, &self.config.display);
                    let viewport = Viewport::compute(&sheet, width, height, &self.config.display);
                    SheetView::new(&sheet, &viewport, &self.config.display, &self.theme).render(sheet_area, buf);
                    name = sheet.name.clone();
                }
                Err(e) => {
                    warn!(error = %e, "could not draw the active sheet");
                    self.status.error(ErrorRecord {
                        keys: String::new(),
                        summary: "active sheet is busy".into(),
                        chain: vec![e.to_string()],
                    });
                }
            }
        }

        if debug_rows > 0 {
            Widget::render(&self.debug, debug_area, buf);
        }

        let style = self.theme.get("status_line");
        if let Some(pending) = &self.pending {
            buf.set_style(status_area, style);
            Widget::render(&pending.prompt, status_area, buf);
        } else {
            let mut left = self.config.display.sheet_name_fmt.replace("{}", &name);
            left.push_str(&self.status.take_pending(&self.config.display.status_sep));
            StatusBar {
                left: &left,
                right: &self.last_keys,
                style,
            }
            .render(status_area, buf);
        }
    }
}
