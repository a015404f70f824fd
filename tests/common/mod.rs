#![allow(dead_code)]

use std::path::{Path, PathBuf};

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use sheetstack::config::{AppConfig, DisplayConfig};
use sheetstack::{App, AppEvent, CacheManager, Column, Row, Sheet, SheetRef, SheetSource, Value};
use tempfile::TempDir;

/// An app whose cache lives in a scratch directory.
pub fn test_app(config: AppConfig) -> (TempDir, App) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let cache = CacheManager::with_dir(dir.path().join("cache"));
    let mut app = App::new(config, cache).unwrap();
    app.event(&AppEvent::Resize(80, 24));
    (dir, app)
}

pub fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

pub fn send(app: &mut App, code: KeyCode, modifiers: KeyModifiers) -> Option<AppEvent> {
    app.event(&AppEvent::Key(KeyEvent::new(code, modifiers)))
}

/// Presses each character of `keys` in turn; returns the last event the
/// app asked for.
pub fn press(app: &mut App, keys: &str) -> Option<AppEvent> {
    let mut last = None;
    for c in keys.chars() {
        last = send(app, KeyCode::Char(c), KeyModifiers::NONE);
    }
    last
}

pub fn ctrl(app: &mut App, c: char) -> Option<AppEvent> {
    send(app, KeyCode::Char(c), KeyModifiers::CONTROL)
}

pub fn enter(app: &mut App) -> Option<AppEvent> {
    send(app, KeyCode::Enter, KeyModifiers::NONE)
}

/// Runs a prompt command: `keys` opens it, `text` is typed, Enter submits.
pub fn prompt(app: &mut App, keys: &str, text: &str) -> Option<AppEvent> {
    press(app, keys);
    assert!(app.prompt().is_some(), "{keys} did not open a prompt");
    press(app, text);
    enter(app)
}

pub fn last_status(app: &App) -> String {
    app.status_log().history().last().cloned().unwrap_or_default()
}

/// A sheet of text fields; the first column is the key.
pub fn fields_sheet(name: &str, header: &[&str], rows: &[&[&str]]) -> Sheet {
    let rows = rows
        .iter()
        .map(|r| Row::fields(r.iter().map(|v| Value::from(*v)).collect()))
        .collect();
    let columns = header
        .iter()
        .enumerate()
        .map(|(i, name)| Column::field(*name, i))
        .collect();
    Sheet::new(name, SheetSource::None)
        .with_rows(rows)
        .with_columns(columns)
        .with_keys(1)
}

/// Display strings of the visible columns, row by row.
pub fn cells(sheet: &SheetRef) -> Vec<Vec<String>> {
    let display = DisplayConfig::default();
    let sheet = sheet.borrow();
    let columns = sheet.visible_columns();
    sheet
        .rows
        .iter()
        .map(|r| columns.iter().map(|c| c.get_display_value(r, &display)).collect())
        .collect()
}

pub fn head_cells(app: &App) -> Vec<Vec<String>> {
    cells(&app.head().unwrap())
}

pub fn head_name(app: &App) -> String {
    app.head().unwrap().borrow().name.clone()
}

pub fn cursor_row(app: &App) -> usize {
    app.head().unwrap().borrow().cursor_row_index
}
