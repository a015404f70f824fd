//! Directory listings.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use chrono::DateTime;
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use crossterm::event::KeyCode;
use sheetstack_cli::FileFormat;

use crate::column::Column;
use crate::commands::{Command, CommandTable};
use crate::keys::Keystroke;
use crate::row::Row;
use crate::sheet::{Sheet, SheetSource};
use crate::value::{Value, ValueType};

/// One listed path. `..` is the parent directory.
#[derive(Debug, Clone)]
pub struct DirEntry {
    pub name: String,
    pub path: PathBuf,
}

fn entry(row: &Row) -> Result<&DirEntry> {
    row.get::<DirEntry>()
}

fn metadata(row: &Row) -> Result<fs::Metadata> {
    let e = entry(row)?;
    fs::metadata(&e.path).wrap_err_with(|| format!("stat {}", e.path.display()))
}

pub fn directory_commands() -> Result<CommandTable> {
    CommandTable::new()
        .command(Keystroke::code(KeyCode::Enter), Command::Dive, "open this file or directory")
        .build()
}

/// Child entries sorted by name, after a `..` entry.
pub fn list_entries(dir: &Path) -> Result<Vec<DirEntry>> {
    let mut entries: Vec<DirEntry> = fs::read_dir(dir)
        .wrap_err_with(|| format!("listing {}", dir.display()))?
        .filter_map(|e| e.ok())
        .map(|e| DirEntry {
            name: e.file_name().to_string_lossy().into_owned(),
            path: e.path(),
        })
        .collect();
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    let parent = dir
        .canonicalize()
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| dir.join(".."));
    entries.insert(
        0,
        DirEntry {
            name: "..".into(),
            path: parent,
        },
    );
    Ok(entries)
}

pub fn open_directory(dir: &Path) -> Result<Sheet> {
    let rows = list_entries(dir)?.into_iter().map(Row::new).collect();
    let columns = vec![
        Column::new("filename", |row| Ok(Value::Str(entry(row)?.name.clone()))),
        Column::new("type", |row| {
            let e = entry(row)?;
            Ok(Value::Str(if e.path.is_dir() {
                "dir".into()
            } else {
                e.path
                    .extension()
                    .map(|x| x.to_string_lossy().into_owned())
                    .unwrap_or_default()
            }))
        }),
        Column::new("size", |row| Ok(Value::Int(metadata(row)?.len() as i64))).with_type(ValueType::Int),
        Column::new("mtime", |row| {
            let modified = metadata(row)?.modified()?;
            let secs = modified.duration_since(UNIX_EPOCH)?.as_secs() as i64;
            Ok(DateTime::from_timestamp(secs, 0)
                .map(|d| Value::Date(d.naive_utc()))
                .unwrap_or(Value::Int(secs)))
        })
        .with_type(ValueType::Date),
    ];
    let name = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| dir.display().to_string());
    Ok(Sheet::new(
        name,
        SheetSource::Path {
            path: dir.to_path_buf(),
            format: Some(FileFormat::Dir),
        },
    )
    .with_rows(rows)
    .with_columns(columns)
    .with_keys(1)
    .with_commands(directory_commands()?))
}
