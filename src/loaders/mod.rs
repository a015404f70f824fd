//! Turning a locator into a sheet.
//!
//! The format comes from `--format`/`R`, else from the extension. A
//! compression suffix (`.gz`, `.zst`, `.bz2`, `.xz`) is stripped first and
//! the inner extension decides. File bytes are kept in a [`SourceCache`]
//! until `^R` evicts them.

pub mod delimited;
pub mod directory;
pub mod excel;
pub mod frames;
pub mod json;

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;
use sheetstack_cli::{CompressionFormat, FileFormat};
use tracing::{debug, info};

use crate::config::LoadingConfig;
use crate::sheet::{Sheet, SheetSource};

/// File contents keyed by path. Entries live until evicted.
#[derive(Debug, Default)]
pub struct SourceCache {
    files: HashMap<PathBuf, Rc<[u8]>>,
}

impl SourceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decompressed contents of `path`, read on first use.
    pub fn bytes(&mut self, path: &Path) -> Result<Rc<[u8]>> {
        if let Some(bytes) = self.files.get(path) {
            return Ok(bytes.clone());
        }
        let bytes: Rc<[u8]> = read_decompressed(path)
            .wrap_err_with(|| format!("reading {}", path.display()))?
            .into();
        debug!(path = %path.display(), bytes = bytes.len(), "cached source");
        self.files.insert(path.to_path_buf(), bytes.clone());
        Ok(bytes)
    }

    pub fn evict(&mut self, path: &Path) {
        self.files.remove(path);
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }
}

fn read_decompressed(path: &Path) -> Result<Vec<u8>> {
    let file = BufReader::new(File::open(path)?);
    let mut reader: Box<dyn Read> = match CompressionFormat::from_extension(path) {
        Some(CompressionFormat::Gzip) => Box::new(flate2::read::GzDecoder::new(file)),
        Some(CompressionFormat::Zstd) => Box::new(zstd::Decoder::new(file)?),
        Some(CompressionFormat::Bzip2) => Box::new(bzip2::read::BzDecoder::new(file)),
        Some(CompressionFormat::Xz) => Box::new(xz2::read::XzDecoder::new(file)),
        None => Box::new(file),
    };
    let mut out = Vec::new();
    reader.read_to_end(&mut out)?;
    Ok(out)
}

/// What loaders need besides the locator.
pub struct LoadContext<'a> {
    pub config: &'a LoadingConfig,
    pub cache: &'a mut SourceCache,
}

/// The path with any compression suffix removed.
pub fn inner_path(path: &Path) -> PathBuf {
    match CompressionFormat::from_extension(path) {
        Some(_) => path.with_extension(""),
        None => path.to_path_buf(),
    }
}

/// Sheet name for a file: its name without compression or format suffix.
pub fn sheet_name(path: &Path) -> String {
    let inner = inner_path(path);
    inner
        .file_stem()
        .or_else(|| inner.file_name())
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

pub fn detect_format(path: &Path) -> Option<FileFormat> {
    if path.is_dir() {
        return Some(FileFormat::Dir);
    }
    FileFormat::from_path(&inner_path(path))
}

/// Decodes source bytes per `[loading] encoding` and `encoding_errors`.
pub fn decode_text(bytes: &[u8], config: &LoadingConfig) -> Result<String> {
    let bytes = bytes.strip_prefix(b"\xef\xbb\xbf").unwrap_or(bytes);
    match config.encoding.to_lowercase().as_str() {
        "latin-1" | "latin1" | "iso-8859-1" => Ok(bytes.iter().map(|&b| b as char).collect()),
        _ => match config.encoding_errors.as_str() {
            "replace" => Ok(String::from_utf8_lossy(bytes).into_owned()),
            "ignore" => Ok(String::from_utf8_lossy(bytes).replace('\u{fffd}', "")),
            _ => String::from_utf8(bytes.to_vec())
                .map_err(|e| eyre!("source is not valid utf-8 (byte {})", e.utf8_error().valid_up_to())),
        },
    }
}

/// Opens `path` as a sheet.
pub fn open_source(path: &Path, format: Option<FileFormat>, ctx: &mut LoadContext) -> Result<Sheet> {
    let locator = path.to_string_lossy();
    if locator.contains("://") {
        return Err(eyre!("remote sources are not supported: {}", locator));
    }
    let format = format
        .or_else(|| detect_format(path))
        .unwrap_or(FileFormat::Txt);
    let name = sheet_name(path);
    let source = SheetSource::Path {
        path: path.to_path_buf(),
        format: Some(format),
    };

    let sheet = match format {
        FileFormat::Dir => directory::open_directory(path)?,
        FileFormat::Excel => excel::open_workbook(path)?,
        FileFormat::Parquet | FileFormat::Arrow => {
            let bytes = ctx.cache.bytes(path)?;
            frames::open_columnar(&bytes, format, name, source)?
        }
        FileFormat::Json | FileFormat::Jsonl => {
            let text = decode_text(&ctx.cache.bytes(path)?, ctx.config)?;
            let mut sheet = json::open_json(&text, format == FileFormat::Jsonl, name)?;
            sheet.source = source;
            sheet
        }
        FileFormat::Csv | FileFormat::Tsv | FileFormat::Psv | FileFormat::Txt => {
            let text = decode_text(&ctx.cache.bytes(path)?, ctx.config)?;
            delimited::open_text(&text, format, name, source, ctx.config)?
        }
    };
    info!(
        path = %path.display(),
        format = format.extension(),
        rows = sheet.n_rows(),
        columns = sheet.columns.len(),
        "opened source"
    );
    Ok(sheet)
}

/// Rebuilds a loaded sheet from its source, rereading the file. The
/// caller keeps the old sheet's name.
pub fn reload_source(source: &SheetSource, ctx: &mut LoadContext) -> Result<Option<Sheet>> {
    match source {
        SheetSource::Path { path, format } => {
            ctx.cache.evict(path);
            open_source(path, *format, ctx).map(Some)
        }
        SheetSource::Worksheet { path, name } => excel::open_worksheet(path, name, ctx.config).map(Some),
        SheetSource::Json(node) => json::node_sheet(node, String::new()).map(Some),
        SheetSource::None | SheetSource::Derived(_) => Ok(None),
    }
}

/// The sheet `Enter` opens from the cursor row: a nested JSON value, a
/// worksheet, or a directory entry.
pub fn dive(sheet: &Sheet, ctx: &mut LoadContext) -> Result<Sheet> {
    let row = sheet.cursor_row().ok_or_else(|| eyre!("no row to open"))?;
    match &sheet.source {
        SheetSource::Json(_)
        | SheetSource::Path {
            format: Some(FileFormat::Json | FileFormat::Jsonl),
            ..
        } => {
            let column = sheet.cursor_column().map(|c| c.name()).unwrap_or_default();
            let target = json::dive_target(row, &column)?;
            let name = format!("{}{}{}", sheet.name, ctx.config.subsheet_sep, target.label());
            json::node_sheet(&target, name)
        }
        SheetSource::Path {
            path,
            format: Some(FileFormat::Excel),
        } => {
            let (_, col) = sheet
                .column_by_name("name")
                .ok_or_else(|| eyre!("no worksheet column"))?;
            let worksheet = col.get_value(row).to_string();
            excel::open_worksheet(path, &worksheet, ctx.config)
        }
        SheetSource::Path {
            format: Some(FileFormat::Dir),
            ..
        } => {
            let entry = row.get::<directory::DirEntry>()?;
            open_source(&entry.path, None, ctx)
        }
        _ => Err(eyre!("nothing to open here")),
    }
}
