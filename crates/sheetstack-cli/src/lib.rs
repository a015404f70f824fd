//! Shared CLI definitions for sheetstack.
//!
//! Used by the main application and by the build script (manpage).

use clap::{Parser, ValueEnum};
use std::path::Path;

/// Source format, used to bypass extension-based loader selection.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum FileFormat {
    /// Comma-separated values
    Csv,
    /// Tab-separated values
    Tsv,
    /// Pipe-separated values
    Psv,
    /// Plain text, one row per line (tab-separated if a tab is found early)
    Txt,
    /// JSON document browsed as nested sheets
    Json,
    /// JSON Lines / NDJSON (one value per line)
    Jsonl,
    /// Parquet columnar format
    Parquet,
    /// Arrow IPC / Feather
    Arrow,
    /// Spreadsheet workbook (.xls, .xlsx, .xlsm, .ods)
    Excel,
    /// Directory listing
    Dir,
}

impl FileFormat {
    /// Detect file format from path extension. Returns None when extension is missing or unknown.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    /// Parse format from extension string (e.g. "csv", "json").
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "csv" => Some(Self::Csv),
            "tsv" | "tab" => Some(Self::Tsv),
            "psv" => Some(Self::Psv),
            "txt" | "log" => Some(Self::Txt),
            "json" => Some(Self::Json),
            "jsonl" | "ndjson" => Some(Self::Jsonl),
            "parquet" => Some(Self::Parquet),
            "arrow" | "ipc" | "feather" => Some(Self::Arrow),
            "xls" | "xlsx" | "xlsm" | "xlsb" | "ods" => Some(Self::Excel),
            "dir" => Some(Self::Dir),
            _ => None,
        }
    }

    /// Canonical extension used when the format is shown or chosen interactively.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Tsv => "tsv",
            Self::Psv => "psv",
            Self::Txt => "txt",
            Self::Json => "json",
            Self::Jsonl => "jsonl",
            Self::Parquet => "parquet",
            Self::Arrow => "arrow",
            Self::Excel => "xlsx",
            Self::Dir => "dir",
        }
    }
}

/// Compression format for data files
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum CompressionFormat {
    /// Gzip compression (.gz)
    Gzip,
    /// Zstandard compression (.zst)
    Zstd,
    /// Bzip2 compression (.bz2)
    Bzip2,
    /// XZ compression (.xz)
    Xz,
}

impl CompressionFormat {
    /// Detect compression format from file extension
    pub fn from_extension(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_lowercase().as_str() {
            "gz" => Some(Self::Gzip),
            "zst" | "zstd" => Some(Self::Zstd),
            "bz2" | "bz" => Some(Self::Bzip2),
            "xz" => Some(Self::Xz),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Gzip => "gz",
            Self::Zstd => "zst",
            Self::Bzip2 => "bz2",
            Self::Xz => "xz",
        }
    }
}

/// Command-line arguments for sheetstack
#[derive(Clone, Parser, Debug)]
#[command(
    name = "sheetstack",
    version,
    about = "A stack of navigable sheets for tabular data in the terminal",
    long_about = include_str!("../long_about.txt")
)]
pub struct Args {
    /// Files or directories to open. Each becomes a sheet; the last one is shown first.
    /// With no path the current directory is listed.
    #[arg(value_name = "PATH")]
    pub paths: Vec<std::path::PathBuf>,

    /// Field delimiter for delimited text (overrides config [loading] delimiter)
    #[arg(long = "delimiter", value_name = "CHAR")]
    pub delimiter: Option<char>,

    /// Quote character for delimited text (overrides config [loading] quote_char)
    #[arg(long = "quote-char", value_name = "CHAR")]
    pub quote_char: Option<char>,

    /// Treat the first line of delimited text as data instead of a header
    #[arg(long = "no-header", action)]
    pub no_header: bool,

    /// Text encoding of sources: utf-8 or latin-1
    #[arg(long = "encoding", value_name = "NAME")]
    pub encoding: Option<String>,

    /// Force source format; by default it is detected from the file extension
    #[arg(long = "format", value_enum)]
    pub format: Option<FileFormat>,

    /// Refuse every cell edit and save
    #[arg(long = "readonly", action)]
    pub readonly: bool,

    /// Propagate command failures instead of containing them, and show the debug bar
    #[arg(long = "debug", action)]
    pub debug: bool,

    /// Clear all cache data (prompt history) and exit
    #[arg(long = "clear-cache", action)]
    pub clear_cache: bool,

    /// Generate default configuration file at ~/.config/sheetstack/config.toml
    #[arg(long = "generate-config", action)]
    pub generate_config: bool,

    /// Force overwrite existing config file when using --generate-config
    #[arg(long = "force", requires = "generate_config", action)]
    pub force: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compression_detection() {
        assert_eq!(
            CompressionFormat::from_extension(Path::new("file.csv.gz")),
            Some(CompressionFormat::Gzip)
        );
        assert_eq!(
            CompressionFormat::from_extension(Path::new("file.tsv.zst")),
            Some(CompressionFormat::Zstd)
        );
        assert_eq!(
            CompressionFormat::from_extension(Path::new("file.json.bz2")),
            Some(CompressionFormat::Bzip2)
        );
        assert_eq!(
            CompressionFormat::from_extension(Path::new("file.csv.xz")),
            Some(CompressionFormat::Xz)
        );
        assert_eq!(CompressionFormat::from_extension(Path::new("file.csv")), None);
        assert_eq!(CompressionFormat::from_extension(Path::new("file")), None);
    }

    #[test]
    fn test_file_format_from_path() {
        assert_eq!(
            FileFormat::from_path(Path::new("data.csv")),
            Some(FileFormat::Csv)
        );
        assert_eq!(
            FileFormat::from_path(Path::new("data.NDJSON")),
            Some(FileFormat::Jsonl)
        );
        assert_eq!(
            FileFormat::from_path(Path::new("book.xlsx")),
            Some(FileFormat::Excel)
        );
        assert_eq!(FileFormat::from_path(Path::new("README")), None);
    }

    #[test]
    fn test_args_parse() {
        let args = Args::parse_from([
            "sheetstack",
            "--delimiter",
            ";",
            "--no-header",
            "--readonly",
            "a.csv",
            "b.tsv",
        ]);
        assert_eq!(args.paths.len(), 2);
        assert_eq!(args.delimiter, Some(';'));
        assert!(args.no_header);
        assert!(args.readonly);
        assert!(!args.debug);
    }
}
