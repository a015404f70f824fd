//! Delimited and plain text.

use std::io::Cursor;

use color_eyre::eyre::eyre;
use color_eyre::Result;
use polars::prelude::{CsvReadOptions, CsvReader, DataFrame, SerReader};
use sheetstack_cli::FileFormat;

use crate::column::Column;
use crate::config::LoadingConfig;
use crate::loaders::frames::frame_sheet;
use crate::row::Row;
use crate::sheet::{Sheet, SheetSource};
use crate::value::Value;

/// A `.txt` file is tab-separated if a tab shows up this early.
const TAB_SNIFF_CHARS: usize = 32;

fn ascii_byte(c: char, what: &str) -> Result<u8> {
    u8::try_from(c)
        .ok()
        .filter(u8::is_ascii)
        .ok_or_else(|| eyre!("{} must be a single ASCII character, got {:?}", what, c))
}

/// Parses delimited text with every field kept as text.
pub fn read_delimited(text: &str, delimiter: char, quote: Option<char>, header: bool) -> Result<DataFrame> {
    let separator = ascii_byte(delimiter, "delimiter")?;
    let quote = quote.map(|q| ascii_byte(q, "quote character")).transpose()?;
    let options = CsvReadOptions::default()
        .with_has_header(header)
        .with_infer_schema_length(Some(0))
        .map_parse_options(|opts| {
            opts.with_separator(separator)
                .with_quote_char(quote)
                .with_missing_is_null(false)
                .with_truncate_ragged_lines(true)
        });
    let df = CsvReader::new(Cursor::new(text.as_bytes().to_vec()))
        .with_options(options)
        .finish()?;
    Ok(df)
}

/// One row per line, in a single `text` column.
pub fn lines_sheet(text: &str, name: impl Into<String>, source: SheetSource) -> Sheet {
    let rows = text
        .lines()
        .map(|line| Row::fields(vec![Value::from(line)]))
        .collect();
    Sheet::new(name, source)
        .with_rows(rows)
        .with_columns(vec![Column::field("text", 0)])
        .with_keys(1)
}

pub fn open_text(
    text: &str,
    format: FileFormat,
    name: String,
    source: SheetSource,
    config: &LoadingConfig,
) -> Result<Sheet> {
    let (delimiter, quote) = match format {
        FileFormat::Tsv => ('\t', None),
        FileFormat::Psv => ('|', Some(config.quote_char)),
        FileFormat::Txt => {
            let head: String = text.chars().take(TAB_SNIFF_CHARS).collect();
            if !head.contains('\t') {
                return Ok(lines_sheet(text, name, source));
            }
            ('\t', None)
        }
        _ => (config.delimiter, Some(config.quote_char)),
    };
    if text.trim().is_empty() {
        return Ok(Sheet::new(name, source));
    }
    // the header row is read as data so repeated or blank names survive
    let df = read_delimited(text, delimiter, quote, false)?;
    let mut sheet = frame_sheet(&df, name, source)?;
    if config.header && !sheet.rows.is_empty() {
        let names = sheet.rows.remove(0);
        for col in &sheet.columns {
            col.set_name(col.get_value(&names).to_string());
        }
    }
    Ok(sheet)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DisplayConfig;

    fn cells(sheet: &Sheet) -> Vec<Vec<String>> {
        let display = DisplayConfig::default();
        sheet
            .rows
            .iter()
            .map(|r| sheet.columns.iter().map(|c| c.get_display_value(r, &display)).collect())
            .collect()
    }

    #[test]
    fn test_csv_fields_stay_text() {
        let config = LoadingConfig::default();
        let sheet = open_text("id,val\n007,\"a,b\"\n2,\n", FileFormat::Csv, "t".into(), SheetSource::None, &config).unwrap();
        assert_eq!(sheet.columns[0].name(), "id");
        assert_eq!(sheet.n_key_columns, 1);
        assert_eq!(cells(&sheet), [["007", "a,b"], ["2", ""]]);
    }

    #[test]
    fn test_tsv_ignores_quotes() {
        let config = LoadingConfig::default();
        let sheet = open_text("a\tb\n\"x\ty\n", FileFormat::Tsv, "t".into(), SheetSource::None, &config).unwrap();
        assert_eq!(cells(&sheet), [["\"x", "y"]]);
    }

    #[test]
    fn test_txt_sniffing() {
        let config = LoadingConfig::default();
        let plain = open_text("hello\nworld\n", FileFormat::Txt, "t".into(), SheetSource::None, &config).unwrap();
        assert_eq!(plain.columns[0].name(), "text");
        assert_eq!(plain.n_rows(), 2);
        let tabbed = open_text("a\tb\n1\t2\n", FileFormat::Txt, "t".into(), SheetSource::None, &config).unwrap();
        assert_eq!(tabbed.columns.len(), 2);
    }

    #[test]
    fn test_repeated_and_blank_header_names_kept() {
        let config = LoadingConfig::default();
        let sheet = open_text("id,val,val,\n1,a,b,c\n", FileFormat::Csv, "t".into(), SheetSource::None, &config).unwrap();
        let names: Vec<_> = sheet.columns.iter().map(|c| c.name()).collect();
        assert_eq!(names, ["id", "val", "val", ""]);
        assert_eq!(cells(&sheet), [["1", "a", "b", "c"]]);
    }

    #[test]
    fn test_no_header() {
        let mut config = LoadingConfig::default();
        config.header = false;
        let sheet = open_text("1,2\n3,4\n", FileFormat::Csv, "t".into(), SheetSource::None, &config).unwrap();
        assert_eq!(sheet.n_rows(), 2);
    }

    #[test]
    fn test_empty_source() {
        let config = LoadingConfig::default();
        let sheet = open_text("", FileFormat::Csv, "t".into(), SheetSource::None, &config).unwrap();
        assert_eq!(sheet.n_rows(), 0);
    }
}
