//! User-facing error message formatting.
//!
//! Uses typed error matching (SheetError, PolarsError variants, io::ErrorKind)
//! rather than string parsing.

use color_eyre::eyre::Report;
use polars::prelude::PolarsError;
use std::io;

use crate::error::SheetError;

/// Format an io::Error as a user-facing message by matching on ErrorKind.
pub fn user_message_from_io(err: &io::Error) -> String {
    use std::io::ErrorKind;

    match err.kind() {
        ErrorKind::NotFound => "file or directory not found".to_string(),
        ErrorKind::PermissionDenied => "permission denied".to_string(),
        ErrorKind::InvalidData | ErrorKind::InvalidInput => format!("invalid data: {err}"),
        ErrorKind::UnexpectedEof => "unexpected end of file".to_string(),
        ErrorKind::Interrupted => "operation interrupted".to_string(),
        ErrorKind::OutOfMemory => "out of memory".to_string(),
        _ => err.to_string(),
    }
}

pub fn user_message_from_polars(err: &PolarsError) -> String {
    use polars::prelude::PolarsError as PE;

    match err {
        PE::ColumnNotFound(msg) => format!("column not found: {msg}"),
        PE::Duplicate(msg) => format!("duplicate column: {msg}"),
        PE::IO { error, .. } => user_message_from_io(error.as_ref()),
        PE::NoData(msg) => format!("no data: {msg}"),
        PE::SchemaMismatch(msg) | PE::ShapeMismatch(msg) => format!("malformed source: {msg}"),
        PE::ComputeError(msg) => msg.to_string(),
        PE::Context { error, msg } => format!("{}: {}", msg, user_message_from_polars(error)),
        #[allow(unreachable_patterns)]
        _ => err.to_string(),
    }
}

/// One line for the status bar: the innermost typed cause if there is one,
/// otherwise the last line of the report.
pub fn status_line(report: &Report) -> String {
    for cause in report.chain() {
        if let Some(e) = cause.downcast_ref::<SheetError>() {
            return e.to_string();
        }
        if let Some(e) = cause.downcast_ref::<PolarsError>() {
            return user_message_from_polars(e);
        }
        if let Some(e) = cause.downcast_ref::<io::Error>() {
            return user_message_from_io(e);
        }
    }
    let display = report.to_string();
    display
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .last()
        .unwrap_or("an error occurred")
        .to_string()
}

/// Every message in the cause chain, outermost first, for the error sheet.
pub fn full_chain(report: &Report) -> Vec<String> {
    report.chain().map(|cause| cause.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use color_eyre::eyre::{eyre, WrapErr};

    #[test]
    fn test_status_line_prefers_typed_cause() {
        let report = Report::new(SheetError::readonly_mode()).wrap_err("edit failed");
        assert_eq!(status_line(&report), "readonly mode");
    }

    #[test]
    fn test_status_line_io() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "nope");
        let report = Report::new(io_err).wrap_err("opening data.csv");
        assert_eq!(status_line(&report), "file or directory not found");
        assert_eq!(full_chain(&report).len(), 2);
    }

    #[test]
    fn test_status_line_falls_back_to_last_line() {
        let report = eyre!("first\nsecond line");
        assert_eq!(status_line(&report), "second line");
    }
}
