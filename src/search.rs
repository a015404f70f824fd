//! Regex search over display values.

use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use regex::Regex;

use crate::column::Column;
use crate::commands::ColumnScope;
use crate::config::DisplayConfig;
use crate::row::Row;

/// The last search, repeated by `n` and `p`.
#[derive(Debug, Clone)]
pub struct LastSearch {
    pub regex: Regex,
    pub scope: ColumnScope,
    pub backward: bool,
}

pub fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).wrap_err_with(|| format!("invalid regex {pattern:?}"))
}

fn row_matches(row: &Row, columns: &[Column], regex: &Regex, display: &DisplayConfig) -> bool {
    columns
        .iter()
        .any(|c| regex.is_match(&c.get_display_value(row, display)))
}

/// First matching row after `start` (before it, if `backward`), wrapping
/// around once. `start` itself is checked last.
pub fn find_next(
    rows: &[Row],
    columns: &[Column],
    regex: &Regex,
    start: usize,
    backward: bool,
    display: &DisplayConfig,
) -> Option<usize> {
    let n = rows.len();
    if n == 0 {
        return None;
    }
    let start = start.min(n - 1);
    (1..=n)
        .map(|k| {
            if backward {
                (start + n - k) % n
            } else {
                (start + k) % n
            }
        })
        .find(|&i| row_matches(&rows[i], columns, regex, display))
}

/// Every matching row index, in order.
pub fn find_all(rows: &[Row], columns: &[Column], regex: &Regex, display: &DisplayConfig) -> Vec<usize> {
    rows.iter()
        .enumerate()
        .filter(|(_, r)| row_matches(r, columns, regex, display))
        .map(|(i, _)| i)
        .collect()
}
