//! Which rows and columns of a sheet fit on screen.
//!
//! Everything here is arithmetic over widths and offsets; [`clamp`] is the
//! only function that writes to the sheet and it only moves the scroll
//! offsets.

use std::ops::Range;

use crate::config::DisplayConfig;
use crate::sheet::Sheet;

/// Screen lines that are not body rows: the header and the status line.
pub const CHROME_ROWS: usize = 2;

pub fn body_rows(screen_height: usize) -> usize {
    screen_height.saturating_sub(CHROME_ROWS).max(1)
}

/// One drawn column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSlot {
    /// Index into the sheet's visible columns.
    pub vis_index: usize,
    pub x: usize,
    pub width: usize,
    /// Cut short by the right edge of the screen.
    pub truncated: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnWindow {
    pub slots: Vec<ColumnSlot>,
    pub more_left: bool,
    pub more_right: bool,
}

impl ColumnWindow {
    pub fn slot(&self, vis_index: usize) -> Option<&ColumnSlot> {
        self.slots.iter().find(|s| s.vis_index == vis_index)
    }

    /// Whether the column is drawn at its full width.
    pub fn shows_fully(&self, vis_index: usize) -> bool {
        self.slot(vis_index).is_some_and(|s| !s.truncated)
    }
}

/// Lays columns out left to right from `left`, each followed by a
/// separator, until the screen is full. The last column may be cut.
pub fn layout_columns(widths: &[usize], left: usize, screen_width: usize, sep_width: usize) -> ColumnWindow {
    let mut slots = Vec::new();
    let mut x = 0;
    for (i, &w) in widths.iter().enumerate().skip(left) {
        if x >= screen_width {
            break;
        }
        let shown = w.min(screen_width - x);
        slots.push(ColumnSlot {
            vis_index: i,
            x,
            width: shown,
            truncated: shown < w,
        });
        x += w + sep_width;
    }
    let more_right = match slots.last() {
        Some(last) => last.truncated || last.vis_index + 1 < widths.len(),
        None => !widths.is_empty(),
    };
    ColumnWindow {
        slots,
        more_left: left > 0 && !widths.is_empty(),
        more_right,
    }
}

/// `[top, top + body_rows)` clamped to the row count.
pub fn row_window(top: usize, body_rows: usize, n_rows: usize) -> Range<usize> {
    let start = top.min(n_rows);
    start..(start + body_rows).min(n_rows)
}

/// The leftmost column that keeps `cursor` fully on screen, moving as
/// little as possible from `left`.
pub fn scroll_left_col(widths: &[usize], left: usize, cursor: usize, screen_width: usize, sep_width: usize) -> usize {
    if cursor <= left {
        return cursor;
    }
    let mut left = left;
    while left < cursor && !layout_columns(widths, left, screen_width, sep_width).shows_fully(cursor) {
        left += 1;
    }
    left
}

/// Display widths of the visible columns. Columns without an explicit
/// width fit the rows in `sample`, capped at a fraction of the screen.
pub fn column_widths(sheet: &Sheet, sample: Range<usize>, screen_width: usize, display: &DisplayConfig) -> Vec<usize> {
    let rows = &sheet.rows[sample.start.min(sheet.rows.len())..sample.end.min(sheet.rows.len())];
    let cap = (screen_width / display.max_width_divisor.max(1)).max(1);
    sheet
        .visible_columns()
        .iter()
        .map(|col| match col.width() {
            Some(w) => w,
            None => col.get_max_width(rows, display).clamp(1, cap),
        })
        .collect()
}

/// What one frame shows of a sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Viewport {
    pub rows: Range<usize>,
    pub widths: Vec<usize>,
    pub columns: ColumnWindow,
}

impl Viewport {
    pub fn compute(sheet: &Sheet, screen_width: usize, screen_height: usize, display: &DisplayConfig) -> Self {
        let rows = row_window(sheet.top_row_index, body_rows(screen_height), sheet.n_rows());
        let widths = column_widths(sheet, rows.clone(), screen_width, display);
        let sep = display.column_sep.chars().count();
        let columns = layout_columns(&widths, sheet.left_col_index, screen_width, sep);
        Self { rows, widths, columns }
    }
}

/// Brings the cursor back into range and scrolls so it is on screen.
pub fn clamp(sheet: &mut Sheet, screen_width: usize, screen_height: usize, display: &DisplayConfig) {
    sheet.check_cursor();
    sheet.scroll_to_cursor(body_rows(screen_height));
    let rows = row_window(sheet.top_row_index, body_rows(screen_height), sheet.n_rows());
    let widths = column_widths(sheet, rows, screen_width, display);
    let sep = display.column_sep.chars().count();
    sheet.left_col_index = scroll_left_col(&widths, sheet.left_col_index, sheet.cursor_col_index, screen_width, sep);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_truncates_last_column() {
        let window = layout_columns(&[4, 6, 10], 0, 15, 1);
        assert_eq!(window.slots.len(), 3);
        assert_eq!(window.slots[1].x, 5);
        assert_eq!(window.slots[2].x, 12);
        assert_eq!(window.slots[2].width, 3);
        assert!(window.slots[2].truncated);
        assert!(!window.more_left);
        assert!(window.more_right);
    }

    #[test]
    fn test_layout_more_indicators() {
        let window = layout_columns(&[4, 4, 4], 1, 80, 1);
        assert!(window.more_left);
        assert!(!window.more_right);
        assert_eq!(window.slots[0].vis_index, 1);
        assert_eq!(window.slots[0].x, 0);
    }

    #[test]
    fn test_row_window_clamps() {
        assert_eq!(row_window(0, 10, 3), 0..3);
        assert_eq!(row_window(5, 10, 20), 5..15);
        assert_eq!(row_window(30, 10, 20), 20..20);
    }

    #[test]
    fn test_scroll_left_follows_cursor() {
        let widths = [10, 10, 10, 10];
        assert_eq!(scroll_left_col(&widths, 0, 1, 25, 1), 0);
        assert_eq!(scroll_left_col(&widths, 0, 3, 25, 1), 2);
        assert_eq!(scroll_left_col(&widths, 3, 1, 25, 1), 1);
        // wider than the screen: the cursor column becomes the leftmost
        assert_eq!(scroll_left_col(&[50, 50], 0, 1, 20, 1), 1);
    }

    #[test]
    fn test_body_rows() {
        assert_eq!(body_rows(25), 23);
        assert_eq!(body_rows(1), 1);
    }
}
