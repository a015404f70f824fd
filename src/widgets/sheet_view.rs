//! Draws a sheet's header and body rows for a precomputed [`Viewport`].

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::Style,
    widgets::Widget,
};

use crate::column::Column;
use crate::config::{DisplayConfig, Theme};
use crate::sheet::Sheet;
use crate::value::CellValue;
use crate::viewport::{ColumnSlot, Viewport};

pub struct SheetView<'a> {
    sheet: &'a Sheet,
    viewport: &'a Viewport,
    display: &'a DisplayConfig,
    theme: &'a Theme,
}

impl<'a> SheetView<'a> {
    pub fn new(sheet: &'a Sheet, viewport: &'a Viewport, display: &'a DisplayConfig, theme: &'a Theme) -> Self {
        Self {
            sheet,
            viewport,
            display,
            theme,
        }
    }

    /// `text` cut or padded to exactly `width` characters; cut text ends in
    /// the ellipsis glyph.
    fn fit(&self, text: &str, width: usize) -> String {
        let len = text.chars().count();
        if len <= width {
            return format!("{text:<width$}");
        }
        let ellipsis = self.display.ellipsis.chars().count();
        if width <= ellipsis {
            return text.chars().take(width).collect();
        }
        let mut out: String = text.chars().take(width - ellipsis).collect();
        out.push_str(&self.display.ellipsis);
        out
    }

    fn column_style(&self, abs: usize, vis: usize) -> Style {
        let mut style = self.theme.get("default");
        if self.sheet.is_key(abs) {
            style = style.patch(self.theme.get("key_cols"));
        }
        if vis == self.sheet.cursor_col_index {
            style = style.patch(self.theme.get("cur_col"));
        }
        style
    }

    /// The separator after a column: the key separator closes the key
    /// columns, the column separator follows every other one.
    fn separator(&self, abs: usize) -> &str {
        if self.sheet.n_key_columns > 0 && abs + 1 == self.sheet.n_key_columns {
            &self.display.key_sep
        } else {
            &self.display.column_sep
        }
    }

    fn draw_separator(&self, buf: &mut Buffer, area: Rect, y: u16, slot: &ColumnSlot, abs: usize, style: Style) {
        let x = slot.x + slot.width;
        if slot.truncated || x >= area.width as usize {
            return;
        }
        let sep = self.separator(abs);
        let room = area.width as usize - x;
        buf.set_stringn(
            area.x + x as u16,
            y,
            sep,
            room,
            style.patch(self.theme.get("column_sep")),
        );
    }

    fn draw_header(&self, buf: &mut Buffer, area: Rect, columns: &[(usize, Column)]) {
        let y = area.y;
        let header = self.theme.get("header");
        for slot in &self.viewport.columns.slots {
            let Some((abs, col)) = columns.get(slot.vis_index) else {
                continue;
            };
            let mut style = self.column_style(*abs, slot.vis_index).patch(header);
            if slot.vis_index == self.sheet.cursor_col_index {
                style = style.patch(self.theme.get("cur_hdr"));
            }
            let text = self.fit(&col.name(), slot.width);
            buf.set_stringn(area.x + slot.x as u16, y, text, slot.width, style);
            self.draw_separator(buf, area, y, slot, *abs, header);
        }
        if self.viewport.columns.more_left {
            buf.set_stringn(area.x, y, &self.display.left_more, 1, header);
        }
        if self.viewport.columns.more_right && area.width > 0 {
            let x = area.x + area.width - 1;
            buf.set_stringn(x, y, &self.display.right_more, 1, header);
        }
    }

    fn draw_cell(&self, buf: &mut Buffer, x: u16, y: u16, width: usize, col: &Column, cell: &CellValue, style: Style) {
        let text = self.fit(&col.display_cell(cell, self.display), width);
        let (style, note) = match cell {
            CellValue::Ok(_) => (style, None),
            CellValue::WrongType(_) => (style.patch(self.theme.get("wrong_type")), Some(&self.display.wrong_type)),
            CellValue::Failed(_) => (style.patch(self.theme.get("error")), Some(&self.display.error)),
        };
        buf.set_stringn(x, y, text, width, style);
        if let Some(glyph) = note.filter(|_| width > 1) {
            buf.set_stringn(x + width as u16 - 1, y, glyph, 1, style);
        }
    }
}

impl Widget for SheetView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.height == 0 || area.width == 0 {
            return;
        }
        let indices = self.sheet.visible_indices();
        let columns: Vec<(usize, Column)> = indices
            .iter()
            .map(|&i| (i, self.sheet.columns[i].clone()))
            .collect();
        self.draw_header(buf, area, &columns);

        for (line, row_index) in self.viewport.rows.clone().enumerate() {
            let y = area.y + 1 + line as u16;
            if y >= area.bottom() {
                break;
            }
            let row = &self.sheet.rows[row_index];
            let mut row_style = Style::default();
            if self.sheet.is_selected(row) {
                row_style = row_style.patch(self.theme.get("selected_row"));
            }
            let is_cursor_row = row_index == self.sheet.cursor_row_index;
            for slot in &self.viewport.columns.slots {
                let Some((abs, col)) = columns.get(slot.vis_index) else {
                    continue;
                };
                let mut style = self.column_style(*abs, slot.vis_index).patch(row_style);
                if is_cursor_row {
                    style = style.patch(self.theme.get("cur_row"));
                }
                let cell = col.get_value(row);
                self.draw_cell(buf, area.x + slot.x as u16, y, slot.width, col, &cell, style);
                self.draw_separator(buf, area, y, slot, *abs, row_style);
            }
        }
    }
}

/// The bottom line: sheet name and statuses on the left, the last key on
/// the right.
pub struct StatusBar<'a> {
    pub left: &'a str,
    pub right: &'a str,
    pub style: Style,
}

impl Widget for StatusBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.height == 0 {
            return;
        }
        let width = area.width as usize;
        buf.set_style(area, self.style);
        buf.set_stringn(area.x, area.y, self.left, width, self.style);
        let right = self.right.chars().count();
        if right + 2 < width {
            buf.set_stringn(area.x + (width - right - 2) as u16, area.y, self.right, right, self.style);
        }
    }
}
