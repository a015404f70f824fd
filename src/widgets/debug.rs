use ratatui::{
    buffer::Buffer,
    layout::Rect,
    widgets::{Paragraph, Widget},
};

use crate::keys::{keyname, Keystroke};

#[derive(Default)]
pub struct DebugState {
    pub num_events: usize,
    pub num_frames: usize,
    pub num_key_events: usize,
    pub last_key: String,
    /// Last command dispatched, e.g. `CursorDown(1)`.
    pub last_command: String,
    pub enabled: bool,
}

impl DebugState {
    pub fn on_key(&mut self, key: &Keystroke) {
        self.num_key_events += 1;
        self.last_key = keyname(key);
    }
}

impl Widget for &DebugState {
    fn render(self, area: Rect, buf: &mut Buffer) {
        Paragraph::new(format!(
            "events={} keys={} last_key={} last_command={} frames={}",
            self.num_events, self.num_key_events, self.last_key, self.last_command, self.num_frames,
        ))
        .render(area, buf);
    }
}
