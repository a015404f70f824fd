//! Single-line input drawn on the status line.

use std::fs;
use std::io::{BufRead, BufReader, Write};

use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use fs2::FileExt;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
    text::Span,
    widgets::Widget,
};
use tui_textarea::{CursorMove, Input, Key, TextArea};

use crate::cache::CacheManager;
use crate::keys::{keyname, Keystroke};

const HISTORY_LIMIT: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptEvent {
    None,
    Submit(String),
    /// Dismissed; carries the name of the key that did it.
    Cancel(String),
}

pub struct Prompt {
    label: String,
    textarea: TextArea<'static>,
    history_id: Option<&'static str>,
    history: Vec<String>,
    history_index: Option<usize>,
    history_temp: Option<String>,
}

impl Prompt {
    pub fn new(label: impl Into<String>) -> Self {
        let mut textarea = TextArea::default();
        textarea.set_cursor_line_style(Style::default());
        textarea.set_cursor_style(Style::default().add_modifier(Modifier::REVERSED));
        Self {
            label: label.into(),
            textarea,
            history_id: None,
            history: Vec::new(),
            history_index: None,
            history_temp: None,
        }
    }

    /// Remembers submissions under `history_id`, loading earlier ones now.
    pub fn with_history(mut self, history_id: &'static str, cache: &CacheManager) -> Self {
        self.history_id = Some(history_id);
        match load_history(cache, history_id) {
            Ok(history) => self.history = history,
            Err(e) => tracing::warn!(history = history_id, error = %e, "could not load prompt history"),
        }
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.set_value(value.into());
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn value(&self) -> String {
        self.textarea.lines().first().cloned().unwrap_or_default()
    }

    pub fn set_value(&mut self, value: String) {
        let single_line = value.replace(['\n', '\r'], " ");
        let style = self.textarea.cursor_style();
        self.textarea = TextArea::new(vec![single_line]);
        self.textarea.set_cursor_line_style(Style::default());
        self.textarea.set_cursor_style(style);
        self.textarea.move_cursor(CursorMove::End);
    }

    fn history_up(&mut self) {
        if self.history.is_empty() {
            return;
        }
        if self.history_index.is_none() {
            self.history_temp = Some(self.value());
        }
        let index = match self.history_index {
            Some(i) => i.saturating_sub(1),
            None => self.history.len() - 1,
        };
        self.history_index = Some(index);
        if let Some(entry) = self.history.get(index).cloned() {
            self.set_value(entry);
        }
    }

    fn history_down(&mut self) {
        let Some(index) = self.history_index else {
            return;
        };
        if index + 1 >= self.history.len() {
            let temp = self.history_temp.take().unwrap_or_default();
            self.history_index = None;
            self.set_value(temp);
        } else {
            self.history_index = Some(index + 1);
            if let Some(entry) = self.history.get(index + 1).cloned() {
                self.set_value(entry);
            }
        }
    }

    fn remember(&mut self, cache: &CacheManager) {
        let Some(history_id) = self.history_id else {
            return;
        };
        let value = self.value();
        if value.trim().is_empty() {
            return;
        }
        add_to_history(&mut self.history, value);
        if let Err(e) = save_history(cache, history_id, &self.history, HISTORY_LIMIT) {
            tracing::warn!(history = history_id, error = %e, "could not save prompt history");
        }
    }

    pub fn handle_key(&mut self, event: &KeyEvent, cache: &CacheManager) -> PromptEvent {
        let stroke = Keystroke::from(event);
        if stroke.is_cancel() {
            return PromptEvent::Cancel(keyname(&stroke));
        }
        match event.code {
            KeyCode::Enter => {
                self.remember(cache);
                return PromptEvent::Submit(self.value());
            }
            KeyCode::Up => self.history_up(),
            KeyCode::Down => self.history_down(),
            _ => {
                let input = key_event_to_input(event);
                if matches!(input.key, Key::Char('\n') | Key::Char('\r') | Key::Null) {
                    return PromptEvent::None;
                }
                self.textarea.input(input);
                self.history_index = None;
                self.history_temp = None;
            }
        }
        PromptEvent::None
    }
}

fn key_event_to_input(event: &KeyEvent) -> Input {
    let key = match event.code {
        KeyCode::Char(c) => Key::Char(c),
        KeyCode::Backspace => Key::Backspace,
        KeyCode::Enter => Key::Enter,
        KeyCode::Left => Key::Left,
        KeyCode::Right => Key::Right,
        KeyCode::Up => Key::Up,
        KeyCode::Down => Key::Down,
        KeyCode::Home => Key::Home,
        KeyCode::End => Key::End,
        KeyCode::Delete => Key::Delete,
        KeyCode::Tab | KeyCode::BackTab => Key::Tab,
        KeyCode::Esc => Key::Esc,
        _ => Key::Null,
    };
    Input {
        key,
        ctrl: event.modifiers.contains(KeyModifiers::CONTROL),
        alt: event.modifiers.contains(KeyModifiers::ALT),
        shift: event.modifiers.contains(KeyModifiers::SHIFT),
    }
}

impl Widget for &Prompt {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let label_width = (self.label.chars().count() as u16).min(area.width);
        Span::raw(self.label.as_str()).render(Rect { width: label_width, ..area }, buf);
        let input = Rect {
            x: area.x + label_width,
            width: area.width - label_width,
            ..area
        };
        self.textarea.render(input, buf);
    }
}

pub fn load_history(cache: &CacheManager, history_id: &str) -> Result<Vec<String>> {
    let path = cache.history_file(history_id);
    if !path.exists() {
        return Ok(Vec::new());
    }
    let file = fs::File::open(&path)?;
    file.lock_shared()?;
    let history = BufReader::new(&file)
        .lines()
        .filter(|l| l.as_ref().map(|s| !s.trim().is_empty()).unwrap_or(true))
        .collect::<std::io::Result<Vec<String>>>();
    file.unlock()?;
    Ok(history?)
}

/// Keeps the newest `limit` entries.
pub fn save_history(cache: &CacheManager, history_id: &str, history: &[String], limit: usize) -> Result<()> {
    cache.ensure_cache_dir()?;
    let mut file = fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(cache.history_file(history_id))?;
    file.lock_exclusive()?;
    let start = history.len().saturating_sub(limit);
    for entry in &history[start..] {
        writeln!(file, "{}", entry)?;
    }
    file.flush()?;
    file.unlock()?;
    Ok(())
}

/// Skips an entry equal to the previous one.
pub fn add_to_history(history: &mut Vec<String>, entry: String) {
    if history.last() != Some(&entry) {
        history.push(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_text(prompt: &mut Prompt, text: &str, cache: &CacheManager) {
        for c in text.chars() {
            prompt.handle_key(&key(KeyCode::Char(c)), cache);
        }
    }

    #[test]
    fn test_submit_and_cancel() {
        let dir = TempDir::new().unwrap();
        let cache = CacheManager::with_dir(dir.path().to_path_buf());
        let mut prompt = Prompt::new("/");
        type_text(&mut prompt, "ab", &cache);
        prompt.handle_key(&key(KeyCode::Backspace), &cache);
        assert_eq!(prompt.handle_key(&key(KeyCode::Enter), &cache), PromptEvent::Submit("a".into()));
        assert_eq!(prompt.handle_key(&key(KeyCode::Esc), &cache), PromptEvent::Cancel("ESC".into()));
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(prompt.handle_key(&ctrl_c, &cache), PromptEvent::Cancel("^C".into()));
    }

    #[test]
    fn test_history_persists_and_navigates() {
        let dir = TempDir::new().unwrap();
        let cache = CacheManager::with_dir(dir.path().to_path_buf());
        for text in ["first", "second"] {
            let mut prompt = Prompt::new("/").with_history("search", &cache);
            type_text(&mut prompt, text, &cache);
            prompt.handle_key(&key(KeyCode::Enter), &cache);
        }
        let mut prompt = Prompt::new("/").with_history("search", &cache);
        type_text(&mut prompt, "draft", &cache);
        prompt.handle_key(&key(KeyCode::Up), &cache);
        assert_eq!(prompt.value(), "second");
        prompt.handle_key(&key(KeyCode::Up), &cache);
        assert_eq!(prompt.value(), "first");
        prompt.handle_key(&key(KeyCode::Down), &cache);
        prompt.handle_key(&key(KeyCode::Down), &cache);
        assert_eq!(prompt.value(), "draft");
    }

    #[test]
    fn test_add_to_history_skips_repeats() {
        let mut history = Vec::new();
        add_to_history(&mut history, "a".into());
        add_to_history(&mut history, "a".into());
        add_to_history(&mut history, "b".into());
        add_to_history(&mut history, "a".into());
        assert_eq!(history, ["a", "b", "a"]);
    }
}
