use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// A key as the dispatcher sees it. Shift is folded into the character, so
/// `H` and Shift+`h` are the same keystroke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Keystroke {
    pub code: KeyCode,
    pub ctrl: bool,
}

impl Keystroke {
    pub const fn key(c: char) -> Self {
        Self {
            code: KeyCode::Char(c),
            ctrl: false,
        }
    }

    pub const fn ctrl(c: char) -> Self {
        Self {
            code: KeyCode::Char(c),
            ctrl: true,
        }
    }

    pub const fn code(code: KeyCode) -> Self {
        Self { code, ctrl: false }
    }

    pub fn is_cancel(&self) -> bool {
        self.code == KeyCode::Esc || *self == Keystroke::ctrl('c')
    }
}

impl From<&KeyEvent> for Keystroke {
    fn from(event: &KeyEvent) -> Self {
        let ctrl = event.modifiers.contains(KeyModifiers::CONTROL);
        let code = match event.code {
            KeyCode::Char(c) if ctrl => KeyCode::Char(c.to_ascii_lowercase()),
            // Shift+Tab arrives as Tab with SHIFT on some terminals
            KeyCode::Tab if event.modifiers.contains(KeyModifiers::SHIFT) => KeyCode::BackTab,
            other => other,
        };
        Self { code, ctrl }
    }
}

/// Curses-style name: `^R`, `KEY_UP`, `F1`, `ENTER`.
pub fn keyname(key: &Keystroke) -> String {
    let base = match key.code {
        KeyCode::Char(' ') => "SPACE".to_string(),
        KeyCode::Char(c) if key.ctrl => return format!("^{}", c.to_ascii_uppercase()),
        KeyCode::Char(c) => c.to_string(),
        KeyCode::F(n) => format!("F{n}"),
        KeyCode::Enter => "ENTER".into(),
        KeyCode::Tab => "TAB".into(),
        KeyCode::BackTab => "BTAB".into(),
        KeyCode::Esc => "ESC".into(),
        KeyCode::Backspace => "KEY_BACKSPACE".into(),
        KeyCode::Delete => "KEY_DC".into(),
        KeyCode::Insert => "KEY_IC".into(),
        KeyCode::Left => "KEY_LEFT".into(),
        KeyCode::Right => "KEY_RIGHT".into(),
        KeyCode::Up => "KEY_UP".into(),
        KeyCode::Down => "KEY_DOWN".into(),
        KeyCode::Home => "KEY_HOME".into(),
        KeyCode::End => "KEY_END".into(),
        KeyCode::PageUp => "KEY_PPAGE".into(),
        KeyCode::PageDown => "KEY_NPAGE".into(),
        other => format!("{other:?}"),
    };
    if key.ctrl {
        format!("^{base}")
    } else {
        base
    }
}
