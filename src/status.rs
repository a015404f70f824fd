//! Status line messages and the error history.

use std::collections::VecDeque;

/// Statuses kept for `g^P`.
pub const STATUS_HISTORY_LEN: usize = 100;
/// Errors kept for `gE`.
pub const ERROR_HISTORY_LEN: usize = 10;

/// A command failure kept for later inspection.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorRecord {
    /// Keys that triggered the command, e.g. `gq`.
    pub keys: String,
    pub summary: String,
    /// Every message of the cause chain, outermost first.
    pub chain: Vec<String>,
}

#[derive(Debug, Default)]
pub struct StatusLog {
    pending: Vec<String>,
    history: VecDeque<String>,
    errors: VecDeque<ErrorRecord>,
}

impl StatusLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends to the pending messages and to the history ring.
    pub fn status(&mut self, msg: impl Into<String>) {
        let msg = msg.into();
        tracing::debug!(status = %msg);
        if self.history.len() == STATUS_HISTORY_LEN {
            self.history.pop_front();
        }
        self.history.push_back(msg.clone());
        self.pending.push(msg);
    }

    pub fn error(&mut self, record: ErrorRecord) {
        if self.errors.len() == ERROR_HISTORY_LEN {
            self.errors.pop_front();
        }
        self.errors.push_back(record);
    }

    /// Pending messages joined by `sep`. The buffer is emptied.
    pub fn take_pending(&mut self, sep: &str) -> String {
        let joined = self.pending.join(sep);
        self.pending.clear();
        joined
    }

    /// Oldest first.
    pub fn history(&self) -> impl Iterator<Item = &String> {
        self.history.iter()
    }

    /// The most recent status, for showing it again.
    pub fn previous(&self) -> Option<&String> {
        self.history.back()
    }

    /// Oldest first.
    pub fn errors(&self) -> impl Iterator<Item = &ErrorRecord> {
        self.errors.iter()
    }

    pub fn last_error(&self) -> Option<&ErrorRecord> {
        self.errors.back()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_messages_accumulate_until_flushed() {
        let mut log = StatusLog::new();
        log.status("one");
        log.status("two");
        assert_eq!(log.take_pending(" | "), "one | two");
        assert_eq!(log.take_pending(" | "), "");
        assert_eq!(log.history().count(), 2);
    }

    #[test]
    fn test_rings_are_bounded() {
        let mut log = StatusLog::new();
        for i in 0..150 {
            log.status(format!("s{i}"));
            log.error(ErrorRecord {
                keys: "x".into(),
                summary: format!("e{i}"),
                chain: vec![],
            });
        }
        assert_eq!(log.history().count(), STATUS_HISTORY_LEN);
        assert_eq!(log.history().next().map(String::as_str), Some("s50"));
        assert_eq!(log.errors().count(), ERROR_HISTORY_LEN);
        assert_eq!(log.last_error().map(|e| e.summary.as_str()), Some("e149"));
        assert_eq!(log.previous().map(String::as_str), Some("s149"));
    }
}
