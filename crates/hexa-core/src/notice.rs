//! User-facing notices (the alerts a screen shows).
//!
//! Screens push notices into a [`NoticeSink`]; the front end drains the
//! matching [`NoticeInbox`] and renders them however it likes.

use std::fmt;

use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub message: String,
}

impl Notice {
    pub fn new(level: NoticeLevel, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            title: title.into(),
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Info, "Info", message)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Success, "Success", message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Error, "Error", message)
    }

    pub fn is_error(&self) -> bool {
        self.level == NoticeLevel::Error
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.title, self.message)
    }
}

/// Sending half. Cheap to clone; sends after the inbox is gone are dropped.
#[derive(Debug, Clone)]
pub struct NoticeSink {
    tx: mpsc::UnboundedSender<Notice>,
}

impl NoticeSink {
    pub fn push(&self, notice: Notice) {
        tracing::debug!(level = ?notice.level, message = %notice.message, "notice");
        let _ = self.tx.send(notice);
    }
}

/// Receiving half.
#[derive(Debug)]
pub struct NoticeInbox {
    rx: mpsc::UnboundedReceiver<Notice>,
}

impl NoticeInbox {
    /// Returns every notice queued so far without waiting.
    pub fn drain(&mut self) -> Vec<Notice> {
        let mut notices = Vec::new();
        while let Ok(notice) = self.rx.try_recv() {
            notices.push(notice);
        }
        notices
    }

    pub async fn recv(&mut self) -> Option<Notice> {
        self.rx.recv().await
    }
}

pub fn channel() -> (NoticeSink, NoticeInbox) {
    let (tx, rx) = mpsc::unbounded_channel();
    (NoticeSink { tx }, NoticeInbox { rx })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_returns_notices_in_order() {
        let (sink, mut inbox) = channel();
        sink.push(Notice::info("first"));
        sink.clone().push(Notice::error("second"));

        let notices = inbox.drain();
        assert_eq!(notices.len(), 2);
        assert_eq!(notices[0].message, "first");
        assert!(notices[1].is_error());
        assert!(inbox.drain().is_empty());
    }

    #[test]
    fn test_push_after_inbox_dropped_is_ignored() {
        let (sink, inbox) = channel();
        drop(inbox);
        sink.push(Notice::success("late"));
    }

    #[test]
    fn test_display() {
        assert_eq!(
            Notice::error("Passwords do not match").to_string(),
            "Error: Passwords do not match"
        );
    }
}
