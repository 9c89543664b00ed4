//! Notification sink consumed by the workflow for success/error/info messages.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::{error, info};

/// Fire-and-forget message surface (toasts, status bar, log).
pub trait NotificationSink {
    fn show_success(&self, text: &str);
    fn show_error(&self, text: &str);
    fn show_info(&self, text: &str);
}

impl<S: NotificationSink + ?Sized> NotificationSink for Arc<S> {
    fn show_success(&self, text: &str) {
        (**self).show_success(text);
    }

    fn show_error(&self, text: &str) {
        (**self).show_error(text);
    }

    fn show_info(&self, text: &str) {
        (**self).show_info(text);
    }
}

/// Writes notifications to the tracing subscriber.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn show_success(&self, text: &str) {
        info!(kind = "success", "{text}");
    }

    fn show_error(&self, text: &str) {
        error!(kind = "error", "{text}");
    }

    fn show_info(&self, text: &str) {
        info!(kind = "info", "{text}");
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Success(String),
    Error(String),
    Info(String),
}

/// Keeps every notification in order. Clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    log: Arc<Mutex<Vec<Notification>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn last(&self) -> Option<Notification> {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }

    pub fn errors(&self) -> Vec<String> {
        self.notifications()
            .into_iter()
            .filter_map(|n| match n {
                Notification::Error(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.log.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }

    fn push(&self, notification: Notification) {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notification);
    }
}

impl NotificationSink for RecordingSink {
    fn show_success(&self, text: &str) {
        self.push(Notification::Success(text.to_string()));
    }

    fn show_error(&self, text: &str) {
        self.push(Notification::Error(text.to_string()));
    }

    fn show_info(&self, text: &str) {
        self.push(Notification::Info(text.to_string()));
    }
}
