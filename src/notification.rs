//! Notifications and the notification screen.

use chrono::{DateTime, Local};
use serde::Serialize;
use std::sync::{Arc, Mutex};

/// A message shown to the user outside the current screen
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub received_at: DateTime<Local>,
}

impl Notification {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            received_at: Local::now(),
        }
    }
}

/// Delivers notifications
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: &Notification);
}

/// Prints notifications to stderr
#[derive(Default)]
pub struct TerminalNotifier;

impl Notifier for TerminalNotifier {
    fn notify(&self, notification: &Notification) {
        tracing::info!("Notification: {} - {}", notification.title, notification.body);
        eprintln!(
            "[{}] {}: {}",
            notification.received_at.format("%H:%M:%S"),
            notification.title,
            notification.body
        );
    }
}

/// Screen that displays a static message and the latest notification.
///
/// Clones share the same latest slot, so a clone handed to another
/// component as its [`Notifier`] feeds this screen.
#[derive(Clone)]
pub struct NotificationScreen {
    notifier: Arc<dyn Notifier>,
    latest: Arc<Mutex<Option<Notification>>>,
}

impl NotificationScreen {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self {
            notifier,
            latest: Arc::new(Mutex::new(None)),
        }
    }

    /// Show a message and remember it as the latest notification
    pub fn show(&self, title: &str, body: &str) -> Notification {
        let notification = Notification::new(title, body);
        self.notify(&notification);
        notification
    }

    pub fn latest(&self) -> Option<Notification> {
        self.latest
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl Notifier for NotificationScreen {
    fn notify(&self, notification: &Notification) {
        self.notifier.notify(notification);
        *self
            .latest
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(notification.clone());
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Keeps every delivered notification
    #[derive(Default)]
    pub struct RecordingNotifier {
        pub delivered: Mutex<Vec<Notification>>,
    }

    impl RecordingNotifier {
        pub fn titles(&self) -> Vec<String> {
            self.delivered
                .lock()
                .unwrap()
                .iter()
                .map(|n| n.title.clone())
                .collect()
        }
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, notification: &Notification) {
            self.delivered.lock().unwrap().push(notification.clone());
        }
    }
}
