//! User-facing notifications and the callback registry that delivers them.
//!
//! Components that need to tell the UI something receive a [`Notifier`] at
//! construction; nothing is dispatched through shared global state.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// How prominently a notification should be shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NotificationLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// What a notification is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NotificationTopic {
    /// First attempt failed, retrying without flux history
    Retry,
    /// Result arrived through the reduced-fidelity path
    DegradedResult,
    /// Both attempts failed
    FetchFailed,
    /// A byproduct reached its toxicity threshold
    Toxicity,
    /// Health probe failed
    ServiceUnreachable,
}

/// A toast-style message for the view layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub level: NotificationLevel,
    pub topic: NotificationTopic,
    pub message: String,
    /// How long the view should keep it on screen
    pub dismiss_after: Duration,
}

impl Notification {
    /// Display time of every toast (the dashboard hides them after 4s).
    pub const DEFAULT_DISMISS_AFTER: Duration = Duration::from_secs(4);

    pub fn new(level: NotificationLevel, topic: NotificationTopic, message: impl Into<String>) -> Self {
        Self {
            level,
            topic,
            message: message.into(),
            dismiss_after: Self::DEFAULT_DISMISS_AFTER,
        }
    }
}

type Callback = Arc<dyn Fn(&Notification) + Send + Sync>;

/// Immutable registry of notification callbacks.
///
/// Cloning shares the same subscribers. Subscribers are fixed once the
/// notifier is handed to its components.
#[derive(Clone, Default)]
pub struct Notifier {
    callbacks: Arc<Vec<Callback>>,
}

impl Notifier {
    /// Creates a notifier with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a notifier that additionally invokes `callback`.
    pub fn with_subscriber<F>(self, callback: F) -> Self
    where
        F: Fn(&Notification) + Send + Sync + 'static,
    {
        let mut callbacks: Vec<Callback> = self.callbacks.iter().cloned().collect();
        callbacks.push(Arc::new(callback));
        Self {
            callbacks: Arc::new(callbacks),
        }
    }

    /// Creates a notifier that forwards every notification into a channel.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let notifier = Self::new().with_subscriber(move |n: &Notification| {
            let _ = tx.send(n.clone());
        });
        (notifier, rx)
    }

    /// Delivers `notification` to every subscriber in registration order.
    pub fn notify(&self, notification: Notification) {
        tracing::debug!(
            level = ?notification.level,
            topic = ?notification.topic,
            "{}",
            notification.message
        );
        for callback in self.callbacks.iter() {
            callback(&notification);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.callbacks.len()
    }
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("subscribers", &self.callbacks.len())
            .finish()
    }
}
