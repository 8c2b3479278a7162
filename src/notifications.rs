use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

use crate::mastery_engine::ProgressionEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Success,
    Error,
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub message: String,
    pub severity: Severity,
}

impl Notification {
    pub fn new(message: impl Into<String>, severity: Severity) -> Self {
        Self {
            message: message.into(),
            severity,
        }
    }

    /// Learner-facing message for an event, if it deserves one.
    pub fn from_event(event: &ProgressionEvent) -> Option<Self> {
        match event {
            ProgressionEvent::LevelUp { level } => Some(Notification::new(
                format!("Level Up! Level {}", level),
                Severity::Success,
            )),
            ProgressionEvent::BossDefeated { badge, .. } => Some(Notification::new(
                format!("Boss defeated! You earned the \"{}\" badge", badge),
                Severity::Success,
            )),
            ProgressionEvent::XpGained { .. } => None,
        }
    }
}

/// Fire-and-forget receiver of learner notifications.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);

    fn publish_events(&self, events: &[ProgressionEvent]) {
        for notification in events.iter().filter_map(Notification::from_event) {
            self.notify(notification);
        }
    }
}

/// Writes notifications to the log.
#[derive(Debug, Clone, Default)]
pub struct TracingNotifier;

impl NotificationSink for TracingNotifier {
    fn notify(&self, notification: Notification) {
        match notification.severity {
            Severity::Error => warn!(component = "notifications", message = %notification.message, "Learner notification"),
            Severity::Success | Severity::Info => info!(
                component = "notifications",
                severity = ?notification.severity,
                message = %notification.message,
                "Learner notification"
            ),
        }
    }
}

/// Forwards notifications over an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    sender: UnboundedSender<Notification>,
}

impl ChannelNotifier {
    pub fn channel() -> (Self, UnboundedReceiver<Notification>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl NotificationSink for ChannelNotifier {
    fn notify(&self, notification: Notification) {
        if self.sender.send(notification).is_err() {
            debug!(component = "notifications", "Notification receiver dropped");
        }
    }
}
