use serde::Serialize;
use tokio::sync::broadcast;

/// Broadcast channel capacity; slow consumers lose oldest toasts.
const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Warn,
    Error,
}

/// A user-facing progress toast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Toast {
    pub message: String,
    pub severity: Severity,
}

/// Fire-and-forget toast sink for cycle progress.
///
/// Messages are mirrored to tracing and fanned out to whatever transient
/// consumers are subscribed; with no subscribers they are dropped.
pub struct ProgressSink {
    tx: broadcast::Sender<Toast>,
}

impl ProgressSink {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn notify(&self, message: impl Into<String>, severity: Severity) {
        let message = message.into();
        match severity {
            Severity::Info | Severity::Success => tracing::info!("{}", message),
            Severity::Warn => tracing::warn!("{}", message),
            Severity::Error => tracing::error!("{}", message),
        }
        let _ = self.tx.send(Toast { message, severity });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Toast> {
        self.tx.subscribe()
    }
}

impl Default for ProgressSink {
    fn default() -> Self {
        Self::new()
    }
}
