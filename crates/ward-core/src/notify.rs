//! Operator-facing notifications.
//!
//! Every operation brackets its work with `processing_started` / `processing_finished` so a
//! front end can show a busy indicator, and emits one transient message for its terminal
//! outcome plus one per non-fatal warning.

use serde::Serialize;
use std::sync::Mutex;

pub const MSG_DISCHARGED: &str = "Patient has been discharged successfully. All records archived.";
pub const MSG_ARCHIVAL_RESUMED: &str = "Archival of discharged patient records completed.";
pub const MSG_ALREADY_DISCHARGED: &str =
    "This patient has already been discharged and cannot be discharged again.";
pub const MSG_NOT_DISCHARGED: &str =
    "This patient has not been discharged yet, so there is nothing to archive.";
pub const MSG_MISSING_FIELDS: &str = "Please fill in all required fields";
pub const MSG_ADMISSION_READ_FAILED: &str = "Failed to retrieve admission data. Please try again.";
pub const MSG_STATUS_CHECK_FAILED: &str = "Failed to check admission status. Please try again.";
pub const MSG_DISCHARGE_FAILED: &str = "Failed to discharge patient. Please try again.";
pub const MSG_PATIENT_DELETED: &str = "Patient has been deleted successfully.";
pub const MSG_PATIENT_DELETE_FAILED: &str = "Failed to delete patient. Please try again.";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    StatusCheck,
    Discharge,
    ResumeArchival,
    DeletePatient,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Operation::StatusCheck => "status check",
            Operation::Discharge => "discharge",
            Operation::ResumeArchival => "resume archival",
            Operation::DeletePatient => "delete patient",
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Info,
    Warning,
    Error,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub level: Level,
    pub message: String,
}

impl Notification {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: Level::Info,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: Level::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: Level::Error,
            message: message.into(),
        }
    }
}

pub trait Notifier: Send + Sync {
    fn processing_started(&self, operation: Operation);

    fn processing_finished(&self, operation: Operation);

    fn notify(&self, notification: Notification);
}

impl<N: Notifier + ?Sized> Notifier for std::sync::Arc<N> {
    fn processing_started(&self, operation: Operation) {
        (**self).processing_started(operation);
    }

    fn processing_finished(&self, operation: Operation) {
        (**self).processing_finished(operation);
    }

    fn notify(&self, notification: Notification) {
        (**self).notify(notification);
    }
}

/// Emits notifications as `tracing` events.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn processing_started(&self, operation: Operation) {
        tracing::debug!(%operation, "processing started");
    }

    fn processing_finished(&self, operation: Operation) {
        tracing::debug!(%operation, "processing finished");
    }

    fn notify(&self, notification: Notification) {
        match notification.level {
            Level::Info => tracing::info!("{}", notification.message),
            Level::Warning => tracing::warn!("{}", notification.message),
            Level::Error => tracing::error!("{}", notification.message),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NotifierEvent {
    Started(Operation),
    Finished(Operation),
    Message(Notification),
}

/// Keeps every event in order. Used by tests, and by the REST layer to echo messages back.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<NotifierEvent>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<NotifierEvent> {
        self.lock().clone()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.lock()
            .iter()
            .filter_map(|event| match event {
                NotifierEvent::Message(notification) => Some(notification.clone()),
                _ => None,
            })
            .collect()
    }

    /// True between a `processing_started` and its matching `processing_finished`.
    pub fn is_processing(&self, operation: Operation) -> bool {
        let mut depth = 0i32;
        for event in self.lock().iter() {
            match event {
                NotifierEvent::Started(op) if *op == operation => depth += 1,
                NotifierEvent::Finished(op) if *op == operation => depth -= 1,
                _ => {}
            }
        }
        depth > 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<NotifierEvent>> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Notifier for RecordingNotifier {
    fn processing_started(&self, operation: Operation) {
        self.lock().push(NotifierEvent::Started(operation));
    }

    fn processing_finished(&self, operation: Operation) {
        self.lock().push(NotifierEvent::Finished(operation));
    }

    fn notify(&self, notification: Notification) {
        self.lock().push(NotifierEvent::Message(notification));
    }
}

/// Fans every event out to two notifiers.
pub struct Tee<A, B>(pub A, pub B);

impl<A: Notifier, B: Notifier> Notifier for Tee<A, B> {
    fn processing_started(&self, operation: Operation) {
        self.0.processing_started(operation);
        self.1.processing_started(operation);
    }

    fn processing_finished(&self, operation: Operation) {
        self.0.processing_finished(operation);
        self.1.processing_finished(operation);
    }

    fn notify(&self, notification: Notification) {
        self.0.notify(notification.clone());
        self.1.notify(notification);
    }
}
