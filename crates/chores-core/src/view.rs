//! Collaborators the reconciler reports to: the view that renders the list,
//! the sink for store failures, and the per-screen row binder.

use crate::error::StoreError;
use crate::store::StoreOp;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, error};

/// Receives change notifications so it can re-render.
pub trait View {
    /// The whole list changed.
    fn refreshed(&self);
    fn inserted(&self, position: usize);
    fn changed(&self, position: usize);
    fn removed(&self, position: usize);
}

/// Receives store failures. Nothing is retried.
pub trait ErrorReporter {
    fn report(&self, operation: StoreOp, error: &StoreError);
}

/// Which part of a row was clicked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickTarget {
    Checkbox,
    Label,
}

/// What a click on a row asks the screen to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// Set the row's completion to `checked`.
    Toggle { position: usize, checked: bool },
    /// Open the row for editing.
    Open { position: usize },
}

/// Per-screen strategy that turns an item into a row and a click into an
/// [`Intent`].
pub trait Binder<T> {
    type Row;

    fn bind(&self, item: &T) -> Self::Row;

    fn on_click(&self, position: usize, target: ClickTarget, item: &T) -> Intent;
}

/// A [`View`] that only logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingView;

impl View for LoggingView {
    fn refreshed(&self) {
        debug!("view refreshed");
    }

    fn inserted(&self, position: usize) {
        debug!(position, "row inserted");
    }

    fn changed(&self, position: usize) {
        debug!(position, "row changed");
    }

    fn removed(&self, position: usize) {
        debug!(position, "row removed");
    }
}

/// Default [`ErrorReporter`]: log through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn report(&self, operation: StoreOp, error: &StoreError) {
        error!(%operation, code = %error.code(), "{error}");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
    Refreshed,
    Inserted(usize),
    Changed(usize),
    Removed(usize),
}

/// A [`View`] that records every notification. Clones share the log.
#[derive(Debug, Clone, Default)]
pub struct RecordingView {
    log: Arc<Mutex<Vec<Notification>>>,
}

impl RecordingView {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain everything recorded so far.
    #[must_use]
    pub fn take(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.log.lock().unwrap_or_else(PoisonError::into_inner))
    }

    fn push(&self, notification: Notification) {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notification);
    }
}

impl View for RecordingView {
    fn refreshed(&self) {
        self.push(Notification::Refreshed);
    }

    fn inserted(&self, position: usize) {
        self.push(Notification::Inserted(position));
    }

    fn changed(&self, position: usize) {
        self.push(Notification::Changed(position));
    }

    fn removed(&self, position: usize) {
        self.push(Notification::Removed(position));
    }
}

/// An [`ErrorReporter`] that logs and also keeps every failure. Clones share
/// the record.
#[derive(Debug, Clone, Default)]
pub struct RecordingReporter {
    failures: Arc<Mutex<Vec<(StoreOp, StoreError)>>>,
}

impl RecordingReporter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn take(&self) -> Vec<(StoreOp, StoreError)> {
        std::mem::take(&mut *self.failures.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl ErrorReporter for RecordingReporter {
    fn report(&self, operation: StoreOp, error: &StoreError) {
        TracingReporter.report(operation, error);
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((operation, error.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::{ErrorReporter, Notification, RecordingReporter, RecordingView, View};
    use crate::error::StoreError;
    use crate::store::StoreOp;

    #[test]
    fn recording_view_clones_share_the_log() {
        let view = RecordingView::new();
        let handle = view.clone();
        view.inserted(2);
        view.refreshed();
        assert_eq!(
            handle.take(),
            vec![Notification::Inserted(2), Notification::Refreshed]
        );
        assert!(view.take().is_empty());
    }

    #[test]
    fn recording_reporter_keeps_failures() {
        let reporter = RecordingReporter::new();
        reporter.report(StoreOp::Delete, &StoreError::DeleteFailed("gone".into()));
        let failures = reporter.take();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, StoreOp::Delete);
    }
}
