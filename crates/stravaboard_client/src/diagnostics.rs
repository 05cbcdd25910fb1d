//! Diagnostics for conditions that are absorbed instead of returned as errors.
//!
//! Fetching and tidying never fail; whatever went wrong along the way is
//! reported to a [`DiagnosticSink`] so callers can log, capture or drop it.

use std::fmt;
use std::sync::{Arc, Mutex};

#[derive(Clone, Debug, PartialEq)]
pub enum Diagnostic {
    /// Non-success HTTP status. `body` is truncated.
    ApiStatus { page: u32, status: u16, body: String },
    /// Success status whose body was not a list of activities.
    ApiErrorPayload { page: u32, message: String },
    /// Connection, timeout or body-read failure.
    Transport { page: u32, message: String },
    /// A page element that was not a JSON object; it is skipped.
    NonObjectRecord { page: u32, index: usize },
    /// Nothing to tidy.
    NoData,
    /// Input handed to the tidier was not a collection of records.
    MalformedInput { detail: String },
    /// No record carries the source field of a derived column.
    MissingColumn { column: &'static str },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::ApiStatus { page, status, body } => {
                write!(f, "page {page}: api returned status {status}: {body}")
            }
            Diagnostic::ApiErrorPayload { page, message } => {
                write!(f, "page {page}: api returned an error payload: {message}")
            }
            Diagnostic::Transport { page, message } => {
                write!(f, "page {page}: request failed: {message}")
            }
            Diagnostic::NonObjectRecord { page, index } => {
                write!(f, "page {page}: element {index} is not an activity object")
            }
            Diagnostic::NoData => write!(f, "no activity data to tidy"),
            Diagnostic::MalformedInput { detail } => {
                write!(f, "activity data is not a record collection: {detail}")
            }
            Diagnostic::MissingColumn { column } => write!(f, "missing '{column}' column"),
        }
    }
}

pub trait DiagnosticSink: Send + Sync {
    fn report(&self, diagnostic: Diagnostic);
}

impl<T: DiagnosticSink + ?Sized> DiagnosticSink for Arc<T> {
    fn report(&self, diagnostic: Diagnostic) {
        (**self).report(diagnostic)
    }
}

/// Emits every diagnostic as a `tracing` warning. The default sink.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn report(&self, diagnostic: Diagnostic) {
        match &diagnostic {
            Diagnostic::ApiStatus { page, status, .. } => {
                tracing::warn!(page, status, "{}", diagnostic)
            }
            Diagnostic::ApiErrorPayload { page, .. }
            | Diagnostic::Transport { page, .. }
            | Diagnostic::NonObjectRecord { page, .. } => tracing::warn!(page, "{}", diagnostic),
            Diagnostic::MissingColumn { column } => tracing::warn!(column, "{}", diagnostic),
            Diagnostic::NoData | Diagnostic::MalformedInput { .. } => {
                tracing::warn!("{}", diagnostic)
            }
        }
    }
}

/// Drops everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl DiagnosticSink for NullSink {
    fn report(&self, _diagnostic: Diagnostic) {}
}

/// Keeps diagnostics in memory, in report order.
#[derive(Debug, Default)]
pub struct CollectingSink {
    events: Mutex<Vec<Diagnostic>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Diagnostic> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Drain collected diagnostics.
    pub fn take(&self) -> Vec<Diagnostic> {
        std::mem::take(
            &mut *self
                .events
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        )
    }
}

impl DiagnosticSink for CollectingSink {
    fn report(&self, diagnostic: Diagnostic) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(diagnostic);
    }
}
