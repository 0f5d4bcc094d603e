//! Error and diagnostic types.
//!
//! Only caller bugs become a `LayoutError`. Dirty data (a missing date, an edge pointing at a node
//! that isn't in the snapshot) is recorded as a `Diagnostic` and the offending item is skipped.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    #[error("expected `{field}` to be an array")]
    NotACollection { field: String },
    #[error("invalid layout request: {0}")]
    InvalidRequest(String),
    #[error("layout run was cancelled by a newer request")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, LayoutError>;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DiagnosticKind {
    MalformedItem,
    DanglingReference,
    UnparseableDate,
    Truncated,
}

/// One reported problem with the input. `subject` is the id or label it concerns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub subject: String,
    pub message: String,
}

/// Collecting sink handed to ingestion and to every layout.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&mut self, kind: DiagnosticKind, subject: impl Into<String>, message: impl Into<String>) {
        let subject = subject.into();
        let message = message.into();
        match kind {
            DiagnosticKind::Truncated => tracing::debug!(?kind, %subject, "{message}"),
            _ => tracing::warn!(?kind, %subject, "{message}"),
        }
        self.items.push(Diagnostic { kind, subject, message });
    }

    pub fn items(&self) -> &[Diagnostic] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.items.iter().filter(|d| d.kind == kind).count()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.items
    }
}
