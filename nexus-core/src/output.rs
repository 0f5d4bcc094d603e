//! Output envelope for the rendering host.
//!
//! Every request gets exactly one `LayoutOutput`, serialized to JSON. A failed request still
//! carries `result: {"status":"empty"}` so the renderer always has something to draw.

use serde::Serialize;

use crate::error::{Diagnostic, LayoutError};
use crate::layout::LayoutResult;

/// Error information for the host's toast/console.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorInfo {
    /// `notACollection`, `invalidRequest` or `cancelled`
    pub kind: &'static str,
    pub message: String,
}

impl From<&LayoutError> for ErrorInfo {
    fn from(err: &LayoutError) -> Self {
        let kind = match err {
            LayoutError::NotACollection { .. } => "notACollection",
            LayoutError::InvalidRequest(_) => "invalidRequest",
            LayoutError::Cancelled => "cancelled",
        };
        Self { kind, message: err.to_string() }
    }
}

/// The combined output sent to the renderer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutOutput {
    pub view_id: String,
    pub result: LayoutResult,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

impl LayoutOutput {
    pub fn ready(view_id: impl Into<String>, result: LayoutResult, diagnostics: Vec<Diagnostic>) -> Self {
        Self { view_id: view_id.into(), result, diagnostics, error: None }
    }

    pub fn failed(view_id: impl Into<String>, err: &LayoutError, diagnostics: Vec<Diagnostic>) -> Self {
        Self { view_id: view_id.into(), result: LayoutResult::Empty, diagnostics, error: Some(err.into()) }
    }

    pub fn is_cancelled(&self) -> bool {
        self.error.as_ref().is_some_and(|e| e.kind == "cancelled")
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            tracing::error!(error = %e, "failed to serialize layout output");
            r#"{"result":{"status":"empty"},"error":{"kind":"invalidRequest","message":"serialization failed"}}"#
                .to_string()
        })
    }
}
