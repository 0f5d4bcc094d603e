//! Layout engine for investigative relationship graphs.
//!
//! Turns typed nodes and edges into positioned boxes and edge paths for four views:
//! - [`layout::force`]: force-directed neighbor/subgraph exploration
//! - [`layout::column_flow`]: source -> middle -> target relationship columns
//! - [`layout::radial_cluster`]: two overlapping membership circles
//! - [`layout::timeline`]: a date rail with anchor cards and satellites
//!
//! Hosts usually go through [`Orchestrator`], which ingests raw JSON, dispatches on the view mode
//! and returns a serializable [`LayoutOutput`].

pub mod config;
pub mod error;
pub mod geometry;
pub mod graph;
pub mod layout;
pub mod orchestrator;
pub mod output;
pub mod text;

#[cfg(target_arch = "wasm32")]
pub mod wasm;

pub use config::EngineConfig;
pub use error::{Diagnostic, DiagnosticKind, Diagnostics, LayoutError, Result};
pub use geometry::{Point, Rect, Size};
pub use graph::{GraphEdge, GraphNode, GraphSnapshot};
pub use layout::{Layout, LayoutEdge, LayoutNode, LayoutResult};
pub use orchestrator::{LayoutRequest, Orchestrator, ViewMode};
pub use output::LayoutOutput;
pub use text::TextWidthEstimator;
