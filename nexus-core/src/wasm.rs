//! WASM bindings for the nexus-core library.
//!
//! All functions exposed to JavaScript via wasm-bindgen are defined here. Requests and results
//! cross the boundary as JSON strings.

use std::cell::OnceCell;

use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::CanvasRenderingContext2d;

use crate::config::EngineConfig;
use crate::orchestrator::Orchestrator;
use crate::text::{ApproxCharWidth, TextWidthEstimator};

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = console, js_name = error)]
    pub fn console_error(s: &str);
}

/// Measures text with an offscreen canvas, falling back to a per-character estimate when no
/// document is available (workers, tests under node).
pub struct CanvasTextWidth {
    context: Option<CanvasRenderingContext2d>,
    fallback: ApproxCharWidth,
}

impl CanvasTextWidth {
    pub fn new() -> Self {
        Self { context: Self::offscreen_context(), fallback: ApproxCharWidth::default() }
    }

    fn offscreen_context() -> Option<CanvasRenderingContext2d> {
        let document = web_sys::window()?.document()?;
        let canvas = document.create_element("canvas").ok()?.dyn_into::<web_sys::HtmlCanvasElement>().ok()?;
        canvas.get_context("2d").ok()??.dyn_into::<CanvasRenderingContext2d>().ok()
    }
}

impl Default for CanvasTextWidth {
    fn default() -> Self {
        Self::new()
    }
}

impl TextWidthEstimator for CanvasTextWidth {
    fn width(&self, text: &str, font_size: f64, font_family: &str) -> f64 {
        let Some(ctx) = &self.context else {
            return self.fallback.width(text, font_size, font_family);
        };
        ctx.set_font(&format!("{font_size}px {font_family}"));
        match ctx.measure_text(text) {
            Ok(metrics) => metrics.width(),
            Err(_) => self.fallback.width(text, font_size, font_family),
        }
    }
}

thread_local! {
    static ORCHESTRATOR: OnceCell<Orchestrator<CanvasTextWidth>> = const { OnceCell::new() };
}

fn with_orchestrator<R>(f: impl FnOnce(&Orchestrator<CanvasTextWidth>) -> R) -> R {
    ORCHESTRATOR.with(|cell| f(cell.get_or_init(|| Orchestrator::with_estimator(CanvasTextWidth::new()))))
}

/// Lay out one view. Takes a `LayoutRequest` as JSON and returns a `LayoutOutput` as JSON.
#[wasm_bindgen]
pub fn layout(request: &str) -> String {
    let output = with_orchestrator(|orch| orch.layout_json(request));
    if let Some(err) = &output.error {
        if !output.is_cancelled() {
            console_error(&format!("Layout failed for view '{}': {}", output.view_id, err.message));
        }
    }
    output.to_json()
}

/// Cancel the in-flight layout for a view. Returns false when nothing was running.
#[wasm_bindgen]
pub fn cancel_layout(view_id: &str) -> bool {
    with_orchestrator(|orch| orch.cancel(view_id))
}

/// Default engine configuration as JSON, for hosts that expose tuning controls.
#[wasm_bindgen]
pub fn default_config() -> String {
    serde_json::to_string(&EngineConfig::default()).unwrap_or_else(|_| "{}".to_string())
}
