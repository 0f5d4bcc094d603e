//! Text measurement for box sizing.
//!
//! The engine never renders text. It only needs widths to size boxes, so measurement is an injected
//! capability: the wasm host plugs in a canvas-backed estimator, headless callers and tests use one
//! of the deterministic ones below.

use std::collections::HashMap;

/// Maps (text, font size in px, font family) to a pixel width.
pub trait TextWidthEstimator {
    fn width(&self, text: &str, font_size: f64, font_family: &str) -> f64;
}

impl<T: TextWidthEstimator + ?Sized> TextWidthEstimator for &T {
    fn width(&self, text: &str, font_size: f64, font_family: &str) -> f64 {
        (**self).width(text, font_size, font_family)
    }
}

/// Every character is `factor * font_size` wide.
#[derive(Debug, Clone, Copy)]
pub struct ApproxCharWidth {
    pub factor: f64,
}

impl Default for ApproxCharWidth {
    fn default() -> Self {
        Self { factor: 0.55 }
    }
}

impl TextWidthEstimator for ApproxCharWidth {
    fn width(&self, text: &str, font_size: f64, _font_family: &str) -> f64 {
        text.chars().count() as f64 * font_size * self.factor
    }
}

/// Per-character advance widths in em units, with a fallback for unknown characters.
#[derive(Debug, Clone)]
pub struct MetricTable {
    advances: HashMap<char, f64>,
    fallback: f64,
}

impl MetricTable {
    pub fn new(fallback: f64) -> Self {
        Self { advances: HashMap::new(), fallback }
    }

    pub fn with(mut self, chars: &str, advance: f64) -> Self {
        for ch in chars.chars() {
            self.advances.insert(ch, advance);
        }
        self
    }

    /// Rough sans-serif proportions: narrow punctuation, wide capitals.
    pub fn sans() -> Self {
        Self::new(0.55)
            .with("il.,:;'|!", 0.25)
            .with("fjrt()[] ", 0.32)
            .with("abcdeghknopqsuvxyz0123456789$", 0.55)
            .with("mw", 0.85)
            .with("ABCDEFGHJKLNOPQRSTUVXYZ", 0.68)
            .with("MW", 0.9)
            .with("I", 0.3)
    }
}

impl TextWidthEstimator for MetricTable {
    fn width(&self, text: &str, font_size: f64, _font_family: &str) -> f64 {
        text.chars()
            .map(|ch| self.advances.get(&ch).copied().unwrap_or(self.fallback))
            .sum::<f64>()
            * font_size
    }
}

/// Cut `text` to `max_chars` characters and append `...` when it was longer.
pub fn truncate_label(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push_str("...");
    out
}
