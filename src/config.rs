//! Viewer configuration
//!
//! Every tunable lives here rather than as a hard-coded constant. The
//! eviction distances in particular are empirical values with no derivation
//! behind them, so hosts are expected to adjust them per platform.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::geometry::SizeF;

fn default_full_purge_distance() -> f32 {
    33.0
}

fn default_overlay_release_distance() -> f32 {
    8.0
}

fn default_preview_margin_px() -> f32 {
    400.0
}

fn default_overlay_debounce_ms() -> u64 {
    100
}

fn default_page_padding() -> f32 {
    8.0
}

fn default_workers() -> usize {
    2
}

fn default_device_scale() -> f32 {
    1.0
}

fn default_page_size() -> SizeF {
    // US Letter in points, used until page 1 resolves
    SizeF::new(612.0, 792.0)
}

/// Tunable parameters for the tile cache and render scheduler
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewerConfig {
    /// Normalized distance from the viewport center beyond which a page's
    /// preview and overlay textures are all released
    #[serde(default = "default_full_purge_distance")]
    pub full_purge_distance: f32,

    /// Normalized distance beyond which only the overlay textures are
    /// released (the cheap preview is kept)
    #[serde(default = "default_overlay_release_distance")]
    pub overlay_release_distance: f32,

    /// Extra screen-pixel margin around the exposed rectangle when picking
    /// preview candidates, so pages just off-screen arrive pre-rendered
    #[serde(default = "default_preview_margin_px")]
    pub preview_margin_px: f32,

    /// Quiet interval after the last viewport change before the real-size
    /// overlay pass runs
    #[serde(default = "default_overlay_debounce_ms")]
    pub overlay_debounce_ms: u64,

    /// Gap between pages and around the page flow, in layout units
    #[serde(default = "default_page_padding")]
    pub page_padding: f32,

    /// Render worker thread count
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Device pixel ratio applied to overlay resolution
    #[serde(default = "default_device_scale")]
    pub device_scale: f32,

    /// Placeholder page size in points until page 1 resolves
    #[serde(default = "default_page_size")]
    pub default_page_size: SizeF,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            full_purge_distance: default_full_purge_distance(),
            overlay_release_distance: default_overlay_release_distance(),
            preview_margin_px: default_preview_margin_px(),
            overlay_debounce_ms: default_overlay_debounce_ms(),
            page_padding: default_page_padding(),
            workers: default_workers(),
            device_scale: default_device_scale(),
            default_page_size: default_page_size(),
        }
    }
}

impl ViewerConfig {
    /// The overlay debounce interval as a [`Duration`]
    #[must_use]
    pub fn overlay_debounce(&self) -> Duration {
        Duration::from_millis(self.overlay_debounce_ms)
    }
}
