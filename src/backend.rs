//! Collaborator traits: document source, rasterizer, texture plumbing
//!
//! The viewer core never parses documents or touches GPU surfaces itself.
//! Hosts implement these traits over their native rendering library and
//! texture registry; the core only sequences the calls.

use std::sync::Arc;

use crate::geometry::{RectF, SizeF};
use crate::types::{PixelBuffer, TextureId};

/// Errors surfaced by collaborator implementations
#[derive(Debug, thiserror::Error)]
pub enum SourceFault {
    #[error("page {page} out of range 1..={count}")]
    PageOutOfRange { page: usize, count: usize },

    #[error("invalid render region: {detail}")]
    InvalidRegion { detail: String },

    #[error("failed to open page: {detail}")]
    Open { detail: String },

    #[error("render failed: {detail}")]
    Render { detail: String },
}

impl SourceFault {
    pub fn open(msg: impl Into<String>) -> Self {
        Self::Open { detail: msg.into() }
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render { detail: msg.into() }
    }
}

/// A sub-rectangle of a page to rasterize.
///
/// All coordinates are in output pixels at the target resolution:
/// `full_width`/`full_height` is the whole page at that resolution and
/// `src_*` select the part of it to produce. Zero `src_width`/`src_height`
/// defaults to the full page; negative or non-finite values are programmer
/// errors and fail validation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderRegion {
    pub src_x: f32,
    pub src_y: f32,
    pub src_width: f32,
    pub src_height: f32,
    /// Full page width at the target resolution, in pixels
    pub full_width: u32,
    /// Full page height at the target resolution, in pixels
    pub full_height: u32,
    /// Whether the rasterizer should fill the background (white) first
    pub background_fill: bool,
    /// Device pixel ratio the region was computed for
    pub device_scale: f32,
}

impl RenderRegion {
    /// Region covering the entire page at the given pixel size
    #[must_use]
    pub fn full_page(full_width: u32, full_height: u32) -> Self {
        Self {
            src_x: 0.0,
            src_y: 0.0,
            src_width: 0.0,
            src_height: 0.0,
            full_width,
            full_height,
            background_fill: true,
            device_scale: 1.0,
        }
    }

    /// Validate the region and resolve the effective source rectangle,
    /// applying the zero-means-full-page default.
    pub fn resolve(&self) -> Result<RectF, SourceFault> {
        let values = [self.src_x, self.src_y, self.src_width, self.src_height];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(SourceFault::InvalidRegion {
                detail: format!("non-finite source rectangle: {values:?}"),
            });
        }
        if self.src_width < 0.0 || self.src_height < 0.0 {
            return Err(SourceFault::InvalidRegion {
                detail: format!(
                    "negative source dimensions: {}x{}",
                    self.src_width, self.src_height
                ),
            });
        }
        if self.full_width == 0 || self.full_height == 0 {
            return Err(SourceFault::InvalidRegion {
                detail: format!(
                    "zero full-page dimensions: {}x{}",
                    self.full_width, self.full_height
                ),
            });
        }
        if !self.device_scale.is_finite() || self.device_scale <= 0.0 {
            return Err(SourceFault::InvalidRegion {
                detail: format!("invalid device scale: {}", self.device_scale),
            });
        }

        let width = if self.src_width == 0.0 {
            self.full_width as f32
        } else {
            self.src_width
        };
        let height = if self.src_height == 0.0 {
            self.full_height as f32
        } else {
            self.src_height
        };

        Ok(RectF::new(self.src_x, self.src_y, width, height))
    }
}

/// Document handle provider.
///
/// Shared with the worker pool via `Arc`; `open_page` may be slow and is
/// guaranteed by the scheduler to be called at most once per page per
/// document lifetime.
pub trait PageSource: Send + Sync {
    /// Number of pages in the document
    fn page_count(&self) -> usize;

    /// Open a page by 1-based number
    fn open_page(&self, page_number: usize) -> Result<Arc<dyn PageHandle>, SourceFault>;
}

/// An opened page: size queries plus sub-rectangle rasterization.
///
/// Safe to call concurrently for different pages; the scheduler serializes
/// requests per page and per overlay buffer slot.
pub trait PageHandle: Send + Sync {
    /// Natural page size in points (72 dpi units)
    fn size(&self) -> SizeF;

    /// Rasterize a sub-rectangle of the page into RGBA pixels
    fn render_region(&self, region: &RenderRegion) -> Result<PixelBuffer, SourceFault>;
}

/// Host-side texture registry.
///
/// Called only from the interactive thread, after worker results have been
/// pumped back; the core never holds a texture across a dispose.
pub trait TexturePool {
    /// Allocate a texture of the given pixel size
    fn allocate(&mut self, width: u32, height: u32) -> TextureId;

    /// Upload pixel contents into a texture
    fn update(&mut self, id: TextureId, pixels: &PixelBuffer);

    /// Release a texture
    fn dispose(&mut self, id: TextureId);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_source_defaults_to_full_page() {
        let region = RenderRegion::full_page(200, 300);
        let src = region.resolve().expect("valid");
        assert_eq!(src, RectF::new(0.0, 0.0, 200.0, 300.0));
    }

    #[test]
    fn negative_dimensions_fail_fast() {
        let region = RenderRegion {
            src_width: -10.0,
            ..RenderRegion::full_page(200, 300)
        };
        assert!(matches!(
            region.resolve(),
            Err(SourceFault::InvalidRegion { .. })
        ));
    }

    #[test]
    fn zero_full_page_is_invalid() {
        let region = RenderRegion::full_page(0, 300);
        assert!(region.resolve().is_err());
    }

    #[test]
    fn non_finite_source_is_invalid() {
        let region = RenderRegion {
            src_x: f32::NAN,
            ..RenderRegion::full_page(200, 300)
        };
        assert!(region.resolve().is_err());
    }
}
