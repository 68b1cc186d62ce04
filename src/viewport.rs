//! Viewport tracking
//!
//! Single source of truth for the current view transform and viewport size.
//! Rapid mutations coalesce into one pending-change flag that the scheduler
//! drains once per turn, so a drag gesture triggers one recompute per tick
//! rather than one per event.

use log::debug;

use crate::geometry::{PointF, RectF, SizeF, ViewTransform};

/// Owns the pan/zoom transform and the viewport's pixel size
#[derive(Debug)]
pub struct ViewportTracker {
    transform: ViewTransform,
    viewport_size: SizeF,
    content_size: SizeF,
    changed: bool,
}

impl ViewportTracker {
    #[must_use]
    pub fn new(viewport_size: SizeF) -> Self {
        Self {
            transform: ViewTransform::default(),
            viewport_size,
            content_size: SizeF::ZERO,
            changed: false,
        }
    }

    #[must_use]
    pub fn transform(&self) -> ViewTransform {
        self.transform
    }

    #[must_use]
    pub fn viewport_size(&self) -> SizeF {
        self.viewport_size
    }

    #[must_use]
    pub fn content_size(&self) -> SizeF {
        self.content_size
    }

    /// Replace the transform. Scale and offset are clamped to the content
    /// bounds; a no-op change does not raise the change flag.
    pub fn set_transform(&mut self, transform: ViewTransform) {
        let scale = ViewTransform::clamp_scale(transform.scale);
        let clamped = ViewTransform {
            offset: self.clamp_offset(transform.offset, scale),
            scale,
        };

        if clamped != self.transform {
            debug!(
                "transform changed: offset=({:.1},{:.1}) scale={:.3}",
                clamped.offset.x, clamped.offset.y, clamped.scale
            );
            self.transform = clamped;
            self.changed = true;
        }
    }

    /// Update the viewport's pixel size (e.g. on window resize)
    pub fn set_viewport_size(&mut self, size: SizeF) {
        if size != self.viewport_size {
            self.viewport_size = size;
            self.transform.offset = self.clamp_offset(self.transform.offset, self.transform.scale);
            self.changed = true;
        }
    }

    /// Update the laid-out content size; the offset is re-clamped so the
    /// viewport never points past the document after a relayout shrinks it.
    pub fn set_content_size(&mut self, size: SizeF) {
        if size != self.content_size {
            self.content_size = size;
            self.transform.offset = self.clamp_offset(self.transform.offset, self.transform.scale);
            self.changed = true;
        }
    }

    /// Drain the coalesced change flag. Any number of mutations since the
    /// last drain report as a single change.
    pub fn take_changed(&mut self) -> bool {
        std::mem::take(&mut self.changed)
    }

    /// The document-space rectangle currently visible, expanded by `inflate`
    /// document-space units on every side
    #[must_use]
    pub fn exposed_rect(&self, inflate: f32) -> RectF {
        let scale = self.transform.scale;
        RectF::new(
            self.transform.offset.x / scale,
            self.transform.offset.y / scale,
            self.viewport_size.width / scale,
            self.viewport_size.height / scale,
        )
        .inflated(inflate)
    }

    /// The viewport in screen coordinates
    #[must_use]
    pub fn screen_rect(&self) -> RectF {
        RectF::new(0.0, 0.0, self.viewport_size.width, self.viewport_size.height)
    }

    /// Map a document-space rectangle to its on-screen position
    #[must_use]
    pub fn zoomed_rect(&self, doc_rect: RectF) -> RectF {
        self.transform.rect_to_screen(doc_rect)
    }

    /// Transform that zooms to `target_scale` while keeping the document
    /// point under the screen position `center` fixed
    #[must_use]
    pub fn zoom_matrix(&self, target_scale: f32, center: PointF) -> ViewTransform {
        let target = ViewTransform::clamp_scale(target_scale);
        let ratio = target / self.transform.scale;
        let offset = PointF::new(
            (self.transform.offset.x + center.x) * ratio - center.x,
            (self.transform.offset.y + center.y) * ratio - center.y,
        );

        ViewTransform {
            offset: self.clamp_offset(offset, target),
            scale: target,
        }
    }

    /// Clamp an offset to `[0, content*scale - viewport]` per axis
    #[must_use]
    pub fn clamp_offset(&self, offset: PointF, scale: f32) -> PointF {
        let max_x = (self.content_size.width * scale - self.viewport_size.width).max(0.0);
        let max_y = (self.content_size.height * scale - self.viewport_size.height).max(0.0);
        PointF::new(offset.x.clamp(0.0, max_x), offset.y.clamp(0.0, max_y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> ViewportTracker {
        let mut t = ViewportTracker::new(SizeF::new(400.0, 600.0));
        t.set_content_size(SizeF::new(400.0, 1760.0));
        t.take_changed();
        t
    }

    #[test]
    fn mutations_coalesce_into_one_change() {
        let mut t = tracker();

        t.set_transform(ViewTransform::new(PointF::new(0.0, 100.0), 1.0));
        t.set_transform(ViewTransform::new(PointF::new(0.0, 200.0), 1.0));
        t.set_transform(ViewTransform::new(PointF::new(0.0, 300.0), 1.0));

        assert!(t.take_changed());
        assert!(!t.take_changed());
        assert_eq!(t.transform().offset, PointF::new(0.0, 300.0));
    }

    #[test]
    fn identical_transform_is_not_a_change() {
        let mut t = tracker();
        t.set_transform(ViewTransform::default());
        assert!(!t.take_changed());
    }

    #[test]
    fn offset_clamps_to_content_bounds() {
        let mut t = tracker();

        t.set_transform(ViewTransform::new(PointF::new(500.0, 99_999.0), 1.0));
        let got = t.transform();
        // content is exactly viewport-wide at scale 1, so x pins to 0
        assert_eq!(got.offset, PointF::new(0.0, 1160.0));
    }

    #[test]
    fn offset_never_negative() {
        let mut t = tracker();
        t.set_transform(ViewTransform::new(PointF::new(-50.0, -50.0), 1.0));
        assert_eq!(t.transform().offset, PointF::ZERO);
    }

    #[test]
    fn exposed_rect_accounts_for_zoom_and_inflation() {
        let mut t = tracker();
        t.set_transform(ViewTransform::new(PointF::new(100.0, 200.0), 2.0));

        let exposed = t.exposed_rect(0.0);
        assert_eq!(exposed, RectF::new(50.0, 100.0, 200.0, 300.0));

        let inflated = t.exposed_rect(10.0);
        assert_eq!(inflated, RectF::new(40.0, 90.0, 220.0, 320.0));
    }

    #[test]
    fn zoom_about_point_keeps_document_point_fixed() {
        let mut t = tracker();
        t.set_transform(ViewTransform::new(PointF::new(0.0, 400.0), 1.0));

        let center = PointF::new(200.0, 300.0);
        let before = t.transform().to_document(center);

        let zoomed = t.zoom_matrix(2.0, center);
        let after = zoomed.to_document(center);

        assert!((before.x - after.x).abs() < 1e-3);
        assert!((before.y - after.y).abs() < 1e-3);
        assert_eq!(zoomed.scale, 2.0);
    }

    #[test]
    fn zoom_matrix_clamps_to_bounds() {
        let mut t = tracker();
        t.set_transform(ViewTransform::new(PointF::new(0.0, 1160.0), 1.0));

        // Zooming out from the bottom pins the offset inside the new bounds
        let zoomed = t.zoom_matrix(0.5, PointF::new(200.0, 300.0));
        let max_y = 1760.0 * 0.5 - 600.0;
        assert!(zoomed.offset.y <= max_y + 1e-3);
        assert!(zoomed.offset.y >= 0.0);
    }
}
