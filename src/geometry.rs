//! Geometry primitives shared by layout, viewport, and tile code
//!
//! All rectangles are axis-aligned with the origin at the top-left.
//! "Document space" is the laid-out page space before the view transform
//! is applied; "screen space" is viewport pixels.

use serde::{Deserialize, Serialize};

/// A point in document or screen space
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PointF {
    pub x: f32,
    pub y: f32,
}

impl PointF {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point
    #[must_use]
    pub fn distance_to(self, other: Self) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Width/height pair
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SizeF {
    pub width: f32,
    pub height: f32,
}

impl SizeF {
    pub const ZERO: Self = Self {
        width: 0.0,
        height: 0.0,
    };

    #[must_use]
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    #[must_use]
    pub fn is_empty(self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    #[must_use]
    pub fn max_dimension(self) -> f32 {
        self.width.max(self.height)
    }
}

/// Axis-aligned rectangle
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RectF {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl RectF {
    #[must_use]
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    #[must_use]
    pub const fn from_origin_size(origin: PointF, size: SizeF) -> Self {
        Self {
            x: origin.x,
            y: origin.y,
            width: size.width,
            height: size.height,
        }
    }

    #[must_use]
    pub const fn origin(self) -> PointF {
        PointF {
            x: self.x,
            y: self.y,
        }
    }

    #[must_use]
    pub const fn size(self) -> SizeF {
        SizeF {
            width: self.width,
            height: self.height,
        }
    }

    #[must_use]
    pub fn right(self) -> f32 {
        self.x + self.width
    }

    #[must_use]
    pub fn bottom(self) -> f32 {
        self.y + self.height
    }

    #[must_use]
    pub fn center(self) -> PointF {
        PointF {
            x: self.x + self.width / 2.0,
            y: self.y + self.height / 2.0,
        }
    }

    #[must_use]
    pub fn is_empty(self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    #[must_use]
    pub fn area(self) -> f32 {
        if self.is_empty() {
            0.0
        } else {
            self.width * self.height
        }
    }

    /// Intersection with another rectangle.
    ///
    /// Returns `None` for disjoint rectangles and for degenerate
    /// zero-area overlaps (edges exactly touching).
    #[must_use]
    pub fn intersection(self, other: Self) -> Option<Self> {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = self.right().min(other.right());
        let y1 = self.bottom().min(other.bottom());

        if x1 > x0 && y1 > y0 {
            Some(Self::new(x0, y0, x1 - x0, y1 - y0))
        } else {
            None
        }
    }

    #[must_use]
    pub fn intersects(self, other: Self) -> bool {
        self.intersection(other).is_some()
    }

    /// Uniformly scale origin and size
    #[must_use]
    pub fn scaled(self, factor: f32) -> Self {
        Self::new(
            self.x * factor,
            self.y * factor,
            self.width * factor,
            self.height * factor,
        )
    }

    #[must_use]
    pub fn translated(self, dx: f32, dy: f32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    /// Grow the rectangle by `amount` on every side
    #[must_use]
    pub fn inflated(self, amount: f32) -> Self {
        Self::new(
            self.x - amount,
            self.y - amount,
            self.width + 2.0 * amount,
            self.height + 2.0 * amount,
        )
    }
}

/// Uniform-scale view transform mapping document space to screen space.
///
/// `screen = doc * scale - offset`, so `offset` is the scroll position in
/// screen pixels and is never negative.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewTransform {
    /// Scroll offset in screen pixels
    pub offset: PointF,
    /// Uniform zoom factor
    pub scale: f32,
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self {
            offset: PointF::ZERO,
            scale: 1.0,
        }
    }
}

impl ViewTransform {
    /// Minimum allowed scale factor
    pub const MIN_SCALE: f32 = 0.1;

    #[must_use]
    pub fn new(offset: PointF, scale: f32) -> Self {
        Self {
            offset,
            scale: Self::clamp_scale(scale),
        }
    }

    /// Clamp a scale factor to the valid range, handling NaN/Inf
    #[must_use]
    pub fn clamp_scale(scale: f32) -> f32 {
        if scale.is_finite() {
            scale.max(Self::MIN_SCALE)
        } else {
            1.0
        }
    }

    /// Map a document-space point to screen space
    #[must_use]
    pub fn to_screen(self, point: PointF) -> PointF {
        PointF {
            x: point.x * self.scale - self.offset.x,
            y: point.y * self.scale - self.offset.y,
        }
    }

    /// Map a document-space rectangle to screen space
    #[must_use]
    pub fn rect_to_screen(self, rect: RectF) -> RectF {
        rect.scaled(self.scale)
            .translated(-self.offset.x, -self.offset.y)
    }

    /// Map a screen-space point back to document space
    #[must_use]
    pub fn to_document(self, point: PointF) -> PointF {
        PointF {
            x: (point.x + self.offset.x) / self.scale,
            y: (point.y + self.offset.y) / self.scale,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intersection_fully_inside() {
        let outer = RectF::new(0.0, 0.0, 100.0, 100.0);
        let inner = RectF::new(10.0, 10.0, 20.0, 20.0);

        assert_eq!(outer.intersection(inner), Some(inner));
        assert_eq!(inner.intersection(outer), Some(inner));
    }

    #[test]
    fn intersection_fully_outside() {
        let a = RectF::new(0.0, 0.0, 50.0, 50.0);
        let b = RectF::new(200.0, 200.0, 50.0, 50.0);

        assert_eq!(a.intersection(b), None);
        assert!(!a.intersects(b));
    }

    #[test]
    fn intersection_partial_overlap() {
        let a = RectF::new(0.0, 0.0, 50.0, 50.0);
        let b = RectF::new(40.0, 10.0, 50.0, 20.0);

        let hit = a.intersection(b).expect("overlap");
        assert_eq!(hit, RectF::new(40.0, 10.0, 10.0, 20.0));
        assert!((hit.area() - 200.0).abs() < f32::EPSILON);
    }

    #[test]
    fn touching_edges_do_not_intersect() {
        // Zero-area contact counts as not visible
        let a = RectF::new(0.0, 0.0, 50.0, 50.0);
        let b = RectF::new(50.0, 0.0, 50.0, 50.0);

        assert_eq!(a.intersection(b), None);
    }

    #[test]
    fn inflate_grows_all_sides() {
        let r = RectF::new(10.0, 10.0, 20.0, 20.0).inflated(5.0);
        assert_eq!(r, RectF::new(5.0, 5.0, 30.0, 30.0));
    }

    #[test]
    fn transform_round_trip() {
        let t = ViewTransform::new(PointF::new(100.0, 200.0), 2.0);
        let doc = PointF::new(30.0, 40.0);

        let screen = t.to_screen(doc);
        assert_eq!(screen, PointF::new(-40.0, -120.0));

        let back = t.to_document(screen);
        assert!((back.x - doc.x).abs() < 1e-4);
        assert!((back.y - doc.y).abs() < 1e-4);
    }

    #[test]
    fn rect_to_screen_scales_then_translates() {
        let t = ViewTransform::new(PointF::new(10.0, 20.0), 2.0);
        let r = RectF::new(5.0, 5.0, 10.0, 10.0);

        assert_eq!(t.rect_to_screen(r), RectF::new(0.0, -10.0, 20.0, 20.0));
    }

    #[test]
    fn clamp_scale_rejects_non_finite() {
        assert_eq!(ViewTransform::clamp_scale(f32::NAN), 1.0);
        assert_eq!(ViewTransform::clamp_scale(f32::INFINITY), 1.0);
        assert_eq!(ViewTransform::clamp_scale(0.0), ViewTransform::MIN_SCALE);
    }
}
