//! Page flow layout
//!
//! Computes each page's rectangle in document space from its natural size
//! and the viewport's content width or height. Until a page's real handle
//! resolves, its size is a placeholder (copied from page 1 once known);
//! corrections re-run the layout at most once per page.

use log::{debug, warn};

use crate::geometry::{RectF, SizeF};

/// Caller-supplied layout: receives the available size and every page's
/// natural size, returns one rectangle per page in document space.
pub type LayoutFn = Box<dyn Fn(SizeF, &[SizeF]) -> Vec<RectF> + Send>;

/// How pages flow through the document
pub enum LayoutMode {
    /// Pages stacked top-to-bottom, fit to viewport width
    Vertical,
    /// Pages side-by-side, fit to viewport height
    Horizontal,
    /// Host-provided layout function
    Custom(LayoutFn),
}

impl std::fmt::Debug for LayoutMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Vertical => f.write_str("Vertical"),
            Self::Horizontal => f.write_str("Horizontal"),
            Self::Custom(_) => f.write_str("Custom"),
        }
    }
}

/// Per-page geometry store
pub struct PageLayout {
    natural_sizes: Vec<SizeF>,
    size_known: Vec<bool>,
    rects: Vec<Option<RectF>>,
    content_size: SizeF,
    padding: f32,
    mode: LayoutMode,
}

impl PageLayout {
    /// Create a layout for `page_count` pages, all at the placeholder size
    #[must_use]
    pub fn new(page_count: usize, placeholder: SizeF, padding: f32, mode: LayoutMode) -> Self {
        Self {
            natural_sizes: vec![placeholder; page_count],
            size_known: vec![false; page_count],
            rects: vec![None; page_count],
            content_size: SizeF::ZERO,
            padding,
            mode,
        }
    }

    #[must_use]
    pub fn page_count(&self) -> usize {
        self.natural_sizes.len()
    }

    /// Natural size of a page (1-based), placeholder or corrected
    #[must_use]
    pub fn natural_size(&self, page_number: usize) -> Option<SizeF> {
        self.natural_sizes.get(page_number.checked_sub(1)?).copied()
    }

    /// Laid-out rectangle of a page (1-based) in document space.
    /// `None` means not laid out; such pages must not be rendered.
    #[must_use]
    pub fn page_rect(&self, page_number: usize) -> Option<RectF> {
        *self.rects.get(page_number.checked_sub(1)?)?
    }

    /// Total laid-out content size in document space
    #[must_use]
    pub fn content_size(&self) -> SizeF {
        self.content_size
    }

    #[must_use]
    pub fn padding(&self) -> f32 {
        self.padding
    }

    #[must_use]
    pub fn is_size_known(&self, page_number: usize) -> bool {
        page_number
            .checked_sub(1)
            .and_then(|i| self.size_known.get(i))
            .copied()
            .unwrap_or(false)
    }

    /// Replace the placeholder size of every page whose true size is not yet
    /// known. Returns whether any page changed (a relayout is then due).
    pub fn set_uniform_placeholder(&mut self, size: SizeF) -> bool {
        let mut changed = false;
        for (i, known) in self.size_known.iter().enumerate() {
            if !*known && self.natural_sizes[i] != size {
                self.natural_sizes[i] = size;
                changed = true;
            }
        }
        changed
    }

    /// Record a page's true natural size (1-based). Returns whether it
    /// differed from the stored value, in which case exactly one relayout
    /// must follow.
    pub fn correct_page_size(&mut self, page_number: usize, size: SizeF) -> bool {
        let Some(index) = page_number.checked_sub(1) else {
            return false;
        };
        if index >= self.natural_sizes.len() {
            return false;
        }

        self.size_known[index] = true;
        if self.natural_sizes[index] == size {
            return false;
        }

        debug!(
            "page {page_number} size corrected: {:?} -> {:?}",
            self.natural_sizes[index], size
        );
        self.natural_sizes[index] = size;
        true
    }

    /// Forget all page sizes and rectangles, keeping mode and padding.
    /// Used when a document is (re)loaded.
    pub fn reset(&mut self, page_count: usize, placeholder: SizeF) {
        self.natural_sizes = vec![placeholder; page_count];
        self.size_known = vec![false; page_count];
        self.rects = vec![None; page_count];
        self.content_size = SizeF::ZERO;
    }

    /// Run the layout pass for the given viewport size (document units at
    /// zoom 1.0)
    pub fn relayout(&mut self, viewport: SizeF) {
        match &self.mode {
            LayoutMode::Vertical => self.flow_vertical(viewport),
            LayoutMode::Horizontal => self.flow_horizontal(viewport),
            LayoutMode::Custom(f) => {
                let rects = f(viewport, &self.natural_sizes);
                self.apply_custom(rects);
            }
        }
    }

    fn flow_vertical(&mut self, viewport: SizeF) {
        let available = viewport.width - 2.0 * self.padding;
        let max_width = self
            .natural_sizes
            .iter()
            .map(|s| s.width)
            .fold(0.0_f32, f32::max);

        if available <= 0.0 || max_width <= 0.0 {
            warn!("vertical layout impossible: available={available}, max_width={max_width}");
            self.rects.iter_mut().for_each(|r| *r = None);
            self.content_size = SizeF::ZERO;
            return;
        }

        let scale = available / max_width;
        let mut y = self.padding;

        for (i, size) in self.natural_sizes.iter().enumerate() {
            let width = size.width * scale;
            let height = size.height * scale;
            let x = self.padding + (available - width) / 2.0;
            self.rects[i] = Some(RectF::new(x, y, width, height));
            y += height + self.padding;
        }

        self.content_size = SizeF::new(viewport.width, y);
    }

    fn flow_horizontal(&mut self, viewport: SizeF) {
        let available = viewport.height - 2.0 * self.padding;
        let max_height = self
            .natural_sizes
            .iter()
            .map(|s| s.height)
            .fold(0.0_f32, f32::max);

        if available <= 0.0 || max_height <= 0.0 {
            warn!("horizontal layout impossible: available={available}, max_height={max_height}");
            self.rects.iter_mut().for_each(|r| *r = None);
            self.content_size = SizeF::ZERO;
            return;
        }

        let scale = available / max_height;
        let mut x = self.padding;

        for (i, size) in self.natural_sizes.iter().enumerate() {
            let width = size.width * scale;
            let height = size.height * scale;
            let y = self.padding + (available - height) / 2.0;
            self.rects[i] = Some(RectF::new(x, y, width, height));
            x += width + self.padding;
        }

        self.content_size = SizeF::new(x, viewport.height);
    }

    fn apply_custom(&mut self, rects: Vec<RectF>) {
        if rects.len() != self.rects.len() {
            warn!(
                "custom layout returned {} rects for {} pages",
                rects.len(),
                self.rects.len()
            );
        }

        let mut right = 0.0_f32;
        let mut bottom = 0.0_f32;
        for i in 0..self.rects.len() {
            self.rects[i] = rects.get(i).copied();
            if let Some(r) = self.rects[i] {
                right = right.max(r.right());
                bottom = bottom.max(r.bottom());
            }
        }

        self.content_size = SizeF::new(right + self.padding, bottom + self.padding);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_page_layout() -> PageLayout {
        let mut layout = PageLayout::new(3, SizeF::new(200.0, 300.0), 8.0, LayoutMode::Vertical);
        layout.relayout(SizeF::new(400.0, 600.0));
        layout
    }

    #[test]
    fn vertical_flow_matches_worked_example() {
        // viewport 400x600, 3 pages 200x300pt, padding 8
        // scale = (400-16)/200 = 1.92
        let layout = three_page_layout();

        let rect = layout.page_rect(1).expect("laid out");
        assert!((rect.x - 8.0).abs() < 1e-3);
        assert!((rect.y - 8.0).abs() < 1e-3);
        assert!((rect.right() - 392.0).abs() < 1e-3);
        assert!((rect.bottom() - 584.0).abs() < 1e-3);

        let rect2 = layout.page_rect(2).expect("laid out");
        assert!((rect2.y - 592.0).abs() < 1e-3);

        // 3 pages of 576 plus 4 gaps of 8
        let content = layout.content_size();
        assert!((content.height - 1760.0).abs() < 1e-3);
        assert!((content.width - 400.0).abs() < 1e-3);
    }

    #[test]
    fn narrow_page_is_centered() {
        let mut layout = PageLayout::new(2, SizeF::new(200.0, 300.0), 8.0, LayoutMode::Vertical);
        layout.correct_page_size(2, SizeF::new(100.0, 300.0));
        layout.relayout(SizeF::new(400.0, 600.0));

        let rect = layout.page_rect(2).expect("laid out");
        // half of 200pt at scale 1.92, centered in the 384 available
        assert!((rect.width - 192.0).abs() < 1e-3);
        assert!((rect.x - 104.0).abs() < 1e-3);
    }

    #[test]
    fn horizontal_flow_scales_on_height() {
        let mut layout = PageLayout::new(2, SizeF::new(200.0, 300.0), 8.0, LayoutMode::Horizontal);
        layout.relayout(SizeF::new(400.0, 600.0));

        // scale = (600-16)/300
        let rect = layout.page_rect(1).expect("laid out");
        assert!((rect.height - 584.0).abs() < 1e-3);
        assert!((rect.y - 8.0).abs() < 1e-3);

        let rect2 = layout.page_rect(2).expect("laid out");
        assert!(rect2.x > rect.right());
    }

    #[test]
    fn size_correction_reports_change_once() {
        let mut layout = three_page_layout();

        assert!(layout.correct_page_size(2, SizeF::new(150.0, 300.0)));
        assert!(layout.is_size_known(2));
        // Same size again: no further relayout needed
        assert!(!layout.correct_page_size(2, SizeF::new(150.0, 300.0)));
    }

    #[test]
    fn placeholder_update_skips_known_pages() {
        let mut layout = three_page_layout();
        layout.correct_page_size(1, SizeF::new(200.0, 300.0));

        assert!(layout.set_uniform_placeholder(SizeF::new(250.0, 350.0)));
        assert_eq!(layout.natural_size(1), Some(SizeF::new(200.0, 300.0)));
        assert_eq!(layout.natural_size(2), Some(SizeF::new(250.0, 350.0)));
    }

    #[test]
    fn custom_layout_sets_content_bounds() {
        let mut layout = PageLayout::new(
            2,
            SizeF::new(100.0, 100.0),
            10.0,
            LayoutMode::Custom(Box::new(|_, sizes| {
                sizes
                    .iter()
                    .enumerate()
                    .map(|(i, s)| RectF::new(i as f32 * 120.0, 0.0, s.width, s.height))
                    .collect()
            })),
        );
        layout.relayout(SizeF::new(400.0, 600.0));

        assert_eq!(layout.page_rect(2), Some(RectF::new(120.0, 0.0, 100.0, 100.0)));
        assert_eq!(layout.content_size(), SizeF::new(230.0, 110.0));
    }

    #[test]
    fn unlaid_pages_have_no_rect() {
        let layout = PageLayout::new(3, SizeF::new(200.0, 300.0), 8.0, LayoutMode::Vertical);
        assert_eq!(layout.page_rect(1), None);
        assert_eq!(layout.page_rect(0), None);
        assert_eq!(layout.page_rect(4), None);
    }
}
