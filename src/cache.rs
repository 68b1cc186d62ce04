//! Per-page tile state machine and texture bookkeeping
//!
//! Each page owns a cheap preview texture at its natural pixel size and a
//! double-buffered pair of real-size overlay textures. The cache decides
//! visibility against the exposed rectangle and evicts by normalized
//! distance from the viewport center: far pages lose their overlays, very
//! far pages lose everything and drop back to `Initialized`.

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, warn};

use crate::backend::{PageHandle, TexturePool};
use crate::geometry::RectF;
use crate::layout::PageLayout;
use crate::types::{Placeholder, TextureId};
use crate::viewport::ViewportTracker;

/// Per-page render progress.
///
/// Strictly forward-progressing, except the explicit reset to `Initialized`
/// on eviction. `Disposed` is terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum TileStatus {
    NotInitialized,
    Initializing,
    Initialized,
    PreviewLoading,
    PreviewLoaded,
    Disposed,
}

/// A texture handle plus the pixel dimensions it was allocated with
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileTexture {
    pub id: TextureId,
    pub width: u32,
    pub height: u32,
}

impl TileTexture {
    /// Whether this texture's resolution already covers the required size
    #[must_use]
    pub fn covers(&self, width: u32, height: u32) -> bool {
        self.width >= width && self.height >= height
    }
}

/// Single-assignment page handle slot: the open-page call is issued at most
/// once per page, and every interested party shares the outcome.
enum HandleSlot {
    Empty,
    Requested,
    Ready(Arc<dyn PageHandle>),
    Failed,
}

struct TileState {
    status: TileStatus,
    preview: Option<TileTexture>,
    overlay: [Option<TileTexture>; 2],
    active_overlay: usize,
    overlay_rect: Option<RectF>,
    is_visible: bool,
}

impl TileState {
    fn new() -> Self {
        Self {
            status: TileStatus::NotInitialized,
            preview: None,
            overlay: [None, None],
            active_overlay: 0,
            overlay_rect: None,
            is_visible: false,
        }
    }

    fn release_overlays(&mut self, pool: &mut dyn TexturePool) {
        for slot in &mut self.overlay {
            if let Some(texture) = slot.take() {
                pool.dispose(texture.id);
            }
        }
        self.overlay_rect = None;
    }

    fn release_all(&mut self, pool: &mut dyn TexturePool) {
        self.release_overlays(pool);
        if let Some(texture) = self.preview.take() {
            pool.dispose(texture.id);
        }
    }
}

/// Result of a visibility recompute
#[derive(Debug, Default)]
pub struct VisibilityChange {
    /// Any page entered or left the visible set
    pub any_changed: bool,
    /// Pages that just became visible, ascending page order
    pub newly_visible: Vec<usize>,
}

/// Owns every page's tile state and handle slot.
///
/// Mutated only from the scheduler's task stream; the UI layer reads
/// textures through the accessor methods after draining events.
pub struct TileCache {
    tiles: Vec<TileState>,
    handles: Vec<HandleSlot>,
    visible_areas: HashMap<usize, f32>,
    current_page: Option<usize>,
}

impl TileCache {
    #[must_use]
    pub fn new(page_count: usize) -> Self {
        Self {
            tiles: (0..page_count).map(|_| TileState::new()).collect(),
            handles: (0..page_count).map(|_| HandleSlot::Empty).collect(),
            visible_areas: HashMap::new(),
            current_page: None,
        }
    }

    #[must_use]
    pub fn page_count(&self) -> usize {
        self.tiles.len()
    }

    #[must_use]
    pub fn status(&self, page_number: usize) -> TileStatus {
        self.tile(page_number)
            .map_or(TileStatus::NotInitialized, |t| t.status)
    }

    #[must_use]
    pub fn is_visible(&self, page_number: usize) -> bool {
        self.tile(page_number).is_some_and(|t| t.is_visible)
    }

    /// The low-res preview texture, present once `PreviewLoaded`
    #[must_use]
    pub fn preview_texture(&self, page_number: usize) -> Option<TileTexture> {
        self.tile(page_number)?.preview
    }

    /// The active real-size overlay and the layout-space rectangle it covers
    #[must_use]
    pub fn active_overlay(&self, page_number: usize) -> Option<(TileTexture, RectF)> {
        let tile = self.tile(page_number)?;
        let rect = tile.overlay_rect?;
        let texture = tile.overlay[tile.active_overlay]?;
        Some((texture, rect))
    }

    /// Visible area per page from the last recompute, in square screen pixels
    #[must_use]
    pub fn visible_areas(&self) -> &HashMap<usize, f32> {
        &self.visible_areas
    }

    /// Page with the largest visible area; ties go to the lower page number
    #[must_use]
    pub fn current_page(&self) -> Option<usize> {
        self.current_page
    }

    /// What a visible page without a preview should display
    #[must_use]
    pub fn placeholder_kind(&self, page_number: usize) -> Option<Placeholder> {
        let tile = self.tile(page_number)?;
        if !tile.is_visible || tile.preview.is_some() {
            return None;
        }
        let failed = matches!(
            self.handles.get(page_number.checked_sub(1)?),
            Some(HandleSlot::Failed)
        );
        Some(if failed {
            Placeholder::LoadFailed
        } else {
            Placeholder::Loading
        })
    }

    #[must_use]
    pub fn handle(&self, page_number: usize) -> Option<Arc<dyn PageHandle>> {
        match self.handles.get(page_number.checked_sub(1)?)? {
            HandleSlot::Ready(handle) => Some(Arc::clone(handle)),
            _ => None,
        }
    }

    /// Recompute per-page visibility and area against the exposed rectangle
    pub fn update_visibility(
        &mut self,
        layout: &PageLayout,
        viewport: &ViewportTracker,
    ) -> VisibilityChange {
        let screen = viewport.screen_rect();
        let mut change = VisibilityChange::default();
        let mut best: Option<(usize, f32)> = None;

        self.visible_areas.clear();

        for index in 0..self.tiles.len() {
            let page_number = index + 1;
            let area = layout
                .page_rect(page_number)
                .and_then(|rect| viewport.zoomed_rect(rect).intersection(screen))
                .map_or(0.0, RectF::area);
            let visible = area > 0.0;

            if visible {
                self.visible_areas.insert(page_number, area);
                if best.is_none_or(|(_, a)| area > a) {
                    best = Some((page_number, area));
                }
            }

            let tile = &mut self.tiles[index];
            if tile.status == TileStatus::Disposed {
                continue;
            }
            if tile.is_visible != visible {
                tile.is_visible = visible;
                change.any_changed = true;
                if visible {
                    change.newly_visible.push(page_number);
                }
            }
        }

        self.current_page = best.map(|(page, _)| page);
        change
    }

    /// Pages whose zoomed rectangle, inflated by `margin_px` screen pixels,
    /// intersects the viewport. Ascending page order so nearby pages render
    /// in visual order.
    #[must_use]
    pub fn preview_candidates(
        &self,
        layout: &PageLayout,
        viewport: &ViewportTracker,
        margin_px: f32,
    ) -> Vec<usize> {
        let screen = viewport.screen_rect();
        (1..=self.tiles.len())
            .filter(|&page| {
                layout.page_rect(page).is_some_and(|rect| {
                    viewport.zoomed_rect(rect).inflated(margin_px).intersects(screen)
                })
            })
            .collect()
    }

    /// Begin resolving a page handle. Returns `false` when the open-page
    /// request was already issued (or the tile is past that point), which is
    /// what makes the open idempotent.
    pub fn begin_open(&mut self, page_number: usize) -> bool {
        let Some(index) = self.index(page_number) else {
            return false;
        };
        if self.tiles[index].status != TileStatus::NotInitialized {
            return false;
        }
        if !matches!(self.handles[index], HandleSlot::Empty) {
            return false;
        }

        self.tiles[index].status = TileStatus::Initializing;
        self.handles[index] = HandleSlot::Requested;
        true
    }

    /// Store a resolved page handle. No-op after disposal.
    pub fn handle_opened(&mut self, page_number: usize, handle: Arc<dyn PageHandle>) {
        let Some(index) = self.index(page_number) else {
            return;
        };
        if self.tiles[index].status == TileStatus::Disposed {
            return;
        }

        self.handles[index] = HandleSlot::Ready(handle);
        if self.tiles[index].status == TileStatus::Initializing {
            self.tiles[index].status = TileStatus::Initialized;
        }
    }

    /// Mark a page handle as permanently unavailable. The status stays
    /// `Initializing` so the page keeps showing a placeholder without ever
    /// being retried.
    pub fn handle_failed(&mut self, page_number: usize) {
        if let Some(index) = self.index(page_number) {
            warn!("page {page_number} handle resolution failed");
            self.handles[index] = HandleSlot::Failed;
        }
    }

    /// Begin a preview render: `Initialized` -> `PreviewLoading`
    pub fn begin_preview(&mut self, page_number: usize) -> bool {
        let Some(index) = self.index(page_number) else {
            return false;
        };
        if self.tiles[index].status != TileStatus::Initialized {
            return false;
        }
        self.tiles[index].status = TileStatus::PreviewLoading;
        true
    }

    /// Install a finished preview texture: `PreviewLoading` -> `PreviewLoaded`.
    /// Returns `false` when the tile was evicted or disposed mid-flight, in
    /// which case the caller must not have allocated anything.
    pub fn preview_ready(
        &mut self,
        page_number: usize,
        texture: TileTexture,
        pool: &mut dyn TexturePool,
    ) -> bool {
        let Some(index) = self.index(page_number) else {
            return false;
        };
        if self.tiles[index].status != TileStatus::PreviewLoading {
            return false;
        }

        if let Some(old) = self.tiles[index].preview.take() {
            pool.dispose(old.id);
        }
        self.tiles[index].preview = Some(texture);
        self.tiles[index].status = TileStatus::PreviewLoaded;
        true
    }

    /// A preview render failed: fall back to the pre-request status
    pub fn preview_failed(&mut self, page_number: usize) {
        if let Some(index) = self.index(page_number) {
            if self.tiles[index].status == TileStatus::PreviewLoading {
                self.tiles[index].status = TileStatus::Initialized;
            }
        }
    }

    /// The overlay buffer slot not currently displayed
    #[must_use]
    pub fn inactive_overlay_slot(&self, page_number: usize) -> usize {
        self.tile(page_number)
            .map_or(0, |t| 1 - t.active_overlay)
    }

    /// Install a finished overlay texture into `slot` and make it active.
    /// The previously active overlay stays allocated (and displayed) until
    /// the next swap, which is what avoids flicker.
    pub fn overlay_ready(
        &mut self,
        page_number: usize,
        slot: usize,
        texture: TileTexture,
        rect: RectF,
        pool: &mut dyn TexturePool,
    ) -> bool {
        let Some(index) = self.index(page_number) else {
            return false;
        };
        let tile = &mut self.tiles[index];
        if tile.status != TileStatus::PreviewLoaded || slot > 1 {
            return false;
        }

        if let Some(old) = tile.overlay[slot].take() {
            pool.dispose(old.id);
        }
        tile.overlay[slot] = Some(texture);
        tile.active_overlay = slot;
        tile.overlay_rect = Some(rect);
        true
    }

    /// Drop the overlay; the preview resolution suffices at this zoom
    pub fn clear_overlay(&mut self, page_number: usize, pool: &mut dyn TexturePool) {
        if let Some(index) = self.index(page_number) {
            self.tiles[index].release_overlays(pool);
        }
    }

    /// Full eviction: release every texture and reset to `Initialized`,
    /// keeping the known page size so layout stays stable
    pub fn release_textures(&mut self, page_number: usize, pool: &mut dyn TexturePool) {
        let Some(index) = self.index(page_number) else {
            return;
        };
        let tile = &mut self.tiles[index];
        if tile.status == TileStatus::Disposed {
            return;
        }

        tile.release_all(pool);
        if tile.status >= TileStatus::PreviewLoading {
            tile.status = TileStatus::Initialized;
        }
    }

    /// Two-tier distance eviction, evaluated for every page.
    ///
    /// `dist` is the Euclidean distance between the viewport center and the
    /// page's zoomed-rectangle center, normalized by the larger viewport
    /// dimension.
    pub fn evict_pass(
        &mut self,
        layout: &PageLayout,
        viewport: &ViewportTracker,
        full_purge_distance: f32,
        overlay_release_distance: f32,
        pool: &mut dyn TexturePool,
    ) {
        let viewport_center = viewport.screen_rect().center();
        let norm = viewport.viewport_size().max_dimension().max(1.0);

        for page_number in 1..=self.tiles.len() {
            if self.tiles[page_number - 1].status == TileStatus::Disposed {
                continue;
            }
            let Some(rect) = layout.page_rect(page_number) else {
                continue;
            };

            let dist = viewport
                .zoomed_rect(rect)
                .center()
                .distance_to(viewport_center)
                / norm;

            if dist > full_purge_distance {
                if self.tiles[page_number - 1].preview.is_some()
                    || self.tiles[page_number - 1].overlay_rect.is_some()
                {
                    debug!("page {page_number}: full purge at distance {dist:.1}");
                }
                self.release_textures(page_number, pool);
            } else if dist > overlay_release_distance {
                self.clear_overlay(page_number, pool);
            }
        }
    }

    /// Tear down every tile. Terminal: no further texture updates are
    /// accepted for any page.
    pub fn dispose_all(&mut self, pool: &mut dyn TexturePool) {
        for (tile, slot) in self.tiles.iter_mut().zip(self.handles.iter_mut()) {
            tile.release_all(pool);
            tile.status = TileStatus::Disposed;
            *slot = HandleSlot::Empty;
        }
        self.visible_areas.clear();
        self.current_page = None;
    }

    fn tile(&self, page_number: usize) -> Option<&TileState> {
        self.tiles.get(page_number.checked_sub(1)?)
    }

    fn index(&self, page_number: usize) -> Option<usize> {
        let index = page_number.checked_sub(1)?;
        (index < self.tiles.len()).then_some(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{PointF, SizeF, ViewTransform};
    use crate::layout::LayoutMode;
    use crate::types::PixelBuffer;

    struct CountingPool {
        next: u64,
        live: Vec<TextureId>,
        disposed: Vec<TextureId>,
    }

    impl CountingPool {
        fn new() -> Self {
            Self {
                next: 1,
                live: Vec::new(),
                disposed: Vec::new(),
            }
        }
    }

    impl TexturePool for CountingPool {
        fn allocate(&mut self, _width: u32, _height: u32) -> TextureId {
            let id = TextureId::new(self.next);
            self.next += 1;
            self.live.push(id);
            id
        }

        fn update(&mut self, _id: TextureId, _pixels: &PixelBuffer) {}

        fn dispose(&mut self, id: TextureId) {
            self.live.retain(|&t| t != id);
            self.disposed.push(id);
        }
    }

    fn laid_out() -> (PageLayout, ViewportTracker) {
        let mut layout = PageLayout::new(3, SizeF::new(200.0, 300.0), 8.0, LayoutMode::Vertical);
        layout.relayout(SizeF::new(400.0, 600.0));
        let mut viewport = ViewportTracker::new(SizeF::new(400.0, 600.0));
        viewport.set_content_size(layout.content_size());
        viewport.take_changed();
        (layout, viewport)
    }

    fn texture(pool: &mut CountingPool, w: u32, h: u32) -> TileTexture {
        TileTexture {
            id: pool.allocate(w, h),
            width: w,
            height: h,
        }
    }

    #[test]
    fn visibility_tracks_viewport() {
        let (layout, mut viewport) = laid_out();
        let mut cache = TileCache::new(3);

        let change = cache.update_visibility(&layout, &viewport);
        assert!(change.any_changed);
        // Page 1 fills the viewport, page 2 pokes in below it
        assert_eq!(change.newly_visible, vec![1, 2]);
        assert_eq!(cache.current_page(), Some(1));

        // Scroll to page 3
        viewport.set_transform(ViewTransform::new(PointF::new(0.0, 1160.0), 1.0));
        let change = cache.update_visibility(&layout, &viewport);
        assert!(change.any_changed);
        assert!(cache.is_visible(3));
        assert!(!cache.is_visible(1));
        assert_eq!(cache.current_page(), Some(3));
    }

    #[test]
    fn touching_boundary_is_not_visible() {
        let (layout, mut viewport) = laid_out();
        let mut cache = TileCache::new(3);

        // Page 3's top edge lands exactly on the viewport bottom
        viewport.set_transform(ViewTransform::new(PointF::new(0.0, 592.0), 1.0));
        cache.update_visibility(&layout, &viewport);

        assert!(cache.is_visible(2));
        assert!(!cache.is_visible(1));
        assert!(!cache.is_visible(3), "zero-area contact is not visible");
    }

    #[test]
    fn current_page_tie_goes_to_lower_number() {
        let (layout, mut viewport) = laid_out();
        let mut cache = TileCache::new(3);

        // Split the viewport exactly across the gap between pages 1 and 2:
        // page 1 bottom edge at 584, gap to 592. Centering the gap shows
        // equal slivers of both pages.
        viewport.set_transform(ViewTransform::new(PointF::new(0.0, 288.0), 1.0));
        cache.update_visibility(&layout, &viewport);

        let areas = cache.visible_areas();
        let a1 = areas.get(&1).copied().unwrap_or(0.0);
        let a2 = areas.get(&2).copied().unwrap_or(0.0);
        assert!((a1 - a2).abs() < 1.0, "areas should match: {a1} vs {a2}");
        assert_eq!(cache.current_page(), Some(1));
    }

    #[test]
    fn open_is_issued_at_most_once() {
        let mut cache = TileCache::new(3);

        assert!(cache.begin_open(1));
        assert!(!cache.begin_open(1));
        assert_eq!(cache.status(1), TileStatus::Initializing);
    }

    #[test]
    fn preview_lifecycle() {
        let mut pool = CountingPool::new();
        let mut cache = TileCache::new(1);

        assert!(!cache.begin_preview(1), "no preview before handle");
        cache.begin_open(1);
        cache.handle_opened(1, Arc::new(crate::test_utils::NullPage));
        assert_eq!(cache.status(1), TileStatus::Initialized);

        assert!(cache.begin_preview(1));
        assert_eq!(cache.status(1), TileStatus::PreviewLoading);

        let tex = texture(&mut pool, 200, 300);
        assert!(cache.preview_ready(1, tex, &mut pool));
        assert_eq!(cache.status(1), TileStatus::PreviewLoaded);
        assert_eq!(cache.preview_texture(1), Some(tex));
    }

    #[test]
    fn preview_failure_reverts_status() {
        let mut cache = TileCache::new(1);
        cache.begin_open(1);
        cache.handle_opened(1, Arc::new(crate::test_utils::NullPage));
        cache.begin_preview(1);

        cache.preview_failed(1);
        assert_eq!(cache.status(1), TileStatus::Initialized);
        assert_eq!(cache.preview_texture(1), None);
    }

    #[test]
    fn handle_failure_freezes_at_initializing() {
        let (layout, viewport) = laid_out();
        let mut cache = TileCache::new(3);
        cache.update_visibility(&layout, &viewport);

        cache.begin_open(1);
        cache.handle_failed(1);
        assert_eq!(cache.status(1), TileStatus::Initializing);
        assert_eq!(cache.placeholder_kind(1), Some(Placeholder::LoadFailed));
        assert_eq!(cache.placeholder_kind(2), Some(Placeholder::Loading));
    }

    #[test]
    fn overlay_double_buffer_swaps() {
        let mut pool = CountingPool::new();
        let mut cache = TileCache::new(1);
        cache.begin_open(1);
        cache.handle_opened(1, Arc::new(crate::test_utils::NullPage));
        cache.begin_preview(1);
        cache.preview_ready(1, texture(&mut pool, 200, 300), &mut pool);

        let slot_a = cache.inactive_overlay_slot(1);
        let tex_a = texture(&mut pool, 800, 600);
        let rect_a = RectF::new(0.0, 0.0, 100.0, 75.0);
        assert!(cache.overlay_ready(1, slot_a, tex_a, rect_a, &mut pool));
        assert_eq!(cache.active_overlay(1), Some((tex_a, rect_a)));

        // Next render goes to the other buffer; the first stays allocated
        let slot_b = cache.inactive_overlay_slot(1);
        assert_ne!(slot_a, slot_b);
        let tex_b = texture(&mut pool, 800, 600);
        let rect_b = RectF::new(10.0, 0.0, 100.0, 75.0);
        assert!(cache.overlay_ready(1, slot_b, tex_b, rect_b, &mut pool));
        assert_eq!(cache.active_overlay(1), Some((tex_b, rect_b)));
        assert!(pool.live.contains(&tex_a.id), "previous overlay kept");

        // Third render reuses the first slot and disposes its old texture
        let slot_c = cache.inactive_overlay_slot(1);
        assert_eq!(slot_c, slot_a);
        let tex_c = texture(&mut pool, 800, 600);
        assert!(cache.overlay_ready(1, slot_c, tex_c, rect_a, &mut pool));
        assert!(pool.disposed.contains(&tex_a.id));
    }

    #[test]
    fn full_purge_releases_everything_and_resets() {
        let (layout, mut viewport) = laid_out();
        let mut pool = CountingPool::new();
        let mut cache = TileCache::new(3);

        cache.begin_open(1);
        cache.handle_opened(1, Arc::new(crate::test_utils::NullPage));
        cache.begin_preview(1);
        cache.preview_ready(1, texture(&mut pool, 200, 300), &mut pool);
        let slot = cache.inactive_overlay_slot(1);
        cache.overlay_ready(
            1,
            slot,
            texture(&mut pool, 800, 600),
            RectF::new(0.0, 0.0, 10.0, 10.0),
            &mut pool,
        );

        // Far away: page 1 center is ~zero, shove the viewport far down by
        // lying about the content so the clamp allows it
        viewport.set_content_size(SizeF::new(400.0, 100_000.0));
        viewport.set_transform(ViewTransform::new(PointF::new(0.0, 50_000.0), 1.0));

        cache.evict_pass(&layout, &viewport, 33.0, 8.0, &mut pool);

        assert_eq!(cache.status(1), TileStatus::Initialized);
        assert_eq!(cache.preview_texture(1), None);
        assert_eq!(cache.active_overlay(1), None);
        assert!(pool.live.is_empty());
    }

    #[test]
    fn partial_eviction_keeps_preview() {
        let (layout, mut viewport) = laid_out();
        let mut pool = CountingPool::new();
        let mut cache = TileCache::new(3);

        cache.begin_open(1);
        cache.handle_opened(1, Arc::new(crate::test_utils::NullPage));
        cache.begin_preview(1);
        let preview = texture(&mut pool, 200, 300);
        cache.preview_ready(1, preview, &mut pool);
        let slot = cache.inactive_overlay_slot(1);
        cache.overlay_ready(
            1,
            slot,
            texture(&mut pool, 800, 600),
            RectF::new(0.0, 0.0, 10.0, 10.0),
            &mut pool,
        );

        // Past the overlay threshold but inside the purge threshold
        viewport.set_content_size(SizeF::new(400.0, 100_000.0));
        viewport.set_transform(ViewTransform::new(PointF::new(0.0, 6_000.0), 1.0));

        cache.evict_pass(&layout, &viewport, 33.0, 8.0, &mut pool);

        assert_eq!(cache.status(1), TileStatus::PreviewLoaded);
        assert_eq!(cache.preview_texture(1), Some(preview));
        assert_eq!(cache.active_overlay(1), None);
    }

    #[test]
    fn disposal_is_terminal() {
        let mut pool = CountingPool::new();
        let mut cache = TileCache::new(1);
        cache.begin_open(1);
        cache.handle_opened(1, Arc::new(crate::test_utils::NullPage));
        cache.begin_preview(1);

        cache.dispose_all(&mut pool);
        assert_eq!(cache.status(1), TileStatus::Disposed);

        // Late results are no-ops
        assert!(!cache.preview_ready(1, texture(&mut pool, 10, 10), &mut pool));
        cache.handle_opened(1, Arc::new(crate::test_utils::NullPage));
        assert!(cache.handle(1).is_none());
        assert_eq!(cache.status(1), TileStatus::Disposed);
    }
}
