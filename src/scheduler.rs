//! Render scheduler - sequences preview and overlay work
//!
//! Owns the viewport tracker, the page layout, and the tile cache, and is
//! the single mutation stream for all of them. Worker threads only ever see
//! immutable page handles and pixel buffers; their results are pumped back
//! here and applied on the interactive thread.
//!
//! Scheduling rules:
//! - at most one preview job in flight, issued in ascending page order
//! - the real-size overlay pass runs after a quiet interval; any viewport
//!   change (and the start of every preview pass) resets the deadline
//! - one overlay job in flight per page, always into the inactive buffer

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use flume::{Receiver, Sender};
use log::{debug, info, warn};

use crate::backend::{PageSource, RenderRegion, TexturePool};
use crate::cache::{TileCache, TileStatus, TileTexture};
use crate::config::ViewerConfig;
use crate::geometry::{RectF, SizeF};
use crate::layout::{LayoutMode, PageLayout};
use crate::request::{JobKind, RenderJob, RenderOutcome, RequestId};
use crate::types::{DocumentInfo, Placeholder, ViewerEvent};
use crate::viewport::ViewportTracker;
use crate::worker::render_worker;

struct PendingJob {
    page: usize,
    kind: JobKind,
    /// For overlay jobs: the page-relative layout rectangle being rendered
    overlay_rect: Option<RectF>,
}

/// Drives all rendering for one document.
///
/// Hosts mutate the viewport through [`viewport_mut`], then call [`tick`]
/// once per frame or scheduling turn with the current time and their
/// texture pool; finished work surfaces as [`ViewerEvent`]s.
///
/// [`viewport_mut`]: RenderScheduler::viewport_mut
/// [`tick`]: RenderScheduler::tick
pub struct RenderScheduler {
    config: ViewerConfig,
    source: Arc<dyn PageSource>,
    layout: PageLayout,
    viewport: ViewportTracker,
    cache: TileCache,
    job_tx: Sender<RenderJob>,
    outcome_rx: Receiver<RenderOutcome>,
    next_request_id: u64,
    pending: HashMap<RequestId, PendingJob>,
    preview_queue: VecDeque<usize>,
    preview_active: bool,
    overlay_deadline: Option<Instant>,
    force_refresh: bool,
    visibility_refresh_requested: bool,
    overlay_refresh_requested: bool,
    events: Vec<ViewerEvent>,
    disposed: bool,
    workers: usize,
}

impl RenderScheduler {
    /// Create a scheduler with the default vertical flow layout
    #[must_use]
    pub fn new(source: Arc<dyn PageSource>, viewport_size: SizeF, config: ViewerConfig) -> Self {
        Self::with_layout_mode(source, viewport_size, config, LayoutMode::Vertical)
    }

    /// Create a scheduler with an explicit layout mode
    #[must_use]
    pub fn with_layout_mode(
        source: Arc<dyn PageSource>,
        viewport_size: SizeF,
        config: ViewerConfig,
        mode: LayoutMode,
    ) -> Self {
        let workers = config.workers.max(1);

        // Flume gives us the MPMC queue the worker fan-out needs; the
        // std/tokio mpsc receivers cannot be cloned across workers.
        let (job_tx, job_rx) = flume::unbounded();
        let (outcome_tx, outcome_rx) = flume::unbounded();

        for _ in 0..workers {
            let rx = job_rx.clone();
            let tx = outcome_tx.clone();
            let source = Arc::clone(&source);
            std::thread::spawn(move || render_worker(source, rx, tx));
        }

        let page_count = source.page_count();
        info!("document loaded: {page_count} pages");

        let mut layout = PageLayout::new(
            page_count,
            config.default_page_size,
            config.page_padding,
            mode,
        );
        layout.relayout(viewport_size);

        let mut viewport = ViewportTracker::new(viewport_size);
        viewport.set_content_size(layout.content_size());

        Self {
            cache: TileCache::new(page_count),
            config,
            source,
            layout,
            viewport,
            job_tx,
            outcome_rx,
            next_request_id: 1,
            pending: HashMap::new(),
            preview_queue: VecDeque::new(),
            preview_active: false,
            overlay_deadline: None,
            force_refresh: true,
            visibility_refresh_requested: true,
            overlay_refresh_requested: false,
            events: Vec::new(),
            disposed: false,
            workers,
        }
    }

    #[must_use]
    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    #[must_use]
    pub fn document_info(&self) -> DocumentInfo {
        DocumentInfo {
            page_count: self.layout.page_count(),
        }
    }

    #[must_use]
    pub fn viewport(&self) -> &ViewportTracker {
        &self.viewport
    }

    /// Mutable viewport access. Changes are picked up (coalesced) by the
    /// next [`tick`](Self::tick).
    pub fn viewport_mut(&mut self) -> &mut ViewportTracker {
        &mut self.viewport
    }

    #[must_use]
    pub fn layout(&self) -> &PageLayout {
        &self.layout
    }

    #[must_use]
    pub fn tile_status(&self, page_number: usize) -> TileStatus {
        self.cache.status(page_number)
    }

    #[must_use]
    pub fn preview_texture(&self, page_number: usize) -> Option<TileTexture> {
        self.cache.preview_texture(page_number)
    }

    #[must_use]
    pub fn active_overlay(&self, page_number: usize) -> Option<(TileTexture, RectF)> {
        self.cache.active_overlay(page_number)
    }

    #[must_use]
    pub fn placeholder_kind(&self, page_number: usize) -> Option<Placeholder> {
        self.cache.placeholder_kind(page_number)
    }

    #[must_use]
    pub fn visible_page_areas(&self) -> &HashMap<usize, f32> {
        self.cache.visible_areas()
    }

    #[must_use]
    pub fn current_page(&self) -> Option<usize> {
        self.cache.current_page()
    }

    /// Drain accumulated UI notifications
    pub fn take_events(&mut self) -> Vec<ViewerEvent> {
        std::mem::take(&mut self.events)
    }

    /// Change the device pixel ratio; overlays refresh after the next
    /// debounce interval.
    pub fn set_device_scale(&mut self, scale: f32) {
        if scale.is_finite() && scale > 0.0 && scale != self.config.device_scale {
            self.config.device_scale = scale;
            self.overlay_refresh_requested = true;
        }
    }

    /// Advance the scheduler: apply finished worker results, react to a
    /// coalesced viewport change, and run the overlay pass once its quiet
    /// interval elapses.
    pub fn tick(&mut self, now: Instant, pool: &mut dyn TexturePool) {
        if self.disposed {
            return;
        }

        self.pump(now, pool);

        let changed =
            self.viewport.take_changed() | std::mem::take(&mut self.visibility_refresh_requested);
        if changed {
            self.determine_pages_to_show(now);
        }

        if self.overlay_refresh_requested {
            self.overlay_refresh_requested = false;
            self.arm_overlay_debounce(now);
        }

        if !self.preview_active {
            if let Some(deadline) = self.overlay_deadline {
                if now >= deadline {
                    self.run_overlay_pass(pool);
                }
            }
        }
    }

    /// Reload the document: every tile is torn down and re-rendered from a
    /// fresh page count.
    pub fn reload(&mut self, pool: &mut dyn TexturePool) {
        let page_count = self.source.page_count();
        info!("document reloaded: {page_count} pages");

        self.cache.dispose_all(pool);
        self.cache = TileCache::new(page_count);
        self.layout.reset(page_count, self.config.default_page_size);
        self.layout.relayout(self.viewport.viewport_size());
        self.viewport.set_content_size(self.layout.content_size());

        // Outcomes for the old document resolve to unknown request ids and
        // get dropped by pump
        self.pending.clear();
        self.preview_queue.clear();
        self.preview_active = false;
        self.overlay_deadline = None;
        self.force_refresh = true;
        self.visibility_refresh_requested = true;
        self.events.push(ViewerEvent::RelayoutNeeded);
    }

    /// Tear down all tiles and stop the workers. Terminal.
    pub fn dispose(&mut self, pool: &mut dyn TexturePool) {
        if self.disposed {
            return;
        }
        self.cache.dispose_all(pool);
        self.pending.clear();
        self.preview_queue.clear();
        self.preview_active = false;
        self.overlay_deadline = None;
        self.disposed = true;
        self.shutdown_workers();
    }

    fn shutdown_workers(&self) {
        for _ in 0..self.workers {
            let _ = self.job_tx.send(RenderJob::Shutdown);
        }
    }

    /// The "determine pages to show" algorithm, run once per coalesced
    /// transform change
    fn determine_pages_to_show(&mut self, now: Instant) {
        let change = self.cache.update_visibility(&self.layout, &self.viewport);
        if change.any_changed {
            self.events.push(ViewerEvent::RelayoutNeeded);
        }

        if !change.newly_visible.is_empty() || self.force_refresh {
            self.start_preview_pass(now);
        } else {
            self.arm_overlay_debounce(now);
        }
    }

    fn arm_overlay_debounce(&mut self, now: Instant) {
        self.overlay_deadline = Some(now + self.config.overlay_debounce());
    }

    fn start_preview_pass(&mut self, now: Instant) {
        // The preview pass owns the quiet interval: it re-arms the overlay
        // deadline when it drains
        self.overlay_deadline = None;

        let candidates =
            self.cache
                .preview_candidates(&self.layout, &self.viewport, self.config.preview_margin_px);
        self.preview_queue = candidates
            .into_iter()
            .filter(|&page| {
                matches!(
                    self.cache.status(page),
                    TileStatus::NotInitialized | TileStatus::Initialized
                )
            })
            .collect();

        debug!("preview pass: {} candidate pages", self.preview_queue.len());
        self.preview_active = true;

        // A pass restarted while the previous pass's job is still in flight
        // must wait for that completion; pump continues with the new queue
        if !self.has_pending_sequential_job() {
            self.issue_next_preview(now);
        }
    }

    fn has_pending_sequential_job(&self) -> bool {
        self.pending
            .values()
            .any(|job| matches!(job.kind, JobKind::Open | JobKind::Preview))
    }

    /// Issue the next preview job, keeping exactly one in flight so pages
    /// arrive in visual order
    fn issue_next_preview(&mut self, now: Instant) {
        while let Some(page) = self.preview_queue.pop_front() {
            match self.cache.status(page) {
                TileStatus::NotInitialized => {
                    if self.cache.begin_open(page) {
                        let id = self.next_id();
                        self.pending.insert(
                            id,
                            PendingJob {
                                page,
                                kind: JobKind::Open,
                                overlay_rect: None,
                            },
                        );
                        let _ = self.job_tx.send(RenderJob::OpenPage { id, page });
                        return;
                    }
                }
                TileStatus::Initialized => {
                    if self.issue_preview_render(page) {
                        return;
                    }
                }
                _ => {}
            }
        }

        self.finish_preview_pass(now);
    }

    fn issue_preview_render(&mut self, page: usize) -> bool {
        let Some(handle) = self.cache.handle(page) else {
            return false;
        };
        let Some(size) = self.layout.natural_size(page) else {
            return false;
        };
        if !self.cache.begin_preview(page) {
            return false;
        }

        // Previews render at the page's natural pixel size, 1 point = 1 px.
        // No device-pixel multiplier: the preview is the cheap fallback
        // shared across zoom levels.
        let width = (size.width.round() as u32).max(1);
        let height = (size.height.round() as u32).max(1);

        let id = self.next_id();
        self.pending.insert(
            id,
            PendingJob {
                page,
                kind: JobKind::Preview,
                overlay_rect: None,
            },
        );
        let _ = self.job_tx.send(RenderJob::Preview {
            id,
            page,
            handle,
            region: RenderRegion::full_page(width, height),
        });
        true
    }

    fn finish_preview_pass(&mut self, now: Instant) {
        if self.preview_active {
            debug!("preview pass drained");
        }
        self.preview_active = false;
        self.force_refresh = false;
        // The real-size pass always follows a completed preview pass
        self.arm_overlay_debounce(now);
    }

    /// Apply finished worker results on the interactive thread
    fn pump(&mut self, now: Instant, pool: &mut dyn TexturePool) {
        while let Ok(outcome) = self.outcome_rx.try_recv() {
            match outcome {
                RenderOutcome::PageOpened { id, page, handle } => {
                    if self.pending.remove(&id).is_none() {
                        continue;
                    }
                    self.apply_page_opened(page, handle, now);
                }

                RenderOutcome::PreviewReady { id, page, pixels } => {
                    if self.pending.remove(&id).is_none() {
                        continue;
                    }
                    if self.cache.status(page) == TileStatus::PreviewLoading {
                        let texture = upload(pool, &pixels);
                        if self.cache.preview_ready(page, texture, pool) {
                            self.events.push(ViewerEvent::PreviewUpdated { page });
                        }
                    }
                    if self.preview_active {
                        self.issue_next_preview(now);
                    }
                }

                RenderOutcome::OverlayReady {
                    id,
                    page,
                    slot,
                    pixels,
                } => {
                    let Some(job) = self.pending.remove(&id) else {
                        continue;
                    };
                    let Some(rect) = job.overlay_rect else {
                        continue;
                    };
                    // Evicted or disposed mid-flight: the result is stale
                    if self.cache.status(page) == TileStatus::PreviewLoaded {
                        let texture = upload(pool, &pixels);
                        if self.cache.overlay_ready(page, slot, texture, rect, pool) {
                            self.events.push(ViewerEvent::OverlayUpdated { page });
                        }
                    }
                }

                RenderOutcome::Failed {
                    id,
                    page,
                    kind,
                    fault,
                } => {
                    if self.pending.remove(&id).is_none() {
                        continue;
                    }
                    warn!("render failed for page {page} ({kind:?}): {fault}");
                    match kind {
                        JobKind::Open => {
                            self.cache.handle_failed(page);
                            self.events.push(ViewerEvent::PageLoadFailed { page });
                            if self.preview_active {
                                self.issue_next_preview(now);
                            }
                        }
                        JobKind::Preview => {
                            self.cache.preview_failed(page);
                            if self.preview_active {
                                self.issue_next_preview(now);
                            }
                        }
                        JobKind::Overlay { .. } => {}
                    }
                }
            }
        }
    }

    fn apply_page_opened(
        &mut self,
        page: usize,
        handle: Arc<dyn crate::backend::PageHandle>,
        now: Instant,
    ) {
        if self.cache.status(page) == TileStatus::Disposed {
            return;
        }

        let size = handle.size();
        self.cache.handle_opened(page, handle);

        // Page 1's real size becomes the placeholder for every page whose
        // true size is still unknown (uniform-document-size assumption)
        let mut corrected = self.layout.correct_page_size(page, size);
        if page == 1 && self.layout.set_uniform_placeholder(size) {
            corrected = true;
        }

        if corrected {
            // All later pages' rectangles may now be wrong: abort the pass,
            // relayout, and restart from scratch
            debug!("page {page} size correction forces relayout");
            self.preview_queue.clear();
            self.preview_active = false;

            self.layout.relayout(self.viewport.viewport_size());
            self.viewport.set_content_size(self.layout.content_size());
            let _ = self.viewport.take_changed();

            self.events.push(ViewerEvent::RelayoutNeeded);
            // Pages that stayed visible across the relayout still lack
            // previews, so the restarted pass must not depend on the
            // newly-visible set
            self.force_refresh = true;
            self.determine_pages_to_show(now);
        } else if self.preview_active {
            // Continue the pass with this page's own preview
            if !self.issue_preview_render(page) {
                self.issue_next_preview(now);
            }
        }
    }

    /// The debounced real-size pass: evict distant pages, then refresh
    /// overlays for visible pages whose preview resolution falls short
    fn run_overlay_pass(&mut self, pool: &mut dyn TexturePool) {
        self.overlay_deadline = None;

        self.cache.evict_pass(
            &self.layout,
            &self.viewport,
            self.config.full_purge_distance,
            self.config.overlay_release_distance,
            pool,
        );

        let mut visible: Vec<usize> = self.cache.visible_areas().keys().copied().collect();
        visible.sort_unstable();

        let screen = self.viewport.screen_rect();
        let transform = self.viewport.transform();
        let device_scale = self.config.device_scale;

        for page in visible {
            if self.cache.status(page) != TileStatus::PreviewLoaded {
                continue;
            }
            if self.has_pending_overlay(page) {
                continue;
            }
            let Some(page_rect) = self.layout.page_rect(page) else {
                continue;
            };
            let Some(handle) = self.cache.handle(page) else {
                continue;
            };

            let zoomed = self.viewport.zoomed_rect(page_rect);
            let required_w = (zoomed.width * device_scale).ceil() as u32;
            let required_h = (zoomed.height * device_scale).ceil() as u32;

            if self
                .cache
                .preview_texture(page)
                .is_some_and(|t| t.covers(required_w, required_h))
            {
                // The preview already matches the screen resolution
                self.cache.clear_overlay(page, pool);
                continue;
            }

            let Some(visible_screen) = zoomed.intersection(screen) else {
                continue;
            };

            // Page-relative layout rectangle the overlay will cover
            let doc_origin = transform.to_document(visible_screen.origin());
            let overlay_rect = RectF::new(
                doc_origin.x - page_rect.x,
                doc_origin.y - page_rect.y,
                visible_screen.width / transform.scale,
                visible_screen.height / transform.scale,
            );

            let region = RenderRegion {
                src_x: (visible_screen.x - zoomed.x) * device_scale,
                src_y: (visible_screen.y - zoomed.y) * device_scale,
                src_width: visible_screen.width * device_scale,
                src_height: visible_screen.height * device_scale,
                full_width: required_w.max(1),
                full_height: required_h.max(1),
                background_fill: true,
                device_scale,
            };

            let slot = self.cache.inactive_overlay_slot(page);
            let id = self.next_id();
            self.pending.insert(
                id,
                PendingJob {
                    page,
                    kind: JobKind::Overlay { slot },
                    overlay_rect: Some(overlay_rect),
                },
            );
            let _ = self.job_tx.send(RenderJob::Overlay {
                id,
                page,
                slot,
                handle,
                region,
            });
        }
    }

    fn has_pending_overlay(&self, page: usize) -> bool {
        self.pending
            .values()
            .any(|job| job.page == page && matches!(job.kind, JobKind::Overlay { .. }))
    }

    fn next_id(&mut self) -> RequestId {
        let id = RequestId::new(self.next_request_id);
        self.next_request_id += 1;
        id
    }
}

impl Drop for RenderScheduler {
    fn drop(&mut self) {
        self.shutdown_workers();
    }
}

fn upload(pool: &mut dyn TexturePool, pixels: &crate::types::PixelBuffer) -> TileTexture {
    let id = pool.allocate(pixels.width, pixels.height);
    pool.update(id, pixels);
    TileTexture {
        id,
        width: pixels.width,
        height: pixels.height,
    }
}
