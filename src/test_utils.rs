//! Shared fixtures for unit and integration tests
//!
//! Compiled only for tests (or with the `test-utils` feature, which the
//! crate's own dev-dependency enables for integration tests).

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::backend::{PageHandle, PageSource, RenderRegion, SourceFault, TexturePool};
use crate::geometry::SizeF;
use crate::scheduler::RenderScheduler;
use crate::types::{PixelBuffer, TextureId};

/// A render call observed by a [`FakeSource`] page
#[derive(Clone, Copy, Debug)]
pub struct RenderCall {
    pub page: usize,
    pub region: RenderRegion,
}

/// Minimal page handle for cache-level tests
pub struct NullPage;

impl PageHandle for NullPage {
    fn size(&self) -> SizeF {
        SizeF::new(100.0, 100.0)
    }

    fn render_region(&self, region: &RenderRegion) -> Result<PixelBuffer, SourceFault> {
        let src = region.resolve()?;
        Ok(solid_pixels(src.width as u32, src.height as u32))
    }
}

/// Scriptable document source: per-page sizes, injectable failures, and
/// call accounting for the idempotency properties.
pub struct FakeSource {
    sizes: Vec<SizeF>,
    open_calls: Mutex<HashMap<usize, usize>>,
    fail_open: Mutex<HashSet<usize>>,
    fail_render: Arc<Mutex<HashSet<usize>>>,
    render_log: Arc<Mutex<Vec<RenderCall>>>,
}

impl FakeSource {
    /// Every page the same size
    #[must_use]
    pub fn uniform(page_count: usize, size: SizeF) -> Self {
        Self::with_sizes(vec![size; page_count])
    }

    #[must_use]
    pub fn with_sizes(sizes: Vec<SizeF>) -> Self {
        Self {
            sizes,
            open_calls: Mutex::new(HashMap::new()),
            fail_open: Mutex::new(HashSet::new()),
            fail_render: Arc::new(Mutex::new(HashSet::new())),
            render_log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Make `open_page` fail for the given page
    pub fn fail_open(&self, page: usize) {
        lock(&self.fail_open).insert(page);
    }

    /// Make `render_region` fail for the given page
    pub fn fail_render(&self, page: usize) {
        lock(&self.fail_render).insert(page);
    }

    pub fn clear_render_failures(&self) {
        lock(&self.fail_render).clear();
    }

    /// How many times `open_page` was called for a page
    #[must_use]
    pub fn open_count(&self, page: usize) -> usize {
        lock(&self.open_calls).get(&page).copied().unwrap_or(0)
    }

    /// Every render call observed so far, in order
    #[must_use]
    pub fn render_log(&self) -> Vec<RenderCall> {
        lock(&self.render_log).clone()
    }

    /// Render calls for one page
    #[must_use]
    pub fn render_count(&self, page: usize) -> usize {
        lock(&self.render_log)
            .iter()
            .filter(|call| call.page == page)
            .count()
    }
}

impl PageSource for FakeSource {
    fn page_count(&self) -> usize {
        self.sizes.len()
    }

    fn open_page(&self, page_number: usize) -> Result<Arc<dyn PageHandle>, SourceFault> {
        *lock(&self.open_calls).entry(page_number).or_insert(0) += 1;

        if lock(&self.fail_open).contains(&page_number) {
            return Err(SourceFault::open(format!("page {page_number} unavailable")));
        }

        let size = page_number
            .checked_sub(1)
            .and_then(|i| self.sizes.get(i))
            .copied()
            .ok_or(SourceFault::PageOutOfRange {
                page: page_number,
                count: self.sizes.len(),
            })?;

        Ok(Arc::new(FakePage {
            page: page_number,
            size,
            fail_render: Arc::clone(&self.fail_render),
            render_log: Arc::clone(&self.render_log),
        }))
    }
}

struct FakePage {
    page: usize,
    size: SizeF,
    fail_render: Arc<Mutex<HashSet<usize>>>,
    render_log: Arc<Mutex<Vec<RenderCall>>>,
}

impl PageHandle for FakePage {
    fn size(&self) -> SizeF {
        self.size
    }

    fn render_region(&self, region: &RenderRegion) -> Result<PixelBuffer, SourceFault> {
        let src = region.resolve()?;

        if lock(&self.fail_render).contains(&self.page) {
            return Err(SourceFault::render(format!(
                "injected failure for page {}",
                self.page
            )));
        }

        lock(&self.render_log).push(RenderCall {
            page: self.page,
            region: *region,
        });

        Ok(solid_pixels(
            (src.width.round() as u32).max(1),
            (src.height.round() as u32).max(1),
        ))
    }
}

/// Texture pool that records every allocation, update, and disposal
#[derive(Default)]
pub struct RecordingPool {
    next: u64,
    pub allocations: Vec<(TextureId, u32, u32)>,
    pub updates: Vec<TextureId>,
    pub disposed: Vec<TextureId>,
    pub live: HashSet<TextureId>,
}

impl RecordingPool {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl TexturePool for RecordingPool {
    fn allocate(&mut self, width: u32, height: u32) -> TextureId {
        self.next += 1;
        let id = TextureId::new(self.next);
        self.allocations.push((id, width, height));
        self.live.insert(id);
        id
    }

    fn update(&mut self, id: TextureId, _pixels: &PixelBuffer) {
        self.updates.push(id);
    }

    fn dispose(&mut self, id: TextureId) {
        self.live.remove(&id);
        self.disposed.push(id);
    }
}

/// Tick the scheduler until `pred` holds, advancing simulated time in
/// lockstep with small real sleeps so worker results can arrive. Returns
/// whether the predicate was met before the attempt budget ran out.
pub fn run_until(
    engine: &mut RenderScheduler,
    pool: &mut RecordingPool,
    now: &mut Instant,
    pred: impl Fn(&RenderScheduler) -> bool,
) -> bool {
    for _ in 0..500 {
        engine.tick(*now, pool);
        if pred(engine) {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
        *now += Duration::from_millis(2);
    }
    false
}

/// Tick for a fixed simulated duration regardless of state
pub fn run_for(
    engine: &mut RenderScheduler,
    pool: &mut RecordingPool,
    now: &mut Instant,
    duration: Duration,
) {
    let end = *now + duration;
    while *now < end {
        engine.tick(*now, pool);
        std::thread::sleep(Duration::from_millis(2));
        *now += Duration::from_millis(2);
    }
    engine.tick(*now, pool);
}

fn solid_pixels(width: u32, height: u32) -> PixelBuffer {
    PixelBuffer {
        pixels: vec![0xFF; (width as usize) * (height as usize) * 4],
        width,
        height,
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
