//! Core value types shared across the viewer

/// Opaque handle to a texture owned by the host's [`TexturePool`].
///
/// [`TexturePool`]: crate::backend::TexturePool
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureId(pub u64);

impl TextureId {
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

/// Raw RGBA pixels produced by the rasterizer
#[derive(Clone)]
pub struct PixelBuffer {
    /// RGBA8 pixel data, 4 bytes per pixel
    pub pixels: Vec<u8>,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl std::fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

/// Fire-and-forget notifications for the UI layer.
///
/// Drained via [`RenderScheduler::take_events`]; the scheduler never waits
/// for acknowledgment.
///
/// [`RenderScheduler::take_events`]: crate::scheduler::RenderScheduler::take_events
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ViewerEvent {
    /// A page's low-res preview texture was created or replaced
    PreviewUpdated { page: usize },
    /// A page's real-size overlay texture was swapped in
    OverlayUpdated { page: usize },
    /// Page layout or the visible page set changed; rebuild the widget tree
    RelayoutNeeded,
    /// A page handle could not be resolved; the page stays a placeholder
    PageLoadFailed { page: usize },
}

/// What the UI should draw for a visible page that has no preview yet
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Placeholder {
    /// Render work is pending or in flight
    Loading,
    /// The page handle failed to resolve; no texture will arrive
    LoadFailed,
}

/// Document metadata captured at load time
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DocumentInfo {
    pub page_count: usize,
}
