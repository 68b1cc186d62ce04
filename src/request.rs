//! Render job and outcome types exchanged with the worker pool

use std::sync::Arc;

use crate::backend::{PageHandle, RenderRegion, SourceFault};
use crate::types::PixelBuffer;

/// Unique identifier for render jobs
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RequestId(pub u64);

impl RequestId {
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

/// Which kind of work a job performs
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobKind {
    /// Resolve a page handle
    Open,
    /// Rasterize the low-res preview
    Preview,
    /// Rasterize a real-size overlay into the given buffer slot
    Overlay { slot: usize },
}

/// Job sent to render workers
pub(crate) enum RenderJob {
    /// Resolve a page handle and report its natural size
    OpenPage { id: RequestId, page: usize },

    /// Rasterize the page preview at its natural pixel size
    Preview {
        id: RequestId,
        page: usize,
        handle: Arc<dyn PageHandle>,
        region: RenderRegion,
    },

    /// Rasterize a real-size overlay sub-rectangle
    Overlay {
        id: RequestId,
        page: usize,
        slot: usize,
        handle: Arc<dyn PageHandle>,
        region: RenderRegion,
    },

    /// Shut down the worker
    Shutdown,
}

/// Outcome sent back from render workers
pub(crate) enum RenderOutcome {
    PageOpened {
        id: RequestId,
        page: usize,
        handle: Arc<dyn PageHandle>,
    },

    PreviewReady {
        id: RequestId,
        page: usize,
        pixels: PixelBuffer,
    },

    OverlayReady {
        id: RequestId,
        page: usize,
        slot: usize,
        pixels: PixelBuffer,
    },

    Failed {
        id: RequestId,
        page: usize,
        kind: JobKind,
        fault: SourceFault,
    },
}

impl std::fmt::Debug for RenderOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PageOpened { id, page, .. } => f
                .debug_struct("PageOpened")
                .field("id", id)
                .field("page", page)
                .finish_non_exhaustive(),
            Self::PreviewReady { id, page, pixels } => f
                .debug_struct("PreviewReady")
                .field("id", id)
                .field("page", page)
                .field("pixels", pixels)
                .finish(),
            Self::OverlayReady {
                id,
                page,
                slot,
                pixels,
            } => f
                .debug_struct("OverlayReady")
                .field("id", id)
                .field("page", page)
                .field("slot", slot)
                .field("pixels", pixels)
                .finish(),
            Self::Failed {
                id,
                page,
                kind,
                fault,
            } => f
                .debug_struct("Failed")
                .field("id", id)
                .field("page", page)
                .field("kind", kind)
                .field("fault", fault)
                .finish(),
        }
    }
}
