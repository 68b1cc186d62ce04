//! Viewport-driven incremental tile cache for paginated document viewing.
//!
//! The crate decides, as the user pans and zooms, which pages need a cheap
//! low-res preview, which need a high-res real-size overlay, and which can
//! be evicted - without redundant render work and without ever blocking the
//! interactive thread. Rasterization, document parsing, and GPU texture
//! plumbing stay behind the collaborator traits in [`backend`].
//!
//! Typical wiring:
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Instant;
//! use quire::{RenderScheduler, ViewerConfig, SizeF};
//!
//! # fn open_source() -> Arc<dyn quire::PageSource> { unimplemented!() }
//! # fn pool() -> Box<dyn quire::TexturePool> { unimplemented!() }
//! let source = open_source();
//! let mut pool = pool();
//! let mut engine = RenderScheduler::new(
//!     source,
//!     SizeF::new(800.0, 600.0),
//!     ViewerConfig::default(),
//! );
//!
//! // Per frame: apply gestures, then tick and drain events
//! engine.tick(Instant::now(), pool.as_mut());
//! for event in engine.take_events() {
//!     // swap textures / rebuild widgets
//!     let _ = event;
//! }
//! ```

pub mod backend;
pub mod cache;
pub mod config;
pub mod controller;
pub mod geometry;
pub mod layout;
mod request;
pub mod scheduler;
pub mod types;
pub mod viewport;
mod worker;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use backend::{PageHandle, PageSource, RenderRegion, SourceFault, TexturePool};
pub use cache::{TileCache, TileStatus, TileTexture};
pub use config::ViewerConfig;
pub use controller::{Anchor, ViewerController};
pub use geometry::{PointF, RectF, SizeF, ViewTransform};
pub use layout::{LayoutFn, LayoutMode, PageLayout};
pub use scheduler::RenderScheduler;
pub use types::{DocumentInfo, PixelBuffer, Placeholder, TextureId, ViewerEvent};
pub use viewport::ViewportTracker;
