//! Controller-facing geometry queries
//!
//! The surrounding UI navigates through these: page rectangles, "go to
//! page" transforms, and the current-page query. The controller holds a
//! non-owning reference to the scheduler; the scheduler owns all state, so
//! there is no controller/viewer reference cycle.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use crate::geometry::{PointF, RectF, ViewTransform};
use crate::scheduler::RenderScheduler;
use crate::types::DocumentInfo;

/// Where on the screen the requested page point lands
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Anchor {
    TopLeft,
    TopCenter,
    TopRight,
    CenterLeft,
    Center,
    CenterRight,
    BottomLeft,
    BottomCenter,
    BottomRight,
}

impl Anchor {
    fn fractions(self) -> (f32, f32) {
        match self {
            Self::TopLeft => (0.0, 0.0),
            Self::TopCenter => (0.5, 0.0),
            Self::TopRight => (1.0, 0.0),
            Self::CenterLeft => (0.0, 0.5),
            Self::Center => (0.5, 0.5),
            Self::CenterRight => (1.0, 0.5),
            Self::BottomLeft => (0.0, 1.0),
            Self::BottomCenter => (0.5, 1.0),
            Self::BottomRight => (1.0, 1.0),
        }
    }
}

impl RenderScheduler {
    /// A page's laid-out rectangle in document space (1-based)
    #[must_use]
    pub fn page_rect(&self, page_number: usize) -> Option<RectF> {
        self.layout().page_rect(page_number)
    }

    /// Transform that places `relative` (a fractional position within the
    /// page, `[0,1]x[0,1]`) at the screen position implied by `anchor`, at
    /// `target_zoom` (defaulting to the zoom that fits the page's padded
    /// width into the viewport width). Clamped to the content bounds like
    /// every other transform.
    ///
    /// # Panics
    ///
    /// Panics if `relative` lies outside `[0,1]x[0,1]`; that is a
    /// programmer error, not a recoverable condition.
    #[must_use]
    pub fn page_matrix(
        &self,
        page_number: usize,
        relative: PointF,
        anchor: Anchor,
        target_zoom: Option<f32>,
    ) -> Option<ViewTransform> {
        assert!(
            (0.0..=1.0).contains(&relative.x) && (0.0..=1.0).contains(&relative.y),
            "relative point {relative:?} outside [0,1]x[0,1]"
        );

        let rect = self.layout().page_rect(page_number)?;
        let zoom = ViewTransform::clamp_scale(
            target_zoom.unwrap_or_else(|| self.page_fit_zoom(rect)),
        );

        let doc_point = PointF::new(
            rect.x + relative.x * rect.width,
            rect.y + relative.y * rect.height,
        );

        let (fx, fy) = anchor.fractions();
        let viewport = self.viewport().viewport_size();
        let screen_pos = PointF::new(fx * viewport.width, fy * viewport.height);

        let offset = PointF::new(
            doc_point.x * zoom - screen_pos.x,
            doc_point.y * zoom - screen_pos.y,
        );

        Some(ViewTransform {
            offset: self.viewport().clamp_offset(offset, zoom),
            scale: zoom,
        })
    }

    /// Transform that scrolls a page into view at its width-fitting zoom
    #[must_use]
    pub fn page_fit_matrix(&self, page_number: usize) -> Option<ViewTransform> {
        self.page_matrix(page_number, PointF::ZERO, Anchor::TopLeft, None)
    }

    fn page_fit_zoom(&self, rect: RectF) -> f32 {
        let padded = rect.width + 2.0 * self.layout().padding();
        if padded <= 0.0 {
            1.0
        } else {
            self.viewport().viewport_size().width / padded
        }
    }
}

/// Non-owning controller handle.
///
/// Attach it to the scheduler that owns the state; every query returns
/// `None` once the scheduler is gone or the controller is detached.
#[derive(Default)]
pub struct ViewerController {
    engine: Option<Weak<RefCell<RenderScheduler>>>,
}

impl ViewerController {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&mut self, engine: &Rc<RefCell<RenderScheduler>>) {
        self.engine = Some(Rc::downgrade(engine));
    }

    pub fn detach(&mut self) {
        self.engine = None;
    }

    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.engine
            .as_ref()
            .is_some_and(|weak| weak.strong_count() > 0)
    }

    #[must_use]
    pub fn document_info(&self) -> Option<DocumentInfo> {
        self.with(|engine| engine.document_info())
    }

    #[must_use]
    pub fn page_rect(&self, page_number: usize) -> Option<RectF> {
        self.with(|engine| engine.page_rect(page_number))?
    }

    #[must_use]
    pub fn page_matrix(
        &self,
        page_number: usize,
        relative: PointF,
        anchor: Anchor,
        target_zoom: Option<f32>,
    ) -> Option<ViewTransform> {
        self.with(|engine| engine.page_matrix(page_number, relative, anchor, target_zoom))?
    }

    #[must_use]
    pub fn page_fit_matrix(&self, page_number: usize) -> Option<ViewTransform> {
        self.with(|engine| engine.page_fit_matrix(page_number))?
    }

    #[must_use]
    pub fn current_page(&self) -> Option<usize> {
        self.with(|engine| engine.current_page())?
    }

    #[must_use]
    pub fn visible_page_areas(&self) -> Option<HashMap<usize, f32>> {
        self.with(|engine| engine.visible_page_areas().clone())
    }

    fn with<T>(&self, f: impl FnOnce(&RenderScheduler) -> T) -> Option<T> {
        let engine = self.engine.as_ref()?.upgrade()?;
        let engine = engine.borrow();
        Some(f(&engine))
    }
}
