//! Render worker - runs in background thread(s)

use std::sync::Arc;

use flume::{Receiver, Sender};
use log::debug;

use crate::backend::PageSource;
use crate::request::{JobKind, RenderJob, RenderOutcome};

/// Worker loop: pulls jobs from the shared queue until shutdown.
///
/// Send failures are ignored; they only occur when the scheduler has been
/// dropped, at which point results are unwanted anyway.
pub(crate) fn render_worker(
    source: Arc<dyn PageSource>,
    jobs: Receiver<RenderJob>,
    outcomes: Sender<RenderOutcome>,
) {
    for job in jobs {
        match job {
            RenderJob::OpenPage { id, page } => match source.open_page(page) {
                Ok(handle) => {
                    debug!("worker: opened page {page}");
                    let _ = outcomes.send(RenderOutcome::PageOpened { id, page, handle });
                }
                Err(fault) => {
                    let _ = outcomes.send(RenderOutcome::Failed {
                        id,
                        page,
                        kind: JobKind::Open,
                        fault,
                    });
                }
            },

            RenderJob::Preview {
                id,
                page,
                handle,
                region,
            } => match handle.render_region(&region) {
                Ok(pixels) => {
                    let _ = outcomes.send(RenderOutcome::PreviewReady { id, page, pixels });
                }
                Err(fault) => {
                    let _ = outcomes.send(RenderOutcome::Failed {
                        id,
                        page,
                        kind: JobKind::Preview,
                        fault,
                    });
                }
            },

            RenderJob::Overlay {
                id,
                page,
                slot,
                handle,
                region,
            } => match handle.render_region(&region) {
                Ok(pixels) => {
                    let _ = outcomes.send(RenderOutcome::OverlayReady {
                        id,
                        page,
                        slot,
                        pixels,
                    });
                }
                Err(fault) => {
                    let _ = outcomes.send(RenderOutcome::Failed {
                        id,
                        page,
                        kind: JobKind::Overlay { slot },
                        fault,
                    });
                }
            },

            RenderJob::Shutdown => break,
        }
    }
}
