//! # Batch Export
//!
//! Renders every row of a data source and packs the badges onto pages.
//!
//! ## State Machine
//!
//! ```text
//!            ┌──────── cancelled() polled before each row ──┐
//!            │                                              ▼
//! Running ───┼── all rows placed ─────────────────────▶ Done │ Cancelled
//!            │
//!            └── render/write error ──────────────────▶ Error(message)
//! ```
//!
//! The driver itself is synchronous and single-threaded. To keep an
//! interactive caller responsive, run it on a worker (e.g.
//! `tokio::task::spawn_blocking`) and observe it through an [`ExportHandle`],
//! which is safe to share across that boundary.
//!
//! On error, whatever the sink has already written stays where it is; nothing
//! is rolled back. On cancellation the pages placed so far are kept and the
//! document is closed normally.

pub mod pdf;
pub mod sink;

pub use pdf::PdfSink;
pub use sink::PageSink;
#[cfg(any(test, feature = "testing"))]
pub use sink::{RecordedPage, RecordingSink};

use chrono::{DateTime, Utc};
use image::RgbaImage;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

use crate::data::DataSource;
use crate::error::BadgeError;
use crate::layout::CellLayout;
use crate::render::{FontBook, render_badge};
use crate::template::Template;

/// Terminal (or current) state of an export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportStatus {
    Running,
    Done,
    Cancelled,
    Error,
}

impl ExportStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ExportStatus::Running)
    }
}

/// What one export run did.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportReport {
    pub status: ExportStatus,
    /// Rows rendered and placed.
    pub processed: usize,
    pub total: usize,
    pub error: Option<String>,
}

/// Render and place every row of `data`, in order.
///
/// `on_progress(n)` is called once per row, right after row `n - 1` has been
/// placed. `is_cancelled()` is polled before each row; a row that has started
/// always completes. Never returns an error: failures are reported through
/// [`ExportReport::status`].
pub fn export<P, C>(
    template: &Template,
    data: &dyn DataSource,
    sink: &mut dyn PageSink,
    background: Option<&RgbaImage>,
    fonts: &FontBook,
    mut on_progress: P,
    is_cancelled: C,
) -> ExportReport
where
    P: FnMut(usize),
    C: Fn() -> bool,
{
    let layout = CellLayout::compute(template);
    let total = data.row_count();
    let mut processed = 0;

    let result = (|| -> Result<ExportStatus, BadgeError> {
        for i in 0..total {
            if is_cancelled() {
                info!(processed, total, "Export cancelled");
                sink.finish()?;
                return Ok(ExportStatus::Cancelled);
            }

            let badge = render_badge(template, data, i, background, fonts);
            let placement = layout.place(i);
            sink.place(&badge, &placement)?;
            if layout.page_break_after(i, total) {
                sink.end_page()?;
            }

            processed = i + 1;
            debug!(row = i, page = placement.page, "Placed badge");
            on_progress(processed);
        }
        sink.finish()?;
        Ok(ExportStatus::Done)
    })();

    match result {
        Ok(status) => ExportReport {
            status,
            processed,
            total,
            error: None,
        },
        Err(e) => {
            warn!(processed, total, error = %e, "Export failed");
            ExportReport {
                status: ExportStatus::Error,
                processed,
                total,
                error: Some(e.to_string()),
            }
        }
    }
}

/// Export with no progress reporting or cancellation.
pub fn export_all(
    template: &Template,
    data: &dyn DataSource,
    sink: &mut dyn PageSink,
    background: Option<&RgbaImage>,
    fonts: &FontBook,
) -> ExportReport {
    export(template, data, sink, background, fonts, |_| {}, || false)
}

/// Observable state of one export, as seen by whoever started it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportTask {
    pub id: String,
    pub status: ExportStatus,
    pub progress: usize,
    pub total: usize,
    pub error: Option<String>,
    #[serde(skip)]
    pub output: PathBuf,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Shared handle to an [`ExportTask`]: progress is written by the worker and
/// read by the caller under a mutex; cancellation is a separate atomic flag.
#[derive(Debug, Clone)]
pub struct ExportHandle {
    task: Arc<Mutex<ExportTask>>,
    cancel: Arc<AtomicBool>,
}

impl ExportHandle {
    pub fn new(id: impl Into<String>, total: usize, output: PathBuf) -> Self {
        let task = ExportTask {
            id: id.into(),
            status: ExportStatus::Running,
            progress: 0,
            total,
            error: None,
            output,
            started_at: Utc::now(),
            finished_at: None,
        };
        Self {
            task: Arc::new(Mutex::new(task)),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ExportTask> {
        // A panicking writer cannot leave the task half-updated in a way that
        // matters to readers, so poisoning is ignored.
        self.task.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Point-in-time copy of the task.
    pub fn snapshot(&self) -> ExportTask {
        self.lock().clone()
    }

    /// Request cancellation; takes effect at the next row boundary.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    pub fn set_progress(&self, progress: usize) {
        self.lock().progress = progress;
    }

    /// Record the terminal state. Later calls are ignored.
    pub fn complete(&self, report: &ExportReport) {
        let mut task = self.lock();
        if task.status.is_terminal() {
            return;
        }
        task.status = report.status;
        task.progress = report.processed;
        task.error = report.error.clone();
        task.finished_at = Some(Utc::now());
    }

    /// Mark the task failed without a report (e.g. the worker panicked).
    pub fn fail(&self, message: impl Into<String>) {
        let mut task = self.lock();
        if task.status.is_terminal() {
            return;
        }
        task.status = ExportStatus::Error;
        task.error = Some(message.into());
        task.finished_at = Some(Utc::now());
    }
}

/// Export to a PDF file, reporting through `handle`.
///
/// This is the worker-side entry point: blocking, and safe to run on a
/// background thread while the caller polls `handle`.
pub fn export_pdf_file(
    template: &Template,
    data: &dyn DataSource,
    output: &Path,
    background: Option<&RgbaImage>,
    fonts: &FontBook,
    handle: &ExportHandle,
) -> ExportReport {
    let (page_width, page_height) = template.page_size.dimensions_pt();
    let report = match PdfSink::create(output, page_width, page_height) {
        Ok(mut sink) => export(
            template,
            data,
            &mut sink,
            background,
            fonts,
            |n| handle.set_progress(n),
            || handle.is_cancelled(),
        ),
        Err(e) => ExportReport {
            status: ExportStatus::Error,
            processed: 0,
            total: data.row_count(),
            error: Some(e.to_string()),
        },
    };
    handle.complete(&report);
    info!(
        output = %output.display(),
        status = ?report.status,
        processed = report.processed,
        total = report.total,
        "Export finished"
    );
    report
}
