//! Progress-callback trait for pipeline stage events.
//!
//! Inject an [`Arc<dyn PipelineProgress>`] via
//! [`crate::config::PipelineConfigBuilder::progress_callback`] to receive
//! events as a run moves through its stages.
//!
//! # Example
//!
//! ```rust
//! use pdfinvert::{PipelineConfig, PipelineProgress};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct SheetCounter {
//!     sheets: AtomicUsize,
//! }
//!
//! impl PipelineProgress for SheetCounter {
//!     fn on_sheet_composed(&self, sheet: usize, total: usize) {
//!         self.sheets.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("sheet {}/{}", sheet, total);
//!     }
//! }
//!
//! let counter = Arc::new(SheetCounter { sheets: AtomicUsize::new(0) });
//!
//! let config = PipelineConfig::builder()
//!     .progress_callback(counter as Arc<dyn PipelineProgress>)
//!     .build()
//!     .unwrap();
//! ```

use crate::pipeline::PipelineStats;
use std::sync::Arc;

/// Called by the pipeline as a run advances.
///
/// Events arrive in stage order from the thread driving the run; page-level
/// parallelism inside a stage is not visible here. All methods have no-op
/// defaults.
pub trait PipelineProgress: Send + Sync {
    /// Called once before stage A starts, with the number of input documents.
    fn on_run_start(&self, documents: usize) {
        let _ = documents;
    }

    /// Input document `index` (1-based) of `total` was rasterised, inverted
    /// and rebuilt into `pages` pages.
    fn on_document_inverted(&self, index: usize, total: usize, pages: usize) {
        let _ = (index, total, pages);
    }

    /// The inverted documents were merged into one of `pages` pages.
    fn on_merged(&self, pages: usize) {
        let _ = pages;
    }

    /// Output sheet `sheet` (1-based) of `total` was composed.
    fn on_sheet_composed(&self, sheet: usize, total: usize) {
        let _ = (sheet, total);
    }

    /// Called once after the archive was built.
    fn on_run_complete(&self, stats: &PipelineStats) {
        let _ = stats;
    }
}

/// A no-op implementation, used when no callback is configured.
pub struct NoopProgress;

impl PipelineProgress for NoopProgress {}

/// Convenience alias matching the type stored in [`crate::config::PipelineConfig`].
pub type ProgressCallback = Arc<dyn PipelineProgress>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Tracking {
        documents: AtomicUsize,
        inverted_pages: AtomicUsize,
        sheets: AtomicUsize,
    }

    impl PipelineProgress for Tracking {
        fn on_run_start(&self, documents: usize) {
            self.documents.store(documents, Ordering::SeqCst);
        }

        fn on_document_inverted(&self, _index: usize, _total: usize, pages: usize) {
            self.inverted_pages.fetch_add(pages, Ordering::SeqCst);
        }

        fn on_sheet_composed(&self, _sheet: usize, _total: usize) {
            self.sheets.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_does_not_panic() {
        let cb = NoopProgress;
        cb.on_run_start(2);
        cb.on_document_inverted(1, 2, 4);
        cb.on_merged(4);
        cb.on_sheet_composed(1, 2);
        cb.on_run_complete(&PipelineStats::default());
    }

    #[test]
    fn overridden_methods_receive_events() {
        let tracker = Arc::new(Tracking::default());
        let cb: ProgressCallback = tracker.clone();

        cb.on_run_start(2);
        cb.on_document_inverted(1, 2, 3);
        cb.on_document_inverted(2, 2, 1);
        cb.on_merged(4);
        cb.on_sheet_composed(1, 2);
        cb.on_sheet_composed(2, 2);

        assert_eq!(tracker.documents.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.inverted_pages.load(Ordering::SeqCst), 4);
        assert_eq!(tracker.sheets.load(Ordering::SeqCst), 2);
    }
}
