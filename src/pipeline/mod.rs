//! The four-stage inversion pipeline.
//!
//! Each submodule implements exactly one transformation step; [`Pipeline`]
//! runs them in order.
//!
//! ## Data Flow
//!
//! ```text
//! bytes ──▶ parse ──▶ rebuild ──▶ merge ──▶ layout ──▶ serialize ──▶ bundle
//!  (×N)              (stage A)   (B)       (C)                      (D)
//! ```
//!
//! 1. [`input`]   — read local paths or download URLs into memory
//! 2. [`rebuild`] — stage A: rasterise, [`invert`] and rebuild every page of
//!    one source document
//! 3. [`merge`]   — stage B: concatenate the stage-A documents in input order
//! 4. [`layout`]  — stage C: three pages per A4 sheet plus a "Page n" label
//! 5. [`bundle`]  — stage D: single-entry ZIP around the serialised sheets
//!
//! A run is synchronous and all-or-nothing: the first failing page fails
//! the run and nothing is returned. Page-level work inside a stage runs on
//! the rayon pool and is reassembled by index. [`process`] moves a whole run
//! onto a blocking thread for async callers.

pub mod bundle;
pub mod input;
pub mod invert;
pub mod layout;
pub mod merge;
pub mod rebuild;

use crate::backend::{ImageCodec, PdfBackend, PngCodec};
use crate::config::PipelineConfig;
use crate::error::InvertError;
use crate::model::Document;
use crate::progress::{NoopProgress, PipelineProgress};
use layout::GridLayoutCompositor;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

static NOOP: NoopProgress = NoopProgress;

/// Timing and size figures for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStats {
    /// Input documents.
    pub documents: usize,
    /// Pages across all inputs (= pages after merging).
    pub source_pages: usize,
    /// Pages of the composited output.
    pub sheets: usize,
    pub invert_duration_ms: u64,
    pub merge_duration_ms: u64,
    pub compose_duration_ms: u64,
    pub serialize_duration_ms: u64,
    pub bundle_duration_ms: u64,
    pub total_duration_ms: u64,
    pub document_bytes: usize,
    pub archive_bytes: usize,
}

/// Everything a successful run produces.
#[derive(Clone)]
pub struct PipelineOutput {
    /// The composited PDF.
    pub document: Vec<u8>,
    /// ZIP archive holding `document` as its only entry.
    pub archive: Vec<u8>,
    pub stats: PipelineStats,
}

impl fmt::Debug for PipelineOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineOutput")
            .field("document", &self.document.len())
            .field("archive", &self.archive.len())
            .field("stats", &self.stats)
            .finish()
    }
}

/// Runs the stages against a rendering backend.
pub struct Pipeline<B> {
    backend: B,
    images: Box<dyn ImageCodec>,
    config: PipelineConfig,
}

impl<B: PdfBackend> Pipeline<B> {
    /// A password in `config` replaces whatever the backend was built with.
    pub fn new(mut backend: B, config: PipelineConfig) -> Self {
        if config.password.is_some() {
            backend.set_password(config.password.clone());
        }
        Self {
            backend,
            images: Box::new(PngCodec),
            config,
        }
    }

    /// Replace the PNG codec used for embedded images.
    pub fn with_image_codec(mut self, images: impl ImageCodec + 'static) -> Self {
        self.images = Box::new(images);
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn progress(&self) -> &dyn PipelineProgress {
        match &self.config.progress {
            Some(cb) => cb.as_ref(),
            None => &NOOP,
        }
    }

    /// Stage A for one source. `index` is the 0-based submission position,
    /// used to label decode errors.
    pub fn invert_document(&self, bytes: &[u8], index: usize) -> Result<Document, InvertError> {
        let source = self.backend.parse(bytes, index)?;
        rebuild::invert_pages(&self.backend, self.images.as_ref(), &source, self.config.scale)
    }

    /// Stage B.
    pub fn merge(&self, documents: Vec<Document>) -> Document {
        merge::merge(documents)
    }

    /// Stage C. Stage-A pages are already one unit per pixel, so they are
    /// rasterised again at identity scale.
    pub fn compose(&self, document: &Document) -> Result<Document, InvertError> {
        GridLayoutCompositor::new(&self.backend, self.images.as_ref(), self.config.layout)
            .with_anchor(self.config.anchor)
            .compose(document, self.progress())
    }

    /// Stage D over already serialised bytes.
    pub fn bundle(&self, document: &[u8]) -> Result<Vec<u8>, InvertError> {
        bundle::bundle(document, &self.config.archive_entry_name)
    }

    pub fn serialize(&self, document: &Document) -> Result<Vec<u8>, InvertError> {
        self.backend.serialize(document)
    }

    /// Stages A and B only: the merged, inverted document as PDF bytes.
    pub fn invert_and_merge(&self, sources: &[Vec<u8>]) -> Result<Vec<u8>, InvertError> {
        self.config.validate()?;
        let inverted = self.invert_all(sources)?;
        self.serialize(&self.merge(inverted))
    }

    fn invert_all(&self, sources: &[Vec<u8>]) -> Result<Vec<Document>, InvertError> {
        let progress = self.progress();
        let total = sources.len();
        sources
            .iter()
            .enumerate()
            .map(|(i, bytes)| {
                let doc = self.invert_document(bytes, i)?;
                info!("Inverted document {}/{} ({} pages)", i + 1, total, doc.page_count());
                progress.on_document_inverted(i + 1, total, doc.page_count());
                Ok::<_, InvertError>(doc)
            })
            .collect()
    }

    /// Run all four stages over `sources`, in submission order.
    ///
    /// A config assembled by hand rather than through the builder is
    /// validated here and rejected with [`InvertError::InvalidConfig`].
    pub fn run(&self, sources: &[Vec<u8>]) -> Result<PipelineOutput, InvertError> {
        self.config.validate()?;
        let total_start = Instant::now();
        let progress = self.progress();
        let mut stats = PipelineStats {
            documents: sources.len(),
            ..PipelineStats::default()
        };
        info!("Starting pipeline run over {} documents", sources.len());
        progress.on_run_start(sources.len());

        // ── Stage A: rasterise → invert → rebuild ───────────────────────────
        let t = Instant::now();
        let inverted = self.invert_all(sources)?;
        stats.invert_duration_ms = t.elapsed().as_millis() as u64;

        // ── Stage B: merge ──────────────────────────────────────────────────
        let t = Instant::now();
        let merged = self.merge(inverted);
        stats.source_pages = merged.page_count();
        stats.merge_duration_ms = t.elapsed().as_millis() as u64;
        info!("Merged into {} pages", merged.page_count());
        progress.on_merged(merged.page_count());

        // ── Stage C: grid composition ───────────────────────────────────────
        let t = Instant::now();
        let composed = self.compose(&merged)?;
        stats.sheets = composed.page_count();
        stats.compose_duration_ms = t.elapsed().as_millis() as u64;
        info!("Composed {} sheets", composed.page_count());
        drop(merged);

        let t = Instant::now();
        let document = self.serialize(&composed)?;
        stats.serialize_duration_ms = t.elapsed().as_millis() as u64;

        // ── Stage D: bundle ─────────────────────────────────────────────────
        let t = Instant::now();
        let archive = self.bundle(&document)?;
        stats.bundle_duration_ms = t.elapsed().as_millis() as u64;

        stats.document_bytes = document.len();
        stats.archive_bytes = archive.len();
        stats.total_duration_ms = total_start.elapsed().as_millis() as u64;
        debug!(?stats, "Pipeline run finished");
        info!(
            "Pipeline complete: {} pages → {} sheets, {}ms total",
            stats.source_pages, stats.sheets, stats.total_duration_ms
        );
        progress.on_run_complete(&stats);

        Ok(PipelineOutput {
            document,
            archive,
            stats,
        })
    }
}

/// Run the whole pipeline on a blocking thread.
pub async fn process<B>(
    pipeline: Arc<Pipeline<B>>,
    sources: Vec<Vec<u8>>,
) -> Result<PipelineOutput, InvertError>
where
    B: PdfBackend + 'static,
{
    tokio::task::spawn_blocking(move || pipeline.run(&sources))
        .await
        .map_err(|e| InvertError::Internal(format!("Pipeline task panicked: {}", e)))?
}
