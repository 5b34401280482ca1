//! Submission and retrieval entry points.
//!
//! [`InvertService`] pairs a [`Pipeline`] with an [`ArtifactStore`]: a
//! submission runs every stage and stores the composited PDF and its archive
//! under one identifier; retrieval looks them up again by that identifier.
//! This is the surface an HTTP front-end or the CLI talks to.

use crate::backend::PdfBackend;
use crate::error::InvertError;
use crate::pipeline::{self, input, Pipeline, PipelineStats};
use crate::store::{Artifact, ArtifactId, ArtifactKind, ArtifactStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Handles returned for a successful submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitReceipt {
    pub id: ArtifactId,
    /// Retrieval path of the composited PDF.
    pub document_path: String,
    /// Retrieval path of the ZIP archive.
    pub archive_path: String,
    pub stats: PipelineStats,
}

impl SubmitReceipt {
    fn new(id: ArtifactId, stats: PipelineStats) -> Self {
        Self {
            id,
            document_path: format!("/download/pdf/{id}"),
            archive_path: format!("/download/zip/{id}"),
            stats,
        }
    }
}

/// Runs submissions through the pipeline and serves the stored results.
pub struct InvertService<B> {
    pipeline: Arc<Pipeline<B>>,
    store: Arc<ArtifactStore>,
}

impl<B> Clone for InvertService<B> {
    fn clone(&self) -> Self {
        Self {
            pipeline: Arc::clone(&self.pipeline),
            store: Arc::clone(&self.store),
        }
    }
}

impl<B: PdfBackend + 'static> InvertService<B> {
    /// Service with a fresh store using the pipeline's retention policy.
    pub fn new(pipeline: Pipeline<B>) -> Self {
        let store = ArtifactStore::new(pipeline.config().retention);
        Self::with_store(Arc::new(pipeline), Arc::new(store))
    }

    pub fn with_store(pipeline: Arc<Pipeline<B>>, store: Arc<ArtifactStore>) -> Self {
        Self { pipeline, store }
    }

    pub fn pipeline(&self) -> &Arc<Pipeline<B>> {
        &self.pipeline
    }

    pub fn store(&self) -> &Arc<ArtifactStore> {
        &self.store
    }

    /// Run the full pipeline over `sources` (in order) on a blocking thread
    /// and store the results.
    pub async fn submit(&self, sources: Vec<Vec<u8>>) -> Result<SubmitReceipt, InvertError> {
        let output = pipeline::process(Arc::clone(&self.pipeline), sources).await?;
        Ok(self.store_output(output.document, output.archive, output.stats))
    }

    /// Resolve paths/URLs, then [`submit`](Self::submit).
    pub async fn submit_inputs<S: AsRef<str>>(&self, inputs: &[S]) -> Result<SubmitReceipt, InvertError> {
        let timeout = self.pipeline.config().download_timeout_secs;
        let sources = input::resolve_inputs(inputs, timeout).await?;
        self.submit(sources).await
    }

    /// Blocking variant of [`submit`](Self::submit) for callers without a runtime.
    pub fn submit_blocking(&self, sources: &[Vec<u8>]) -> Result<SubmitReceipt, InvertError> {
        let output = self.pipeline.run(sources)?;
        Ok(self.store_output(output.document, output.archive, output.stats))
    }

    fn store_output(&self, document: Vec<u8>, archive: Vec<u8>, stats: PipelineStats) -> SubmitReceipt {
        let id = self.store.put(document, archive);
        info!(%id, sheets = stats.sheets, "Stored pipeline output");
        SubmitReceipt::new(id, stats)
    }

    /// The composited PDF stored under `id`.
    pub fn document(&self, id: &str) -> Result<Artifact, InvertError> {
        let id: ArtifactId = id.parse()?;
        Ok(Artifact {
            kind: ArtifactKind::Document,
            bytes: self.store.get_document(&id)?,
        })
    }

    /// The ZIP archive stored under `id`.
    pub fn archive(&self, id: &str) -> Result<Artifact, InvertError> {
        let id: ArtifactId = id.parse()?;
        Ok(Artifact {
            kind: ArtifactKind::Archive,
            bytes: self.store.get_archive(&id)?,
        })
    }
}
