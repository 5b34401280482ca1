//! Remote-storage variant: invert a document that lives in a blob store.
//!
//! The flow is download → stage A → upload → delete the original. Only the
//! inversion stage runs; there is no merge, grid or archive. Storage is
//! reached through [`RemoteBlobStore`]; [`DirectoryBlobStore`] implements it
//! on a local directory tree (a mounted share, a synced folder, a test dir).
//!
//! Where the store lives is process-wide configuration read once from the
//! environment into [`RemoteSettings`].

use crate::backend::PdfBackend;
use crate::error::{InvertError, RemoteOp};
use crate::pipeline::Pipeline;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, OnceLock};
use tracing::{info, warn};
use uuid::Uuid;

/// Opaque identifier of a remote blob.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RemoteId(pub String);

impl RemoteId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RemoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Trait for remote blob storage backends.
#[async_trait::async_trait]
pub trait RemoteBlobStore: Send + Sync {
    /// Store `bytes` as `name` inside `folder` and return the new blob's id.
    async fn upload(&self, name: &str, bytes: Vec<u8>, folder: &str) -> Result<RemoteId, InvertError>;

    async fn download(&self, id: &RemoteId) -> Result<Vec<u8>, InvertError>;

    async fn delete(&self, id: &RemoteId) -> Result<(), InvertError>;

    /// Reference a user can follow to fetch the blob.
    fn link(&self, id: &RemoteId) -> String;
}

fn remote_err(op: RemoteOp, target: impl fmt::Display, detail: impl fmt::Display) -> InvertError {
    InvertError::RemoteIo {
        op,
        target: target.to_string(),
        detail: detail.to_string(),
    }
}

/// Blob store on a local directory. Ids are paths relative to the root,
/// `folder/<uuid>-<name>`.
#[derive(Debug, Clone)]
pub struct DirectoryBlobStore {
    root: PathBuf,
}

impl DirectoryBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of `relative` under the root; anything that could escape it
    /// (absolute paths, `..`, empty ids) is refused.
    fn resolve(&self, relative: &str, op: RemoteOp) -> Result<PathBuf, InvertError> {
        let path = Path::new(relative);
        let plain = path
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if relative.is_empty() || !plain {
            return Err(remote_err(op, relative, "identifier escapes the store root"));
        }
        Ok(self.root.join(path))
    }
}

#[async_trait::async_trait]
impl RemoteBlobStore for DirectoryBlobStore {
    async fn upload(&self, name: &str, bytes: Vec<u8>, folder: &str) -> Result<RemoteId, InvertError> {
        if name.is_empty() || name.contains('/') || name.contains('\\') {
            return Err(remote_err(RemoteOp::Upload, name, "invalid blob name"));
        }
        let folder = folder.trim_matches('/');
        let blob = format!("{}-{}", Uuid::new_v4(), name);
        let id = RemoteId(if folder.is_empty() {
            blob
        } else {
            format!("{folder}/{blob}")
        });
        let path = self.resolve(id.as_str(), RemoteOp::Upload)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| remote_err(RemoteOp::Upload, &id, e))?;
        }
        let partial = path.with_extension("partial");
        tokio::fs::write(&partial, &bytes)
            .await
            .map_err(|e| remote_err(RemoteOp::Upload, &id, e))?;
        tokio::fs::rename(&partial, &path)
            .await
            .map_err(|e| remote_err(RemoteOp::Upload, &id, e))?;

        info!("Uploaded {} bytes as {}", bytes.len(), id);
        Ok(id)
    }

    async fn download(&self, id: &RemoteId) -> Result<Vec<u8>, InvertError> {
        let path = self.resolve(id.as_str(), RemoteOp::Download)?;
        tokio::fs::read(&path)
            .await
            .map_err(|e| remote_err(RemoteOp::Download, id, e))
    }

    async fn delete(&self, id: &RemoteId) -> Result<(), InvertError> {
        let path = self.resolve(id.as_str(), RemoteOp::Delete)?;
        tokio::fs::remove_file(&path)
            .await
            .map_err(|e| remote_err(RemoteOp::Delete, id, e))
    }

    fn link(&self, id: &RemoteId) -> String {
        format!("file://{}", self.root.join(id.as_str()).display())
    }
}

// ── Process-wide settings ────────────────────────────────────────────────

static SETTINGS: OnceLock<RemoteSettings> = OnceLock::new();

/// Where the remote store lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSettings {
    pub root: PathBuf,
    /// Folder uploads go into.
    pub folder: String,
}

impl RemoteSettings {
    /// Required: root directory of the store.
    pub const ROOT_VAR: &'static str = "PDFINVERT_REMOTE_ROOT";
    /// Optional: upload folder, default [`RemoteSettings::DEFAULT_FOLDER`].
    pub const FOLDER_VAR: &'static str = "PDFINVERT_REMOTE_FOLDER";
    pub const DEFAULT_FOLDER: &'static str = "inverted";

    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self, InvertError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Read settings through `lookup` (variable name → value).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, InvertError> {
        let root = lookup(Self::ROOT_VAR)
            .filter(|v| !v.trim().is_empty())
            .ok_or(InvertError::RemoteNotConfigured {
                var: Self::ROOT_VAR,
            })?;
        let folder = lookup(Self::FOLDER_VAR)
            .map(|v| v.trim().trim_matches('/').to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| Self::DEFAULT_FOLDER.to_string());
        Ok(Self {
            root: PathBuf::from(root),
            folder,
        })
    }

    /// Initialise the process-wide settings from the environment. Later
    /// calls return the first successful result.
    pub fn init() -> Result<&'static RemoteSettings, InvertError> {
        if let Some(settings) = SETTINGS.get() {
            return Ok(settings);
        }
        let settings = Self::from_env()?;
        Ok(SETTINGS.get_or_init(|| settings))
    }

    /// The settings installed by [`init`](Self::init).
    pub fn global() -> Result<&'static RemoteSettings, InvertError> {
        SETTINGS.get().ok_or(InvertError::RemoteNotConfigured {
            var: Self::ROOT_VAR,
        })
    }

    pub fn store(&self) -> DirectoryBlobStore {
        DirectoryBlobStore::new(&self.root)
    }
}

// ── Remote inversion ─────────────────────────────────────────────────────

/// Result of [`invert_remote`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteOutcome {
    /// Id of the uploaded, inverted document.
    pub id: RemoteId,
    pub link: String,
}

/// Name for the inverted copy of `id`.
fn inverted_name(id: &RemoteId) -> String {
    let base = id.as_str().rsplit('/').next().unwrap_or_default();
    let base = base.strip_suffix(".pdf").unwrap_or(base);
    if base.is_empty() {
        "inverted.pdf".to_string()
    } else {
        format!("inverted-{base}.pdf")
    }
}

/// Download `id`, invert it, upload the result into `folder` and delete the
/// original.
///
/// A failed delete after a successful upload is an error naming both
/// blobs; the uploaded copy is left in place.
pub async fn invert_remote<B, S>(
    pipeline: Arc<Pipeline<B>>,
    store: &S,
    id: &RemoteId,
    folder: &str,
) -> Result<RemoteOutcome, InvertError>
where
    B: PdfBackend + 'static,
    S: RemoteBlobStore + ?Sized,
{
    let bytes = store.download(id).await?;
    info!("Downloaded {} ({} bytes)", id, bytes.len());

    let inverted = tokio::task::spawn_blocking(move || {
        pipeline.invert_and_merge(std::slice::from_ref(&bytes))
    })
    .await
    .map_err(|e| InvertError::Internal(format!("Inversion task panicked: {}", e)))??;

    let uploaded = store.upload(&inverted_name(id), inverted, folder).await?;

    if let Err(e) = store.delete(id).await {
        warn!("Uploaded {} but could not delete original {}: {}", uploaded, id, e);
        return Err(remote_err(
            RemoteOp::Delete,
            id,
            format!("{e} (inverted copy already uploaded as {uploaded})"),
        ));
    }

    let link = store.link(&uploaded);
    info!("Replaced {} with {}", id, uploaded);
    Ok(RemoteOutcome { id: uploaded, link })
}
