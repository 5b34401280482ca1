//! In-memory artifact store.
//!
//! Every successful run stores two byte streams (the composited PDF and the
//! ZIP archive wrapping it) under one freshly generated identifier. Readers
//! take a shared lock just long enough to clone two `Arc`s, so a slow
//! download never holds up a concurrent `put`.
//!
//! How long artifacts live is a [`RetentionPolicy`]. The default keeps them
//! until the process exits.

use crate::error::InvertError;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use uuid::Uuid;

/// Opaque identifier handed back by [`ArtifactStore::put`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactId(pub Uuid);

impl ArtifactId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ArtifactId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Parsing never fails with a format error: an id that is not a UUID cannot
/// name a stored artifact, so it is reported as [`InvertError::NotFound`].
impl FromStr for ArtifactId {
    type Err = InvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| InvertError::NotFound { id: s.to_string() })
    }
}

/// Which of the two stored streams an [`Artifact`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Document,
    Archive,
}

/// A retrieved artifact, ready to hand to a client.
#[derive(Clone)]
pub struct Artifact {
    pub kind: ArtifactKind,
    pub bytes: Arc<[u8]>,
}

impl Artifact {
    pub fn content_type(&self) -> &'static str {
        match self.kind {
            ArtifactKind::Document => "application/pdf",
            ArtifactKind::Archive => "application/zip",
        }
    }

    /// File name suggested to downloaders.
    pub fn download_name(&self) -> &'static str {
        match self.kind {
            ArtifactKind::Document => "converted.pdf",
            ArtifactKind::Archive => "converted.zip",
        }
    }

    /// Write the bytes to `path`, creating parent directories.
    ///
    /// Uses atomic write (temp file + rename) to prevent partial files.
    pub async fn write_to(&self, path: impl AsRef<Path>) -> Result<(), InvertError> {
        let path = path.as_ref();
        let failed = |source| InvertError::OutputWriteFailed {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(failed)?;
        }
        let tmp_path = path.with_extension("tmp");
        tokio::fs::write(&tmp_path, &self.bytes[..])
            .await
            .map_err(failed)?;
        tokio::fs::rename(&tmp_path, path).await.map_err(failed)?;

        debug!("Wrote {} bytes to {}", self.bytes.len(), path.display());
        Ok(())
    }
}

impl fmt::Debug for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Artifact")
            .field("kind", &self.kind)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

/// When stored artifacts are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetentionPolicy {
    /// Keep everything until the process exits.
    #[default]
    Forever,
    /// Entries older than this are invisible to readers and purged on the
    /// next `put` or [`ArtifactStore::purge_expired`].
    TimeToLive(Duration),
    /// Keep at most this many entries, evicting the oldest first.
    MaxEntries(usize),
}

struct Entry {
    document: Arc<[u8]>,
    archive: Arc<[u8]>,
    stored_at: Instant,
    seq: u64,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<ArtifactId, Entry>,
    next_seq: u64,
}

/// Thread-safe map from [`ArtifactId`] to a stored document/archive pair.
#[derive(Default)]
pub struct ArtifactStore {
    inner: RwLock<Inner>,
    policy: RetentionPolicy,
}

impl ArtifactStore {
    pub fn new(policy: RetentionPolicy) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            policy,
        }
    }

    pub fn policy(&self) -> RetentionPolicy {
        self.policy
    }

    /// Store both streams under a fresh identifier.
    pub fn put(&self, document: impl Into<Arc<[u8]>>, archive: impl Into<Arc<[u8]>>) -> ArtifactId {
        let document = document.into();
        let archive = archive.into();
        let now = Instant::now();

        let mut inner = self.inner.write();
        let mut id = ArtifactId::new();
        while inner.entries.contains_key(&id) {
            id = ArtifactId::new();
        }
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.entries.insert(
            id,
            Entry {
                document,
                archive,
                stored_at: now,
                seq,
            },
        );
        let evicted = self.enforce(&mut inner, now);
        drop(inner);

        if evicted > 0 {
            debug!(evicted, "Dropped artifacts past retention");
        }
        debug!(%id, "Stored artifact pair");
        id
    }

    pub fn get_document(&self, id: &ArtifactId) -> Result<Arc<[u8]>, InvertError> {
        self.get(id, |e| &e.document)
    }

    pub fn get_archive(&self, id: &ArtifactId) -> Result<Arc<[u8]>, InvertError> {
        self.get(id, |e| &e.archive)
    }

    /// Number of stored pairs, expired-but-unpurged ones included.
    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every entry the policy no longer allows. Returns how many went.
    pub fn purge_expired(&self) -> usize {
        let mut inner = self.inner.write();
        self.enforce(&mut inner, Instant::now())
    }

    fn get(&self, id: &ArtifactId, pick: impl Fn(&Entry) -> &Arc<[u8]>) -> Result<Arc<[u8]>, InvertError> {
        let inner = self.inner.read();
        match inner.entries.get(id) {
            Some(entry) if self.is_expired(entry, Instant::now()) => {
                warn!(%id, "Requested artifact has expired");
                Err(InvertError::NotFound { id: id.to_string() })
            }
            Some(entry) => Ok(Arc::clone(pick(entry))),
            None => Err(InvertError::NotFound { id: id.to_string() }),
        }
    }

    fn is_expired(&self, entry: &Entry, now: Instant) -> bool {
        match self.policy {
            RetentionPolicy::TimeToLive(ttl) => now.saturating_duration_since(entry.stored_at) > ttl,
            RetentionPolicy::Forever | RetentionPolicy::MaxEntries(_) => false,
        }
    }

    fn enforce(&self, inner: &mut Inner, now: Instant) -> usize {
        let before = inner.entries.len();
        match self.policy {
            RetentionPolicy::Forever => {}
            RetentionPolicy::TimeToLive(_) => {
                inner.entries.retain(|_, e| !self.is_expired(e, now));
            }
            RetentionPolicy::MaxEntries(max) => {
                let excess = inner.entries.len().saturating_sub(max);
                if excess > 0 {
                    let mut by_age: Vec<(u64, ArtifactId)> =
                        inner.entries.iter().map(|(id, e)| (e.seq, *id)).collect();
                    by_age.sort_unstable_by_key(|(seq, _)| *seq);
                    for (_, id) in by_age.into_iter().take(excess) {
                        inner.entries.remove(&id);
                    }
                }
            }
        }
        before - inner.entries.len()
    }
}

impl fmt::Debug for ArtifactStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArtifactStore")
            .field("policy", &self.policy)
            .field("entries", &self.len())
            .finish()
    }
}
