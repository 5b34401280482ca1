//! Input resolution: turn a user-supplied path or URL into PDF bytes.
//!
//! Everything downstream works on in-memory bytes, so URLs are downloaded
//! straight into memory. The `%PDF` magic is checked here so callers get an
//! input error rather than a decode failure deep inside the backend.

use crate::error::InvertError;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

const PDF_MAGIC: &[u8] = b"%PDF";

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Read `input` (a local path or an http(s) URL) into memory.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<Vec<u8>, InvertError> {
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        read_local(input).await
    }
}

/// Resolve every input, preserving order.
pub async fn resolve_inputs<S: AsRef<str>>(
    inputs: &[S],
    timeout_secs: u64,
) -> Result<Vec<Vec<u8>>, InvertError> {
    let mut sources = Vec::with_capacity(inputs.len());
    for input in inputs {
        sources.push(resolve_input(input.as_ref(), timeout_secs).await?);
    }
    Ok(sources)
}

/// Reject anything that does not start with `%PDF`.
pub fn check_magic(bytes: &[u8], origin: &str) -> Result<(), InvertError> {
    if bytes.starts_with(PDF_MAGIC) {
        Ok(())
    } else {
        Err(InvertError::NotAPdf {
            origin: origin.to_string(),
            magic: bytes.iter().take(PDF_MAGIC.len()).copied().collect(),
        })
    }
}

async fn read_local(path_str: &str) -> Result<Vec<u8>, InvertError> {
    let path = PathBuf::from(path_str);

    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) => {
            return Err(match e.kind() {
                ErrorKind::NotFound => InvertError::FileNotFound { path },
                ErrorKind::PermissionDenied => InvertError::PermissionDenied { path },
                _ => InvertError::FileReadFailed { path, source: e },
            })
        }
    };

    check_magic(&bytes, path_str)?;
    debug!("Read local PDF: {} ({} bytes)", path.display(), bytes.len());
    Ok(bytes)
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<Vec<u8>, InvertError> {
    info!("Downloading PDF from: {}", url);

    let failed = |reason: String| InvertError::DownloadFailed {
        url: url.to_string(),
        reason,
    };
    let classify = |e: reqwest::Error| {
        if e.is_timeout() {
            InvertError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            failed(e.to_string())
        }
    };

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| failed(e.to_string()))?;

    let response = client.get(url).send().await.map_err(classify)?;
    if !response.status().is_success() {
        return Err(failed(format!("HTTP {}", response.status())));
    }

    let bytes = response.bytes().await.map_err(classify)?.to_vec();
    check_magic(&bytes, url)?;

    info!("Downloaded {} bytes", bytes.len());
    Ok(bytes)
}
