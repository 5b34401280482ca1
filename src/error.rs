//! Error types for the pdfinvert library.
//!
//! A pipeline run either produces every artifact or fails as a whole, so there
//! is a single fatal error type, [`InvertError`]. Variants are grouped by the
//! stage that raises them; [`InvertError::kind`] collapses them into the
//! coarse [`ErrorKind`] a front-end needs to pick a response (reject the
//! upload, answer "not found", report a remote outage, ...).

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the pdfinvert library.
#[derive(Debug, Error)]
pub enum InvertError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists but reading it failed (a directory, an I/O fault, ...).
    #[error("Failed to read '{path}': {source}")]
    FileReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'")]
    DownloadTimeout { url: String, secs: u64 },

    /// The input was read, but is not a PDF.
    #[error("Input '{origin}' is not a PDF (first bytes: {magic:?})")]
    NotAPdf { origin: String, magic: Vec<u8> },

    // ── Decode errors ─────────────────────────────────────────────────────
    /// Source document `document` (0-based, in submission order) is unreadable.
    #[error("Document #{document} is corrupt: {detail}")]
    CorruptDocument { document: usize, detail: String },

    /// Source document requires a password but none was configured.
    #[error("Document #{document} is encrypted and requires a password")]
    PasswordRequired { document: usize },

    /// A password was configured but the document rejected it.
    #[error("Wrong password for document #{document}")]
    WrongPassword { document: usize },

    /// The rendering backend failed on a page (1-based within its document).
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// An embedded image could not be decoded.
    #[error("Image decoding failed: {0}")]
    ImageDecode(String),

    // ── Encode errors ─────────────────────────────────────────────────────
    /// A bitmap could not be encoded as an embedded image.
    #[error("Image encoding failed for page {page}: {detail}")]
    ImageEncode { page: usize, detail: String },

    /// A document could not be written back to bytes.
    #[error("Failed to serialise document: {0}")]
    SerialiseFailed(String),

    /// The output archive could not be written.
    #[error("Failed to build archive '{entry}': {detail}")]
    ArchiveFailed { entry: String, detail: String },

    // ── Retrieval errors ──────────────────────────────────────────────────
    /// No artifact is stored under this identifier (unknown, malformed or expired).
    #[error("No artifact with id '{id}'")]
    NotFound { id: String },

    // ── Remote storage errors ─────────────────────────────────────────────
    /// An upload, download or delete against the remote store failed.
    #[error("Remote {op} failed for '{target}': {detail}")]
    RemoteIo {
        op: RemoteOp,
        target: String,
        detail: String,
    },

    /// Required remote configuration is absent from the environment.
    #[error("Remote storage is not configured: set {var}")]
    RemoteNotConfigured { var: &'static str },

    // ── Config / environment errors ───────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
PDFium is normally downloaded automatically on first run.\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium to use an existing copy."
    )]
    PdfiumBindingFailed(String),

    /// Could not write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Remote store operation named in [`InvertError::RemoteIo`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteOp {
    Upload,
    Download,
    Delete,
}

impl fmt::Display for RemoteOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RemoteOp::Upload => "upload",
            RemoteOp::Download => "download",
            RemoteOp::Delete => "delete",
        })
    }
}

/// Coarse classification of an [`InvertError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The caller supplied something that is not a readable PDF source.
    Input,
    /// A source document or page could not be decoded or rendered.
    Decode,
    /// A page, document or archive could not be produced.
    Encode,
    /// Retrieval by an unknown identifier.
    NotFound,
    /// The remote store failed.
    RemoteIo,
    /// Bad configuration or missing runtime dependency.
    Config,
    Internal,
}

impl InvertError {
    pub fn kind(&self) -> ErrorKind {
        use InvertError::*;
        match self {
            FileNotFound { .. }
            | PermissionDenied { .. }
            | FileReadFailed { .. }
            | DownloadFailed { .. }
            | DownloadTimeout { .. }
            | NotAPdf { .. } => ErrorKind::Input,
            CorruptDocument { .. }
            | PasswordRequired { .. }
            | WrongPassword { .. }
            | RasterisationFailed { .. }
            | ImageDecode(_) => ErrorKind::Decode,
            ImageEncode { .. } | SerialiseFailed(_) | ArchiveFailed { .. } => ErrorKind::Encode,
            NotFound { .. } => ErrorKind::NotFound,
            RemoteIo { .. } => ErrorKind::RemoteIo,
            RemoteNotConfigured { .. }
            | InvalidConfig(_)
            | PdfiumBindingFailed(_)
            | OutputWriteFailed { .. } => ErrorKind::Config,
            Internal(_) => ErrorKind::Internal,
        }
    }

    /// `true` for errors a front-end should report as "not found".
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_display_names_id() {
        let e = InvertError::NotFound {
            id: "1234".into(),
        };
        assert!(e.to_string().contains("1234"));
        assert!(e.is_not_found());
    }

    #[test]
    fn remote_io_display() {
        let e = InvertError::RemoteIo {
            op: RemoteOp::Delete,
            target: "inbox/abc".into(),
            detail: "permission denied".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("delete"), "got: {msg}");
        assert!(msg.contains("inbox/abc"), "got: {msg}");
        assert_eq!(e.kind(), ErrorKind::RemoteIo);
    }

    #[test]
    fn decode_and_encode_kinds() {
        let decode = InvertError::RasterisationFailed {
            page: 3,
            detail: "bad xref".into(),
        };
        assert_eq!(decode.kind(), ErrorKind::Decode);
        assert!(decode.to_string().contains("page 3"));

        let encode = InvertError::ArchiveFailed {
            entry: "Final_Output.pdf".into(),
            detail: "disk full".into(),
        };
        assert_eq!(encode.kind(), ErrorKind::Encode);
    }

    #[test]
    fn password_errors_are_decode() {
        assert_eq!(
            InvertError::PasswordRequired { document: 0 }.kind(),
            ErrorKind::Decode
        );
        assert_eq!(
            InvertError::WrongPassword { document: 1 }.kind(),
            ErrorKind::Decode
        );
    }
}
