//! # pdfium-fetch
//!
//! Find a usable [PDFium](https://pdfium.googlesource.com/pdfium/) shared
//! library for `pdfium-render`, downloading and caching a prebuilt binary when
//! none is available locally.
//!
//! Resolution order, first hit wins:
//!
//! 1. `PDFIUM_LIB_PATH` pointing at an existing file.
//! 2. The per-release cache directory (see [`cache_dir`]).
//! 3. A download of the platform archive from
//!    [bblanchon/pdfium-binaries](https://github.com/bblanchon/pdfium-binaries),
//!    streamed straight through gzip/tar into the cache directory.
//!
//! The result is memoised for the lifetime of the process, so only the first
//! call can touch the network.
//!
//! ```rust,no_run
//! let located = pdfium_fetch::locate(None).expect("PDFium unavailable");
//! let pdfium = pdfium_fetch::bind(&located.path).expect("bind failed");
//! # drop(pdfium);
//! ```

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use pdfium_render::prelude::Pdfium;
use thiserror::Error;

/// pdfium-binaries release (`chromium/<n>`) this crate downloads.
pub const PDFIUM_RELEASE: &str = "7690";

const RELEASE_BASE_URL: &str = "https://github.com/bblanchon/pdfium-binaries/releases/download";

/// Environment variable naming an existing PDFium library.
pub const LIB_PATH_VAR: &str = "PDFIUM_LIB_PATH";

/// Environment variable overriding the cache root.
pub const CACHE_DIR_VAR: &str = "PDFIUM_FETCH_CACHE_DIR";

/// Progress hook: `(bytes_received, content_length)`.
pub type DownloadProgress<'a> = &'a dyn Fn(u64, Option<u64>);

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("no prebuilt PDFium for {os}/{arch}")]
    UnsupportedPlatform { os: String, arch: String },

    #[error("cache directory '{path}': {source}")]
    Cache {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("downloading {url}: {reason}")]
    Download { url: String, reason: String },

    #[error("extracting '{entry}': {reason}")]
    Extract { entry: String, reason: String },

    #[error("binding PDFium from '{path}': {reason}")]
    Bind { path: PathBuf, reason: String },
}

/// Where a located library came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LibrarySource {
    /// `PDFIUM_LIB_PATH`.
    Environment,
    /// Already present in the cache directory.
    Cache,
    /// Fetched during this process.
    Download,
}

/// A PDFium library on disk.
#[derive(Debug, Clone)]
pub struct Located {
    pub path: PathBuf,
    pub source: LibrarySource,
}

/// Release asset layout for one OS/arch pair.
#[derive(Debug, Clone, Copy)]
struct Platform {
    asset: &'static str,
    member: &'static str,
    file_name: &'static str,
}

impl Platform {
    fn current() -> Result<Self, FetchError> {
        Self::for_target(std::env::consts::OS, std::env::consts::ARCH)
    }

    fn for_target(os: &str, arch: &str) -> Result<Self, FetchError> {
        const DYLIB: (&str, &str) = ("lib/libpdfium.dylib", "libpdfium.dylib");
        const SO: (&str, &str) = ("lib/libpdfium.so", "libpdfium.so");
        const DLL: (&str, &str) = ("bin/pdfium.dll", "pdfium.dll");

        let (asset, (member, file_name)) = match (os, arch) {
            ("macos", "aarch64") => ("pdfium-mac-arm64.tgz", DYLIB),
            ("macos", "x86_64") => ("pdfium-mac-x64.tgz", DYLIB),
            ("linux", "x86_64") => ("pdfium-linux-x64.tgz", SO),
            ("linux", "aarch64") => ("pdfium-linux-arm64.tgz", SO),
            ("windows", "x86_64") => ("pdfium-win-x64.tgz", DLL),
            ("windows", "aarch64") => ("pdfium-win-arm64.tgz", DLL),
            ("windows", "x86") => ("pdfium-win-x86.tgz", DLL),
            _ => {
                return Err(FetchError::UnsupportedPlatform {
                    os: os.to_string(),
                    arch: arch.to_string(),
                })
            }
        };

        Ok(Self {
            asset,
            member,
            file_name,
        })
    }

    fn url(&self) -> String {
        format!("{RELEASE_BASE_URL}/chromium%2F{PDFIUM_RELEASE}/{}", self.asset)
    }
}

/// Directory holding the cached library for [`PDFIUM_RELEASE`].
///
/// `$PDFIUM_FETCH_CACHE_DIR/pdfium-<release>` when the override is set,
/// otherwise `<user cache dir>/pdfinvert/pdfium-<release>`.
pub fn cache_dir() -> PathBuf {
    let release_dir = format!("pdfium-{PDFIUM_RELEASE}");
    if let Some(root) = std::env::var_os(CACHE_DIR_VAR) {
        return PathBuf::from(root).join(release_dir);
    }

    dirs::cache_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".cache")))
        .unwrap_or_else(std::env::temp_dir)
        .join("pdfinvert")
        .join(release_dir)
}

static LOCATED: OnceLock<Located> = OnceLock::new();

/// Look for a library without touching the network.
pub fn find_local() -> Option<Located> {
    if let Some(path) = std::env::var_os(LIB_PATH_VAR).map(PathBuf::from) {
        if path.is_file() {
            return Some(Located {
                path,
                source: LibrarySource::Environment,
            });
        }
    }

    let platform = Platform::current().ok()?;
    let path = cache_dir().join(platform.file_name);
    path.is_file().then_some(Located {
        path,
        source: LibrarySource::Cache,
    })
}

/// Resolve a library, downloading it on first use if needed.
///
/// Safe to call concurrently; a lost race only costs a redundant lookup.
pub fn locate(progress: Option<DownloadProgress<'_>>) -> Result<&'static Located, FetchError> {
    if let Some(located) = LOCATED.get() {
        return Ok(located);
    }

    let located = match find_local() {
        Some(found) => found,
        None => download(progress)?,
    };

    Ok(LOCATED.get_or_init(|| located))
}

/// Bind `pdfium-render` to the library at `path`.
pub fn bind(path: &Path) -> Result<Pdfium, FetchError> {
    let bindings = Pdfium::bind_to_library(path).map_err(|e| FetchError::Bind {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    Ok(Pdfium::new(bindings))
}

fn download(progress: Option<DownloadProgress<'_>>) -> Result<Located, FetchError> {
    let platform = Platform::current()?;
    let dir = cache_dir();
    std::fs::create_dir_all(&dir).map_err(|source| FetchError::Cache {
        path: dir.clone(),
        source,
    })?;

    let url = platform.url();
    let client = reqwest::blocking::Client::builder()
        .user_agent(concat!("pdfium-fetch/", env!("CARGO_PKG_VERSION")))
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()
        .map_err(|e| FetchError::Download {
            url: url.clone(),
            reason: e.to_string(),
        })?;

    let response = client.get(&url).send().map_err(|e| FetchError::Download {
        url: url.clone(),
        reason: e.to_string(),
    })?;
    if !response.status().is_success() {
        return Err(FetchError::Download {
            url,
            reason: format!("HTTP {}", response.status()),
        });
    }

    let total = response.content_length();
    let reader = CountingReader {
        inner: response,
        seen: 0,
        total,
        progress,
    };

    let dest = dir.join(platform.file_name);
    extract_member(reader, platform.member, &dest)?;

    Ok(Located {
        path: dest,
        source: LibrarySource::Download,
    })
}

/// Stream a `.tgz` and write `member` to `dest`.
///
/// The entry is unpacked next to `dest` and renamed into place, so a reader
/// never sees a truncated library.
fn extract_member<R: Read>(archive: R, member: &str, dest: &Path) -> Result<(), FetchError> {
    let extract_err = |reason: String| FetchError::Extract {
        entry: member.to_string(),
        reason,
    };

    let mut tar = tar::Archive::new(flate2::read::GzDecoder::new(archive));
    let entries = tar.entries().map_err(|e| extract_err(e.to_string()))?;

    for entry in entries {
        let mut entry = entry.map_err(|e| extract_err(e.to_string()))?;
        let matches = entry
            .path()
            .map(|p| p.to_string_lossy() == member)
            .map_err(|e| extract_err(e.to_string()))?;
        if !matches {
            continue;
        }

        let partial = dest.with_extension("partial");
        let mut out = File::create(&partial).map_err(|source| FetchError::Cache {
            path: partial.clone(),
            source,
        })?;
        io::copy(&mut entry, &mut out).map_err(|e| extract_err(e.to_string()))?;
        drop(out);

        return std::fs::rename(&partial, dest).map_err(|source| FetchError::Cache {
            path: dest.to_path_buf(),
            source,
        });
    }

    Err(extract_err("not present in archive".to_string()))
}

struct CountingReader<'a, R> {
    inner: R,
    seen: u64,
    total: Option<u64>,
    progress: Option<DownloadProgress<'a>>,
}

impl<R: Read> Read for CountingReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.seen += n as u64;
        if let Some(cb) = self.progress {
            cb(self.seen, self.total);
        }
        Ok(n)
    }
}
