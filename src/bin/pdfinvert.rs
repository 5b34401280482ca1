//! CLI binary for pdfinvert.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `PipelineConfig`, routes the run through `InvertService` and writes the
//! retrieved artifacts to disk.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pdfinvert::pipeline::input;
use pdfinvert::{
    invert_remote, Artifact, ArtifactKind, InvertService, PdfiumBackend, Pipeline,
    PipelineConfig, PipelineProgress, PipelineStats, ProgressCallback, RemoteBlobStore, RemoteId,
    RemoteSettings, SlotAnchor,
};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

fn bar_style(unit: &str) -> ProgressStyle {
    ProgressStyle::with_template(&format!(
        "{{spinner:.cyan}} {{prefix:.bold}}  [{{bar:42.green/238}}] {{pos:>3}}/{{len}} {unit}  ⏱ {{elapsed_precise}}"
    ))
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("█▉▊▋▌▍▎▏  ")
    .tick_strings(TICKS)
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress: one bar that first counts documents (stage A), then
/// sheets (stage C).
struct CliProgress {
    bar: ProgressBar,
    slots: usize,
    pages: AtomicUsize,
}

impl CliProgress {
    fn new(slots: usize) -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(spinner);
        bar.set_prefix("Preparing");
        bar.set_message("Reading inputs…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            slots: slots.max(1),
            pages: AtomicUsize::new(0),
        })
    }
}

impl PipelineProgress for CliProgress {
    fn on_run_start(&self, documents: usize) {
        self.bar.set_style(bar_style("documents"));
        self.bar.set_length(documents as u64);
        self.bar.set_position(0);
        self.bar.set_prefix("Inverting");
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Inverting {documents} documents…"))
        ));
    }

    fn on_document_inverted(&self, index: usize, total: usize, pages: usize) {
        self.pages.fetch_add(pages, Ordering::SeqCst);
        self.bar.println(format!(
            "  {} Document {:>3}/{:<3}  {}",
            green("✓"),
            index,
            total,
            dim(&format!("{pages} pages")),
        ));
        self.bar.inc(1);
    }

    fn on_merged(&self, pages: usize) {
        let sheets = pages.div_ceil(self.slots);
        self.bar.set_style(bar_style("sheets"));
        self.bar.set_length(sheets as u64);
        self.bar.set_position(0);
        self.bar.set_prefix("Composing");
        self.bar.reset_eta();
    }

    fn on_sheet_composed(&self, sheet: usize, _total: usize) {
        self.bar.set_position(sheet as u64);
    }

    fn on_run_complete(&self, stats: &PipelineStats) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {} pages → {} sheets",
            green("✔"),
            bold(&self.pages.load(Ordering::SeqCst).to_string()),
            bold(&stats.sheets.to_string()),
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Invert two slide decks, 3 slides per A4 sheet
  pdfinvert lecture-1.pdf lecture-2.pdf

  # Choose output locations
  pdfinvert deck.pdf -o handout.pdf --zip handout.zip

  # Only invert and merge, no grid
  pdfinvert --invert-only a.pdf b.pdf -o inverted.pdf

  # Pin pages to the top-left of their slot instead of centring
  pdfinvert --anchor top-left deck.pdf

  # Invert a document held in the remote store, replacing the original
  PDFINVERT_REMOTE_ROOT=/srv/blobs pdfinvert --remote-id inbox/1234-deck.pdf

  # Receipt and stats as JSON
  pdfinvert --json deck.pdf > receipt.json

ENVIRONMENT VARIABLES:
  PDFINVERT_REMOTE_ROOT    Root directory of the remote store (required for --remote-id)
  PDFINVERT_REMOTE_FOLDER  Folder inverted uploads go into (default: inverted)
  PDFIUM_LIB_PATH          Path to an existing libpdfium, skips auto-download
  PDFIUM_FETCH_CACHE_DIR   Override the default pdfium cache directory
  RUST_LOG                 Log filter, e.g. pdfinvert=debug

  PDFium (~30 MB) is downloaded automatically on first run and cached in
  ~/.cache/pdfinvert/pdfium-7690/.
"#;

/// Invert PDF colours and lay pages out three to a sheet.
#[derive(Parser, Debug)]
#[command(
    name = "pdfinvert",
    version,
    about = "Invert PDF colours, merge documents and lay pages out three to an A4 sheet",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file paths or HTTP/HTTPS URLs, processed in this order.
    #[arg(required_unless_present = "remote_id")]
    inputs: Vec<String>,

    /// Where to write the composited PDF (or the merged PDF with --invert-only).
    #[arg(short, long, env = "PDFINVERT_OUTPUT", default_value = "converted.pdf")]
    output: PathBuf,

    /// Where to write the ZIP archive.
    #[arg(long, env = "PDFINVERT_ZIP", default_value = "converted.zip")]
    zip: PathBuf,

    /// Stop after inverting and merging; no grid, no archive.
    #[arg(long)]
    invert_only: bool,

    /// Invert a document from the remote store (see PDFINVERT_REMOTE_ROOT).
    #[arg(long, conflicts_with_all = ["inputs", "invert_only"])]
    remote_id: Option<String>,

    /// Placement inside a slot when aspect ratios differ.
    #[arg(long, env = "PDFINVERT_ANCHOR", value_enum, default_value = "center")]
    anchor: AnchorArg,

    /// Name of the PDF inside the archive.
    #[arg(long, env = "PDFINVERT_ENTRY_NAME", default_value = pdfinvert::config::DEFAULT_ENTRY_NAME)]
    entry_name: String,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDFINVERT_PASSWORD")]
    password: Option<String>,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "PDFINVERT_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Print the receipt (ids, paths, stats) as JSON on stdout.
    #[arg(long)]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDFINVERT_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDFINVERT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDFINVERT_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum AnchorArg {
    Center,
    TopLeft,
}

impl From<AnchorArg> for SlotAnchor {
    fn from(v: AnchorArg) -> Self {
        match v {
            AnchorArg::Center => SlotAnchor::Center,
            AnchorArg::TopLeft => SlotAnchor::TopLeft,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Library INFO logs are hidden while the progress bar is active.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Ensure PDFium engine is available ───────────────────────────────────
    let backend = locate_pdfium(cli.quiet)?;

    // ── Remote mode ─────────────────────────────────────────────────────────
    if let Some(ref remote_id) = cli.remote_id {
        return run_remote(&cli, backend, remote_id).await;
    }

    // ── Build config ─────────────────────────────────────────────────────
    let layout = pdfinvert::GridLayout::default();
    let progress: Option<ProgressCallback> = if show_progress && !cli.invert_only {
        Some(CliProgress::new(layout.slots) as Arc<dyn PipelineProgress>)
    } else {
        None
    };
    let config = build_config(&cli, progress)?;

    if cli.invert_only {
        return run_invert_only(&cli, backend, config).await;
    }

    // ── Submit, then retrieve by id ─────────────────────────────────────────
    let service = InvertService::new(Pipeline::new(backend, config));
    let receipt = service
        .submit_inputs(&cli.inputs)
        .await
        .context("Conversion failed")?;

    let id = receipt.id.to_string();
    let document = service.document(&id).context("Stored document missing")?;
    let archive = service.archive(&id).context("Stored archive missing")?;
    document.write_to(&cli.output).await?;
    archive.write_to(&cli.zip).await?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&receipt).context("Failed to serialise receipt")?
        );
    } else if !cli.quiet {
        eprintln!(
            "{}  {} documents  {} pages → {} sheets  {}ms",
            green("✔"),
            receipt.stats.documents,
            receipt.stats.source_pages,
            receipt.stats.sheets,
            receipt.stats.total_duration_ms,
        );
        eprintln!(
            "   {}  {}",
            bold(&cli.output.display().to_string()),
            dim(&format!("{} bytes", document.bytes.len()))
        );
        eprintln!(
            "   {}  {}",
            bold(&cli.zip.display().to_string()),
            dim(&format!("{} bytes", archive.bytes.len()))
        );
    }

    Ok(())
}

/// Find PDFium, downloading it behind a progress bar on first run.
fn locate_pdfium(quiet: bool) -> Result<PdfiumBackend> {
    if let Some(found) = pdfium_fetch::find_local() {
        return Ok(PdfiumBackend::new(found.path));
    }

    let located = if quiet {
        tokio::task::block_in_place(|| pdfium_fetch::locate(None))
    } else {
        let dl_bar = ProgressBar::new(0);
        dl_bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  \
                 [{bar:42.green/238}] {bytes}/{total_bytes}  ETA {eta_precise}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(TICKS),
        );
        dl_bar.set_prefix("PDF engine");
        dl_bar.enable_steady_tick(Duration::from_millis(80));

        let bar = dl_bar.clone();
        let located = tokio::task::block_in_place(|| {
            pdfium_fetch::locate(Some(&|downloaded: u64, total: Option<u64>| {
                if let Some(t) = total {
                    if bar.length() != Some(t) {
                        bar.set_length(t);
                    }
                }
                bar.set_position(downloaded);
            }))
        });
        dl_bar.finish_with_message("ready ✓");
        located
    }
    .context("Failed to download PDFium engine")?;

    Ok(PdfiumBackend::new(located.path.clone()))
}

/// Map CLI args to `PipelineConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<PipelineConfig> {
    let mut builder = PipelineConfig::builder()
        .anchor(cli.anchor.clone().into())
        .archive_entry_name(cli.entry_name.clone())
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref password) = cli.password {
        builder = builder.password(password.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

async fn run_invert_only(cli: &Cli, backend: PdfiumBackend, config: PipelineConfig) -> Result<()> {
    let sources = input::resolve_inputs(&cli.inputs, config.download_timeout_secs)
        .await
        .context("Failed to read inputs")?;
    let pipeline = Arc::new(Pipeline::new(backend, config));

    let merged = tokio::task::spawn_blocking(move || pipeline.invert_and_merge(&sources))
        .await
        .context("Inversion task panicked")?
        .context("Inversion failed")?;
    let merged = Artifact {
        kind: ArtifactKind::Document,
        bytes: merged.into(),
    };
    merged.write_to(&cli.output).await?;

    if !cli.quiet {
        eprintln!(
            "{}  {}  {}",
            green("✔"),
            bold(&cli.output.display().to_string()),
            dim(&format!("{} bytes", merged.bytes.len()))
        );
    }
    Ok(())
}

async fn run_remote(cli: &Cli, backend: PdfiumBackend, remote_id: &str) -> Result<()> {
    let settings = RemoteSettings::init().context("Remote store not configured")?;
    let store = settings.store();
    let config = build_config(cli, None)?;
    let pipeline = Arc::new(Pipeline::new(backend, config));

    let outcome = invert_remote(pipeline, &store, &RemoteId::new(remote_id), &settings.folder)
        .await
        .context("Remote inversion failed")?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&outcome).context("Failed to serialise outcome")?
        );
    } else if !cli.quiet {
        eprintln!("{}  {} → {}", green("✔"), remote_id, bold(outcome.id.as_str()));
        eprintln!("   {}", dim(&store.link(&outcome.id)));
    }
    Ok(())
}
